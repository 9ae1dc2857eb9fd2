//! SFTP Gateway
//!
//! Command-line front end for the session-managed transfer gateway.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use gateway::config::{default_config_path, Config};
use gateway::protocol::messages::{
    GetRequest, ListRequest, MultiGetRequest, MultiPutRequest, PutRequest,
};
use gateway::protocol::{Command, Reply};
use gateway::TransferGateway;
use tracing_subscriber::EnvFilter;

/// SFTP Gateway - move files between a local tree and an SFTP server.
#[derive(Parser, Debug)]
#[command(name = "sftp-gateway")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available gateway commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// List a remote directory (defaults to the remote root)
    Ls {
        /// Remote directory, absolute or relative to the remote root
        dir: Option<String>,
    },

    /// Download one remote file into the local root
    Get {
        /// Remote file path, absolute or relative to the remote root
        remote_path: String,
    },

    /// Upload one local file into a remote directory
    Put {
        /// Local file path, relative to the local root
        local_path: String,

        /// Target remote directory
        remote_dir: String,
    },

    /// Download every remote file matching a pattern
    Mget {
        /// Remote glob pattern, e.g. /outbox/*.csv
        pattern: String,
    },

    /// Upload every local file matching a pattern
    Mput {
        /// Local glob pattern, relative to the local root
        pattern: String,

        /// Target remote directory
        remote_dir: String,
    },

    /// Validate the configuration and print the resolved endpoint
    CheckConfig,
}

impl Commands {
    /// Protocol command for a transfer subcommand.
    fn to_command(&self) -> Option<Command> {
        let command = match self {
            Commands::Ls { dir } => Command::List(ListRequest {
                directory: dir.clone(),
            }),
            Commands::Get { remote_path } => Command::Get(GetRequest {
                remote_file_path: remote_path.clone(),
            }),
            Commands::Put {
                local_path,
                remote_dir,
            } => Command::Put(PutRequest {
                local_relative_path: local_path.clone(),
                remote_dir: remote_dir.clone(),
            }),
            Commands::Mget { pattern } => Command::MultiGet(MultiGetRequest {
                remote_pattern: pattern.clone(),
            }),
            Commands::Mput {
                pattern,
                remote_dir,
            } => Command::MultiPut(MultiPutRequest {
                local_pattern: pattern.clone(),
                remote_dir: remote_dir.clone(),
            }),
            Commands::CheckConfig => return None,
        };
        Some(command)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut config = Config::load(&config_path)?;

    // Apply environment variable overrides
    config.apply_env_overrides();

    // Validate configuration
    config.validate()?;

    // Initialize tracing; stdout is reserved for replies
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.logging.log_level))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("Using config file: {:?}", config_path);

    let Some(command) = cli.command.to_command() else {
        let endpoint = config.endpoint()?;
        println!("Configuration OK: {}", config_path.display());
        println!("  endpoint:    {}", endpoint.display_target());
        println!("  credential:  {}", endpoint.credential.method());
        println!("  host keys:   {}", endpoint.host_key_policy);
        println!("  local root:  {}", config.directories.local_root.display());
        println!("  remote root: {}", config.directories.remote_root);
        return Ok(());
    };

    let gateway = TransferGateway::connect(&config)?;
    let reply = gateway.execute(command).await;
    gateway.shutdown().await;

    let json = reply.to_json_pretty()?;
    if let Reply::Error(_) = reply {
        eprintln!("{}", json);
        std::process::exit(1);
    }
    println!("{}", json);
    Ok(())
}
