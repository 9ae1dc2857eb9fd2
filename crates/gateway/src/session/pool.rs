//! Bounded pool of reusable sessions.
//!
//! At most `max_sessions` sessions exist at once, enforced by a semaphore.
//! A borrowed session is handed out as an exclusive [`PooledSession`], so two
//! operations never share a live session. Returned sessions wait in an idle
//! queue and the most recently used one is reused first.

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use super::factory::SessionFactory;
use crate::config::PoolConfig;
use crate::error::ConnectError;
use crate::remote::RemoteClient;

/// Snapshot of pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Upper bound on open sessions.
    pub max_sessions: usize,
    /// Sessions waiting in the idle queue.
    pub idle: usize,
    /// Sessions currently borrowed (or being opened).
    pub in_use: usize,
    /// Sessions opened since the pool was created.
    pub created: u64,
    /// Sessions closed because they failed, expired or were not returned.
    pub discarded: u64,
}

struct IdleSession {
    id: u64,
    client: Box<dyn RemoteClient>,
    idle_since: Instant,
}

struct PoolShared {
    factory: SessionFactory,
    semaphore: Arc<Semaphore>,
    idle: Mutex<VecDeque<IdleSession>>,
    max_sessions: usize,
    idle_timeout: Duration,
    next_id: AtomicU64,
    created: AtomicU64,
    discarded: AtomicU64,
    closed: AtomicBool,
}

impl PoolShared {
    fn pop_idle(&self) -> Option<IdleSession> {
        match self.idle.lock() {
            Ok(mut idle) => idle.pop_back(),
            Err(poisoned) => poisoned.into_inner().pop_back(),
        }
    }

    fn push_idle(&self, session: IdleSession) {
        match self.idle.lock() {
            Ok(mut idle) => idle.push_back(session),
            Err(poisoned) => poisoned.into_inner().push_back(session),
        }
    }

    fn drain_idle(&self) -> Vec<IdleSession> {
        match self.idle.lock() {
            Ok(mut idle) => idle.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        }
    }

    fn idle_len(&self) -> usize {
        match self.idle.lock() {
            Ok(idle) => idle.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    async fn close_session(&self, id: u64, mut client: Box<dyn RemoteClient>, reason: &str) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
        debug!(session_id = id, reason, "Closing session");
        if let Err(e) = client.close().await {
            debug!(session_id = id, error = %e, "Error while closing session");
        }
    }
}

/// Pool of sessions to a single endpoint.
///
/// Cloning is cheap; clones share the same sessions.
#[derive(Clone)]
pub struct SessionPool {
    shared: Arc<PoolShared>,
}

impl SessionPool {
    /// Create an empty pool. Sessions are opened lazily on first use.
    pub fn new(factory: SessionFactory, config: &PoolConfig) -> Self {
        let max_sessions = config.max_sessions.max(1);
        Self {
            shared: Arc::new(PoolShared {
                factory,
                semaphore: Arc::new(Semaphore::new(max_sessions)),
                idle: Mutex::new(VecDeque::new()),
                max_sessions,
                idle_timeout: config.idle_timeout(),
                next_id: AtomicU64::new(1),
                created: AtomicU64::new(0),
                discarded: AtomicU64::new(0),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// The factory sessions are opened with.
    pub fn factory(&self) -> &SessionFactory {
        &self.shared.factory
    }

    /// Borrow a session, waiting for a free slot if the pool is at capacity.
    ///
    /// Idle sessions that expired or whose connection dropped are closed
    /// and skipped.
    pub async fn acquire(&self) -> Result<PooledSession, ConnectError> {
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(ConnectError::PoolClosed);
        }

        let permit = self
            .shared
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ConnectError::PoolClosed)?;

        while let Some(idle) = self.shared.pop_idle() {
            if idle.client.is_closed() {
                self.shared
                    .close_session(idle.id, idle.client, "connection closed while idle")
                    .await;
                continue;
            }
            if idle.idle_since.elapsed() > self.shared.idle_timeout {
                self.shared
                    .close_session(idle.id, idle.client, "idle timeout")
                    .await;
                continue;
            }

            debug!(session_id = idle.id, "Reusing idle session");
            return Ok(PooledSession::new(idle.id, idle.client, permit, &self.shared));
        }

        let client = self.shared.factory.connect().await?;
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        self.shared.created.fetch_add(1, Ordering::Relaxed);
        debug!(session_id = id, "Opened new session");

        Ok(PooledSession::new(id, client, permit, &self.shared))
    }

    /// Current pool counters.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            max_sessions: self.shared.max_sessions,
            idle: self.shared.idle_len(),
            in_use: self
                .shared
                .max_sessions
                .saturating_sub(self.shared.semaphore.available_permits()),
            created: self.shared.created.load(Ordering::Relaxed),
            discarded: self.shared.discarded.load(Ordering::Relaxed),
        }
    }

    /// Close every idle session and refuse further borrows.
    ///
    /// Sessions still borrowed are closed when they come back.
    pub async fn shutdown(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shared.semaphore.close();

        let idle = self.shared.drain_idle();
        info!(idle = idle.len(), "Shutting down session pool");
        for session in idle {
            self.shared
                .close_session(session.id, session.client, "pool shutdown")
                .await;
        }
    }
}

impl std::fmt::Debug for SessionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionPool")
            .field("stats", &self.stats())
            .finish()
    }
}

/// Bookkeeping half of a borrowed session. Counts the session as discarded
/// if it is dropped without being settled.
struct Lease {
    id: u64,
    shared: Arc<PoolShared>,
    _permit: OwnedSemaphorePermit,
    settled: bool,
}

impl Drop for Lease {
    fn drop(&mut self) {
        if !self.settled {
            self.shared.discarded.fetch_add(1, Ordering::Relaxed);
            warn!(session_id = self.id, "Session dropped before release, discarding");
        }
    }
}

/// A session borrowed from the pool.
///
/// Call [`release`](Self::release) to return it or
/// [`discard`](Self::discard) to close it. Dropping it without either
/// discards it, so a transfer abandoned halfway (e.g. on timeout) never
/// leaks a half-used session back into the pool.
pub struct PooledSession {
    client: Box<dyn RemoteClient>,
    lease: Lease,
}

impl PooledSession {
    fn new(
        id: u64,
        client: Box<dyn RemoteClient>,
        permit: OwnedSemaphorePermit,
        shared: &Arc<PoolShared>,
    ) -> Self {
        Self {
            client,
            lease: Lease {
                id,
                shared: shared.clone(),
                _permit: permit,
                settled: false,
            },
        }
    }

    /// Pool-local id of the session, for logging.
    pub fn id(&self) -> u64 {
        self.lease.id
    }

    /// Return the session to the idle queue.
    pub async fn release(self) {
        let PooledSession { client, mut lease } = self;
        lease.settled = true;

        if lease.shared.closed.load(Ordering::Acquire) {
            lease.shared.close_session(lease.id, client, "pool shutdown").await;
            return;
        }
        if client.is_closed() {
            lease
                .shared
                .close_session(lease.id, client, "connection closed")
                .await;
            return;
        }

        lease.shared.push_idle(IdleSession {
            id: lease.id,
            client,
            idle_since: Instant::now(),
        });
        debug!(session_id = lease.id, "Session returned to pool");
    }

    /// Close the session instead of returning it.
    pub async fn discard(self) {
        let PooledSession { client, mut lease } = self;
        lease.settled = true;
        lease.shared.close_session(lease.id, client, "discarded").await;
    }
}

impl Deref for PooledSession {
    type Target = dyn RemoteClient;

    fn deref(&self) -> &Self::Target {
        self.client.as_ref()
    }
}

impl DerefMut for PooledSession {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.client.as_mut()
    }
}
