//! Connection pool for one host: credential slots moving between queues.
//!
//! ```text
//! acquire(block)
//!   → [gate] pop active        → hand out open session
//!   → [gate] pop inactive      → (gate released) open + login → hand out
//!                                 login failed → slot to bad, try again
//!   → nothing left             → wait for a return (block) or PoolExhausted
//!
//! return_session         in-use → active
//! return_broken_session  in-use → bad
//! reap_idle              active → inactive (logged out)
//! close_all_connections  active → inactive (disposed)
//! ```
//!
//! Only the selection step runs under the gate. Queue and in-use locks are
//! short and never held across an `.await`, so returns and the reaper never
//! wait for a slow login.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use tokio::sync::{Notify, Semaphore, SemaphorePermit};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{PoolConfiguration, PoolKey};
use crate::entry::QueueEntry;
use crate::error::{PoolError, PoolResult};
use crate::proxy::{ConfigurationProxy, SharedCredentials};
use crate::session::{next_session_id, PooledSession, Session, SessionFactory};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Point-in-time queue sizes for one pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolStats {
    /// Configured slots; constant for the pool's life.
    pub total: usize,
    /// Slots not retired to the bad queue.
    pub live: usize,
    /// Logged-in sessions waiting for reuse.
    pub active: usize,
    /// Slots with no open session.
    pub inactive: usize,
    /// Slots retired after a failure.
    pub bad: usize,
    /// Sessions currently checked out.
    pub in_use: usize,
    pub reapable: bool,
}

impl PoolStats {
    /// Whether every slot is accounted for in exactly one queue.
    pub fn is_balanced(&self) -> bool {
        self.total == self.active + self.inactive + self.bad + self.in_use
            && self.live == self.total - self.bad
    }
}

/// A bounded pool of terminal sessions for one host, one slot per credential.
pub struct ConnectionPool {
    key: PoolKey,
    config: Arc<PoolConfiguration>,
    credentials: SharedCredentials,
    factory: Arc<dyn SessionFactory>,
    /// Slots without an open session.
    inactive: Mutex<VecDeque<QueueEntry>>,
    /// Logged-in sessions ready for reuse.
    active: Mutex<VecDeque<QueueEntry>>,
    /// Slots retired after an activation or use failure. Never reused.
    bad: Mutex<Vec<QueueEntry>>,
    /// Checked-out slots keyed by session id.
    in_use: Mutex<HashMap<u64, QueueEntry>>,
    /// Serializes the selection step of acquire, close-all and test-all.
    gate: Semaphore,
    /// Wakes a blocked acquirer when a slot becomes available or is retired.
    available: Notify,
    total: usize,
    live: AtomicUsize,
    reapable: AtomicBool,
    retired: AtomicBool,
}

impl ConnectionPool {
    /// Build a pool with every slot inactive.
    pub fn new(config: PoolConfiguration, factory: Arc<dyn SessionFactory>) -> Self {
        let total = config.slot_count();
        let credentials = Arc::new(RwLock::new(config.credentials.clone()));
        let inactive = (0..total).map(QueueEntry::new).collect();

        debug!(host = %config.host, slots = total, "created session pool");

        Self {
            key: config.key(),
            config: Arc::new(config),
            credentials,
            factory,
            inactive: Mutex::new(inactive),
            active: Mutex::new(VecDeque::new()),
            bad: Mutex::new(Vec::new()),
            in_use: Mutex::new(HashMap::new()),
            gate: Semaphore::new(1),
            available: Notify::new(),
            total,
            live: AtomicUsize::new(total),
            reapable: AtomicBool::new(true),
            retired: AtomicBool::new(false),
        }
    }

    pub fn key(&self) -> &PoolKey {
        &self.key
    }

    pub fn configuration(&self) -> &PoolConfiguration {
        &self.config
    }

    pub fn total_slots(&self) -> usize {
        self.total
    }

    pub fn live_slots(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn is_reapable(&self) -> bool {
        self.reapable.load(Ordering::SeqCst)
    }

    pub fn set_reapable(&self, reapable: bool) {
        self.reapable.store(reapable, Ordering::SeqCst);
    }

    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::SeqCst)
    }

    /// The slot view handed to the session factory.
    pub fn proxy(&self, index: usize) -> ConfigurationProxy {
        ConfigurationProxy::new(index, Arc::clone(&self.config), Arc::clone(&self.credentials))
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            total: self.total,
            live: self.live_slots(),
            active: lock(&self.active).len(),
            inactive: lock(&self.inactive).len(),
            bad: lock(&self.bad).len(),
            in_use: lock(&self.in_use).len(),
            reapable: self.is_reapable(),
        }
    }

    // ── Acquire ─────────────────────────────────────────────────────

    /// Check a session out of the pool.
    ///
    /// With `block_if_empty` the selection step runs under the pool gate and
    /// waits for a return when every live slot is checked out. Without it
    /// the gate is skipped (for callers that already hold it) and an empty
    /// pool fails immediately.
    ///
    /// A slot that fails to log in is retired and the next slot is tried;
    /// the failure only reaches the caller as [`PoolError::Exhausted`] once
    /// no live slot is left.
    pub async fn acquire(&self, block_if_empty: bool) -> PoolResult<PooledSession> {
        // Each failed activation retires a slot, so at most `total` retries.
        for _ in 0..=self.total {
            let mut entry = self.select(block_if_empty).await?;

            if let Some(session) = entry.session.take() {
                return Ok(self.check_out(entry, session));
            }

            match self.activate(entry) {
                Ok(session) => return Ok(session),
                Err(err) if err.is_slot_failure() => {
                    warn!(host = %self.key, error = %err, "session activation failed, trying next slot");
                }
                Err(err) => return Err(err),
            }
        }
        Err(self.exhausted())
    }

    /// Pick the next entry: active first, then inactive.
    async fn select(&self, block_if_empty: bool) -> PoolResult<QueueEntry> {
        let _permit = if block_if_empty {
            Some(self.enter_gate().await?)
        } else {
            None
        };

        loop {
            // Registered before the checks so a retire or return in between is not lost.
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_retired() {
                return Err(PoolError::Retired {
                    host: self.key.to_string(),
                });
            }
            if self.live_slots() == 0 {
                return Err(self.exhausted());
            }
            if let Some(entry) = self.pop_active().or_else(|| self.pop_inactive()) {
                return Ok(entry);
            }
            if !block_if_empty {
                return Err(self.exhausted());
            }

            debug!(host = %self.key, "all sessions checked out, waiting for a return");
            notified.await;
        }
    }

    /// Open and log in a session for an inactive slot.
    ///
    /// On failure the slot is moved to the bad queue before the error is returned.
    fn activate(&self, entry: QueueEntry) -> PoolResult<PooledSession> {
        let proxy = self.proxy(entry.index);
        let user = proxy.user_name();

        let opened = self.factory.new_session(proxy).and_then(|mut session| {
            match session.login() {
                Ok(()) => Ok(session),
                Err(err) => {
                    if let Err(dispose_err) = session.dispose() {
                        debug!(host = %self.key, slot = entry.index, error = %dispose_err, "dispose after failed login also failed");
                    }
                    Err(err)
                }
            }
        });

        match opened {
            Ok(session) => {
                info!(host = %self.key, slot = entry.index, user = %user, "logged in new session");
                Ok(self.check_out(entry, session))
            }
            Err(source) => {
                let slot = entry.index;
                self.retire_slot(entry);
                Err(PoolError::Activation { slot, user, source })
            }
        }
    }

    fn check_out(&self, entry: QueueEntry, session: Box<dyn Session>) -> PooledSession {
        let id = next_session_id();
        let slot = entry.index;
        lock(&self.in_use).insert(id, entry);
        debug!(host = %self.key, slot, session_id = id, "checked out session");
        PooledSession::new(id, slot, session)
    }

    // ── Return ──────────────────────────────────────────────────────

    /// Give a healthy session back for reuse.
    pub fn return_session(&self, session: PooledSession) -> PoolResult<()> {
        let mut entry = self.take_in_use(&session)?;
        let session_id = session.id();
        let mut session = session.into_inner();

        if self.is_retired() {
            if let Err(err) = session.dispose() {
                warn!(host = %self.key, session_id, error = %err, "failed to dispose session returned to retired pool");
            }
            lock(&self.inactive).push_back(entry);
            self.available.notify_one();
            return Ok(());
        }

        entry.session = Some(session);
        entry.last_returned_at = Instant::now();
        lock(&self.active).push_back(entry);
        self.available.notify_one();

        debug!(host = %self.key, session_id, "returned session to pool");
        Ok(())
    }

    /// Give back a session that failed during use. Its slot is retired.
    pub fn return_broken_session(&self, session: PooledSession) -> PoolResult<()> {
        let entry = self.take_in_use(&session)?;
        let session_id = session.id();
        let mut session = session.into_inner();

        if let Err(err) = session.dispose() {
            warn!(host = %self.key, session_id, error = %err, "failed to dispose broken session");
        }
        drop(session);

        warn!(host = %self.key, slot = entry.index, session_id, "retiring slot after broken session");
        self.retire_slot(entry);
        Ok(())
    }

    fn take_in_use(&self, session: &PooledSession) -> PoolResult<QueueEntry> {
        lock(&self.in_use)
            .remove(&session.id())
            .ok_or_else(|| PoolError::UnknownSession {
                host: self.key.to_string(),
                session_id: session.id(),
            })
    }

    // ── Close / test ────────────────────────────────────────────────

    /// Wait for checked-out sessions to come back, then dispose every
    /// active session and move its slot to inactive.
    pub async fn close_all_connections(&self) -> PoolResult<()> {
        let _permit = self.close_all_connections_locked().await?;
        Ok(())
    }

    /// [`close_all_connections`](Self::close_all_connections), keeping the
    /// gate held until the returned permit is dropped.
    pub async fn close_all_connections_locked(&self) -> PoolResult<SemaphorePermit<'_>> {
        let permit = self.enter_gate().await?;
        self.drain_in_use().await?;

        let entries: Vec<QueueEntry> = lock(&self.active).drain(..).collect();
        let mut closed = 0usize;
        for mut entry in entries {
            let Some(mut session) = entry.session.take() else {
                lock(&self.inactive).push_back(entry);
                continue;
            };
            match session.dispose() {
                Ok(()) => {
                    closed += 1;
                    lock(&self.inactive).push_back(entry);
                }
                Err(err) => {
                    warn!(host = %self.key, slot = entry.index, error = %err, "failed to dispose session during close");
                    self.retire_slot(entry);
                }
            }
        }

        if closed > 0 {
            info!(host = %self.key, closed, "closed pooled sessions");
        }
        Ok(permit)
    }

    /// Poll until nothing is checked out, at most `2 × in_use` rounds of
    /// `command_timeout` each.
    async fn drain_in_use(&self) -> PoolResult<()> {
        let max_rounds = 2 * self.in_use_len();
        let mut rounds = 0;

        while self.in_use_len() > 0 {
            if rounds >= max_rounds {
                warn!(host = %self.key, in_use = self.in_use_len(), "sessions still checked out, giving up on close");
                return Err(self.exhausted());
            }
            rounds += 1;
            tokio::time::sleep(self.config.command_timeout).await;
        }
        Ok(())
    }

    /// Log every slot out and back in, one task per live slot.
    ///
    /// Slots that fail are retired; the error lists each failure, including
    /// slots already retired before the test. Reapability is restored on
    /// every exit path.
    pub async fn test_all_connections(self: &Arc<Self>) -> PoolResult<()> {
        let result = self.verify_all_slots().await;
        self.set_reapable(true);
        result
    }

    async fn verify_all_slots(self: &Arc<Self>) -> PoolResult<()> {
        let permit = self.close_all_connections_locked().await?;

        let bad: Vec<usize> = lock(&self.bad).iter().map(QueueEntry::index).collect();
        let tasks: Vec<_> = (0..self.total)
            .map(|slot| {
                if bad.contains(&slot) {
                    return (slot, None);
                }
                let pool = Arc::clone(self);
                (slot, Some(tokio::task::spawn_blocking(move || pool.verify_slot(slot))))
            })
            .collect();

        let mut failures = Vec::new();
        for (slot, task) in tasks {
            let Some(task) = task else {
                failures.push(format!("slot {slot}: retired after an earlier failure"));
                continue;
            };
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => failures.push(format!("slot {slot}: {err}")),
                Err(join_err) => failures.push(format!("slot {slot}: verification task failed: {join_err}")),
            }
        }

        drop(permit);

        if failures.is_empty() {
            info!(host = %self.key, slots = self.live_slots(), "connection test passed");
            Ok(())
        } else {
            warn!(host = %self.key, failed = failures.len(), "connection test failed");
            Err(PoolError::TestFailed {
                host: self.key.to_string(),
                failures,
            })
        }
    }

    fn verify_slot(&self, slot: usize) -> PoolResult<()> {
        let entry = {
            let mut inactive = lock(&self.inactive);
            let position = inactive.iter().position(|e| e.index == slot);
            position.and_then(|p| inactive.remove(p))
        };
        let entry = entry.ok_or_else(|| self.exhausted())?;
        let session = self.activate(entry)?;
        self.return_session(session)
    }

    // ── Reaping ─────────────────────────────────────────────────────

    /// Log out active sessions idle longer than the configured threshold.
    ///
    /// Expired entries are pulled out under the active-queue lock, so an
    /// acquirer that popped an entry first keeps it. Returns the number of
    /// sessions logged out.
    pub fn reap_idle(&self, now: Instant) -> usize {
        let threshold = self.config.idle_reap_threshold;
        let expired: Vec<QueueEntry> = {
            let mut active = lock(&self.active);
            let (expired, keep): (Vec<_>, Vec<_>) = active
                .drain(..)
                .partition(|entry| entry.idle_longer_than(threshold, now));
            active.extend(keep);
            expired
        };

        let reaped = expired.len();
        for mut entry in expired {
            if let Some(mut session) = entry.session.take() {
                if let Err(err) = session.logout() {
                    warn!(host = %self.key, slot = entry.index, error = %err, "logout of idle session failed");
                }
                if let Err(err) = session.dispose() {
                    warn!(host = %self.key, slot = entry.index, error = %err, "dispose of idle session failed");
                }
            }
            lock(&self.inactive).push_back(entry);
        }

        if reaped > 0 {
            self.available.notify_one();
            info!(host = %self.key, reaped, "logged out idle sessions");
        }
        reaped
    }

    /// Every live slot is inactive: nothing open, nothing checked out.
    pub fn is_fully_idle(&self) -> bool {
        self.live_slots() == lock(&self.inactive).len()
    }

    /// Mark the pool discarded. Waiters fail and later returns are disposed.
    pub fn retire(&self) {
        self.retired.store(true, Ordering::SeqCst);
        self.gate.close();
        self.available.notify_waiters();
        debug!(host = %self.key, "retired session pool");
    }

    // ── Internals ───────────────────────────────────────────────────

    async fn enter_gate(&self) -> PoolResult<SemaphorePermit<'_>> {
        self.gate.acquire().await.map_err(|_| PoolError::GateClosed {
            host: self.key.to_string(),
        })
    }

    fn pop_active(&self) -> Option<QueueEntry> {
        lock(&self.active).pop_front()
    }

    fn pop_inactive(&self) -> Option<QueueEntry> {
        lock(&self.inactive).pop_front()
    }

    fn in_use_len(&self) -> usize {
        lock(&self.in_use).len()
    }

    fn retire_slot(&self, mut entry: QueueEntry) {
        entry.session = None;
        lock(&self.bad).push(entry);
        self.live.fetch_sub(1, Ordering::SeqCst);
        self.available.notify_one();
    }

    fn exhausted(&self) -> PoolError {
        PoolError::Exhausted {
            host: self.key.to_string(),
        }
    }
}

// ── Debug impl (cannot auto-derive due to dyn trait) ────────────────

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("key", &self.key)
            .field("stats", &self.stats())
            .field("retired", &self.is_retired())
            .finish_non_exhaustive()
    }
}
