//! Pool registry: one pool per host, replaced when its configuration changes.
//!
//! A process creates one `PoolRegistry`, hands an `Arc` of it to every
//! connector instance, and calls [`PoolRegistry::shutdown`] when it stops.
//!
//! ```text
//! get_pool(config)
//!   → no pool for host             → build pool, register
//!   → pool with same identity      → return it
//!   → pool with different identity → close + retire old, build, register
//! ```

use std::collections::HashMap;
use std::sync::{Arc, PoisonError};

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{PoolConfiguration, PoolKey, RegistrySettings};
use crate::error::{ConnectorError, PoolError, PoolResult};
use crate::messages::{DefaultMessages, MessageCatalog};
use crate::pool::ConnectionPool;
use crate::reaper::ReaperHandle;
use crate::session::{PooledSession, SessionFactory};

/// Outcome of one reaper pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReapReport {
    /// Idle sessions logged out.
    pub sessions: usize,
    /// Fully idle pools removed from the registry.
    pub pools_retired: usize,
}

/// Process-wide map from host to its session pool.
pub struct PoolRegistry {
    /// Every create/replace/remove decision happens under this lock.
    pools: Mutex<HashMap<PoolKey, Arc<ConnectionPool>>>,
    factory: Arc<dyn SessionFactory>,
    messages: Arc<dyn MessageCatalog>,
    reaper: std::sync::Mutex<Option<ReaperHandle>>,
}

impl PoolRegistry {
    /// Create a registry without a background reaper.
    pub fn new(factory: Arc<dyn SessionFactory>) -> Self {
        Self {
            pools: Mutex::new(HashMap::new()),
            factory,
            messages: Arc::new(DefaultMessages),
            reaper: std::sync::Mutex::new(None),
        }
    }

    /// Builder method: use a localized message catalog for connector errors.
    pub fn with_messages(self, messages: Arc<dyn MessageCatalog>) -> Self {
        Self { messages, ..self }
    }

    /// Create a registry and start its reaper. Must be called inside a Tokio runtime.
    pub fn start(factory: Arc<dyn SessionFactory>, settings: RegistrySettings) -> Arc<Self> {
        let registry = Arc::new(Self::new(factory));
        registry.start_reaper(&settings);
        registry
    }

    /// Start the reaper task, replacing any running one.
    pub fn start_reaper(self: &Arc<Self>, settings: &RegistrySettings) {
        let handle = ReaperHandle::spawn(Arc::downgrade(self), settings.reap_interval);
        let previous = self
            .reaper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(old) = previous {
            old.abort();
        }
        info!(interval = ?settings.reap_interval, "session reaper started");
    }

    pub fn is_reaper_running(&self) -> bool {
        self.reaper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// The pool for `config.host`, created or replaced as needed.
    pub async fn get_pool(&self, config: &PoolConfiguration) -> Arc<ConnectionPool> {
        let mut pools = self.pools.lock().await;
        self.pool_for(&mut pools, config).await
    }

    /// Fetch the pool and check a session out of it.
    ///
    /// The pool is kept out of the reaper's reach between lookup and checkout.
    pub async fn get_session(
        &self,
        config: &PoolConfiguration,
    ) -> PoolResult<(Arc<ConnectionPool>, PooledSession)> {
        let pool = {
            let mut pools = self.pools.lock().await;
            let pool = self.pool_for(&mut pools, config).await;
            pool.set_reapable(false);
            pool
        };

        let result = pool.acquire(true).await;
        pool.set_reapable(true);
        result.map(|session| (pool, session))
    }

    /// Log every slot of the host's pool out and back in.
    pub async fn test_pool(&self, config: &PoolConfiguration) -> PoolResult<()> {
        let pool = {
            let mut pools = self.pools.lock().await;
            let pool = self.pool_for(&mut pools, config).await;
            pool.set_reapable(false);
            pool
        };
        pool.test_all_connections().await
    }

    /// Close, retire and unregister the pool for `key`. Returns whether one existed.
    pub async fn remove_pool(&self, key: &PoolKey) -> bool {
        let mut pools = self.pools.lock().await;
        match pools.remove(key) {
            Some(pool) => {
                discard(&pool).await;
                info!(host = %key, "removed session pool");
                true
            }
            None => false,
        }
    }

    pub async fn pool_keys(&self) -> Vec<PoolKey> {
        let mut keys: Vec<PoolKey> = self.pools.lock().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub async fn len(&self) -> usize {
        self.pools.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pools.lock().await.is_empty()
    }

    /// One reaper pass over a snapshot of the registry.
    ///
    /// Logs out idle sessions in every pool, then unregisters pools that are
    /// still current, reapable, and fully idle.
    pub async fn reap_once(&self) -> ReapReport {
        let snapshot: Vec<(PoolKey, Arc<ConnectionPool>)> = self
            .pools
            .lock()
            .await
            .iter()
            .map(|(key, pool)| (key.clone(), Arc::clone(pool)))
            .collect();

        let now = Instant::now();
        let mut report = ReapReport::default();

        for (key, pool) in snapshot {
            report.sessions += pool.reap_idle(now);

            let mut pools = self.pools.lock().await;
            let current = pools
                .get(&key)
                .is_some_and(|registered| Arc::ptr_eq(registered, &pool));
            if current && pool.is_reapable() && pool.is_fully_idle() {
                pools.remove(&key);
                pool.retire();
                report.pools_retired += 1;
                info!(host = %key, "retired idle session pool");
            }
        }

        report
    }

    /// Stop the reaper and close every pool.
    pub async fn shutdown(&self) {
        let reaper = self
            .reaper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(reaper) = reaper {
            reaper.stop().await;
        }

        let mut pools = self.pools.lock().await;
        for (key, pool) in pools.drain() {
            discard(&pool).await;
            debug!(host = %key, "closed session pool on shutdown");
        }
        info!("session pool registry shut down");
    }

    /// Render a pool failure as the connector-facing error.
    pub fn connector_error(&self, error: &PoolError) -> ConnectorError {
        ConnectorError::from_pool_error(error, self.messages.as_ref())
    }

    async fn pool_for(
        &self,
        pools: &mut HashMap<PoolKey, Arc<ConnectionPool>>,
        config: &PoolConfiguration,
    ) -> Arc<ConnectionPool> {
        let key = config.key();

        if let Some(existing) = pools.get(&key) {
            if existing.configuration().same_identity(config) {
                return Arc::clone(existing);
            }
            info!(host = %key, "configuration changed, replacing session pool");
            if let Some(old) = pools.remove(&key) {
                discard(&old).await;
            }
        }

        let pool = Arc::new(ConnectionPool::new(config.clone(), Arc::clone(&self.factory)));
        pools.insert(key.clone(), Arc::clone(&pool));
        debug!(host = %key, slots = pool.total_slots(), "registered session pool");
        pool
    }
}

/// Log every session out of a pool that is leaving the registry.
async fn discard(pool: &ConnectionPool) {
    if let Err(err) = pool.close_all_connections().await {
        warn!(host = %pool.key(), error = %err, "failed to close all sessions of discarded pool");
    }
    pool.retire();
}

impl std::fmt::Debug for PoolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolRegistry")
            .field("reaper_running", &self.is_reaper_running())
            .finish_non_exhaustive()
    }
}
