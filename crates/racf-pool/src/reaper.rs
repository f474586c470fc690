//! Session reaper: background task that logs out idle sessions.
//!
//! One reaper runs per [`PoolRegistry`]. Every tick it calls
//! [`PoolRegistry::reap_once`], which logs out sessions idle past their
//! pool's threshold and unregisters pools with nothing left open. The task
//! holds only a weak reference, so dropping the registry ends it too.

use std::sync::Weak;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::registry::PoolRegistry;

/// Handle to a running reaper task.
#[derive(Debug)]
pub struct ReaperHandle {
    handle: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

impl ReaperHandle {
    /// Spawn the reaper loop on the current Tokio runtime.
    pub fn spawn(registry: Weak<PoolRegistry>, interval: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            run_reaper_loop(registry, interval, shutdown_rx).await;
        });
        Self {
            handle,
            shutdown_tx,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Signal shutdown and wait for the current tick to finish.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.handle.await;
        debug!("session reaper stopped");
    }

    /// Stop without waiting.
    pub fn abort(self) {
        let _ = self.shutdown_tx.send(true);
        self.handle.abort();
    }
}

async fn run_reaper_loop(
    registry: Weak<PoolRegistry>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!(?interval, "session reaper loop starting");

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                let Some(registry) = registry.upgrade() else {
                    debug!("registry dropped, session reaper exiting");
                    break;
                };
                let report = registry.reap_once().await;
                if report.sessions > 0 || report.pools_retired > 0 {
                    info!(
                        sessions = report.sessions,
                        pools = report.pools_retired,
                        "reaper pass complete"
                    );
                }
            }
            _ = shutdown.changed() => {
                debug!("session reaper shutting down");
                break;
            }
        }
    }
}
