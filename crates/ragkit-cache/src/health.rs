use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use ragkit_core::traits::SharedCacheStore;

/// Background task pinging the shared tier on a fixed interval.
///
/// Each healthy tick also purges expired entries from the store. Queries
/// never wait on it. The task stops when the probe is dropped.
pub struct HealthProbe {
    handle: JoinHandle<()>,
}

impl HealthProbe {
    /// Must be called from within a tokio runtime.
    pub fn spawn(store: Arc<dyn SharedCacheStore>, interval: Duration, flag: Arc<AtomicBool>) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let ok = store.ping().await;
                let was = flag.swap(ok, Ordering::Relaxed);
                if was != ok {
                    if ok {
                        tracing::info!("shared cache tier is reachable again");
                    } else {
                        tracing::warn!("shared cache tier failed health check");
                    }
                }
                if ok {
                    match store.purge_expired().await {
                        Ok(0) => {}
                        Ok(n) => tracing::debug!(removed = n, "purged expired shared cache entries"),
                        Err(e) => tracing::warn!(error = %e, "shared cache purge failed"),
                    }
                }
            }
        });
        Self { handle }
    }
}

impl Drop for HealthProbe {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
