//! Expiry Scheduler
//!
//! Background task that sweeps expired entries on a fixed interval and
//! periodically saves the access-pattern table.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::manager::AdaptiveCache;
use crate::persistence::PatternStore;

impl AdaptiveCache {
    /// Load persisted patterns and spawn the expiry scheduler.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn start(self: &Arc<Self>, store: Option<Arc<dyn PatternStore>>) -> CacheHandle {
        if let Some(store) = &store {
            restore_from(self, store.as_ref()).await;
        }

        let scheduler = ExpiryScheduler {
            cache: Arc::clone(self),
            store,
            cleanup_interval: self.config().cleanup_interval(),
            persist_interval: self.config().persist_interval(),
        };
        let token = CancellationToken::new();
        let task = tokio::spawn(scheduler.run(token.clone()));

        CacheHandle {
            cache: Arc::clone(self),
            token,
            task,
        }
    }
}

async fn restore_from(cache: &AdaptiveCache, store: &dyn PatternStore) {
    match store.load().await {
        Ok(Some(patterns)) => {
            let total = patterns.len();
            let restored = cache.restore_patterns(patterns);
            info!(total, restored, "Restored access patterns");
        }
        Ok(None) => debug!("No persisted access patterns"),
        Err(e) => warn!(error = %e, "Failed to load access patterns, starting empty"),
    }
}

async fn save_to(cache: &AdaptiveCache, store: &dyn PatternStore) {
    let patterns = cache.patterns_snapshot();
    match store.save(&patterns).await {
        Ok(()) => info!(patterns = patterns.len(), "Saved access patterns"),
        Err(e) => warn!(error = %e, "Failed to save access patterns"),
    }
}

struct ExpiryScheduler {
    cache: Arc<AdaptiveCache>,
    store: Option<Arc<dyn PatternStore>>,
    cleanup_interval: Duration,
    persist_interval: Duration,
}

impl ExpiryScheduler {
    #[instrument(skip_all)]
    async fn run(self, token: CancellationToken) {
        info!(
            cleanup_interval = ?self.cleanup_interval,
            persist_interval = ?self.persist_interval,
            "Starting expiry scheduler"
        );

        let mut cleanup = interval(self.cleanup_interval);
        cleanup.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut persist = interval(self.persist_interval);
        persist.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // The first tick of an interval completes immediately
        cleanup.tick().await;
        persist.tick().await;

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("Expiry scheduler shutting down");
                    break;
                }

                _ = cleanup.tick() => {
                    let removed = self.cache.cleanup_expired();
                    debug!(removed, "Expiry sweep");
                }

                _ = persist.tick() => {
                    if let Some(store) = &self.store {
                        save_to(&self.cache, store.as_ref()).await;
                    }
                }
            }
        }

        if let Some(store) = &self.store {
            save_to(&self.cache, store.as_ref()).await;
        }
    }
}

/// Handle to a started cache.
///
/// Dropping the handle without `shutdown` leaves the scheduler running
/// until the runtime stops.
pub struct CacheHandle {
    cache: Arc<AdaptiveCache>,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl CacheHandle {
    pub fn cache(&self) -> &Arc<AdaptiveCache> {
        &self.cache
    }

    /// Stop the scheduler, flush patterns and wait for the task to finish
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "Expiry scheduler task failed");
        }
    }
}

impl std::fmt::Debug for CacheHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheHandle")
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}
