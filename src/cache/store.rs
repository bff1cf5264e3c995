//! Scope cache - one entry per live request scope.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{CacheConfig, RequestScope, ScopeCacheEntry};
use crate::remote::LiveEventSet;

/// Cache of fetched flags and live events keyed by request scope.
///
/// Hits only take the read lock. Fetches happen with no lock held, and
/// the write lock is taken just to insert or sweep. Two first accesses
/// racing on the same scope both fetch; the last insert wins.
pub struct ScopeCache<S: RequestScope> {
    entries: RwLock<HashMap<S, Arc<ScopeCacheEntry>>>,
    config: CacheConfig,
}

impl<S: RequestScope> ScopeCache<S> {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Get the entry for `scope`, building it with `load` on a miss.
    ///
    /// When caching is disabled `load` runs every time and nothing is kept.
    /// Errors from `load` are returned as-is and leave the cache unchanged.
    pub async fn get_or_create<F, Fut, E>(
        &self,
        scope: &S,
        load: F,
    ) -> Result<Arc<ScopeCacheEntry>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ScopeCacheEntry, E>>,
    {
        if !self.config.enabled {
            return load().await.map(Arc::new);
        }

        if let Some(entry) = self.get(scope) {
            debug!("Scope cache hit");
            return Ok(entry);
        }

        debug!("Scope cache miss");
        let entry = Arc::new(load().await?);
        self.entries.write().insert(scope.clone(), Arc::clone(&entry));
        Ok(entry)
    }

    /// Fill the entry's live events with `fetch` unless already present.
    ///
    /// Safe to call repeatedly; once set, `fetch` is never invoked.
    pub async fn ensure_live_events<F, Fut, E>(
        &self,
        entry: &ScopeCacheEntry,
        fetch: F,
    ) -> Result<(), E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<LiveEventSet, E>>,
    {
        if entry.has_live_events() {
            return Ok(());
        }

        let events = fetch().await?;
        if entry.publish_live_events(events) {
            debug!("Filled live events for cached scope");
        }
        Ok(())
    }

    /// Look up a scope's entry without fetching.
    pub fn get(&self, scope: &S) -> Option<Arc<ScopeCacheEntry>> {
        self.entries.read().get(scope).cloned()
    }

    /// Drop every entry whose scope has ended. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|scope, _| scope.is_active());
        before - entries.len()
    }

    /// Get the number of cached scopes.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Start the background sweep.
    ///
    /// The task runs every `sweep_interval` until `shutdown` is cancelled
    /// or the cache itself is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let cache = Arc::downgrade(self);
        let period = self.config.sweep_interval.max(Duration::from_millis(1));

        tokio::spawn(async move {
            info!(interval = ?period, "Scope cache sweeper started");

            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(cache) = cache.upgrade() else { break };
                        let removed = cache.sweep();
                        if removed > 0 {
                            debug!(removed, remaining = cache.len(), "Swept ended scopes");
                        }
                    }
                }
            }

            info!("Scope cache sweeper stopped");
        })
    }
}

impl<S: RequestScope> std::fmt::Debug for ScopeCache<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeCache")
            .field("enabled", &self.config.enabled)
            .field("entry_count", &self.len())
            .finish()
    }
}
