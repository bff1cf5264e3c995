//! Personalizer - resolves a user's config for a system from remote flags
//! and live events.
//!
//! ## Flow
//!
//! 1. Map the system to its flag name
//! 2. Get the scope's cached flags (or fetch them; all flags at once when
//!    caching, only the one needed when not)
//! 3. For live-event systems, make sure live events are loaded too
//! 4. Merge the flag strictly, then every live event the entry holds that
//!    fits, onto a fresh default config
//!
//! `Ok(None)` means nothing applies to this user and the caller should
//! keep its default config.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::cache::{RequestScope, ScopeCache, ScopeCacheEntry};
use crate::config::{PersonalizerConfig, PublishCategory};
use crate::error::PersonalizerError;
use crate::merge;
use crate::remote::{FlagSet, LiveEventSet, RemoteError, RemoteSource};
use crate::system::{ALL_FLAG_NAMES, System};

/// Source of per-user config overrides.
#[async_trait]
pub trait Personalizer<S: RequestScope>: Send + Sync {
    /// Personalized config for `system`, or `None` to keep the default.
    async fn get_value<Sys: System>(
        &self,
        scope: &S,
        system: &Sys,
        user_id: &str,
    ) -> Result<Option<Sys::Config>, PersonalizerError>;
}

/// Which analytics events should be published to the remote service.
///
/// Read by event publishers; the personalization lookup ignores it.
pub trait PublishPolicy {
    fn is_publish(&self, category: PublishCategory) -> bool;

    fn is_publish_authenticate_request(&self) -> bool {
        self.is_publish(PublishCategory::Authenticate)
    }

    fn is_publish_achievements_events(&self) -> bool {
        self.is_publish(PublishCategory::Achievements)
    }

    fn is_publish_base_events(&self) -> bool {
        self.is_publish(PublishCategory::Base)
    }

    fn is_publish_economy_events(&self) -> bool {
        self.is_publish(PublishCategory::Economy)
    }

    fn is_publish_energy_events(&self) -> bool {
        self.is_publish(PublishCategory::Energy)
    }

    fn is_publish_event_leaderboards_events(&self) -> bool {
        self.is_publish(PublishCategory::EventLeaderboards)
    }

    fn is_publish_incentives_events(&self) -> bool {
        self.is_publish(PublishCategory::Incentives)
    }

    fn is_publish_inventory_events(&self) -> bool {
        self.is_publish(PublishCategory::Inventory)
    }

    fn is_publish_leaderboards_events(&self) -> bool {
        self.is_publish(PublishCategory::Leaderboards)
    }

    fn is_publish_progression_events(&self) -> bool {
        self.is_publish(PublishCategory::Progression)
    }

    fn is_publish_stats_events(&self) -> bool {
        self.is_publish(PublishCategory::Stats)
    }

    fn is_publish_teams_events(&self) -> bool {
        self.is_publish(PublishCategory::Teams)
    }

    fn is_publish_tutorials_events(&self) -> bool {
        self.is_publish(PublishCategory::Tutorials)
    }

    fn is_publish_unlockables_events(&self) -> bool {
        self.is_publish(PublishCategory::Unlockables)
    }
}

/// Personalizer backed by a remote flag and live-event service.
pub struct SatoriPersonalizer<S: RequestScope, R> {
    remote: Arc<R>,
    config: PersonalizerConfig,
    cache: Arc<ScopeCache<S>>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl<S, R> SatoriPersonalizer<S, R>
where
    S: RequestScope,
    R: RemoteSource<S> + 'static,
{
    /// Create a personalizer.
    ///
    /// With caching enabled this starts the cache sweeper, so it must be
    /// called from within a Tokio runtime. The sweeper stops once
    /// `shutdown` is cancelled.
    pub fn new(remote: Arc<R>, config: PersonalizerConfig, shutdown: CancellationToken) -> Self {
        let cache = Arc::new(ScopeCache::new(config.cache.clone()));
        let sweeper = cache
            .is_enabled()
            .then(|| cache.spawn_sweeper(shutdown));

        Self {
            remote,
            config,
            cache,
            sweeper: Mutex::new(sweeper),
        }
    }

    pub fn config(&self) -> &PersonalizerConfig {
        &self.config
    }

    pub fn cache(&self) -> &ScopeCache<S> {
        &self.cache
    }

    /// Wait for the sweeper to exit after the shutdown token fired.
    pub async fn shutdown_sweeper(&self) {
        let handle = self.sweeper.lock().take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            warn!(error = %e, "Scope cache sweeper ended abnormally");
        }
    }

    async fn fetch_flags(
        &self,
        scope: &S,
        user_id: &str,
        names: &[&str],
    ) -> Result<FlagSet, RemoteError> {
        let result = self.remote.list_flags(scope, user_id, names).await;
        if let Err(e) = &result {
            log_remote_failure("flag list", user_id, e);
        }
        result
    }

    async fn fetch_live_events(&self, scope: &S, user_id: &str) -> Result<LiveEventSet, RemoteError> {
        let result = self.remote.list_live_events(scope, user_id).await;
        if let Err(e) = &result {
            log_remote_failure("live events list", user_id, e);
        }
        result
    }

    /// Flags and (if needed) live events for this lookup, or `None` when
    /// the remote service does not know the user.
    async fn load_entry(
        &self,
        scope: &S,
        user_id: &str,
        flag_name: &'static str,
        needs_live_events: bool,
    ) -> Result<Option<Arc<ScopeCacheEntry>>, PersonalizerError> {
        // A cached entry serves every system the scope asks about, so fetch
        // all flags up front. Uncached lookups only need their own flag.
        let single = [flag_name];
        let names: &[&str] = if self.cache.is_enabled() {
            &ALL_FLAG_NAMES
        } else {
            &single
        };

        let loaded = self
            .cache
            .get_or_create(scope, || async move {
                let flags = self.fetch_flags(scope, user_id, names).await?;
                let live_events = if needs_live_events {
                    Some(self.fetch_live_events(scope, user_id).await?)
                } else {
                    None
                };
                Ok::<_, RemoteError>(ScopeCacheEntry::new(flags, live_events))
            })
            .await;

        let entry = match loaded {
            Ok(entry) => entry,
            Err(e) => return soften(e),
        };

        if needs_live_events {
            let filled = self
                .cache
                .ensure_live_events(&entry, || self.fetch_live_events(scope, user_id))
                .await;
            if let Err(e) = filled {
                return soften(e);
            }
        }

        Ok(Some(entry))
    }
}

#[async_trait]
impl<S, R> Personalizer<S> for SatoriPersonalizer<S, R>
where
    S: RequestScope,
    R: RemoteSource<S> + 'static,
{
    async fn get_value<Sys: System>(
        &self,
        scope: &S,
        system: &Sys,
        user_id: &str,
    ) -> Result<Option<Sys::Config>, PersonalizerError> {
        let system_type = system.system_type();
        let Some(flag_name) = system_type.flag_name() else {
            return Err(PersonalizerError::UnknownSystem(system_type));
        };
        let needs_live_events = system_type.requires_live_events();

        let Some(entry) = self
            .load_entry(scope, user_id, flag_name, needs_live_events)
            .await?
        else {
            return Ok(None);
        };

        let config = personalize(system, flag_name, &entry).map_err(|e| {
            error!(user_id, flag = flag_name, error = %e, "Error merging flag value");
            e
        })?;

        if config.is_none() {
            debug!(user_id, system = %system_type, "No personalization applies");
        }
        Ok(config)
    }
}

impl<S: RequestScope, R> PublishPolicy for SatoriPersonalizer<S, R> {
    fn is_publish(&self, category: PublishCategory) -> bool {
        self.config.publish.is_enabled(category)
    }
}

/// Merge the matching flag, then any fitting live events, onto a default
/// config. The default is only built once there is something to apply.
///
/// Live events already held by a scope's entry apply to every system,
/// including ones that never fetch them.
fn personalize<Sys: System>(
    system: &Sys,
    flag_name: &str,
    entry: &ScopeCacheEntry,
) -> Result<Option<Sys::Config>, PersonalizerError> {
    let mut config = None;
    let mut found = false;

    for flag in entry.flags().iter().filter(|flag| flag.name == flag_name) {
        let target = config.get_or_insert_with(|| system.default_config());
        merge::apply_strict(target, &flag.value)?;
        found = true;
    }

    let state = entry.live_events();
    if let Some(events) = state.as_set().filter(|events| !events.is_empty()) {
        let target = config.get_or_insert_with(|| system.default_config());
        for event in events {
            // Live events are shared with other consumers; ones that do
            // not fit this config are skipped.
            if merge::apply_lenient(target, &event.value) {
                found = true;
            }
        }
    }

    Ok(if found { config } else { None })
}

/// A user unknown to the remote service means nothing to personalize.
fn soften<T>(e: RemoteError) -> Result<Option<T>, PersonalizerError> {
    if e.is_not_found() {
        Ok(None)
    } else {
        Err(e.into())
    }
}

fn log_remote_failure(what: &str, user_id: &str, e: &RemoteError) {
    if e.is_not_found() {
        warn!(user_id, error = %e, "Error requesting {what}, user not found");
    } else {
        error!(user_id, error = %e, "Error requesting {what}");
    }
}
