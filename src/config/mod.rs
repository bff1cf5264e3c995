//! Configuration module for the personalizer.
//!
//! Built in code with the builder methods, or loaded from environment
//! variables.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::cache::CacheConfig;

/// Domains whose analytics events may be published to the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PublishCategory {
    Authenticate,
    Achievements,
    Base,
    Economy,
    Energy,
    EventLeaderboards,
    Incentives,
    Inventory,
    Leaderboards,
    Progression,
    Stats,
    Teams,
    Tutorials,
    Unlockables,
}

const CATEGORY_COUNT: usize = 14;

impl PublishCategory {
    pub const ALL: [PublishCategory; CATEGORY_COUNT] = [
        Self::Authenticate,
        Self::Achievements,
        Self::Base,
        Self::Economy,
        Self::Energy,
        Self::EventLeaderboards,
        Self::Incentives,
        Self::Inventory,
        Self::Leaderboards,
        Self::Progression,
        Self::Stats,
        Self::Teams,
        Self::Tutorials,
        Self::Unlockables,
    ];

    /// Name used in `PERSONALIZER_PUBLISH_EVENTS`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Authenticate => "authenticate",
            Self::Achievements => "achievements",
            Self::Base => "base",
            Self::Economy => "economy",
            Self::Energy => "energy",
            Self::EventLeaderboards => "event_leaderboards",
            Self::Incentives => "incentives",
            Self::Inventory => "inventory",
            Self::Leaderboards => "leaderboards",
            Self::Progression => "progression",
            Self::Stats => "stats",
            Self::Teams => "teams",
            Self::Tutorials => "tutorials",
            Self::Unlockables => "unlockables",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for PublishCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PublishCategory {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == normalized)
            .ok_or_else(|| ConfigError::UnknownCategory(s.trim().to_string()))
    }
}

/// One independent on/off switch per [`PublishCategory`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishSettings {
    enabled: [bool; CATEGORY_COUNT],
}

impl PublishSettings {
    pub fn is_enabled(&self, category: PublishCategory) -> bool {
        self.enabled[category.index()]
    }

    pub fn set(&mut self, category: PublishCategory, enabled: bool) {
        self.enabled[category.index()] = enabled;
    }

    /// Categories currently switched on.
    pub fn enabled_categories(&self) -> Vec<PublishCategory> {
        PublishCategory::ALL
            .into_iter()
            .filter(|category| self.is_enabled(*category))
            .collect()
    }
}

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },

    #[error("unknown publish category: {0}")]
    UnknownCategory(String),
}

/// Personalizer configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonalizerConfig {
    pub cache: CacheConfig,
    pub publish: PublishSettings,
}

impl PersonalizerConfig {
    /// Publish events for `category` (builder pattern).
    #[must_use]
    pub fn publish(mut self, category: PublishCategory) -> Self {
        self.publish.set(category, true);
        self
    }

    /// Publish events for every category.
    #[must_use]
    pub fn publish_all(mut self) -> Self {
        for category in PublishCategory::ALL {
            self.publish.set(category, true);
        }
        self
    }

    /// Fetch fresh data on every lookup instead of caching per scope.
    #[must_use]
    pub fn no_cache(mut self) -> Self {
        self.cache.enabled = false;
        self
    }

    /// Set how often ended scopes are swept from the cache.
    #[must_use]
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.cache.sweep_interval = interval;
        self
    }

    /// Load configuration from environment variables (and `.env`).
    ///
    /// - `PERSONALIZER_NO_CACHE` - `true` to disable the scope cache
    /// - `PERSONALIZER_SWEEP_INTERVAL_SECS` - sweep interval, default 30
    /// - `PERSONALIZER_PUBLISH_EVENTS` - comma-separated categories, or `all`
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = lookup("PERSONALIZER_NO_CACHE") {
            config.cache.enabled = !parse_bool("PERSONALIZER_NO_CACHE", &value)?;
        }

        if let Some(value) = lookup("PERSONALIZER_SWEEP_INTERVAL_SECS") {
            let secs = value
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::InvalidValue {
                    key: "PERSONALIZER_SWEEP_INTERVAL_SECS",
                    value: value.clone(),
                })?;
            config.cache.sweep_interval = Duration::from_secs(secs);
        }

        if let Some(value) = lookup("PERSONALIZER_PUBLISH_EVENTS") {
            if value.trim().eq_ignore_ascii_case("all") {
                config = config.publish_all();
            } else {
                for name in value.split(',').filter(|s| !s.trim().is_empty()) {
                    config = config.publish(name.parse()?);
                }
            }
        }

        Ok(config)
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<PersonalizerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        PersonalizerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert!(config.cache.enabled);
        assert_eq!(config.cache.sweep_interval, Duration::from_secs(30));
        assert!(config.publish.enabled_categories().is_empty());
    }

    #[test]
    fn test_parse_env_values() {
        let config = load(&[
            ("PERSONALIZER_NO_CACHE", "true"),
            ("PERSONALIZER_SWEEP_INTERVAL_SECS", "10"),
            ("PERSONALIZER_PUBLISH_EVENTS", "economy, event-leaderboards"),
        ])
        .unwrap();

        assert!(!config.cache.enabled);
        assert_eq!(config.cache.sweep_interval, Duration::from_secs(10));
        assert_eq!(
            config.publish.enabled_categories(),
            vec![PublishCategory::Economy, PublishCategory::EventLeaderboards]
        );
    }

    #[test]
    fn test_publish_all() {
        let config = load(&[("PERSONALIZER_PUBLISH_EVENTS", "ALL")]).unwrap();
        assert_eq!(config.publish.enabled_categories().len(), 14);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert_eq!(
            load(&[("PERSONALIZER_SWEEP_INTERVAL_SECS", "0")]),
            Err(ConfigError::InvalidValue {
                key: "PERSONALIZER_SWEEP_INTERVAL_SECS",
                value: "0".into(),
            })
        );
        assert_eq!(
            load(&[("PERSONALIZER_PUBLISH_EVENTS", "economy,auctions")]),
            Err(ConfigError::UnknownCategory("auctions".into()))
        );
        assert!(load(&[("PERSONALIZER_NO_CACHE", "maybe")]).is_err());
    }

    #[test]
    fn test_toggles_are_independent() {
        let config = PersonalizerConfig::default()
            .publish(PublishCategory::Teams)
            .no_cache();

        assert!(config.publish.is_enabled(PublishCategory::Teams));
        assert!(!config.publish.is_enabled(PublishCategory::Stats));
        assert!(!config.cache.enabled);
    }

    #[test]
    fn test_category_round_trips_through_name() {
        for category in PublishCategory::ALL {
            assert_eq!(category.as_str().parse::<PublishCategory>(), Ok(category));
        }
    }
}
