//! Satori personalizer - per-request config personalization.
//!
//! Given a user and a game system, fetches the user's remote feature
//! flags and live events and merges the matching ones onto the system's
//! default config.
//!
//! ## Architecture
//!
//! - `cache` - Per-request-scope cache with background sweeping
//! - `config` - Cache and event-publishing switches, env loading
//! - `merge` - Strict JSON merge onto typed configs
//! - `personalizer` - Lookup orchestration
//! - `remote` - Remote flag/live-event source contract
//! - `system` - System types and their flag names
//! - `telemetry` - Tracing subscriber setup
//!
//! ## Usage
//!
//! ```ignore
//! let personalizer = SatoriPersonalizer::new(remote, PersonalizerConfig::from_env()?, shutdown);
//!
//! let scope = ScopeHandle::new();
//! let config = personalizer
//!     .get_value(&scope, &economy_system, &user_id)
//!     .await?
//!     .unwrap_or_else(|| economy_system.default_config());
//! scope.finish();
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod merge;
pub mod personalizer;
pub mod remote;
pub mod system;
pub mod telemetry;

pub use cache::{CacheConfig, RequestScope, ScopeCache, ScopeHandle};
pub use config::{ConfigError, PersonalizerConfig, PublishCategory, PublishSettings};
pub use error::PersonalizerError;
pub use personalizer::{Personalizer, PublishPolicy, SatoriPersonalizer};
pub use remote::{FlagRecord, LiveEventRecord, RemoteError, RemoteSource, StaticSource};
pub use system::{ConfiguredSystem, System, SystemConfig, SystemType};
