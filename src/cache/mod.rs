//! Cache module - per-request-scope caching of remote personalization data.
//!
//! Each active request scope gets at most one entry holding the flags
//! and (lazily) the live events fetched for it, so a request that asks
//! for several systems only pays for one round trip.
//!
//! ## Architecture
//!
//! - `RequestScope` - Liveness capability entries are keyed by
//! - `ScopeCacheEntry` - Immutable flags plus a write-once live-event slot
//! - `ScopeCache` - Read/write locked map with a background sweeper that
//!   drops entries once their scope has ended
//!
//! ## Usage
//!
//! ```ignore
//! let cache = Arc::new(ScopeCache::new(CacheConfig::default()));
//! let sweeper = cache.spawn_sweeper(shutdown.clone());
//!
//! let entry = cache.get_or_create(&scope, || fetch_everything()).await?;
//! ```

mod config;
mod entry;
mod scope;
mod store;

pub use config::{CacheConfig, DEFAULT_SWEEP_INTERVAL};
pub use entry::{LiveEventState, ScopeCacheEntry};
pub use scope::{RequestScope, ScopeHandle};
pub use store::ScopeCache;
