//! Remote flag and live-event source.
//!
//! The personalizer never talks to the flag service directly; it goes
//! through [`RemoteSource`], so transport, auth and retries stay with
//! whoever implements it.

mod fixture;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::RequestScope;

pub use fixture::StaticSource;

/// A named flag with a JSON-encoded value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagRecord {
    pub name: String,
    pub value: String,
}

impl FlagRecord {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A live event payload. Live events are shared across consumers and
/// may target a schema other than the one being personalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveEventRecord {
    pub value: String,
}

impl LiveEventRecord {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

/// Flags returned by one fetch, in fetch order, unique by name.
pub type FlagSet = Vec<FlagRecord>;

/// Live events returned by one fetch, in fetch order.
pub type LiveEventSet = Vec<LiveEventRecord>;

/// Failure reported by a [`RemoteSource`].
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The user is unknown to the remote service.
    #[error("subject not found: {message}")]
    NotFound { message: String },

    /// Any other failure (network, auth, decoding, timeouts).
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

impl RemoteError {
    /// Map an HTTP-style status to an error. 404 means the user does not exist.
    pub fn from_status(code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        if code == 404 {
            Self::NotFound { message }
        } else {
            Self::Transport(anyhow::anyhow!("{code} status code: {message}"))
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// The remote flag and live-event service.
///
/// Implementations should honour the scope's cancellation for their own
/// timeouts; the personalizer does not retry.
#[async_trait]
pub trait RemoteSource<S: RequestScope>: Send + Sync {
    /// List the flags with the given names for a user.
    async fn list_flags(
        &self,
        scope: &S,
        user_id: &str,
        names: &[&str],
    ) -> Result<FlagSet, RemoteError>;

    /// List every live event currently active for a user.
    async fn list_live_events(&self, scope: &S, user_id: &str)
    -> Result<LiveEventSet, RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_maps_404_to_not_found() {
        let err = RemoteError::from_status(404, "user missing");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "subject not found: user missing");
    }

    #[test]
    fn test_from_status_other_codes_are_transport() {
        let err = RemoteError::from_status(503, "unavailable");
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("503 status code"));
    }
}
