//! Errors surfaced to callers of the personalizer.

use thiserror::Error;

use crate::merge::MergeError;
use crate::remote::RemoteError;
use crate::system::SystemType;

/// Hard failures of a personalization lookup.
///
/// A user unknown to the remote service is not an error; it yields "no
/// change" instead. A live event that does not fit the config is skipped.
#[derive(Debug, Error)]
pub enum PersonalizerError {
    #[error("hiro system type unknown: {0}")]
    UnknownSystem(SystemType),

    #[error("error requesting personalization data: {0}")]
    Remote(#[from] RemoteError),

    #[error("error merging flag value: {0}")]
    Merge(#[from] MergeError),
}

impl PersonalizerError {
    /// Whether this wraps a schema or JSON problem in the primary flag payload.
    pub fn is_merge(&self) -> bool {
        matches!(self, Self::Merge(_))
    }
}
