//! Request scopes - the lifetime a cache entry is tied to.

use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;

/// Liveness capability of one logical request.
///
/// The cache keys entries by the scope's identity and only ever asks
/// whether it is still running. It never creates or ends scopes itself.
pub trait RequestScope: Hash + Eq + Clone + Send + Sync + 'static {
    /// Returns `false` once the request this scope represents has ended.
    fn is_active(&self) -> bool;
}

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

/// A cloneable request scope backed by a cancellation token.
///
/// Clones share identity and liveness, so a handle can be passed down
/// through a request and finished from anywhere.
#[derive(Clone, Debug)]
pub struct ScopeHandle {
    inner: Arc<ScopeInner>,
}

#[derive(Debug)]
struct ScopeInner {
    id: u64,
    token: CancellationToken,
}

impl ScopeHandle {
    /// Start a new independent scope.
    pub fn new() -> Self {
        Self::with_token(CancellationToken::new())
    }

    /// Start a scope that also ends when `parent` is cancelled,
    /// e.g. the connection or server the request belongs to.
    pub fn child_of(parent: &CancellationToken) -> Self {
        Self::with_token(parent.child_token())
    }

    fn with_token(token: CancellationToken) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
                token,
            }),
        }
    }

    /// Process-unique identity of this scope.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// End the scope. Idempotent.
    pub fn finish(&self) {
        self.inner.token.cancel();
    }

    /// Token that fires when the scope ends, for remote calls that
    /// should be abandoned with the request.
    pub fn token(&self) -> &CancellationToken {
        &self.inner.token
    }
}

impl Default for ScopeHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for ScopeHandle {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for ScopeHandle {}

impl Hash for ScopeHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl RequestScope for ScopeHandle {
    fn is_active(&self) -> bool {
        !self.inner.token.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_identity_and_liveness() {
        let scope = ScopeHandle::new();
        let clone = scope.clone();

        assert_eq!(scope, clone);
        assert!(clone.is_active());

        scope.finish();
        assert!(!clone.is_active());
    }

    #[test]
    fn test_distinct_scopes_differ() {
        let a = ScopeHandle::new();
        let b = ScopeHandle::new();
        assert_ne!(a, b);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_child_ends_with_parent() {
        let server = CancellationToken::new();
        let scope = ScopeHandle::child_of(&server);
        assert!(scope.is_active());

        server.cancel();
        assert!(!scope.is_active());
    }

    #[test]
    fn test_finish_is_idempotent() {
        let scope = ScopeHandle::new();
        scope.finish();
        scope.finish();
        assert!(!scope.is_active());
    }
}
