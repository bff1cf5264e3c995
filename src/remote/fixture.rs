//! In-memory remote source.
//!
//! Serves flags and live events from a fixed table. Useful for local
//! runs, and for tests through its call counters and failure injection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::Deserialize;

use super::{FlagRecord, FlagSet, LiveEventRecord, LiveEventSet, RemoteError, RemoteSource};
use crate::cache::RequestScope;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserData {
    #[serde(default)]
    flags: Vec<FlagRecord>,
    #[serde(default)]
    live_events: Vec<LiveEventRecord>,
}

/// A failure every call of one kind returns.
#[derive(Debug, Clone)]
enum Injected {
    Transport(String),
    NotFound,
}

impl Injected {
    fn to_error(&self, user_id: &str) -> RemoteError {
        match self {
            Self::Transport(message) => RemoteError::Transport(anyhow::anyhow!(message.clone())),
            Self::NotFound => RemoteError::from_status(404, format!("user {user_id} not found")),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct Fixture {
    #[serde(default)]
    users: HashMap<String, UserData>,
}

/// A [`RemoteSource`] answering from memory.
#[derive(Debug, Default)]
pub struct StaticSource {
    users: HashMap<String, UserData>,
    flag_failure: Option<Injected>,
    live_event_failure: Option<Injected>,
    flag_calls: AtomicUsize,
    live_event_calls: AtomicUsize,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load users from a JSON document of the form
    /// `{"users": {"<id>": {"flags": [...], "liveEvents": [...]}}}`.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let fixture: Fixture = serde_json::from_str(json)?;
        Ok(Self {
            users: fixture.users,
            ..Default::default()
        })
    }

    /// Register a user with their flags and live events.
    #[must_use]
    pub fn with_user(
        mut self,
        user_id: impl Into<String>,
        flags: FlagSet,
        live_events: LiveEventSet,
    ) -> Self {
        self.users
            .insert(user_id.into(), UserData { flags, live_events });
        self
    }

    /// Make every flag fetch fail with a transport error.
    #[must_use]
    pub fn fail_flags(mut self, message: impl Into<String>) -> Self {
        self.flag_failure = Some(Injected::Transport(message.into()));
        self
    }

    /// Make every flag fetch answer that the user is not found.
    #[must_use]
    pub fn fail_flags_not_found(mut self) -> Self {
        self.flag_failure = Some(Injected::NotFound);
        self
    }

    /// Make every live-event fetch fail with a transport error.
    #[must_use]
    pub fn fail_live_events(mut self, message: impl Into<String>) -> Self {
        self.live_event_failure = Some(Injected::Transport(message.into()));
        self
    }

    /// Make every live-event fetch answer that the user is not found.
    #[must_use]
    pub fn fail_live_events_not_found(mut self) -> Self {
        self.live_event_failure = Some(Injected::NotFound);
        self
    }

    /// Number of `list_flags` calls served so far.
    pub fn flag_calls(&self) -> usize {
        self.flag_calls.load(Ordering::SeqCst)
    }

    /// Number of `list_live_events` calls served so far.
    pub fn live_event_calls(&self) -> usize {
        self.live_event_calls.load(Ordering::SeqCst)
    }

    fn user(&self, user_id: &str) -> Result<&UserData, RemoteError> {
        self.users.get(user_id).ok_or_else(|| RemoteError::NotFound {
            message: format!("user {user_id} not found"),
        })
    }
}

#[async_trait]
impl<S: RequestScope> RemoteSource<S> for StaticSource {
    async fn list_flags(
        &self,
        _scope: &S,
        user_id: &str,
        names: &[&str],
    ) -> Result<FlagSet, RemoteError> {
        self.flag_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = &self.flag_failure {
            return Err(failure.to_error(user_id));
        }

        let user = self.user(user_id)?;
        Ok(user
            .flags
            .iter()
            .filter(|flag| names.contains(&flag.name.as_str()))
            .cloned()
            .collect())
    }

    async fn list_live_events(
        &self,
        _scope: &S,
        user_id: &str,
    ) -> Result<LiveEventSet, RemoteError> {
        self.live_event_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = &self.live_event_failure {
            return Err(failure.to_error(user_id));
        }

        Ok(self.user(user_id)?.live_events.clone())
    }
}
