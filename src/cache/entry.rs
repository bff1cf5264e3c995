//! Per-scope cached record.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::remote::{FlagRecord, FlagSet, LiveEventSet};

/// State of the lazily filled live-event slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveEventState {
    Unset,
    Set(LiveEventSet),
}

impl LiveEventState {
    pub fn as_set(&self) -> Option<&LiveEventSet> {
        match self {
            Self::Unset => None,
            Self::Set(events) => Some(events),
        }
    }

    pub fn is_set(&self) -> bool {
        matches!(self, Self::Set(_))
    }
}

/// Flags and live events fetched once for a scope.
///
/// `flags` never changes after construction. The live-event slot moves
/// from `Unset` to `Set` at most once, published atomically so readers
/// see either nothing or the complete list.
#[derive(Debug)]
pub struct ScopeCacheEntry {
    flags: FlagSet,
    live_events: ArcSwap<LiveEventState>,
}

impl ScopeCacheEntry {
    pub fn new(flags: FlagSet, live_events: Option<LiveEventSet>) -> Self {
        let state = match live_events {
            Some(events) => LiveEventState::Set(events),
            None => LiveEventState::Unset,
        };
        Self {
            flags,
            live_events: ArcSwap::from_pointee(state),
        }
    }

    pub fn flags(&self) -> &[FlagRecord] {
        &self.flags
    }

    /// Snapshot of the live-event slot.
    pub fn live_events(&self) -> Arc<LiveEventState> {
        self.live_events.load_full()
    }

    pub fn has_live_events(&self) -> bool {
        self.live_events.load().is_set()
    }

    /// Fill the live-event slot if it is still unset.
    ///
    /// Returns `false` when another caller already filled it, in which
    /// case `events` is dropped and the existing list is kept.
    pub fn publish_live_events(&self, events: LiveEventSet) -> bool {
        let current = self.live_events.load_full();
        if current.is_set() {
            return false;
        }
        let previous = self
            .live_events
            .compare_and_swap(&current, Arc::new(LiveEventState::Set(events)));
        Arc::ptr_eq(&*previous, &current)
    }
}
