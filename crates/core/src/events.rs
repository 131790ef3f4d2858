//! Notification hooks fired by the sync engine.
//!
//! Callers that want progress reporting implement [`SyncEvents`]; every
//! method has a no-op default. Hooks fire once per affected set, in
//! processing order.

use crate::conflict::ConflictSummary;
use crate::model::TranslationSet;

/// Listener for sync progress and conflict notifications.
pub trait SyncEvents: Send + Sync {
    /// A push operation starts with this many pushable sets.
    fn on_push_started(&self, _total_pushable: usize) {}

    /// A set was rejected by the filter during enumeration.
    fn on_skipped(&self, _set: &TranslationSet) {}

    /// A set was dispatched and its tracked snapshot persisted.
    fn on_handled(&self, _set: &TranslationSet) {}

    /// Conflicting lines were found on a set during pull.
    fn on_conflict(&self, _set: &TranslationSet, _summary: &ConflictSummary) {}
}

/// Listener that ignores every event.
#[derive(Debug, Default)]
pub struct NoopEvents;

impl SyncEvents for NoopEvents {}
