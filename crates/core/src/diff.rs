//! Three-way diff engine for translation sets.
//!
//! A [`Differ`] is constructed from three line collections sharing one
//! logical key space:
//!
//! - `tracked`: the last value confirmed synced with the remote,
//! - `current`: the value as it exists locally right now,
//! - `incoming`: the value as newly reported by the remote.
//!
//! Every accessor is pure and memoized per instance: the three inputs never
//! change after construction, so each derived collection is computed once on
//! first access and cached in a [`OnceCell`] field. Order of calls does not
//! affect any observable result.

use std::cell::OnceCell;

use crate::model::LineCollection;

// ---------------------------------------------------------------------------
// Primitive set operations
// ---------------------------------------------------------------------------
//
// All primitives compare by key and normalized scalar value, never metadata.
// The comparison is an explicit per-key equality check: values that were
// normalized to null from an originally-empty-array representation must
// compare as plain nulls, which a library associative-diff over raw payloads
// would get wrong.

/// Entries in `target` whose value differs from `source`'s entry for the
/// same key. Missing in `source` counts as differing.
fn differs_from_source(target: &LineCollection, source: &LineCollection) -> LineCollection {
    target
        .iter()
        .filter(|line| match source.get(&line.key) {
            Some(existing) => existing.value != line.value,
            None => true,
        })
        .cloned()
        .collect()
}

/// Entries in `source` whose value equals `target`'s entry for the same key.
/// Missing in `target` excludes the entry.
fn same_as(source: &LineCollection, target: &LineCollection) -> LineCollection {
    source
        .iter()
        .filter(|line| {
            target
                .get(&line.key)
                .is_some_and(|existing| existing.value == line.value)
        })
        .cloned()
        .collect()
}

/// Entries present in `source`, absent in `target`, by key only.
fn missing_in(source: &LineCollection, target: &LineCollection) -> LineCollection {
    source
        .iter()
        .filter(|line| !target.contains_key(&line.key))
        .cloned()
        .collect()
}

/// Entries in `source` whose key also exists in `target`.
fn exists_in(source: &LineCollection, target: &LineCollection) -> LineCollection {
    source
        .iter()
        .filter(|line| target.contains_key(&line.key))
        .cloned()
        .collect()
}

// ---------------------------------------------------------------------------
// Differ
// ---------------------------------------------------------------------------

/// Memoized three-way diff over `(tracked, current, incoming)`.
pub struct Differ {
    tracked: LineCollection,
    current: LineCollection,
    incoming: LineCollection,

    changed: OnceCell<LineCollection>,
    added: OnceCell<LineCollection>,
    updated: OnceCell<LineCollection>,
    same: OnceCell<LineCollection>,
    removed: OnceCell<LineCollection>,
    conflicting: OnceCell<LineCollection>,
    non_conflicting: OnceCell<LineCollection>,
    safe: OnceCell<LineCollection>,
    mergeable: OnceCell<LineCollection>,
    favor_current: OnceCell<LineCollection>,
    favor_incoming: OnceCell<LineCollection>,
}

impl Differ {
    pub fn new(tracked: LineCollection, current: LineCollection, incoming: LineCollection) -> Self {
        Self {
            tracked,
            current,
            incoming,
            changed: OnceCell::new(),
            added: OnceCell::new(),
            updated: OnceCell::new(),
            same: OnceCell::new(),
            removed: OnceCell::new(),
            conflicting: OnceCell::new(),
            non_conflicting: OnceCell::new(),
            safe: OnceCell::new(),
            mergeable: OnceCell::new(),
            favor_current: OnceCell::new(),
            favor_incoming: OnceCell::new(),
        }
    }

    pub fn tracked(&self) -> &LineCollection {
        &self.tracked
    }

    pub fn current(&self) -> &LineCollection {
        &self.current
    }

    pub fn incoming(&self) -> &LineCollection {
        &self.incoming
    }

    /// Incoming lines whose value differs from what is locally current.
    pub fn changed_lines(&self) -> &LineCollection {
        self.changed
            .get_or_init(|| differs_from_source(&self.incoming, &self.current))
    }

    /// Incoming keys not present locally.
    pub fn added_lines(&self) -> &LineCollection {
        self.added
            .get_or_init(|| missing_in(&self.incoming, &self.current))
    }

    /// Changed lines that are not newly added: the value changed on a key
    /// that already exists locally.
    pub fn updated_lines(&self) -> &LineCollection {
        self.updated
            .get_or_init(|| missing_in(self.changed_lines(), self.added_lines()))
    }

    /// Incoming lines unchanged relative to current.
    pub fn same_lines(&self) -> &LineCollection {
        self.same
            .get_or_init(|| same_as(&self.incoming, &self.current))
    }

    /// Keys that existed at last sync but are gone from incoming.
    pub fn removed_lines(&self) -> &LineCollection {
        self.removed
            .get_or_init(|| missing_in(&self.tracked, &self.incoming))
    }

    /// Lines where local and remote changes collide.
    ///
    /// A line conflicts when both sides modified or removed the same key
    /// independently of the tracked baseline, or when it was removed locally
    /// while the remote still considers it live. The two rules are
    /// deliberately asymmetric: "current unchanged, incoming removed" is not
    /// a conflict, while "current removed, incoming unchanged" is.
    ///
    /// Both sides landing on the same resulting value is not a conflict: the
    /// key then drops out of [`changed_lines`](Self::changed_lines) and never
    /// enters the intersection.
    pub fn conflicting_lines(&self) -> &LineCollection {
        self.conflicting.get_or_init(|| {
            let current_changed = differs_from_source(&self.current, &self.tracked);
            let current_removed = missing_in(&self.tracked, &self.current);

            // Rule 1: both sides touched the key. The remote side is the
            // union of value changes and remote removals; entries are taken
            // from that side so conflict reports show the remote state.
            let remote_side = self.changed_lines().overlay(self.removed_lines());
            let both_touched = exists_in(&remote_side, &current_changed);

            // Rule 2: removed locally but not also removed remotely.
            let local_only_removal = missing_in(&current_removed, self.removed_lines());

            both_touched.overlay(&local_only_removal)
        })
    }

    /// Changed lines safe to auto-apply.
    pub fn non_conflicting_lines(&self) -> &LineCollection {
        self.non_conflicting
            .get_or_init(|| missing_in(self.changed_lines(), self.conflicting_lines()))
    }

    /// Lines that can always be merged without operator input.
    pub fn safe_lines(&self) -> &LineCollection {
        self.safe
            .get_or_init(|| self.same_lines().overlay(self.non_conflicting_lines()))
    }

    /// The full proposed merge result when auto-resolving: current overlaid
    /// with safe lines, minus remote removals that are not themselves in
    /// conflict.
    pub fn mergeable_lines(&self) -> &LineCollection {
        self.mergeable.get_or_init(|| {
            let removed_clean = missing_in(self.removed_lines(), self.conflicting_lines());
            self.current
                .overlay(self.safe_lines())
                .without_keys(&removed_clean)
        })
    }

    /// Merge result when local wins conflicts: current plus remote
    /// additions, minus keys deleted locally relative to tracked.
    pub fn favor_current_lines(&self) -> &LineCollection {
        self.favor_current.get_or_init(|| {
            let current_removed = missing_in(&self.tracked, &self.current);
            self.current
                .overlay(self.added_lines())
                .without_keys(&current_removed)
        })
    }

    /// Merge result when remote wins conflicts: current overlaid with
    /// remote updates and additions, minus remote removals.
    pub fn favor_incoming_lines(&self) -> &LineCollection {
        self.favor_incoming.get_or_init(|| {
            self.current
                .overlay(self.updated_lines())
                .overlay(self.added_lines())
                .without_keys(self.removed_lines())
        })
    }

    pub fn has_conflicts(&self) -> bool {
        !self.conflicting_lines().is_empty()
    }
}
