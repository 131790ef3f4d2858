//! Conflict resolution policy.
//!
//! A pull operation applies one configured [`ConflictStrategy`] per incoming
//! set. [`resolve`] is the pure state machine selecting which merge result to
//! persist and whether a conflict must be raised; the sync engine maps the
//! returned [`Resolution`] onto driver writes, event hooks, and errors.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::diff::Differ;
use crate::errors::ConflictError;
use crate::model::LineCollection;

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

/// Closed set of conflict resolution strategies.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStrategy {
    /// Persist the favor-incoming merge, skipping conflict detection
    /// consequences entirely.
    AcceptIncoming,
    /// Persist the favor-current merge.
    AcceptCurrent,
    /// Abort with a conflict error when conflicts exist.
    Throw,
    /// Skip the set without persisting when conflicts exist.
    Ignore,
    /// Persist the auto-merge and continue; never raises.
    #[default]
    MergeAndIgnore,
    /// Persist the auto-merge, then abort with a conflict error.
    MergeButThrow,
}

impl std::fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AcceptIncoming => write!(f, "accept_incoming"),
            Self::AcceptCurrent => write!(f, "accept_current"),
            Self::Throw => write!(f, "throw"),
            Self::Ignore => write!(f, "ignore"),
            Self::MergeAndIgnore => write!(f, "merge_and_ignore"),
            Self::MergeButThrow => write!(f, "merge_but_throw"),
        }
    }
}

// ---------------------------------------------------------------------------
// Conflict summary
// ---------------------------------------------------------------------------

/// Operator-facing description of the conflicts found on one set, grouped
/// per translation key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictSummary {
    /// Human-facing lookup key of the affected set.
    pub translation_key: String,
    /// Keys whose line is in conflict.
    pub conflicting_keys: Vec<String>,
    /// Incoming keys not present locally.
    pub added_keys: Vec<String>,
    /// Keys whose value changed on an existing key.
    pub updated_keys: Vec<String>,
    /// Keys gone from incoming since last sync.
    pub removed_keys: Vec<String>,
}

impl ConflictSummary {
    /// Capture the categorized key lists from a diff.
    pub fn from_differ(translation_key: impl Into<String>, differ: &Differ) -> Self {
        let collect = |c: &LineCollection| c.keys().map(str::to_string).collect();
        Self {
            translation_key: translation_key.into(),
            conflicting_keys: collect(differ.conflicting_lines()),
            added_keys: collect(differ.added_lines()),
            updated_keys: collect(differ.updated_lines()),
            removed_keys: collect(differ.removed_lines()),
        }
    }

    pub fn into_error(self) -> ConflictError {
        ConflictError::Unresolved {
            translation_key: self.translation_key,
            conflicting: self.conflicting_keys.len(),
            added_keys: self.added_keys,
            updated_keys: self.updated_keys,
            removed_keys: self.removed_keys,
        }
    }
}

// ---------------------------------------------------------------------------
// Resolution state machine
// ---------------------------------------------------------------------------

/// Outcome selected by the policy for one incoming set.
#[derive(Debug)]
pub enum Resolution {
    /// Persist the given merge result, no conflicts to report.
    Persist(LineCollection),
    /// Persist the auto-merge even though conflicts exist; never raises.
    PersistWithConflicts(LineCollection, ConflictSummary),
    /// Persist the auto-merge, then raise the conflict.
    PersistThenConflict(LineCollection, ConflictSummary),
    /// Skip without persisting, recording the conflicts.
    Skip(ConflictSummary),
    /// Raise without persisting.
    Conflict(ConflictSummary),
}

/// Select the outcome for one incoming set.
///
/// When no tracked snapshot exists yet (first-ever sync) the auto-merge is
/// persisted unconditionally regardless of strategy: there is no baseline
/// for anything to conflict with.
pub fn resolve(
    strategy: ConflictStrategy,
    translation_key: &str,
    differ: &Differ,
    has_tracked: bool,
) -> Resolution {
    if !has_tracked {
        debug!(translation_key, "no tracked snapshot, merging unconditionally");
        return Resolution::Persist(differ.mergeable_lines().clone());
    }

    match strategy {
        ConflictStrategy::AcceptIncoming => {
            return Resolution::Persist(differ.favor_incoming_lines().clone());
        }
        ConflictStrategy::AcceptCurrent => {
            return Resolution::Persist(differ.favor_current_lines().clone());
        }
        _ => {}
    }

    if !differ.has_conflicts() {
        return Resolution::Persist(differ.mergeable_lines().clone());
    }

    let summary = ConflictSummary::from_differ(translation_key, differ);
    debug!(
        translation_key,
        conflicts = summary.conflicting_keys.len(),
        strategy = %strategy,
        "conflicts detected"
    );

    match strategy {
        ConflictStrategy::Throw => Resolution::Conflict(summary),
        ConflictStrategy::Ignore => Resolution::Skip(summary),
        ConflictStrategy::MergeAndIgnore => {
            Resolution::PersistWithConflicts(differ.mergeable_lines().clone(), summary)
        }
        ConflictStrategy::MergeButThrow => {
            Resolution::PersistThenConflict(differ.mergeable_lines().clone(), summary)
        }
        // Accept* returned above.
        ConflictStrategy::AcceptIncoming | ConflictStrategy::AcceptCurrent => unreachable!(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Scalar, TranslationLine};

    fn lines(pairs: &[(&str, &str)]) -> LineCollection {
        pairs
            .iter()
            .map(|(k, v)| TranslationLine::new(*k, Scalar::Str((*v).into())))
            .collect()
    }

    fn conflicted_differ() -> Differ {
        Differ::new(
            lines(&[("password", "A")]),
            lines(&[("password", "B")]),
            lines(&[("password", "C")]),
        )
    }

    fn clean_differ() -> Differ {
        Differ::new(
            lines(&[("password", "A")]),
            lines(&[("password", "A")]),
            lines(&[("password", "remote")]),
        )
    }

    #[test]
    fn test_first_sync_merges_regardless_of_strategy() {
        for strategy in [
            ConflictStrategy::Throw,
            ConflictStrategy::Ignore,
            ConflictStrategy::AcceptCurrent,
        ] {
            let differ = Differ::new(
                LineCollection::new(),
                lines(&[("greeting", "Hi")]),
                lines(&[("greeting", "Hello"), ("bye", "Bye")]),
            );
            let resolution = resolve(strategy, "messages", &differ, false);
            match resolution {
                Resolution::Persist(merged) => {
                    // Local value wins where both exist; new remote keys are
                    // added.
                    assert_eq!(
                        merged.get("greeting").unwrap().value,
                        Scalar::Str("Hi".into())
                    );
                    assert!(merged.contains_key("bye"));
                }
                other => panic!("expected Persist, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_accept_incoming_skips_conflict_consequences() {
        let differ = conflicted_differ();
        match resolve(ConflictStrategy::AcceptIncoming, "auth", &differ, true) {
            Resolution::Persist(merged) => {
                assert_eq!(
                    merged.get("password").unwrap().value,
                    Scalar::Str("C".into())
                );
            }
            other => panic!("expected Persist, got {:?}", other),
        }
    }

    #[test]
    fn test_accept_current() {
        let differ = conflicted_differ();
        match resolve(ConflictStrategy::AcceptCurrent, "auth", &differ, true) {
            Resolution::Persist(merged) => {
                assert_eq!(
                    merged.get("password").unwrap().value,
                    Scalar::Str("B".into())
                );
            }
            other => panic!("expected Persist, got {:?}", other),
        }
    }

    #[test]
    fn test_throw_raises_without_persisting() {
        let differ = conflicted_differ();
        match resolve(ConflictStrategy::Throw, "auth", &differ, true) {
            Resolution::Conflict(summary) => {
                assert_eq!(summary.conflicting_keys, vec!["password"]);
            }
            other => panic!("expected Conflict, got {:?}", other),
        }
    }

    #[test]
    fn test_ignore_skips_without_persisting() {
        let differ = conflicted_differ();
        assert!(matches!(
            resolve(ConflictStrategy::Ignore, "auth", &differ, true),
            Resolution::Skip(_)
        ));
    }

    #[test]
    fn test_merge_and_ignore_persists_current_winner() {
        let differ = conflicted_differ();
        match resolve(ConflictStrategy::MergeAndIgnore, "auth", &differ, true) {
            Resolution::PersistWithConflicts(merged, summary) => {
                // The conflicting key is excluded from the auto-merge, so the
                // current value survives.
                assert_eq!(
                    merged.get("password").unwrap().value,
                    Scalar::Str("B".into())
                );
                assert_eq!(summary.conflicting_keys, vec!["password"]);
            }
            other => panic!("expected PersistWithConflicts, got {:?}", other),
        }
    }

    #[test]
    fn test_merge_but_throw_persists_then_raises() {
        let differ = conflicted_differ();
        assert!(matches!(
            resolve(ConflictStrategy::MergeButThrow, "auth", &differ, true),
            Resolution::PersistThenConflict(_, _)
        ));
    }

    #[test]
    fn test_clean_diff_persists_under_every_strategy() {
        for strategy in [
            ConflictStrategy::Throw,
            ConflictStrategy::Ignore,
            ConflictStrategy::MergeAndIgnore,
            ConflictStrategy::MergeButThrow,
        ] {
            let differ = clean_differ();
            assert!(
                matches!(
                    resolve(strategy, "auth", &differ, true),
                    Resolution::Persist(_)
                ),
                "strategy {strategy} should persist a clean diff"
            );
        }
    }

    #[test]
    fn test_strategy_serde_names() {
        let json = serde_json::to_string(&ConflictStrategy::MergeButThrow).unwrap();
        assert_eq!(json, "\"merge_but_throw\"");
        let parsed: ConflictStrategy = serde_json::from_str("\"accept_incoming\"").unwrap();
        assert_eq!(parsed, ConflictStrategy::AcceptIncoming);
    }
}
