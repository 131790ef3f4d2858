//! Accept/reject filtering of translation sets.
//!
//! Filters carry only/except lists for locale, group, and namespace. On
//! pull they pass through as request parameters; on push and count they are
//! applied client-side as a predicate. `except` always takes precedence
//! over `only` when both select the same value.

use serde::{Deserialize, Serialize};

use crate::model::TranslationSet;

/// Accept/reject lists over (locale, group, namespace).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SetFilter {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub only_locales: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub except_locales: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub only_groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub except_groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub only_namespaces: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub except_namespaces: Vec<String>,
}

impl SetFilter {
    /// A filter that matches everything.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Whether the set passes the filter.
    pub fn matches(&self, set: &TranslationSet) -> bool {
        dimension_matches(
            Some(set.locale.as_str()),
            &self.only_locales,
            &self.except_locales,
        ) && dimension_matches(set.group.as_deref(), &self.only_groups, &self.except_groups)
            && dimension_matches(
                set.namespace.as_deref(),
                &self.only_namespaces,
                &self.except_namespaces,
            )
    }
}

/// Filter one dimension. An absent value (no group / no namespace) passes
/// unless an `only` list is in force.
fn dimension_matches(value: Option<&str>, only: &[String], except: &[String]) -> bool {
    match value {
        Some(value) => {
            if except.iter().any(|e| e == value) {
                return false;
            }
            only.is_empty() || only.iter().any(|o| o == value)
        }
        None => only.is_empty(),
    }
}
