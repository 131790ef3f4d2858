//! Domain model for translation sets.
//!
//! A [`TranslationSet`] is an immutable flat key/value dictionary scoped by
//! locale, group, and namespace. Multi-level structures are flattened into
//! dotted key paths (`attributes.email.required`) before they reach this
//! layer, so a set is always a flat, insertion-ordered map of
//! [`TranslationLine`]s.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Metadata key recording the JSON type a non-scalar value was normalized
/// from (`"array"` or `"object"`).
pub const META_ORIGINAL_VALUE_TYPE: &str = "original_value_type";

// ---------------------------------------------------------------------------
// Scalar values
// ---------------------------------------------------------------------------

/// A normalized translation value.
///
/// Remote and local payloads may carry arbitrary JSON; anything non-scalar
/// normalizes to [`Scalar::Null`] with the origin type recorded in line
/// metadata so a best-effort original value can be reconstructed later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Scalar {
    /// Normalize a JSON value into a scalar.
    ///
    /// Returns the scalar plus the origin type name when the value was
    /// non-scalar and collapsed to `Null`.
    pub fn from_json(value: &Value) -> (Self, Option<&'static str>) {
        match value {
            Value::Null => (Self::Null, None),
            Value::Bool(b) => (Self::Bool(*b), None),
            Value::Number(n) => match n.as_i64() {
                Some(i) => (Self::Int(i), None),
                None => (Self::Float(n.as_f64().unwrap_or(0.0)), None),
            },
            Value::String(s) => (Self::Str(s.clone()), None),
            Value::Array(_) => (Self::Null, Some("array")),
            Value::Object(_) => (Self::Null, Some("object")),
        }
    }

    /// Convert back to a JSON value.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::from(*i),
            Self::Float(f) => Value::from(*f),
            Self::Str(s) => Value::String(s.clone()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(v) => write!(f, "{}", v),
            Self::Str(s) => write!(f, "{}", s),
        }
    }
}

// ---------------------------------------------------------------------------
// Translation lines
// ---------------------------------------------------------------------------

/// A single key/value entry within a translation set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationLine {
    /// Flattened dotted key path.
    pub key: String,
    /// Normalized scalar value. Equality comparisons use this value only,
    /// never the metadata.
    pub value: Scalar,
    /// Free-form metadata attached by drivers or the remote store.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub meta: serde_json::Map<String, Value>,
}

impl TranslationLine {
    pub fn new(key: impl Into<String>, value: Scalar) -> Self {
        Self {
            key: key.into(),
            value,
            meta: serde_json::Map::new(),
        }
    }

    /// Build a line from a raw JSON value, normalizing non-scalars to null
    /// and recording the origin type in metadata.
    pub fn from_json(key: impl Into<String>, value: &Value) -> Self {
        let (scalar, origin) = Scalar::from_json(value);
        let mut line = Self::new(key, scalar);
        if let Some(origin) = origin {
            line.meta.insert(
                META_ORIGINAL_VALUE_TYPE.to_string(),
                Value::String(origin.to_string()),
            );
        }
        line
    }

    /// Best-effort reconstruction of the value as originally supplied.
    ///
    /// A null value that was normalized from an array re-expands to an empty
    /// array sentinel; everything else round-trips through [`Scalar::to_json`].
    pub fn original_value(&self) -> Value {
        if self.value.is_null() {
            if let Some(Value::String(origin)) = self.meta.get(META_ORIGINAL_VALUE_TYPE) {
                if origin == "array" {
                    return Value::Array(Vec::new());
                }
            }
        }
        self.value.to_json()
    }
}

// ---------------------------------------------------------------------------
// Line collections
// ---------------------------------------------------------------------------

/// An insertion-ordered collection of translation lines with unique keys.
///
/// Insertion over an existing key replaces the value in place, keeping the
/// original position: overlays are last-write-wins per key. The order is
/// preserved for serialization determinism only; set semantics never depend
/// on it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<TranslationLine>", into = "Vec<TranslationLine>")]
pub struct LineCollection {
    lines: Vec<TranslationLine>,
    index: HashMap<String, usize>,
}

impl LineCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&TranslationLine> {
        self.index.get(key).map(|&i| &self.lines[i])
    }

    /// Insert a line. If the key already exists the line is replaced at its
    /// original position.
    pub fn insert(&mut self, line: TranslationLine) {
        match self.index.get(&line.key) {
            Some(&i) => self.lines[i] = line,
            None => {
                self.index.insert(line.key.clone(), self.lines.len());
                self.lines.push(line);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &TranslationLine> {
        self.lines.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(|l| l.key.as_str())
    }

    /// Ordered union: entries of `other` overwrite entries of `self` per key.
    pub fn overlay(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        for line in other.iter() {
            merged.insert(line.clone());
        }
        merged
    }

    /// Entries of `self` whose key does not appear in `other`.
    pub fn without_keys(&self, other: &Self) -> Self {
        self.lines
            .iter()
            .filter(|l| !other.contains_key(&l.key))
            .cloned()
            .collect()
    }
}

impl FromIterator<TranslationLine> for LineCollection {
    fn from_iter<I: IntoIterator<Item = TranslationLine>>(iter: I) -> Self {
        let mut collection = Self::new();
        for line in iter {
            collection.insert(line);
        }
        collection
    }
}

impl From<Vec<TranslationLine>> for LineCollection {
    fn from(lines: Vec<TranslationLine>) -> Self {
        lines.into_iter().collect()
    }
}

impl From<LineCollection> for Vec<TranslationLine> {
    fn from(collection: LineCollection) -> Self {
        collection.lines
    }
}

impl PartialEq for LineCollection {
    fn eq(&self, other: &Self) -> bool {
        self.lines == other.lines
    }
}

// ---------------------------------------------------------------------------
// Translation sets
// ---------------------------------------------------------------------------

/// An immutable translation dictionary scoped by locale, group, and
/// namespace. "Updates" always produce a new set via [`with_lines`].
///
/// [`with_lines`]: TranslationSet::with_lines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationSet {
    pub locale: String,
    pub group: Option<String>,
    pub namespace: Option<String>,
    pub lines: LineCollection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Map<String, Value>>,
}

impl TranslationSet {
    pub fn new(
        locale: impl Into<String>,
        group: Option<String>,
        namespace: Option<String>,
        lines: LineCollection,
    ) -> Self {
        Self {
            locale: locale.into(),
            group,
            namespace,
            lines,
            meta: None,
        }
    }

    /// Produce a new set from a merged line collection, keeping the address
    /// and metadata.
    pub fn with_lines(&self, lines: LineCollection) -> Self {
        Self {
            lines,
            ..self.clone()
        }
    }

    /// Hierarchical path addressing the last-synced snapshot in persistent
    /// storage: namespace, then group, then locale, with absent parts
    /// skipped.
    ///
    /// Distinct `(locale, group, namespace)` triples map to distinct keys.
    /// When group and namespace are both absent, multiple physical sources
    /// can collapse onto the same key; the last writer in iteration order
    /// wins, which is documented ambiguity rather than an error.
    pub fn tracking_key(&self) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(3);
        if let Some(ns) = self.namespace.as_deref() {
            parts.push(ns);
        }
        if let Some(group) = self.group.as_deref() {
            parts.push(group);
        }
        parts.push(&self.locale);
        parts.join("/")
    }

    /// Human-facing lookup key: `"{namespace}::{group}"` when both are
    /// present, else the group, else the empty string.
    pub fn translation_key(&self) -> String {
        match (self.namespace.as_deref(), self.group.as_deref()) {
            (Some(ns), Some(group)) => format!("{}::{}", ns, group),
            (None, Some(group)) => group.to_string(),
            _ => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn line(key: &str, value: &str) -> TranslationLine {
        TranslationLine::new(key, Scalar::Str(value.into()))
    }

    #[test]
    fn test_scalar_normalization() {
        let (s, origin) = Scalar::from_json(&json!("hello"));
        assert_eq!(s, Scalar::Str("hello".into()));
        assert!(origin.is_none());

        let (s, origin) = Scalar::from_json(&json!(42));
        assert_eq!(s, Scalar::Int(42));
        assert!(origin.is_none());

        let (s, origin) = Scalar::from_json(&json!([]));
        assert_eq!(s, Scalar::Null);
        assert_eq!(origin, Some("array"));

        let (s, origin) = Scalar::from_json(&json!({"nested": true}));
        assert_eq!(s, Scalar::Null);
        assert_eq!(origin, Some("object"));
    }

    #[test]
    fn test_original_value_reexpands_empty_array() {
        let line = TranslationLine::from_json("choices", &json!([]));
        assert!(line.value.is_null());
        assert_eq!(line.original_value(), json!([]));

        // Plain null stays null.
        let line = TranslationLine::from_json("missing", &json!(null));
        assert_eq!(line.original_value(), json!(null));
    }

    #[test]
    fn test_line_equality_ignores_meta() {
        let a = TranslationLine::from_json("choices", &json!([]));
        let b = TranslationLine::new("choices", Scalar::Null);
        // Struct equality differs on meta, but value comparison is what the
        // diff engine uses.
        assert_eq!(a.value, b.value);
    }

    #[test]
    fn test_collection_insert_replaces_in_place() {
        let mut c = LineCollection::new();
        c.insert(line("a", "1"));
        c.insert(line("b", "2"));
        c.insert(line("a", "updated"));

        assert_eq!(c.len(), 2);
        let keys: Vec<&str> = c.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(c.get("a").unwrap().value, Scalar::Str("updated".into()));
    }

    #[test]
    fn test_overlay_last_write_wins() {
        let base: LineCollection = vec![line("a", "1"), line("b", "2")].into();
        let over: LineCollection = vec![line("b", "B"), line("c", "3")].into();

        let merged = base.overlay(&over);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.get("b").unwrap().value, Scalar::Str("B".into()));
        let keys: Vec<&str> = merged.keys().collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_without_keys() {
        let base: LineCollection = vec![line("a", "1"), line("b", "2"), line("c", "3")].into();
        let exclude: LineCollection = vec![line("b", "ignored")].into();

        let remaining = base.without_keys(&exclude);
        let keys: Vec<&str> = remaining.keys().collect();
        assert_eq!(keys, vec!["a", "c"]);
    }

    #[test]
    fn test_collection_serde_roundtrip() {
        let c: LineCollection = vec![line("b", "2"), line("a", "1")].into();
        let json = serde_json::to_string(&c).unwrap();
        let back: LineCollection = serde_json::from_str(&json).unwrap();
        // Insertion order survives the round trip.
        let keys: Vec<&str> = back.keys().collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn test_tracking_key_hierarchy() {
        let lines = LineCollection::new();
        let set = TranslationSet::new("en", Some("auth".into()), Some("shop".into()), lines.clone());
        assert_eq!(set.tracking_key(), "shop/auth/en");

        let set = TranslationSet::new("en", Some("auth".into()), None, lines.clone());
        assert_eq!(set.tracking_key(), "auth/en");

        let set = TranslationSet::new("en", None, None, lines);
        assert_eq!(set.tracking_key(), "en");
    }

    #[test]
    fn test_translation_key() {
        let lines = LineCollection::new();
        let set = TranslationSet::new("en", Some("auth".into()), Some("shop".into()), lines.clone());
        assert_eq!(set.translation_key(), "shop::auth");

        let set = TranslationSet::new("en", Some("auth".into()), None, lines.clone());
        assert_eq!(set.translation_key(), "auth");

        let set = TranslationSet::new("en", None, Some("shop".into()), lines);
        assert_eq!(set.translation_key(), "");
    }
}
