//! Local storage driver boundary.
//!
//! The sync engine reads and writes translation sets through the [`Driver`]
//! trait and never touches storage directly. Two implementations ship with
//! the core: [`MemoryDriver`] for tests and embedding callers, and
//! [`JsonFileDriver`] persisting sets as JSON files under a data directory.
//!
//! How translation files are discovered or parsed from any particular
//! source-language convention is out of scope; a production deployment
//! supplies its own driver.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::DriverError;
use crate::filter::SetFilter;
use crate::model::{LineCollection, TranslationSet};

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Storage boundary consumed by the sync engine.
///
/// Tracked snapshots are addressed by [`TranslationSet::tracking_key`];
/// persistence is last-writer-wins with no locking, which is why a single
/// push operation must own its tracked-state store exclusively.
pub trait Driver {
    /// Current local value for the address. Returns a set with empty lines
    /// when nothing is stored yet.
    fn translation_set(
        &self,
        locale: &str,
        group: Option<&str>,
        namespace: Option<&str>,
    ) -> Result<TranslationSet, DriverError>;

    /// Lazily enumerate all locally discoverable sets passing the filter,
    /// in deterministic order. Sets stream one at a time so the push
    /// pipeline's pool stays the only buffering bound. `on_skipped` fires
    /// once per set the filter rejects, in enumeration order; per-set read
    /// failures surface as item errors.
    fn translation_sets<'a>(
        &'a self,
        filter: &'a SetFilter,
        on_skipped: &'a mut dyn FnMut(&TranslationSet),
    ) -> Result<Box<dyn Iterator<Item = Result<TranslationSet, DriverError>> + 'a>, DriverError>;

    /// Last-synced snapshot for the set's tracking key, or `None` if the
    /// set was never synced.
    fn tracked_translation_set(
        &self,
        set: &TranslationSet,
    ) -> Result<Option<TranslationSet>, DriverError>;

    /// Persist the current local value (pull path).
    fn save_translation_set(&self, set: &TranslationSet) -> Result<(), DriverError>;

    /// Persist the last-synced snapshot (push path, post-success).
    fn save_tracked_translation_set(&self, set: &TranslationSet) -> Result<(), DriverError>;

    /// Number of sets the filter accepts, used to size a push batch up
    /// front.
    fn count_translation_sets(&self, filter: &SetFilter) -> Result<usize, DriverError>;
}

fn address_key(locale: &str, group: Option<&str>, namespace: Option<&str>) -> String {
    let mut parts: Vec<&str> = Vec::with_capacity(3);
    if let Some(ns) = namespace {
        parts.push(ns);
    }
    if let Some(group) = group {
        parts.push(group);
    }
    parts.push(locale);
    parts.join("/")
}

// ---------------------------------------------------------------------------
// In-memory driver
// ---------------------------------------------------------------------------

/// In-memory driver with deterministic enumeration order, for tests and
/// embedding callers.
#[derive(Debug, Default)]
pub struct MemoryDriver {
    current: RwLock<BTreeMap<String, TranslationSet>>,
    tracked: RwLock<BTreeMap<String, TranslationSet>>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a current set, bypassing the save path.
    pub fn seed(&self, set: TranslationSet) {
        self.current
            .write()
            .expect("driver lock poisoned")
            .insert(set.tracking_key(), set);
    }

    /// Seed a tracked snapshot, bypassing the save path.
    pub fn seed_tracked(&self, set: TranslationSet) {
        self.tracked
            .write()
            .expect("driver lock poisoned")
            .insert(set.tracking_key(), set);
    }
}

impl Driver for MemoryDriver {
    fn translation_set(
        &self,
        locale: &str,
        group: Option<&str>,
        namespace: Option<&str>,
    ) -> Result<TranslationSet, DriverError> {
        let key = address_key(locale, group, namespace);
        let current = self.current.read().expect("driver lock poisoned");
        Ok(current.get(&key).cloned().unwrap_or_else(|| {
            TranslationSet::new(
                locale,
                group.map(str::to_string),
                namespace.map(str::to_string),
                LineCollection::new(),
            )
        }))
    }

    fn translation_sets<'a>(
        &'a self,
        filter: &'a SetFilter,
        on_skipped: &'a mut dyn FnMut(&TranslationSet),
    ) -> Result<Box<dyn Iterator<Item = Result<TranslationSet, DriverError>> + 'a>, DriverError>
    {
        // Snapshot under the lock; the lock is not held across iteration.
        let snapshot: Vec<TranslationSet> = self
            .current
            .read()
            .expect("driver lock poisoned")
            .values()
            .cloned()
            .collect();
        Ok(Box::new(snapshot.into_iter().filter_map(move |set| {
            if filter.matches(&set) {
                Some(Ok(set))
            } else {
                on_skipped(&set);
                None
            }
        })))
    }

    fn tracked_translation_set(
        &self,
        set: &TranslationSet,
    ) -> Result<Option<TranslationSet>, DriverError> {
        let tracked = self.tracked.read().expect("driver lock poisoned");
        Ok(tracked.get(&set.tracking_key()).cloned())
    }

    fn save_translation_set(&self, set: &TranslationSet) -> Result<(), DriverError> {
        self.current
            .write()
            .expect("driver lock poisoned")
            .insert(set.tracking_key(), set.clone());
        Ok(())
    }

    fn save_tracked_translation_set(&self, set: &TranslationSet) -> Result<(), DriverError> {
        self.tracked
            .write()
            .expect("driver lock poisoned")
            .insert(set.tracking_key(), set.clone());
        Ok(())
    }

    fn count_translation_sets(&self, filter: &SetFilter) -> Result<usize, DriverError> {
        let current = self.current.read().expect("driver lock poisoned");
        Ok(current.values().filter(|s| filter.matches(s)).count())
    }
}

// ---------------------------------------------------------------------------
// JSON file driver
// ---------------------------------------------------------------------------

/// Stored form of a tracked snapshot.
#[derive(Debug, Serialize, Deserialize)]
struct TrackedRecord {
    synced_at: DateTime<Utc>,
    set: TranslationSet,
}

/// File-backed driver persisting each set as one JSON document.
///
/// Current sets live at `<root>/sets/<tracking_key>.json`, tracked
/// snapshots at `<root>/tracked/<tracking_key>.json`. Because the path is
/// derived from the tracking key, group-less namespace-less sets from
/// different physical sources collapse onto one file; the last writer wins.
#[derive(Debug)]
pub struct JsonFileDriver {
    root: PathBuf,
}

impl JsonFileDriver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        info!(root = %root.display(), "created JSON file driver");
        Self { root }
    }

    fn set_path(&self, tracking_key: &str) -> PathBuf {
        self.root.join("sets").join(format!("{tracking_key}.json"))
    }

    fn tracked_path(&self, tracking_key: &str) -> PathBuf {
        self.root
            .join("tracked")
            .join(format!("{tracking_key}.json"))
    }

    fn read_set(&self, path: &Path) -> Result<TranslationSet, DriverError> {
        let contents = std::fs::read_to_string(path)?;
        serde_json::from_str(&contents).map_err(|e| DriverError::ParseError {
            path: path.display().to_string(),
            detail: e.to_string(),
        })
    }

    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), DriverError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(value).map_err(|e| DriverError::ParseError {
            path: path.display().to_string(),
            detail: e.to_string(),
        })?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Paths of all stored current sets, sorted for deterministic
    /// enumeration. Set contents are only read as the iterator advances.
    fn set_files(&self) -> Result<Vec<PathBuf>, DriverError> {
        let sets_dir = self.root.join("sets");
        if !sets_dir.exists() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        collect_json_files(&sets_dir, &mut files)?;
        files.sort();
        Ok(files)
    }
}

fn collect_json_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), DriverError> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_json_files(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "json") {
            out.push(path);
        }
    }
    Ok(())
}

impl Driver for JsonFileDriver {
    fn translation_set(
        &self,
        locale: &str,
        group: Option<&str>,
        namespace: Option<&str>,
    ) -> Result<TranslationSet, DriverError> {
        let key = address_key(locale, group, namespace);
        let path = self.set_path(&key);
        if path.exists() {
            self.read_set(&path)
        } else {
            Ok(TranslationSet::new(
                locale,
                group.map(str::to_string),
                namespace.map(str::to_string),
                LineCollection::new(),
            ))
        }
    }

    fn translation_sets<'a>(
        &'a self,
        filter: &'a SetFilter,
        on_skipped: &'a mut dyn FnMut(&TranslationSet),
    ) -> Result<Box<dyn Iterator<Item = Result<TranslationSet, DriverError>> + 'a>, DriverError>
    {
        let files = self.set_files()?;
        debug!(files = files.len(), "enumerating translation sets");
        Ok(Box::new(files.into_iter().filter_map(move |path| {
            match self.read_set(&path) {
                Ok(set) if filter.matches(&set) => Some(Ok(set)),
                Ok(set) => {
                    on_skipped(&set);
                    None
                }
                Err(e) => Some(Err(e)),
            }
        })))
    }

    fn tracked_translation_set(
        &self,
        set: &TranslationSet,
    ) -> Result<Option<TranslationSet>, DriverError> {
        let path = self.tracked_path(&set.tracking_key());
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)?;
        let record: TrackedRecord =
            serde_json::from_str(&contents).map_err(|e| DriverError::ParseError {
                path: path.display().to_string(),
                detail: e.to_string(),
            })?;
        Ok(Some(record.set))
    }

    fn save_translation_set(&self, set: &TranslationSet) -> Result<(), DriverError> {
        let path = self.set_path(&set.tracking_key());
        debug!(tracking_key = %set.tracking_key(), "saving translation set");
        self.write_json(&path, set)
    }

    fn save_tracked_translation_set(&self, set: &TranslationSet) -> Result<(), DriverError> {
        let record = TrackedRecord {
            synced_at: Utc::now(),
            set: set.clone(),
        };
        let path = self.tracked_path(&set.tracking_key());
        debug!(tracking_key = %set.tracking_key(), "saving tracked snapshot");
        self.write_json(&path, &record)
    }

    fn count_translation_sets(&self, filter: &SetFilter) -> Result<usize, DriverError> {
        let mut count = 0;
        for path in self.set_files()? {
            if filter.matches(&self.read_set(&path)?) {
                count += 1;
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Scalar, TranslationLine};

    fn sample_set(locale: &str, group: &str) -> TranslationSet {
        let lines: LineCollection = vec![
            TranslationLine::new("password", Scalar::Str("Password".into())),
            TranslationLine::new("email", Scalar::Str("Email".into())),
        ]
        .into();
        TranslationSet::new(locale, Some(group.into()), None, lines)
    }

    #[test]
    fn test_memory_driver_roundtrip() {
        let driver = MemoryDriver::new();
        driver.save_translation_set(&sample_set("en", "auth")).unwrap();

        let set = driver.translation_set("en", Some("auth"), None).unwrap();
        assert_eq!(set.lines.len(), 2);

        // Missing sets come back empty rather than erroring.
        let missing = driver.translation_set("fr", Some("auth"), None).unwrap();
        assert!(missing.lines.is_empty());
    }

    #[test]
    fn test_memory_driver_tracked_lifecycle() {
        let driver = MemoryDriver::new();
        let set = sample_set("en", "auth");

        assert!(driver.tracked_translation_set(&set).unwrap().is_none());
        driver.save_tracked_translation_set(&set).unwrap();
        let tracked = driver.tracked_translation_set(&set).unwrap().unwrap();
        assert_eq!(tracked.lines, set.lines);
    }

    #[test]
    fn test_memory_driver_enumeration_fires_skipped() {
        let driver = MemoryDriver::new();
        driver.seed(sample_set("en", "auth"));
        driver.seed(sample_set("fr", "auth"));

        let filter = SetFilter {
            only_locales: vec!["en".into()],
            ..Default::default()
        };
        let mut skipped = Vec::new();
        let sets: Vec<TranslationSet> = driver
            .translation_sets(&filter, &mut |set| skipped.push(set.locale.clone()))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].locale, "en");
        assert_eq!(skipped, vec!["fr"]);
        assert_eq!(driver.count_translation_sets(&filter).unwrap(), 1);
    }

    #[test]
    fn test_json_driver_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let driver = JsonFileDriver::new(dir.path());

        driver.save_translation_set(&sample_set("en", "auth")).unwrap();
        driver.save_translation_set(&sample_set("de", "auth")).unwrap();

        let set = driver.translation_set("en", Some("auth"), None).unwrap();
        assert_eq!(
            set.lines.get("password").unwrap().value,
            Scalar::Str("Password".into())
        );

        let mut skipped = 0;
        let all: Vec<TranslationSet> = driver
            .translation_sets(&SetFilter::all(), &mut |_| skipped += 1)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(skipped, 0);
        // Deterministic order: sorted by tracking key.
        assert_eq!(all[0].locale, "de");
        assert_eq!(all[1].locale, "en");
    }

    #[test]
    fn test_json_driver_tracked_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let driver = JsonFileDriver::new(dir.path());
        let set = sample_set("en", "auth");

        assert!(driver.tracked_translation_set(&set).unwrap().is_none());
        driver.save_tracked_translation_set(&set).unwrap();

        let tracked = driver.tracked_translation_set(&set).unwrap().unwrap();
        assert_eq!(tracked.lines, set.lines);
    }

    #[test]
    fn test_json_driver_enumeration_streams_per_set() {
        let dir = tempfile::tempdir().unwrap();
        let driver = JsonFileDriver::new(dir.path());
        driver.save_translation_set(&sample_set("de", "auth")).unwrap();

        // Corrupt a file that sorts after the valid one; it must surface as
        // an item error after the valid set was already yielded, not fail
        // the whole enumeration up front.
        let sets_dir = dir.path().join("sets/auth");
        std::fs::write(sets_dir.join("en.json"), "not json").unwrap();

        let filter = SetFilter::all();
        let mut on_skipped = |_: &TranslationSet| {};
        let mut iter = driver.translation_sets(&filter, &mut on_skipped).unwrap();

        let first = iter.next().unwrap().unwrap();
        assert_eq!(first.locale, "de");
        assert!(matches!(
            iter.next().unwrap(),
            Err(DriverError::ParseError { .. })
        ));
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_json_driver_parse_error_carries_path() {
        let dir = tempfile::tempdir().unwrap();
        let driver = JsonFileDriver::new(dir.path());

        let sets_dir = dir.path().join("sets");
        std::fs::create_dir_all(&sets_dir).unwrap();
        std::fs::write(sets_dir.join("en.json"), "not json").unwrap();

        let err = driver
            .translation_set("en", None, None)
            .expect_err("corrupt file should fail");
        assert!(matches!(err, DriverError::ParseError { .. }));
    }
}
