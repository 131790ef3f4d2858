//! Bidirectional translation-set synchronization engine.
//!
//! The [`SyncEngine`] drives the two data paths:
//!
//! - **Pull**: paginate incoming sets from the remote, three-way diff each
//!   against its tracked snapshot and current local value, apply the
//!   configured conflict strategy, persist through the driver.
//! - **Push**: enumerate current local sets through the filter, accumulate
//!   them into a bounded batch, dispatch drained chunks concurrently, and
//!   persist each successfully pushed set as its new tracked snapshot.
//!
//! The engine owns its batch for the lifetime of one push operation; no two
//! concurrent pushes may share a tracked-state store, since tracked
//! persistence is last-writer-wins with no locking.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::batch::{Batch, Chunk, PoolConfig};
use crate::config::AppConfig;
use crate::conflict::{resolve, ConflictStrategy, ConflictSummary, Resolution};
use crate::diff::Differ;
use crate::driver::Driver;
use crate::errors::SyncError;
use crate::events::{NoopEvents, SyncEvents};
use crate::filter::SetFilter;
use crate::model::{LineCollection, TranslationSet};
use crate::remote::{PageRequest, Remote};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Per-operation pull settings.
#[derive(Debug, Clone)]
pub struct PullOptions {
    pub strategy: ConflictStrategy,
    /// Accumulate conflicts into the report and keep processing instead of
    /// aborting on the first conflict error.
    pub silence_conflicts: bool,
    pub filter: SetFilter,
    pub page_size: usize,
}

impl PullOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            strategy: config.pull.strategy,
            silence_conflicts: config.pull.silence_conflicts,
            filter: SetFilter::all(),
            page_size: config.pull.page_size,
        }
    }
}

/// Per-operation push settings.
#[derive(Debug, Clone)]
pub struct PushOptions {
    pub filter: SetFilter,
    pub pool: PoolConfig,
}

impl PushOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            filter: SetFilter::all(),
            pool: PoolConfig::new(config.push.max_pool_size, config.push.max_chunk_size),
        }
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Outcome of one pull operation.
#[derive(Debug, Default)]
pub struct PullReport {
    pub pages: usize,
    pub saved: usize,
    pub skipped: usize,
    /// Conflict data accumulated across all processed sets. Non-empty with
    /// an `Ok` return means "succeeded with conflicts recorded".
    pub conflicts: Vec<ConflictSummary>,
}

impl PullReport {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

/// Outcome of one push operation.
#[derive(Debug, Default)]
pub struct PushReport {
    pub total_pushable: usize,
    pub total_pushed: usize,
    pub chunks_dispatched: usize,
    pub skipped: usize,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Metadata key stamped onto sets pushed by an init operation.
const META_INITIAL_IMPORT: &str = "initial_import";

/// The sync engine, generic over the local driver and the remote store.
pub struct SyncEngine<D: Driver, R: Remote + 'static> {
    driver: D,
    remote: Arc<R>,
    events: Arc<dyn SyncEvents>,
}

impl<D: Driver, R: Remote + 'static> SyncEngine<D, R> {
    pub fn new(driver: D, remote: R) -> Self {
        Self {
            driver,
            remote: Arc::new(remote),
            events: Arc::new(NoopEvents),
        }
    }

    /// Attach a listener for progress and conflict notifications.
    pub fn with_events(mut self, events: Arc<dyn SyncEvents>) -> Self {
        self.events = events;
        self
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    // -----------------------------------------------------------------------
    // Pull
    // -----------------------------------------------------------------------

    /// Pull incoming sets from the remote and merge them into local storage.
    ///
    /// Aborts on the first conflict error unless
    /// [`PullOptions::silence_conflicts`] is set, in which case processing
    /// continues across all sets and the conflicts are returned in the
    /// report.
    pub async fn pull(&self, options: &PullOptions) -> Result<PullReport, SyncError> {
        info!(strategy = %options.strategy, "starting pull");
        let mut report = PullReport::default();
        let mut cursor: Option<String> = None;

        loop {
            let page = self
                .remote
                .pull_page(PageRequest {
                    cursor: cursor.clone(),
                    page_size: options.page_size,
                    filter: options.filter.clone(),
                })
                .await?;
            report.pages += 1;

            for incoming in page.sets {
                self.pull_one(incoming, options, &mut report)?;
            }

            if !page.has_more {
                break;
            }
            cursor = page.cursor;
            if cursor.is_none() {
                warn!("remote reported more pages without a cursor, stopping");
                break;
            }
        }

        info!(
            pages = report.pages,
            saved = report.saved,
            skipped = report.skipped,
            conflicts = report.conflicts.len(),
            "pull completed"
        );
        Ok(report)
    }

    /// Diff and merge one incoming set.
    fn pull_one(
        &self,
        incoming: TranslationSet,
        options: &PullOptions,
        report: &mut PullReport,
    ) -> Result<(), SyncError> {
        let current = self.driver.translation_set(
            &incoming.locale,
            incoming.group.as_deref(),
            incoming.namespace.as_deref(),
        )?;
        let tracked = self.driver.tracked_translation_set(&incoming)?;
        let has_tracked = tracked.is_some();

        let differ = Differ::new(
            tracked.map(|t| t.lines).unwrap_or_default(),
            current.lines.clone(),
            incoming.lines.clone(),
        );

        match resolve(
            options.strategy,
            &incoming.translation_key(),
            &differ,
            has_tracked,
        ) {
            Resolution::Persist(merged) => {
                self.persist(&incoming, merged)?;
                report.saved += 1;
            }
            Resolution::PersistWithConflicts(merged, summary) => {
                self.events.on_conflict(&incoming, &summary);
                self.persist(&incoming, merged)?;
                report.saved += 1;
                report.conflicts.push(summary);
            }
            Resolution::PersistThenConflict(merged, summary) => {
                self.events.on_conflict(&incoming, &summary);
                self.persist(&incoming, merged)?;
                report.saved += 1;
                if options.silence_conflicts {
                    report.conflicts.push(summary);
                } else {
                    return Err(summary.into_error().into());
                }
            }
            Resolution::Skip(summary) => {
                self.events.on_conflict(&incoming, &summary);
                report.skipped += 1;
                report.conflicts.push(summary);
            }
            Resolution::Conflict(summary) => {
                self.events.on_conflict(&incoming, &summary);
                if options.silence_conflicts {
                    report.skipped += 1;
                    report.conflicts.push(summary);
                } else {
                    return Err(summary.into_error().into());
                }
            }
        }
        Ok(())
    }

    fn persist(&self, incoming: &TranslationSet, merged: LineCollection) -> Result<(), SyncError> {
        let set = incoming.with_lines(merged);
        debug!(tracking_key = %set.tracking_key(), lines = set.lines.len(), "persisting merged set");
        self.driver.save_translation_set(&set)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Push
    // -----------------------------------------------------------------------

    /// Push current local sets to the remote in bounded concurrent chunks.
    ///
    /// Any terminal dispatch or persistence failure aborts the remainder of
    /// the operation; there is no partial-success continuation.
    pub async fn push(&self, options: &PushOptions) -> Result<PushReport, SyncError> {
        self.push_inner(options, false).await
    }

    /// Push every local set stamped with first-import metadata, priming the
    /// remote branch and the tracked snapshots in one pass.
    pub async fn init(&self, options: &PushOptions) -> Result<PushReport, SyncError> {
        self.push_inner(options, true).await
    }

    /// Pull then push.
    pub async fn synch(
        &self,
        pull_options: &PullOptions,
        push_options: &PushOptions,
    ) -> Result<(PullReport, PushReport), SyncError> {
        let pull_report = self.pull(pull_options).await?;
        let push_report = self.push(push_options).await?;
        Ok((pull_report, push_report))
    }

    async fn push_inner(
        &self,
        options: &PushOptions,
        initial_import: bool,
    ) -> Result<PushReport, SyncError> {
        let total_pushable = self.driver.count_translation_sets(&options.filter)?;
        info!(total_pushable, initial_import, "starting push");
        self.events.on_push_started(total_pushable);

        let mut report = PushReport {
            total_pushable,
            ..Default::default()
        };

        let events = Arc::clone(&self.events);
        let mut skipped = 0usize;
        let mut on_skipped = |set: &TranslationSet| {
            events.on_skipped(set);
            skipped += 1;
        };

        let mut batch = Batch::new(options.pool, total_pushable);
        {
            // Sets stream out of the driver one at a time; only the pool
            // buffers between here and dispatch.
            let sets = self.driver.translation_sets(&options.filter, &mut on_skipped)?;
            for result in sets {
                let mut set = result?;
                if initial_import {
                    set.meta
                        .get_or_insert_with(serde_json::Map::new)
                        .insert(META_INITIAL_IMPORT.to_string(), serde_json::Value::Bool(true));
                }
                if let Some(chunks) = batch.add(set) {
                    self.dispatch(chunks, &mut batch, &mut report).await?;
                }
            }
        }
        report.skipped = skipped;

        // Mandatory end-of-stream drain: without it the tail of sets would
        // silently never be dispatched.
        let tail = batch.finish();
        if !tail.is_empty() {
            self.dispatch(tail, &mut batch, &mut report).await?;
        }

        report.total_pushed = batch.total_pushed();
        info!(
            pushed = report.total_pushed,
            chunks = report.chunks_dispatched,
            skipped = report.skipped,
            "push completed"
        );
        Ok(report)
    }

    /// Dispatch one drained set of chunks as an unordered concurrent batch.
    ///
    /// All results are joined before persistence proceeds; completion order
    /// across chunks is not assumed. Chunks that succeeded are persisted as
    /// tracked even when a sibling chunk fails, since their sets did reach
    /// the remote.
    async fn dispatch(
        &self,
        chunks: Vec<Chunk>,
        batch: &mut Batch,
        report: &mut PushReport,
    ) -> Result<(), SyncError> {
        debug!(chunks = chunks.len(), "dispatching drained chunks");

        let mut handles = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let remote = Arc::clone(&self.remote);
            handles.push(tokio::spawn(async move {
                let result = remote.push_chunk(chunk.sets()).await;
                result.map(|()| chunk)
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(
                handle
                    .await
                    .map_err(|e| SyncError::DispatchFailed(e.to_string()))?,
            );
        }

        let mut first_error: Option<SyncError> = None;
        for result in results {
            match result {
                Ok(chunk) => {
                    for set in chunk.sets() {
                        self.driver.save_tracked_translation_set(set)?;
                        self.events.on_handled(set);
                    }
                    batch.record_pushed(chunk.len());
                    report.chunks_dispatched += 1;
                }
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e.into());
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::MemoryDriver;
    use crate::errors::RemoteError;
    use crate::model::{Scalar, TranslationLine};
    use crate::remote::PullPage;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    fn lines(pairs: &[(&str, &str)]) -> LineCollection {
        pairs
            .iter()
            .map(|(k, v)| TranslationLine::new(*k, Scalar::Str((*v).into())))
            .collect()
    }

    fn set(locale: &str, group: &str, pairs: &[(&str, &str)]) -> TranslationSet {
        TranslationSet::new(locale, Some(group.into()), None, lines(pairs))
    }

    /// Scripted remote: serves queued pull pages and records pushed chunks.
    #[derive(Default)]
    struct StubRemote {
        pages: Mutex<VecDeque<PullPage>>,
        pushed: Mutex<Vec<Vec<TranslationSet>>>,
        fail_chunks_from: Option<usize>,
    }

    impl StubRemote {
        fn with_pages(pages: Vec<PullPage>) -> Self {
            Self {
                pages: Mutex::new(pages.into()),
                ..Default::default()
            }
        }
    }

    impl Remote for StubRemote {
        async fn pull_page(&self, _request: PageRequest) -> Result<PullPage, RemoteError> {
            Ok(self
                .pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(PullPage {
                    sets: Vec::new(),
                    cursor: None,
                    has_more: false,
                }))
        }

        async fn push_chunk(&self, sets: &[TranslationSet]) -> Result<(), RemoteError> {
            let mut pushed = self.pushed.lock().unwrap();
            if let Some(limit) = self.fail_chunks_from {
                if pushed.len() >= limit {
                    return Err(RemoteError::ApiError {
                        status: 500,
                        body: "boom".into(),
                    });
                }
            }
            pushed.push(sets.to_vec());
            Ok(())
        }
    }

    fn page(sets: Vec<TranslationSet>, cursor: Option<&str>, has_more: bool) -> PullPage {
        PullPage {
            sets,
            cursor: cursor.map(str::to_string),
            has_more,
        }
    }

    fn pull_options(strategy: ConflictStrategy, silence: bool) -> PullOptions {
        PullOptions {
            strategy,
            silence_conflicts: silence,
            filter: SetFilter::all(),
            page_size: 50,
        }
    }

    #[tokio::test]
    async fn test_pull_first_sync_persists_merge() {
        let driver = MemoryDriver::new();
        let remote = StubRemote::with_pages(vec![page(
            vec![set("en", "auth", &[("password", "Password")])],
            None,
            false,
        )]);
        let engine = SyncEngine::new(driver, remote);

        let report = engine
            .pull(&pull_options(ConflictStrategy::Throw, false))
            .await
            .unwrap();
        assert_eq!(report.saved, 1);
        assert!(!report.has_conflicts());

        let saved = engine
            .driver()
            .translation_set("en", Some("auth"), None)
            .unwrap();
        assert_eq!(
            saved.lines.get("password").unwrap().value,
            Scalar::Str("Password".into())
        );
    }

    #[tokio::test]
    async fn test_pull_follows_cursor_across_pages() {
        let driver = MemoryDriver::new();
        let remote = StubRemote::with_pages(vec![
            page(
                vec![set("en", "auth", &[("a", "1")])],
                Some("next"),
                true,
            ),
            page(vec![set("fr", "auth", &[("a", "1")])], None, false),
        ]);
        let engine = SyncEngine::new(driver, remote);

        let report = engine
            .pull(&pull_options(ConflictStrategy::MergeAndIgnore, false))
            .await
            .unwrap();
        assert_eq!(report.pages, 2);
        assert_eq!(report.saved, 2);
    }

    #[tokio::test]
    async fn test_pull_throw_aborts_on_conflict() {
        let driver = MemoryDriver::new();
        driver.seed_tracked(set("en", "auth", &[("password", "A")]));
        driver.seed(set("en", "auth", &[("password", "B")]));
        let remote = StubRemote::with_pages(vec![page(
            vec![set("en", "auth", &[("password", "C")])],
            None,
            false,
        )]);
        let engine = SyncEngine::new(driver, remote);

        let err = engine
            .pull(&pull_options(ConflictStrategy::Throw, false))
            .await
            .expect_err("conflict should abort");
        assert!(matches!(err, SyncError::Conflict(_)));

        // Nothing persisted.
        let current = engine
            .driver()
            .translation_set("en", Some("auth"), None)
            .unwrap();
        assert_eq!(
            current.lines.get("password").unwrap().value,
            Scalar::Str("B".into())
        );
    }

    #[tokio::test]
    async fn test_pull_silenced_conflicts_accumulate() {
        let driver = MemoryDriver::new();
        driver.seed_tracked(set("en", "auth", &[("password", "A")]));
        driver.seed(set("en", "auth", &[("password", "B")]));
        driver.seed_tracked(set("fr", "auth", &[("password", "A")]));
        driver.seed(set("fr", "auth", &[("password", "A")]));
        let remote = StubRemote::with_pages(vec![page(
            vec![
                set("en", "auth", &[("password", "C")]),
                set("fr", "auth", &[("password", "D")]),
            ],
            None,
            false,
        )]);
        let engine = SyncEngine::new(driver, remote);

        let report = engine
            .pull(&pull_options(ConflictStrategy::Throw, true))
            .await
            .unwrap();

        // The en set conflicts and is skipped; the fr set merges cleanly.
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.saved, 1);
        let fr = engine
            .driver()
            .translation_set("fr", Some("auth"), None)
            .unwrap();
        assert_eq!(
            fr.lines.get("password").unwrap().value,
            Scalar::Str("D".into())
        );
    }

    #[tokio::test]
    async fn test_pull_never_touches_tracked() {
        let driver = MemoryDriver::new();
        let remote = StubRemote::with_pages(vec![page(
            vec![set("en", "auth", &[("password", "A")])],
            None,
            false,
        )]);
        let engine = SyncEngine::new(driver, remote);
        engine
            .pull(&pull_options(ConflictStrategy::MergeAndIgnore, false))
            .await
            .unwrap();

        let probe = set("en", "auth", &[]);
        assert!(engine
            .driver()
            .tracked_translation_set(&probe)
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_push_dispatches_and_tracks() {
        let driver = MemoryDriver::new();
        for n in 0..23 {
            driver.seed(set("en", &format!("group{n:02}"), &[("k", "v")]));
        }
        let engine = SyncEngine::new(driver, StubRemote::default());

        let options = PushOptions {
            filter: SetFilter::all(),
            pool: PoolConfig::new(2, 10),
        };
        let report = engine.push(&options).await.unwrap();

        assert_eq!(report.total_pushable, 23);
        assert_eq!(report.total_pushed, 23);
        assert_eq!(report.chunks_dispatched, 3);

        let chunk_sizes: Vec<usize> = {
            let pushed = engine.remote.pushed.lock().unwrap();
            pushed.iter().map(Vec::len).collect()
        };
        let mut sorted = chunk_sizes.clone();
        sorted.sort_unstable();
        // Completion order across a drain is not guaranteed; sizes are.
        assert_eq!(sorted, vec![3, 10, 10]);

        // Every set now has a tracked snapshot.
        let probe = set("en", "group00", &[]);
        assert!(engine
            .driver()
            .tracked_translation_set(&probe)
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_push_terminal_failure_aborts() {
        let driver = MemoryDriver::new();
        for n in 0..23 {
            driver.seed(set("en", &format!("group{n:02}"), &[("k", "v")]));
        }
        let remote = StubRemote {
            fail_chunks_from: Some(1),
            ..Default::default()
        };
        let engine = SyncEngine::new(driver, remote);

        let options = PushOptions {
            filter: SetFilter::all(),
            pool: PoolConfig::new(2, 10),
        };
        let err = engine.push(&options).await.expect_err("push should abort");
        assert!(matches!(err, SyncError::Remote(_)));
    }

    #[tokio::test]
    async fn test_push_filter_fires_skipped() {
        let driver = MemoryDriver::new();
        driver.seed(set("en", "auth", &[("k", "v")]));
        driver.seed(set("fr", "auth", &[("k", "v")]));
        let engine = SyncEngine::new(driver, StubRemote::default());

        let options = PushOptions {
            filter: SetFilter {
                only_locales: vec!["en".into()],
                ..Default::default()
            },
            pool: PoolConfig::new(2, 10),
        };
        let report = engine.push(&options).await.unwrap();
        assert_eq!(report.total_pushable, 1);
        assert_eq!(report.total_pushed, 1);
        assert_eq!(report.skipped, 1);
    }

    #[tokio::test]
    async fn test_init_stamps_metadata() {
        let driver = MemoryDriver::new();
        driver.seed(set("en", "auth", &[("k", "v")]));
        let engine = SyncEngine::new(driver, StubRemote::default());

        let options = PushOptions {
            filter: SetFilter::all(),
            pool: PoolConfig::new(2, 10),
        };
        engine.init(&options).await.unwrap();

        let pushed = engine.remote.pushed.lock().unwrap();
        let meta = pushed[0][0].meta.as_ref().expect("meta stamped");
        assert_eq!(meta.get(META_INITIAL_IMPORT), Some(&serde_json::Value::Bool(true)));
    }
}
