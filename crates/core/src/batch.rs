//! Batch accumulation for the push pipeline.
//!
//! Outgoing translation sets are buffered into bounded [`Chunk`]s inside a
//! bounded [`Pool`]; a [`Batch`] wraps one pool plus push-progress counters.
//! The pool's bounded size is the only backpressure mechanism: once it is
//! full the producer must drain before adding more. The types here are
//! deliberately dispatch-agnostic; turning drained chunks into outbound
//! requests is the sync engine's job.

use std::collections::VecDeque;

use tracing::debug;

use crate::model::TranslationSet;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Bounds for the push pipeline, passed explicitly into every pool.
///
/// `max_pool_size` is the number of chunks buffered per drain and therefore
/// the concurrency width of a dispatch; `max_chunk_size` bounds the payload
/// of one request.
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_pool_size: usize,
    pub max_chunk_size: usize,
}

impl PoolConfig {
    pub fn new(max_pool_size: usize, max_chunk_size: usize) -> Self {
        Self {
            max_pool_size,
            max_chunk_size,
        }
    }

    /// Total sets the pool can buffer before it must be drained.
    pub fn capacity(&self) -> usize {
        self.max_pool_size * self.max_chunk_size
    }
}

// ---------------------------------------------------------------------------
// Chunk
// ---------------------------------------------------------------------------

/// An ordered, append-only list of translation sets bounded by
/// `max_chunk_size`. Insertion order is preserved through dispatch.
#[derive(Debug, Default)]
pub struct Chunk {
    sets: Vec<TranslationSet>,
}

impl Chunk {
    fn new(capacity: usize) -> Self {
        Self {
            sets: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn sets(&self) -> &[TranslationSet] {
        &self.sets
    }

    pub fn into_sets(self) -> Vec<TranslationSet> {
        self.sets
    }
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

/// A FIFO queue of chunks bounded by `max_pool_size`.
#[derive(Debug)]
pub struct Pool {
    config: PoolConfig,
    chunks: VecDeque<Chunk>,
    total: usize,
}

impl Pool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            chunks: VecDeque::with_capacity(config.max_pool_size),
            total: 0,
        }
    }

    /// Append a set to the current open chunk, opening a new chunk once the
    /// current one reaches `max_chunk_size`.
    pub fn add(&mut self, set: TranslationSet) {
        match self.chunks.back_mut() {
            Some(chunk) if chunk.len() < self.config.max_chunk_size => chunk.sets.push(set),
            _ => {
                let mut chunk = Chunk::new(self.config.max_chunk_size);
                chunk.sets.push(set);
                self.chunks.push_back(chunk);
            }
        }
        self.total += 1;
    }

    /// True once total buffered sets reach the pool capacity.
    pub fn is_full(&self) -> bool {
        self.total >= self.config.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Pop and return the oldest chunk.
    pub fn drip(&mut self) -> Option<Chunk> {
        let chunk = self.chunks.pop_front()?;
        self.total -= chunk.len();
        Some(chunk)
    }

    /// Number of buffered chunks.
    pub fn size(&self) -> usize {
        self.chunks.len()
    }

    /// Number of buffered sets across all chunks.
    pub fn total(&self) -> usize {
        self.total
    }
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

/// One pool plus progress counters, exclusively owned by a single push
/// operation. Nothing here persists across operations.
#[derive(Debug)]
pub struct Batch {
    pool: Pool,
    total_pushed: usize,
    total_pushable: usize,
}

impl Batch {
    /// Create a batch sized up front with the number of pushable sets
    /// (progress reporting only, never control flow).
    pub fn new(config: PoolConfig, total_pushable: usize) -> Self {
        Self {
            pool: Pool::new(config),
            total_pushed: 0,
            total_pushable,
        }
    }

    /// Buffer one set. Exactly when the add fills the pool, the whole pool
    /// is drained and returned as FIFO-ordered chunks for dispatch;
    /// otherwise the set stays buffered and `None` is returned.
    pub fn add(&mut self, set: TranslationSet) -> Option<Vec<Chunk>> {
        self.pool.add(set);
        if self.pool.is_full() {
            debug!(chunks = self.pool.size(), "pool full, draining");
            Some(self.drain())
        } else {
            None
        }
    }

    /// Drain whatever remains buffered.
    ///
    /// This is the mandatory end-of-stream step: skipping it silently drops
    /// the tail of sets from ever being dispatched. Returns an empty vec
    /// when the pool is already empty.
    pub fn finish(&mut self) -> Vec<Chunk> {
        if !self.pool.is_empty() {
            debug!(chunks = self.pool.size(), "draining remainder");
        }
        self.drain()
    }

    /// Record sets confirmed dispatched. Only drained chunks feed this
    /// counter.
    pub fn record_pushed(&mut self, count: usize) {
        self.total_pushed += count;
    }

    pub fn total_pushed(&self) -> usize {
        self.total_pushed
    }

    pub fn total_pushable(&self) -> usize {
        self.total_pushable
    }

    fn drain(&mut self) -> Vec<Chunk> {
        let mut drained = Vec::with_capacity(self.pool.size());
        while let Some(chunk) = self.pool.drip() {
            drained.push(chunk);
        }
        drained
    }
}
