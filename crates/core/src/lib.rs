//! LangSync core library.
//!
//! This crate provides the foundational components for bidirectional
//! translation-set synchronization: configuration, local storage drivers,
//! three-way diffing, conflict resolution, batched push dispatch, the
//! remote API client, and the sync engine.

pub mod batch;
pub mod config;
pub mod conflict;
pub mod diff;
pub mod driver;
pub mod errors;
pub mod events;
pub mod filter;
pub mod model;
pub mod remote;
pub mod sync_engine;

// Re-exports for convenience.
pub use config::AppConfig;
pub use conflict::ConflictStrategy;
pub use diff::Differ;
pub use driver::Driver;
pub use filter::SetFilter;
pub use remote::{HttpRemote, Remote};
pub use sync_engine::SyncEngine;
