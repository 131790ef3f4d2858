//! Error types for the langsync core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Driver errors
// ---------------------------------------------------------------------------

/// Errors from the local translation-set storage driver.
#[derive(Debug, Error)]
pub enum DriverError {
    /// A stored translation set could not be parsed.
    #[error("failed to parse stored translation set at '{path}': {detail}")]
    ParseError { path: String, detail: String },

    /// The requested translation set does not exist locally.
    #[error("translation set not found: {0}")]
    NotFound(String),

    /// Generic I/O wrapper for local reads and writes.
    #[error("driver I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Remote errors
// ---------------------------------------------------------------------------

/// Errors from remote store interactions.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP-level transport error (network, TLS, etc.).
    #[error("remote HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The API returned a non-success status code.
    #[error("remote API error (HTTP {status}): {body}")]
    ApiError { status: u16, body: String },

    /// Authentication token is missing or invalid.
    #[error("remote authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Rate limit exhausted after the bounded number of retries.
    #[error("remote rate limit exceeded after {retries} retries (last wait hint {retry_after_secs}s)")]
    RateLimited {
        retries: u32,
        retry_after_secs: u64,
    },

    /// JSON deserialization failure.
    #[error("remote response parse error: {0}")]
    ParseError(String),
}

// ---------------------------------------------------------------------------
// Conflict errors
// ---------------------------------------------------------------------------

/// Errors from the diff / conflict resolution subsystem.
#[derive(Debug, Error)]
pub enum ConflictError {
    /// Unresolved conflicting lines under a throwing strategy.
    ///
    /// Carries the translation key of the offending set plus the categorized
    /// key lists so callers can surface them to an operator.
    #[error("unresolved conflicts on '{translation_key}' ({conflicting} conflicting lines)")]
    Unresolved {
        translation_key: String,
        conflicting: usize,
        added_keys: Vec<String>,
        updated_keys: Vec<String>,
        removed_keys: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// Sync engine errors
// ---------------------------------------------------------------------------

/// Errors from pull / push operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Conflict raised during pull under a throwing strategy.
    #[error("pull conflict: {0}")]
    Conflict(#[from] ConflictError),

    /// Local read/write failure.
    #[error("sync driver error: {0}")]
    Driver(#[from] DriverError),

    /// Remote failure, terminal at this layer.
    #[error("sync remote error: {0}")]
    Remote(#[from] RemoteError),

    /// A concurrent chunk dispatch task was cancelled or panicked.
    #[error("chunk dispatch task failed: {0}")]
    DispatchFailed(String),
}
