//! TOML-based configuration for langsync.
//!
//! The API token is stored as an `_env` field referencing an environment
//! variable name; the actual secret is resolved at runtime via
//! [`AppConfig::resolve_env_vars`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::conflict::ConflictStrategy;
use crate::errors::ConfigError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Remote store settings.
    pub remote: RemoteConfig,

    /// Pull behaviour.
    #[serde(default)]
    pub pull: PullConfig,

    /// Push pipeline bounds.
    #[serde(default)]
    pub push: PushConfig,

    /// Local storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".into()
}

// ---------------------------------------------------------------------------
// Remote
// ---------------------------------------------------------------------------

/// Remote store connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// API base URL (e.g. `https://translate.example.com/api`).
    pub base_url: String,

    /// Project identifier at the remote store.
    pub project: String,

    /// Branch to synchronize against. Default `main`.
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Environment variable holding the API token.
    pub api_token_env: String,

    /// Resolved token (populated by `resolve_env_vars`).
    #[serde(skip)]
    pub token: Option<String>,
}

fn default_branch() -> String {
    "main".into()
}

// ---------------------------------------------------------------------------
// Pull
// ---------------------------------------------------------------------------

/// Pull behaviour configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullConfig {
    /// Sets requested per page. Default 50.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Conflict resolution strategy applied per incoming set.
    #[serde(default)]
    pub strategy: ConflictStrategy,

    /// Accumulate conflicts into the pull report instead of aborting on the
    /// first one.
    #[serde(default)]
    pub silence_conflicts: bool,
}

fn default_page_size() -> usize {
    50
}

impl Default for PullConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            strategy: ConflictStrategy::default(),
            silence_conflicts: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Push
// ---------------------------------------------------------------------------

/// Push pipeline bounds. `max_pool_size` doubles as the concurrency width
/// of a dispatch; `max_chunk_size` bounds the payload per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushConfig {
    #[serde(default = "default_max_pool_size")]
    pub max_pool_size: usize,

    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,
}

fn default_max_pool_size() -> usize {
    4
}

fn default_max_chunk_size() -> usize {
    25
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            max_pool_size: default_max_pool_size(),
            max_chunk_size: default_max_chunk_size(),
        }
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Local storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for persisted sets and tracked snapshots.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./.langsync")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load an [`AppConfig`] from a TOML file at the given path.
    ///
    /// This does **not** resolve environment variables -- call
    /// [`resolve_env_vars`](Self::resolve_env_vars) afterwards.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Resolve the `*_env` fields from environment variables.
    ///
    /// A missing variable logs a warning but does not fail -- callers decide
    /// what their execution mode requires.
    pub fn resolve_env_vars(&mut self) {
        self.remote.token = resolve_optional_env(&self.remote.api_token_env, "remote.api_token_env");
    }

    /// Validate that all required fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.remote.base_url.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "remote.base_url".into(),
                detail: "base URL must not be empty".into(),
            });
        }
        if self.remote.project.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "remote.project".into(),
                detail: "project must not be empty".into(),
            });
        }
        if self.pull.page_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pull.page_size".into(),
                detail: "page size must be > 0".into(),
            });
        }
        if self.push.max_pool_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "push.max_pool_size".into(),
                detail: "pool size must be > 0".into(),
            });
        }
        if self.push.max_chunk_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "push.max_chunk_size".into(),
                detail: "chunk size must be > 0".into(),
            });
        }
        Ok(())
    }

    /// Convenience: load, resolve, and validate in one call.
    pub fn load_and_resolve<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.resolve_env_vars();
        config.validate()?;
        Ok(config)
    }
}

/// Try to read an environment variable by name. Returns `Some(value)` on
/// success; logs a warning and returns `None` if the variable is unset.
fn resolve_optional_env(env_name: &str, field: &str) -> Option<String> {
    match std::env::var(env_name) {
        Ok(val) if !val.is_empty() => {
            debug!(field, env_name, "resolved env var");
            Some(val)
        }
        Ok(_) => {
            warn!(field, env_name, "env var is set but empty");
            None
        }
        Err(_) => {
            warn!(field, env_name, "env var not set");
            None
        }
    }
}
