//! Error types for the change-detection engine
//!
//! Errors never cross into the host: the orchestrator logs them and falls
//! back. They exist so the adapters and the CLI can report what went wrong.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for classwatch operations
#[derive(Debug, Error)]
pub enum WatchError {
    /// Reading or writing a file failed
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Persisted data could not be encoded or decoded
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Configuration was invalid or unreadable
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A note's frontmatter block is not valid YAML
    #[error("Malformed frontmatter in {path}: {message}")]
    Frontmatter { path: String, message: String },

    /// The filesystem watcher failed
    #[error("Watcher error: {message}")]
    Watcher { message: String },
}

impl WatchError {
    /// Create an I/O error bound to a path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization { message: message.into() }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    /// Create a frontmatter error
    pub fn frontmatter(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Frontmatter { path: path.into(), message: message.into() }
    }

    /// Create a watcher error
    pub fn watcher(message: impl Into<String>) -> Self {
        Self::Watcher { message: message.into() }
    }
}

impl From<serde_json::Error> for WatchError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<notify::Error> for WatchError {
    fn from(err: notify::Error) -> Self {
        Self::watcher(err.to_string())
    }
}

/// Result type alias for classwatch operations
pub type Result<T> = std::result::Result<T, WatchError>;
