//! Error types for Replica
//!
//! All modules use `ReplicaResult<T>` as their return type. Errors are
//! `Clone` so a node can cache its terminal error and hand the same value
//! to every caller.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Result type alias for Replica operations
pub type ReplicaResult<T> = Result<T, ReplicaError>;

/// All errors that can occur in Replica
#[derive(Error, Debug, Clone)]
pub enum ReplicaError {
    // Filesystem errors
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: Arc<io::Error>,
    },

    // Configuration errors
    #[error("Invalid configuration at {}: {reason}", .path.display())]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {}: {source}", .path.display())]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },

    #[error("TOML serialize error: {0}")]
    TomlSerialize(String),

    #[error("Invalid limit {name}: {reason}")]
    InvalidLimit { name: &'static str, reason: String },

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ReplicaError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source: Arc::new(source),
        }
    }

    /// Map an IO error on `path`, keeping a missing file distinguishable
    pub fn from_io(context: &str, path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            Self::NotFound(path.to_path_buf())
        } else {
            Self::io(format!("{} {}", context, path.display()), source)
        }
    }

    /// Check if the error is the non-fatal missing-file case
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::NotFound(_) => Some("Check that the source directory exists and is readable"),
            Self::InvalidLimit { .. } => Some("Limits must be greater than zero"),
            Self::ConfigInvalid { .. } => Some("Run: replica config init --force"),
            _ => None,
        }
    }
}

impl From<toml::ser::Error> for ReplicaError {
    fn from(err: toml::ser::Error) -> Self {
        Self::TomlSerialize(err.to_string())
    }
}
