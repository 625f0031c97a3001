//! Error types for the reconciliation engine.

use regsync_core::{ArtifactPhase, CoreError};
use thiserror::Error;

/// Result type for engine operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while reconciling the registry.
#[derive(Error, Debug)]
pub enum SyncError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Definition store error.
    #[error("store error: {0}")]
    Store(#[from] CoreError),

    /// Registry directory traversal failed.
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// The change watcher could not be set up.
    #[error("watcher error: {0}")]
    Watcher(#[from] notify::Error),

    /// Definition content is malformed.
    #[error("parse error in {location}: {message}")]
    Parse {
        /// Location of the definition.
        location: String,
        /// Description of the problem.
        message: String,
    },

    /// A phase handler failed for an artifact.
    #[error("phase {phase} failed for {key}: {message}")]
    Phase {
        /// Key of the artifact.
        key: String,
        /// Phase in which the failure happened.
        phase: ArtifactPhase,
        /// Description of the failure.
        message: String,
    },

    /// Cleanup of a removed artifact failed.
    #[error("cleanup failed for {key}: {message}")]
    Cleanup {
        /// Key of the artifact.
        key: String,
        /// Description of the failure.
        message: String,
    },

    /// A synchronizer or its backing service reported an error.
    #[error("synchronizer error: {0}")]
    Synchronizer(String),

    /// Invalid engine configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Creates a parse error for a definition location.
    pub fn parse(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            location: location.into(),
            message: message.into(),
        }
    }

    /// Creates a phase error for an artifact key.
    pub fn phase(key: impl Into<String>, phase: ArtifactPhase, message: impl Into<String>) -> Self {
        Self::Phase {
            key: key.into(),
            phase,
            message: message.into(),
        }
    }

    /// Creates a cleanup error for an artifact key.
    pub fn cleanup(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Cleanup {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates a generic synchronizer error.
    pub fn synchronizer(message: impl Into<String>) -> Self {
        Self::Synchronizer(message.into())
    }
}
