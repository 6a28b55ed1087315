//! Error types for host operations.

use aka_types::RecordKey;
use thiserror::Error;

/// Errors reported by a host collaborator.
#[derive(Debug, Error)]
pub enum HostError {
    /// The record is not known to the host.
    #[error("record not found: {0}")]
    NotFound(RecordKey),

    /// Persisting a record failed.
    #[error("failed to save record {key}: {reason}")]
    Save { key: RecordKey, reason: String },

    /// Creating a note under a parent record failed.
    #[error("failed to create note under {parent}: {reason}")]
    Note { parent: RecordKey, reason: String },

    /// Bibliographic export failed.
    #[error("export failed: {0}")]
    Export(String),

    /// The structural merge failed.
    #[error("merge failed: {0}")]
    Merge(String),

    /// Internal state could not be accessed.
    #[error("lock poisoned: {0}")]
    Lock(String),
}

/// Convenience type alias for host operations.
pub type Result<T> = std::result::Result<T, HostError>;
