use aka_host::HostError;
use thiserror::Error;

use crate::service::ServiceState;

/// A best-effort step of a reconciliation that failed.
///
/// These never reach the caller of a merge. They are logged and collected
/// in the [`ReconcileReport`](crate::ReconcileReport).
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The bibliographic export for the history snapshot failed; the
    /// snapshot was built with an empty export.
    #[error("history export failed: {0}")]
    SnapshotExport(#[source] HostError),

    /// Saving the rewritten alias line failed.
    #[error("alias write-back failed: {0}")]
    AliasWriteBack(#[source] HostError),

    /// Creating the history note failed.
    #[error("history note failed: {0}")]
    NoteWriteBack(#[source] HostError),
}

/// Errors from the alias service itself.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The operation needs a started service.
    #[error("alias service is not ready (state: {0:?})")]
    NotReady(ServiceState),

    /// The configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O error while reading configuration.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
