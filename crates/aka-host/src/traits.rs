//! The collaborator traits reconciliation is written against.
//!
//! Any host (a reference manager, a database, the in-memory test host)
//! implements these to take part in alias reconciliation.

use std::fmt;
use std::sync::Arc;

use aka_types::{Record, RecordKey};
use async_trait::async_trait;

use crate::error::Result;

/// Record services provided by the host.
///
/// Implementations must be thread-safe (`Send + Sync`). Every method may
/// suspend; callers await them one at a time.
#[async_trait]
pub trait RecordHost: Send + Sync {
    /// Persist the record, including its current metadata text.
    async fn save_record(&self, record: &Record) -> Result<()>;

    /// Create a note record under `parent` and return its key.
    async fn create_note(&self, parent: &Record, text: &str) -> Result<RecordKey>;

    /// Render `records` as bibliographic text.
    ///
    /// Callers treat a failure as empty text.
    async fn export_bibliography(&self, records: &[Record]) -> Result<String>;
}

/// The host's structural merge of `secondaries` into `primary`.
///
/// `primary` reflects the host's post-merge state when the call returns.
/// The error type is the host's own; reconciliation hands it back unchanged.
#[async_trait]
pub trait StructuralMerge: Send + Sync {
    type Output: Send;
    type Error: fmt::Display + Send;

    async fn merge(
        &self,
        primary: &mut Record,
        secondaries: &[Record],
    ) -> std::result::Result<Self::Output, Self::Error>;
}

#[async_trait]
impl<'a, M: StructuralMerge + ?Sized> StructuralMerge for &'a M {
    type Output = M::Output;
    type Error = M::Error;

    async fn merge(
        &self,
        primary: &mut Record,
        secondaries: &[Record],
    ) -> std::result::Result<Self::Output, Self::Error> {
        (**self).merge(primary, secondaries).await
    }
}

#[async_trait]
impl<T: RecordHost + ?Sized> RecordHost for Arc<T> {
    async fn save_record(&self, record: &Record) -> Result<()> {
        (**self).save_record(record).await
    }

    async fn create_note(&self, parent: &Record, text: &str) -> Result<RecordKey> {
        (**self).create_note(parent, text).await
    }

    async fn export_bibliography(&self, records: &[Record]) -> Result<String> {
        (**self).export_bibliography(records).await
    }
}
