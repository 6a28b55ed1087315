//! Merge reconciliation for record aliases.
//!
//! When a host merges secondary records into a primary, the alternate
//! identifiers of every record in the group must survive on the primary.
//! This crate wraps the host's merge: it unions the group's alias sets
//! beforehand, snapshots the pre-merge state, lets the host merge, and then
//! writes the union and a history note back to the primary.
//!
//! Only the host merge's own result is returned. Alias and history work is
//! best-effort: failures are logged through `tracing` and collected in a
//! [`ReconcileReport`], never surfaced as merge failures.

pub mod config;
pub mod error;
pub mod history;
pub mod reconciler;
pub mod service;

pub use config::ReconcilerConfig;
pub use error::{ReconcileError, ServiceError, ServiceResult};
pub use history::{AuditValue, HistorySnapshot, ItemDetails};
pub use reconciler::{Clock, MergeReconciler, ReconcileReport};
pub use service::{
    AliasService, AssignOutcome, DetailsNote, KeyAssignment, ReconcilingMerge, ServiceState,
};
