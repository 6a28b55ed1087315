//! Host collaborator boundary for alias reconciliation.
//!
//! Records belong to a host application. This crate defines the operations
//! reconciliation consumes from that host, and an in-memory host for tests
//! and embedding.
//!
//! # Architecture
//!
//! - **Record persistence** saves a record whose metadata text was rewritten.
//! - **Notes** are new subordinate records attached to a parent.
//! - **Bibliographic export** renders a group of records as text (RIS for
//!   the in-memory host).
//! - **Structural merge** is the host's own merge of secondaries into a
//!   primary. It is authoritative and never reimplemented by reconciliation.
//!
//! # Modules
//!
//! - [`error`] -- Error types for host operations
//! - [`traits`] -- The [`RecordHost`] and [`StructuralMerge`] traits
//! - [`memory`] -- In-memory [`InMemoryHost`] for tests

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{HostError, Result};
pub use memory::{InMemoryHost, StoredNote};
pub use traits::{RecordHost, StructuralMerge};
