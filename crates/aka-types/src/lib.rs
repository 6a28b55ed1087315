//! Foundation types for alias reconciliation.
//!
//! This crate provides the alias-set type, the host record model, and the
//! text encoding that stores an alias set inside a record's free-text
//! metadata field. Every other `aka` crate depends on `aka-types`.
//!
//! # Key Types
//!
//! - [`AliasSet`] -- Sorted set of alternate identifiers with change detection
//! - [`Dialect`] -- Legacy (`;`-delimited) or current (space-delimited) encoding
//! - [`Record`] -- A host record: key, library, metadata text, relation links
//! - [`AliasExtractor`] -- Reads and rewrites the governing alias line
//! - [`locator_to_key`] -- Derives `"<scope>:<key>"` from a record locator

pub mod alias_set;
pub mod doi;
pub mod encoding;
pub mod error;
pub mod locator;
pub mod record;

pub use alias_set::{AliasSet, Dialect};
pub use doi::{clean_doi, DoiCandidates};
pub use encoding::{AliasExtractor, AliasTags, CURRENT_TAG, LEGACY_TAG};
pub use error::TypeError;
pub use locator::{locator_key, locator_to_key, DEFAULT_LOCATOR_BASE};
pub use record::{Library, LibraryKind, Record, RecordKey, RecordKind, RelationKind, RelationLinks, RelationValue};
