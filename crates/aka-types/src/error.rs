use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    /// A relation locator does not have the `/(users|groups)/<id>/items/<key>` shape.
    #[error("locator does not name a library item: {0}")]
    LocatorMismatch(String),

    /// No DOI could be found in the given text.
    #[error("no DOI found in {0:?}")]
    InvalidDoi(String),
}
