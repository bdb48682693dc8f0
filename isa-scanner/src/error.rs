//! Error types for the scanner core

use isa_common::models::SessionId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScannerError>;

/// Scanner errors
///
/// Every variant is scoped to the operation that produced it; none leaves
/// the batch or session state partially updated.
#[derive(Debug, Error)]
pub enum ScannerError {
    // ------------------------------------------------------------------
    // Batch violations
    // ------------------------------------------------------------------
    #[error("No item at index {index} (batch has {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Quantity must be a positive number, got {0}")]
    InvalidQuantity(f64),

    #[error("Item {index} is {state} and cannot be edited")]
    NotEditable { index: usize, state: &'static str },

    #[error("Item {index} is {state}; only pending items can be removed")]
    NotRemovable { index: usize, state: &'static str },

    #[error("Batch has submissions in flight")]
    BatchBusy,

    #[error("Batch still has unsubmitted items")]
    BatchOpen,

    #[error("Item {index} is already being submitted")]
    AlreadySubmitting { index: usize },

    #[error("Item {index} was already submitted")]
    AlreadySubmitted { index: usize },

    #[error("Item {index} has not been submitted")]
    NotSubmitted { index: usize },

    #[error("Deletion of item {index} is already in progress")]
    RetractInProgress { index: usize },

    #[error("No candidates detected yet")]
    NoCandidates,

    #[error("Identifier must not be empty")]
    EmptyIdentifier,

    #[error("Record {0} is not part of this scanner's history")]
    UnknownRecord(i64),

    #[error("Deletion of record {0} is already in progress")]
    RecordRetractInProgress(i64),

    // ------------------------------------------------------------------
    // Session violations
    // ------------------------------------------------------------------
    #[error("No active session")]
    NoActiveSession,

    #[error("Session {0} is already active")]
    SessionAlreadyActive(SessionId),

    #[error("BOM mode requires a category")]
    MissingCategory,

    #[error("BOM mode requires a bill of materials")]
    MissingBom,

    #[error("No session choice is pending")]
    NotChoosing,

    #[error("Session {0} is not among the discovered sessions")]
    UnknownSession(SessionId),

    #[error("{0} item(s) not yet sent; submit or discard them first")]
    UnsentItems(usize),

    // ------------------------------------------------------------------
    // Backend
    // ------------------------------------------------------------------
    #[error(transparent)]
    Backend(#[from] isa_common::Error),
}

impl ScannerError {
    /// True when the backend rejected the token
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ScannerError::Backend(e) if e.is_auth_failure())
    }
}
