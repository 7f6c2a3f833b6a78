//! Errors returned by the reference records service.

use thiserror::Error;

use medtrail_contracts::error::MedtrailError;

#[derive(Debug, Error)]
pub enum RecordsError {
    /// No record with this id exists in the book.
    #[error("medical record {record_id} not found")]
    NotFound { record_id: u64 },

    /// The record book's lock was poisoned by a panicking writer.
    #[error("record book unavailable: {reason}")]
    Unavailable { reason: String },

    /// The audit append failed, so the operation was rolled back.
    #[error("operation not performed, audit append failed: {0}")]
    Audit(#[from] MedtrailError),
}

pub type RecordsResult<T> = Result<T, RecordsError>;
