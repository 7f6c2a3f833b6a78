//! Action kinds and append-request validation.
//!
//! The log does not restrict which action kinds exist; the constants below
//! are the ones the records service emits. Validation only guarantees the
//! tag is short, printable and unambiguous in the canonical encoding.

use crate::error::{MedResult, MedtrailError};

pub const CREATE_RECORD: &str = "CREATE_RECORD";
pub const UPDATE_RECORD: &str = "UPDATE_RECORD";
pub const DELETE_RECORD: &str = "DELETE_RECORD";
pub const READ_RECORDS: &str = "READ_RECORDS";
pub const SEARCH_PATIENT_RECORDS: &str = "SEARCH_PATIENT_RECORDS";
pub const EMERGENCY_ACCESS: &str = "EMERGENCY_ACCESS";

/// Longest accepted action kind, in bytes.
pub const MAX_ACTION_KIND_LEN: usize = 64;

/// Largest identifier the storage layer can hold (SQLite `INTEGER`).
pub const MAX_ID: u64 = i64::MAX as u64;

/// Check an action kind: 1..=64 bytes of `[A-Za-z0-9_.:-]`.
pub fn validate_action_kind(action_kind: &str) -> MedResult<()> {
    if action_kind.is_empty() {
        return Err(MedtrailError::InvalidInput {
            field: "action_kind",
            reason: "must not be empty".to_string(),
        });
    }
    if action_kind.len() > MAX_ACTION_KIND_LEN {
        return Err(MedtrailError::InvalidInput {
            field: "action_kind",
            reason: format!(
                "is {} bytes, longer than the {} byte limit",
                action_kind.len(),
                MAX_ACTION_KIND_LEN
            ),
        });
    }
    if let Some(bad) = action_kind
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':')))
    {
        return Err(MedtrailError::InvalidInput {
            field: "action_kind",
            reason: format!("contains disallowed character {bad:?}"),
        });
    }
    Ok(())
}

/// Check that an actor or subject identifier fits the storage range.
pub fn validate_id(field: &'static str, id: u64) -> MedResult<()> {
    if id > MAX_ID {
        return Err(MedtrailError::InvalidInput {
            field,
            reason: format!("{id} exceeds the maximum identifier {MAX_ID}"),
        });
    }
    Ok(())
}

/// Validate a full append request.
pub fn validate_request(actor_id: u64, action_kind: &str, subject_id: Option<u64>) -> MedResult<()> {
    validate_id("actor_id", actor_id)?;
    validate_action_kind(action_kind)?;
    if let Some(subject) = subject_id {
        validate_id("subject_id", subject)?;
    }
    Ok(())
}
