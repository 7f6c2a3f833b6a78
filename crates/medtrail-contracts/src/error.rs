//! Error types for the MEDTRAIL audit trail.
//!
//! Every fallible operation returns `MedResult<T>`. Variants are grouped into
//! classes (`ErrorClass`) so callers can tell "cannot sign" from "cannot
//! persist" from "the chain is broken" without parsing messages.

use thiserror::Error;

/// The unified error type for the MEDTRAIL crates.
#[derive(Debug, Error)]
pub enum MedtrailError {
    /// The caller supplied a malformed actor, action kind, or subject.
    ///
    /// Raised before any lock is taken; no entry was recorded.
    #[error("invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    /// Key material is missing, undecodable, of the wrong length, or the
    /// public key does not belong to the private key.
    #[error("key material error: {reason}")]
    KeyMaterial { reason: String },

    /// The signer could not produce a signature for a digest.
    #[error("signing failed: {reason}")]
    SigningFailed { reason: String },

    /// The storage layer failed to read or persist.
    ///
    /// The append that hit this error left no partial entry behind.
    #[error("storage error: {reason}")]
    Storage { reason: String },

    /// The exclusive tail lock could not be acquired in time.
    #[error("audit log is locked by another writer: {reason}")]
    LockContention { reason: String },

    /// A storage constraint rejected the write (duplicate digest or
    /// sequence, or an attempt to modify an existing entry).
    #[error("storage constraint violated: {reason}")]
    ConstraintViolation { reason: String },

    /// Verification found a broken chain.
    #[error("audit chain broken at entry {sequence_id}: {reason}")]
    ChainIntegrity { sequence_id: u64, reason: String },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    Config { reason: String },
}

/// Broad category of a `MedtrailError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Input,
    Key,
    Storage,
    Integrity,
    Config,
}

impl MedtrailError {
    /// Return the class this error belongs to.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidInput { .. } => ErrorClass::Input,
            Self::KeyMaterial { .. } | Self::SigningFailed { .. } => ErrorClass::Key,
            Self::Storage { .. } | Self::LockContention { .. } | Self::ConstraintViolation { .. } => {
                ErrorClass::Storage
            }
            Self::ChainIntegrity { .. } => ErrorClass::Integrity,
            Self::Config { .. } => ErrorClass::Config,
        }
    }

    /// Shorthand for `MedtrailError::Storage`.
    pub fn storage(reason: impl Into<String>) -> Self {
        Self::Storage { reason: reason.into() }
    }
}

/// Convenience alias used throughout the MEDTRAIL crates.
pub type MedResult<T> = Result<T, MedtrailError>;
