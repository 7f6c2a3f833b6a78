//! Chain verification report types.
//!
//! The verifier never repairs anything; it only describes where the chain
//! stopped being trustworthy and why.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MedResult, MedtrailError};

/// Why a single entry failed verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BreakReason {
    /// The stored digest does not match the digest recomputed from the
    /// entry's own fields.
    DigestMismatch { stored: String, recomputed: String },

    /// The stored `previous_digest` does not match the prior entry's digest.
    LinkMismatch { stored: String, expected: String },

    /// The signature is not decodable (bad hex or wrong length).
    SignatureMalformed { detail: String },

    /// The signature is well-formed but does not verify against the digest.
    SignatureMismatch,

    /// The entry's `sequence_id` is not the successor of the prior entry's.
    SequenceGap { expected: u64, found: u64 },

    /// Another entry already carries this digest.
    DuplicateDigest { first_seen: u64 },
}

impl fmt::Display for BreakReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DigestMismatch { stored, recomputed } => write!(
                f,
                "digest mismatch (stored {stored}, recomputed {recomputed})"
            ),
            Self::LinkMismatch { stored, expected } => write!(
                f,
                "chain link mismatch (previous digest {stored:?}, expected {expected:?})"
            ),
            Self::SignatureMalformed { detail } => write!(f, "malformed signature: {detail}"),
            Self::SignatureMismatch => write!(f, "signature does not verify"),
            Self::SequenceGap { expected, found } => {
                write!(f, "sequence gap (expected {expected}, found {found})")
            }
            Self::DuplicateDigest { first_seen } => {
                write!(f, "digest already used by entry {first_seen}")
            }
        }
    }
}

/// Result of checking one signature against one digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureCheck {
    Valid,
    /// Not decodable as a signature at all.
    Malformed(String),
    /// Decodable, but not produced by the log's key for this digest.
    Mismatch,
}

impl SignatureCheck {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Map a failed check onto a break reason; `None` when valid.
    pub fn into_break_reason(self) -> Option<BreakReason> {
        match self {
            Self::Valid => None,
            Self::Malformed(detail) => Some(BreakReason::SignatureMalformed { detail }),
            Self::Mismatch => Some(BreakReason::SignatureMismatch),
        }
    }
}

/// One broken entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainBreak {
    pub sequence_id: u64,
    pub reason: BreakReason,
}

impl fmt::Display for ChainBreak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entry {}: {}", self.sequence_id, self.reason)
    }
}

/// Outcome of replaying the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    /// True when no break was found. An empty log is valid.
    pub valid: bool,

    /// Entries read before verification finished or stopped.
    pub entries_checked: u64,

    /// Breaks in ascending `sequence_id` order. Holds at most one entry
    /// unless the verifier ran in enumerate-all mode.
    pub breaks: Vec<ChainBreak>,
}

impl VerificationReport {
    pub fn from_breaks(entries_checked: u64, breaks: Vec<ChainBreak>) -> Self {
        Self {
            valid: breaks.is_empty(),
            entries_checked,
            breaks,
        }
    }

    /// The earliest break, if any.
    pub fn first_break(&self) -> Option<&ChainBreak> {
        self.breaks.first()
    }

    /// Human-readable one-line result.
    pub fn summary(&self) -> String {
        match self.first_break() {
            None => format!(
                "audit chain verified: {} entries intact",
                self.entries_checked
            ),
            Some(first) if self.breaks.len() == 1 => {
                format!("audit chain broken at {first}")
            }
            Some(first) => format!(
                "audit chain broken at {first} ({} breaks in total)",
                self.breaks.len()
            ),
        }
    }

    /// Turn an invalid report into `MedtrailError::ChainIntegrity`.
    pub fn into_result(self) -> MedResult<Self> {
        match self.breaks.first() {
            None => Ok(self),
            Some(first) => Err(MedtrailError::ChainIntegrity {
                sequence_id: first.sequence_id,
                reason: first.reason.to_string(),
            }),
        }
    }
}
