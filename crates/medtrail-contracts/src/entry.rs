//! Audit entry types.
//!
//! `AuditEntry` is a single persisted link in the hash chain. `SealedEntry`
//! is the same entry after hashing and signing but before the store has
//! assigned it a sequence number. `ChainTail` is what the store hands the
//! coordinator while it holds the tail lock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The `previous_digest` of the first entry in every log.
pub const GENESIS_DIGEST: &str = "";

/// A single, immutable entry in the audit chain.
///
/// Changing any field after persistence invalidates either `digest`, the
/// next entry's `previous_digest`, or `signature`, and verification reports
/// the break.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Position in the chain, starting at 1. Gapless within one log.
    pub sequence_id: u64,

    /// Principal that performed the action.
    pub actor_id: u64,

    /// Action tag such as `CREATE_RECORD`. The set is open.
    pub action_kind: String,

    /// Record affected by the action, absent for bulk reads.
    pub subject_id: Option<u64>,

    /// UTC instant assigned by the coordinator, microsecond precision.
    pub timestamp: DateTime<Utc>,

    /// `digest` of entry `sequence_id - 1`, or `GENESIS_DIGEST`.
    pub previous_digest: String,

    /// Lowercase hex SHA-256 of the canonical encoding.
    pub digest: String,

    /// Lowercase hex signature over `digest`.
    pub signature: String,
}

impl AuditEntry {
    /// True when this entry claims to start the chain.
    pub fn is_genesis(&self) -> bool {
        self.previous_digest == GENESIS_DIGEST
    }
}

/// A hashed and signed entry waiting for its sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedEntry {
    pub actor_id: u64,
    pub action_kind: String,
    pub subject_id: Option<u64>,
    pub timestamp: DateTime<Utc>,
    pub previous_digest: String,
    pub digest: String,
    pub signature: String,
}

impl SealedEntry {
    /// Attach the sequence number assigned by the store.
    pub fn into_entry(self, sequence_id: u64) -> AuditEntry {
        AuditEntry {
            sequence_id,
            actor_id: self.actor_id,
            action_kind: self.action_kind,
            subject_id: self.subject_id,
            timestamp: self.timestamp,
            previous_digest: self.previous_digest,
            digest: self.digest,
            signature: self.signature,
        }
    }
}

/// The last persisted entry, as seen under the exclusive tail lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainTail {
    /// `sequence_id` of the last entry, 0 for an empty log.
    pub sequence_id: u64,

    /// `digest` of the last entry, `GENESIS_DIGEST` for an empty log.
    pub digest: String,
}

impl ChainTail {
    /// The tail of an empty log.
    pub fn genesis() -> Self {
        Self {
            sequence_id: 0,
            digest: GENESIS_DIGEST.to_string(),
        }
    }

    /// The tail after `entry` has been appended.
    pub fn of(entry: &AuditEntry) -> Self {
        Self {
            sequence_id: entry.sequence_id,
            digest: entry.digest.clone(),
        }
    }

    /// The sequence number the next entry will receive.
    pub fn next_sequence_id(&self) -> u64 {
        self.sequence_id + 1
    }
}
