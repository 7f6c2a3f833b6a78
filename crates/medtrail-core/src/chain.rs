//! Hash-chain primitives: canonical encoding and digest computation.
//!
//! The digest is SHA-256 over a single canonical byte string. Every field
//! that contributes is listed explicitly, in a fixed order, so the same
//! bytes are produced at append time and at verify time on any platform.
//!
//! Canonical encoding, version 1 (UTF-8, each line ends in `\n`):
//!
//! ```text
//! medtrail.audit.v1
//! actor:<decimal actor_id>
//! action:<byte length>:<action_kind>
//! subject:<decimal subject_id>      (or `subject:-` when absent)
//! timestamp:<YYYY-MM-DDTHH:MM:SS.ffffffZ>
//! prev:<previous_digest>            (empty for the first entry)
//! ```
//!
//! The action kind is length-prefixed so no tag can be confused with a
//! neighbouring field. Timestamps are always UTC with exactly six
//! fractional digits.

use chrono::{DateTime, SubsecRound, Utc};
use sha2::{Digest, Sha256};

use medtrail_contracts::{
    entry::AuditEntry,
    error::{MedResult, MedtrailError},
};

/// First line of every canonical encoding.
pub const CANONICAL_VERSION_TAG: &str = "medtrail.audit.v1";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Drop sub-microsecond precision so a timestamp survives storage unchanged.
pub fn truncate_timestamp(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.trunc_subsecs(6)
}

/// Render a timestamp in the canonical fixed-width form.
///
/// The output sorts lexicographically in time order, which the SQLite store
/// relies on for range filters.
pub fn canonical_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a timestamp previously produced by `canonical_timestamp`.
pub fn parse_canonical_timestamp(s: &str) -> MedResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| MedtrailError::storage(format!("unreadable stored timestamp '{s}': {e}")))
}

/// Build the canonical byte string for one entry.
pub fn canonicalize(
    actor_id: u64,
    action_kind: &str,
    subject_id: Option<u64>,
    timestamp: &DateTime<Utc>,
    previous_digest: &str,
) -> Vec<u8> {
    let subject = match subject_id {
        Some(id) => id.to_string(),
        None => "-".to_string(),
    };
    format!(
        "{CANONICAL_VERSION_TAG}\nactor:{actor_id}\naction:{}:{action_kind}\nsubject:{subject}\ntimestamp:{}\nprev:{previous_digest}\n",
        action_kind.len(),
        canonical_timestamp(timestamp),
    )
    .into_bytes()
}

/// Compute the digest for a new entry.
///
/// Returns a lowercase 64-character hex string.
pub fn compute_digest(
    actor_id: u64,
    action_kind: &str,
    subject_id: Option<u64>,
    timestamp: &DateTime<Utc>,
    previous_digest: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonicalize(
        actor_id,
        action_kind,
        subject_id,
        timestamp,
        previous_digest,
    ));
    hex::encode(hasher.finalize())
}

/// Recompute the digest of a stored entry from its own fields.
pub fn entry_digest(entry: &AuditEntry) -> String {
    compute_digest(
        entry.actor_id,
        &entry.action_kind,
        entry.subject_id,
        &entry.timestamp,
        &entry.previous_digest,
    )
}

/// True when the entry's stored digest matches its fields.
pub fn digest_matches(entry: &AuditEntry) -> bool {
    entry.digest == entry_digest(entry)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
