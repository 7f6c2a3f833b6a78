//! Chain replay for the MEDTRAIL audit trail.
//!
//! `ChainVerifier` implements the `ChainAuditor` trait from `medtrail-core`.
//! It reads the log in ascending `sequence_id` order, in batches, and
//! checks every entry in this order:
//!
//! 1. **Sequence**: the entry's id is exactly one more than the previous one.
//! 2. **Digest**: the stored digest equals the digest recomputed from the
//!    entry's own stored fields.
//! 3. **Uniqueness**: no earlier entry carries the same digest, which
//!    catches an old entry replayed under a new sequence id.
//! 4. **Link**: `previous_digest` equals the previous entry's stored digest
//!    (the empty genesis sentinel for the first entry).
//! 5. **Signature**: the stored signature verifies over the stored digest
//!    with the log's public key.
//!
//! Each broken entry is reported once, with the first failing check. By
//! default the replay stops at the first break; in enumerate-all mode it
//! walks to the end and reports every broken entry.
//!
//! Nothing is ever repaired. A break is returned to the caller as data.

use std::collections::HashMap;

use tracing::{debug, warn};

use medtrail_contracts::{
    entry::{AuditEntry, GENESIS_DIGEST},
    error::MedResult,
    verify::{BreakReason, ChainBreak, VerificationReport},
};
use medtrail_core::{
    chain::entry_digest,
    traits::{AuditStore, ChainAuditor, SignatureVerifier},
};

/// Entries fetched per storage round trip when none is configured.
pub const DEFAULT_BATCH_SIZE: usize = 500;

// ── Walk state ────────────────────────────────────────────────────────────────

/// Running state of one replay.
struct ChainWalk<'v> {
    verifier: &'v dyn SignatureVerifier,
    /// Sequence id and digest of the last entry seen.
    last_sequence_id: u64,
    last_digest: String,
    seen_digests: HashMap<String, u64>,
    checked: u64,
}

impl<'v> ChainWalk<'v> {
    fn new(verifier: &'v dyn SignatureVerifier) -> Self {
        Self {
            verifier,
            last_sequence_id: 0,
            last_digest: GENESIS_DIGEST.to_string(),
            seen_digests: HashMap::new(),
            checked: 0,
        }
    }

    /// Check one entry and advance. Returns the entry's break, if any.
    fn step(&mut self, entry: &AuditEntry) -> Option<ChainBreak> {
        let reason = self.first_failure(entry);

        self.checked += 1;
        self.last_sequence_id = entry.sequence_id;
        self.last_digest = entry.digest.clone();
        self.seen_digests
            .entry(entry.digest.clone())
            .or_insert(entry.sequence_id);

        reason.map(|reason| ChainBreak {
            sequence_id: entry.sequence_id,
            reason,
        })
    }

    fn first_failure(&self, entry: &AuditEntry) -> Option<BreakReason> {
        let expected = self.last_sequence_id + 1;
        if entry.sequence_id != expected {
            return Some(BreakReason::SequenceGap {
                expected,
                found: entry.sequence_id,
            });
        }

        let recomputed = entry_digest(entry);
        if recomputed != entry.digest {
            return Some(BreakReason::DigestMismatch {
                stored: entry.digest.clone(),
                recomputed,
            });
        }

        if let Some(&first_seen) = self.seen_digests.get(&entry.digest) {
            return Some(BreakReason::DuplicateDigest { first_seen });
        }

        if entry.previous_digest != self.last_digest {
            return Some(BreakReason::LinkMismatch {
                stored: entry.previous_digest.clone(),
                expected: self.last_digest.clone(),
            });
        }

        self.verifier
            .check_signature(&entry.digest, &entry.signature)
            .into_break_reason()
    }
}

// ── Public verifier ───────────────────────────────────────────────────────────

/// Replays an audit log and reports where it is broken.
pub struct ChainVerifier {
    verifier: Box<dyn SignatureVerifier>,
    enumerate_all: bool,
    batch_size: usize,
}

impl ChainVerifier {
    /// A verifier that stops at the first break.
    pub fn new(verifier: Box<dyn SignatureVerifier>) -> Self {
        Self {
            verifier,
            enumerate_all: false,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Keep walking after the first break and report every broken entry.
    pub fn enumerate_all(mut self, enumerate_all: bool) -> Self {
        self.enumerate_all = enumerate_all;
        self
    }

    /// Entries per storage read. Zero is treated as one.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Verify an in-memory slice, e.g. an exported log.
    ///
    /// The slice is taken as the whole chain, starting at sequence 1.
    pub fn verify_entries(&self, entries: &[AuditEntry]) -> VerificationReport {
        let mut walk = ChainWalk::new(self.verifier.as_ref());
        let mut breaks = Vec::new();

        for entry in entries {
            if let Some(found) = walk.step(entry) {
                breaks.push(found);
                if !self.enumerate_all {
                    break;
                }
            }
        }

        VerificationReport::from_breaks(walk.checked, breaks)
    }
}

impl ChainAuditor for ChainVerifier {
    /// Replay `store` from the first entry to the current tail.
    ///
    /// Only storage failures are returned as `Err`; a broken chain is an
    /// `Ok` report with `valid == false`.
    fn audit(&self, store: &dyn AuditStore) -> MedResult<VerificationReport> {
        let mut walk = ChainWalk::new(self.verifier.as_ref());
        let mut breaks = Vec::new();
        let mut after = 0;

        'replay: loop {
            let batch = store.read_batch(after, self.batch_size)?;
            let Some(last) = batch.last() else {
                break;
            };
            after = last.sequence_id;
            debug!(from = batch[0].sequence_id, to = after, "verifying batch");

            for entry in &batch {
                if let Some(found) = walk.step(entry) {
                    warn!(sequence_id = found.sequence_id, reason = %found.reason, "chain break");
                    breaks.push(found);
                    if !self.enumerate_all {
                        break 'replay;
                    }
                }
            }
        }

        Ok(VerificationReport::from_breaks(walk.checked, breaks))
    }
}
