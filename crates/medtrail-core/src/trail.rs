//! The append coordinator: the single ordering point of an audit log.
//!
//! Every append follows the same pipeline:
//!
//!   Validate → [lock tail] → Timestamp → Digest → Sign → Persist → [unlock]
//!
//! Validation happens before the lock so malformed requests never contend
//! with real writers. Everything between taking and releasing the lock runs
//! inside `AuditStore::append_locked`, so two appends can never observe the
//! same tail and fork the chain.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use medtrail_contracts::{
    action::validate_request,
    entry::{AuditEntry, ChainTail, SealedEntry},
    error::MedResult,
    query::{AuditFilter, AuditPage, PageRequest},
    verify::VerificationReport,
};

use crate::{
    chain::{compute_digest, truncate_timestamp},
    traits::{AuditStore, ChainAuditor, DigestSigner},
};

/// Source of append timestamps.
pub type ClockFn = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// An explicitly constructed audit log service.
///
/// Owns the store, the signer and the chain auditor for one log. Share it
/// between request handlers behind an `Arc`; all methods take `&self`.
pub struct AuditTrail {
    store: Box<dyn AuditStore>,
    signer: Box<dyn DigestSigner>,
    auditor: Box<dyn ChainAuditor>,
    clock: ClockFn,
}

impl AuditTrail {
    /// Create a trail over `store`, signing with `signer` and verifying
    /// with `auditor`. Timestamps come from the system clock.
    pub fn new(
        store: Box<dyn AuditStore>,
        signer: Box<dyn DigestSigner>,
        auditor: Box<dyn ChainAuditor>,
    ) -> Self {
        Self {
            store,
            signer,
            auditor,
            clock: Box::new(Utc::now),
        }
    }

    /// Replace the timestamp source.
    pub fn with_clock(mut self, clock: ClockFn) -> Self {
        self.clock = clock;
        self
    }

    /// Record one action.
    ///
    /// Returns the persisted entry; its `sequence_id` is the entry ID.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` before any lock is taken,
    /// - `SigningFailed` / `KeyMaterial` when the digest cannot be signed,
    /// - `Storage`, `LockContention` or `ConstraintViolation` when the entry
    ///   cannot be persisted.
    ///
    /// In every error case the log is unchanged.
    pub fn append(
        &self,
        actor_id: u64,
        action_kind: &str,
        subject_id: Option<u64>,
    ) -> MedResult<AuditEntry> {
        if let Err(e) = validate_request(actor_id, action_kind, subject_id) {
            warn!(actor_id, action_kind = ?action_kind, error = %e, "audit append rejected");
            return Err(e);
        }

        let mut build = |tail: &ChainTail| -> MedResult<SealedEntry> {
            let timestamp = truncate_timestamp((self.clock)());
            let digest =
                compute_digest(actor_id, action_kind, subject_id, &timestamp, &tail.digest);
            let signature = self.signer.sign_digest(&digest)?;

            debug!(
                sequence_id = tail.next_sequence_id(),
                digest = %digest,
                "audit entry sealed"
            );

            Ok(SealedEntry {
                actor_id,
                action_kind: action_kind.to_string(),
                subject_id,
                timestamp,
                previous_digest: tail.digest.clone(),
                digest,
                signature,
            })
        };

        match self.store.append_locked(&mut build) {
            Ok(entry) => {
                info!(
                    sequence_id = entry.sequence_id,
                    actor_id,
                    action_kind,
                    subject_id = ?subject_id,
                    "audit entry appended"
                );
                Ok(entry)
            }
            Err(e) => {
                warn!(
                    actor_id,
                    action_kind,
                    subject_id = ?subject_id,
                    class = ?e.class(),
                    error = %e,
                    "audit append failed, nothing persisted"
                );
                Err(e)
            }
        }
    }

    /// Filtered, paginated listing in chronological order.
    pub fn list(&self, filter: &AuditFilter, page: PageRequest) -> MedResult<AuditPage> {
        self.store.query(filter, page)
    }

    /// Replay the whole log and report the first (or every) break.
    pub fn verify_chain(&self) -> MedResult<VerificationReport> {
        let report = self.auditor.audit(self.store.as_ref())?;
        if report.valid {
            info!(entries = report.entries_checked, "audit chain verified");
        } else {
            warn!(summary = %report.summary(), "audit chain verification failed");
        }
        Ok(report)
    }

    /// Number of committed entries.
    pub fn len(&self) -> MedResult<u64> {
        self.store.count()
    }

    /// True when nothing has been appended yet.
    pub fn is_empty(&self) -> MedResult<bool> {
        Ok(self.len()? == 0)
    }

    /// The last committed entry's position and digest.
    pub fn tail(&self) -> MedResult<ChainTail> {
        self.store.tail()
    }

    /// Hex public key of the signing key, for operators and verifiers.
    pub fn public_key_hex(&self) -> String {
        self.signer.public_key_hex()
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
