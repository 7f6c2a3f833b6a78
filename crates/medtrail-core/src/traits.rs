//! Core trait definitions for the MEDTRAIL audit trail.
//!
//! These four traits define the seams around the append coordinator:
//!
//! - `AuditStore`: append-only persistence with an exclusive tail lock
//! - `DigestSigner`: signs entry digests with the log's private key
//! - `SignatureVerifier`: checks signatures with the log's public key
//! - `ChainAuditor`: replays a store and reports breaks
//!
//! `AuditTrail` wires them together. Implementations live in
//! `medtrail-store`, `medtrail-signing` and `medtrail-verify`.

use std::sync::Arc;

use medtrail_contracts::{
    entry::{AuditEntry, ChainTail, SealedEntry},
    error::MedResult,
    query::{AuditFilter, AuditPage, PageRequest},
    verify::{SignatureCheck, VerificationReport},
};

/// Builds the next entry while the store holds the tail lock.
///
/// Receives the current tail and returns the hashed and signed entry. An
/// `Err` aborts the append and nothing is persisted.
pub type BuildEntry<'a> = &'a mut dyn FnMut(&ChainTail) -> MedResult<SealedEntry>;

/// Append-only storage for one audit log.
///
/// Entries are never updated or deleted through this trait. Reads may run
/// concurrently with appends and observe any committed prefix of the log.
pub trait AuditStore: Send + Sync {
    /// Append one entry under an exclusive lock on the tail.
    ///
    /// Implementations must:
    /// 1. acquire a lock that excludes every other append on this log,
    /// 2. read the current tail and pass it to `build`,
    /// 3. persist the returned entry with `sequence_id = tail + 1`,
    /// 4. release the lock only after commit or rollback.
    ///
    /// If `build` fails or the write fails, nothing is persisted and the
    /// tail is unchanged.
    fn append_locked(&self, build: BuildEntry<'_>) -> MedResult<AuditEntry>;

    /// The last committed entry's position and digest.
    fn tail(&self) -> MedResult<ChainTail>;

    /// Number of committed entries.
    fn count(&self) -> MedResult<u64>;

    /// Up to `limit` entries with `sequence_id > after`, ascending.
    fn read_batch(&self, after: u64, limit: usize) -> MedResult<Vec<AuditEntry>>;

    /// Filtered, paginated listing in ascending `sequence_id` order.
    fn query(&self, filter: &AuditFilter, page: PageRequest) -> MedResult<AuditPage>;
}

/// Shared stores behave like the store they point to.
impl<S: AuditStore + ?Sized> AuditStore for Arc<S> {
    fn append_locked(&self, build: BuildEntry<'_>) -> MedResult<AuditEntry> {
        (**self).append_locked(build)
    }

    fn tail(&self) -> MedResult<ChainTail> {
        (**self).tail()
    }

    fn count(&self) -> MedResult<u64> {
        (**self).count()
    }

    fn read_batch(&self, after: u64, limit: usize) -> MedResult<Vec<AuditEntry>> {
        (**self).read_batch(after, limit)
    }

    fn query(&self, filter: &AuditFilter, page: PageRequest) -> MedResult<AuditPage> {
        (**self).query(filter, page)
    }
}

/// Signs entry digests with the log's private key.
pub trait DigestSigner: Send + Sync {
    /// Return the hex signature over `digest`.
    ///
    /// A failure here aborts the append; it must be reported as a key
    /// error, never as a storage error.
    fn sign_digest(&self, digest: &str) -> MedResult<String>;

    /// Hex public key matching the signing key. Safe to log.
    fn public_key_hex(&self) -> String;
}

/// Checks entry signatures with the log's public key.
pub trait SignatureVerifier: Send + Sync {
    fn check_signature(&self, digest: &str, signature: &str) -> SignatureCheck;
}

/// Replays a store and reports where the chain breaks.
pub trait ChainAuditor: Send + Sync {
    fn audit(&self, store: &dyn AuditStore) -> MedResult<VerificationReport>;
}
