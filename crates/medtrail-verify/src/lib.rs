//! # medtrail-verify
//!
//! Chain replay and tamper detection for the MEDTRAIL audit trail.
//!
//! This crate provides [`engine::ChainVerifier`], which implements the
//! [`medtrail_core::traits::ChainAuditor`] trait. It re-derives every
//! entry's digest from the stored fields, checks each link against the
//! previous entry, and verifies each signature with the log's public key.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use medtrail_signing::Ed25519Verifier;
//! use medtrail_verify::ChainVerifier;
//!
//! let verifier = Ed25519Verifier::from_public_hex(&public_hex)?;
//! let auditor = ChainVerifier::new(Box::new(verifier)).enumerate_all(true);
//! let report = auditor.audit(&store)?;
//! println!("{}", report.summary());
//! ```

pub mod engine;

pub use engine::{ChainVerifier, DEFAULT_BATCH_SIZE};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;

    use chrono::{Duration, TimeZone, Utc};

    use medtrail_contracts::{
        action::{CREATE_RECORD, READ_RECORDS, UPDATE_RECORD},
        entry::AuditEntry,
        verify::{BreakReason, VerificationReport},
    };
    use medtrail_core::{
        chain::entry_digest,
        traits::{AuditStore, ChainAuditor, DigestSigner},
        AuditTrail,
    };
    use medtrail_signing::{Ed25519Verifier, KeyPair};
    use medtrail_store::InMemoryAuditStore;

    use crate::ChainVerifier;

    // ── Helpers ───────────────────────────────────────────────────────────────

    /// A store holding a valid five-entry chain, plus its public key.
    fn populated_store() -> (Arc<InMemoryAuditStore>, Ed25519Verifier) {
        let (signer, verifier) = KeyPair::generate().into_parts();
        let store = Arc::new(InMemoryAuditStore::new());
        let start = Utc.with_ymd_and_hms(2026, 3, 5, 8, 0, 0).unwrap();
        let tick = AtomicI64::new(0);

        let trail = AuditTrail::new(
            Box::new(Arc::clone(&store)),
            Box::new(signer),
            Box::new(ChainVerifier::new(Box::new(verifier.clone()))),
        )
        .with_clock(Box::new(move || {
            start + Duration::minutes(tick.fetch_add(1, Ordering::SeqCst))
        }));

        trail.append(1, CREATE_RECORD, Some(10)).unwrap();
        trail.append(1, UPDATE_RECORD, Some(10)).unwrap();
        trail.append(2, READ_RECORDS, None).unwrap();
        trail.append(3, CREATE_RECORD, Some(11)).unwrap();
        trail.append(2, READ_RECORDS, None).unwrap();

        (store, verifier)
    }

    fn chain() -> (Vec<AuditEntry>, ChainVerifier) {
        let (store, verifier) = populated_store();
        (
            store.snapshot().unwrap(),
            ChainVerifier::new(Box::new(verifier)),
        )
    }

    fn first_reason(report: &VerificationReport) -> &BreakReason {
        &report.first_break().expect("expected a break").reason
    }

    /// Assert the report is broken at `sequence_id` with a digest mismatch.
    fn assert_digest_break(report: &VerificationReport, sequence_id: u64) {
        assert!(!report.valid);
        assert_eq!(report.first_break().unwrap().sequence_id, sequence_id);
        assert!(
            matches!(first_reason(report), BreakReason::DigestMismatch { .. }),
            "expected DigestMismatch, got {:?}",
            report.breaks
        );
    }

    // ── 1. valid chains ───────────────────────────────────────────────────────

    #[test]
    fn test_valid_chain_verifies() {
        let (entries, verifier) = chain();
        let report = verifier.verify_entries(&entries);

        assert!(report.valid);
        assert_eq!(report.entries_checked, 5);
        assert!(report.breaks.is_empty());
        assert_eq!(report.summary(), "audit chain verified: 5 entries intact");
    }

    #[test]
    fn test_empty_chain_is_valid() {
        let (_, verifier) = chain();
        let report = verifier.verify_entries(&[]);
        assert!(report.valid);
        assert_eq!(report.entries_checked, 0);

        let report = verifier.audit(&InMemoryAuditStore::new()).unwrap();
        assert!(report.valid);
    }

    #[test]
    fn test_store_replay_matches_slice_replay_for_any_batch_size() {
        let (store, verifier) = populated_store();
        let entries = store.snapshot().unwrap();

        for batch_size in [0, 1, 2, 5, 500] {
            let auditor = ChainVerifier::new(Box::new(verifier.clone())).batch_size(batch_size);
            let from_store = auditor.audit(store.as_ref()).unwrap();
            assert_eq!(from_store, auditor.verify_entries(&entries), "batch {batch_size}");
            assert_eq!(from_store.entries_checked, 5);
        }
    }

    #[test]
    fn test_trail_verify_chain_uses_the_auditor() {
        let (signer, verifier) = KeyPair::generate().into_parts();
        let trail = AuditTrail::new(
            Box::new(InMemoryAuditStore::new()),
            Box::new(signer),
            Box::new(ChainVerifier::new(Box::new(verifier))),
        );
        trail.append(7, READ_RECORDS, None).unwrap();
        trail.append(7, READ_RECORDS, None).unwrap();

        let report = trail.verify_chain().unwrap();
        assert!(report.valid);
        assert_eq!(report.entries_checked, 2);
    }

    // ── 2. single-field tampering ─────────────────────────────────────────────

    #[test]
    fn test_each_content_field_is_covered_by_the_digest() {
        type Tamper = fn(&mut AuditEntry);
        let tampers: [(&str, Tamper); 7] = [
            ("actor_id", (|e: &mut AuditEntry| e.actor_id += 1) as Tamper),
            ("action_kind", |e: &mut AuditEntry| {
                e.action_kind = "DELETE_RECORD".to_string()
            }),
            ("subject_id", |e: &mut AuditEntry| {
                e.subject_id = e.subject_id.map_or(Some(0), |s| Some(s + 1))
            }),
            ("subject_removed", |e: &mut AuditEntry| e.subject_id = None),
            ("timestamp", |e: &mut AuditEntry| {
                e.timestamp += Duration::microseconds(1)
            }),
            ("previous_digest", |e: &mut AuditEntry| {
                e.previous_digest = "0".repeat(64)
            }),
            ("digest", |e: &mut AuditEntry| e.digest = "f".repeat(64)),
        ];

        for (field, tamper) in tampers {
            let (mut entries, verifier) = chain();
            tamper(&mut entries[1]);
            let report = verifier.verify_entries(&entries);
            assert!(!report.valid, "{field}: tampering went unnoticed");
            assert_eq!(report.first_break().unwrap().sequence_id, 2, "{field}");
            assert_digest_break(&report, 2);
        }
    }

    #[test]
    fn test_altered_signature_is_mismatch() {
        let (mut entries, verifier) = chain();
        let mut sig = entries[2].signature.clone().into_bytes();
        sig[0] = if sig[0] == b'a' { b'b' } else { b'a' };
        entries[2].signature = String::from_utf8(sig).unwrap();

        let report = verifier.verify_entries(&entries);
        assert_eq!(report.first_break().unwrap().sequence_id, 3);
        assert_eq!(first_reason(&report), &BreakReason::SignatureMismatch);
    }

    #[test]
    fn test_garbage_signature_is_malformed() {
        let (mut entries, verifier) = chain();
        entries[0].signature = "not-a-signature".to_string();

        let report = verifier.verify_entries(&entries);
        assert_eq!(report.first_break().unwrap().sequence_id, 1);
        assert!(matches!(
            first_reason(&report),
            BreakReason::SignatureMalformed { .. }
        ));
    }

    #[test]
    fn test_rehashed_entry_without_key_fails_signature() {
        let (mut entries, verifier) = chain();
        entries[3].actor_id = 99;
        entries[3].digest = entry_digest(&entries[3]);

        let report = verifier.verify_entries(&entries);
        assert_eq!(report.first_break().unwrap().sequence_id, 4);
        assert_eq!(first_reason(&report), &BreakReason::SignatureMismatch);
    }

    #[test]
    fn test_forged_entry_signed_with_foreign_key_fails() {
        let (mut entries, verifier) = chain();
        let (forger, _) = KeyPair::generate().into_parts();
        entries[3].actor_id = 99;
        entries[3].digest = entry_digest(&entries[3]);
        entries[3].signature = forger.sign_digest(&entries[3].digest).unwrap();

        let report = verifier.verify_entries(&entries);
        assert_eq!(report.first_break().unwrap().sequence_id, 4);
        assert_eq!(first_reason(&report), &BreakReason::SignatureMismatch);
    }

    #[test]
    fn test_resealed_middle_entry_breaks_next_link() {
        // An attacker holding the key can re-seal one entry, but the next
        // entry still points at the original digest.
        let (store, _) = populated_store();
        let mut entries = store.snapshot().unwrap();
        let (signer, verifier) = KeyPair::generate().into_parts();
        let auditor = ChainVerifier::new(Box::new(verifier));

        let mut previous = String::new();
        for entry in entries.iter_mut() {
            entry.previous_digest = previous.clone();
            entry.digest = entry_digest(entry);
            entry.signature = signer.sign_digest(&entry.digest).unwrap();
            previous = entry.digest.clone();
        }
        assert!(auditor.verify_entries(&entries).valid);

        let original_third = entries[2].digest.clone();
        entries[2].subject_id = Some(4242);
        entries[2].digest = entry_digest(&entries[2]);
        entries[2].signature = signer.sign_digest(&entries[2].digest).unwrap();

        let report = auditor.verify_entries(&entries);
        assert_eq!(report.first_break().unwrap().sequence_id, 4);
        assert_eq!(
            first_reason(&report),
            &BreakReason::LinkMismatch {
                stored: original_third,
                expected: entries[2].digest.clone(),
            }
        );
    }

    // ── 3. structural tampering ───────────────────────────────────────────────

    #[test]
    fn test_deleted_entry_is_sequence_gap() {
        let (mut entries, verifier) = chain();
        entries.remove(2);

        let report = verifier.verify_entries(&entries);
        assert_eq!(report.first_break().unwrap().sequence_id, 4);
        assert_eq!(
            first_reason(&report),
            &BreakReason::SequenceGap {
                expected: 3,
                found: 4
            }
        );
    }

    #[test]
    fn test_replayed_entry_is_duplicate_digest() {
        let (mut entries, verifier) = chain();
        let mut replay = entries[1].clone();
        replay.sequence_id = 5;
        entries[4] = replay;

        let report = verifier.verify_entries(&entries);
        assert_eq!(report.first_break().unwrap().sequence_id, 5);
        assert_eq!(
            first_reason(&report),
            &BreakReason::DuplicateDigest { first_seen: 2 }
        );
    }

    #[test]
    fn test_truncated_tail_is_undetectable_but_valid_prefix() {
        let (mut entries, verifier) = chain();
        entries.truncate(3);
        let report = verifier.verify_entries(&entries);
        assert!(report.valid);
        assert_eq!(report.entries_checked, 3);
    }

    // ── 4. stop-at-first vs enumerate-all ─────────────────────────────────────

    #[test]
    fn test_stops_at_first_break_by_default() {
        let (mut entries, verifier) = chain();
        entries[1].actor_id = 50;
        entries[3].actor_id = 50;

        let report = verifier.verify_entries(&entries);
        assert_eq!(report.breaks.len(), 1);
        assert_eq!(report.entries_checked, 2);
        assert_digest_break(&report, 2);
        assert!(report.summary().starts_with("audit chain broken at entry 2:"));
    }

    #[test]
    fn test_enumerate_all_reports_every_break() {
        let (mut entries, verifier) = chain();
        let verifier = verifier.enumerate_all(true);
        entries[1].actor_id = 50;
        entries[3].actor_id = 50;

        let report = verifier.verify_entries(&entries);
        let ids: Vec<u64> = report.breaks.iter().map(|b| b.sequence_id).collect();
        assert_eq!(ids, vec![2, 4]);
        assert_eq!(report.entries_checked, 5);
        assert!(report.summary().ends_with("(2 breaks in total)"));

        let err = report.into_result().unwrap_err();
        assert!(err.to_string().contains("entry 2"));
    }

    #[test]
    fn test_report_serializes_break_kinds() {
        let (mut entries, verifier) = chain();
        entries[0].digest = "f".repeat(64);
        let report = verifier.verify_entries(&entries);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["valid"], false);
        assert_eq!(json["breaks"][0]["reason"]["kind"], "digest_mismatch");
    }

    #[test]
    fn test_store_audit_reports_nothing_for_untouched_store() {
        let (store, verifier) = populated_store();
        let report = ChainVerifier::new(Box::new(verifier))
            .audit(store.as_ref() as &dyn AuditStore)
            .unwrap();
        assert!(report.valid);
    }
}
