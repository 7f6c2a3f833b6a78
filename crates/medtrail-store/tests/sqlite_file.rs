//! File-backed SQLite behaviour: persistence, append-only enforcement,
//! atomic appends and cross-connection locking.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::Connection;
use tempfile::tempdir;

use medtrail_contracts::{
    action::{CREATE_RECORD, READ_RECORDS},
    entry::{AuditEntry, ChainTail, SealedEntry},
    error::{MedResult, MedtrailError},
    query::{AuditFilter, PageRequest},
};
use medtrail_core::{
    chain::{compute_digest, digest_matches},
    traits::{AuditStore, DigestSigner, SignatureVerifier},
};
use medtrail_signing::{Ed25519Signer, KeyPair};
use medtrail_store::SqliteAuditStore;

const TIMEOUT: Duration = Duration::from_secs(5);

fn at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 5, 9, minute, 0).unwrap()
}

fn put(
    store: &dyn AuditStore,
    signer: &Ed25519Signer,
    actor_id: u64,
    action_kind: &str,
    subject_id: Option<u64>,
    timestamp: DateTime<Utc>,
) -> MedResult<AuditEntry> {
    store.append_locked(&mut |tail: &ChainTail| {
        let digest = compute_digest(actor_id, action_kind, subject_id, &timestamp, &tail.digest);
        let signature = signer.sign_digest(&digest)?;
        Ok(SealedEntry {
            actor_id,
            action_kind: action_kind.to_string(),
            subject_id,
            timestamp,
            previous_digest: tail.digest.clone(),
            digest,
            signature,
        })
    })
}

#[test]
fn entries_survive_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("audit.db");
    let (signer, verifier) = KeyPair::generate().into_parts();

    let written = {
        let store = SqliteAuditStore::open(&path, TIMEOUT).unwrap();
        (0..5)
            .map(|i| put(&store, &signer, 3, CREATE_RECORD, Some(i), at(i as u32)).unwrap())
            .collect::<Vec<_>>()
    };

    let reopened = SqliteAuditStore::open(&path, TIMEOUT).unwrap();
    let read = reopened.read_batch(0, 100).unwrap();
    assert_eq!(read, written);
    for entry in &read {
        assert!(digest_matches(entry));
        assert!(verifier.check_signature(&entry.digest, &entry.signature).is_valid());
    }

    let next = put(&reopened, &signer, 3, READ_RECORDS, None, at(10)).unwrap();
    assert_eq!(next.sequence_id, 6);
    assert_eq!(next.previous_digest, written[4].digest);
}

#[test]
fn updates_and_deletes_are_refused() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("audit.db");
    let (signer, _) = KeyPair::generate().into_parts();
    let store = SqliteAuditStore::open(&path, TIMEOUT).unwrap();
    put(&store, &signer, 1, CREATE_RECORD, Some(1), at(0)).unwrap();

    let raw = Connection::open(&path).unwrap();
    let update = raw.execute("UPDATE audit_entries SET actor_id = 99 WHERE sequence_id = 1", []);
    let delete = raw.execute("DELETE FROM audit_entries WHERE sequence_id = 1", []);

    for result in [update, delete] {
        let err = result.unwrap_err();
        assert!(err.to_string().contains("append-only"), "unexpected error: {err}");
    }
    assert_eq!(store.read_batch(0, 10).unwrap()[0].actor_id, 1);
}

#[test]
fn failed_insert_rolls_back_and_chain_continues() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("audit.db");
    let (signer, _) = KeyPair::generate().into_parts();
    let store = SqliteAuditStore::open(&path, TIMEOUT).unwrap();
    let first = put(&store, &signer, 1, CREATE_RECORD, Some(1), at(0)).unwrap();

    let raw = Connection::open(&path).unwrap();
    raw.execute_batch(
        "CREATE TRIGGER reject_inserts BEFORE INSERT ON audit_entries
         BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
    )
    .unwrap();

    let err = put(&store, &signer, 1, READ_RECORDS, None, at(1)).unwrap_err();
    assert!(matches!(err, MedtrailError::ConstraintViolation { .. }), "got {err:?}");
    assert_eq!(store.count().unwrap(), 1);
    assert_eq!(store.tail().unwrap(), ChainTail::of(&first));

    raw.execute_batch("DROP TRIGGER reject_inserts;").unwrap();
    let second = put(&store, &signer, 1, READ_RECORDS, None, at(2)).unwrap();
    assert_eq!(second.sequence_id, 2);
    assert_eq!(second.previous_digest, first.digest);
}

#[test]
fn separate_connections_never_fork_the_chain() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("audit.db");
    let (signer, _) = KeyPair::generate().into_parts();
    let signer = Arc::new(signer);
    // Create the schema once before the writers race.
    drop(SqliteAuditStore::open(&path, TIMEOUT).unwrap());

    let handles: Vec<_> = (0..4u64)
        .map(|worker| {
            let path = path.clone();
            let signer = Arc::clone(&signer);
            thread::spawn(move || {
                let store = SqliteAuditStore::open(&path, TIMEOUT).unwrap();
                for i in 0..10u64 {
                    put(&store, &signer, worker + 1, CREATE_RECORD, Some(i), at(i as u32))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let store = SqliteAuditStore::open(&path, TIMEOUT).unwrap();
    let entries = store.read_batch(0, 100).unwrap();
    assert_eq!(entries.len(), 40);
    for (i, entry) in entries.iter().enumerate() {
        assert_eq!(entry.sequence_id, i as u64 + 1);
        if i > 0 {
            assert_eq!(entry.previous_digest, entries[i - 1].digest);
        }
    }
}

#[test]
fn forty_five_entries_paginate_in_order() {
    let (signer, _) = KeyPair::generate().into_parts();
    let store = SqliteAuditStore::in_memory().unwrap();
    for i in 0..45u32 {
        put(&store, &signer, 8, READ_RECORDS, None, at(i)).unwrap();
    }

    let mut seen = Vec::new();
    for page in 1..=3 {
        let result = store
            .query(&AuditFilter::default(), PageRequest::new(page, 20))
            .unwrap();
        assert_eq!(result.total, 45);
        assert_eq!(result.pages, 3);
        seen.extend(result.entries.iter().map(|e| e.sequence_id));
    }
    assert_eq!(seen, (1..=45).collect::<Vec<u64>>());

    let last = store
        .query(&AuditFilter::default(), PageRequest::new(3, 20))
        .unwrap();
    assert_eq!(last.entries.len(), 5);

    let capped = store
        .query(&AuditFilter::default(), PageRequest::new(1, 500))
        .unwrap();
    assert_eq!(capped.page_size, 100);
    assert_eq!(capped.entries.len(), 45);
}

#[test]
fn open_existing_refuses_missing_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("typo.db");

    let err = SqliteAuditStore::open_existing(&path, TIMEOUT).unwrap_err();
    assert!(matches!(err, MedtrailError::Storage { .. }));
    assert!(!path.exists(), "a missing database must not be created");

    let (signer, _) = KeyPair::generate().into_parts();
    {
        let store = SqliteAuditStore::open(&path, TIMEOUT).unwrap();
        put(&store, &signer, 7, READ_RECORDS, None, at(0)).unwrap();
    }
    let store = SqliteAuditStore::open_existing(&path, TIMEOUT).unwrap();
    assert_eq!(store.count().unwrap(), 1);
}
