//! Scenario: one morning on a cardiology ward.
//!
//! Drives every records operation against a live audit trail:
//!
//! 1. Admission round: four charts are written
//! 2. A patient reviews their own records
//! 3. The resident searches a patient's history
//! 4. The attending revises a diagnosis after test results
//! 5. The emergency department breaks glass on one chart
//! 6. A chart written against the wrong patient is deleted
//!
//! The trail is then verified and summarised.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use medtrail_contracts::{
    action::{EMERGENCY_ACCESS, READ_RECORDS},
    query::{AuditFilter, PageRequest},
    verify::VerificationReport,
};
use medtrail_core::AuditTrail;
use medtrail_signing::KeyPair;
use medtrail_store::InMemoryAuditStore;
use medtrail_verify::ChainVerifier;

use crate::{
    error::RecordsResult,
    mock_data::{
        ADMISSION_CHARTS, DR_LINDQVIST, DR_OKAFOR, DR_RIVERA, HALE_REVISED_DIAGNOSIS,
        HALE_REVISED_TREATMENT, PATIENT_HALE, PATIENT_MORENO, PATIENT_SATO,
    },
    service::RecordsService,
};

/// What the ward round left behind.
#[derive(Debug, Clone, Serialize)]
pub struct WardRoundSummary {
    pub records_remaining: usize,
    pub audit_entries: u64,
    pub emergency_accesses: u64,
    pub patient_self_reads: u64,
    pub verification: VerificationReport,
}

/// A records service over a fresh in-memory log with a throwaway key.
pub fn in_memory_service() -> RecordsService {
    let (signer, verifier) = KeyPair::generate().into_parts();
    let trail = AuditTrail::new(
        Box::new(InMemoryAuditStore::new()),
        Box::new(signer),
        Box::new(ChainVerifier::new(Box::new(verifier))),
    );
    RecordsService::new(Arc::new(trail))
}

/// Run the ward round against `service`.
pub fn run(service: &RecordsService) -> RecordsResult<WardRoundSummary> {
    // ── 1. admissions ─────────────────────────────────────────────────────────
    let mut admitted = Vec::with_capacity(ADMISSION_CHARTS.len());
    for &(doctor, patient, diagnosis, treatment) in ADMISSION_CHARTS {
        admitted.push(service.create_record(doctor, patient, diagnosis, treatment)?);
    }
    info!(charts = admitted.len(), "admission round complete");

    // ── 2. patient portal ─────────────────────────────────────────────────────
    let own = service.read_records(PATIENT_HALE)?;
    info!(patient_id = PATIENT_HALE, records = own.len(), "patient reviewed records");

    // ── 3. resident lookup ────────────────────────────────────────────────────
    service.search_patient_records(DR_OKAFOR, PATIENT_MORENO)?;

    // ── 4. revised diagnosis ──────────────────────────────────────────────────
    let holter = admitted
        .iter()
        .find(|r| r.patient_id == PATIENT_HALE && r.doctor_id == DR_OKAFOR)
        .map(|r| r.id);
    if let Some(record_id) = holter {
        service.update_record(
            DR_RIVERA,
            record_id,
            HALE_REVISED_DIAGNOSIS,
            HALE_REVISED_TREATMENT,
        )?;
    }

    // ── 5. break glass ────────────────────────────────────────────────────────
    if let Some(first) = admitted.first() {
        service.emergency_access(DR_LINDQVIST, first.id)?;
    }

    // ── 6. chart written against the wrong patient ────────────────────────────
    let misfiled = service.create_record(
        DR_OKAFOR,
        PATIENT_SATO,
        "Iron deficiency anemia",
        "Ferrous sulfate 325 mg once daily",
    )?;
    service.delete_record(DR_OKAFOR, misfiled.id)?;
    service.read_records(PATIENT_SATO)?;

    summarize(service)
}

fn summarize(service: &RecordsService) -> RecordsResult<WardRoundSummary> {
    let trail = service.trail();
    let count = |action: &str| -> RecordsResult<u64> {
        Ok(trail
            .list(&AuditFilter::default().action(action), PageRequest::new(1, 1))?
            .total)
    };

    let summary = WardRoundSummary {
        records_remaining: service.record_count()?,
        audit_entries: trail.len()?,
        emergency_accesses: count(EMERGENCY_ACCESS)?,
        patient_self_reads: count(READ_RECORDS)?,
        verification: trail.verify_chain()?,
    };
    info!(
        audit_entries = summary.audit_entries,
        valid = summary.verification.valid,
        "ward round finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ward_round_leaves_a_valid_trail() {
        let service = in_memory_service();
        let summary = run(&service).unwrap();

        // 5 creates, 1 update, 1 delete, 2 patient reads, 1 search, 1 emergency
        assert_eq!(summary.audit_entries, 11);
        assert_eq!(summary.records_remaining, 4);
        assert_eq!(summary.emergency_accesses, 1);
        assert_eq!(summary.patient_self_reads, 2);
        assert!(summary.verification.valid);
        assert_eq!(summary.verification.entries_checked, 11);
    }

    #[test]
    fn test_revision_is_attributed_to_the_attending() {
        let service = in_memory_service();
        run(&service).unwrap();

        let page = service
            .trail()
            .list(
                &AuditFilter::default()
                    .actor(DR_RIVERA)
                    .action(medtrail_contracts::action::UPDATE_RECORD),
                PageRequest::default(),
            )
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.entries[0].subject_id, Some(4));
    }
}
