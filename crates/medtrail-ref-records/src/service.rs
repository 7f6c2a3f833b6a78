//! A medical-records service with strictly coupled auditing.
//!
//! `RecordsService` keeps fictional medical records in an in-memory book
//! and records every operation on the audit trail. Coupling is strict: an
//! operation only reports success if its audit entry was appended. When the
//! append fails, mutations are rolled back and reads return no data.
//!
//! The book lock is held across the append, so no other caller can observe
//! a mutation whose audit entry might still be rolled back.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use medtrail_contracts::action::{
    CREATE_RECORD, DELETE_RECORD, EMERGENCY_ACCESS, READ_RECORDS, SEARCH_PATIENT_RECORDS,
    UPDATE_RECORD,
};
use medtrail_core::AuditTrail;

use crate::error::{RecordsError, RecordsResult};

/// One patient chart entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicalRecord {
    pub id: u64,
    pub patient_id: u64,
    pub doctor_id: u64,
    pub diagnosis: String,
    pub treatment: String,
}

// ── Record book ───────────────────────────────────────────────────────────────

#[derive(Debug)]
struct RecordBook {
    records: BTreeMap<u64, MedicalRecord>,
    next_id: u64,
}

impl Default for RecordBook {
    fn default() -> Self {
        Self {
            records: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl RecordBook {
    fn for_patient(&self, patient_id: u64) -> Vec<MedicalRecord> {
        self.records
            .values()
            .filter(|r| r.patient_id == patient_id)
            .cloned()
            .collect()
    }
}

// ── Service ───────────────────────────────────────────────────────────────────

pub struct RecordsService {
    book: Mutex<RecordBook>,
    trail: Arc<AuditTrail>,
}

impl RecordsService {
    pub fn new(trail: Arc<AuditTrail>) -> Self {
        Self {
            book: Mutex::new(RecordBook::default()),
            trail,
        }
    }

    /// The audit trail every operation is recorded on.
    pub fn trail(&self) -> &AuditTrail {
        &self.trail
    }

    /// Number of records currently in the book. Not audited.
    pub fn record_count(&self) -> RecordsResult<usize> {
        Ok(self.book()?.records.len())
    }

    fn book(&self) -> RecordsResult<MutexGuard<'_, RecordBook>> {
        self.book.lock().map_err(|e| RecordsError::Unavailable {
            reason: format!("record book lock poisoned: {e}"),
        })
    }

    /// Write a new chart entry. Audited as `CREATE_RECORD` by the doctor.
    pub fn create_record(
        &self,
        doctor_id: u64,
        patient_id: u64,
        diagnosis: &str,
        treatment: &str,
    ) -> RecordsResult<MedicalRecord> {
        let mut book = self.book()?;
        let record = MedicalRecord {
            id: book.next_id,
            patient_id,
            doctor_id,
            diagnosis: diagnosis.to_string(),
            treatment: treatment.to_string(),
        };
        book.records.insert(record.id, record.clone());
        book.next_id += 1;

        if let Err(e) = self.trail.append(doctor_id, CREATE_RECORD, Some(record.id)) {
            book.records.remove(&record.id);
            book.next_id -= 1;
            warn!(record_id = record.id, error = %e, "record creation rolled back");
            return Err(e.into());
        }

        info!(record_id = record.id, doctor_id, patient_id, "medical record created");
        Ok(record)
    }

    /// Revise a chart entry. Audited as `UPDATE_RECORD` by the doctor.
    pub fn update_record(
        &self,
        doctor_id: u64,
        record_id: u64,
        diagnosis: &str,
        treatment: &str,
    ) -> RecordsResult<MedicalRecord> {
        let mut book = self.book()?;
        let record = book
            .records
            .get_mut(&record_id)
            .ok_or(RecordsError::NotFound { record_id })?;
        let previous = record.clone();
        record.diagnosis = diagnosis.to_string();
        record.treatment = treatment.to_string();
        let updated = record.clone();

        if let Err(e) = self.trail.append(doctor_id, UPDATE_RECORD, Some(record_id)) {
            book.records.insert(record_id, previous);
            warn!(record_id, error = %e, "record update rolled back");
            return Err(e.into());
        }

        info!(record_id, doctor_id, "medical record updated");
        Ok(updated)
    }

    /// Remove a chart entry. Audited as `DELETE_RECORD`; the audit entry
    /// outlives the record.
    pub fn delete_record(&self, doctor_id: u64, record_id: u64) -> RecordsResult<MedicalRecord> {
        let mut book = self.book()?;
        let removed = book
            .records
            .remove(&record_id)
            .ok_or(RecordsError::NotFound { record_id })?;

        if let Err(e) = self.trail.append(doctor_id, DELETE_RECORD, Some(record_id)) {
            book.records.insert(record_id, removed);
            warn!(record_id, error = %e, "record deletion rolled back");
            return Err(e.into());
        }

        info!(record_id, doctor_id, "medical record deleted");
        Ok(removed)
    }

    /// A patient viewing their own records. Audited as `READ_RECORDS` with
    /// the patient as actor and no subject.
    pub fn read_records(&self, patient_id: u64) -> RecordsResult<Vec<MedicalRecord>> {
        let book = self.book()?;
        let records = book.for_patient(patient_id);
        self.trail.append(patient_id, READ_RECORDS, None)?;
        Ok(records)
    }

    /// A doctor looking up a patient's records. Audited as
    /// `SEARCH_PATIENT_RECORDS` with the patient id as subject.
    pub fn search_patient_records(
        &self,
        doctor_id: u64,
        patient_id: u64,
    ) -> RecordsResult<Vec<MedicalRecord>> {
        let book = self.book()?;
        let records = book.for_patient(patient_id);
        self.trail
            .append(doctor_id, SEARCH_PATIENT_RECORDS, Some(patient_id))?;
        Ok(records)
    }

    /// Break-glass access to a single record. Audited as `EMERGENCY_ACCESS`.
    pub fn emergency_access(&self, user_id: u64, record_id: u64) -> RecordsResult<MedicalRecord> {
        let book = self.book()?;
        let record = book
            .records
            .get(&record_id)
            .cloned()
            .ok_or(RecordsError::NotFound { record_id })?;

        self.trail.append(user_id, EMERGENCY_ACCESS, Some(record_id))?;
        warn!(record_id, user_id, "emergency access granted");
        Ok(record)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
