//! Simulated ward data for the MEDTRAIL reference records service.
//!
//! All data in this module is hardcoded and fictional. No real patient
//! identifiers or PHI are present.

use serde_json::{json, Value};

// ── Staff and patients ────────────────────────────────────────────────────────

/// Attending physician on the cardiology ward.
pub const DR_RIVERA: u64 = 7;

/// Resident physician on the same ward.
pub const DR_OKAFOR: u64 = 8;

/// Emergency department physician with break-glass access.
pub const DR_LINDQVIST: u64 = 21;

pub const PATIENT_HALE: u64 = 1001;
pub const PATIENT_MORENO: u64 = 1002;
pub const PATIENT_SATO: u64 = 1003;

/// Display name for a fictional staff or patient id.
pub fn display_name(id: u64) -> &'static str {
    match id {
        DR_RIVERA => "Dr. A. Rivera",
        DR_OKAFOR => "Dr. N. Okafor",
        DR_LINDQVIST => "Dr. E. Lindqvist",
        PATIENT_HALE => "J. Hale",
        PATIENT_MORENO => "L. Moreno",
        PATIENT_SATO => "K. Sato",
        _ => "unknown",
    }
}

// ── Charts ────────────────────────────────────────────────────────────────────

/// A chart entry to admit: (doctor, patient, diagnosis, treatment).
pub type ChartSeed = (u64, u64, &'static str, &'static str);

/// Charts written during the morning admission round.
pub const ADMISSION_CHARTS: &[ChartSeed] = &[
    (
        DR_RIVERA,
        PATIENT_HALE,
        "Essential hypertension",
        "Lisinopril 10 mg once daily",
    ),
    (
        DR_RIVERA,
        PATIENT_MORENO,
        "Iron deficiency anemia",
        "Ferrous sulfate 325 mg once daily; recheck CBC in four weeks",
    ),
    (
        DR_OKAFOR,
        PATIENT_SATO,
        "Type 2 diabetes mellitus without complications",
        "Metformin 500 mg twice daily",
    ),
    (
        DR_OKAFOR,
        PATIENT_HALE,
        "Suspected paroxysmal atrial fibrillation",
        "24-hour Holter monitor; cardiology follow-up",
    ),
];

/// Revised diagnosis after the Holter results came back.
pub const HALE_REVISED_DIAGNOSIS: &str = "Paroxysmal atrial fibrillation, confirmed";
pub const HALE_REVISED_TREATMENT: &str = "Apixaban 5 mg twice daily; rate control with metoprolol";

/// Staff roster as JSON, for demo output.
pub fn ward_roster() -> Value {
    json!({
        "ward": "Cardiology 4B",
        "staff": [
            { "id": DR_RIVERA, "name": display_name(DR_RIVERA), "role": "attending" },
            { "id": DR_OKAFOR, "name": display_name(DR_OKAFOR), "role": "resident" },
            { "id": DR_LINDQVIST, "name": display_name(DR_LINDQVIST), "role": "emergency" }
        ],
        "patients": [
            { "id": PATIENT_HALE, "name": display_name(PATIENT_HALE) },
            { "id": PATIENT_MORENO, "name": display_name(PATIENT_MORENO) },
            { "id": PATIENT_SATO, "name": display_name(PATIENT_SATO) }
        ]
    })
}
