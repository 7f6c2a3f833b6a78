//! # medtrail-ref-records
//!
//! Reference medical-records service for the MEDTRAIL audit trail.
//!
//! Shows how a records service couples its operations to the audit log:
//!
//! - create, update and delete are rolled back when the audit append fails
//! - reads return nothing unless the read was audited
//! - emergency (break-glass) access is always recorded
//!
//! All data is hardcoded and fictional. Records are kept in memory and are
//! never encrypted here; the audit log only ever sees record ids.

pub mod error;
pub mod mock_data;
pub mod scenarios;
pub mod service;

pub use error::{RecordsError, RecordsResult};
pub use service::{MedicalRecord, RecordsService};
