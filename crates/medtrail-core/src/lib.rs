//! # medtrail-core
//!
//! The hash-chain engine and append coordinator for the MEDTRAIL audit trail.
//!
//! This crate provides:
//! - `chain`: the canonical encoding and SHA-256 digest of an entry
//! - the four seam traits (`AuditStore`, `DigestSigner`, `SignatureVerifier`,
//!   `ChainAuditor`)
//! - `AuditTrail`, which serializes appends through the store's tail lock
//!
//! ## Usage
//!
//! ```rust,ignore
//! use medtrail_core::AuditTrail;
//!
//! let trail = AuditTrail::new(Box::new(store), Box::new(signer), Box::new(auditor));
//! let entry = trail.append(7, "READ_RECORDS", None)?;
//! assert!(trail.verify_chain()?.valid);
//! ```

pub mod chain;
pub mod trail;
pub mod traits;

pub use trail::{AuditTrail, ClockFn};
