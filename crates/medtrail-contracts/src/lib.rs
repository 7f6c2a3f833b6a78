//! # medtrail-contracts
//!
//! Shared types for the MEDTRAIL tamper-evident audit trail.
//!
//! All crates in the workspace import from here. No hashing, signing or
//! storage lives in this crate, only data definitions, request validation
//! and error types.

pub mod action;
pub mod entry;
pub mod error;
pub mod query;
pub mod verify;
