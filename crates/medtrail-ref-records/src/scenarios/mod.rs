//! Scripted walkthroughs of the records service.
//!
//! Each scenario wires real MEDTRAIL components (store, signer, verifier,
//! coordinator) to mock ward data and exercises the audit coupling.

pub mod ward_round;
