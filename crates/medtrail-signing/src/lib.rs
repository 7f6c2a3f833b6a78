//! # medtrail-signing
//!
//! Ed25519 signatures over MEDTRAIL audit digests.
//!
//! ## Overview
//!
//! This crate provides [`Ed25519Signer`], which implements
//! [`DigestSigner`](medtrail_core::traits::DigestSigner), and
//! [`Ed25519Verifier`], which implements
//! [`SignatureVerifier`](medtrail_core::traits::SignatureVerifier).
//! [`KeyPair`] decodes and cross-checks the hex key material handed over by
//! key management.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use medtrail_signing::KeyPair;
//!
//! let pair = KeyPair::from_hex(&private_hex, &public_hex)?;
//! let (signer, verifier) = pair.into_parts();
//! // Pass `signer` to `AuditTrail::new(...)` and `verifier` to the chain verifier.
//! ```
//!
//! The message signed is the ASCII hex digest, not the raw 32 hash bytes.

pub mod engine;
pub mod keys;

pub use engine::{Ed25519Signer, Ed25519Verifier};
pub use keys::KeyPair;

// ── Tests ─────────────────────────────────────────────────────────────────────
