//! # medtrail-store
//!
//! Append-only storage backends for the MEDTRAIL audit trail.
//!
//! ## Overview
//!
//! Both backends implement [`AuditStore`](medtrail_core::traits::AuditStore):
//!
//! - [`InMemoryAuditStore`]: a `Mutex`-guarded `Vec`, for tests and demos
//! - [`SqliteAuditStore`]: a single SQLite table with append-only triggers,
//!   `BEGIN IMMEDIATE` appends and SQL-side filtering
//!
//! Neither store hashes or signs anything. They hand the current tail to
//! the coordinator's build callback while holding the tail lock, then
//! persist whatever it returns at `tail + 1`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use medtrail_store::SqliteAuditStore;
//!
//! let store = SqliteAuditStore::open("data/audit.db", Duration::from_secs(5))?;
//! let trail = AuditTrail::new(Box::new(store), Box::new(signer), Box::new(auditor));
//! ```

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryAuditStore;
pub use sqlite::SqliteAuditStore;

// ── Tests ─────────────────────────────────────────────────────────────────────
