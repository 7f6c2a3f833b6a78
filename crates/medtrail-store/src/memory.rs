//! In-memory implementation of `AuditStore`.
//!
//! `InMemoryAuditStore` keeps the log in a `Vec` behind a `Mutex`. Holding
//! the mutex is the tail lock: `append_locked` keeps it across the build
//! callback and the push, so two appends can never observe the same tail.
//!
//! Nothing survives the process. Use it for tests, demos and as the
//! reference behaviour the SQLite store is checked against.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use medtrail_contracts::{
    entry::{AuditEntry, ChainTail},
    error::{MedResult, MedtrailError},
    query::{AuditFilter, AuditPage, PageRequest},
};
use medtrail_core::traits::{AuditStore, BuildEntry};

// ── Internal mutable state ────────────────────────────────────────────────────

#[derive(Default)]
pub(crate) struct InMemoryState {
    /// Committed entries in `sequence_id` order.
    pub(crate) entries: Vec<AuditEntry>,

    /// Every committed digest; mirrors the SQLite UNIQUE constraint.
    pub(crate) digests: HashSet<String>,
}

impl InMemoryState {
    fn tail(&self) -> ChainTail {
        self.entries
            .last()
            .map(ChainTail::of)
            .unwrap_or_else(ChainTail::genesis)
    }
}

// ── Public store ──────────────────────────────────────────────────────────────

/// A process-local, append-only audit log.
#[derive(Default)]
pub struct InMemoryAuditStore {
    pub(crate) state: Mutex<InMemoryState>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every committed entry, in order.
    pub fn snapshot(&self) -> MedResult<Vec<AuditEntry>> {
        Ok(self.lock()?.entries.clone())
    }

    fn lock(&self) -> MedResult<MutexGuard<'_, InMemoryState>> {
        self.state
            .lock()
            .map_err(|e| MedtrailError::storage(format!("audit state lock poisoned: {e}")))
    }
}

// ── AuditStore impl ───────────────────────────────────────────────────────────

impl AuditStore for InMemoryAuditStore {
    fn append_locked(&self, build: BuildEntry<'_>) -> MedResult<AuditEntry> {
        let mut state = self.lock()?;
        let tail = state.tail();

        let sealed = build(&tail)?;
        if state.digests.contains(&sealed.digest) {
            return Err(MedtrailError::ConstraintViolation {
                reason: format!("digest {} already recorded", sealed.digest),
            });
        }

        let entry = sealed.into_entry(tail.next_sequence_id());
        state.digests.insert(entry.digest.clone());
        state.entries.push(entry.clone());

        debug!(sequence_id = entry.sequence_id, "entry stored in memory");
        Ok(entry)
    }

    fn tail(&self) -> MedResult<ChainTail> {
        Ok(self.lock()?.tail())
    }

    fn count(&self) -> MedResult<u64> {
        Ok(self.lock()?.entries.len() as u64)
    }

    fn read_batch(&self, after: u64, limit: usize) -> MedResult<Vec<AuditEntry>> {
        let state = self.lock()?;
        // sequence_id n lives at index n - 1.
        let start = (after as usize).min(state.entries.len());
        Ok(state.entries[start..].iter().take(limit).cloned().collect())
    }

    fn query(&self, filter: &AuditFilter, page: PageRequest) -> MedResult<AuditPage> {
        let state = self.lock()?;
        let matching: Vec<&AuditEntry> =
            state.entries.iter().filter(|e| filter.matches(e)).collect();
        let total = matching.len() as u64;

        let entries = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.page_size() as usize)
            .cloned()
            .collect();

        Ok(AuditPage::new(entries, total, page))
    }
}
