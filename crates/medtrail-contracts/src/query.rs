//! Filter, pagination and page types for audit queries.
//!
//! Filters compose with logical AND. Time bounds are inclusive; a bound given
//! as a calendar date widens to the start (for `from`) or the last
//! microsecond (for `to`) of that UTC day.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    entry::AuditEntry,
    error::{MedResult, MedtrailError},
};

/// Page size used when the caller asks for a non-positive one.
pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// Largest page size served; larger requests are capped.
pub const MAX_PAGE_SIZE: u64 = 100;

// ── Time bounds ──────────────────────────────────────────────────────────────

/// One end of a time-range filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeBound {
    /// An exact UTC instant.
    Instant(DateTime<Utc>),
    /// A whole UTC calendar day.
    Date(NaiveDate),
}

impl TimeBound {
    /// Resolve as a lower bound: a date means 00:00:00.000000 that day.
    pub fn as_lower(&self) -> DateTime<Utc> {
        match self {
            Self::Instant(t) => *t,
            Self::Date(d) => d
                .and_hms_opt(0, 0, 0)
                .map(|n| n.and_utc())
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
        }
    }

    /// Resolve as an upper bound: a date means 23:59:59.999999 that day.
    pub fn as_upper(&self) -> DateTime<Utc> {
        match self {
            Self::Instant(t) => *t,
            Self::Date(d) => d
                .and_hms_micro_opt(23, 59, 59, 999_999)
                .map(|n| n.and_utc())
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }
}

impl FromStr for TimeBound {
    type Err = MedtrailError;

    /// Accepts `YYYY-MM-DD` or an RFC 3339 instant.
    fn from_str(s: &str) -> MedResult<Self> {
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Ok(Self::Date(date));
        }
        DateTime::parse_from_rfc3339(s)
            .map(|t| Self::Instant(t.with_timezone(&Utc)))
            .map_err(|e| MedtrailError::InvalidInput {
                field: "time_bound",
                reason: format!("'{s}' is neither YYYY-MM-DD nor RFC 3339: {e}"),
            })
    }
}

// ── Filter ───────────────────────────────────────────────────────────────────

/// Conjunctive filter over audit metadata. The default matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFilter {
    pub actor_id: Option<u64>,
    pub action_kind: Option<String>,
    pub from: Option<TimeBound>,
    pub to: Option<TimeBound>,
}

impl AuditFilter {
    pub fn actor(mut self, actor_id: u64) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    pub fn action(mut self, action_kind: impl Into<String>) -> Self {
        self.action_kind = Some(action_kind.into());
        self
    }

    pub fn from(mut self, bound: TimeBound) -> Self {
        self.from = Some(bound);
        self
    }

    pub fn to(mut self, bound: TimeBound) -> Self {
        self.to = Some(bound);
        self
    }

    /// Inclusive lower instant, if any.
    pub fn lower(&self) -> Option<DateTime<Utc>> {
        self.from.as_ref().map(TimeBound::as_lower)
    }

    /// Inclusive upper instant, if any.
    pub fn upper(&self) -> Option<DateTime<Utc>> {
        self.to.as_ref().map(TimeBound::as_upper)
    }

    /// True when `entry` satisfies every populated criterion.
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        if let Some(actor) = self.actor_id {
            if entry.actor_id != actor {
                return false;
            }
        }
        if let Some(action) = &self.action_kind {
            if &entry.action_kind != action {
                return false;
            }
        }
        if let Some(lower) = self.lower() {
            if entry.timestamp < lower {
                return false;
            }
        }
        if let Some(upper) = self.upper() {
            if entry.timestamp > upper {
                return false;
            }
        }
        true
    }
}

// ── Pagination ───────────────────────────────────────────────────────────────

/// A normalized, 1-based page request.
///
/// Construct with `PageRequest::new`, which clamps instead of failing:
/// a non-positive page becomes 1, a non-positive size becomes
/// `DEFAULT_PAGE_SIZE`, and sizes above `MAX_PAGE_SIZE` are capped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    page: u64,
    page_size: u64,
}

impl PageRequest {
    pub fn new(page: i64, page_size: i64) -> Self {
        let page = if page < 1 { 1 } else { page as u64 };
        let page_size = if page_size < 1 {
            DEFAULT_PAGE_SIZE
        } else {
            (page_size as u64).min(MAX_PAGE_SIZE)
        };
        Self { page, page_size }
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Number of matching entries to skip.
    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE as i64)
    }
}

/// One page of audit entries plus totals for the whole filtered set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditPage {
    pub entries: Vec<AuditEntry>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
    pub pages: u64,
}

impl AuditPage {
    pub fn new(entries: Vec<AuditEntry>, total: u64, request: PageRequest) -> Self {
        Self {
            entries,
            total,
            page: request.page(),
            page_size: request.page_size(),
            pages: total.div_ceil(request.page_size()),
        }
    }
}
