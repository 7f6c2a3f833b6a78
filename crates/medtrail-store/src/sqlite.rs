//! SQLite implementation of `AuditStore`.
//!
//! One table, `audit_entries`, keyed by `sequence_id`. The schema enforces
//! what the trait promises:
//!
//! - `digest` is `UNIQUE`
//! - `BEFORE UPDATE` and `BEFORE DELETE` triggers abort any modification
//! - indexes on `actor_id`, `action_kind` and `timestamp` back the filters
//!
//! Appends run inside `BEGIN IMMEDIATE`, which takes SQLite's write lock
//! before the tail is read. Together with the in-process connection mutex
//! this excludes concurrent appends from this process and from any other
//! process sharing the file. Waiting writers give up after the configured
//! busy timeout with `LockContention`.
//!
//! Timestamps are stored as canonical text (`YYYY-MM-DDTHH:MM:SS.ffffffZ`),
//! which is fixed width and therefore compares correctly as a string.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{
    params, params_from_iter, types::Value, Connection, ErrorCode, OptionalExtension as _,
    TransactionBehavior,
};
use tracing::{debug, info};

use medtrail_contracts::{
    entry::{AuditEntry, ChainTail},
    error::{MedResult, MedtrailError},
    query::{AuditFilter, AuditPage, PageRequest},
};
use medtrail_core::{
    chain::{canonical_timestamp, parse_canonical_timestamp, truncate_timestamp},
    traits::{AuditStore, BuildEntry},
};

/// Path that selects a private in-memory database.
pub const IN_MEMORY_PATH: &str = ":memory:";

/// Busy timeout used when the caller does not choose one.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5_000);

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS audit_entries (
        sequence_id     INTEGER PRIMARY KEY,
        actor_id        INTEGER NOT NULL,
        action_kind     TEXT NOT NULL,
        subject_id      INTEGER,
        timestamp       TEXT NOT NULL,
        previous_digest TEXT NOT NULL,
        digest          TEXT NOT NULL UNIQUE,
        signature       TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_audit_actor ON audit_entries(actor_id);
    CREATE INDEX IF NOT EXISTS idx_audit_action ON audit_entries(action_kind);
    CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_entries(timestamp);

    CREATE TRIGGER IF NOT EXISTS audit_entries_no_update
    BEFORE UPDATE ON audit_entries
    BEGIN
        SELECT RAISE(ABORT, 'audit entries are append-only');
    END;

    CREATE TRIGGER IF NOT EXISTS audit_entries_no_delete
    BEFORE DELETE ON audit_entries
    BEGIN
        SELECT RAISE(ABORT, 'audit entries are append-only');
    END;
"#;

const SELECT_COLUMNS: &str = "sequence_id, actor_id, action_kind, subject_id, timestamp, \
                              previous_digest, digest, signature";

// ── Error mapping ─────────────────────────────────────────────────────────────

fn sql_error(context: &str, e: rusqlite::Error) -> MedtrailError {
    match e.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
            MedtrailError::LockContention {
                reason: format!("{context}: {e}"),
            }
        }
        Some(ErrorCode::ConstraintViolation) => MedtrailError::ConstraintViolation {
            reason: format!("{context}: {e}"),
        },
        _ => MedtrailError::storage(format!("{context}: {e}")),
    }
}

trait SqlContext<T> {
    fn ctx(self, context: &str) -> MedResult<T>;
}

impl<T> SqlContext<T> for rusqlite::Result<T> {
    fn ctx(self, context: &str) -> MedResult<T> {
        self.map_err(|e| sql_error(context, e))
    }
}

// ── Row conversion ────────────────────────────────────────────────────────────

fn to_sql_id(field: &'static str, id: u64) -> MedResult<i64> {
    i64::try_from(id).map_err(|_| MedtrailError::InvalidInput {
        field,
        reason: format!("{id} does not fit a signed 64-bit column"),
    })
}

fn from_sql_id(column: &str, value: i64) -> MedResult<u64> {
    u64::try_from(value)
        .map_err(|_| MedtrailError::storage(format!("negative {column} {value} in stored row")))
}

/// A row exactly as SQLite returns it, before type conversion.
struct RawRow {
    sequence_id: i64,
    actor_id: i64,
    action_kind: String,
    subject_id: Option<i64>,
    timestamp: String,
    previous_digest: String,
    digest: String,
    signature: String,
}

impl RawRow {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            sequence_id: row.get(0)?,
            actor_id: row.get(1)?,
            action_kind: row.get(2)?,
            subject_id: row.get(3)?,
            timestamp: row.get(4)?,
            previous_digest: row.get(5)?,
            digest: row.get(6)?,
            signature: row.get(7)?,
        })
    }

    fn into_entry(self) -> MedResult<AuditEntry> {
        Ok(AuditEntry {
            sequence_id: from_sql_id("sequence_id", self.sequence_id)?,
            actor_id: from_sql_id("actor_id", self.actor_id)?,
            action_kind: self.action_kind,
            subject_id: self
                .subject_id
                .map(|id| from_sql_id("subject_id", id))
                .transpose()?,
            timestamp: parse_canonical_timestamp(&self.timestamp)?,
            previous_digest: self.previous_digest,
            digest: self.digest,
            signature: self.signature,
        })
    }
}

fn collect_entries(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> MedResult<Vec<AuditEntry>> {
    let mut stmt = conn.prepare(sql).ctx("prepare select entries")?;
    let rows = stmt
        .query_map(params, RawRow::read)
        .ctx("query entries")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .ctx("read entry row")?;
    rows.into_iter().map(RawRow::into_entry).collect()
}

fn read_tail(conn: &Connection) -> MedResult<ChainTail> {
    let last: Option<(i64, String)> = conn
        .query_row(
            "SELECT sequence_id, digest FROM audit_entries ORDER BY sequence_id DESC LIMIT 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .ctx("read chain tail")?;

    match last {
        Some((sequence_id, digest)) => Ok(ChainTail {
            sequence_id: from_sql_id("sequence_id", sequence_id)?,
            digest,
        }),
        None => Ok(ChainTail::genesis()),
    }
}

/// `WHERE` clause and bound values for a filter.
///
/// `None` when the filter cannot match any stored row: an actor id above
/// `i64::MAX` was never accepted on append.
fn filter_clause(filter: &AuditFilter) -> Option<(String, Vec<Value>)> {
    let mut clauses = Vec::new();
    let mut values = Vec::new();

    if let Some(actor) = filter.actor_id {
        values.push(Value::Integer(i64::try_from(actor).ok()?));
        clauses.push(format!("actor_id = ?{}", values.len()));
    }
    if let Some(action) = &filter.action_kind {
        values.push(Value::Text(action.clone()));
        clauses.push(format!("action_kind = ?{}", values.len()));
    }
    if let Some(lower) = filter.lower() {
        values.push(Value::Text(canonical_timestamp(&ceil_to_micros(lower))));
        clauses.push(format!("timestamp >= ?{}", values.len()));
    }
    if let Some(upper) = filter.upper() {
        values.push(Value::Text(canonical_timestamp(&upper)));
        clauses.push(format!("timestamp <= ?{}", values.len()));
    }

    let clause = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };
    Some((clause, values))
}

/// Stored timestamps have microsecond precision, so a lower bound with a
/// sub-microsecond part starts at the next whole microsecond.
fn ceil_to_micros(ts: DateTime<Utc>) -> DateTime<Utc> {
    let truncated = truncate_timestamp(ts);
    if truncated < ts {
        truncated + chrono::Duration::microseconds(1)
    } else {
        truncated
    }
}

// ── Public store ──────────────────────────────────────────────────────────────

/// A persistent, append-only audit log in one SQLite database.
pub struct SqliteAuditStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteAuditStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteAuditStore").finish_non_exhaustive()
    }
}

impl SqliteAuditStore {
    /// Open (creating if needed) the database at `path`.
    ///
    /// `":memory:"` opens a private in-memory database. File databases are
    /// switched to WAL so readers do not block the writer.
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> MedResult<Self> {
        let path = path.as_ref();
        if path.as_os_str() == IN_MEMORY_PATH {
            return Self::in_memory();
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    MedtrailError::storage(format!("create db parent dir {}: {e}", parent.display()))
                })?;
            }
        }

        let conn = Connection::open(path).ctx("open audit database")?;
        conn.busy_timeout(busy_timeout).ctx("set busy timeout")?;
        let mode: String = conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .ctx("enable WAL")?;
        let store = Self::with_connection(conn)?;

        info!(path = %path.display(), journal_mode = %mode, "audit database opened");
        Ok(store)
    }

    /// Open a database that must already exist.
    ///
    /// For read-only tooling: a mistyped path fails with `Storage` instead
    /// of silently creating an empty log that verifies as intact.
    pub fn open_existing(path: impl AsRef<Path>, busy_timeout: Duration) -> MedResult<Self> {
        let path = path.as_ref();
        if path.as_os_str() != IN_MEMORY_PATH && !path.is_file() {
            return Err(MedtrailError::storage(format!(
                "audit database {} does not exist",
                path.display()
            )));
        }
        Self::open(path, busy_timeout)
    }

    /// A private in-memory database, gone when the store is dropped.
    pub fn in_memory() -> MedResult<Self> {
        let conn = Connection::open_in_memory().ctx("open in-memory audit database")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> MedResult<Self> {
        conn.execute_batch(SCHEMA).ctx("create audit schema")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MedResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| MedtrailError::storage(format!("connection lock poisoned: {e}")))
    }
}

// ── AuditStore impl ───────────────────────────────────────────────────────────

impl AuditStore for SqliteAuditStore {
    fn append_locked(&self, build: BuildEntry<'_>) -> MedResult<AuditEntry> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .ctx("begin append transaction")?;

        let tail = read_tail(&tx)?;
        // Dropping `tx` on any early return rolls back.
        let sealed = build(&tail)?;
        let entry = sealed.into_entry(tail.next_sequence_id());

        tx.execute(
            r#"
            INSERT INTO audit_entries (
                sequence_id, actor_id, action_kind, subject_id, timestamp,
                previous_digest, digest, signature
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                to_sql_id("sequence_id", entry.sequence_id)?,
                to_sql_id("actor_id", entry.actor_id)?,
                entry.action_kind,
                entry
                    .subject_id
                    .map(|id| to_sql_id("subject_id", id))
                    .transpose()?,
                canonical_timestamp(&entry.timestamp),
                entry.previous_digest,
                entry.digest,
                entry.signature,
            ],
        )
        .ctx("insert audit entry")?;

        tx.commit().ctx("commit append transaction")?;

        debug!(sequence_id = entry.sequence_id, "entry committed to sqlite");
        Ok(entry)
    }

    fn tail(&self) -> MedResult<ChainTail> {
        let conn = self.lock()?;
        read_tail(&conn)
    }

    fn count(&self) -> MedResult<u64> {
        let conn = self.lock()?;
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM audit_entries", [], |row| row.get(0))
            .ctx("count entries")?;
        from_sql_id("count", n)
    }

    fn read_batch(&self, after: u64, limit: usize) -> MedResult<Vec<AuditEntry>> {
        let conn = self.lock()?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        collect_entries(
            &conn,
            &format!(
                "SELECT {SELECT_COLUMNS} FROM audit_entries \
                 WHERE sequence_id > ?1 ORDER BY sequence_id ASC LIMIT ?2"
            ),
            params![to_sql_id("after", after)?, limit],
        )
    }

    fn query(&self, filter: &AuditFilter, page: PageRequest) -> MedResult<AuditPage> {
        let Some((clause, mut values)) = filter_clause(filter) else {
            return Ok(AuditPage::new(Vec::new(), 0, page));
        };
        let conn = self.lock()?;

        let total: i64 = conn
            .query_row(
                &format!("SELECT COUNT(*) FROM audit_entries{clause}"),
                params_from_iter(values.iter()),
                |row| row.get(0),
            )
            .ctx("count filtered entries")?;
        let total = from_sql_id("count", total)?;

        let limit_slot = values.len() + 1;
        let offset_slot = values.len() + 2;
        values.push(Value::Integer(page.page_size() as i64));
        values.push(Value::Integer(
            i64::try_from(page.offset()).unwrap_or(i64::MAX),
        ));

        let entries = collect_entries(
            &conn,
            &format!(
                "SELECT {SELECT_COLUMNS} FROM audit_entries{clause} \
                 ORDER BY sequence_id ASC LIMIT ?{limit_slot} OFFSET ?{offset_slot}"
            ),
            params_from_iter(values.iter()),
        )?;

        Ok(AuditPage::new(entries, total, page))
    }
}
