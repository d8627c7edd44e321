//! SQLite implementation of every repository trait
//!
//! One connection behind a `Mutex`. Timestamps are stored as RFC 3339 UTC
//! strings with fixed microsecond precision so text order equals time order.

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{
    Actor, ApiErrorRecord, CalendarEvent, Content, ContentId, ContentStatus, ContentSummary,
    DedupCandidate, EditHistoryEntry, JobId, JobStatus, NewApiError, NewAttemptLog,
    NewHistoryEntry, Platform, PlatformTarget, PublishAttemptLog, ScheduledJob, UnknownVariant,
};
use crate::storage::repository::{
    AttemptLogRepository, ContentChange, ContentDraft, ContentFilter, ContentRepository,
    ErrorFilter, ErrorSink, ErrorStats, JobRepository, JobResolution, Page,
};

const CONTENT_COLUMNS: &str = "id, title, body, excerpt, meta_title, meta_description, status, \
     platform, seo_score, seo_issues, fingerprint, is_duplicate, author_id, created_at, \
     updated_at, published_at";

const JOB_COLUMNS: &str = "id, content_id, platform, scheduled_for, status, retry_count, \
     last_error, next_attempt_at, claim_token, claimed_at, created_at, updated_at";

const ATTEMPT_COLUMNS: &str = "id, content_id, job_id, platform, outcome, external_id, \
     external_url, error, retry_count, created_at";

const API_ERROR_COLUMNS: &str =
    "id, platform, endpoint, method, status_code, message, resolved, retry_count, created_at";

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS contents (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        body TEXT NOT NULL,
        excerpt TEXT,
        meta_title TEXT,
        meta_description TEXT,
        status TEXT NOT NULL DEFAULT 'DRAFT',
        platform TEXT NOT NULL DEFAULT 'TISTORY',
        seo_score INTEGER NOT NULL DEFAULT 0,
        seo_issues TEXT NOT NULL DEFAULT '[]',
        fingerprint TEXT,
        is_duplicate INTEGER NOT NULL DEFAULT 0,
        author_id INTEGER,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        published_at TEXT,
        publish_token TEXT,
        publish_locked_until TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_contents_status ON contents(status);
    CREATE INDEX IF NOT EXISTS idx_contents_fingerprint ON contents(fingerprint);
    CREATE INDEX IF NOT EXISTS idx_contents_created ON contents(created_at);

    CREATE TABLE IF NOT EXISTS edit_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        content_id INTEGER NOT NULL REFERENCES contents(id) ON DELETE CASCADE,
        actor_id INTEGER,
        action TEXT NOT NULL,
        field TEXT,
        old_value TEXT,
        new_value TEXT,
        created_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_edit_history_content ON edit_history(content_id);

    CREATE TABLE IF NOT EXISTS scheduled_jobs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        content_id INTEGER NOT NULL REFERENCES contents(id) ON DELETE CASCADE,
        platform TEXT NOT NULL,
        scheduled_for TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'PENDING',
        retry_count INTEGER NOT NULL DEFAULT 0,
        last_error TEXT,
        next_attempt_at TEXT,
        claim_token TEXT,
        claimed_at TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE UNIQUE INDEX IF NOT EXISTS idx_scheduled_jobs_one_pending
        ON scheduled_jobs(content_id) WHERE status = 'PENDING';
    CREATE INDEX IF NOT EXISTS idx_scheduled_jobs_due
        ON scheduled_jobs(status, scheduled_for);

    CREATE TABLE IF NOT EXISTS publish_attempts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        content_id INTEGER NOT NULL REFERENCES contents(id) ON DELETE CASCADE,
        job_id INTEGER REFERENCES scheduled_jobs(id) ON DELETE SET NULL,
        platform TEXT NOT NULL,
        outcome TEXT NOT NULL,
        external_id TEXT,
        external_url TEXT,
        error TEXT,
        retry_count INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_publish_attempts_content ON publish_attempts(content_id);
    CREATE INDEX IF NOT EXISTS idx_publish_attempts_job ON publish_attempts(job_id);

    CREATE TABLE IF NOT EXISTS api_errors (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        platform TEXT NOT NULL,
        endpoint TEXT NOT NULL,
        method TEXT NOT NULL,
        status_code INTEGER,
        message TEXT NOT NULL,
        resolved INTEGER NOT NULL DEFAULT 0,
        retry_count INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_api_errors_created ON api_errors(created_at);
"#;

// ============================================================================
// Row Helpers
// ============================================================================

fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn get_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn get_opt_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) => DateTime::parse_from_rfc3339(&raw)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| conversion_error(idx, e)),
        None => Ok(None),
    }
}

fn get_enum<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = UnknownVariant>,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>().map_err(|e| conversion_error(idx, e))
}

fn get_u32(row: &Row<'_>, idx: usize) -> rusqlite::Result<u32> {
    let raw: i64 = row.get(idx)?;
    Ok(u32::try_from(raw.max(0)).unwrap_or(u32::MAX))
}

fn content_from_row(row: &Row<'_>) -> rusqlite::Result<Content> {
    let issues_raw: String = row.get(9)?;
    let seo_issues: Vec<String> =
        serde_json::from_str(&issues_raw).map_err(|e| conversion_error(9, e))?;

    Ok(Content {
        id: row.get(0)?,
        title: row.get(1)?,
        body: row.get(2)?,
        excerpt: row.get(3)?,
        meta_title: row.get(4)?,
        meta_description: row.get(5)?,
        status: get_enum(row, 6)?,
        platform: get_enum(row, 7)?,
        seo_score: get_u32(row, 8)?,
        seo_issues,
        fingerprint: row.get(10)?,
        is_duplicate: row.get(11)?,
        author_id: row.get(12)?,
        created_at: get_ts(row, 13)?,
        updated_at: get_ts(row, 14)?,
        published_at: get_opt_ts(row, 15)?,
    })
}

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<ScheduledJob> {
    Ok(ScheduledJob {
        id: row.get(0)?,
        content_id: row.get(1)?,
        platform: get_enum(row, 2)?,
        scheduled_for: get_ts(row, 3)?,
        status: get_enum(row, 4)?,
        retry_count: get_u32(row, 5)?,
        last_error: row.get(6)?,
        next_attempt_at: get_opt_ts(row, 7)?,
        claim_token: row.get(8)?,
        claimed_at: get_opt_ts(row, 9)?,
        created_at: get_ts(row, 10)?,
        updated_at: get_ts(row, 11)?,
    })
}

fn history_from_row(row: &Row<'_>) -> rusqlite::Result<EditHistoryEntry> {
    Ok(EditHistoryEntry {
        id: row.get(0)?,
        content_id: row.get(1)?,
        actor: Actor::from_user(row.get(2)?),
        action: get_enum(row, 3)?,
        field: row.get(4)?,
        old_value: row.get(5)?,
        new_value: row.get(6)?,
        created_at: get_ts(row, 7)?,
    })
}

fn attempt_from_row(row: &Row<'_>) -> rusqlite::Result<PublishAttemptLog> {
    Ok(PublishAttemptLog {
        id: row.get(0)?,
        content_id: row.get(1)?,
        job_id: row.get(2)?,
        platform: get_enum(row, 3)?,
        outcome: get_enum(row, 4)?,
        external_id: row.get(5)?,
        external_url: row.get(6)?,
        error: row.get(7)?,
        retry_count: get_u32(row, 8)?,
        created_at: get_ts(row, 9)?,
    })
}

fn api_error_from_row(row: &Row<'_>) -> rusqlite::Result<ApiErrorRecord> {
    let status_code: Option<i64> = row.get(4)?;
    Ok(ApiErrorRecord {
        id: row.get(0)?,
        platform: get_enum(row, 1)?,
        endpoint: row.get(2)?,
        method: row.get(3)?,
        status_code: status_code.and_then(|code| u16::try_from(code).ok()),
        message: row.get(5)?,
        resolved: row.get(6)?,
        retry_count: get_u32(row, 7)?,
        created_at: get_ts(row, 8)?,
    })
}

fn load_content(conn: &Connection, id: ContentId) -> rusqlite::Result<Option<Content>> {
    conn.query_row(
        &format!("SELECT {CONTENT_COLUMNS} FROM contents WHERE id = ?1"),
        params![id],
        content_from_row,
    )
    .optional()
}

fn load_job(conn: &Connection, id: JobId) -> rusqlite::Result<Option<ScheduledJob>> {
    conn.query_row(
        &format!("SELECT {JOB_COLUMNS} FROM scheduled_jobs WHERE id = ?1"),
        params![id],
        job_from_row,
    )
    .optional()
}

fn has_pending_job(conn: &Connection, content_id: ContentId) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM scheduled_jobs WHERE content_id = ?1 AND status = 'PENDING')",
        params![content_id],
        |row| row.get(0),
    )
}

/// Token of an unexpired publish lock on the content
fn active_publish_token(
    conn: &Connection,
    content_id: ContentId,
    now: &str,
) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT publish_token FROM contents
         WHERE id = ?1 AND publish_token IS NOT NULL AND publish_locked_until > ?2",
        params![content_id, now],
        |row| row.get(0),
    )
    .optional()
}

fn has_claimed_job(conn: &Connection, content_id: ContentId) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM scheduled_jobs
         WHERE content_id = ?1 AND status = 'PENDING' AND claim_token IS NOT NULL)",
        params![content_id],
        |row| row.get(0),
    )
}

fn insert_history(
    conn: &Connection,
    content_id: ContentId,
    entry: &NewHistoryEntry,
    now: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO edit_history (content_id, actor_id, action, field, old_value, new_value, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            content_id,
            entry.actor.user_id(),
            entry.action.as_str(),
            entry.field,
            entry.old_value,
            entry.new_value,
            now
        ],
    )?;
    Ok(())
}

fn set_content_status(
    conn: &Connection,
    content_id: ContentId,
    status: ContentStatus,
    now: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE contents SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now, content_id],
    )?;
    Ok(())
}

/// Map a unique-index violation to `Conflict`
fn constraint_to_conflict(err: rusqlite::Error, message: impl Into<String>) -> Error {
    match err.sqlite_error_code() {
        Some(rusqlite::ErrorCode::ConstraintViolation) => Error::Conflict(message.into()),
        _ => Error::Database(err),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ============================================================================
// SqliteStore
// ============================================================================

/// SQLite-backed store for contents, jobs, attempts and API errors
///
/// Uses `Mutex` to ensure thread-safety for the SQLite connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file
    pub fn new(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        let path = path.as_ref();

        // Create parent directory if needed
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrency
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let store = Self::from_connection(conn, busy_timeout)?;
        tracing::info!(path = %path.display(), "SQLite store initialized");
        Ok(store)
    }

    /// Create in-memory store (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, Duration::from_secs(5))
    }

    fn from_connection(conn: Connection, busy_timeout: Duration) -> Result<Self> {
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Storage("SQLite connection lock poisoned".to_string()))
    }
}

impl ContentRepository for SqliteStore {
    fn create_content(&self, draft: ContentDraft<'_>) -> Result<Content> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let now = ts(Utc::now());
        let new = draft.content;

        tx.execute(
            "INSERT INTO contents (title, body, excerpt, meta_title, meta_description, status,
                platform, seo_score, seo_issues, fingerprint, is_duplicate, author_id,
                created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)",
            params![
                new.title,
                new.body,
                new.excerpt,
                new.meta_title,
                new.meta_description,
                ContentStatus::Draft.as_str(),
                new.platform.as_str(),
                i64::from(draft.seo.score),
                serde_json::to_string(&draft.seo.issues)?,
                draft.fingerprint,
                draft.is_duplicate,
                new.author_id,
                now
            ],
        )?;
        let id = tx.last_insert_rowid();

        insert_history(&tx, id, &NewHistoryEntry::created(draft.actor), &now)?;

        let content = load_content(&tx, id)?
            .ok_or_else(|| Error::Storage(format!("content {id} vanished after insert")))?;
        tx.commit()?;

        Ok(content)
    }

    fn get_content(&self, id: ContentId) -> Result<Option<Content>> {
        let conn = self.conn()?;
        Ok(load_content(&conn, id)?)
    }

    fn apply_change(&self, id: ContentId, change: ContentChange) -> Result<Content> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current = load_content(&tx, id)?.ok_or(Error::not_found("content", id))?;
        if current.status != change.expected_status {
            return Err(Error::conflict(format!(
                "content {id} is {} (expected {})",
                current.status, change.expected_status
            )));
        }

        if change.require_no_pending_job && has_pending_job(&tx, id)? {
            return Err(Error::conflict(format!(
                "content {id} has a pending scheduled job; cancel it first"
            )));
        }

        let now = ts(Utc::now());
        let lock = active_publish_token(&tx, id, &now)?;
        if lock.is_some() && lock != change.publish_token {
            return Err(Error::conflict(format!("content {id} is being published")));
        }

        let patch = &change.patch;
        let seo_issues = change
            .seo
            .as_ref()
            .map(|seo| serde_json::to_string(&seo.issues))
            .transpose()?;

        tx.execute(
            "UPDATE contents SET
                title = COALESCE(?1, title),
                body = COALESCE(?2, body),
                excerpt = COALESCE(?3, excerpt),
                meta_title = COALESCE(?4, meta_title),
                meta_description = COALESCE(?5, meta_description),
                platform = COALESCE(?6, platform),
                status = COALESCE(?7, status),
                seo_score = COALESCE(?8, seo_score),
                seo_issues = COALESCE(?9, seo_issues),
                published_at = COALESCE(?10, published_at),
                fingerprint = COALESCE(?11, fingerprint),
                is_duplicate = COALESCE(?12, is_duplicate),
                publish_token = CASE WHEN ?13 IS NULL THEN publish_token ELSE NULL END,
                publish_locked_until = CASE WHEN ?13 IS NULL THEN publish_locked_until ELSE NULL END,
                updated_at = ?14
             WHERE id = ?15",
            params![
                patch.title,
                patch.body,
                patch.excerpt,
                patch.meta_title,
                patch.meta_description,
                patch.platform.map(|p| p.as_str()),
                patch.status.map(|s| s.as_str()),
                change.seo.as_ref().map(|seo| i64::from(seo.score)),
                seo_issues,
                change.published_at.map(ts),
                change.fingerprint,
                change.is_duplicate,
                change.publish_token,
                now,
                id
            ],
        )?;

        for entry in &change.entries {
            insert_history(&tx, id, entry, &now)?;
        }

        let content = load_content(&tx, id)?.ok_or(Error::not_found("content", id))?;
        tx.commit()?;

        Ok(content)
    }

    fn delete_content(&self, id: ContentId) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if has_claimed_job(&tx, id)? {
            return Err(Error::conflict(format!(
                "content {id} has a job being dispatched"
            )));
        }
        if active_publish_token(&tx, id, &ts(Utc::now()))?.is_some() {
            return Err(Error::conflict(format!("content {id} is being published")));
        }

        let deleted = tx.execute("DELETE FROM contents WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(deleted > 0)
    }

    fn claim_publish(
        &self,
        id: ContentId,
        expected_status: ContentStatus,
        until: DateTime<Utc>,
    ) -> Result<String> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current = load_content(&tx, id)?.ok_or(Error::not_found("content", id))?;
        if current.status != expected_status {
            return Err(Error::conflict(format!(
                "content {id} is {} (expected {expected_status})",
                current.status
            )));
        }
        if active_publish_token(&tx, id, &ts(Utc::now()))?.is_some() {
            return Err(Error::conflict(format!("content {id} is being published")));
        }

        let token = Uuid::new_v4().to_string();
        tx.execute(
            "UPDATE contents SET publish_token = ?1, publish_locked_until = ?2 WHERE id = ?3",
            params![token, ts(until), id],
        )?;
        tx.commit()?;

        Ok(token)
    }

    fn release_publish(&self, id: ContentId, token: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE contents SET publish_token = NULL, publish_locked_until = NULL
             WHERE id = ?1 AND publish_token = ?2",
            params![id, token],
        )?;
        Ok(())
    }

    fn search(&self, filter: &ContentFilter) -> Result<Page<Content>> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(query) = filter.query.as_deref().filter(|q| !q.trim().is_empty()) {
            clauses.push("(title LIKE ? OR body LIKE ?)");
            let pattern = format!("%{}%", query.trim());
            values.push(Box::new(pattern.clone()));
            values.push(Box::new(pattern));
        }
        if let Some(status) = filter.status {
            clauses.push("status = ?");
            values.push(Box::new(status.as_str()));
        }
        if let Some(author) = filter.author_id {
            clauses.push("author_id = ?");
            values.push(Box::new(author));
        }
        if let Some(from) = filter.created_from {
            clauses.push("created_at >= ?");
            values.push(Box::new(ts(from)));
        }
        if let Some(to) = filter.created_to {
            clauses.push("created_at <= ?");
            values.push(Box::new(ts(to)));
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let conn = self.conn()?;
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM contents {where_sql}"),
            rusqlite::params_from_iter(values.iter()),
            |row| row.get(0),
        )?;

        values.push(Box::new(i64::from(filter.limit)));
        values.push(Box::new(filter.offset() as i64));

        let mut stmt = conn.prepare(&format!(
            "SELECT {CONTENT_COLUMNS} FROM contents {where_sql}
             ORDER BY updated_at DESC, id DESC LIMIT ? OFFSET ?"
        ))?;
        let items = stmt
            .query_map(rusqlite::params_from_iter(values.iter()), content_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Page {
            items,
            page: filter.page.max(1),
            limit: filter.limit,
            total: total.max(0) as u64,
        })
    }

    fn status_counts(&self) -> Result<BTreeMap<ContentStatus, u64>> {
        let conn = self.conn()?;
        let mut counts: BTreeMap<ContentStatus, u64> =
            ContentStatus::all().into_iter().map(|s| (s, 0)).collect();

        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM contents GROUP BY status")?;
        let rows = stmt.query_map([], |row| {
            Ok((get_enum::<ContentStatus>(row, 0)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows {
            let (status, count) = row?;
            counts.insert(status, count.max(0) as u64);
        }

        Ok(counts)
    }

    fn recent_by_status(&self, status: ContentStatus, limit: usize) -> Result<Vec<Content>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {CONTENT_COLUMNS} FROM contents WHERE status = ?1
             ORDER BY updated_at DESC, id DESC LIMIT ?2"
        ))?;
        let items = stmt
            .query_map(params![status.as_str(), limit as i64], content_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    fn history(&self, id: ContentId, limit: usize) -> Result<Vec<EditHistoryEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, content_id, actor_id, action, field, old_value, new_value, created_at
             FROM edit_history WHERE content_id = ?1
             ORDER BY created_at DESC, id DESC LIMIT ?2",
        )?;
        let entries = stmt
            .query_map(params![id, limit as i64], history_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    fn find_by_fingerprint(
        &self,
        fingerprint: &str,
        exclude: Option<ContentId>,
    ) -> Result<Option<ContentSummary>> {
        let conn = self.conn()?;
        let found = conn
            .query_row(
                "SELECT id, title FROM contents
                 WHERE fingerprint = ?1 AND (?2 IS NULL OR id != ?2)
                 ORDER BY id LIMIT 1",
                params![fingerprint, exclude],
                |row| {
                    Ok(ContentSummary {
                        id: row.get(0)?,
                        title: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(found)
    }

    fn recent_candidates(
        &self,
        limit: usize,
        exclude: Option<ContentId>,
    ) -> Result<Vec<DedupCandidate>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, title, body FROM contents
             WHERE (?1 IS NULL OR id != ?1)
             ORDER BY created_at DESC, id DESC LIMIT ?2",
        )?;
        let candidates = stmt
            .query_map(params![exclude, limit as i64], |row| {
                Ok(DedupCandidate {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    body: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(candidates)
    }

    fn set_fingerprint(&self, id: ContentId, fingerprint: &str) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE contents SET fingerprint = ?1, is_duplicate = 0 WHERE id = ?2",
            params![fingerprint, id],
        )?;
        if updated == 0 {
            return Err(Error::not_found("content", id));
        }
        Ok(())
    }

    fn mark_duplicate(&self, id: ContentId) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE contents SET is_duplicate = 1 WHERE id = ?1",
            params![id],
        )?;
        if updated == 0 {
            return Err(Error::not_found("content", id));
        }
        Ok(())
    }
}

impl JobRepository for SqliteStore {
    fn create_job(
        &self,
        content_id: ContentId,
        expected_status: ContentStatus,
        platform: PlatformTarget,
        scheduled_for: DateTime<Utc>,
        actor: Actor,
    ) -> Result<ScheduledJob> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let content =
            load_content(&tx, content_id)?.ok_or(Error::not_found("content", content_id))?;
        if content.status != expected_status {
            return Err(Error::conflict(format!(
                "content {content_id} is {} (expected {expected_status})",
                content.status
            )));
        }
        if has_pending_job(&tx, content_id)? {
            return Err(Error::conflict(format!(
                "content {content_id} already has a pending scheduled job"
            )));
        }

        let now = ts(Utc::now());
        if active_publish_token(&tx, content_id, &now)?.is_some() {
            return Err(Error::conflict(format!(
                "content {content_id} is being published"
            )));
        }

        if content.status != ContentStatus::Scheduled {
            set_content_status(&tx, content_id, ContentStatus::Scheduled, &now)?;
            insert_history(
                &tx,
                content_id,
                &NewHistoryEntry::status_change(actor, content.status, ContentStatus::Scheduled),
                &now,
            )?;
        }

        tx.execute(
            "INSERT INTO scheduled_jobs (content_id, platform, scheduled_for, status, retry_count,
                created_at, updated_at)
             VALUES (?1, ?2, ?3, 'PENDING', 0, ?4, ?4)",
            params![content_id, platform.as_str(), ts(scheduled_for), now],
        )
        .map_err(|e| {
            constraint_to_conflict(
                e,
                format!("content {content_id} already has a pending scheduled job"),
            )
        })?;
        let id = tx.last_insert_rowid();

        let job = load_job(&tx, id)?
            .ok_or_else(|| Error::Storage(format!("job {id} vanished after insert")))?;
        tx.commit()?;

        Ok(job)
    }

    fn get_job(&self, id: JobId) -> Result<Option<ScheduledJob>> {
        let conn = self.conn()?;
        Ok(load_job(&conn, id)?)
    }

    fn pending_jobs(&self, content_id: ContentId) -> Result<Vec<ScheduledJob>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {JOB_COLUMNS} FROM scheduled_jobs
             WHERE content_id = ?1 AND status = 'PENDING' ORDER BY scheduled_for, id"
        ))?;
        let jobs = stmt
            .query_map(params![content_id], job_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(jobs)
    }

    fn reschedule_job(&self, id: JobId, scheduled_for: DateTime<Utc>) -> Result<ScheduledJob> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let job = load_job(&tx, id)?.ok_or(Error::not_found("job", id))?;
        if job.status != JobStatus::Pending {
            return Err(Error::conflict(format!("job {id} is {}", job.status)));
        }
        if job.is_claimed() {
            return Err(Error::conflict(format!("job {id} is being dispatched")));
        }

        tx.execute(
            "UPDATE scheduled_jobs SET scheduled_for = ?1, next_attempt_at = NULL, updated_at = ?2
             WHERE id = ?3",
            params![ts(scheduled_for), ts(Utc::now()), id],
        )?;

        let job = load_job(&tx, id)?.ok_or(Error::not_found("job", id))?;
        tx.commit()?;
        Ok(job)
    }

    fn cancel_job(&self, id: JobId, actor: Actor) -> Result<ScheduledJob> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let job = load_job(&tx, id)?.ok_or(Error::not_found("job", id))?;
        if job.status != JobStatus::Pending {
            return Err(Error::conflict(format!("job {id} is {}", job.status)));
        }
        if job.is_claimed() {
            return Err(Error::conflict(format!("job {id} is being dispatched")));
        }

        tx.execute("DELETE FROM scheduled_jobs WHERE id = ?1", params![id])?;

        let now = ts(Utc::now());
        if let Some(content) = load_content(&tx, job.content_id)? {
            if content.status == ContentStatus::Scheduled {
                set_content_status(&tx, content.id, ContentStatus::Approved, &now)?;
                insert_history(
                    &tx,
                    content.id,
                    &NewHistoryEntry::status_change(
                        actor,
                        ContentStatus::Scheduled,
                        ContentStatus::Approved,
                    ),
                    &now,
                )?;
            }
        }

        tx.commit()?;
        Ok(job)
    }

    fn requeue_job(&self, id: JobId, actor: Actor) -> Result<ScheduledJob> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let job = load_job(&tx, id)?.ok_or(Error::not_found("job", id))?;
        if job.status != JobStatus::Failed {
            return Err(Error::conflict(format!(
                "job {id} is {}; only FAILED jobs can be requeued",
                job.status
            )));
        }
        if has_pending_job(&tx, job.content_id)? {
            return Err(Error::conflict(format!(
                "content {} already has a pending scheduled job",
                job.content_id
            )));
        }

        let content = load_content(&tx, job.content_id)?
            .ok_or(Error::not_found("content", job.content_id))?;
        let now = ts(Utc::now());
        if active_publish_token(&tx, content.id, &now)?.is_some() {
            return Err(Error::conflict(format!(
                "content {} is being published",
                content.id
            )));
        }
        match content.status {
            ContentStatus::Scheduled => {}
            ContentStatus::Approved => {
                set_content_status(&tx, content.id, ContentStatus::Scheduled, &now)?;
                insert_history(
                    &tx,
                    content.id,
                    &NewHistoryEntry::status_change(
                        actor,
                        ContentStatus::Approved,
                        ContentStatus::Scheduled,
                    ),
                    &now,
                )?;
            }
            other => {
                return Err(Error::conflict(format!(
                    "content {} is {other}; approve it before requeueing",
                    content.id
                )));
            }
        }

        tx.execute(
            "UPDATE scheduled_jobs SET status = 'PENDING', retry_count = 0, last_error = NULL,
                next_attempt_at = NULL, claim_token = NULL, claimed_at = NULL, updated_at = ?1
             WHERE id = ?2",
            params![now, id],
        )?;

        let job = load_job(&tx, id)?.ok_or(Error::not_found("job", id))?;
        tx.commit()?;
        Ok(job)
    }

    fn claim_due_jobs(
        &self,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ScheduledJob>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let ids: Vec<JobId> = {
            let mut stmt = tx.prepare(
                "SELECT id FROM scheduled_jobs
                 WHERE status = 'PENDING'
                   AND (claim_token IS NULL OR claimed_at < ?1)
                   AND COALESCE(next_attempt_at, scheduled_for) <= ?2
                 ORDER BY COALESCE(next_attempt_at, scheduled_for), id
                 LIMIT ?3",
            )?;
            let ids = stmt
                .query_map(params![ts(stale_before), ts(now), limit as i64], |row| {
                    row.get(0)
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            ids
        };

        let claimed_at = ts(now);
        let mut jobs = Vec::with_capacity(ids.len());
        for id in ids {
            let token = Uuid::new_v4().to_string();
            tx.execute(
                "UPDATE scheduled_jobs SET claim_token = ?1, claimed_at = ?2 WHERE id = ?3",
                params![token, claimed_at, id],
            )?;
            if let Some(job) = load_job(&tx, id)? {
                jobs.push(job);
            }
        }

        tx.commit()?;
        Ok(jobs)
    }

    fn resolve_job(
        &self,
        id: JobId,
        claim_token: &str,
        resolution: JobResolution,
    ) -> Result<ScheduledJob> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let job = load_job(&tx, id)?.ok_or(Error::not_found("job", id))?;
        if job.status != JobStatus::Pending || job.claim_token.as_deref() != Some(claim_token) {
            return Err(Error::conflict(format!("claim on job {id} was lost")));
        }

        let now_dt = Utc::now();
        let now = ts(now_dt);

        match resolution {
            JobResolution::Published { posts } => {
                tx.execute(
                    "UPDATE scheduled_jobs SET status = 'PUBLISHED', last_error = NULL,
                        next_attempt_at = NULL, claim_token = NULL, claimed_at = NULL,
                        updated_at = ?1
                     WHERE id = ?2",
                    params![now, id],
                )?;

                let content = load_content(&tx, job.content_id)?
                    .ok_or(Error::not_found("content", job.content_id))?;
                tx.execute(
                    "UPDATE contents SET status = 'PUBLISHED', published_at = ?1, updated_at = ?1
                     WHERE id = ?2",
                    params![now, content.id],
                )?;
                if content.status != ContentStatus::Published {
                    insert_history(
                        &tx,
                        content.id,
                        &NewHistoryEntry::status_change(
                            Actor::System,
                            content.status,
                            ContentStatus::Published,
                        ),
                        &now,
                    )?;
                }
                for (platform, url) in &posts {
                    insert_history(
                        &tx,
                        content.id,
                        &NewHistoryEntry::published(Actor::System, *platform, url.as_deref()),
                        &now,
                    )?;
                }
            }
            JobResolution::Retry {
                error,
                next_attempt_at,
            } => {
                tx.execute(
                    "UPDATE scheduled_jobs SET retry_count = retry_count + 1, last_error = ?1,
                        next_attempt_at = ?2, claim_token = NULL, claimed_at = NULL,
                        updated_at = ?3
                     WHERE id = ?4",
                    params![error, ts(next_attempt_at), now, id],
                )?;
            }
            JobResolution::Failed {
                error,
                count_attempt,
            } => {
                tx.execute(
                    "UPDATE scheduled_jobs SET status = 'FAILED',
                        retry_count = retry_count + ?1, last_error = ?2,
                        next_attempt_at = NULL, claim_token = NULL, claimed_at = NULL,
                        updated_at = ?3
                     WHERE id = ?4",
                    params![i64::from(count_attempt), error, now, id],
                )?;
            }
        }

        let job = load_job(&tx, id)?.ok_or(Error::not_found("job", id))?;
        tx.commit()?;
        Ok(job)
    }

    fn calendar(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        include_history: bool,
    ) -> Result<Vec<CalendarEvent>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT j.id, j.content_id, c.title, j.platform, j.scheduled_for, j.status
             FROM scheduled_jobs j JOIN contents c ON c.id = j.content_id
             WHERE j.scheduled_for >= ?1 AND j.scheduled_for < ?2
               AND (?3 OR j.status = 'PENDING')
             ORDER BY j.scheduled_for, j.id",
        )?;
        let events = stmt
            .query_map(params![ts(from), ts(to), include_history], |row| {
                Ok(CalendarEvent {
                    job_id: row.get(0)?,
                    content_id: row.get(1)?,
                    title: row.get(2)?,
                    platform: get_enum(row, 3)?,
                    scheduled_for: get_ts(row, 4)?,
                    status: get_enum(row, 5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(events)
    }
}

impl AttemptLogRepository for SqliteStore {
    fn record_attempt(&self, attempt: &NewAttemptLog) -> Result<PublishAttemptLog> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO publish_attempts (content_id, job_id, platform, outcome, external_id,
                external_url, error, retry_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                attempt.content_id,
                attempt.job_id,
                attempt.platform.as_str(),
                attempt.outcome.as_str(),
                attempt.external_id,
                attempt.external_url,
                attempt.error,
                i64::from(attempt.retry_count),
                ts(Utc::now())
            ],
        )?;
        let id = conn.last_insert_rowid();

        let log = conn.query_row(
            &format!("SELECT {ATTEMPT_COLUMNS} FROM publish_attempts WHERE id = ?1"),
            params![id],
            attempt_from_row,
        )?;
        Ok(log)
    }

    fn attempts_for_content(
        &self,
        content_id: ContentId,
        limit: usize,
    ) -> Result<Vec<PublishAttemptLog>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM publish_attempts WHERE content_id = ?1
             ORDER BY created_at DESC, id DESC LIMIT ?2"
        ))?;
        let logs = stmt
            .query_map(params![content_id, limit as i64], attempt_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(logs)
    }

    fn succeeded_platforms(&self, job_id: JobId) -> Result<Vec<Platform>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT platform FROM publish_attempts
             WHERE job_id = ?1 AND outcome = 'SUCCESS' ORDER BY platform",
        )?;
        let platforms = stmt
            .query_map(params![job_id], |row| get_enum::<Platform>(row, 0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(platforms)
    }
}

impl ErrorSink for SqliteStore {
    fn record(&self, error: &NewApiError) -> Result<ApiErrorRecord> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO api_errors (platform, endpoint, method, status_code, message, resolved,
                retry_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7)",
            params![
                error.platform.as_str(),
                error.endpoint,
                error.method,
                error.status_code.map(i64::from),
                error.message,
                i64::from(error.retry_count),
                ts(Utc::now())
            ],
        )?;
        let id = conn.last_insert_rowid();

        let record = conn.query_row(
            &format!("SELECT {API_ERROR_COLUMNS} FROM api_errors WHERE id = ?1"),
            params![id],
            api_error_from_row,
        )?;
        Ok(record)
    }

    fn list_errors(&self, filter: &ErrorFilter) -> Result<Page<ApiErrorRecord>> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(platform) = filter.platform {
            clauses.push("platform = ?");
            values.push(Box::new(platform.as_str()));
        }
        if let Some(resolved) = filter.resolved {
            clauses.push("resolved = ?");
            values.push(Box::new(resolved));
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let conn = self.conn()?;
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM api_errors {where_sql}"),
            rusqlite::params_from_iter(values.iter()),
            |row| row.get(0),
        )?;

        values.push(Box::new(i64::from(filter.limit)));
        values.push(Box::new(filter.offset() as i64));

        let mut stmt = conn.prepare(&format!(
            "SELECT {API_ERROR_COLUMNS} FROM api_errors {where_sql}
             ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
        ))?;
        let items = stmt
            .query_map(rusqlite::params_from_iter(values.iter()), api_error_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Page {
            items,
            page: filter.page.max(1),
            limit: filter.limit,
            total: total.max(0) as u64,
        })
    }

    fn error_stats(&self, now: DateTime<Utc>) -> Result<ErrorStats> {
        let day_ago = ts(now - chrono::Duration::hours(24));
        let week_ago = ts(now - chrono::Duration::days(7));

        let conn = self.conn()?;
        let count = |sql: &str, param: Option<&str>| -> rusqlite::Result<u64> {
            let n: i64 = match param {
                Some(p) => conn.query_row(sql, params![p], |row| row.get(0))?,
                None => conn.query_row(sql, [], |row| row.get(0))?,
            };
            Ok(n.max(0) as u64)
        };

        let total = count("SELECT COUNT(*) FROM api_errors", None)?;
        let unresolved = count("SELECT COUNT(*) FROM api_errors WHERE resolved = 0", None)?;
        let last_24h = count(
            "SELECT COUNT(*) FROM api_errors WHERE created_at >= ?1",
            Some(&day_ago),
        )?;
        let last_7d = count(
            "SELECT COUNT(*) FROM api_errors WHERE created_at >= ?1",
            Some(&week_ago),
        )?;

        let mut by_platform = BTreeMap::new();
        {
            let mut stmt = conn.prepare(
                "SELECT platform, COUNT(*) FROM api_errors WHERE created_at >= ?1
                 GROUP BY platform",
            )?;
            let rows = stmt.query_map(params![week_ago], |row| {
                Ok((get_enum::<Platform>(row, 0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (platform, n) = row?;
                by_platform.insert(platform, n.max(0) as u64);
            }
        }

        let top_endpoints = {
            let mut stmt = conn.prepare(
                "SELECT endpoint, COUNT(*) AS n FROM api_errors WHERE created_at >= ?1
                 GROUP BY endpoint ORDER BY n DESC, endpoint LIMIT 5",
            )?;
            let rows = stmt
                .query_map(params![week_ago], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?.max(0) as u64))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };

        let (avg_retry, max_retry): (f64, i64) = conn.query_row(
            "SELECT COALESCE(AVG(retry_count), 0.0), COALESCE(MAX(retry_count), 0)
             FROM api_errors WHERE created_at >= ?1",
            params![week_ago],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let (successes, failures): (i64, i64) = conn.query_row(
            "SELECT
                COALESCE(SUM(CASE WHEN outcome = 'SUCCESS' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN outcome = 'FAILED' THEN 1 ELSE 0 END), 0)
             FROM publish_attempts WHERE created_at >= ?1",
            params![week_ago],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let attempts = successes + failures;
        let (error_rate, success_rate) = if attempts > 0 {
            (
                round2(failures as f64 / attempts as f64 * 100.0),
                round2(successes as f64 / attempts as f64 * 100.0),
            )
        } else {
            (0.0, 100.0)
        };

        Ok(ErrorStats {
            total,
            unresolved,
            last_24h,
            last_7d,
            error_rate,
            success_rate,
            by_platform,
            top_endpoints,
            avg_retry_count: (avg_retry * 10.0).round() / 10.0,
            max_retry_count: u32::try_from(max_retry.max(0)).unwrap_or(u32::MAX),
        })
    }

    fn resolve(&self, id: i64) -> Result<ApiErrorRecord> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE api_errors SET resolved = 1 WHERE id = ?1",
            params![id],
        )?;
        if updated == 0 {
            return Err(Error::not_found("api error", id));
        }

        let record = conn.query_row(
            &format!("SELECT {API_ERROR_COLUMNS} FROM api_errors WHERE id = ?1"),
            params![id],
            api_error_from_row,
        )?;
        Ok(record)
    }
}
