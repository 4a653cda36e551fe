//! SQLite persistence for users, validation jobs, and the API request log
//!
//! Every operation touches at most one user row and one validation row, so a
//! single connection behind a mutex gives row-level atomicity without
//! explicit transactions.

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::{
    ApiLogEntry, UserRecord, ValidationRecord, ValidationStats, ValidationStatus,
    VerificationReport,
};

const VALIDATION_COLUMNS: &str = "validation_id, user_id, status, file_count, \
    is_completely_verified, overall_confidence, verification_status, risk_level, \
    result_json, error_message, created_at, completed_at";

const USER_COLUMNS: &str =
    "user_id, email, first_access, last_access, total_requests, is_active";

/// SQLite-backed store for validation bookkeeping
pub struct ValidationDb {
    conn: Arc<Mutex<Connection>>,
}

impl ValidationDb {
    /// Create or open the database at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.migrate()?;
        tracing::info!("Validation database opened at {}", path.display());
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.migrate()?;
        Ok(db)
    }

    /// Create tables if absent
    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA foreign_keys=OFF;
        "#,
        )?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL UNIQUE,
                email TEXT,
                first_access TEXT NOT NULL,
                last_access TEXT NOT NULL,
                total_requests INTEGER NOT NULL DEFAULT 1,
                is_active INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS validations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                validation_id TEXT NOT NULL UNIQUE,
                user_id TEXT REFERENCES users(user_id),
                status TEXT NOT NULL DEFAULT 'processing',
                file_count INTEGER NOT NULL,
                is_completely_verified INTEGER,
                overall_confidence REAL,
                verification_status TEXT,
                risk_level TEXT,
                result_json TEXT,
                error_message TEXT,
                created_at TEXT NOT NULL,
                completed_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_validations_user_created
                ON validations(user_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_validations_status ON validations(status);

            CREATE TABLE IF NOT EXISTS api_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                endpoint TEXT NOT NULL,
                method TEXT NOT NULL,
                user_id TEXT,
                response_status INTEGER,
                response_time REAL,
                created_at TEXT NOT NULL
            );
        "#,
        )?;

        tracing::debug!("Database schema ready");
        Ok(())
    }

    /// Trivial query used by the health endpoint
    pub fn ping(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    // ==================== Users ====================

    /// Create the user on first sight, otherwise bump `last_access` and `total_requests`
    ///
    /// The upsert is a single statement, so concurrent first requests for the
    /// same id converge on one row.
    pub fn get_or_create_user(&self, user_id: &str, email: Option<&str>) -> Result<UserRecord> {
        let conn = self.conn.lock();
        let now = format_ts(&Utc::now());

        conn.execute(
            r#"
            INSERT INTO users (user_id, email, first_access, last_access, total_requests, is_active)
            VALUES (?1, ?2, ?3, ?3, 1, 1)
            ON CONFLICT(user_id) DO UPDATE SET
                last_access = excluded.last_access,
                total_requests = users.total_requests + 1,
                email = COALESCE(excluded.email, users.email)
            "#,
            params![user_id, email, now],
        )?;

        let user = conn.query_row(
            &format!("SELECT {} FROM users WHERE user_id = ?1", USER_COLUMNS),
            params![user_id],
            row_to_user,
        )?;

        Ok(user)
    }

    /// Get a user by id
    pub fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>> {
        let conn = self.conn.lock();

        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE user_id = ?1", USER_COLUMNS),
                params![user_id],
                row_to_user,
            )
            .optional()?;

        Ok(user)
    }

    // ==================== Validations ====================

    /// Insert a job in `processing` state; fails if the id already exists
    pub fn create_validation(
        &self,
        validation_id: &str,
        user_id: &str,
        file_count: u32,
    ) -> Result<ValidationRecord> {
        let conn = self.conn.lock();
        let now = Utc::now();

        conn.execute(
            r#"
            INSERT INTO validations (validation_id, user_id, status, file_count, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                validation_id,
                user_id,
                ValidationStatus::Processing.as_str(),
                file_count as i64,
                format_ts(&now),
            ],
        )?;

        Ok(ValidationRecord {
            validation_id: validation_id.to_string(),
            user_id: user_id.to_string(),
            status: ValidationStatus::Processing,
            file_count,
            is_completely_verified: None,
            overall_confidence: None,
            verification_status: None,
            risk_level: None,
            result_json: None,
            error_message: None,
            created_at: now,
            completed_at: None,
        })
    }

    /// Store the report and its summary columns in one update
    ///
    /// Returns `None` without error when no `processing` job has this id.
    pub fn complete_validation(
        &self,
        validation_id: &str,
        report: &VerificationReport,
    ) -> Result<Option<ValidationRecord>> {
        let result_json = serde_json::to_string(report)?;
        let summary = report.summary_fields();
        let conn = self.conn.lock();

        let updated = conn.execute(
            r#"
            UPDATE validations SET
                status = ?2,
                is_completely_verified = ?3,
                overall_confidence = ?4,
                verification_status = ?5,
                risk_level = ?6,
                result_json = ?7,
                completed_at = ?8
            WHERE validation_id = ?1 AND status = 'processing'
            "#,
            params![
                validation_id,
                ValidationStatus::Completed.as_str(),
                summary.is_completely_verified,
                summary.overall_confidence,
                summary.verification_status.as_str(),
                summary.risk_level.as_str(),
                result_json,
                format_ts(&Utc::now()),
            ],
        )?;

        if updated == 0 {
            tracing::debug!(validation_id, "complete_validation matched no processing job");
            return Ok(None);
        }

        fetch_validation(&conn, validation_id)
    }

    /// Move a `processing` job to `failed`
    pub fn fail_validation(
        &self,
        validation_id: &str,
        error_message: &str,
    ) -> Result<Option<ValidationRecord>> {
        let conn = self.conn.lock();

        let updated = conn.execute(
            r#"
            UPDATE validations SET status = ?2, error_message = ?3, completed_at = ?4
            WHERE validation_id = ?1 AND status = 'processing'
            "#,
            params![
                validation_id,
                ValidationStatus::Failed.as_str(),
                error_message,
                format_ts(&Utc::now()),
            ],
        )?;

        if updated == 0 {
            return Ok(None);
        }

        fetch_validation(&conn, validation_id)
    }

    /// Get a job by id
    pub fn get_validation(&self, validation_id: &str) -> Result<Option<ValidationRecord>> {
        let conn = self.conn.lock();
        fetch_validation(&conn, validation_id)
    }

    /// A user's jobs, newest first
    pub fn list_validations_for_user(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<ValidationRecord>> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM validations WHERE user_id = ?1 \
             ORDER BY created_at DESC, id DESC LIMIT ?2",
            VALIDATION_COLUMNS
        ))?;

        let records = stmt
            .query_map(params![user_id, limit as i64], row_to_validation)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(records)
    }

    /// Job counts per status
    pub fn validation_stats(&self) -> Result<ValidationStats> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM validations GROUP BY status")?;
        let mut stats = ValidationStats::default();

        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows {
            let (status, count) = row?;
            match ValidationStatus::parse(&status) {
                ValidationStatus::Processing => stats.processing += count as u64,
                ValidationStatus::Completed => stats.completed += count as u64,
                ValidationStatus::Failed => stats.failed += count as u64,
            }
        }

        Ok(stats)
    }

    // ==================== API Log ====================

    /// Append one request log row
    pub fn append_api_log(&self, entry: &ApiLogEntry) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            r#"
            INSERT INTO api_logs (endpoint, method, user_id, response_status, response_time, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                entry.endpoint,
                entry.method,
                entry.user_id,
                entry.response_status as i64,
                entry.response_time,
                format_ts(&entry.created_at),
            ],
        )?;

        Ok(())
    }

    /// Most recent log rows, newest first
    pub fn recent_api_logs(&self, limit: usize) -> Result<Vec<ApiLogEntry>> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(
            "SELECT endpoint, method, user_id, response_status, response_time, created_at \
             FROM api_logs ORDER BY id DESC LIMIT ?1",
        )?;

        let entries = stmt
            .query_map(params![limit as i64], |row| {
                let status: Option<i64> = row.get(3)?;
                let elapsed: Option<f64> = row.get(4)?;
                let created_at: String = row.get(5)?;
                Ok(ApiLogEntry {
                    endpoint: row.get(0)?,
                    method: row.get(1)?,
                    user_id: row.get(2)?,
                    response_status: status.unwrap_or_default() as u16,
                    response_time: elapsed.unwrap_or_default(),
                    created_at: parse_ts(&created_at),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(entries)
    }
}

/// Fixed-width RFC 3339 so text ordering matches time ordering
fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn fetch_validation(conn: &Connection, validation_id: &str) -> Result<Option<ValidationRecord>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM validations WHERE validation_id = ?1",
            VALIDATION_COLUMNS
        ),
        params![validation_id],
        row_to_validation,
    )
    .optional()
    .map_err(Error::from)
}

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<UserRecord> {
    let first_access: String = row.get(2)?;
    let last_access: String = row.get(3)?;
    let total_requests: i64 = row.get(4)?;

    Ok(UserRecord {
        user_id: row.get(0)?,
        email: row.get(1)?,
        first_access: parse_ts(&first_access),
        last_access: parse_ts(&last_access),
        total_requests: total_requests as u64,
        is_active: row.get(5)?,
    })
}

fn row_to_validation(row: &rusqlite::Row) -> rusqlite::Result<ValidationRecord> {
    let status: String = row.get(2)?;
    let file_count: i64 = row.get(3)?;
    let created_at: String = row.get(10)?;
    let completed_at: Option<String> = row.get(11)?;

    Ok(ValidationRecord {
        validation_id: row.get(0)?,
        user_id: row.get(1)?,
        status: ValidationStatus::parse(&status),
        file_count: file_count as u32,
        is_completely_verified: row.get(4)?,
        overall_confidence: row.get(5)?,
        verification_status: row.get(6)?,
        risk_level: row.get(7)?,
        result_json: row.get(8)?,
        error_message: row.get(9)?,
        created_at: parse_ts(&created_at),
        completed_at: completed_at.as_deref().map(parse_ts),
    })
}
