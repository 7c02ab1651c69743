//! SQLite-backed job store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{JobStatus, JobStore, JobStoreError, ProcessingJob};

const SELECT_COLUMNS: &str = "SELECT id, media_id, status, error_message, started_at, completed_at, created_at FROM processing_jobs";

/// SQLite-backed job store.
pub struct SqliteJobStore {
    conn: Mutex<Connection>,
}

impl SqliteJobStore {
    pub fn new(path: &Path) -> Result<Self, JobStoreError> {
        let conn = Connection::open(path).map_err(db_err)?;
        conn.busy_timeout(Duration::from_secs(5)).map_err(db_err)?;
        conn.query_row("PRAGMA journal_mode=WAL", [], |_| Ok(()))
            .map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self, JobStoreError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), JobStoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS processing_jobs (
                id TEXT PRIMARY KEY,
                media_id TEXT NOT NULL,
                status TEXT NOT NULL,
                error_message TEXT,
                started_at TEXT,
                completed_at TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_processing_jobs_media_created
                ON processing_jobs(media_id, created_at DESC);
            "#,
        )
        .map_err(db_err)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, JobStoreError> {
        self.conn
            .lock()
            .map_err(|_| JobStoreError::Database("connection lock poisoned".to_string()))
    }

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<ProcessingJob> {
        let status_str: String = row.get(2)?;
        let started_at: Option<String> = row.get(4)?;
        let completed_at: Option<String> = row.get(5)?;
        let created_at: String = row.get(6)?;

        let status = status_str.parse::<JobStatus>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, e.into())
        })?;

        Ok(ProcessingJob {
            id: row.get(0)?,
            media_id: row.get(1)?,
            status,
            error_message: row.get(3)?,
            started_at: started_at.as_deref().map(parse_timestamp),
            completed_at: completed_at.as_deref().map(parse_timestamp),
            created_at: parse_timestamp(&created_at),
        })
    }

    /// Apply a terminal transition, refusing jobs that already finished.
    fn finish(
        &self,
        id: &str,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> Result<(), JobStoreError> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE processing_jobs SET status = ?, error_message = ?, completed_at = ? WHERE id = ? AND status IN ('pending', 'processing')",
                params![status.as_str(), error_message, timestamp(Utc::now()), id],
            )
            .map_err(db_err)?;

        if changed == 1 {
            return Ok(());
        }

        let current: Option<String> = conn
            .query_row(
                "SELECT status FROM processing_jobs WHERE id = ?",
                params![id],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;

        match current {
            None => Err(JobStoreError::NotFound(id.to_string())),
            Some(s) => Err(JobStoreError::InvalidState {
                job_id: id.to_string(),
                current: s.parse().map_err(JobStoreError::Database)?,
            }),
        }
    }
}

fn db_err(e: rusqlite::Error) -> JobStoreError {
    JobStoreError::Database(e.to_string())
}

// Nanosecond precision keeps creation order stable for attempts that land in
// the same second; the fixed width keeps string comparison chronological.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl JobStore for SqliteJobStore {
    fn create(&self, media_id: &str, status: JobStatus) -> Result<ProcessingJob, JobStoreError> {
        let conn = self.lock()?;

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let started_at = (status == JobStatus::Processing).then_some(now);

        conn.execute(
            "INSERT INTO processing_jobs (id, media_id, status, error_message, started_at, completed_at, created_at) VALUES (?, ?, ?, NULL, ?, NULL, ?)",
            params![
                id,
                media_id,
                status.as_str(),
                started_at.map(timestamp),
                timestamp(now),
            ],
        )
        .map_err(db_err)?;

        Ok(ProcessingJob {
            id,
            media_id: media_id.to_string(),
            status,
            error_message: None,
            started_at,
            completed_at: None,
            created_at: now,
        })
    }

    fn get(&self, id: &str) -> Result<Option<ProcessingJob>, JobStoreError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("{} WHERE id = ?", SELECT_COLUMNS),
            params![id],
            Self::row_to_job,
        )
        .optional()
        .map_err(db_err)
    }

    fn latest_for_media(&self, media_id: &str) -> Result<Option<ProcessingJob>, JobStoreError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!(
                "{} WHERE media_id = ? ORDER BY created_at DESC, rowid DESC LIMIT 1",
                SELECT_COLUMNS
            ),
            params![media_id],
            Self::row_to_job,
        )
        .optional()
        .map_err(db_err)
    }

    fn list_for_media(&self, media_id: &str) -> Result<Vec<ProcessingJob>, JobStoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "{} WHERE media_id = ? ORDER BY created_at DESC, rowid DESC",
                SELECT_COLUMNS
            ))
            .map_err(db_err)?;

        let rows = stmt
            .query_map(params![media_id], Self::row_to_job)
            .map_err(db_err)?;

        let mut jobs = Vec::new();
        for row in rows {
            jobs.push(row.map_err(db_err)?);
        }
        Ok(jobs)
    }

    fn complete(&self, id: &str) -> Result<(), JobStoreError> {
        self.finish(id, JobStatus::Completed, None)
    }

    fn fail(&self, id: &str, error_message: &str) -> Result<(), JobStoreError> {
        self.finish(id, JobStatus::Failed, Some(error_message))
    }
}
