//! SQLite-backed media ledger.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use super::{ClaimOutcome, MediaItem, MediaStatus, MediaStore, MediaStoreError, NewMediaItem};

const SELECT_COLUMNS: &str = "SELECT id, owner_id, s3_key_original, s3_key_processed, size_bytes, duration_seconds, status, created_at, updated_at FROM media";

/// SQLite-backed media ledger.
pub struct SqliteMediaStore {
    conn: Mutex<Connection>,
}

impl SqliteMediaStore {
    /// Open (or create) the database file and make sure the table exists.
    pub fn new(path: &Path) -> Result<Self, MediaStoreError> {
        let conn = Connection::open(path).map_err(db_err)?;
        // The job store opens the same file on its own connection.
        conn.busy_timeout(Duration::from_secs(5)).map_err(db_err)?;
        conn.query_row("PRAGMA journal_mode=WAL", [], |_| Ok(()))
            .map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, MediaStoreError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), MediaStoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS media (
                id TEXT PRIMARY KEY,
                owner_id INTEGER NOT NULL,
                s3_key_original TEXT NOT NULL,
                s3_key_processed TEXT,
                size_bytes INTEGER NOT NULL DEFAULT 0,
                duration_seconds INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_media_owner_id ON media(owner_id);
            CREATE INDEX IF NOT EXISTS idx_media_status ON media(status);
            "#,
        )
        .map_err(db_err)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, MediaStoreError> {
        self.conn
            .lock()
            .map_err(|_| MediaStoreError::Database("connection lock poisoned".to_string()))
    }

    fn row_to_media(row: &rusqlite::Row) -> rusqlite::Result<MediaItem> {
        let status_str: String = row.get(6)?;
        let created_at_str: String = row.get(7)?;
        let updated_at_str: String = row.get(8)?;

        let status = status_str.parse::<MediaStatus>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                6,
                rusqlite::types::Type::Text,
                e.into(),
            )
        })?;

        Ok(MediaItem {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            original_storage_key: row.get(2)?,
            processed_storage_key: row.get(3)?,
            size_bytes: row.get(4)?,
            duration_seconds: row.get(5)?,
            status,
            created_at: parse_timestamp(&created_at_str),
            updated_at: parse_timestamp(&updated_at_str),
        })
    }

    fn ensure_updated(changed: usize, id: &str) -> Result<(), MediaStoreError> {
        if changed == 0 {
            Err(MediaStoreError::NotFound(id.to_string()))
        } else {
            Ok(())
        }
    }
}

fn db_err(e: rusqlite::Error) -> MediaStoreError {
    MediaStoreError::Database(e.to_string())
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl MediaStore for SqliteMediaStore {
    fn insert(&self, item: NewMediaItem) -> Result<MediaItem, MediaStoreError> {
        let conn = self.lock()?;
        let now = Utc::now();

        let result = conn.execute(
            "INSERT INTO media (id, owner_id, s3_key_original, s3_key_processed, size_bytes, duration_seconds, status, created_at, updated_at) VALUES (?, ?, ?, NULL, ?, 0, ?, ?, ?)",
            params![
                item.id,
                item.owner_id,
                item.original_storage_key,
                item.size_bytes,
                item.status.as_str(),
                now.to_rfc3339(),
                now.to_rfc3339(),
            ],
        );

        match result {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                return Err(MediaStoreError::AlreadyExists(item.id));
            }
            Err(e) => return Err(db_err(e)),
        }

        Ok(MediaItem {
            id: item.id,
            owner_id: item.owner_id,
            original_storage_key: item.original_storage_key,
            processed_storage_key: None,
            size_bytes: item.size_bytes,
            duration_seconds: 0,
            status: item.status,
            created_at: now,
            updated_at: now,
        })
    }

    fn get(&self, id: &str) -> Result<Option<MediaItem>, MediaStoreError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("{} WHERE id = ?", SELECT_COLUMNS),
            params![id],
            Self::row_to_media,
        )
        .optional()
        .map_err(db_err)
    }

    fn set_status(&self, id: &str, status: MediaStatus) -> Result<(), MediaStoreError> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE media SET status = ?, updated_at = ? WHERE id = ?",
                params![status.as_str(), Utc::now().to_rfc3339(), id],
            )
            .map_err(db_err)?;
        Self::ensure_updated(changed, id)
    }

    fn claim_for_processing(&self, id: &str) -> Result<ClaimOutcome, MediaStoreError> {
        let mut conn = self.lock()?;
        // IMMEDIATE takes the write lock up front, so the read and the swap are
        // atomic even against other processes sharing the database file.
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(db_err)?;

        let current: Option<String> = tx
            .query_row(
                "SELECT status FROM media WHERE id = ?",
                params![id],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;

        let current = match current {
            Some(s) => s
                .parse::<MediaStatus>()
                .map_err(MediaStoreError::Database)?,
            None => return Err(MediaStoreError::NotFound(id.to_string())),
        };

        if !current.is_claimable() {
            return Ok(ClaimOutcome::AlreadyClaimed { current });
        }

        let changed = tx
            .execute(
                "UPDATE media SET status = 'processing', updated_at = ? WHERE id = ? AND status = ?",
                params![Utc::now().to_rfc3339(), id, current.as_str()],
            )
            .map_err(db_err)?;
        tx.commit().map_err(db_err)?;

        if changed == 1 {
            Ok(ClaimOutcome::Claimed { previous: current })
        } else {
            Ok(ClaimOutcome::AlreadyClaimed {
                current: MediaStatus::Processing,
            })
        }
    }

    fn mark_ready(&self, id: &str, processed_key: Option<&str>) -> Result<(), MediaStoreError> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE media SET status = 'ready', s3_key_processed = COALESCE(?, s3_key_processed), updated_at = ? WHERE id = ?",
                params![processed_key, Utc::now().to_rfc3339(), id],
            )
            .map_err(db_err)?;
        Self::ensure_updated(changed, id)
    }

    fn record_metadata(
        &self,
        id: &str,
        duration_seconds: Option<i64>,
        size_bytes: Option<i64>,
    ) -> Result<(), MediaStoreError> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE media SET duration_seconds = COALESCE(?, duration_seconds), size_bytes = COALESCE(?, size_bytes), updated_at = ? WHERE id = ?",
                params![duration_seconds, size_bytes, Utc::now().to_rfc3339(), id],
            )
            .map_err(db_err)?;
        Self::ensure_updated(changed, id)
    }
}
