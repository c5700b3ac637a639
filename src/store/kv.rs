//! Key-value backend.
//!
//! A single SQLite table of string keys to string values, used when the file
//! backend is unusable and as the target for backup snapshots. Values are
//! size-limited so the history cannot grow the database unbounded; exceeding
//! the quota surfaces as `StoreError::QuotaExceeded` so callers can trim and
//! retry.

use rusqlite::{Connection, params};
use std::path::Path;

use super::StoreError;

const SENTINEL_KEY: &str = "__qrlog_probe__";

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS kv (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;
    Ok(())
}

pub struct KvBackend {
    conn: Connection,
    quota_bytes: usize,
}

impl KvBackend {
    pub fn open(path: &Path, quota_bytes: usize) -> Result<Self, StoreError> {
        let conn = Connection::open(path)
            .map_err(|e| StoreError::Probe(format!("open {}: {e}", path.display())))?;
        init_schema(&conn).map_err(|e| StoreError::Probe(format!("init schema: {e}")))?;

        Ok(KvBackend { conn, quota_bytes })
    }

    /// Functional test: open the database, then write and delete a sentinel
    /// key so a read-only or corrupt database is caught up front.
    pub fn probe(path: &Path, quota_bytes: usize) -> Result<Self, StoreError> {
        let backend = Self::open(path, quota_bytes)?;
        backend
            .set(SENTINEL_KEY, "probe")
            .and_then(|()| backend.remove(SENTINEL_KEY))
            .map_err(|e| StoreError::Probe(format!("sentinel test: {e}")))?;
        Ok(backend)
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM kv WHERE key = ?1")
            .map_err(|e| StoreError::Read(format!("{key}: {e}")))?;

        let mut rows = stmt
            .query(params![key])
            .map_err(|e| StoreError::Read(format!("{key}: {e}")))?;

        match rows.next().map_err(|e| StoreError::Read(format!("{key}: {e}")))? {
            Some(row) => {
                let value: String = row
                    .get(0)
                    .map_err(|e| StoreError::Read(format!("{key}: {e}")))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if value.len() > self.quota_bytes {
            return Err(StoreError::QuotaExceeded);
        }

        self.conn
            .execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )
            .map_err(|e| StoreError::Write(format!("{key}: {e}")))?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])
            .map_err(|e| StoreError::Write(format!("{key}: {e}")))?;
        Ok(())
    }
}
