//! Storage backends and startup probing.
//!
//! Two persistent tiers plus one ephemeral tier:
//! - file backend: named JSON documents in the data directory (preferred)
//! - key-value backend: SQLite kv table with a per-value quota (fallback)
//! - session backend: in-process map, gone at exit (backup tier only)
//!
//! The probe runs once at startup and picks the primary backend. The only
//! later transition is file -> key-value after a failed save; nothing ever
//! moves backward.

pub mod fs;
pub mod kv;
pub mod session;

use thiserror::Error;

use crate::config::Config;
use fs::FsBackend;
use kv::KvBackend;
use session::SessionBackend;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage probe failed: {0}")]
    Probe(String),

    #[error("persisted history failed validation: {0}")]
    Validation(String),

    #[error("storage quota exceeded")]
    QuotaExceeded,

    #[error("storage write failed: {0}")]
    Write(String),

    #[error("storage read failed: {0}")]
    Read(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    PrimaryFs,
    KeyValue,
    None,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::PrimaryFs => "file",
            BackendKind::KeyValue => "key-value",
            BackendKind::None => "none",
        }
    }
}

/// Outcome of the startup probe. `backend` only changes again on the one-way
/// file -> key-value fallback after a write failure.
#[derive(Debug, Clone)]
pub struct StorageStatus {
    pub backend: BackendKind,
    pub available: bool,
    pub last_error: Option<String>,
}

/// The concrete backends a session has access to. Backends missing from the
/// probe stay `None`; the session tier always exists.
pub struct Stores {
    pub fs: Option<FsBackend>,
    pub kv: Option<KvBackend>,
    pub session: SessionBackend,
}

/// Determine, once at startup, which backends are usable.
///
/// The file backend is preferred as primary. The key-value backend is probed
/// even when the file backend wins, because backup snapshots target it.
pub fn probe(config: &Config) -> (StorageStatus, Stores) {
    let mut last_error = None;

    let fs = match FsBackend::probe(&config.history_dir()) {
        Ok(backend) => Some(backend),
        Err(e) => {
            last_error = Some(e.to_string());
            None
        }
    };

    let kv = match KvBackend::probe(&config.kv_db_path(), config.kv_quota_bytes) {
        Ok(backend) => Some(backend),
        Err(e) => {
            if fs.is_some() {
                // primary is fine, only the backup tier is degraded
                tracing::warn!("key-value backend unavailable, backups disabled: {e}");
            } else {
                last_error = Some(e.to_string());
            }
            None
        }
    };

    let backend = if fs.is_some() {
        BackendKind::PrimaryFs
    } else if kv.is_some() {
        BackendKind::KeyValue
    } else {
        BackendKind::None
    };

    let status = StorageStatus {
        backend,
        available: backend != BackendKind::None,
        last_error,
    };

    let stores = Stores {
        fs,
        kv,
        session: SessionBackend::new(),
    };

    (status, stores)
}
