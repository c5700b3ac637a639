use serde::{Serialize, Deserialize};

use crate::classify::ScanKind;

/// Maximum entries the history keeps before the oldest fall off.
pub const HISTORY_CAP: usize = 100;

/// How many entries survive a quota-triggered trim.
pub const QUOTA_TRIM: usize = 50;

/// Snapshot sizes per backup tier.
pub const BACKUP_CAP_KV: usize = 50;
pub const BACKUP_CAP_SESSION: usize = 30;

pub const BACKUP_FORMAT_VERSION: &str = "1.0";

/// A single decoded scan. Immutable once created; records are only ever
/// removed from the history, never edited.
///
/// Field names match the persisted JSON shape:
/// `{"id": ..., "data": ..., "timestamp": ..., "type": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub id: String,
    pub data: String,
    /// epoch milliseconds
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub kind: ScanKind,
}

/// Size-capped copy of recent history kept in a different backend than the
/// primary, for disaster recovery. Persisted as
/// `{"timestamp": ..., "version": ..., "history": [...]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupSnapshot {
    /// epoch milliseconds at which the snapshot was taken
    pub timestamp: i64,
    pub version: String,
    pub history: Vec<ScanRecord>,
}

impl BackupSnapshot {
    /// Snapshot the newest `cap` records.
    pub fn take(records: &[ScanRecord], cap: usize) -> Self {
        BackupSnapshot {
            timestamp: chrono::Utc::now().timestamp_millis(),
            version: BACKUP_FORMAT_VERSION.to_string(),
            history: records.iter().take(cap).cloned().collect(),
        }
    }
}
