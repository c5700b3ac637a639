//! Scan history and its persistence.
//!
//! `ScanHistory` is the single context object the rest of the tool works
//! against: it owns the in-memory record list, the storage status, and the
//! probed backends. All persistence goes through one mutex-guarded store set
//! so no two operations can interleave against the same backend.
//!
//! Resilience rules:
//! - malformed persisted data is discarded wholesale and reset to empty
//! - a failed file-backend save falls back to the key-value backend once and
//!   switches over for the rest of the session
//! - a quota-exceeded key-value save trims the list to the newest 50 and
//!   retries once
//! - backup snapshots are written to a different tier than the primary and
//!   consulted only when the primary comes up empty

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::classify;
use crate::config::Config;
use crate::record::{
    BackupSnapshot, ScanRecord, BACKUP_CAP_KV, BACKUP_CAP_SESSION, HISTORY_CAP, QUOTA_TRIM,
};
use crate::store::{self, BackendKind, StorageStatus, StoreError, Stores};

/// Fixed names the history lives under, per backend.
pub const HISTORY_FILE: &str = "qr-history.json";
pub const HISTORY_KEY: &str = "qr-scanner-history";
pub const BACKUP_KEY: &str = "qr-scanner-backup";

/// What a successful save had to do to land.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// The file backend failed and the write landed on the key-value backend;
    /// the session stays on key-value from here on.
    SwitchedToKeyValue,
    /// The key-value quota was hit; the oldest entries were dropped and the
    /// retry succeeded.
    Trimmed,
    /// No backend survived the probe; the history lives in memory only.
    Unavailable,
}

#[derive(Debug)]
pub enum Appended {
    Recorded { record: ScanRecord, save: SaveOutcome },
    /// The payload was byte-identical to the current newest entry.
    AdjacentDuplicate,
}

pub struct ScanHistory {
    records: Vec<ScanRecord>,
    status: StorageStatus,
    stores: Mutex<Stores>,
    restored: bool,
    seq: u64,
}

fn lock(stores: &Mutex<Stores>) -> MutexGuard<'_, Stores> {
    stores.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScanHistory {
    /// Probe the backends, load whatever history is persisted, and fall back
    /// to a backup snapshot when the primary comes up empty.
    pub fn open(config: &Config) -> Self {
        let (status, stores) = store::probe(config);
        let mut history = ScanHistory {
            records: Vec::new(),
            status,
            stores: Mutex::new(stores),
            restored: false,
            seq: 0,
        };

        history.records = match history.load() {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!("history load failed: {e}");
                Vec::new()
            }
        };

        if history.records.is_empty() {
            history.restored = history.restore();
        }

        history
    }

    pub fn records(&self) -> &[ScanRecord] {
        &self.records
    }

    pub fn status(&self) -> &StorageStatus {
        &self.status
    }

    /// True when `open` recovered the history from a backup snapshot.
    pub fn was_restored(&self) -> bool {
        self.restored
    }

    /// Read and validate the persisted history from the active backend.
    ///
    /// Missing or empty content is an empty list. Content that fails the
    /// record shape validation is discarded wholesale: the persisted state is
    /// reset to empty and an empty list returned, never partially-valid data.
    fn load(&mut self) -> Result<Vec<ScanRecord>, StoreError> {
        let raw = {
            let stores = lock(&self.stores);
            match self.status.backend {
                BackendKind::PrimaryFs => match stores.fs.as_ref() {
                    Some(fs) => fs.read(HISTORY_FILE)?,
                    None => None,
                },
                BackendKind::KeyValue => match stores.kv.as_ref() {
                    Some(kv) => kv.get(HISTORY_KEY)?,
                    None => None,
                },
                BackendKind::None => None,
            }
        };

        let Some(raw) = raw else {
            return Ok(Vec::new());
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        match serde_json::from_str::<Vec<ScanRecord>>(&raw) {
            Ok(records) => Ok(records),
            Err(e) => {
                let reason = StoreError::Validation(e.to_string());
                tracing::warn!("discarding persisted history: {reason}");
                if let Err(reset_err) = self.write_active("[]") {
                    tracing::warn!("failed to reset persisted history: {reset_err}");
                }
                Ok(Vec::new())
            }
        }
    }

    /// Write raw content to the active backend, no fallback logic.
    fn write_active(&self, raw: &str) -> Result<(), StoreError> {
        let stores = lock(&self.stores);
        match self.status.backend {
            BackendKind::PrimaryFs => match stores.fs.as_ref() {
                Some(fs) => fs.write(HISTORY_FILE, raw),
                None => Err(StoreError::Write("file backend not initialized".into())),
            },
            BackendKind::KeyValue => match stores.kv.as_ref() {
                Some(kv) => kv.set(HISTORY_KEY, raw),
                None => Err(StoreError::Write("key-value backend not initialized".into())),
            },
            BackendKind::None => Ok(()),
        }
    }

    /// Persist the full list to the active backend.
    ///
    /// A file-backend failure is retried once against the key-value backend;
    /// success there makes key-value the active backend for the rest of the
    /// session. A quota-exceeded key-value write trims the in-memory list to
    /// the newest entries and retries once.
    pub fn save(&mut self) -> Result<SaveOutcome, StoreError> {
        let json =
            serde_json::to_string(&self.records).map_err(|e| StoreError::Write(e.to_string()))?;
        let stores = lock(&self.stores);

        match self.status.backend {
            BackendKind::PrimaryFs => {
                let fs = stores
                    .fs
                    .as_ref()
                    .ok_or_else(|| StoreError::Write("file backend not initialized".into()))?;
                match fs.write(HISTORY_FILE, &json) {
                    Ok(()) => Ok(SaveOutcome::Saved),
                    Err(fs_err) => {
                        let Some(kv) = stores.kv.as_ref() else {
                            return Err(fs_err);
                        };
                        kv.set(HISTORY_KEY, &json)?;
                        self.status.backend = BackendKind::KeyValue;
                        self.status.last_error = Some(fs_err.to_string());
                        Ok(SaveOutcome::SwitchedToKeyValue)
                    }
                }
            }
            BackendKind::KeyValue => {
                let kv = stores
                    .kv
                    .as_ref()
                    .ok_or_else(|| StoreError::Write("key-value backend not initialized".into()))?;
                match kv.set(HISTORY_KEY, &json) {
                    Ok(()) => Ok(SaveOutcome::Saved),
                    Err(StoreError::QuotaExceeded) => {
                        self.records.truncate(QUOTA_TRIM);
                        let trimmed = serde_json::to_string(&self.records)
                            .map_err(|e| StoreError::Write(e.to_string()))?;
                        kv.set(HISTORY_KEY, &trimmed)?;
                        Ok(SaveOutcome::Trimmed)
                    }
                    Err(e) => Err(e),
                }
            }
            BackendKind::None => Ok(SaveOutcome::Unavailable),
        }
    }

    /// Write a backup snapshot to a different tier than the primary. Failures
    /// are logged and swallowed; backups never block the save path.
    fn create_backup(&self) {
        let mut stores = lock(&self.stores);
        match self.status.backend {
            BackendKind::PrimaryFs => {
                let snapshot = BackupSnapshot::take(&self.records, BACKUP_CAP_KV);
                let outcome = serde_json::to_string(&snapshot)
                    .map_err(|e| StoreError::Write(e.to_string()))
                    .and_then(|json| match stores.kv.as_ref() {
                        Some(kv) => kv.set(BACKUP_KEY, &json),
                        None => Err(StoreError::Write("key-value backend not initialized".into())),
                    });
                if let Err(e) = outcome {
                    tracing::warn!("backup snapshot write failed: {e}");
                }
            }
            BackendKind::KeyValue => {
                let snapshot = BackupSnapshot::take(&self.records, BACKUP_CAP_SESSION);
                match serde_json::to_string(&snapshot) {
                    Ok(json) => stores.session.set(BACKUP_KEY, &json),
                    Err(e) => tracing::warn!("backup snapshot write failed: {e}"),
                }
            }
            BackendKind::None => {}
        }
    }

    /// Adopt the first structurally valid, non-empty backup snapshot and
    /// persist it back to the primary backend. Never overwrites a non-empty
    /// in-memory list.
    pub fn restore(&mut self) -> bool {
        if !self.records.is_empty() {
            return false;
        }

        let candidates = {
            let stores = lock(&self.stores);
            let kv_backup = match stores.kv.as_ref() {
                Some(kv) => match kv.get(BACKUP_KEY) {
                    Ok(value) => value,
                    Err(e) => {
                        tracing::warn!("backup read failed: {e}");
                        None
                    }
                },
                None => None,
            };
            let session_backup = stores.session.get(BACKUP_KEY);
            [kv_backup, session_backup]
        };

        for raw in candidates.into_iter().flatten() {
            let snapshot: BackupSnapshot = match serde_json::from_str(&raw) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    tracing::warn!("ignoring malformed backup snapshot: {e}");
                    continue;
                }
            };
            if snapshot.history.is_empty() {
                continue;
            }

            self.records = snapshot.history;
            if let Err(e) = self.save() {
                tracing::warn!("failed to persist restored history: {e}");
            }
            return true;
        }

        false
    }

    /// Record a decoded payload: classify, suppress an adjacent duplicate,
    /// prepend, cap, persist, snapshot.
    pub fn append(&mut self, payload: &str) -> Result<Appended, StoreError> {
        if self
            .records
            .first()
            .is_some_and(|newest| newest.data == payload)
        {
            return Ok(Appended::AdjacentDuplicate);
        }

        let now = chrono::Utc::now().timestamp_millis();
        self.seq += 1;
        let record = ScanRecord {
            id: format!("{now}-{}", self.seq),
            data: payload.to_string(),
            timestamp: now,
            kind: classify::classify(payload),
        };

        self.records.insert(0, record.clone());
        self.records.truncate(HISTORY_CAP);

        let save = self.save()?;
        self.create_backup();

        Ok(Appended::Recorded { record, save })
    }

    /// Delete one record by id and persist. Returns whether anything was
    /// removed alongside the save outcome. Deletion does not refresh backups.
    pub fn remove(&mut self, id: &str) -> Result<(bool, SaveOutcome), StoreError> {
        let before = self.records.len();
        self.records.retain(|record| record.id != id);
        let removed = self.records.len() != before;

        let save = self.save()?;
        Ok((removed, save))
    }

    /// Drop every record, persist the empty list, then try to remove the
    /// underlying artifact. The empty-list write already achieves the visible
    /// effect, so a failed artifact removal is not fatal.
    pub fn clear(&mut self) -> Result<SaveOutcome, StoreError> {
        self.records.clear();
        let outcome = self.save()?;

        let stores = lock(&self.stores);
        let cleanup = match self.status.backend {
            BackendKind::PrimaryFs => match stores.fs.as_ref() {
                Some(fs) => fs.delete(HISTORY_FILE),
                None => Ok(()),
            },
            BackendKind::KeyValue => match stores.kv.as_ref() {
                Some(kv) => kv.remove(HISTORY_KEY),
                None => Ok(()),
            },
            BackendKind::None => Ok(()),
        };
        if let Err(e) = cleanup {
            tracing::debug!("history artifact removal failed: {e}");
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ScanKind;
    use std::fs as stdfs;
    use std::path::Path;
    use tempfile::TempDir;

    fn config_at(dir: &Path) -> Config {
        Config {
            data_dir: dir.to_path_buf(),
            kv_quota_bytes: 1024 * 1024,
            verbose: false,
        }
    }

    fn open_at(dir: &Path) -> ScanHistory {
        ScanHistory::open(&config_at(dir))
    }

    /// Turn the history directory into a regular file so the file tier is
    /// unusable and the probe lands on key-value.
    fn block_file_tier(config: &Config) {
        stdfs::write(config.history_dir(), b"not a directory").unwrap();
    }

    #[test]
    fn append_then_reload_round_trips() {
        let tmp = TempDir::new().unwrap();

        let mut history = open_at(tmp.path());
        history.append("https://example.com").unwrap();
        history.append("tel:+15550100").unwrap();
        history.append("just some text").unwrap();
        let saved = history.records().to_vec();
        drop(history);

        let reopened = open_at(tmp.path());
        assert_eq!(reopened.records(), saved.as_slice());
        assert!(!reopened.was_restored());
        // newest first
        assert_eq!(reopened.records()[0].data, "just some text");
        assert_eq!(reopened.records()[0].kind, ScanKind::Text);
        assert_eq!(reopened.records()[2].kind, ScanKind::Url);
    }

    #[test]
    fn append_never_exceeds_cap() {
        let tmp = TempDir::new().unwrap();
        let mut history = open_at(tmp.path());

        for i in 0..(HISTORY_CAP + 20) {
            history.append(&format!("payload {i}")).unwrap();
        }

        assert_eq!(history.records().len(), HISTORY_CAP);
        // the oldest entries fell off, the newest survived
        assert_eq!(history.records()[0].data, "payload 119");
        assert!(history.records().iter().all(|r| r.data != "payload 0"));
    }

    #[test]
    fn adjacent_duplicate_is_suppressed() {
        let tmp = TempDir::new().unwrap();
        let mut history = open_at(tmp.path());

        assert!(matches!(
            history.append("same").unwrap(),
            Appended::Recorded { .. }
        ));
        assert!(matches!(
            history.append("same").unwrap(),
            Appended::AdjacentDuplicate
        ));
        assert_eq!(history.records().len(), 1);
    }

    #[test]
    fn non_adjacent_duplicates_are_kept() {
        let tmp = TempDir::new().unwrap();
        let mut history = open_at(tmp.path());

        history.append("same").unwrap();
        history.append("other").unwrap();
        history.append("same").unwrap();

        assert_eq!(history.records().len(), 3);
    }

    #[test]
    fn record_ids_are_unique() {
        let tmp = TempDir::new().unwrap();
        let mut history = open_at(tmp.path());

        for i in 0..10 {
            history.append(&format!("payload {i}")).unwrap();
        }

        let mut ids: Vec<_> = history.records().iter().map(|r| r.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 10);
    }

    #[test]
    fn malformed_persisted_history_resets_to_empty() {
        let tmp = TempDir::new().unwrap();
        let config = config_at(tmp.path());

        // a record missing its type field, persisted directly
        stdfs::create_dir_all(config.history_dir()).unwrap();
        stdfs::write(
            config.history_dir().join(HISTORY_FILE),
            r#"[{"id": "1", "data": "x", "timestamp": 5}]"#,
        )
        .unwrap();

        let history = open_at(tmp.path());
        assert!(history.records().is_empty());

        // persisted state was reset, not left malformed
        let raw = stdfs::read_to_string(config.history_dir().join(HISTORY_FILE)).unwrap();
        assert_eq!(raw, "[]");
    }

    #[test]
    fn empty_file_loads_as_empty_history() {
        let tmp = TempDir::new().unwrap();
        let config = config_at(tmp.path());

        stdfs::create_dir_all(config.history_dir()).unwrap();
        stdfs::write(config.history_dir().join(HISTORY_FILE), "").unwrap();

        let history = open_at(tmp.path());
        assert!(history.records().is_empty());
    }

    #[test]
    fn quota_exceeded_trims_to_fifty_and_retries() {
        let tmp = TempDir::new().unwrap();
        let config = Config {
            data_dir: tmp.path().to_path_buf(),
            // roughly 75 records worth of serialized history
            kv_quota_bytes: 6000,
            verbose: false,
        };
        block_file_tier(&config);

        let mut history = ScanHistory::open(&config);
        assert_eq!(history.status().backend, BackendKind::KeyValue);

        let mut trimmed_at = None;
        for i in 0..HISTORY_CAP {
            match history.append(&format!("p{i}")).unwrap() {
                Appended::Recorded {
                    save: SaveOutcome::Trimmed,
                    ..
                } => {
                    trimmed_at = Some(i);
                    break;
                }
                Appended::Recorded { .. } => {}
                Appended::AdjacentDuplicate => unreachable!("payloads are distinct"),
            }
        }

        let hit = trimmed_at.expect("quota should have been hit before the cap");
        // the trim drops to exactly the retry size, newest entries intact
        assert_eq!(history.records().len(), QUOTA_TRIM);
        assert_eq!(history.records()[0].data, format!("p{hit}"));

        // the retried save landed, so a reload sees the trimmed list
        drop(history);
        let config = Config {
            data_dir: tmp.path().to_path_buf(),
            kv_quota_bytes: 6000,
            verbose: false,
        };
        let reopened = ScanHistory::open(&config);
        assert_eq!(reopened.records().len(), QUOTA_TRIM);
    }

    #[test]
    fn file_failure_switches_to_key_value_permanently() {
        let tmp = TempDir::new().unwrap();
        let config = config_at(tmp.path());

        let mut history = ScanHistory::open(&config);
        assert_eq!(history.status().backend, BackendKind::PrimaryFs);
        history.append("before failure").unwrap();

        // break the file tier out from under the live session
        stdfs::remove_dir_all(config.history_dir()).unwrap();
        block_file_tier(&config);

        match history.append("after failure").unwrap() {
            Appended::Recorded { save, .. } => {
                assert_eq!(save, SaveOutcome::SwitchedToKeyValue)
            }
            other => panic!("expected a recorded append, got {other:?}"),
        }
        assert_eq!(history.status().backend, BackendKind::KeyValue);
        assert!(history.status().last_error.is_some());

        // the transition is one-way even after the file tier comes back
        stdfs::remove_file(config.history_dir()).unwrap();
        stdfs::create_dir_all(config.history_dir()).unwrap();
        match history.append("file tier is back").unwrap() {
            Appended::Recorded { save, .. } => assert_eq!(save, SaveOutcome::Saved),
            other => panic!("expected a recorded append, got {other:?}"),
        }
        assert_eq!(history.status().backend, BackendKind::KeyValue);
        assert_eq!(history.records().len(), 3);
    }

    #[test]
    fn restore_adopts_key_value_backup_when_primary_is_empty() {
        let tmp = TempDir::new().unwrap();
        let config = config_at(tmp.path());

        let mut history = ScanHistory::open(&config);
        history.append("https://example.com/1").unwrap();
        history.append("https://example.com/2").unwrap();
        let saved = history.records().to_vec();
        drop(history);

        // primary data loss; the key-value backup survives
        stdfs::remove_file(config.history_dir().join(HISTORY_FILE)).unwrap();

        let recovered = open_at(tmp.path());
        assert!(recovered.was_restored());
        assert_eq!(recovered.records(), saved.as_slice());

        // the restore persisted the history back to the primary backend
        let raw = stdfs::read_to_string(config.history_dir().join(HISTORY_FILE)).unwrap();
        let reparsed: Vec<ScanRecord> = serde_json::from_str(&raw).unwrap();
        assert_eq!(reparsed, saved);
    }

    #[test]
    fn restore_never_overwrites_a_non_empty_list() {
        let tmp = TempDir::new().unwrap();
        let mut history = open_at(tmp.path());
        history.append("keep me").unwrap();

        assert!(!history.restore());
        assert_eq!(history.records().len(), 1);
        assert_eq!(history.records()[0].data, "keep me");
    }

    #[test]
    fn restore_skips_empty_and_malformed_backups() {
        let tmp = TempDir::new().unwrap();
        let mut history = open_at(tmp.path());

        {
            let stores = lock(&history.stores);
            let kv = stores.kv.as_ref().unwrap();
            kv.set(BACKUP_KEY, "not json at all").unwrap();
        }
        assert!(!history.restore());

        {
            let stores = lock(&history.stores);
            let kv = stores.kv.as_ref().unwrap();
            let empty = BackupSnapshot::take(&[], BACKUP_CAP_KV);
            kv.set(BACKUP_KEY, &serde_json::to_string(&empty).unwrap())
                .unwrap();
        }
        assert!(!history.restore());
        assert!(history.records().is_empty());
    }

    #[test]
    fn session_backup_restores_when_key_value_is_primary() {
        let tmp = TempDir::new().unwrap();
        let config = config_at(tmp.path());
        block_file_tier(&config);

        let mut history = ScanHistory::open(&config);
        assert_eq!(history.status().backend, BackendKind::KeyValue);
        history.append("one").unwrap();
        history.append("two").unwrap();
        let saved = history.records().to_vec();

        // key-value history loss inside the same session
        {
            let stores = lock(&history.stores);
            stores.kv.as_ref().unwrap().remove(HISTORY_KEY).unwrap();
        }
        history.records.clear();

        assert!(history.restore());
        assert_eq!(history.records(), saved.as_slice());

        // restored history was persisted back to the key-value primary
        let raw = {
            let stores = lock(&history.stores);
            stores.kv.as_ref().unwrap().get(HISTORY_KEY).unwrap()
        };
        let reparsed: Vec<ScanRecord> = serde_json::from_str(&raw.unwrap()).unwrap();
        assert_eq!(reparsed, saved);
    }

    #[test]
    fn clear_empties_history_and_removes_artifact() {
        let tmp = TempDir::new().unwrap();
        let config = config_at(tmp.path());

        let mut history = ScanHistory::open(&config);
        history.append("doomed").unwrap();
        history.clear().unwrap();

        assert!(history.records().is_empty());
        assert!(!config.history_dir().join(HISTORY_FILE).exists());
    }

    #[test]
    fn clear_leaves_backups_so_a_reopen_can_restore_them() {
        let tmp = TempDir::new().unwrap();
        let mut history = open_at(tmp.path());
        history.append("phoenix").unwrap();
        history.clear().unwrap();
        drop(history);

        // documented quirk: the backup tier is untouched by clear, so the
        // next startup finds an empty primary and restores the snapshot
        let reopened = open_at(tmp.path());
        assert!(reopened.was_restored());
        assert_eq!(reopened.records().len(), 1);
        assert_eq!(reopened.records()[0].data, "phoenix");
    }

    #[test]
    fn no_backend_degrades_to_in_memory_history() {
        let tmp = TempDir::new().unwrap();
        let data_dir = tmp.path().join("blocked");
        stdfs::write(&data_dir, b"occupied").unwrap();

        let mut history = ScanHistory::open(&config_at(&data_dir));
        assert_eq!(history.status().backend, BackendKind::None);
        assert!(!history.status().available);

        match history.append("still works").unwrap() {
            Appended::Recorded { save, .. } => assert_eq!(save, SaveOutcome::Unavailable),
            other => panic!("expected a recorded append, got {other:?}"),
        }
        assert_eq!(history.records().len(), 1);

        assert_eq!(history.clear().unwrap(), SaveOutcome::Unavailable);
        assert!(history.records().is_empty());
    }

    #[test]
    fn remove_deletes_only_the_matching_id() {
        let tmp = TempDir::new().unwrap();
        let mut history = open_at(tmp.path());
        history.append("first").unwrap();
        history.append("second").unwrap();
        let doomed = history.records()[1].id.clone();

        let (removed, _) = history.remove(&doomed).unwrap();
        assert!(removed);
        assert_eq!(history.records().len(), 1);
        assert_eq!(history.records()[0].data, "second");

        let (removed, _) = history.remove("no-such-id").unwrap();
        assert!(!removed);
        assert_eq!(history.records().len(), 1);
    }
}
