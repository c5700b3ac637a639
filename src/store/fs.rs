//! File backend.
//!
//! Stores named JSON documents as plain files in the history directory.
//! Writes go through a temp file and an atomic rename so a crash mid-write
//! never leaves a half-written document behind.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::StoreError;

const SENTINEL: &str = ".probe";

#[derive(Debug)]
pub struct FsBackend {
    dir: PathBuf,
}

impl FsBackend {
    /// Functional test: create the directory, write a sentinel file, read it
    /// back, delete it. The sentinel is removed even on partial failure.
    pub fn probe(dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(dir)
            .map_err(|e| StoreError::Probe(format!("create {}: {e}", dir.display())))?;

        let sentinel = dir.join(SENTINEL);
        let outcome = fs::write(&sentinel, b"probe").and_then(|()| fs::read_to_string(&sentinel));
        let _ = fs::remove_file(&sentinel);

        match outcome {
            Ok(contents) if contents == "probe" => Ok(FsBackend {
                dir: dir.to_path_buf(),
            }),
            Ok(_) => Err(StoreError::Probe(format!(
                "sentinel read-back mismatch in {}",
                dir.display()
            ))),
            Err(e) => Err(StoreError::Probe(format!(
                "sentinel test in {}: {e}",
                dir.display()
            ))),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Read a document. A missing file is not an error.
    pub fn read(&self, name: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path(name)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Read(format!("{name}: {e}"))),
        }
    }

    /// Write a document via temp file + rename. The temp file is removed if
    /// either step fails.
    pub fn write(&self, name: &str, contents: &str) -> Result<(), StoreError> {
        let temp = self.path(&format!("{name}.tmp"));
        let target = self.path(name);

        let outcome = fs::write(&temp, contents).and_then(|()| fs::rename(&temp, &target));
        if outcome.is_err() {
            let _ = fs::remove_file(&temp);
        }

        outcome.map_err(|e| StoreError::Write(format!("{name}: {e}")))
    }

    /// Delete a document. A missing file is not an error.
    pub fn delete(&self, name: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Write(format!("{name}: {e}"))),
        }
    }
}
