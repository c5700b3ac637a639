use std::path::PathBuf;

use crate::cli::Cli;

/// Default per-value quota for the key-value backend. The serialized history
/// stays far below this; it exists so a runaway value cannot bloat the store.
pub const DEFAULT_KV_QUOTA_BYTES: usize = 5 * 1024 * 1024;

pub struct Config {
    pub data_dir: PathBuf,
    pub kv_quota_bytes: usize,
    pub verbose: bool,
}

impl Config {
    pub fn from_cli(cli: &Cli) -> Result<Self, Box<dyn std::error::Error>> {
        let data_dir = match &cli.data_dir {
            Some(dir) => dir.clone(),
            None => default_data_dir()?,
        };

        Ok(Config {
            data_dir,
            kv_quota_bytes: DEFAULT_KV_QUOTA_BYTES,
            verbose: cli.verbose,
        })
    }

    /// Directory the file backend keeps its documents in.
    pub fn history_dir(&self) -> PathBuf {
        self.data_dir.join("history")
    }

    /// SQLite file backing the key-value tier.
    pub fn kv_db_path(&self) -> PathBuf {
        self.data_dir.join("kv.db")
    }
}

/// Get the data directory (~/.local/share/qrlog or platform equivalent)
pub fn default_data_dir() -> Result<PathBuf, Box<dyn std::error::Error>> {
    Ok(directories::ProjectDirs::from("", "", "qrlog")
        .ok_or("Could not determine data directory")?
        .data_dir()
        .to_path_buf())
}
