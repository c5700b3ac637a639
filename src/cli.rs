use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "qrlog")]
#[command(about = "A resilient history manager for decoded QR payloads")]
#[command(version)]
pub struct Cli {
    /// Storage root (defaults to the platform data directory)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Show detailed output including storage diagnostics
    #[arg(long, short = 'v', global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Record decoded payloads (from arguments, or one per stdin line)
    Add(AddArgs),

    /// List recorded scans, newest first
    History(HistoryArgs),

    /// Export the history as CSV
    Export(ExportArgs),

    /// Delete a single scan by id
    Remove(RemoveArgs),

    /// Delete all recorded scans
    Clear(ClearArgs),

    /// Show which storage backend is active
    Status,
}

#[derive(Parser)]
pub struct AddArgs {
    /// Decoded payload text; omit to read payloads from stdin
    pub payload: Vec<String>,
}

#[derive(Parser)]
pub struct HistoryArgs {
    /// Output as JSON instead of a table
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Show at most this many entries
    #[arg(long)]
    pub limit: Option<usize>,

    /// Print only the newest payload (for piping)
    #[arg(long, default_value_t = false)]
    pub latest: bool,
}

#[derive(Parser)]
pub struct ExportArgs {
    /// Write CSV to a file instead of stdout
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

#[derive(Parser)]
pub struct RemoveArgs {
    /// Id of the scan to delete
    #[arg(long)]
    pub id: String,
}

#[derive(Parser)]
pub struct ClearArgs {
    /// Skip confirmation and delete everything
    #[arg(long, default_value_t = false)]
    pub yes: bool,
}
