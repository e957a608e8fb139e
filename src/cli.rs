use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "cad-ingest",
    version,
    about = "Ingest CAD call exports from a watched folder into SQLite"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Watch(WatchArgs),
    Ingest(IngestArgs),
    Status(StatusArgs),
    Versions(VersionsArgs),
}

#[derive(Args, Debug, Clone)]
pub struct WatchArgs {
    #[arg(long, env = "CAD_WATCH_FOLDER")]
    pub watch_folder: PathBuf,

    #[arg(long, env = "CAD_DB_PATH", default_value = "cad_calls.sqlite")]
    pub db_path: PathBuf,

    #[arg(long, env = "CAD_POLL_INTERVAL_SECS", default_value_t = 5)]
    pub poll_interval_secs: u64,

    #[arg(long, env = "CAD_FILE_PATTERN", default_value = "*.xml")]
    pub file_pattern: String,

    #[arg(long, env = "CAD_STABILITY_WAIT_MS", default_value_t = 1000)]
    pub stability_wait_ms: u64,

    #[arg(long, env = "CAD_DEDUP_CAPACITY", default_value_t = 10_000)]
    pub dedup_capacity: usize,

    #[arg(long, env = "CAD_DB_CONNECT_ATTEMPTS", default_value_t = 5)]
    pub db_connect_attempts: u32,

    #[arg(long, env = "CAD_DB_RETRY_DELAY_SECS", default_value_t = 5)]
    pub db_retry_delay_secs: u64,
}

#[derive(Args, Debug, Clone)]
pub struct IngestArgs {
    #[arg(long, env = "CAD_DB_PATH", default_value = "cad_calls.sqlite")]
    pub db_path: PathBuf,

    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, env = "CAD_DB_PATH", default_value = "cad_calls.sqlite")]
    pub db_path: PathBuf,

    #[arg(long, default_value_t = 5)]
    pub recent_failures: usize,
}

#[derive(Args, Debug, Clone)]
pub struct VersionsArgs {
    #[arg(long, env = "CAD_WATCH_FOLDER")]
    pub watch_folder: PathBuf,

    #[arg(long, env = "CAD_FILE_PATTERN", default_value = "*.xml")]
    pub file_pattern: String,

    #[arg(long)]
    pub report_path: Option<PathBuf>,
}
