use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::watcher::{WatchConfig, Watcher};
use crate::cli::WatchArgs;
use crate::commands::ingest::connect_with_retry;

pub fn run(args: WatchArgs) -> Result<()> {
    let config = WatchConfig::from_args(&args)?;

    let connection = connect_with_retry(
        &args.db_path,
        args.db_connect_attempts,
        Duration::from_secs(args.db_retry_delay_secs),
    )?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        if !handler_flag.swap(true, Ordering::SeqCst) {
            warn!("shutdown signal received, finishing current file");
        }
    })
    .context("failed to install shutdown handler")?;

    info!(db_path = %args.db_path.display(), "watcher starting");

    let mut watcher = Watcher::new(config, connection)?;
    watcher.run_until(&shutdown);
    Ok(())
}
