use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use glob::Pattern;
use rusqlite::Connection;
use tracing::{debug, error, info, warn};

use super::cache::RecentFileCache;
use super::relocate::move_into;
use super::scan::{fingerprint, list_matching_files, stable_snapshot};
use crate::cli::WatchArgs;
use crate::commands::ingest::{IngestOutcome, ingest_file};
use crate::util::ensure_directory;

const PROCESSED_DIR: &str = "processed";
const FAILED_DIR: &str = "failed";
const SHUTDOWN_SLICE: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub watch_folder: PathBuf,
    pub file_pattern: Pattern,
    pub poll_interval: Duration,
    pub stability_wait: Duration,
    pub dedup_capacity: usize,
}

impl WatchConfig {
    pub fn from_args(args: &WatchArgs) -> Result<Self> {
        let file_pattern = Pattern::new(&args.file_pattern)
            .with_context(|| format!("invalid file pattern {}", args.file_pattern))?;

        Ok(Self {
            watch_folder: args.watch_folder.clone(),
            file_pattern,
            poll_interval: Duration::from_secs(args.poll_interval_secs),
            stability_wait: Duration::from_millis(args.stability_wait_ms),
            dedup_capacity: args.dedup_capacity,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub processed: usize,
    pub already_processed: usize,
    pub failed: usize,
    pub unstable: usize,
    pub already_seen: usize,
}

pub struct Watcher {
    config: WatchConfig,
    connection: Connection,
    seen: RecentFileCache,
    processed_dir: PathBuf,
    failed_dir: PathBuf,
}

impl Watcher {
    pub fn new(config: WatchConfig, connection: Connection) -> Result<Self> {
        let processed_dir = config.watch_folder.join(PROCESSED_DIR);
        let failed_dir = config.watch_folder.join(FAILED_DIR);
        ensure_directory(&processed_dir)?;
        ensure_directory(&failed_dir)?;

        Ok(Self {
            seen: RecentFileCache::new(config.dedup_capacity),
            config,
            connection,
            processed_dir,
            failed_dir,
        })
    }

    /// Polls until `shutdown` is set. A failed scan is logged and retried on
    /// the next cycle.
    pub fn run_until(&mut self, shutdown: &AtomicBool) {
        info!(
            watch_folder = %self.config.watch_folder.display(),
            pattern = %self.config.file_pattern,
            poll_interval_secs = self.config.poll_interval.as_secs(),
            "watching for call exports"
        );

        while !shutdown.load(Ordering::SeqCst) {
            match self.poll_once() {
                Ok(summary) if summary != PollSummary::default() => {
                    info!(
                        processed = summary.processed,
                        already_processed = summary.already_processed,
                        failed = summary.failed,
                        unstable = summary.unstable,
                        already_seen = summary.already_seen,
                        tracked = self.seen.len(),
                        "poll cycle completed"
                    );
                }
                Ok(_) => {}
                Err(err) => error!(error = %format!("{err:#}"), "poll cycle failed"),
            }

            sleep_unless_shutdown(self.config.poll_interval, shutdown);
        }

        info!("shutdown requested, watcher stopped");
    }

    pub fn poll_once(&mut self) -> Result<PollSummary> {
        let mut summary = PollSummary::default();
        let candidates = list_matching_files(&self.config.watch_folder, &self.config.file_pattern)?;

        for path in candidates {
            let snapshot = match stable_snapshot(&path, self.config.stability_wait) {
                Ok(Some(snapshot)) => snapshot,
                Ok(None) => {
                    debug!(path = %path.display(), "file still changing, deferring");
                    summary.unstable += 1;
                    continue;
                }
                Err(err) => {
                    // Usually the file vanished between listing and sampling.
                    warn!(path = %path.display(), error = %format!("{err:#}"), "skipping candidate");
                    continue;
                }
            };

            if !self.seen.insert(fingerprint(&path, snapshot)) {
                debug!(path = %path.display(), "already dispatched by this process");
                summary.already_seen += 1;
                continue;
            }

            self.dispatch(&path, &mut summary);
        }

        Ok(summary)
    }

    fn dispatch(&mut self, path: &Path, summary: &mut PollSummary) {
        let destination_dir = match ingest_file(&mut self.connection, path) {
            Ok(IngestOutcome::Imported { call_row_id, records }) => {
                info!(path = %path.display(), call_row_id, records, "processed call export");
                summary.processed += 1;
                &self.processed_dir
            }
            Ok(IngestOutcome::AlreadyProcessed) => {
                info!(path = %path.display(), "call export already processed");
                summary.already_processed += 1;
                &self.processed_dir
            }
            Err(err) => {
                error!(path = %path.display(), error = %format!("{err:#}"), "call export failed");
                summary.failed += 1;
                &self.failed_dir
            }
        };

        match move_into(path, destination_dir) {
            Ok(destination) => {
                debug!(from = %path.display(), to = %destination.display(), "relocated call export");
            }
            Err(err) => {
                error!(path = %path.display(), error = %format!("{err:#}"), "failed to relocate call export");
            }
        }
    }

    #[cfg(test)]
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    #[cfg(test)]
    pub fn seen_mut(&mut self) -> &mut RecentFileCache {
        &mut self.seen
    }
}

fn sleep_unless_shutdown(interval: Duration, shutdown: &AtomicBool) {
    let deadline = Instant::now() + interval;
    loop {
        if shutdown.load(Ordering::SeqCst) {
            return;
        }
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::sleep(SHUTDOWN_SLICE.min(deadline - now));
    }
}
