use anyhow::{Result, bail};
use tracing::{error, info};

use super::db_setup::open_database;
use super::pipeline::{IngestOutcome, ingest_file};
use crate::cli::IngestArgs;

/// One-shot import of explicit files; files stay where they are.
pub fn run(args: IngestArgs) -> Result<()> {
    let mut connection = open_database(&args.db_path)?;

    info!(
        db_path = %args.db_path.display(),
        files = args.files.len(),
        "starting ingest"
    );

    let mut imported = 0_usize;
    let mut already_processed = 0_usize;
    let mut failed = 0_usize;

    for path in &args.files {
        match ingest_file(&mut connection, path) {
            Ok(IngestOutcome::Imported { .. }) => imported += 1,
            Ok(IngestOutcome::AlreadyProcessed) => already_processed += 1,
            Err(err) => {
                failed += 1;
                error!(path = %path.display(), error = %format!("{err:#}"), "ingest failed");
            }
        }
    }

    info!(imported, already_processed, failed, "ingest completed");

    if failed > 0 {
        bail!("{failed} of {} files failed to ingest", args.files.len());
    }

    Ok(())
}
