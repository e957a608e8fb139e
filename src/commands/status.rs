use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::commands::ingest::{CALL_TABLES, count_by_status, count_rows, recent_failures};
use crate::model::LedgerStatus;

pub fn run(args: StatusArgs) -> Result<()> {
    info!(db_path = %args.db_path.display(), "status requested");

    if !args.db_path.exists() {
        warn!(path = %args.db_path.display(), "database file missing");
        return Ok(());
    }

    let conn = Connection::open_with_flags(&args.db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .with_context(|| format!("failed to open {}", args.db_path.display()))?;

    let schema_version = conn
        .query_row(
            "SELECT value FROM metadata WHERE key = 'db_schema_version'",
            [],
            |row| row.get::<_, String>(0),
        )
        .unwrap_or_default();

    info!(
        path = %args.db_path.display(),
        schema_version = %schema_version,
        succeeded = count_by_status(&conn, LedgerStatus::Success).unwrap_or(0),
        failed = count_by_status(&conn, LedgerStatus::Failed).unwrap_or(0),
        "ledger status"
    );

    for table in CALL_TABLES {
        info!(table, rows = count_rows(&conn, table).unwrap_or(0), "table rows");
    }

    if args.recent_failures > 0 {
        for entry in recent_failures(&conn, args.recent_failures)? {
            warn!(
                filename = %entry.filename,
                content_hash = %entry.content_hash,
                processed_at = %entry.processed_at,
                error = %entry.error_message.unwrap_or_default(),
                "recent failure"
            );
        }
    }

    Ok(())
}
