//! Processed-file ledger keyed by `(filename, content_hash)`.

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::model::{LedgerStatus, ProcessedFile};
use crate::util::now_utc_string;

const SELECT_COLUMNS: &str =
    "filename, content_hash, status, records_processed, error_message, processed_at";

pub fn find_entry(
    connection: &Connection,
    filename: &str,
    content_hash: &str,
) -> Result<Option<ProcessedFile>> {
    let sql = format!(
        "SELECT {SELECT_COLUMNS} FROM processed_files WHERE filename = ?1 AND content_hash = ?2"
    );
    connection
        .query_row(&sql, params![filename, content_hash], processed_file_from_row)
        .optional()
        .with_context(|| format!("failed to query ledger for {filename}"))
}

/// Only a successful entry makes a later delivery of the same bytes a no-op.
pub fn has_succeeded(connection: &Connection, filename: &str, content_hash: &str) -> Result<bool> {
    Ok(find_entry(connection, filename, content_hash)?
        .is_some_and(|entry| entry.status == LedgerStatus::Success))
}

pub fn record_success(
    connection: &Connection,
    filename: &str,
    content_hash: &str,
    records_processed: usize,
) -> Result<()> {
    record_outcome(
        connection,
        filename,
        content_hash,
        LedgerStatus::Success,
        Some(records_processed as i64),
        None,
    )
}

pub fn record_failure(
    connection: &Connection,
    filename: &str,
    content_hash: &str,
    error_message: &str,
) -> Result<()> {
    record_outcome(
        connection,
        filename,
        content_hash,
        LedgerStatus::Failed,
        None,
        Some(error_message),
    )
}

fn record_outcome(
    connection: &Connection,
    filename: &str,
    content_hash: &str,
    status: LedgerStatus,
    records_processed: Option<i64>,
    error_message: Option<&str>,
) -> Result<()> {
    connection
        .execute(
            "
            INSERT INTO processed_files(
              filename, content_hash, status, records_processed, error_message, processed_at
            )
            VALUES(?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(filename, content_hash) DO UPDATE SET
              status=excluded.status,
              records_processed=excluded.records_processed,
              error_message=excluded.error_message,
              processed_at=excluded.processed_at
            ",
            params![
                filename,
                content_hash,
                status.as_str(),
                records_processed,
                error_message,
                now_utc_string(),
            ],
        )
        .with_context(|| format!("failed to record {} for {filename}", status.as_str()))?;

    Ok(())
}

pub fn count_by_status(connection: &Connection, status: LedgerStatus) -> Result<i64> {
    connection
        .query_row(
            "SELECT COUNT(*) FROM processed_files WHERE status = ?1",
            [status.as_str()],
            |row| row.get(0),
        )
        .with_context(|| format!("failed to count {} ledger entries", status.as_str()))
}

pub fn recent_failures(connection: &Connection, limit: usize) -> Result<Vec<ProcessedFile>> {
    let sql = format!(
        "SELECT {SELECT_COLUMNS} FROM processed_files
         WHERE status = 'failed'
         ORDER BY processed_at DESC, id DESC
         LIMIT ?1"
    );
    let mut statement = connection.prepare(&sql)?;
    let rows = statement.query_map([limit as i64], processed_file_from_row)?;

    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?);
    }
    Ok(entries)
}

fn processed_file_from_row(row: &Row<'_>) -> rusqlite::Result<ProcessedFile> {
    let status: String = row.get(2)?;
    let status = LedgerStatus::parse(&status).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("unknown ledger status {status}").into(),
        )
    })?;

    Ok(ProcessedFile {
        filename: row.get(0)?,
        content_hash: row.get(1)?,
        status,
        records_processed: row.get(3)?,
        error_message: row.get(4)?,
        processed_at: row.get(5)?,
    })
}
