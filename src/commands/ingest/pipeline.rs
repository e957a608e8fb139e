use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::{debug, info, warn};

use super::ledger;
use super::loader::{decode_source, parse_document, read_source};
use super::mapper::map_call;
use super::writer::{WriteSummary, write_call_graph};
use crate::util::{file_name_string, sha256_hex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Imported { call_row_id: i64, records: usize },
    AlreadyProcessed,
}

pub fn ingest_file(connection: &mut Connection, path: &Path) -> Result<IngestOutcome> {
    let filename = file_name_string(path)?;
    let bytes = read_source(path)?;
    ingest_bytes(connection, &filename, &bytes)
}

/// Gate on the ledger, then load, map and write in one transaction. Any
/// failure after the gate leaves a `failed` ledger entry behind.
pub fn ingest_bytes(
    connection: &mut Connection,
    filename: &str,
    bytes: &[u8],
) -> Result<IngestOutcome> {
    let content_hash = sha256_hex(bytes);

    if ledger::has_succeeded(connection, filename, &content_hash)? {
        info!(filename, content_hash = %content_hash, "already processed, skipping");
        return Ok(IngestOutcome::AlreadyProcessed);
    }

    match import(connection, filename, &content_hash, bytes) {
        Ok(summary) => {
            info!(
                filename,
                call_row_id = summary.call_row_id,
                records = summary.records,
                replaced = summary.replaced,
                "imported call export"
            );
            Ok(IngestOutcome::Imported {
                call_row_id: summary.call_row_id,
                records: summary.records,
            })
        }
        Err(err) => {
            let message = format!("{err:#}");
            if let Err(ledger_err) =
                ledger::record_failure(connection, filename, &content_hash, &message)
            {
                warn!(
                    filename,
                    error = %format!("{ledger_err:#}"),
                    "failed to record failure in ledger"
                );
            }
            Err(err)
        }
    }
}

fn import(
    connection: &mut Connection,
    filename: &str,
    content_hash: &str,
    bytes: &[u8],
) -> Result<WriteSummary> {
    let source = decode_source(bytes)?;
    debug!(filename, encoding = source.encoding.as_str(), "decoded call export");

    let document = parse_document(&source.text)?;
    let graph = map_call(&document, &source.text)
        .with_context(|| format!("failed to map {filename}"))?;

    let tx = connection.transaction()?;
    let summary = write_call_graph(&tx, &graph, filename)?;
    ledger::record_success(&tx, filename, content_hash, summary.records)?;
    tx.commit()
        .with_context(|| format!("failed to commit call {}", graph.call.call_id))?;

    Ok(summary)
}
