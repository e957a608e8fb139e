mod coerce;
mod db_setup;
mod ledger;
mod loader;
mod mapper;
mod pipeline;
mod run;
mod writer;

pub use run::run;

pub use db_setup::{CALL_TABLES, connect_with_retry, count_rows, open_database};
pub use ledger::{count_by_status, recent_failures};
pub use pipeline::{IngestOutcome, ingest_file};
