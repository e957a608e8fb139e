pub mod ingest;
pub mod status;
pub mod versions;
pub mod watch;
