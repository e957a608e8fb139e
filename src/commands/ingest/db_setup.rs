use std::path::Path;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use rusqlite::Connection;
use tracing::{info, warn};

use crate::util::now_utc_string;

pub const DB_SCHEMA_VERSION: &str = "1.0.0";

/// Opens the store, applies pragmas and schema, and probes it with a query.
pub fn open_database(db_path: &Path) -> Result<Connection> {
    let connection = Connection::open(db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;
    prepare_connection(&connection)?;
    Ok(connection)
}

pub fn prepare_connection(connection: &Connection) -> Result<()> {
    configure_connection(connection)?;
    probe_connection(connection)?;
    ensure_schema(connection)?;
    Ok(())
}

/// Startup gate for the watcher: the only place an unreachable database is
/// retried instead of reported per file.
pub fn connect_with_retry(db_path: &Path, attempts: u32, delay: Duration) -> Result<Connection> {
    let attempts = attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        match open_database(db_path) {
            Ok(connection) => {
                info!(path = %db_path.display(), attempt, "database reachable");
                return Ok(connection);
            }
            Err(err) => {
                warn!(
                    path = %db_path.display(),
                    attempt,
                    attempts,
                    error = %format!("{err:#}"),
                    "database unreachable"
                );
                last_error = Some(err);
                if attempt < attempts {
                    thread::sleep(delay);
                }
            }
        }
    }

    let err = last_error.unwrap_or_else(|| anyhow!("no connection attempt was made"));
    Err(err.context(format!(
        "database {} unreachable after {attempts} attempts",
        db_path.display()
    )))
}

fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    connection
        .pragma_update(None, "foreign_keys", true)
        .context("failed to enable foreign_keys")?;
    Ok(())
}

fn probe_connection(connection: &Connection) -> Result<()> {
    let probe: i64 = connection
        .query_row("SELECT 1", [], |row| row.get(0))
        .context("database probe query failed")?;
    if probe != 1 {
        return Err(anyhow!("database probe returned {probe}"));
    }
    Ok(())
}

// Child tables reference their parent without ON DELETE CASCADE; the writer
// deletes leaf tables first and foreign_keys=ON rejects any other order.
fn ensure_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(
            "
        CREATE TABLE IF NOT EXISTS metadata (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS calls (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          call_id TEXT NOT NULL UNIQUE,
          call_number TEXT,
          call_source TEXT,
          caller_name TEXT,
          caller_phone TEXT,
          nature_of_call TEXT,
          create_datetime TEXT,
          close_datetime TEXT,
          created_by TEXT,
          is_closed INTEGER NOT NULL DEFAULT 0,
          is_canceled INTEGER NOT NULL DEFAULT 0,
          alarm_level INTEGER,
          emd_code TEXT,
          raw_xml TEXT NOT NULL,
          raw_json TEXT NOT NULL,
          source_filename TEXT,
          created_at TEXT NOT NULL,
          updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS agency_contexts (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          call_row_id INTEGER NOT NULL,
          seq INTEGER NOT NULL,
          agency_type TEXT,
          call_type TEXT,
          priority TEXT,
          status TEXT,
          dispatcher TEXT,
          created_datetime TEXT,
          closed_datetime TEXT,
          FOREIGN KEY(call_row_id) REFERENCES calls(id)
        );

        CREATE TABLE IF NOT EXISTS locations (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          call_row_id INTEGER NOT NULL,
          full_address TEXT,
          house_number TEXT,
          street_name TEXT,
          city TEXT,
          state TEXT,
          postal_code TEXT,
          common_name TEXT,
          cross_street TEXT,
          latitude REAL,
          longitude REAL,
          police_beat TEXT,
          fire_zone TEXT,
          ems_district TEXT,
          FOREIGN KEY(call_row_id) REFERENCES calls(id)
        );

        CREATE TABLE IF NOT EXISTS incidents (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          call_row_id INTEGER NOT NULL,
          seq INTEGER NOT NULL,
          incident_number TEXT,
          case_number TEXT,
          jurisdiction TEXT,
          agency_type TEXT,
          incident_type TEXT,
          create_datetime TEXT,
          FOREIGN KEY(call_row_id) REFERENCES calls(id)
        );

        CREATE TABLE IF NOT EXISTS units (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          call_row_id INTEGER NOT NULL,
          seq INTEGER NOT NULL,
          unit_number TEXT,
          unit_type TEXT,
          agency_type TEXT,
          jurisdiction TEXT,
          is_primary INTEGER NOT NULL DEFAULT 0,
          assigned_datetime TEXT,
          dispatch_datetime TEXT,
          enroute_datetime TEXT,
          arrive_datetime TEXT,
          staged_datetime TEXT,
          at_patient_datetime TEXT,
          transport_datetime TEXT,
          at_hospital_datetime TEXT,
          depart_hospital_datetime TEXT,
          clear_datetime TEXT,
          transport_mileage REAL,
          FOREIGN KEY(call_row_id) REFERENCES calls(id)
        );

        CREATE TABLE IF NOT EXISTS unit_personnel (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          unit_row_id INTEGER NOT NULL,
          seq INTEGER NOT NULL,
          employee_id TEXT,
          first_name TEXT,
          last_name TEXT,
          rank TEXT,
          is_primary_officer INTEGER NOT NULL DEFAULT 0,
          FOREIGN KEY(unit_row_id) REFERENCES units(id)
        );

        CREATE TABLE IF NOT EXISTS unit_logs (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          unit_row_id INTEGER NOT NULL,
          seq INTEGER NOT NULL,
          log_datetime TEXT,
          status TEXT,
          location TEXT,
          comment TEXT,
          FOREIGN KEY(unit_row_id) REFERENCES units(id)
        );

        CREATE TABLE IF NOT EXISTS unit_dispositions (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          unit_row_id INTEGER NOT NULL,
          seq INTEGER NOT NULL,
          code TEXT,
          description TEXT,
          count INTEGER,
          disposition_datetime TEXT,
          FOREIGN KEY(unit_row_id) REFERENCES units(id)
        );

        CREATE TABLE IF NOT EXISTS narratives (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          call_row_id INTEGER NOT NULL,
          seq INTEGER NOT NULL,
          narrative_type TEXT,
          text TEXT,
          entered_by TEXT,
          entered_datetime TEXT,
          FOREIGN KEY(call_row_id) REFERENCES calls(id)
        );

        CREATE TABLE IF NOT EXISTS persons (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          call_row_id INTEGER NOT NULL,
          seq INTEGER NOT NULL,
          role TEXT,
          first_name TEXT,
          middle_name TEXT,
          last_name TEXT,
          date_of_birth TEXT,
          race TEXT,
          sex TEXT,
          phone TEXT,
          address TEXT,
          FOREIGN KEY(call_row_id) REFERENCES calls(id)
        );

        CREATE TABLE IF NOT EXISTS vehicles (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          call_row_id INTEGER NOT NULL,
          seq INTEGER NOT NULL,
          role TEXT,
          make TEXT,
          model TEXT,
          year INTEGER,
          color TEXT,
          license_plate TEXT,
          license_state TEXT,
          vin TEXT,
          FOREIGN KEY(call_row_id) REFERENCES calls(id)
        );

        CREATE TABLE IF NOT EXISTS call_dispositions (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          call_row_id INTEGER NOT NULL,
          seq INTEGER NOT NULL,
          code TEXT,
          description TEXT,
          count INTEGER,
          disposition_datetime TEXT,
          FOREIGN KEY(call_row_id) REFERENCES calls(id)
        );

        CREATE TABLE IF NOT EXISTS processed_files (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          filename TEXT NOT NULL,
          content_hash TEXT NOT NULL,
          status TEXT NOT NULL CHECK (status IN ('success', 'failed')),
          records_processed INTEGER,
          error_message TEXT,
          processed_at TEXT NOT NULL,
          UNIQUE(filename, content_hash)
        );
        ",
        )
        .context("failed to create call tables")?;

    connection
        .execute_batch(
            "
        CREATE INDEX IF NOT EXISTS idx_agency_contexts_call ON agency_contexts(call_row_id);
        CREATE INDEX IF NOT EXISTS idx_locations_call ON locations(call_row_id);
        CREATE INDEX IF NOT EXISTS idx_incidents_call ON incidents(call_row_id);
        CREATE INDEX IF NOT EXISTS idx_units_call ON units(call_row_id);
        CREATE INDEX IF NOT EXISTS idx_unit_personnel_unit ON unit_personnel(unit_row_id);
        CREATE INDEX IF NOT EXISTS idx_unit_logs_unit ON unit_logs(unit_row_id);
        CREATE INDEX IF NOT EXISTS idx_unit_dispositions_unit ON unit_dispositions(unit_row_id);
        CREATE INDEX IF NOT EXISTS idx_narratives_call ON narratives(call_row_id);
        CREATE INDEX IF NOT EXISTS idx_persons_call ON persons(call_row_id);
        CREATE INDEX IF NOT EXISTS idx_vehicles_call ON vehicles(call_row_id);
        CREATE INDEX IF NOT EXISTS idx_call_dispositions_call ON call_dispositions(call_row_id);
        CREATE INDEX IF NOT EXISTS idx_processed_files_status ON processed_files(status, processed_at);
        ",
        )
        .context("failed to create call table indexes")?;

    let now = now_utc_string();
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [DB_SCHEMA_VERSION],
    )?;
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_opened_at', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [now],
    )?;

    Ok(())
}

pub fn count_rows(connection: &Connection, table_name: &str) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {table_name}");
    connection
        .query_row(&sql, [], |row| row.get(0))
        .with_context(|| format!("failed to count rows in {table_name}"))
}

/// Tables in the order the status command reports them.
pub const CALL_TABLES: [&str; 12] = [
    "calls",
    "agency_contexts",
    "locations",
    "incidents",
    "units",
    "unit_personnel",
    "unit_logs",
    "unit_dispositions",
    "narratives",
    "persons",
    "vehicles",
    "call_dispositions",
];
