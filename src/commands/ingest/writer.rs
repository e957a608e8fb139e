use anyhow::{Context, Result};
use rusqlite::{OptionalExtension, Transaction, params};
use tracing::debug;

use crate::model::{CallGraph, CallRecord, DispositionRecord, UnitRecord};
use crate::util::now_utc_string;

/// Leaf tables first; foreign keys reject any other order.
const UNIT_CHILD_TABLES: [&str; 3] = ["unit_personnel", "unit_logs", "unit_dispositions"];
const CALL_CHILD_TABLES: [&str; 8] = [
    "units",
    "agency_contexts",
    "locations",
    "incidents",
    "narratives",
    "persons",
    "vehicles",
    "call_dispositions",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteSummary {
    pub call_row_id: i64,
    pub records: usize,
    pub replaced: bool,
}

/// Replaces the stored graph for `graph.call.call_id`. Nothing is committed
/// here; the caller owns the transaction.
pub fn write_call_graph(
    tx: &Transaction<'_>,
    graph: &CallGraph,
    source_filename: &str,
) -> Result<WriteSummary> {
    let call_id = &graph.call.call_id;
    let existing = tx
        .query_row(
            "SELECT id FROM calls WHERE call_id = ?1",
            [call_id],
            |row| row.get::<_, i64>(0),
        )
        .optional()
        .with_context(|| format!("failed to look up call {call_id}"))?;

    let call_row_id = match existing {
        Some(call_row_id) => {
            update_call(tx, call_row_id, &graph.call, source_filename)?;
            let deleted = delete_children(tx, call_row_id)?;
            debug!(call_id = %call_id, call_row_id, deleted, "cleared previous call children");
            call_row_id
        }
        None => insert_call(tx, &graph.call, source_filename)?,
    };

    insert_children(tx, call_row_id, graph)
        .with_context(|| format!("failed to insert children for call {call_id}"))?;

    Ok(WriteSummary {
        call_row_id,
        records: graph.record_count(),
        replaced: existing.is_some(),
    })
}

fn insert_call(tx: &Transaction<'_>, call: &CallRecord, source_filename: &str) -> Result<i64> {
    let now = now_utc_string();
    tx.execute(
        "
        INSERT INTO calls(
          call_id, call_number, call_source, caller_name, caller_phone, nature_of_call,
          create_datetime, close_datetime, created_by, is_closed, is_canceled, alarm_level,
          emd_code, raw_xml, raw_json, source_filename, created_at, updated_at
        )
        VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?17)
        ",
        params![
            call.call_id,
            call.call_number,
            call.call_source,
            call.caller_name,
            call.caller_phone,
            call.nature_of_call,
            call.create_datetime,
            call.close_datetime,
            call.created_by,
            call.is_closed,
            call.is_canceled,
            call.alarm_level,
            call.emd_code,
            call.raw_xml,
            call.raw_json,
            source_filename,
            now,
        ],
    )
    .with_context(|| format!("failed to insert call {}", call.call_id))?;

    Ok(tx.last_insert_rowid())
}

fn update_call(
    tx: &Transaction<'_>,
    call_row_id: i64,
    call: &CallRecord,
    source_filename: &str,
) -> Result<()> {
    tx.execute(
        "
        UPDATE calls SET
          call_number=?2,
          call_source=?3,
          caller_name=?4,
          caller_phone=?5,
          nature_of_call=?6,
          create_datetime=?7,
          close_datetime=?8,
          created_by=?9,
          is_closed=?10,
          is_canceled=?11,
          alarm_level=?12,
          emd_code=?13,
          raw_xml=?14,
          raw_json=?15,
          source_filename=?16,
          updated_at=?17
        WHERE id=?1
        ",
        params![
            call_row_id,
            call.call_number,
            call.call_source,
            call.caller_name,
            call.caller_phone,
            call.nature_of_call,
            call.create_datetime,
            call.close_datetime,
            call.created_by,
            call.is_closed,
            call.is_canceled,
            call.alarm_level,
            call.emd_code,
            call.raw_xml,
            call.raw_json,
            source_filename,
            now_utc_string(),
        ],
    )
    .with_context(|| format!("failed to update call {}", call.call_id))?;

    Ok(())
}

fn delete_children(tx: &Transaction<'_>, call_row_id: i64) -> Result<usize> {
    let mut deleted = 0;

    for table in UNIT_CHILD_TABLES {
        let sql = format!(
            "DELETE FROM {table} WHERE unit_row_id IN (SELECT id FROM units WHERE call_row_id = ?1)"
        );
        deleted += tx
            .execute(&sql, [call_row_id])
            .with_context(|| format!("failed to clear {table}"))?;
    }

    for table in CALL_CHILD_TABLES {
        let sql = format!("DELETE FROM {table} WHERE call_row_id = ?1");
        deleted += tx
            .execute(&sql, [call_row_id])
            .with_context(|| format!("failed to clear {table}"))?;
    }

    Ok(deleted)
}

fn insert_children(tx: &Transaction<'_>, call_row_id: i64, graph: &CallGraph) -> Result<()> {
    {
        let mut statement = tx.prepare_cached(
            "
            INSERT INTO agency_contexts(
              call_row_id, seq, agency_type, call_type, priority, status, dispatcher,
              created_datetime, closed_datetime
            )
            VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ",
        )?;
        for (seq, context) in graph.agency_contexts.iter().enumerate() {
            statement
                .execute(params![
                    call_row_id,
                    seq as i64,
                    context.agency_type,
                    context.call_type,
                    context.priority,
                    context.status,
                    context.dispatcher,
                    context.created_datetime,
                    context.closed_datetime,
                ])
                .context("failed to insert agency context")?;
        }
    }

    if let Some(location) = &graph.location {
        tx.execute(
            "
            INSERT INTO locations(
              call_row_id, full_address, house_number, street_name, city, state, postal_code,
              common_name, cross_street, latitude, longitude, police_beat, fire_zone, ems_district
            )
            VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            ",
            params![
                call_row_id,
                location.full_address,
                location.house_number,
                location.street_name,
                location.city,
                location.state,
                location.postal_code,
                location.common_name,
                location.cross_street,
                location.latitude,
                location.longitude,
                location.police_beat,
                location.fire_zone,
                location.ems_district,
            ],
        )
        .context("failed to insert location")?;
    }

    {
        let mut statement = tx.prepare_cached(
            "
            INSERT INTO incidents(
              call_row_id, seq, incident_number, case_number, jurisdiction, agency_type,
              incident_type, create_datetime
            )
            VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
        )?;
        for (seq, incident) in graph.incidents.iter().enumerate() {
            statement
                .execute(params![
                    call_row_id,
                    seq as i64,
                    incident.incident_number,
                    incident.case_number,
                    incident.jurisdiction,
                    incident.agency_type,
                    incident.incident_type,
                    incident.create_datetime,
                ])
                .context("failed to insert incident")?;
        }
    }

    for (seq, unit) in graph.units.iter().enumerate() {
        insert_unit(tx, call_row_id, seq, unit)?;
    }

    {
        let mut statement = tx.prepare_cached(
            "
            INSERT INTO narratives(call_row_id, seq, narrative_type, text, entered_by, entered_datetime)
            VALUES(?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )?;
        for (seq, narrative) in graph.narratives.iter().enumerate() {
            statement
                .execute(params![
                    call_row_id,
                    seq as i64,
                    narrative.narrative_type,
                    narrative.text,
                    narrative.entered_by,
                    narrative.entered_datetime,
                ])
                .context("failed to insert narrative")?;
        }
    }

    {
        let mut statement = tx.prepare_cached(
            "
            INSERT INTO persons(
              call_row_id, seq, role, first_name, middle_name, last_name, date_of_birth,
              race, sex, phone, address
            )
            VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ",
        )?;
        for (seq, person) in graph.persons.iter().enumerate() {
            statement
                .execute(params![
                    call_row_id,
                    seq as i64,
                    person.role,
                    person.first_name,
                    person.middle_name,
                    person.last_name,
                    person.date_of_birth,
                    person.race,
                    person.sex,
                    person.phone,
                    person.address,
                ])
                .context("failed to insert person")?;
        }
    }

    {
        let mut statement = tx.prepare_cached(
            "
            INSERT INTO vehicles(
              call_row_id, seq, role, make, model, year, color, license_plate, license_state, vin
            )
            VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ",
        )?;
        for (seq, vehicle) in graph.vehicles.iter().enumerate() {
            statement
                .execute(params![
                    call_row_id,
                    seq as i64,
                    vehicle.role,
                    vehicle.make,
                    vehicle.model,
                    vehicle.year,
                    vehicle.color,
                    vehicle.license_plate,
                    vehicle.license_state,
                    vehicle.vin,
                ])
                .context("failed to insert vehicle")?;
        }
    }

    insert_dispositions(tx, "call_dispositions", "call_row_id", call_row_id, &graph.dispositions)?;

    Ok(())
}

fn insert_unit(tx: &Transaction<'_>, call_row_id: i64, seq: usize, unit: &UnitRecord) -> Result<()> {
    tx.prepare_cached(
        "
        INSERT INTO units(
          call_row_id, seq, unit_number, unit_type, agency_type, jurisdiction, is_primary,
          assigned_datetime, dispatch_datetime, enroute_datetime, arrive_datetime,
          staged_datetime, at_patient_datetime, transport_datetime, at_hospital_datetime,
          depart_hospital_datetime, clear_datetime, transport_mileage
        )
        VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
        ",
    )?
    .execute(params![
        call_row_id,
        seq as i64,
        unit.unit_number,
        unit.unit_type,
        unit.agency_type,
        unit.jurisdiction,
        unit.is_primary,
        unit.assigned_datetime,
        unit.dispatch_datetime,
        unit.enroute_datetime,
        unit.arrive_datetime,
        unit.staged_datetime,
        unit.at_patient_datetime,
        unit.transport_datetime,
        unit.at_hospital_datetime,
        unit.depart_hospital_datetime,
        unit.clear_datetime,
        unit.transport_mileage,
    ])
    .with_context(|| {
        format!(
            "failed to insert unit {}",
            unit.unit_number.as_deref().unwrap_or("<unnamed>")
        )
    })?;
    let unit_row_id = tx.last_insert_rowid();

    {
        let mut statement = tx.prepare_cached(
            "
            INSERT INTO unit_personnel(
              unit_row_id, seq, employee_id, first_name, last_name, rank, is_primary_officer
            )
            VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )?;
        for (person_seq, person) in unit.personnel.iter().enumerate() {
            statement
                .execute(params![
                    unit_row_id,
                    person_seq as i64,
                    person.employee_id,
                    person.first_name,
                    person.last_name,
                    person.rank,
                    person.is_primary_officer,
                ])
                .context("failed to insert unit personnel")?;
        }
    }

    {
        let mut statement = tx.prepare_cached(
            "
            INSERT INTO unit_logs(unit_row_id, seq, log_datetime, status, location, comment)
            VALUES(?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )?;
        for (log_seq, log) in unit.logs.iter().enumerate() {
            statement
                .execute(params![
                    unit_row_id,
                    log_seq as i64,
                    log.log_datetime,
                    log.status,
                    log.location,
                    log.comment,
                ])
                .context("failed to insert unit log")?;
        }
    }

    insert_dispositions(tx, "unit_dispositions", "unit_row_id", unit_row_id, &unit.dispositions)
}

fn insert_dispositions(
    tx: &Transaction<'_>,
    table_name: &str,
    owner_column: &str,
    owner_row_id: i64,
    dispositions: &[DispositionRecord],
) -> Result<()> {
    let sql = format!(
        "INSERT INTO {table_name}({owner_column}, seq, code, description, count, disposition_datetime)
         VALUES(?1, ?2, ?3, ?4, ?5, ?6)"
    );
    let mut statement = tx.prepare_cached(&sql)?;

    for (seq, disposition) in dispositions.iter().enumerate() {
        statement
            .execute(params![
                owner_row_id,
                seq as i64,
                disposition.code,
                disposition.description,
                disposition.count,
                disposition.disposition_datetime,
            ])
            .with_context(|| format!("failed to insert into {table_name}"))?;
    }

    Ok(())
}
