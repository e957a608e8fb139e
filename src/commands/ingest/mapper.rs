use anyhow::{Result, bail};
use chrono::NaiveDateTime;
use roxmltree::{Document, Node};
use serde_json::{Map, Value};
use tracing::warn;

use super::coerce::{boolean, datetime_or_null, decimal_or_null, integer_or_null, string_or_null};
use super::loader::MAX_ELEMENT_DEPTH;
use crate::model::{
    AgencyContextRecord, CallGraph, CallRecord, DispositionRecord, IncidentRecord, LocationRecord,
    NarrativeRecord, PersonRecord, UnitLogRecord, UnitPersonnelRecord, UnitRecord, VehicleRecord,
};

pub const CALL_EXPORT_NAMESPACE: &str = "urn:cad:call-export:v1";
pub const CALL_EXPORT_ROOT: &str = "CallExport";

/// Builds the typed call graph. `raw_xml` is the decoded source text kept
/// on the call row for audit.
pub fn map_call(document: &Document<'_>, raw_xml: &str) -> Result<CallGraph> {
    let root = document.root_element();
    let root_name = root.tag_name();

    if root_name.name() != CALL_EXPORT_ROOT {
        bail!(
            "unexpected root element <{}>, expected <{CALL_EXPORT_ROOT}>",
            root_name.name()
        );
    }
    if let Some(namespace) = root_name
        .namespace()
        .filter(|namespace| *namespace != CALL_EXPORT_NAMESPACE)
    {
        bail!("unexpected document namespace {namespace}");
    }

    let fields = Fields(root);
    // Business key; surrounding whitespace is not significant.
    let Some(call_id) = fields.string("CallId").map(|id| id.trim().to_string()) else {
        bail!("call export has no CallId");
    };

    let raw_json = serde_json::to_string(&element_snapshot(root, 0)?)?;

    let call = CallRecord {
        call_id,
        call_number: fields.string("CallNumber"),
        call_source: fields.string("CallSource"),
        caller_name: fields.string("CallerName"),
        caller_phone: fields.string("CallerPhone"),
        nature_of_call: fields.string("NatureOfCall"),
        create_datetime: fields.datetime("CreateDateTime"),
        close_datetime: fields.datetime("CloseDateTime"),
        created_by: fields.string("CreatedBy"),
        is_closed: fields.boolean("IsClosed"),
        is_canceled: fields.boolean("IsCanceled"),
        alarm_level: fields.integer("AlarmLevel"),
        emd_code: fields.string("EmdCode"),
        raw_xml: raw_xml.to_string(),
        raw_json,
    };

    Ok(CallGraph {
        call,
        agency_contexts: fields
            .group("AgencyContexts", "AgencyContext")
            .into_iter()
            .map(map_agency_context)
            .collect(),
        location: fields.child("Location").map(map_location),
        incidents: fields
            .group("Incidents", "Incident")
            .into_iter()
            .map(map_incident)
            .collect(),
        units: fields
            .group("AssignedUnits", "Unit")
            .into_iter()
            .map(map_unit)
            .collect(),
        narratives: fields
            .group("Narratives", "Narrative")
            .into_iter()
            .map(map_narrative)
            .collect(),
        persons: fields
            .group("Persons", "Person")
            .into_iter()
            .map(map_person)
            .collect(),
        vehicles: fields
            .group("Vehicles", "Vehicle")
            .into_iter()
            .map(map_vehicle)
            .collect(),
        dispositions: fields
            .group("Dispositions", "Disposition")
            .into_iter()
            .map(map_disposition)
            .collect(),
    })
}

fn map_agency_context(node: Node<'_, '_>) -> AgencyContextRecord {
    let fields = Fields(node);
    AgencyContextRecord {
        agency_type: fields.string("AgencyType"),
        call_type: fields.string("CallType"),
        priority: fields.string("Priority"),
        status: fields.string("Status"),
        dispatcher: fields.string("Dispatcher"),
        created_datetime: fields.datetime("CreatedDateTime"),
        closed_datetime: fields.datetime("ClosedDateTime"),
    }
}

fn map_location(node: Node<'_, '_>) -> LocationRecord {
    let fields = Fields(node);
    LocationRecord {
        full_address: fields.string("FullAddress"),
        house_number: fields.string("HouseNumber"),
        street_name: fields.string("StreetName"),
        city: fields.string("City"),
        state: fields.string("State"),
        postal_code: fields.string("PostalCode"),
        common_name: fields.string("CommonName"),
        cross_street: fields.string("CrossStreet"),
        latitude: fields.decimal("Latitude"),
        longitude: fields.decimal("Longitude"),
        police_beat: fields.string("PoliceBeat"),
        fire_zone: fields.string("FireZone"),
        ems_district: fields.string("EmsDistrict"),
    }
}

fn map_incident(node: Node<'_, '_>) -> IncidentRecord {
    let fields = Fields(node);
    IncidentRecord {
        incident_number: fields.string("IncidentNumber"),
        case_number: fields.string("CaseNumber"),
        jurisdiction: fields.string("Jurisdiction"),
        agency_type: fields.string("AgencyType"),
        incident_type: fields.string("IncidentType"),
        create_datetime: fields.datetime("CreateDateTime"),
    }
}

fn map_unit(node: Node<'_, '_>) -> UnitRecord {
    let fields = Fields(node);
    UnitRecord {
        unit_number: fields.string("UnitNumber"),
        unit_type: fields.string("UnitType"),
        agency_type: fields.string("AgencyType"),
        jurisdiction: fields.string("Jurisdiction"),
        is_primary: fields.boolean("IsPrimary"),
        assigned_datetime: fields.datetime("AssignedDateTime"),
        dispatch_datetime: fields.datetime("DispatchDateTime"),
        enroute_datetime: fields.datetime("EnrouteDateTime"),
        arrive_datetime: fields.datetime("ArriveDateTime"),
        staged_datetime: fields.datetime("StagedDateTime"),
        at_patient_datetime: fields.datetime("AtPatientDateTime"),
        transport_datetime: fields.datetime("TransportDateTime"),
        at_hospital_datetime: fields.datetime("AtHospitalDateTime"),
        depart_hospital_datetime: fields.datetime("DepartHospitalDateTime"),
        clear_datetime: fields.datetime("ClearDateTime"),
        transport_mileage: fields.decimal("TransportMileage"),
        personnel: fields
            .group("Personnel", "Person")
            .into_iter()
            .map(map_unit_personnel)
            .collect(),
        logs: fields
            .group("UnitLogs", "Log")
            .into_iter()
            .map(map_unit_log)
            .collect(),
        dispositions: fields
            .group("Dispositions", "Disposition")
            .into_iter()
            .map(map_disposition)
            .collect(),
    }
}

fn map_unit_personnel(node: Node<'_, '_>) -> UnitPersonnelRecord {
    let fields = Fields(node);
    UnitPersonnelRecord {
        employee_id: fields.string("EmployeeId"),
        first_name: fields.string("FirstName"),
        last_name: fields.string("LastName"),
        rank: fields.string("Rank"),
        is_primary_officer: fields.boolean("IsPrimaryOfficer"),
    }
}

fn map_unit_log(node: Node<'_, '_>) -> UnitLogRecord {
    let fields = Fields(node);
    UnitLogRecord {
        log_datetime: fields.datetime("LogDateTime"),
        status: fields.string("Status"),
        location: fields.string("Location"),
        comment: fields.string("Comment"),
    }
}

fn map_disposition(node: Node<'_, '_>) -> DispositionRecord {
    let fields = Fields(node);
    DispositionRecord {
        code: fields.string("Code"),
        description: fields.string("Description"),
        count: fields.integer("Count"),
        disposition_datetime: fields.datetime("DispositionDateTime"),
    }
}

fn map_narrative(node: Node<'_, '_>) -> NarrativeRecord {
    let fields = Fields(node);
    NarrativeRecord {
        narrative_type: fields.string("NarrativeType"),
        text: fields.string("Text"),
        entered_by: fields.string("EnteredBy"),
        entered_datetime: fields.datetime("EnteredDateTime"),
    }
}

fn map_person(node: Node<'_, '_>) -> PersonRecord {
    let fields = Fields(node);
    PersonRecord {
        role: fields.string("Role"),
        first_name: fields.string("FirstName"),
        middle_name: fields.string("MiddleName"),
        last_name: fields.string("LastName"),
        date_of_birth: fields.datetime("DateOfBirth"),
        race: fields.string("Race"),
        sex: fields.string("Sex"),
        phone: fields.string("Phone"),
        address: fields.string("Address"),
    }
}

fn map_vehicle(node: Node<'_, '_>) -> VehicleRecord {
    let fields = Fields(node);
    VehicleRecord {
        role: fields.string("Role"),
        make: fields.string("Make"),
        model: fields.string("Model"),
        year: fields.integer("Year"),
        color: fields.string("Color"),
        license_plate: fields.string("LicensePlate"),
        license_state: fields.string("LicenseState"),
        vin: fields.string("Vin"),
    }
}

/// Typed accessors over the direct children of one element.
#[derive(Clone, Copy)]
struct Fields<'a, 'input>(Node<'a, 'input>);

impl<'a, 'input> Fields<'a, 'input> {
    fn child(&self, name: &str) -> Option<Node<'a, 'input>> {
        self.0
            .children()
            .find(|child| child.is_element() && child.tag_name().name() == name)
    }

    /// Items of a repeating group, e.g. `<Incidents><Incident/>...</Incidents>`.
    fn group(&self, container: &str, item: &str) -> Vec<Node<'a, 'input>> {
        self.child(container)
            .map(|group| {
                group
                    .children()
                    .filter(|child| child.is_element() && child.tag_name().name() == item)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn text(&self, name: &str) -> Option<String> {
        self.child(name).map(element_text)
    }

    fn is_nil(&self, name: &str) -> bool {
        self.child(name).is_some_and(is_nil_element)
    }

    fn string(&self, name: &str) -> Option<String> {
        string_or_null(self.text(name).as_deref())
    }

    fn boolean(&self, name: &str) -> bool {
        boolean(self.text(name).as_deref())
    }

    fn integer(&self, name: &str) -> Option<i64> {
        if self.is_nil(name) {
            return None;
        }
        integer_or_null(self.text(name).as_deref()).unwrap_or_else(|value| {
            warn!(field = name, value = %value, "discarding non-integer value");
            None
        })
    }

    fn decimal(&self, name: &str) -> Option<f64> {
        if self.is_nil(name) {
            return None;
        }
        decimal_or_null(self.text(name).as_deref()).unwrap_or_else(|value| {
            warn!(field = name, value = %value, "discarding non-decimal value");
            None
        })
    }

    fn datetime(&self, name: &str) -> Option<NaiveDateTime> {
        if self.is_nil(name) {
            return None;
        }
        datetime_or_null(self.text(name).as_deref())
    }
}

fn element_text(node: Node<'_, '_>) -> String {
    node.descendants()
        .filter(|descendant| descendant.is_text())
        .filter_map(|descendant| descendant.text())
        .collect()
}

fn is_nil_element(node: Node<'_, '_>) -> bool {
    node.attributes()
        .any(|attribute| attribute.name() == "nil" && attribute.value().trim() == "true")
}

/// JSON rendering of an element tree: attributes as `@name`, mixed text as
/// `#text`, repeated children collapsed into arrays.
fn element_snapshot(node: Node<'_, '_>, depth: usize) -> Result<Value> {
    if depth >= MAX_ELEMENT_DEPTH {
        bail!("element nesting exceeds {MAX_ELEMENT_DEPTH} levels");
    }

    let element_children = node
        .children()
        .filter(|child| child.is_element())
        .collect::<Vec<_>>();
    let attributes = node.attributes().collect::<Vec<_>>();

    if element_children.is_empty() && attributes.is_empty() {
        return Ok(match string_or_null(Some(&element_text(node))) {
            Some(text) => Value::String(text),
            None => Value::Null,
        });
    }

    let mut object = Map::new();
    for attribute in attributes {
        object.insert(
            format!("@{}", attribute.name()),
            Value::String(attribute.value().to_string()),
        );
    }

    for child in element_children {
        let key = child.tag_name().name().to_string();
        let value = element_snapshot(child, depth + 1)?;
        match object.get_mut(&key) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                object.insert(key, value);
            }
        }
    }

    let direct_text = node
        .children()
        .filter(|child| child.is_text())
        .filter_map(|child| child.text())
        .collect::<String>();
    if let Some(text) = string_or_null(Some(&direct_text)) {
        object.insert("#text".to_string(), Value::String(text));
    }

    Ok(Value::Object(object))
}
