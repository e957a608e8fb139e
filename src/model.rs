use chrono::NaiveDateTime;
use serde::Serialize;

/// Typed view of one call export document, ready to be written as a unit.
#[derive(Debug, Clone, Serialize, Default, PartialEq)]
pub struct CallGraph {
    pub call: CallRecord,
    pub agency_contexts: Vec<AgencyContextRecord>,
    pub location: Option<LocationRecord>,
    pub incidents: Vec<IncidentRecord>,
    pub units: Vec<UnitRecord>,
    pub narratives: Vec<NarrativeRecord>,
    pub persons: Vec<PersonRecord>,
    pub vehicles: Vec<VehicleRecord>,
    pub dispositions: Vec<DispositionRecord>,
}

impl CallGraph {
    /// Rows this graph occupies once written, the call row included.
    pub fn record_count(&self) -> usize {
        let unit_children: usize = self
            .units
            .iter()
            .map(|unit| unit.personnel.len() + unit.logs.len() + unit.dispositions.len())
            .sum();

        1 + self.agency_contexts.len()
            + usize::from(self.location.is_some())
            + self.incidents.len()
            + self.units.len()
            + unit_children
            + self.narratives.len()
            + self.persons.len()
            + self.vehicles.len()
            + self.dispositions.len()
    }
}

#[derive(Debug, Clone, Serialize, Default, PartialEq)]
pub struct CallRecord {
    pub call_id: String,
    pub call_number: Option<String>,
    pub call_source: Option<String>,
    pub caller_name: Option<String>,
    pub caller_phone: Option<String>,
    pub nature_of_call: Option<String>,
    pub create_datetime: Option<NaiveDateTime>,
    pub close_datetime: Option<NaiveDateTime>,
    pub created_by: Option<String>,
    pub is_closed: bool,
    pub is_canceled: bool,
    pub alarm_level: Option<i64>,
    pub emd_code: Option<String>,
    #[serde(skip)]
    pub raw_xml: String,
    #[serde(skip)]
    pub raw_json: String,
}

#[derive(Debug, Clone, Serialize, Default, PartialEq)]
pub struct AgencyContextRecord {
    pub agency_type: Option<String>,
    pub call_type: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub dispatcher: Option<String>,
    pub created_datetime: Option<NaiveDateTime>,
    pub closed_datetime: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Default, PartialEq)]
pub struct LocationRecord {
    pub full_address: Option<String>,
    pub house_number: Option<String>,
    pub street_name: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub common_name: Option<String>,
    pub cross_street: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub police_beat: Option<String>,
    pub fire_zone: Option<String>,
    pub ems_district: Option<String>,
}

#[derive(Debug, Clone, Serialize, Default, PartialEq)]
pub struct IncidentRecord {
    pub incident_number: Option<String>,
    pub case_number: Option<String>,
    pub jurisdiction: Option<String>,
    pub agency_type: Option<String>,
    pub incident_type: Option<String>,
    pub create_datetime: Option<NaiveDateTime>,
}

/// Lifecycle timestamps follow the order a unit moves through a call.
#[derive(Debug, Clone, Serialize, Default, PartialEq)]
pub struct UnitRecord {
    pub unit_number: Option<String>,
    pub unit_type: Option<String>,
    pub agency_type: Option<String>,
    pub jurisdiction: Option<String>,
    pub is_primary: bool,
    pub assigned_datetime: Option<NaiveDateTime>,
    pub dispatch_datetime: Option<NaiveDateTime>,
    pub enroute_datetime: Option<NaiveDateTime>,
    pub arrive_datetime: Option<NaiveDateTime>,
    pub staged_datetime: Option<NaiveDateTime>,
    pub at_patient_datetime: Option<NaiveDateTime>,
    pub transport_datetime: Option<NaiveDateTime>,
    pub at_hospital_datetime: Option<NaiveDateTime>,
    pub depart_hospital_datetime: Option<NaiveDateTime>,
    pub clear_datetime: Option<NaiveDateTime>,
    pub transport_mileage: Option<f64>,
    pub personnel: Vec<UnitPersonnelRecord>,
    pub logs: Vec<UnitLogRecord>,
    pub dispositions: Vec<DispositionRecord>,
}

#[derive(Debug, Clone, Serialize, Default, PartialEq)]
pub struct UnitPersonnelRecord {
    pub employee_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub rank: Option<String>,
    pub is_primary_officer: bool,
}

#[derive(Debug, Clone, Serialize, Default, PartialEq)]
pub struct UnitLogRecord {
    pub log_datetime: Option<NaiveDateTime>,
    pub status: Option<String>,
    pub location: Option<String>,
    pub comment: Option<String>,
}

/// Shared by unit-level and call-level disposition groups.
#[derive(Debug, Clone, Serialize, Default, PartialEq)]
pub struct DispositionRecord {
    pub code: Option<String>,
    pub description: Option<String>,
    pub count: Option<i64>,
    pub disposition_datetime: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Default, PartialEq)]
pub struct NarrativeRecord {
    pub narrative_type: Option<String>,
    pub text: Option<String>,
    pub entered_by: Option<String>,
    pub entered_datetime: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Default, PartialEq)]
pub struct PersonRecord {
    pub role: Option<String>,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<NaiveDateTime>,
    pub race: Option<String>,
    pub sex: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Default, PartialEq)]
pub struct VehicleRecord {
    pub role: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i64>,
    pub color: Option<String>,
    pub license_plate: Option<String>,
    pub license_state: Option<String>,
    pub vin: Option<String>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerStatus {
    Success,
    Failed,
}

impl LedgerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessedFile {
    pub filename: String,
    pub content_hash: String,
    pub status: LedgerStatus,
    pub records_processed: Option<i64>,
    pub error_message: Option<String>,
    pub processed_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VersionsReport {
    pub report_version: u32,
    pub generated_at: String,
    pub source_directory: String,
    pub file_count: usize,
    pub call_count: usize,
    pub latest: Vec<String>,
    pub skip: Vec<String>,
    pub unparseable: Vec<String>,
}
