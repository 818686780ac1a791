//! Core data model types for drillgrade.
//!
//! An [`ExportedMessage`] is one message pulled from a participant's mailbox
//! export. Its form-specific fields live in a [`FormData`] tagged union so
//! scorers can pattern-match on the concrete form instead of downcasting.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Canonical date/time layout used in forms, acknowledgements and reports.
pub const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Some clients write dates with slashes.
const ALT_DATE_TIME_FORMAT: &str = "%Y/%m/%d %H:%M";

/// Parse a form date/time in either of the accepted layouts.
pub fn parse_date_time(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, DATE_TIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(s, ALT_DATE_TIME_FORMAT))
        .ok()
}

pub fn format_date_time(dt: &NaiveDateTime) -> String {
    dt.format(DATE_TIME_FORMAT).to_string()
}

/// The form types drillgrade knows how to classify and grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormType {
    Ics213,
    Ics213Rr,
    Ics205,
    Hics259,
    FieldSituation,
    /// Anything that is not a recognised form.
    Plain,
}

impl FormType {
    pub fn is_gradable(self) -> bool {
        self != FormType::Plain
    }
}

impl fmt::Display for FormType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormType::Ics213 => write!(f, "ics_213"),
            FormType::Ics213Rr => write!(f, "ics_213_rr"),
            FormType::Ics205 => write!(f, "ics_205"),
            FormType::Hics259 => write!(f, "hics_259"),
            FormType::FieldSituation => write!(f, "field_situation"),
            FormType::Plain => write!(f, "plain"),
        }
    }
}

impl FromStr for FormType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "ics213" => Ok(FormType::Ics213),
            "ics213rr" => Ok(FormType::Ics213Rr),
            "ics205" => Ok(FormType::Ics205),
            "hics259" => Ok(FormType::Hics259),
            "fieldsituation" | "fsr" => Ok(FormType::FieldSituation),
            "plain" => Ok(FormType::Plain),
            _ => Err(format!("unknown form type: {s}")),
        }
    }
}

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLong {
    pub latitude: f64,
    pub longitude: f64,
}

impl LatLong {
    /// Placeholder used by clients that have no position fix.
    pub const ZERO_ZERO: LatLong = LatLong {
        latitude: 0.0,
        longitude: 0.0,
    };

    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Finite and within the valid coordinate ranges.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    pub fn is_zero_zero(&self) -> bool {
        self.latitude == 0.0 && self.longitude == 0.0
    }
}

impl fmt::Display for LatLong {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.latitude, self.longitude)
    }
}

/// A location is usable for mapping when present, valid and not the sentinel.
pub fn is_usable_location(location: Option<&LatLong>) -> bool {
    matches!(location, Some(l) if l.is_valid() && !l.is_zero_zero())
}

/// One message as exported from a participant's mailbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedMessage {
    pub message_id: String,
    /// Sender call sign.
    pub from: String,
    #[serde(default)]
    pub to: Vec<String>,
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default)]
    pub subject: String,
    /// When the message was sent.
    pub msg_date_time: NaiveDateTime,
    /// Ordering key; falls back to `msg_date_time`.
    #[serde(default)]
    pub sort_date_time: Option<NaiveDateTime>,
    /// Best location for plotting the sender.
    #[serde(default)]
    pub map_location: Option<LatLong>,
    /// Location reported by the mail client.
    #[serde(default)]
    pub msg_location: Option<LatLong>,
    /// Plain-text rendering of the message body.
    #[serde(default)]
    pub plain_content: String,
    #[serde(default)]
    pub form: FormData,
}

impl ExportedMessage {
    pub fn form_type(&self) -> FormType {
        self.form.form_type()
    }

    pub fn sort_key(&self) -> NaiveDateTime {
        self.sort_date_time.unwrap_or(self.msg_date_time)
    }

    /// To and Cc addresses, in that order.
    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.to.iter().chain(self.cc.iter()).map(|s| s.trim())
    }
}

/// Form-specific fields, tagged by form type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "form_type", rename_all = "snake_case")]
pub enum FormData {
    Ics213(Ics213Form),
    Ics213Rr(Ics213RrForm),
    Ics205(Ics205Form),
    Hics259(Hics259Form),
    FieldSituation(FieldSituationForm),
    #[default]
    Plain,
}

impl FormData {
    pub fn form_type(&self) -> FormType {
        match self {
            FormData::Ics213(_) => FormType::Ics213,
            FormData::Ics213Rr(_) => FormType::Ics213Rr,
            FormData::Ics205(_) => FormType::Ics205,
            FormData::Hics259(_) => FormType::Hics259,
            FormData::FieldSituation(_) => FormType::FieldSituation,
            FormData::Plain => FormType::Plain,
        }
    }
}

/// ICS-213 General Message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Ics213Form {
    pub organization: String,
    pub incident_name: String,
    pub form_to: String,
    pub form_from: String,
    pub form_subject: String,
    pub form_date: String,
    pub form_time: String,
    pub form_message: String,
    pub approved_by: String,
    pub position: String,
    pub is_exercise: bool,
    pub form_location: Option<LatLong>,
}

/// ICS-213 RR Resource Request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Ics213RrForm {
    pub organization: String,
    pub incident_name: String,
    pub activity_date_time: String,
    pub request_number: String,
    pub line_items: Vec<ResourceLineItem>,
    pub delivery: String,
    pub substitutes: String,
    pub requested_by: String,
    pub priority: String,
    pub approved_by: String,
    pub logistics_order_number: String,
    pub supplier_info: String,
    pub supplier_name: String,
    pub supplier_point_of_contact: String,
    pub supply_notes: String,
    pub logistics_authorizer: String,
    pub logistics_date_time: String,
    pub ordered_by: String,
    pub finance_comments: String,
    pub finance_name: String,
    pub finance_date_time: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceLineItem {
    pub quantity: String,
    pub kind: String,
    #[serde(rename = "type")]
    pub item_type: String,
    pub item: String,
    pub requested_date_time: String,
    pub estimated_date_time: String,
    pub cost: String,
}

impl ResourceLineItem {
    pub fn is_empty(&self) -> bool {
        [
            &self.quantity,
            &self.kind,
            &self.item_type,
            &self.item,
            &self.requested_date_time,
            &self.estimated_date_time,
            &self.cost,
        ]
        .iter()
        .all(|s| s.trim().is_empty())
    }
}

/// ICS-205 Incident Radio Communications Plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Ics205Form {
    pub organization: String,
    pub incident_name: String,
    pub date_time_prepared: String,
    pub date_from: String,
    pub date_to: String,
    pub time_from: String,
    pub time_to: String,
    pub special_instructions: String,
    pub approved_by: String,
    pub approved_date_time: String,
    pub iap_page: String,
    pub radio_entries: Vec<RadioEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioEntry {
    pub zone_group: String,
    pub channel_number: String,
    pub function: String,
    pub channel_name: String,
    pub assignment: String,
    pub rx_frequency: String,
    pub rx_narrow_wide: String,
    pub rx_tone: String,
    pub tx_frequency: String,
    pub tx_narrow_wide: String,
    pub tx_tone: String,
    pub mode: String,
    pub remarks: String,
}

impl RadioEntry {
    pub fn is_empty(&self) -> bool {
        [
            &self.zone_group,
            &self.channel_number,
            &self.function,
            &self.channel_name,
            &self.assignment,
            &self.rx_frequency,
            &self.rx_narrow_wide,
            &self.rx_tone,
            &self.tx_frequency,
            &self.tx_narrow_wide,
            &self.tx_tone,
            &self.mode,
            &self.remarks,
        ]
        .iter()
        .all(|s| s.trim().is_empty())
    }
}

/// HICS-259 Hospital Casualty/Fatality Report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Hics259Form {
    pub incident_name: String,
    pub form_date: String,
    pub form_time: String,
    pub operational_period: String,
    pub op_from_date: String,
    pub op_to_date: String,
    pub op_from_time: String,
    pub op_to_time: String,
    /// Keyed by the row names in [`Hics259Form::CASUALTY_KEYS`].
    pub casualties: HashMap<String, CasualtyEntry>,
    pub patient_tracking_manager: String,
    pub facility_name: String,
}

impl Hics259Form {
    pub const CASUALTY_KEYS: [&'static str; 9] = [
        "Patients seen",
        "Waiting to be seen",
        "Admitted",
        "Critical care bed",
        "Medical/surgical bed",
        "Pediatric bed",
        "Discharged",
        "Transferred",
        "Expired",
    ];
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CasualtyEntry {
    pub adult_count: String,
    pub child_count: String,
    pub comment: String,
}

/// A yes/no infrastructure status with its free-text comment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceReport {
    pub status: String,
    pub comments: String,
}

/// Field Situation Report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldSituationForm {
    pub organization: String,
    pub precedence: String,
    pub form_date_time: String,
    pub task: String,
    pub is_help_needed: String,
    pub city: String,
    pub county: String,
    pub territory: String,
    pub form_location: Option<LatLong>,
    pub landline: ServiceReport,
    pub voip: ServiceReport,
    pub cell_phone: ServiceReport,
    pub cell_text: ServiceReport,
    pub radio: ServiceReport,
    pub tv: ServiceReport,
    pub sat_tv: ServiceReport,
    pub cable_tv: ServiceReport,
    pub water: ServiceReport,
    pub power: ServiceReport,
    pub power_stable: ServiceReport,
    pub natural_gas: ServiceReport,
    pub internet: ServiceReport,
    pub noaa: ServiceReport,
    pub noaa_audio_degraded: ServiceReport,
    pub additional_comments: String,
    pub poc: String,
}
