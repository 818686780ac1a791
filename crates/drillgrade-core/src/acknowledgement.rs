//! Acknowledgement text for every sender the classifier saw.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::classifier::{AckEntry, Bucket};
use crate::model::{format_date_time, LatLong};

pub const SEPARATOR: &str =
    "----------------------------------------------------------------------------------------------";

/// Per-bucket closing sentences. All configurable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AckTexts {
    pub expected: String,
    pub unexpected: String,
    pub early: String,
    pub late: String,
    /// Appended after each bucket section and once more at the end.
    pub extra: String,
}

impl Default for AckTexts {
    fn default() -> Self {
        Self {
            expected: "Feedback messages and maps for expected message types will be generated and published shortly.\n".into(),
            unexpected: "No feedback can or will be produced for unexpected message types.\n".into(),
            early: "No feedback can or will be produced for early messages.\n".into(),
            late: "No feedback can or will be produced for late messages.\n".into(),
            extra: String::new(),
        }
    }
}

impl AckTexts {
    fn closing(&self, bucket: Bucket) -> &str {
        match bucket {
            Bucket::Expected => &self.expected,
            Bucket::Unexpected => &self.unexpected,
            Bucket::Early => &self.early,
            Bucket::Late => &self.late,
        }
    }
}

/// One line per message in `bucket`, oldest first.
pub fn format_bucket(entry: &AckEntry, bucket: Bucket, indent: usize) -> String {
    let pad = " ".repeat(indent);
    let mut out = String::new();
    for m in entry.messages(bucket) {
        let _ = writeln!(
            out,
            "{pad}Date: {}, MessageId: {}, Type: {}",
            format_date_time(&m.msg_date_time),
            m.message_id,
            m.form_type()
        );
    }
    out
}

/// Acknowledgement text with one section per non-empty bucket.
pub fn acknowledgement_text(entry: &AckEntry, texts: &AckTexts) -> String {
    let mut out = String::new();
    for bucket in Bucket::ALL {
        if entry.count(bucket) == 0 {
            continue;
        }
        let _ = writeln!(out, "The following {bucket} message types are acknowledged:");
        out.push_str(&format_bucket(entry, bucket, 4));
        out.push('\n');
        out.push_str(texts.closing(bucket));
        out.push_str(&texts.extra);
    }
    out.push_str(&texts.extra);
    out.push_str(SEPARATOR);
    out.push('\n');
    out
}

/// One row of the acknowledgements table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckSummary {
    pub from: String,
    pub location: Option<LatLong>,
    pub location_jittered: bool,
    pub expected: usize,
    pub unexpected: usize,
    pub early: usize,
    pub late: usize,
    pub text: String,
}

impl AckSummary {
    pub const HEADERS: [&'static str; 9] = [
        "From",
        "Latitude",
        "Longitude",
        "Jittered",
        "Expected",
        "Unexpected",
        "Early",
        "Late",
        "Text",
    ];

    pub fn new(entry: &AckEntry, text: String) -> Self {
        Self {
            from: entry.from.clone(),
            location: entry.location,
            location_jittered: entry.location_jittered,
            expected: entry.count(Bucket::Expected),
            unexpected: entry.count(Bucket::Unexpected),
            early: entry.count(Bucket::Early),
            late: entry.count(Bucket::Late),
            text,
        }
    }

    pub fn row(&self) -> Vec<String> {
        let (lat, lon) = match &self.location {
            Some(l) => (l.latitude.to_string(), l.longitude.to_string()),
            None => (String::new(), String::new()),
        };
        vec![
            self.from.clone(),
            lat,
            lon,
            self.location_jittered.to_string(),
            self.expected.to_string(),
            self.unexpected.to_string(),
            self.early.to_string(),
            self.late.to_string(),
            self.text.clone(),
        ]
    }
}
