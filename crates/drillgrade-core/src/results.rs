//! Per-message and per-sender result records.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::model::{format_date_time, FormType, LatLong};
use crate::scoring::{Explanation, PERFECT_MESSAGE};

/// The scored result for one expected message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PracticeSummary {
    pub from: String,
    /// First To address of the submitted message.
    pub to: String,
    /// Usable location, possibly synthetic after jitter.
    pub location: Option<LatLong>,
    pub date_time: NaiveDateTime,
    pub explanations: Vec<Explanation>,
    pub message_id: String,
    pub form_type: FormType,
}

impl PracticeSummary {
    pub fn feedback_count(&self) -> usize {
        self.explanations.len()
    }

    pub fn is_perfect(&self) -> bool {
        self.explanations.is_empty()
    }

    pub fn feedback(&self) -> String {
        if self.is_perfect() {
            PERFECT_MESSAGE.to_string()
        } else {
            self.explanations
                .iter()
                .map(|e| e.text.as_str())
                .collect::<Vec<_>>()
                .join("\n")
        }
    }

    /// Columns for the practice summary table.
    pub fn row(&self) -> Vec<String> {
        let (lat, lon) = match &self.location {
            Some(l) => (l.latitude.to_string(), l.longitude.to_string()),
            None => (String::new(), String::new()),
        };
        vec![
            self.from.clone(),
            self.to.clone(),
            lat,
            lon,
            format_date_time(&self.date_time),
            self.feedback_count().to_string(),
            self.feedback(),
            self.message_id.clone(),
            self.form_type.to_string(),
        ]
    }

    pub const HEADERS: [&'static str; 9] = [
        "From",
        "To",
        "Latitude",
        "Longitude",
        "Date",
        "Feedback Count",
        "Feedback",
        "MessageId",
        "FormType",
    ];
}

/// A reply to one participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl OutboundMessage {
    pub const HEADERS: [&'static str; 4] = ["From", "To", "Subject", "Body"];

    pub fn row(&self) -> Vec<String> {
        vec![
            self.from.clone(),
            self.to.clone(),
            self.subject.clone(),
            self.body.clone(),
        ]
    }
}
