//! Records exchanged with a persistence gateway.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::{FormType, LatLong};

/// One graded exercise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    /// Assigned by the gateway; zero before insertion.
    #[serde(default)]
    pub id: i64,
    pub date: NaiveDate,
    /// e.g. "Practice".
    pub kind: String,
    /// Identifier embedded in the exercise instructions.
    pub exercise_id: String,
    pub form_type: FormType,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// One scored sender within an exercise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub exercise_id: i64,
    pub call: String,
    pub location: Option<LatLong>,
    pub feedback_count: usize,
    pub feedback: String,
    /// JSON object, e.g. `{"messageId":"ABC123"}`.
    pub metadata: String,
}

impl Event {
    pub fn metadata_for(message_id: &str) -> String {
        serde_json::json!({ "messageId": message_id }).to_string()
    }
}

/// The atomic batch handed to the gateway at the end of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkInsertEntry {
    pub exercise: Exercise,
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub call: String,
    #[serde(default)]
    pub name: String,
    pub is_active: bool,
}

/// A user with the exercises they took part in, most recent first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinedUser {
    pub user: User,
    /// Most recent known location.
    pub location: Option<LatLong>,
    pub exercises: Vec<Exercise>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReturnStatus {
    Ok,
    Error,
}

/// Outcome of a gateway write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnRecord {
    pub status: ReturnStatus,
    /// Diagnostic text.
    pub content: String,
}

impl ReturnRecord {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            status: ReturnStatus::Ok,
            content: content.into(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            status: ReturnStatus::Error,
            content: content.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ReturnStatus::Ok
    }
}
