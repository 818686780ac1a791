//! Grading error types.
//!
//! Only failures that stop a run, or that a caller must be told about, are
//! represented here. Submission-level problems (unknown exercise ids, short
//! line-item lists, bad locations) are recovered locally and show up as
//! feedback text or log output instead.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while preparing or executing a grading run.
#[derive(Debug, Error)]
pub enum GradeError {
    /// Unknown form type, malformed exercise date, bad window, missing marker.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The reference message for the graded exercise could not be found.
    #[error("reference file not found: {}", path.display())]
    MissingReference { path: PathBuf },

    /// A reference field could not be parsed for a typed assertion.
    #[error("reference field '{field}' is not a valid {expected}: '{value}'")]
    ReferenceParse {
        field: String,
        expected: &'static str,
        value: String,
    },

    /// The persistence gateway failed.
    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GradeError {
    /// Returns `true` if this error must abort the run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, GradeError::Persistence(_))
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        GradeError::Configuration(message.into())
    }
}

pub type Result<T> = std::result::Result<T, GradeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persistence_errors_are_not_fatal() {
        assert!(!GradeError::Persistence("locked".into()).is_fatal());
        assert!(GradeError::config("bad date").is_fatal());
        assert!(GradeError::ReferenceParse {
            field: "RX Freq".into(),
            expected: "number",
            value: "abc".into(),
        }
        .is_fatal());
    }

    #[test]
    fn reference_parse_message() {
        let err = GradeError::ReferenceParse {
            field: "TX Tone".into(),
            expected: "number",
            value: "x".into(),
        };
        assert_eq!(
            err.to_string(),
            "reference field 'TX Tone' is not a valid number: 'x'"
        );
    }
}
