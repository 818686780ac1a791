//! Store error types.

use drillgrade_core::error::GradeError;
use thiserror::Error;

/// Errors raised by persistence gateways.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A stored value could not be turned back into a record.
    #[error("corrupt row in {table}: {message}")]
    CorruptRow { table: &'static str, message: String },

    /// The exercise was already stored.
    #[error("exercise {exercise_id} on {date} already stored")]
    Duplicate { exercise_id: String, date: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StoreError> for GradeError {
    fn from(e: StoreError) -> Self {
        GradeError::Persistence(e.to_string())
    }
}
