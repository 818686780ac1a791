//! Collaborator traits.
//!
//! The message store feeds the run engine; persistence gateways are
//! implemented in the `drillgrade-store` crate.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::error::Result;
use crate::model::{ExportedMessage, FormType};
use crate::persistence::{BulkInsertEntry, Exercise, JoinedUser, ReturnRecord};

// ---------------------------------------------------------------------------
// Message store
// ---------------------------------------------------------------------------

/// Source of participant messages for one run.
pub trait MessageStore {
    /// Senders in a stable order.
    fn senders(&self) -> Vec<&str>;

    /// A sender's messages grouped by form type, each group oldest first.
    fn messages_for_sender(&self, sender: &str) -> BTreeMap<FormType, Vec<&ExportedMessage>>;

    /// Every message from a sender, oldest first.
    fn all_messages_for_sender(&self, sender: &str) -> Vec<&ExportedMessage>;
}

// ---------------------------------------------------------------------------
// Persistence gateway
// ---------------------------------------------------------------------------

/// Storage for exercise results and participation history.
pub trait PersistenceGateway: Send {
    /// Short backend name for logs (e.g. "sqlite").
    fn name(&self) -> &str;

    fn health(&self) -> ReturnRecord;

    /// Store one exercise and its events atomically.
    fn bulk_insert(&mut self, entry: &BulkInsertEntry) -> ReturnRecord;

    /// Exercises of `kind` (all kinds when `None`) on or after `since`,
    /// most recent first.
    fn filtered_exercises(
        &self,
        kind: Option<&str>,
        since: Option<NaiveDate>,
    ) -> Result<Vec<Exercise>>;

    /// Every user who took part in any of `exercises`, with the subset of
    /// `exercises` they took part in.
    fn users_history(&self, exercises: &[Exercise]) -> Result<Vec<JoinedUser>>;
}
