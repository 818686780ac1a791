//! Per-sender message classification.
//!
//! Every message a participant sent is filed into exactly one
//! [`Bucket`] relative to the exercise being graded. Bucket membership lives
//! in an [`AckStore`], which only ever moves an entry from
//! [`Bucket::Unexpected`] to [`Bucket::Expected`].

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::{is_usable_location, ExportedMessage, FormType, LatLong};

/// Marker that precedes the exercise identifier in a message body.
pub const DEFAULT_EXERCISE_ID_MARKER: &str = "exercise id: ";
/// Length of the identifier token that follows the marker.
pub const DEFAULT_EXERCISE_ID_LENGTH: usize = 12;

/// Extract the exercise identifier embedded in a message body.
///
/// Matching is case-insensitive and the token is returned lowercased. A body
/// without the marker yields an empty string; a body that ends before the
/// full token length yields whatever follows the marker.
pub fn extract_exercise_id(content: &str, marker: &str, token_len: usize) -> String {
    let content = content.to_lowercase();
    let marker = marker.to_lowercase();
    match content.find(&marker) {
        Some(index) => content[index + marker.len()..]
            .chars()
            .take(token_len)
            .collect::<String>()
            .trim()
            .to_string(),
        None => String::new(),
    }
}

/// Where a submitted message lands relative to the graded exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Bucket {
    Expected,
    Unexpected,
    Early,
    Late,
}

impl Bucket {
    pub const ALL: [Bucket; 4] = [
        Bucket::Expected,
        Bucket::Unexpected,
        Bucket::Early,
        Bucket::Late,
    ];
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bucket::Expected => write!(f, "expected"),
            Bucket::Unexpected => write!(f, "unexpected"),
            Bucket::Early => write!(f, "early"),
            Bucket::Late => write!(f, "late"),
        }
    }
}

/// Identity of one submitted message within a sender's history.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AckKey {
    pub from: String,
    pub message_id: String,
    pub form_type: FormType,
}

impl AckKey {
    pub fn of(message: &ExportedMessage) -> Self {
        Self {
            from: message.from.clone(),
            message_id: message.message_id.clone(),
            form_type: message.form_type(),
        }
    }
}

#[derive(Debug, Clone)]
struct Filed {
    bucket: Bucket,
    message: ExportedMessage,
}

/// Bucket membership keyed by [`AckKey`].
///
/// Each key is filed in exactly one bucket. Re-observing a key never
/// duplicates it; the only transition is Unexpected → Expected.
#[derive(Debug, Clone, Default)]
pub struct AckStore {
    entries: HashMap<AckKey, Filed>,
}

impl AckStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// File `message` under `bucket`, applying the promotion rule.
    ///
    /// Returns the bucket the key ends up in.
    pub fn observe(&mut self, message: &ExportedMessage, bucket: Bucket) -> Bucket {
        match self.entries.entry(AckKey::of(message)) {
            Entry::Vacant(slot) => {
                slot.insert(Filed {
                    bucket,
                    message: message.clone(),
                });
                bucket
            }
            Entry::Occupied(mut slot) => {
                if slot.get().bucket == Bucket::Unexpected && bucket == Bucket::Expected {
                    tracing::debug!(
                        from = %slot.key().from,
                        message_id = %slot.key().message_id,
                        "promoting unexpected message to expected"
                    );
                    let filed = slot.get_mut();
                    filed.bucket = Bucket::Expected;
                    filed.message = message.clone();
                }
                slot.get().bucket
            }
        }
    }

    pub fn bucket_of(&self, key: &AckKey) -> Option<Bucket> {
        self.entries.get(key).map(|f| f.bucket)
    }

    /// Messages in `bucket`, oldest first.
    pub fn messages(&self, bucket: Bucket) -> Vec<&ExportedMessage> {
        let mut messages: Vec<&ExportedMessage> = self
            .entries
            .values()
            .filter(|f| f.bucket == bucket)
            .map(|f| &f.message)
            .collect();
        messages.sort_by(|a, b| {
            a.sort_key()
                .cmp(&b.sort_key())
                .then_with(|| a.message_id.cmp(&b.message_id))
        });
        messages
    }

    pub fn count(&self, bucket: Bucket) -> usize {
        self.entries.values().filter(|f| f.bucket == bucket).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// How a sender's best-known location is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationPolicy {
    /// Every message overwrites the location.
    #[default]
    LastWins,
    /// The first non-null location sticks.
    FirstWins,
}

/// Classification state for one sender.
#[derive(Debug, Clone)]
pub struct AckEntry {
    pub from: String,
    pub location: Option<LatLong>,
    /// Set when `location` was replaced by a synthetic position.
    pub location_jittered: bool,
    store: AckStore,
}

impl AckEntry {
    pub fn new(from: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            location: None,
            location_jittered: false,
            store: AckStore::new(),
        }
    }

    pub fn observe(
        &mut self,
        message: &ExportedMessage,
        bucket: Bucket,
        policy: LocationPolicy,
    ) -> Bucket {
        let bucket = self.store.observe(message, bucket);
        match policy {
            LocationPolicy::LastWins => self.location = message.map_location,
            LocationPolicy::FirstWins => {
                if self.location.is_none() {
                    self.location = message.map_location;
                }
            }
        }
        bucket
    }

    pub fn messages(&self, bucket: Bucket) -> Vec<&ExportedMessage> {
        self.store.messages(bucket)
    }

    pub fn count(&self, bucket: Bucket) -> usize {
        self.store.count(bucket)
    }

    pub fn total(&self) -> usize {
        self.store.len()
    }

    pub fn bucket_of(&self, key: &AckKey) -> Option<Bucket> {
        self.store.bucket_of(key)
    }

    pub fn has_usable_location(&self) -> bool {
        is_usable_location(self.location.as_ref())
    }

    pub fn set_synthetic_location(&mut self, location: LatLong) {
        self.location = Some(location);
        self.location_jittered = true;
    }
}

/// Date and form type of a known exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    pub date: NaiveDate,
    pub form_type: FormType,
}

/// Exercise identifier → exercise, built from all known reference files.
#[derive(Debug, Clone, Default)]
pub struct ReferenceIndex {
    entries: HashMap<String, ReferenceEntry>,
}

impl ReferenceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, exercise_id: impl Into<String>, entry: ReferenceEntry) {
        let exercise_id = exercise_id.into().to_lowercase();
        if let Some(previous) = self.entries.insert(exercise_id.clone(), entry) {
            tracing::warn!(
                exercise_id = %exercise_id,
                previous = %previous.date,
                current = %entry.date,
                "duplicate exercise id in reference files"
            );
        }
    }

    pub fn get(&self, exercise_id: &str) -> Option<&ReferenceEntry> {
        self.entries.get(exercise_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Buckets every message from a sender relative to one exercise.
pub struct Classifier<'a> {
    index: &'a ReferenceIndex,
    expected_form: FormType,
    exercise_id: String,
    exercise_date: NaiveDate,
    policy: LocationPolicy,
    marker: String,
    token_len: usize,
}

impl<'a> Classifier<'a> {
    pub fn new(
        index: &'a ReferenceIndex,
        expected_form: FormType,
        exercise_id: &str,
        exercise_date: NaiveDate,
    ) -> Self {
        Self {
            index,
            expected_form,
            exercise_id: exercise_id.to_lowercase(),
            exercise_date,
            policy: LocationPolicy::default(),
            marker: DEFAULT_EXERCISE_ID_MARKER.to_string(),
            token_len: DEFAULT_EXERCISE_ID_LENGTH,
        }
    }

    pub fn with_location_policy(mut self, policy: LocationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_marker(mut self, marker: &str, token_len: usize) -> Self {
        self.marker = marker.to_string();
        self.token_len = token_len;
        self
    }

    /// Decide the bucket for a single message. Never fails.
    pub fn classify_message(&self, message: &ExportedMessage) -> Bucket {
        let exercise_id =
            extract_exercise_id(&message.plain_content, &self.marker, self.token_len);

        if message.form_type() == self.expected_form && exercise_id == self.exercise_id {
            return Bucket::Expected;
        }

        if exercise_id.is_empty() {
            return Bucket::Unexpected;
        }

        match self.index.get(&exercise_id) {
            None => {
                tracing::debug!(
                    from = %message.from,
                    message_id = %message.message_id,
                    exercise_id = %exercise_id,
                    "unknown exercise id"
                );
                Bucket::Unexpected
            }
            Some(entry) if entry.date < self.exercise_date => Bucket::Late,
            Some(entry) if entry.date > self.exercise_date => Bucket::Early,
            // Right exercise, wrong form type.
            Some(_) => Bucket::Unexpected,
        }
    }

    /// Classify a sender's full message history.
    pub fn classify(&self, sender: &str, messages: &[&ExportedMessage]) -> AckEntry {
        let mut entry = AckEntry::new(sender);
        for message in messages {
            let bucket = self.classify_message(message);
            entry.observe(message, bucket, self.policy);
        }
        entry
    }
}
