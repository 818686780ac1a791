//! Participation history.
//!
//! Works on the joined user records returned by a persistence gateway:
//! grouping participants by how often they show up, and finding who missed
//! the latest exercise after taking part in recent ones.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::persistence::{Exercise, JoinedUser};
use crate::results::OutboundMessage;

/// Participation category of one user over a set of exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HistoryType {
    /// Exactly one exercise, and it is the latest.
    FirstTime,
    /// Exactly one exercise, not the latest.
    OneAndDone,
    /// At least the heavy-hitter threshold.
    HeavyHitter,
    AllOther,
}

impl HistoryType {
    pub const ALL: [HistoryType; 4] = [
        HistoryType::FirstTime,
        HistoryType::OneAndDone,
        HistoryType::HeavyHitter,
        HistoryType::AllOther,
    ];

    pub fn label(self) -> &'static str {
        match self {
            HistoryType::FirstTime => "First Time Participants",
            HistoryType::OneAndDone => "One and Done Participants",
            HistoryType::HeavyHitter => "Heavy Hitters",
            HistoryType::AllOther => "All Other Participants",
        }
    }
}

impl fmt::Display for HistoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HistoryType::FirstTime => "FIRST_TIME",
            HistoryType::OneAndDone => "ONE_AND_DONE",
            HistoryType::HeavyHitter => "HEAVY_HITTER",
            HistoryType::AllOther => "ALL_OTHER",
        };
        f.write_str(s)
    }
}

/// Categorize one user. `latest` is the date of the most recent exercise
/// in the filtered set.
pub fn classify_user(join: &JoinedUser, latest: NaiveDate, heavy_hitter_threshold: usize) -> HistoryType {
    match join.exercises.len() {
        1 if join.exercises[0].date == latest => HistoryType::FirstTime,
        1 => HistoryType::OneAndDone,
        n if heavy_hitter_threshold > 0 && n >= heavy_hitter_threshold => HistoryType::HeavyHitter,
        _ => HistoryType::AllOther,
    }
}

/// Group users by [`HistoryType`]. Every category is present, possibly empty.
///
/// `exercises` is the filtered exercise set, most recent first; when it is
/// empty there is nothing to group against and the map is empty too.
pub fn history_map<'a>(
    exercises: &[Exercise],
    joins: &'a [JoinedUser],
    heavy_hitter_threshold: usize,
) -> BTreeMap<HistoryType, Vec<&'a JoinedUser>> {
    let mut map = BTreeMap::new();
    let Some(latest) = latest_date(exercises) else {
        return map;
    };
    for kind in HistoryType::ALL {
        map.insert(kind, Vec::new());
    }
    for join in joins.iter().filter(|j| !j.exercises.is_empty()) {
        let kind = classify_user(join, latest, heavy_hitter_threshold);
        map.entry(kind).or_insert_with(Vec::new).push(join);
    }
    map
}

fn latest_date(exercises: &[Exercise]) -> Option<NaiveDate> {
    exercises.iter().map(|e| e.date).max()
}

fn same_exercise(a: &Exercise, b: &Exercise) -> bool {
    if a.id != 0 && b.id != 0 {
        a.id == b.id
    } else {
        a.date == b.date && a.exercise_id.eq_ignore_ascii_case(&b.exercise_id)
    }
}

/// Users who skipped the latest exercise but took part in at least one of
/// the `miss_limit` exercises before it.
pub fn users_missing_exercises<'a>(
    exercises: &[Exercise],
    joins: &'a [JoinedUser],
    miss_limit: usize,
) -> Vec<&'a JoinedUser> {
    let mut sorted: Vec<&Exercise> = exercises.iter().collect();
    sorted.sort_by(|a, b| b.date.cmp(&a.date));
    let Some((latest, previous)) = sorted.split_first() else {
        return Vec::new();
    };
    let window = &previous[..miss_limit.min(previous.len())];

    let missing: Vec<&JoinedUser> = joins
        .iter()
        .filter(|j| j.user.is_active)
        .filter(|j| !j.exercises.iter().any(|e| same_exercise(e, latest)))
        .filter(|j| {
            j.exercises
                .iter()
                .any(|e| window.iter().any(|w| same_exercise(e, w)))
        })
        .collect();
    tracing::debug!(
        latest = %latest.date,
        checked = window.len(),
        missing = missing.len(),
        "missed exercise scan"
    );
    missing
}

/// Fill in a missed-exercise template.
pub fn render_missed_template(template: &str, date: NaiveDate, instructions: &str) -> String {
    template
        .replace("#DATE#", &date.to_string())
        .replace("#INSTRUCTIONS#", instructions)
}

/// One "we missed you" message per user.
pub fn missed_messages(
    users: &[&JoinedUser],
    sender: &str,
    subject: &str,
    template: &str,
    date: NaiveDate,
    instructions: &str,
) -> Vec<OutboundMessage> {
    let body = render_missed_template(template, date, instructions);
    users
        .iter()
        .map(|j| OutboundMessage {
            from: sender.to_string(),
            to: j.user.call.clone(),
            subject: subject.to_string(),
            body: body.clone(),
        })
        .collect()
}
