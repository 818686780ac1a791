//! End-to-end pipeline tests across several weekly exercises.
//!
//! These drive the library crates directly: grade each week into a SQLite
//! store, write the report files, then read participation history back.

use chrono::{Duration, NaiveDate};

use drillgrade_core::classifier::{ReferenceEntry, ReferenceIndex};
use drillgrade_core::config::DrillgradeConfig;
use drillgrade_core::context::RunContext;
use drillgrade_core::engine::{GradingEngine, NoopReporter};
use drillgrade_core::history::{history_map, missed_messages, users_missing_exercises, HistoryType};
use drillgrade_core::model::{ExportedMessage, FormData, FormType, Ics213Form, LatLong};
use drillgrade_core::report::{ExerciseReport, PersistenceOutcome};
use drillgrade_core::store::InMemoryMessageStore;
use drillgrade_core::traits::PersistenceGateway;
use drillgrade_store::SqliteGateway;

const WEEKS: [(&str, &str); 3] = [
    ("2026-10-01", "week01aaaaaa"),
    ("2026-10-08", "week02bbbbbb"),
    ("2026-10-15", "week03cccccc"),
];

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn form(when: NaiveDate) -> Ics213Form {
    Ics213Form {
        organization: "EOC".into(),
        incident_name: "Cascadia Quake".into(),
        form_to: "Planning".into(),
        form_from: "Field".into(),
        form_subject: "Shelter status".into(),
        form_date: when.to_string(),
        form_time: "10:00".into(),
        form_message: "Shelter open".into(),
        approved_by: String::new(),
        position: "Radio Operator".into(),
        is_exercise: true,
        form_location: Some(LatLong::new(47.6, -122.3)),
    }
}

fn reference(week: usize) -> ExportedMessage {
    let (day, id) = WEEKS[week];
    let day = date(day);
    ExportedMessage {
        message_id: format!("REF-{week}"),
        from: "ETO-PRACTICE".into(),
        to: vec![],
        cc: vec![],
        subject: "ETO Practice".into(),
        msg_date_time: (day - Duration::days(6)).and_hms_opt(9, 0, 0).unwrap(),
        sort_date_time: None,
        map_location: None,
        msg_location: None,
        plain_content: format!("Exercise Id: {id}\n"),
        form: FormData::Ics213(form(day - Duration::days(1))),
    }
}

fn index() -> ReferenceIndex {
    let mut index = ReferenceIndex::new();
    for (day, id) in WEEKS {
        index.insert(
            id,
            ReferenceEntry {
                date: date(day),
                form_type: FormType::Ics213,
            },
        );
    }
    index
}

/// A perfect submission from `call` for the exercise whose id is `exercise_id`,
/// posted the day before `posted_for`.
fn submission(call: &str, exercise_id: &str, posted_for: NaiveDate) -> ExportedMessage {
    let sent = posted_for - Duration::days(1);
    ExportedMessage {
        message_id: format!("{call}-{exercise_id}"),
        from: call.into(),
        to: vec!["ETO-PRACTICE@winlink.org".into()],
        cc: vec![],
        subject: format!("ETO Practice from {call}"),
        msg_date_time: sent.and_hms_opt(12, 0, 0).unwrap(),
        sort_date_time: None,
        map_location: Some(LatLong::new(47.6, -122.3)),
        msg_location: Some(LatLong::new(47.6, -122.3)),
        plain_content: format!("Exercise Id: {exercise_id}\n"),
        form: FormData::Ics213(form(sent)),
    }
}

fn grade_week(
    week: usize,
    calls: &[&str],
    extra: Vec<ExportedMessage>,
    gateway: &mut SqliteGateway,
) -> ExerciseReport {
    let (day, id) = WEEKS[week];
    let day = date(day);
    let ctx = RunContext::new(
        &DrillgradeConfig::default(),
        day,
        reference(week),
        index(),
        format!("Instructions after {day}\n"),
    )
    .unwrap();

    let mut messages: Vec<ExportedMessage> =
        calls.iter().map(|call| submission(call, id, day)).collect();
    messages.extend(extra);
    let store = InMemoryMessageStore::new(messages);

    GradingEngine::new(&ctx)
        .run(&store, Some(gateway), &NoopReporter)
        .unwrap()
}

#[test]
fn three_weeks_of_exercises() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("drillgrade.db");

    {
        let mut gateway = SqliteGateway::open(&db).unwrap();
        let week1 = grade_week(0, &["KM6SO", "W7ABC", "K7XYZ"], vec![], &mut gateway);
        assert_eq!(week1.statistics.participants, 3);
        assert_eq!(week1.statistics.correct_messages, 3);
        assert!(week1.summaries.iter().all(|s| s.is_perfect()));

        let week2 = grade_week(1, &["KM6SO", "W7ABC"], vec![], &mut gateway);
        assert!(matches!(week2.persistence, PersistenceOutcome::Stored { .. }));
    }

    let mut gateway = SqliteGateway::open(&db).unwrap();

    // K7XYZ resubmits week one's exercise: acknowledged as late, not scored.
    let late = submission("K7XYZ", WEEKS[0].1, date(WEEKS[2].0));
    let week3 = grade_week(2, &["KM6SO"], vec![late], &mut gateway);
    assert_eq!(week3.statistics.participants, 1);
    assert_eq!(week3.statistics.acknowledgement_only, 1);
    let k7xyz = week3
        .acknowledgements
        .iter()
        .find(|a| a.from == "K7XYZ")
        .unwrap();
    assert_eq!(k7xyz.late, 1);
    assert_eq!(k7xyz.expected, 0);

    let files = drillgrade_report::write_all(&week3, dir.path()).unwrap();
    assert_eq!(files.len(), 5);
    let acks = std::fs::read_to_string(dir.path().join("acknowledgements.csv")).unwrap();
    assert!(acks.contains("K7XYZ"));

    let exercises = gateway.filtered_exercises(Some("Practice"), None).unwrap();
    assert_eq!(exercises.len(), 3);
    assert_eq!(exercises[0].date, date("2026-10-15"));

    let joins = gateway.users_history(&exercises).unwrap();
    assert_eq!(joins.len(), 3);

    let map = history_map(&exercises, &joins, 3);
    let calls = |kind: HistoryType| {
        map[&kind]
            .iter()
            .map(|j| j.user.call.as_str())
            .collect::<Vec<_>>()
    };
    assert_eq!(calls(HistoryType::HeavyHitter), vec!["KM6SO"]);
    assert_eq!(calls(HistoryType::AllOther), vec!["W7ABC"]);
    assert_eq!(calls(HistoryType::OneAndDone), vec!["K7XYZ"]);
    assert!(calls(HistoryType::FirstTime).is_empty());

    let missing = users_missing_exercises(&exercises, &joins, 3);
    let missing_calls: Vec<&str> = missing.iter().map(|j| j.user.call.as_str()).collect();
    assert_eq!(missing_calls, vec!["K7XYZ", "W7ABC"]);

    let recent_only = users_missing_exercises(&exercises, &joins, 1);
    assert_eq!(recent_only.len(), 1);
    assert_eq!(recent_only[0].user.call, "W7ABC");

    let messages = missed_messages(
        &missing,
        "ETO-PRACTICE",
        "We missed you!",
        "You missed #DATE#.\n#INSTRUCTIONS#",
        exercises[0].date,
        "Send an ICS-213 next week.",
    );
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].to, "K7XYZ");
    assert_eq!(
        messages[0].body,
        "You missed 2026-10-15.\nSend an ICS-213 next week."
    );
}

#[test]
fn regrading_a_week_keeps_results_but_reports_failure() {
    let dir = tempfile::tempdir().unwrap();
    let mut gateway = SqliteGateway::open(&dir.path().join("drillgrade.db")).unwrap();

    let first = grade_week(0, &["KM6SO"], vec![], &mut gateway);
    assert!(!first.persistence.is_failed());

    let second = grade_week(0, &["KM6SO"], vec![], &mut gateway);
    assert!(second.persistence.is_failed());
    assert_eq!(second.summaries.len(), 1);
    assert!(second.summary_text().contains("WARNING: results were not persisted"));

    let exercises = gateway.filtered_exercises(None, None).unwrap();
    assert_eq!(exercises.len(), 1);
}

#[test]
fn report_json_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let mut gateway = SqliteGateway::open_in_memory().unwrap();
    let report = grade_week(1, &["KM6SO", "W7ABC"], vec![], &mut gateway);

    let path = dir.path().join("report.json");
    report.save_json(&path).unwrap();
    let loaded = ExerciseReport::load_json(&path).unwrap();
    assert_eq!(loaded.id, report.id);
    assert_eq!(loaded.summaries.len(), 2);
    assert_eq!(loaded.statistics, report.statistics);
    assert_eq!(loaded.exercise.exercise_id, "week02bbbbbb");
}
