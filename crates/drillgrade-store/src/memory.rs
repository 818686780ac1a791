//! In-memory gateway for tests and dry runs.

use chrono::NaiveDate;
use drillgrade_core::error::Result;
use drillgrade_core::persistence::{
    BulkInsertEntry, Event, Exercise, JoinedUser, ReturnRecord, User,
};
use drillgrade_core::traits::PersistenceGateway;

use crate::{join_users, Participation};

/// Keeps everything in process memory. Contents vanish with the value.
#[derive(Debug, Default)]
pub struct MemoryGateway {
    exercises: Vec<Exercise>,
    users: Vec<User>,
    events: Vec<(i64, Event)>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exercises(&self) -> &[Exercise] {
        &self.exercises
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    fn user_id(&mut self, call: &str) -> i64 {
        let call = call.trim().to_uppercase();
        if let Some(user) = self.users.iter().find(|u| u.call == call) {
            return user.id;
        }
        let id = self.users.len() as i64 + 1;
        self.users.push(User {
            id,
            call,
            name: String::new(),
            is_active: true,
        });
        id
    }
}

impl PersistenceGateway for MemoryGateway {
    fn name(&self) -> &str {
        "memory"
    }

    fn health(&self) -> ReturnRecord {
        ReturnRecord::ok(format!(
            "memory: {} exercises, {} users, {} events",
            self.exercises.len(),
            self.users.len(),
            self.events.len()
        ))
    }

    fn bulk_insert(&mut self, entry: &BulkInsertEntry) -> ReturnRecord {
        let exercise = &entry.exercise;
        if self.exercises.iter().any(|e| {
            e.date == exercise.date && e.exercise_id.eq_ignore_ascii_case(&exercise.exercise_id)
        }) {
            return ReturnRecord::error(format!(
                "exercise {} on {} already stored",
                exercise.exercise_id, exercise.date
            ));
        }

        let id = self.exercises.len() as i64 + 1;
        self.exercises.push(Exercise {
            id,
            ..exercise.clone()
        });
        for event in &entry.events {
            let user_id = self.user_id(&event.call);
            self.events.push((
                user_id,
                Event {
                    exercise_id: id,
                    ..event.clone()
                },
            ));
        }
        ReturnRecord::ok(format!(
            "stored exercise {id} with {} events",
            entry.events.len()
        ))
    }

    fn filtered_exercises(
        &self,
        kind: Option<&str>,
        since: Option<NaiveDate>,
    ) -> Result<Vec<Exercise>> {
        let mut exercises: Vec<Exercise> = self
            .exercises
            .iter()
            .filter(|e| kind.map_or(true, |k| e.kind == k))
            .filter(|e| since.map_or(true, |d| e.date >= d))
            .cloned()
            .collect();
        exercises.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
        Ok(exercises)
    }

    fn users_history(&self, exercises: &[Exercise]) -> Result<Vec<JoinedUser>> {
        let rows = self.events.iter().filter_map(|(user_id, event)| {
            let user = self.users.iter().find(|u| u.id == *user_id)?;
            Some(Participation {
                user: user.clone(),
                exercise_id: event.exercise_id,
                location: event.location,
            })
        });
        Ok(join_users(rows, exercises))
    }
}

#[cfg(test)]
mod tests {
    use drillgrade_core::model::{FormType, LatLong};

    use super::*;

    fn batch(date: &str, calls: &[&str]) -> BulkInsertEntry {
        BulkInsertEntry {
            exercise: Exercise {
                id: 0,
                date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
                kind: "Practice".into(),
                exercise_id: format!("id{}", date.replace('-', "")),
                form_type: FormType::Ics213,
                name: String::new(),
                description: String::new(),
            },
            events: calls
                .iter()
                .map(|call| Event {
                    exercise_id: 0,
                    call: call.to_string(),
                    location: Some(LatLong::new(47.5, -122.2)),
                    feedback_count: 0,
                    feedback: "Perfect Message!".into(),
                    metadata: Event::metadata_for("M1"),
                })
                .collect(),
        }
    }

    #[test]
    fn insert_and_query_history() {
        let mut gateway = MemoryGateway::new();
        assert!(gateway.bulk_insert(&batch("2026-10-08", &["KM6SO", "W7ABC"])).is_ok());
        assert!(gateway.bulk_insert(&batch("2026-10-15", &["km6so"])).is_ok());

        let exercises = gateway.filtered_exercises(Some("Practice"), None).unwrap();
        assert_eq!(exercises.len(), 2);
        assert_eq!(exercises[0].date.to_string(), "2026-10-15");

        let history = gateway.users_history(&exercises).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].user.call, "KM6SO");
        assert_eq!(history[0].exercises.len(), 2);
        assert_eq!(history[1].exercises.len(), 1);
    }

    #[test]
    fn duplicate_exercise_is_rejected() {
        let mut gateway = MemoryGateway::new();
        assert!(gateway.bulk_insert(&batch("2026-10-08", &["KM6SO"])).is_ok());
        let record = gateway.bulk_insert(&batch("2026-10-08", &["KM6SO"]));
        assert!(!record.is_ok());
        assert_eq!(gateway.event_count(), 1);
    }

    #[test]
    fn since_filter() {
        let mut gateway = MemoryGateway::new();
        gateway.bulk_insert(&batch("2026-10-01", &["KM6SO"]));
        gateway.bulk_insert(&batch("2026-10-15", &["KM6SO"]));
        let since = NaiveDate::from_ymd_opt(2026, 10, 10);
        let exercises = gateway.filtered_exercises(None, since).unwrap();
        assert_eq!(exercises.len(), 1);
        assert!(gateway.filtered_exercises(Some("Drill"), None).unwrap().is_empty());
    }
}
