//! SQLite gateway.
//!
//! ## Tables
//!
//! - `exercises` - one row per graded exercise, unique by date and identifier
//! - `users` - one row per call sign
//! - `events` - one row per scored sender per exercise

use std::path::Path;

use chrono::NaiveDate;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use drillgrade_core::error::Result;
use drillgrade_core::model::{FormType, LatLong};
use drillgrade_core::persistence::{BulkInsertEntry, Exercise, JoinedUser, ReturnRecord, User};
use drillgrade_core::traits::PersistenceGateway;

use crate::error::StoreError;
use crate::{join_users, Participation};

/// Current schema version, kept in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i32 = 1;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS exercises (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    date        TEXT NOT NULL,
    kind        TEXT NOT NULL,
    exercise_id TEXT NOT NULL,
    form_type   TEXT NOT NULL,
    name        TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    UNIQUE (date, exercise_id)
);

CREATE TABLE IF NOT EXISTS users (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    call      TEXT NOT NULL UNIQUE,
    name      TEXT NOT NULL DEFAULT '',
    is_active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS events (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    exercise_id    INTEGER NOT NULL REFERENCES exercises(id),
    user_id        INTEGER NOT NULL REFERENCES users(id),
    latitude       REAL,
    longitude      REAL,
    feedback_count INTEGER NOT NULL,
    feedback       TEXT NOT NULL,
    metadata       TEXT NOT NULL DEFAULT '{}'
);

CREATE INDEX IF NOT EXISTS idx_events_exercise ON events(exercise_id);
CREATE INDEX IF NOT EXISTS idx_events_user ON events(user_id);
"#;

const EXERCISE_COLUMNS: &str = "id, date, kind, exercise_id, form_type, name, description";

/// SQLite-backed persistence.
pub struct SqliteGateway {
    conn: Connection,
}

impl SqliteGateway {
    /// Open or create the database at `path`.
    pub fn open(path: &Path) -> std::result::Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        info!("opening SQLite database at {}", path.display());
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> std::result::Result<Self, StoreError> {
        debug!("opening in-memory SQLite database");
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> std::result::Result<Self, StoreError> {
        let version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version < SCHEMA_VERSION {
            info!("creating database schema v{SCHEMA_VERSION}");
            conn.execute_batch(SCHEMA)?;
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        }
        Ok(Self { conn })
    }

    fn insert_batch(&mut self, entry: &BulkInsertEntry) -> std::result::Result<(i64, usize), StoreError> {
        let exercise = &entry.exercise;
        let tx = self.conn.transaction()?;

        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM exercises WHERE date = ?1 AND exercise_id = ?2",
                params![exercise.date.to_string(), exercise.exercise_id],
                |row| row.get(0),
            )
            .optional()?;
        if existing.is_some() {
            return Err(StoreError::Duplicate {
                exercise_id: exercise.exercise_id.clone(),
                date: exercise.date.to_string(),
            });
        }

        tx.execute(
            "INSERT INTO exercises (date, kind, exercise_id, form_type, name, description)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                exercise.date.to_string(),
                exercise.kind,
                exercise.exercise_id,
                exercise.form_type.to_string(),
                exercise.name,
                exercise.description,
            ],
        )?;
        let exercise_row = tx.last_insert_rowid();

        for event in &entry.events {
            let call = event.call.trim().to_uppercase();
            tx.execute(
                "INSERT INTO users (call) VALUES (?1) ON CONFLICT(call) DO NOTHING",
                params![call],
            )?;
            let user_id: i64 =
                tx.query_row("SELECT id FROM users WHERE call = ?1", params![call], |row| {
                    row.get(0)
                })?;
            tx.execute(
                "INSERT INTO events
                 (exercise_id, user_id, latitude, longitude, feedback_count, feedback, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    exercise_row,
                    user_id,
                    event.location.map(|l| l.latitude),
                    event.location.map(|l| l.longitude),
                    event.feedback_count as i64,
                    event.feedback,
                    event.metadata,
                ],
            )?;
        }

        tx.commit()?;
        Ok((exercise_row, entry.events.len()))
    }

    fn query_exercises(
        &self,
        kind: Option<&str>,
        since: Option<NaiveDate>,
    ) -> std::result::Result<Vec<Exercise>, StoreError> {
        let sql = format!(
            "SELECT {EXERCISE_COLUMNS} FROM exercises
             WHERE (?1 IS NULL OR kind = ?1) AND (?2 IS NULL OR date >= ?2)
             ORDER BY date DESC, id DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![kind, since.map(|d| d.to_string())], ExerciseRow::from_row)?;
        let exercises = rows
            .map(|r| r.map_err(StoreError::from).and_then(ExerciseRow::into_exercise))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(exercises)
    }

    fn query_participation(
        &self,
        exercises: &[Exercise],
    ) -> std::result::Result<Vec<Participation>, StoreError> {
        let ids: Vec<i64> = exercises.iter().map(|e| e.id).filter(|id| *id > 0).collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT u.id, u.call, u.name, u.is_active, e.exercise_id, e.latitude, e.longitude
             FROM events e JOIN users u ON u.id = e.user_id
             WHERE e.exercise_id IN ({placeholders})
             ORDER BY u.call, e.exercise_id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(ids.iter()), |row| {
            let latitude: Option<f64> = row.get(5)?;
            let longitude: Option<f64> = row.get(6)?;
            Ok(Participation {
                user: User {
                    id: row.get(0)?,
                    call: row.get(1)?,
                    name: row.get(2)?,
                    is_active: row.get(3)?,
                },
                exercise_id: row.get(4)?,
                location: latitude.zip(longitude).map(|(lat, lon)| LatLong::new(lat, lon)),
            })
        })?;
        let participation = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(participation)
    }

    fn counts(&self) -> std::result::Result<(i64, i64, i64), StoreError> {
        let count = |table: &str| -> rusqlite::Result<i64> {
            self.conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        };
        Ok((count("exercises")?, count("users")?, count("events")?))
    }
}

/// Raw `exercises` row before the typed fields are parsed.
struct ExerciseRow {
    id: i64,
    date: String,
    kind: String,
    exercise_id: String,
    form_type: String,
    name: String,
    description: String,
}

impl ExerciseRow {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            date: row.get("date")?,
            kind: row.get("kind")?,
            exercise_id: row.get("exercise_id")?,
            form_type: row.get("form_type")?,
            name: row.get("name")?,
            description: row.get("description")?,
        })
    }

    fn into_exercise(self) -> std::result::Result<Exercise, StoreError> {
        let date = NaiveDate::parse_from_str(&self.date, "%Y-%m-%d").map_err(|e| {
            StoreError::CorruptRow {
                table: "exercises",
                message: format!("bad date '{}': {e}", self.date),
            }
        })?;
        let form_type = self
            .form_type
            .parse::<FormType>()
            .map_err(|message| StoreError::CorruptRow {
                table: "exercises",
                message,
            })?;
        Ok(Exercise {
            id: self.id,
            date,
            kind: self.kind,
            exercise_id: self.exercise_id,
            form_type,
            name: self.name,
            description: self.description,
        })
    }
}

impl PersistenceGateway for SqliteGateway {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn health(&self) -> ReturnRecord {
        match self.counts() {
            Ok((exercises, users, events)) => ReturnRecord::ok(format!(
                "sqlite: {exercises} exercises, {users} users, {events} events"
            )),
            Err(e) => ReturnRecord::error(e.to_string()),
        }
    }

    fn bulk_insert(&mut self, entry: &BulkInsertEntry) -> ReturnRecord {
        match self.insert_batch(entry) {
            Ok((id, events)) => {
                debug!(exercise = id, events, "bulk insert committed");
                ReturnRecord::ok(format!("stored exercise {id} with {events} events"))
            }
            Err(e) => ReturnRecord::error(e.to_string()),
        }
    }

    fn filtered_exercises(
        &self,
        kind: Option<&str>,
        since: Option<NaiveDate>,
    ) -> Result<Vec<Exercise>> {
        Ok(self.query_exercises(kind, since)?)
    }

    fn users_history(&self, exercises: &[Exercise]) -> Result<Vec<JoinedUser>> {
        let rows = self.query_participation(exercises)?;
        Ok(join_users(rows, exercises))
    }
}

#[cfg(test)]
mod tests {
    use drillgrade_core::persistence::Event;

    use super::*;

    fn batch(date: &str, calls: &[(&str, Option<LatLong>)]) -> BulkInsertEntry {
        BulkInsertEntry {
            exercise: Exercise {
                id: 0,
                date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
                kind: "Practice".into(),
                exercise_id: format!("id{}", date.replace('-', "")),
                form_type: FormType::Ics205,
                name: "Weekly practice".into(),
                description: String::new(),
            },
            events: calls
                .iter()
                .map(|(call, location)| Event {
                    exercise_id: 0,
                    call: call.to_string(),
                    location: *location,
                    feedback_count: 1,
                    feedback: "Organization Name should be EOC".into(),
                    metadata: Event::metadata_for("M1"),
                })
                .collect(),
        }
    }

    #[test]
    fn batch_roundtrip() {
        let mut db = SqliteGateway::open_in_memory().unwrap();
        let here = Some(LatLong::new(47.5, -122.2));
        let record = db.bulk_insert(&batch("2026-10-08", &[("KM6SO", here), ("w7abc", None)]));
        assert!(record.is_ok(), "{}", record.content);
        db.bulk_insert(&batch("2026-10-15", &[("KM6SO", None)]));

        let exercises = db.filtered_exercises(None, None).unwrap();
        assert_eq!(exercises.len(), 2);
        assert_eq!(exercises[0].date.to_string(), "2026-10-15");
        assert_eq!(exercises[0].form_type, FormType::Ics205);
        assert_eq!(exercises[1].name, "Weekly practice");

        let history = db.users_history(&exercises).unwrap();
        assert_eq!(history.len(), 2);
        let km6so = &history[0];
        assert_eq!(km6so.user.call, "KM6SO");
        assert_eq!(km6so.exercises.len(), 2);
        assert_eq!(km6so.location, here);
        assert_eq!(history[1].user.call, "W7ABC");
        assert!(history[1].location.is_none());
    }

    #[test]
    fn duplicate_exercise_rolls_back() {
        let mut db = SqliteGateway::open_in_memory().unwrap();
        assert!(db.bulk_insert(&batch("2026-10-08", &[("KM6SO", None)])).is_ok());
        let record = db.bulk_insert(&batch("2026-10-08", &[("W7ABC", None)]));
        assert!(!record.is_ok());
        assert!(record.content.contains("already stored"));
        assert!(db.health().content.contains("1 events"));
    }

    #[test]
    fn history_limited_to_given_exercises() {
        let mut db = SqliteGateway::open_in_memory().unwrap();
        db.bulk_insert(&batch("2026-10-01", &[("OLD", None)]));
        db.bulk_insert(&batch("2026-10-15", &[("NEW", None)]));
        let since = NaiveDate::from_ymd_opt(2026, 10, 10);
        let recent = db.filtered_exercises(Some("Practice"), since).unwrap();
        assert_eq!(recent.len(), 1);
        let history = db.users_history(&recent).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].user.call, "NEW");
        assert!(db.users_history(&[]).unwrap().is_empty());
    }

    #[test]
    fn reopen_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drillgrade.db");
        {
            let mut db = SqliteGateway::open(&path).unwrap();
            db.bulk_insert(&batch("2026-10-15", &[("KM6SO", None)]));
        }
        let db = SqliteGateway::open(&path).unwrap();
        assert_eq!(db.filtered_exercises(None, None).unwrap().len(), 1);
    }
}
