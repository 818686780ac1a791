//! drillgrade-store: persistence gateways.
//!
//! Implements the `PersistenceGateway` trait over SQLite and over plain
//! in-process collections, and builds the configured one.

pub mod error;
pub mod memory;
pub mod sqlite;

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use drillgrade_core::config::BackendConfig;
use drillgrade_core::model::LatLong;
use drillgrade_core::persistence::{Exercise, JoinedUser, User};
use drillgrade_core::traits::PersistenceGateway;

pub use error::StoreError;
pub use memory::MemoryGateway;
pub use sqlite::SqliteGateway;

/// Create the gateway for a backend configuration. `None` means results are
/// not persisted.
pub fn create_gateway(config: &BackendConfig) -> Result<Option<Box<dyn PersistenceGateway>>> {
    match config {
        BackendConfig::None => Ok(None),
        BackendConfig::Memory => Ok(Some(Box::new(MemoryGateway::new()))),
        BackendConfig::Sqlite { path } => {
            let gateway = SqliteGateway::open(path)
                .with_context(|| format!("failed to open database {}", path.display()))?;
            Ok(Some(Box::new(gateway)))
        }
    }
}

/// One participation row: who, in which stored exercise, from where.
pub(crate) struct Participation {
    pub user: User,
    pub exercise_id: i64,
    pub location: Option<LatLong>,
}

/// Group participation rows into [`JoinedUser`]s, ordered by call sign.
///
/// Each user's exercises are most recent first and their location is the
/// one from their most recent exercise that had one.
pub(crate) fn join_users(
    rows: impl IntoIterator<Item = Participation>,
    exercises: &[Exercise],
) -> Vec<JoinedUser> {
    let by_id: BTreeMap<i64, &Exercise> = exercises.iter().map(|e| (e.id, e)).collect();
    let mut grouped: BTreeMap<String, (User, Vec<(&Exercise, Option<LatLong>)>)> = BTreeMap::new();

    for row in rows {
        let Some(exercise) = by_id.get(&row.exercise_id) else {
            continue;
        };
        let slot = grouped
            .entry(row.user.call.clone())
            .or_insert_with(|| (row.user.clone(), Vec::new()));
        if !slot.1.iter().any(|(e, _)| e.id == exercise.id) {
            slot.1.push((exercise, row.location));
        }
    }

    grouped
        .into_values()
        .map(|(user, mut joined)| {
            joined.sort_by(|a, b| b.0.date.cmp(&a.0.date).then(b.0.id.cmp(&a.0.id)));
            let location = joined.iter().find_map(|(_, l)| *l);
            JoinedUser {
                user,
                location,
                exercises: joined.into_iter().map(|(e, _)| e.clone()).collect(),
            }
        })
        .collect()
}
