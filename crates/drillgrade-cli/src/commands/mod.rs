pub mod grade;
pub mod history;
pub mod init;
pub mod missed;
pub mod validate;

use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;

use drillgrade_core::config::{load_config_from, DrillgradeConfig};

/// Load config and apply a `--date` override, then resolve the exercise date.
fn load_with_date(
    config_path: Option<&Path>,
    date: Option<String>,
) -> Result<(DrillgradeConfig, NaiveDate)> {
    let mut config = load_config_from(config_path)?;
    if let Some(date) = date {
        config.exercise.date = date;
    }
    let today = chrono::Local::now().date_naive();
    let exercise_date = config
        .exercise_date(today)
        .context("cannot determine exercise date")?;
    Ok((config, exercise_date))
}
