//! Configuration file loading.
//!
//! Search order when no explicit path is given:
//! 1. `drillgrade.toml` in the current directory
//! 2. `~/.config/drillgrade/config.toml`
//!
//! String values may reference environment variables as `${VAR_NAME}`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::acknowledgement::AckTexts;
use crate::classifier::{LocationPolicy, DEFAULT_EXERCISE_ID_LENGTH, DEFAULT_EXERCISE_ID_MARKER};
use crate::error::GradeError;
use crate::location::DEFAULT_JITTER_RADIUS_METERS;
use crate::model::parse_date_time;
use crate::scoring::DEFAULT_NUMERIC_TOLERANCE;

pub const CONFIG_FILE_NAME: &str = "drillgrade.toml";

/// Top-level drillgrade configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DrillgradeConfig {
    pub exercise: ExerciseConfig,
    pub paths: PathsConfig,
    pub classification: ClassificationConfig,
    pub scoring: ScoringConfig,
    pub location: LocationConfig,
    pub outbound: OutboundConfig,
    pub persistence: PersistenceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExerciseConfig {
    /// `yyyy-mm-dd` or one of `today`, `current`, `this`, `last`, `next`.
    pub date: String,
    /// Weekday the exercise is held on, used by `last` and `next`.
    pub weekday: Weekday,
    /// Weekday of the month skipped by `last` and `next` (e.g. 3 for the
    /// third Thursday, which hosts a different exercise).
    pub skip_ordinal: Option<u32>,
    /// Overrides the reference message's form type.
    pub form_type: Option<String>,
    /// `yyyy-mm-dd HH:MM`; defaults to five days before the exercise at 00:00.
    pub window_open: Option<String>,
    /// `yyyy-mm-dd HH:MM`; defaults to the day after the exercise at 08:00.
    pub window_close: Option<String>,
    pub kind: String,
    pub name: String,
    pub description: String,
}

impl Default for ExerciseConfig {
    fn default() -> Self {
        Self {
            date: "today".into(),
            weekday: Weekday::Thu,
            skip_ordinal: Some(3),
            form_type: None,
            window_open: None,
            window_close: None,
            kind: "Practice".into(),
            name: String::new(),
            description: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Root of the `<yyyy>/<date>/<date>-reference.json` tree.
    pub reference_root: PathBuf,
    /// JSON array of exported messages.
    pub messages: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            reference_root: PathBuf::from("reference"),
            messages: PathBuf::from("messages.json"),
            output_dir: PathBuf::from("drillgrade-output"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    pub location_policy: LocationPolicy,
    pub exercise_id_marker: String,
    pub exercise_id_length: usize,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            location_policy: LocationPolicy::default(),
            exercise_id_marker: DEFAULT_EXERCISE_ID_MARKER.into(),
            exercise_id_length: DEFAULT_EXERCISE_ID_LENGTH,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub tolerance: f64,
    pub subject_line_offset: usize,
    /// Address every message must be sent to; empty disables the check.
    pub required_address: String,
    pub forbidden_addresses: Vec<String>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_NUMERIC_TOLERANCE,
            subject_line_offset: 1,
            required_address: "ETO-PRACTICE@winlink.org".into(),
            forbidden_addresses: default_forbidden_addresses(),
        }
    }
}

fn default_forbidden_addresses() -> Vec<String> {
    let mut list: Vec<String> = (1..=10)
        .map(|n| format!("ETO-{n:02}@winlink.org"))
        .collect();
    list.extend(
        ["ETO-BK", "ETO-CAN", "ETO-DX"]
            .iter()
            .map(|s| format!("{s}@winlink.org")),
    );
    list
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    /// Replace missing or invalid sender locations with jittered ones.
    pub jitter: bool,
    pub radius_meters: f64,
    pub seed: u64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            jitter: true,
            radius_meters: DEFAULT_JITTER_RADIUS_METERS,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutboundConfig {
    pub enabled: bool,
    pub sender: String,
    /// The message id of the graded message is appended.
    pub subject: String,
    /// Appended to every outbound body.
    pub disclaimer: String,
    pub acknowledgements: AckTexts,
    pub missed_subject: String,
    /// Body for missed-exercise messages; `#DATE#` and `#INSTRUCTIONS#` are
    /// substituted.
    pub missed_template: String,
}

pub const DEFAULT_DISCLAIMER: &str = "\
----------------------------------------------------------------------------------------------

DISCLAIMER: This feedback is generated automatically by comparing your message
field by field with the exercise answer key. Differences in spelling, numbers or
missing values are reported even when a person would have understood you. Feel
free to reply to this message with questions or disagreements. Thank you for
taking part, and we hope to see you at the next exercise.
";

pub const DEFAULT_MISSED_TEMPLATE: &str = "\
We noticed that you missed the last regularly scheduled practice exercise on #DATE#.

Here are the instructions for the next practice exercise.
#INSTRUCTIONS#

We look forward to seeing your message addressed to ETO-PRACTICE!
";

impl Default for OutboundConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sender: "ETO-PRACTICE".into(),
            subject: "ETO Practice Exercise Feedback".into(),
            disclaimer: DEFAULT_DISCLAIMER.into(),
            acknowledgements: AckTexts::default(),
            missed_subject: "We missed you!".into(),
            missed_template: DEFAULT_MISSED_TEMPLATE.into(),
        }
    }
}

/// Storage backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    #[default]
    None,
    Memory,
    Sqlite { path: PathBuf },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub backend: BackendConfig,
    /// How many previous exercises count when looking for missed participants.
    pub miss_limit: usize,
    /// Participation count at which a user counts as a heavy hitter.
    pub heavy_hitter_threshold: usize,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::None,
            miss_limit: 3,
            heavy_hitter_threshold: 10,
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    let mut from = 0;
    while let Some(offset) = result[from..].find("${") {
        let start = from + offset;
        let Some(end) = result[start..].find('}') else {
            break;
        };
        let var_name = &result[start + 2..start + end];
        let value = std::env::var(var_name).unwrap_or_default();
        result = format!("{}{}{}", &result[..start], value, &result[start + end + 1..]);
        from = start + value.len();
    }
    result
}

fn resolve_path(p: &Path) -> PathBuf {
    PathBuf::from(resolve_env_vars(&p.to_string_lossy()))
}

impl DrillgradeConfig {
    fn resolve_env(&mut self) {
        self.exercise.date = resolve_env_vars(&self.exercise.date);
        self.paths.reference_root = resolve_path(&self.paths.reference_root);
        self.paths.messages = resolve_path(&self.paths.messages);
        self.paths.output_dir = resolve_path(&self.paths.output_dir);
        self.outbound.sender = resolve_env_vars(&self.outbound.sender);
        if let BackendConfig::Sqlite { path } = &mut self.persistence.backend {
            *path = resolve_path(path);
        }
    }

    /// The exercise date, with symbolic names resolved against `today`.
    pub fn exercise_date(&self, today: NaiveDate) -> Result<NaiveDate, GradeError> {
        resolve_exercise_date(
            &self.exercise.date,
            self.exercise.weekday,
            self.exercise.skip_ordinal,
            today,
        )
    }

    /// Acknowledgement window for `date`, honouring explicit overrides.
    pub fn window(&self, date: NaiveDate) -> Result<(NaiveDateTime, NaiveDateTime), GradeError> {
        let open = match &self.exercise.window_open {
            Some(s) => parse_window_bound("window_open", s)?,
            None => (date - Duration::days(5)).and_hms_opt(0, 0, 0).unwrap_or_default(),
        };
        let close = match &self.exercise.window_close {
            Some(s) => parse_window_bound("window_close", s)?,
            None => (date + Duration::days(1)).and_hms_opt(8, 0, 0).unwrap_or_default(),
        };
        if close < open {
            return Err(GradeError::config(format!(
                "window closes ({close}) before it opens ({open})"
            )));
        }
        Ok((open, close))
    }
}

fn parse_window_bound(name: &str, s: &str) -> Result<NaiveDateTime, GradeError> {
    parse_date_time(s)
        .ok_or_else(|| GradeError::config(format!("malformed {name}: '{s}' (want yyyy-mm-dd HH:MM)")))
}

/// 1-based occurrence of the date's weekday within its month.
fn ordinal_weekday(date: NaiveDate) -> u32 {
    (date.day() - 1) / 7 + 1
}

/// Resolve `yyyy-mm-dd` or a symbolic date.
///
/// `today`, `current` and `this` mean `today`. `last` and `next` step to the
/// previous or following `weekday`, skipping one more week when that date is
/// the `skip_ordinal` occurrence of the weekday in its month.
pub fn resolve_exercise_date(
    value: &str,
    weekday: Weekday,
    skip_ordinal: Option<u32>,
    today: NaiveDate,
) -> Result<NaiveDate, GradeError> {
    let value = value.trim().to_lowercase();
    let step = match value.as_str() {
        "today" | "current" | "this" => return Ok(today),
        "last" => -1,
        "next" => 1,
        _ => {
            return NaiveDate::parse_from_str(&value, "%Y-%m-%d").map_err(|_| {
                GradeError::config(format!("malformed exercise date: '{value}'"))
            })
        }
    };

    let mut date = today;
    loop {
        date += Duration::days(step);
        if date.weekday() == weekday {
            break;
        }
    }
    if skip_ordinal == Some(ordinal_weekday(date)) {
        date += Duration::weeks(step);
    }
    Ok(date)
}

/// Load configuration from the default search locations.
pub fn load_config() -> Result<DrillgradeConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<DrillgradeConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() {
                Some(local)
            } else {
                dirs_path()
                    .map(|home| home.join("config.toml"))
                    .filter(|global| global.exists())
            }
        }
    };

    let mut config = match config_path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config");
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<DrillgradeConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => DrillgradeConfig::default(),
    };

    config.resolve_env();
    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("drillgrade"))
}
