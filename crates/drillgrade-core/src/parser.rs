//! Loaders for exported messages and the reference tree.
//!
//! The reference root holds one directory per exercise:
//! `<root>/<yyyy>/<yyyy-mm-dd>/<yyyy-mm-dd>-reference.json`, with an optional
//! `<yyyy-mm-dd>-instructions.txt` beside it.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{Datelike, NaiveDate};

use crate::classifier::{extract_exercise_id, ReferenceEntry, ReferenceIndex};
use crate::error::{GradeError, Result};
use crate::model::{is_usable_location, ExportedMessage, FormData, FormType};

const REFERENCE_SUFFIX: &str = "-reference.json";
const INSTRUCTIONS_SUFFIX: &str = "-instructions.txt";

/// Load a JSON array of exported messages.
pub fn load_messages(path: &Path) -> anyhow::Result<Vec<ExportedMessage>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read messages: {}", path.display()))?;
    let messages: Vec<ExportedMessage> = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse messages: {}", path.display()))?;
    tracing::debug!(count = messages.len(), path = %path.display(), "loaded messages");
    Ok(messages)
}

fn exercise_dir(root: &Path, date: NaiveDate) -> PathBuf {
    root.join(date.year().to_string()).join(date.to_string())
}

pub fn reference_path(root: &Path, date: NaiveDate) -> PathBuf {
    exercise_dir(root, date).join(format!("{date}{REFERENCE_SUFFIX}"))
}

pub fn instructions_path(root: &Path, date: NaiveDate) -> PathBuf {
    exercise_dir(root, date).join(format!("{date}{INSTRUCTIONS_SUFFIX}"))
}

/// Parse one reference message file.
pub fn parse_reference_file(path: &Path) -> Result<ExportedMessage> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Load the reference message for `date`. A missing file is fatal.
pub fn load_reference_message(root: &Path, date: NaiveDate) -> Result<ExportedMessage> {
    let path = reference_path(root, date);
    if !path.is_file() {
        return Err(GradeError::MissingReference { path });
    }
    let message = parse_reference_file(&path).map_err(|e| {
        GradeError::Configuration(format!("bad reference file {}: {e}", path.display()))
    })?;
    tracing::debug!(path = %path.display(), form_type = %message.form_type(), "loaded reference");
    Ok(message)
}

/// Instructions for the next exercise, or an empty string when absent.
pub fn load_instructions(root: &Path, date: NaiveDate) -> Result<String> {
    let path = instructions_path(root, date);
    if !path.is_file() {
        tracing::debug!(path = %path.display(), "no instructions file");
        return Ok(String::new());
    }
    Ok(std::fs::read_to_string(path)?)
}

fn reference_date(path: &Path) -> Option<NaiveDate> {
    let name = path.file_name()?.to_str()?;
    let stem = name.strip_suffix(REFERENCE_SUFFIX)?;
    NaiveDate::parse_from_str(stem, "%Y-%m-%d").ok()
}

fn collect_reference_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_reference_files(&path, files)?;
        } else if reference_date(&path).is_some() {
            files.push(path);
        }
    }
    Ok(())
}

/// Scan every reference file under `root` into an identifier index.
///
/// Files that fail to parse or carry no identifier are skipped with a warning.
pub fn build_reference_index(root: &Path, marker: &str, token_len: usize) -> Result<ReferenceIndex> {
    if !root.is_dir() {
        return Err(GradeError::config(format!(
            "reference root is not a directory: {}",
            root.display()
        )));
    }

    let mut files = Vec::new();
    collect_reference_files(root, &mut files)?;
    files.sort();

    let mut index = ReferenceIndex::new();
    for path in files {
        let Some(date) = reference_date(&path) else {
            continue;
        };
        let message = match parse_reference_file(&path) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!("skipping {}: {}", path.display(), e);
                continue;
            }
        };
        let exercise_id = extract_exercise_id(&message.plain_content, marker, token_len);
        if exercise_id.is_empty() {
            tracing::warn!("skipping {}: no exercise id", path.display());
            continue;
        }
        index.insert(
            exercise_id,
            ReferenceEntry {
                date,
                form_type: message.form_type(),
            },
        );
    }
    tracing::debug!(count = index.len(), root = %root.display(), "built reference index");
    Ok(index)
}

/// A warning from reference validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The offending field (if applicable).
    pub field: Option<String>,
    pub message: String,
}

impl ValidationWarning {
    fn new(field: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            field: field.map(str::to_string),
            message: message.into(),
        }
    }
}

fn is_number(s: &str) -> bool {
    s.trim().parse::<f64>().is_ok_and(f64::is_finite)
}

/// Check a reference message for problems that would abort or skew a run.
pub fn validate_reference(
    message: &ExportedMessage,
    marker: &str,
    token_len: usize,
) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if extract_exercise_id(&message.plain_content, marker, token_len).is_empty() {
        warnings.push(ValidationWarning::new(
            Some("plain_content"),
            format!("no exercise id after marker '{marker}'"),
        ));
    }
    if message.form_type() == FormType::Plain {
        warnings.push(ValidationWarning::new(
            Some("form"),
            "reference is not a gradable form",
        ));
    }
    if message.subject.trim().is_empty() {
        warnings.push(ValidationWarning::new(Some("subject"), "subject is empty"));
    }

    match &message.form {
        FormData::Ics205(form) => {
            for (i, entry) in form.radio_entries.iter().enumerate() {
                if entry.is_empty() {
                    continue;
                }
                let line = i + 1;
                let numeric = [
                    ("rx_frequency", &entry.rx_frequency, true),
                    ("rx_tone", &entry.rx_tone, false),
                    ("tx_frequency", &entry.tx_frequency, false),
                    ("tx_tone", &entry.tx_tone, false),
                ];
                for (field, value, required) in numeric {
                    let blank = value.trim().is_empty();
                    if (required && blank) || (!blank && !is_number(value)) {
                        warnings.push(ValidationWarning::new(
                            Some(field),
                            format!("line {line}: '{value}' is not a number"),
                        ));
                    }
                }
            }
        }
        FormData::FieldSituation(form) => {
            if !is_usable_location(form.form_location.as_ref()) {
                warnings.push(ValidationWarning::new(
                    Some("form_location"),
                    "reference form location is missing or invalid",
                ));
            }
        }
        FormData::Ics213Rr(form) => {
            if form.line_items.iter().all(|item| item.is_empty()) {
                warnings.push(ValidationWarning::new(
                    Some("line_items"),
                    "no resource line items",
                ));
            }
        }
        _ => {}
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::DEFAULT_EXERCISE_ID_MARKER;

    fn reference_json(form_type: &str, exercise_id: &str) -> String {
        format!(
            r#"{{
                "message_id": "REF1",
                "from": "ETO-PRACTICE",
                "subject": "ETO Practice",
                "msg_date_time": "2026-10-15T00:00:00",
                "plain_content": "Exercise Id: {exercise_id}\nSend an ICS-213",
                "form": {{ "form_type": "{form_type}" }}
            }}"#
        )
    }

    fn write_reference(root: &Path, date: &str, body: &str) {
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
        let path = reference_path(root, date);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    #[test]
    fn reference_layout() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 15).unwrap();
        assert_eq!(
            reference_path(Path::new("/refs"), date),
            PathBuf::from("/refs/2026/2026-10-15/2026-10-15-reference.json")
        );
    }

    #[test]
    fn missing_reference_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 10, 15).unwrap();
        let err = load_reference_message(dir.path(), date).unwrap_err();
        assert!(matches!(err, GradeError::MissingReference { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn index_covers_all_reference_files() {
        let dir = tempfile::tempdir().unwrap();
        write_reference(dir.path(), "2026-10-08", &reference_json("ics_205", "AAAAAAAAAAAA"));
        write_reference(dir.path(), "2026-10-15", &reference_json("ics_213", "BBBBBBBBBBBB"));
        write_reference(dir.path(), "2026-10-22", "not json");

        let index = build_reference_index(dir.path(), DEFAULT_EXERCISE_ID_MARKER, 12).unwrap();
        assert_eq!(index.len(), 2);
        let entry = index.get("aaaaaaaaaaaa").unwrap();
        assert_eq!(entry.form_type, FormType::Ics205);
        assert_eq!(entry.date, NaiveDate::from_ymd_opt(2026, 10, 8).unwrap());
    }

    #[test]
    fn instructions_default_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 10, 15).unwrap();
        assert_eq!(load_instructions(dir.path(), date).unwrap(), "");

        let path = instructions_path(dir.path(), date);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "Send an ICS-205 next week.\n").unwrap();
        assert_eq!(
            load_instructions(dir.path(), date).unwrap(),
            "Send an ICS-205 next week.\n"
        );
    }

    #[test]
    fn load_messages_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("messages.json");
        std::fs::write(&path, format!("[{}]", reference_json("ics_213", "X"))).unwrap();
        assert_eq!(load_messages(&path).unwrap().len(), 1);
        std::fs::write(&path, "{").unwrap();
        assert!(load_messages(&path).is_err());
    }

    #[test]
    fn validation_flags_missing_marker_and_bad_frequency() {
        let mut message: ExportedMessage =
            serde_json::from_str(&reference_json("ics_205", "CCCCCCCCCCCC")).unwrap();
        message.plain_content = "no marker here".into();
        if let FormData::Ics205(form) = &mut message.form {
            form.radio_entries.push(crate::model::RadioEntry {
                channel_number: "1".into(),
                rx_frequency: "TBD".into(),
                ..Default::default()
            });
        }
        let warnings = validate_reference(&message, DEFAULT_EXERCISE_ID_MARKER, 12);
        assert!(warnings.iter().any(|w| w.field.as_deref() == Some("plain_content")));
        assert!(warnings.iter().any(|w| w.field.as_deref() == Some("rx_frequency")));
    }
}
