//! The `drillgrade validate` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use drillgrade_core::classifier::extract_exercise_id;
use drillgrade_core::parser;

pub fn execute(
    date: Option<String>,
    reference: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let (config, exercise_date) = super::load_with_date(config_path.as_deref(), date)?;
    let marker = &config.classification.exercise_id_marker;
    let token_len = config.classification.exercise_id_length;

    let path = reference
        .unwrap_or_else(|| parser::reference_path(&config.paths.reference_root, exercise_date));
    anyhow::ensure!(path.is_file(), "reference file not found: {}", path.display());
    let message = parser::parse_reference_file(&path)
        .with_context(|| format!("failed to parse reference {}", path.display()))?;

    let exercise_id = extract_exercise_id(&message.plain_content, marker, token_len);
    println!(
        "Reference: {} ({}, exercise id '{}')",
        path.display(),
        message.form_type(),
        exercise_id
    );

    let mut warnings = parser::validate_reference(&message, marker, token_len);
    if let Some(expected) = &config.exercise.form_type {
        if expected.parse::<drillgrade_core::model::FormType>().ok() != Some(message.form_type()) {
            warnings.push(parser::ValidationWarning {
                field: Some("form".into()),
                message: format!(
                    "config expects form type '{expected}' but reference is {}",
                    message.form_type()
                ),
            });
        }
    }

    for w in &warnings {
        let prefix = w
            .field
            .as_ref()
            .map(|field| format!("  [{field}]"))
            .unwrap_or_else(|| "  ".to_string());
        println!("{prefix} WARNING: {}", w.message);
    }

    let instructions = parser::instructions_path(&config.paths.reference_root, exercise_date);
    if !instructions.is_file() {
        println!("  NOTE: no instructions file at {}", instructions.display());
    }

    if warnings.is_empty() {
        println!("Reference valid.");
    } else {
        println!("\n{} warning(s) found.", warnings.len());
    }

    Ok(())
}
