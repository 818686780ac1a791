//! The `drillgrade missed` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use drillgrade_core::history::{missed_messages, users_missing_exercises};
use drillgrade_core::parser;

pub fn execute(
    date: Option<String>,
    output: PathBuf,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let (config, next_date) = super::load_with_date(config_path.as_deref(), date)?;

    let gateway = drillgrade_store::create_gateway(&config.persistence.backend)?
        .context("persistence is disabled; configure [persistence.backend] to find missed participants")?;

    let exercises = gateway.filtered_exercises(Some(config.exercise.kind.as_str()), None)?;
    let Some(latest) = exercises.first() else {
        println!("No {} exercises stored.", config.exercise.kind);
        return Ok(());
    };
    let joins = gateway.users_history(&exercises)?;
    let missing = users_missing_exercises(&exercises, &joins, config.persistence.miss_limit);

    let instructions = parser::load_instructions(&config.paths.reference_root, next_date)?;
    if instructions.is_empty() {
        eprintln!("Warning: no instructions found for {next_date}");
    }

    let messages = missed_messages(
        &missing,
        &config.outbound.sender,
        &config.outbound.missed_subject,
        &config.outbound.missed_template,
        latest.date,
        &instructions,
    );

    println!(
        "{} participant(s) missed the exercise on {} (checked {} previous)",
        messages.len(),
        latest.date,
        config.persistence.miss_limit
    );
    for message in &messages {
        println!("  {}", message.to);
    }

    if !messages.is_empty() {
        drillgrade_report::write_outbound(&messages, &output)?;
        println!("Wrote: {}", output.display());
    }

    Ok(())
}
