//! The `drillgrade history` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use comfy_table::{Cell, Table};

use drillgrade_core::config::load_config_from;
use drillgrade_core::history::history_map;

pub fn execute(
    kind: Option<String>,
    since: Option<String>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let since = since
        .map(|s| {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .with_context(|| format!("invalid --since date: '{s}'"))
        })
        .transpose()?;

    let gateway = drillgrade_store::create_gateway(&config.persistence.backend)?
        .context("persistence is disabled; configure [persistence.backend] to keep history")?;
    println!("Store: {}", gateway.health().content);

    let exercises = gateway.filtered_exercises(kind.as_deref(), since)?;
    if exercises.is_empty() {
        println!("No exercises stored.");
        return Ok(());
    }
    let joins = gateway.users_history(&exercises)?;
    let map = history_map(&exercises, &joins, config.persistence.heavy_hitter_threshold);

    println!(
        "{} exercise(s) from {} to {}, {} participant(s)",
        exercises.len(),
        exercises.last().map(|e| e.date).unwrap_or_default(),
        exercises[0].date,
        joins.len()
    );

    let mut table = Table::new();
    table.set_header(vec!["Category", "Count", "Calls"]);
    for (history_type, users) in &map {
        let calls: Vec<&str> = users.iter().map(|j| j.user.call.as_str()).collect();
        table.add_row(vec![
            Cell::new(history_type.label()),
            Cell::new(users.len()),
            Cell::new(calls.join(", ")),
        ]);
    }
    println!("\n{table}");

    Ok(())
}
