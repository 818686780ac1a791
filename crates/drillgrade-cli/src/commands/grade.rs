//! The `drillgrade grade` command.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use drillgrade_core::classifier::{AckEntry, Bucket};
use drillgrade_core::context::RunContext;
use drillgrade_core::engine::{GradingEngine, ProgressReporter};
use drillgrade_core::parser;
use drillgrade_core::report::{ExerciseReport, PersistenceOutcome};
use drillgrade_core::results::PracticeSummary;
use drillgrade_core::store::InMemoryMessageStore;

pub const REPORT_FILE: &str = "report.json";

/// Console progress reporter.
struct ConsoleReporter;

impl ProgressReporter for ConsoleReporter {
    fn on_sender_classified(&self, sender: &str, entry: &AckEntry) {
        eprintln!(
            "  Classified: {sender} expected {} unexpected {} early {} late {}",
            entry.count(Bucket::Expected),
            entry.count(Bucket::Unexpected),
            entry.count(Bucket::Early),
            entry.count(Bucket::Late),
        );
    }

    fn on_message_scored(&self, summary: &PracticeSummary) {
        let status = if summary.is_perfect() {
            "OK".to_string()
        } else {
            format!("{} issue(s)", summary.feedback_count())
        };
        eprintln!("  Scored: {} :: {} [{status}]", summary.from, summary.message_id);
    }

    fn on_run_complete(&self, senders: usize, scored: usize, elapsed: Duration) {
        eprintln!(
            "\nComplete: {senders} senders, {scored} messages scored ({:.1}s)",
            elapsed.as_secs_f64()
        );
    }
}

pub fn execute(
    date: Option<String>,
    messages: Option<PathBuf>,
    output: Option<PathBuf>,
    no_persist: bool,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let (config, exercise_date) = super::load_with_date(config_path.as_deref(), date)?;

    let ctx = RunContext::load(&config, exercise_date)
        .with_context(|| format!("cannot prepare exercise {exercise_date}"))?;

    let messages_path = messages.unwrap_or_else(|| config.paths.messages.clone());
    let store = InMemoryMessageStore::new(parser::load_messages(&messages_path)?);
    let output = output.unwrap_or_else(|| config.paths.output_dir.clone());

    let mut gateway = if no_persist {
        None
    } else {
        drillgrade_store::create_gateway(&config.persistence.backend)?
    };

    eprintln!(
        "drillgrade v{} - Grading {} exercise on {}: {} messages from {} senders",
        env!("CARGO_PKG_VERSION"),
        ctx.form_type,
        exercise_date,
        store.message_count(),
        store.sender_count(),
    );
    eprintln!();

    let engine = GradingEngine::new(&ctx);
    let report = match gateway.as_mut() {
        Some(gateway) => engine.run(&store, Some(&mut **gateway), &ConsoleReporter)?,
        None => engine.run(&store, None, &ConsoleReporter)?,
    };

    println!("{}", report.summary_text());
    print_summary(&report);

    std::fs::create_dir_all(&output)
        .with_context(|| format!("failed to create output directory {}", output.display()))?;
    tracing::debug!(dir = %output.display(), "writing outputs");
    let path = output.join(REPORT_FILE);
    report.save_json(&path)?;
    eprintln!("Results saved to: {}", path.display());
    for path in drillgrade_report::write_all(&report, &output)? {
        eprintln!("Wrote: {}", path.display());
    }

    Ok(())
}

fn print_summary(report: &ExerciseReport) {
    use comfy_table::{Cell, Table};

    let mut table = Table::new();
    table.set_header(vec!["From", "MessageId", "Feedback Count", "Feedback"]);
    for summary in &report.summaries {
        let feedback = summary.feedback();
        let first_line = feedback.lines().next().unwrap_or_default();
        table.add_row(vec![
            Cell::new(&summary.from),
            Cell::new(&summary.message_id),
            Cell::new(summary.feedback_count()),
            Cell::new(first_line),
        ]);
    }
    eprintln!("\n{table}");

    match &report.persistence {
        PersistenceOutcome::Disabled => eprintln!("Persistence: disabled"),
        PersistenceOutcome::Stored { backend, content } => {
            eprintln!("Persistence: {backend}: {content}")
        }
        PersistenceOutcome::Failed { backend, error } => {
            eprintln!("Persistence: {backend} FAILED: {error}")
        }
    }
}
