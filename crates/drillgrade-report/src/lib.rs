//! drillgrade-report: tabular and text outputs.
//!
//! Turns an `ExerciseReport` into the files delivery and mapping tools pick
//! up: per-form feedback, practice summaries, acknowledgements, outbound
//! messages and a plain-text dump of every reply.

pub mod csv;
pub mod text;

use std::path::{Path, PathBuf};

use anyhow::Result;

use drillgrade_core::acknowledgement::AckSummary;
use drillgrade_core::model::{format_date_time, FormType};
use drillgrade_core::report::ExerciseReport;
use drillgrade_core::results::{OutboundMessage, PracticeSummary};

pub const PRACTICE_SUMMARY_FILE: &str = "practice-summary.csv";
pub const ACKNOWLEDGEMENTS_FILE: &str = "acknowledgements.csv";
pub const OUTBOUND_FILE: &str = "outboundMessages.csv";
pub const ALL_FEEDBACK_FILE: &str = "allFeedback.txt";

pub fn feedback_file_name(form_type: FormType) -> String {
    format!("feedback-{form_type}.csv")
}

const FEEDBACK_HEADERS: [&str; 8] = [
    "From",
    "MessageId",
    "Date",
    "Latitude",
    "Longitude",
    "Feedback Count",
    "Feedback",
    "Submitted Values",
];

/// Feedback row with the submitted value behind each failed assertion.
fn feedback_row(summary: &PracticeSummary) -> Vec<String> {
    let (lat, lon) = match &summary.location {
        Some(l) => (l.latitude.to_string(), l.longitude.to_string()),
        None => (String::new(), String::new()),
    };
    let submitted = summary
        .explanations
        .iter()
        .filter(|e| !e.detail.is_empty())
        .map(|e| format!("{}: {}", e.text, e.detail))
        .collect::<Vec<_>>()
        .join("\n");
    vec![
        summary.from.clone(),
        summary.message_id.clone(),
        format_date_time(&summary.date_time),
        lat,
        lon,
        summary.feedback_count().to_string(),
        summary.feedback(),
        submitted,
    ]
}

pub fn write_feedback(summaries: &[PracticeSummary], path: &Path) -> Result<()> {
    csv::write_table(path, &FEEDBACK_HEADERS, summaries.iter().map(feedback_row))
}

pub fn write_practice_summaries(summaries: &[PracticeSummary], path: &Path) -> Result<()> {
    csv::write_table(
        path,
        &PracticeSummary::HEADERS,
        summaries.iter().map(PracticeSummary::row),
    )
}

pub fn write_acknowledgements(acks: &[AckSummary], path: &Path) -> Result<()> {
    csv::write_table(path, &AckSummary::HEADERS, acks.iter().map(AckSummary::row))
}

pub fn write_outbound(messages: &[OutboundMessage], path: &Path) -> Result<()> {
    csv::write_table(
        path,
        &OutboundMessage::HEADERS,
        messages.iter().map(OutboundMessage::row),
    )
}

/// Write every output file for a run into `dir`. Returns the paths written.
///
/// Outbound files are skipped when the run produced no outbound messages.
pub fn write_all(report: &ExerciseReport, dir: &Path) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    let path = dir.join(feedback_file_name(report.exercise.form_type));
    write_feedback(&report.summaries, &path)?;
    written.push(path);

    let path = dir.join(PRACTICE_SUMMARY_FILE);
    write_practice_summaries(&report.summaries, &path)?;
    written.push(path);

    let path = dir.join(ACKNOWLEDGEMENTS_FILE);
    write_acknowledgements(&report.acknowledgements, &path)?;
    written.push(path);

    if !report.outbound.is_empty() {
        let path = dir.join(OUTBOUND_FILE);
        write_outbound(&report.outbound, &path)?;
        written.push(path);

        let path = dir.join(ALL_FEEDBACK_FILE);
        text::write_all_feedback(&report.outbound, &path)?;
        written.push(path);
    }

    Ok(written)
}
