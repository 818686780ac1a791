//! Exercise report with JSON persistence and the plain-text run summary.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::acknowledgement::AckSummary;
use crate::persistence::Exercise;
use crate::results::{OutboundMessage, PracticeSummary};
use crate::scoring::ExerciseWindow;
use crate::statistics::{format_counter, format_pp, CounterMap, RunStatistics, CORRECT};

/// What happened when results were handed to persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PersistenceOutcome {
    Disabled,
    Stored { backend: String, content: String },
    Failed { backend: String, error: String },
}

impl PersistenceOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, PersistenceOutcome::Failed { .. })
    }
}

/// Everything a grading run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExerciseReport {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub exercise: Exercise,
    pub window: ExerciseWindow,
    pub summaries: Vec<PracticeSummary>,
    pub acknowledgements: Vec<AckSummary>,
    pub outbound: Vec<OutboundMessage>,
    pub counters: CounterMap,
    pub statistics: RunStatistics,
    /// Senders whose location was replaced by a synthetic one.
    pub jittered_senders: Vec<String>,
    pub persistence: PersistenceOutcome,
    pub duration_ms: u64,
}

impl ExerciseReport {
    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: ExerciseReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    /// Human-readable run summary.
    pub fn summary_text(&self) -> String {
        let stats = &self.statistics;
        let mut out = String::new();
        let _ = writeln!(
            out,
            "\n{} {} exercise on {}",
            self.exercise.form_type, self.exercise.kind, self.exercise.date
        );
        let _ = writeln!(out, "  Participants: {}", stats.participants);
        let _ = writeln!(
            out,
            "  Acknowledgement only: {}",
            stats.acknowledgement_only
        );
        out.push_str(&format_pp(
            "Correct Messages",
            stats.correct_messages,
            stats.scored_messages,
        ));

        let assertions: Vec<_> = self
            .counters
            .iter()
            .filter(|c| c.entries.iter().all(|(v, _)| v == CORRECT || v == "incorrect"))
            .collect();
        if !assertions.is_empty() {
            out.push_str("\nAssertions:\n");
            for counter in &assertions {
                out.push_str(&format_pp(
                    &counter.label,
                    counter.count(CORRECT) as usize,
                    counter.total() as usize,
                ));
            }
        }

        for counter in self.counters.iter().filter(|c| !assertions.contains(c)) {
            out.push_str(&format_counter(counter));
        }

        if self.persistence.is_failed() {
            out.push_str("\nWARNING: results were not persisted\n");
        }
        out
    }
}
