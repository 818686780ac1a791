//! Run-wide counters and summary statistics.
//!
//! A [`Counter`] is a label → value histogram. Labels and values both keep
//! insertion order so reports iterate deterministically; the descending-count
//! view used by the run summary is computed on demand.

use std::collections::HashMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

/// Tally value used for passing assertions.
pub const CORRECT: &str = "correct";
/// Tally value used for failing assertions.
pub const INCORRECT: &str = "incorrect";

/// Histogram of values observed for one label.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Counter {
    pub label: String,
    /// `(value, count)` in first-seen order.
    pub entries: Vec<(String, u64)>,
}

impl Counter {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            entries: Vec::new(),
        }
    }

    pub fn increment(&mut self, value: impl ToString) {
        let value = value.to_string();
        match self.entries.iter_mut().find(|(v, _)| *v == value) {
            Some((_, count)) => *count += 1,
            None => self.entries.push((value, 1)),
        }
    }

    pub fn count(&self, value: &str) -> u64 {
        self.entries
            .iter()
            .find(|(v, _)| v == value)
            .map(|(_, c)| *c)
            .unwrap_or(0)
    }

    /// Number of increments across all values.
    pub fn total(&self) -> u64 {
        self.entries.iter().map(|(_, c)| c).sum()
    }

    /// Entries ordered by descending count; ties keep first-seen order.
    pub fn descending(&self) -> Vec<(&str, u64)> {
        let mut sorted: Vec<(&str, u64)> =
            self.entries.iter().map(|(v, c)| (v.as_str(), *c)).collect();
        sorted.sort_by(|a, b| b.1.cmp(&a.1));
        sorted
    }
}

/// Insertion-ordered collection of counters keyed by label.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CounterMap {
    counters: Vec<Counter>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl CounterMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the counter for `label`, creating it if needed.
    pub fn counter(&mut self, label: &str) -> &mut Counter {
        if self.index.len() != self.counters.len() {
            self.reindex();
        }
        let idx = match self.index.get(label) {
            Some(&i) => i,
            None => {
                self.counters.push(Counter::new(label));
                let i = self.counters.len() - 1;
                self.index.insert(label.to_string(), i);
                i
            }
        };
        &mut self.counters[idx]
    }

    pub fn increment(&mut self, label: &str, value: impl ToString) {
        self.counter(label).increment(value);
    }

    /// Record a pass/fail tally for `label`.
    pub fn tally(&mut self, label: &str, ok: bool) {
        self.increment(label, if ok { CORRECT } else { INCORRECT });
    }

    pub fn get(&self, label: &str) -> Option<&Counter> {
        self.counters.iter().find(|c| c.label == label)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Counter> {
        self.counters.iter()
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    // The index is not serialized, so rebuild it after deserialization.
    fn reindex(&mut self) {
        self.index = self
            .counters
            .iter()
            .enumerate()
            .map(|(i, c)| (c.label.clone(), i))
            .collect();
    }
}

/// Correct-message ratio for a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RunStatistics {
    /// Senders who sent a graded message.
    pub participants: usize,
    /// Messages that were scored.
    pub scored_messages: usize,
    /// Scored messages with no explanations.
    pub correct_messages: usize,
    /// Senders who only sent unexpected, early or late messages.
    pub acknowledgement_only: usize,
}

impl RunStatistics {
    pub fn correct_ratio(&self) -> f64 {
        if self.scored_messages == 0 {
            0.0
        } else {
            self.correct_messages as f64 / self.scored_messages as f64
        }
    }
}

pub fn format_percent(ratio: f64) -> String {
    format!("{:.2}%", ratio * 100.0)
}

/// `"  label: 3(75.00%) ok, 1(25.00%) not ok"`
pub fn format_pp(label: &str, ok_count: usize, total: usize) -> String {
    let not_ok = total.saturating_sub(ok_count);
    let ok_ratio = if total == 0 {
        0.0
    } else {
        ok_count as f64 / total as f64
    };
    let not_ok_ratio = if total == 0 { 0.0 } else { 1.0 - ok_ratio };
    format!(
        "  {label}: {ok_count}({}) ok, {not_ok}({}) not ok\n",
        format_percent(ok_ratio),
        format_percent(not_ok_ratio)
    )
}

/// Render one counter as a histogram block, highest counts first.
pub fn format_counter(counter: &Counter) -> String {
    let mut out = format!("\n{}:\n", counter.label);
    for (value, count) in counter.descending() {
        let _ = writeln!(out, " value: {value}, count: {count}");
    }
    out
}
