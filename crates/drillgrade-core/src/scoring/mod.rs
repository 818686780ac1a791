//! Field-level scoring of a submitted form against its reference message.
//!
//! [`Grader`] holds the assertion vocabulary shared by every form type; each
//! assertion tallies pass/fail into the run-wide counters and appends an
//! [`Explanation`] only when it fails. [`FormScorer`] implementations hold
//! the per-form rule sets, and [`ScoringEngine`] wraps them with the checks
//! common to every message and the "Perfect Message!" result policy.

pub mod field_situation;
pub mod hics259;
pub mod ics205;
pub mod ics213;
pub mod ics213_rr;

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{GradeError, Result};
use crate::model::{
    format_date_time, is_usable_location, ExportedMessage, FormData, FormType, LatLong,
    ServiceReport,
};
use crate::statistics::CounterMap;

/// Feedback text for a message with no failed assertions.
pub const PERFECT_MESSAGE: &str = "Perfect Message!";

/// Placeholder replaced by the expected value in assertion labels.
pub const EXPECTED_VALUE_TOKEN: &str = "#EV";

/// Histogram of explanations per scored message.
pub const FEEDBACK_COUNT_LABEL: &str = "Feedback Count";
/// Histogram of whole days between window open and message time.
pub const DAYS_AFTER_OPEN_LABEL: &str = "Message sent days after window opens";

/// Default tolerance for numeric comparisons.
pub const DEFAULT_NUMERIC_TOLERANCE: f64 = 0.0001;

/// One failed assertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    /// Assertion label as written in the rule, e.g. `"Organization Name should be #EV"`.
    pub label: String,
    pub passed: bool,
    /// Rendered text with the line prefix applied and `#EV` substituted.
    pub text: String,
    /// What was submitted, when useful.
    pub detail: String,
}

impl fmt::Display for Explanation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// The acknowledgement window for an exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseWindow {
    pub open: NaiveDateTime,
    pub close: NaiveDateTime,
}

/// Assertion vocabulary plus the run-wide pass/fail tallies.
#[derive(Debug, Clone)]
pub struct Grader {
    explanations: Vec<Explanation>,
    prefix: String,
    counters: CounterMap,
    window: ExerciseWindow,
    tolerance: f64,
    line_offset: usize,
}

impl Grader {
    pub fn new(window: ExerciseWindow) -> Self {
        Self {
            explanations: Vec::new(),
            prefix: String::new(),
            counters: CounterMap::new(),
            window,
            tolerance: DEFAULT_NUMERIC_TOLERANCE,
            line_offset: 1,
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_line_offset(mut self, line_offset: usize) -> Self {
        self.line_offset = line_offset;
        self
    }

    /// Start a new message: drop explanations and any line prefix.
    pub fn reset(&mut self) {
        self.explanations.clear();
        self.prefix.clear();
    }

    /// Prefix applied to explanations until cleared, e.g. `"(line 2) "`.
    pub fn set_prefix(&mut self, prefix: impl Into<String>) {
        self.prefix = prefix.into();
    }

    pub fn clear_prefix(&mut self) {
        self.prefix.clear();
    }

    pub fn window(&self) -> ExerciseWindow {
        self.window
    }

    pub fn explanations(&self) -> &[Explanation] {
        &self.explanations
    }

    pub fn take_explanations(&mut self) -> Vec<Explanation> {
        std::mem::take(&mut self.explanations)
    }

    pub fn counters(&self) -> &CounterMap {
        &self.counters
    }

    pub fn counters_mut(&mut self) -> &mut CounterMap {
        &mut self.counters
    }

    fn record(&mut self, label: &str, expected: &str, ok: bool, detail: String) -> bool {
        self.counters.tally(label, ok);
        if !ok {
            let text = format!(
                "{}{}",
                self.prefix,
                label.replace(EXPECTED_VALUE_TOKEN, expected)
            );
            self.explanations.push(Explanation {
                label: label.to_string(),
                passed: false,
                text,
                detail,
            });
        }
        ok
    }

    /// Generic predicate.
    pub fn check(&mut self, label: &str, ok: bool, detail: impl Into<String>) -> bool {
        self.record(label, "", ok, detail.into())
    }

    /// Exact string equality.
    pub fn equals(&mut self, label: &str, expected: &str, actual: &str) -> bool {
        self.record(label, expected, expected == actual, actual.to_string())
    }

    /// The submitted value must be non-empty.
    pub fn present(&mut self, label: &str, actual: &str) -> bool {
        self.record(label, "", !actual.trim().is_empty(), actual.to_string())
    }

    /// The submitted value must be empty.
    pub fn empty(&mut self, label: &str, actual: &str) -> bool {
        self.record(label, "", actual.trim().is_empty(), actual.to_string())
    }

    /// Equality when the reference has a value, emptiness otherwise.
    pub fn equals_or_empty(&mut self, what: &str, expected: &str, actual: &str) -> bool {
        if expected.trim().is_empty() {
            self.empty(&format!("{what} should be empty"), actual)
        } else {
            self.equals(&format!("{what} should be {EXPECTED_VALUE_TOKEN}"), expected, actual)
        }
    }

    pub fn starts_with(&mut self, label: &str, expected: &str, actual: &str) -> bool {
        self.record(label, expected, actual.starts_with(expected), actual.to_string())
    }

    /// Compare text that a mail client may have wrapped across lines.
    pub fn multi_line_equals(&mut self, label: &str, expected: &str, actual: &str) -> bool {
        let ok = multi_line_match(expected, actual, self.line_offset);
        self.record(label, expected, ok, actual.to_string())
    }

    /// Numeric comparison with tolerance on string fields.
    ///
    /// An unparsable reference value is a configuration bug and fails the
    /// run; an unparsable submitted value simply fails the assertion.
    pub fn numeric(&mut self, label: &str, expected: &str, actual: &str) -> Result<bool> {
        let reference = parse_number(expected).ok_or_else(|| GradeError::ReferenceParse {
            field: label.to_string(),
            expected: "number",
            value: expected.to_string(),
        })?;
        Ok(self.numeric_value(label, reference, parse_number(actual), actual))
    }

    /// Numeric comparison when the expected value is already a number.
    pub fn numeric_value(
        &mut self,
        label: &str,
        expected: f64,
        actual: Option<f64>,
        detail: &str,
    ) -> bool {
        let ok = matches!(actual, Some(a) if (a - expected).abs() <= self.tolerance);
        self.record(label, &expected.to_string(), ok, detail.to_string())
    }

    /// Numeric equality when the reference has a value, emptiness otherwise.
    pub fn numeric_or_empty(&mut self, what: &str, expected: &str, actual: &str) -> Result<bool> {
        if expected.trim().is_empty() {
            Ok(self.empty(&format!("{what} should be empty"), actual))
        } else {
            self.numeric(&format!("{what} should be {EXPECTED_VALUE_TOKEN}"), expected, actual)
        }
    }

    pub fn on_or_after(
        &mut self,
        label: &str,
        bound: NaiveDateTime,
        actual: Option<NaiveDateTime>,
        detail: &str,
    ) -> bool {
        let ok = matches!(actual, Some(a) if a >= bound);
        self.record(label, &format_date_time(&bound), ok, detail.to_string())
    }

    pub fn on_or_before(
        &mut self,
        label: &str,
        bound: NaiveDateTime,
        actual: Option<NaiveDateTime>,
        detail: &str,
    ) -> bool {
        let ok = matches!(actual, Some(a) if a <= bound);
        self.record(label, &format_date_time(&bound), ok, detail.to_string())
    }

    /// Both window assertions for `what`, e.g. `"Form Date and Time"`.
    pub fn within_window(&mut self, what: &str, actual: Option<NaiveDateTime>, detail: &str) {
        let window = self.window;
        self.on_or_after(
            &format!("{what} should be on or after {EXPECTED_VALUE_TOKEN}"),
            window.open,
            actual,
            detail,
        );
        self.on_or_before(
            &format!("{what} should be on or before {EXPECTED_VALUE_TOKEN}"),
            window.close,
            actual,
            detail,
        );
    }

    pub fn location_valid(&mut self, label: &str, location: Option<&LatLong>) -> bool {
        let detail = location.map(|l| l.to_string()).unwrap_or_default();
        self.check(label, matches!(location, Some(l) if l.is_valid()), detail)
    }

    /// A status field with a dependent comment field.
    ///
    /// The status must match the reference. When the reference status equals
    /// `trigger` the comment must match the reference comment; otherwise the
    /// comment must be left empty.
    pub fn companion(&mut self, rule: &CompanionRule, reference: &ServiceReport, actual: &ServiceReport) {
        self.equals(rule.status_label, &reference.status, &actual.status);
        if reference.status.trim().eq_ignore_ascii_case(rule.trigger) {
            self.equals(
                &format!("{} should be {EXPECTED_VALUE_TOKEN}", rule.comment_label),
                &reference.comments,
                &actual.comments,
            );
        } else {
            self.empty(&format!("{} should be empty", rule.comment_label), &actual.comments);
        }
    }

    /// Score repeated sub-records index by index over the common prefix.
    ///
    /// A length mismatch is logged; the extra entries on either side are not
    /// scored. Explanations for each item carry a `"(line N) "` style prefix
    /// built by `prefix`.
    pub fn line_items<T>(
        &mut self,
        what: &str,
        message: &ExportedMessage,
        reference: &[T],
        submitted: &[T],
        prefix: impl Fn(usize) -> String,
        mut score_item: impl FnMut(&mut Grader, &T, &T) -> Result<()>,
    ) -> Result<()> {
        if reference.len() != submitted.len() {
            tracing::warn!(
                from = %message.from,
                message_id = %message.message_id,
                submitted = submitted.len(),
                reference = reference.len(),
                "{what} count differs from reference, scoring common prefix only"
            );
        }
        for (i, (reference_item, item)) in reference.iter().zip(submitted.iter()).enumerate() {
            self.set_prefix(prefix(i + 1));
            score_item(self, reference_item, item)?;
        }
        self.clear_prefix();
        Ok(())
    }
}

/// Parameters for [`Grader::companion`].
#[derive(Debug, Clone, Copy)]
pub struct CompanionRule {
    pub status_label: &'static str,
    pub comment_label: &'static str,
    /// Reference status that requires a comment.
    pub trigger: &'static str,
}

fn parse_number(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn significant_lines(s: &str) -> Vec<&str> {
    s.lines().map(str::trim).filter(|l| !l.is_empty()).collect()
}

/// Line-wise comparison tolerating a wrap or up to `offset` leading lines.
pub fn multi_line_match(expected: &str, actual: &str, offset: usize) -> bool {
    let e = significant_lines(expected);
    let a = significant_lines(actual);
    if e == a || e.join(" ") == a.join(" ") {
        return true;
    }
    (1..=offset).any(|k| (a.len() > k && a[k..] == e[..]) || (e.len() > k && e[k..] == a[..]))
}

/// A form-specific rule set.
pub trait FormScorer: Send + Sync {
    fn form_type(&self) -> FormType;

    /// Run this form's assertions. Only reference problems are errors.
    fn score(
        &self,
        submitted: &ExportedMessage,
        reference: &ExportedMessage,
        grader: &mut Grader,
    ) -> Result<()>;
}

static ICS_213: ics213::Ics213Scorer = ics213::Ics213Scorer;
static ICS_213_RR: ics213_rr::Ics213RrScorer = ics213_rr::Ics213RrScorer;
static ICS_205: ics205::Ics205Scorer = ics205::Ics205Scorer;
static HICS_259: hics259::Hics259Scorer = hics259::Hics259Scorer;
static FIELD_SITUATION: field_situation::FieldSituationScorer =
    field_situation::FieldSituationScorer;

/// Look up the rule set for a form type.
pub fn scorer_for(form_type: FormType) -> Option<&'static dyn FormScorer> {
    match form_type {
        FormType::Ics213 => Some(&ICS_213),
        FormType::Ics213Rr => Some(&ICS_213_RR),
        FormType::Ics205 => Some(&ICS_205),
        FormType::Hics259 => Some(&HICS_259),
        FormType::FieldSituation => Some(&FIELD_SITUATION),
        FormType::Plain => None,
    }
}

pub(crate) fn form_mismatch(
    expected: FormType,
    submitted: &ExportedMessage,
    reference: &ExportedMessage,
) -> GradeError {
    GradeError::Configuration(format!(
        "{expected} scorer given submitted {} ({}) and reference {}",
        submitted.form_type(),
        submitted.message_id,
        reference.form_type()
    ))
}

/// Settings for the checks applied to every scored message.
#[derive(Debug, Clone)]
pub struct ScoringSettings {
    pub window: ExerciseWindow,
    pub tolerance: f64,
    pub subject_line_offset: usize,
    /// Address that must appear in To or Cc.
    pub required_address: Option<String>,
    /// Addresses that must not appear in To or Cc.
    pub forbidden_addresses: Vec<String>,
}

/// Result of scoring one message.
#[derive(Debug, Clone)]
pub struct ScoreOutcome {
    pub explanations: Vec<Explanation>,
    pub feedback: String,
    /// Location used for this message; `None` when missing or unusable.
    pub location: Option<LatLong>,
}

impl ScoreOutcome {
    pub fn is_perfect(&self) -> bool {
        self.explanations.is_empty()
    }
}

/// Runs common and form-specific assertions for each expected message.
#[derive(Debug)]
pub struct ScoringEngine {
    settings: ScoringSettings,
    grader: Grader,
    scored: usize,
    correct: usize,
}

impl ScoringEngine {
    pub fn new(settings: ScoringSettings) -> Self {
        let grader = Grader::new(settings.window)
            .with_tolerance(settings.tolerance)
            .with_line_offset(settings.subject_line_offset);
        Self {
            settings,
            grader,
            scored: 0,
            correct: 0,
        }
    }

    /// Score one submitted message against the reference.
    pub fn score(
        &mut self,
        submitted: &ExportedMessage,
        reference: &ExportedMessage,
    ) -> Result<ScoreOutcome> {
        let scorer = scorer_for(reference.form_type()).ok_or_else(|| {
            GradeError::Configuration(format!(
                "no scorer for reference form type {}",
                reference.form_type()
            ))
        })?;

        self.grader.reset();
        self.begin_common(submitted);
        scorer.score(submitted, reference, &mut self.grader)?;
        self.grader.clear_prefix();
        let location = self.end_common(submitted);

        let explanations = self.grader.take_explanations();
        self.grader
            .counters_mut()
            .increment(FEEDBACK_COUNT_LABEL, explanations.len());
        self.scored += 1;

        let feedback = if explanations.is_empty() {
            self.correct += 1;
            PERFECT_MESSAGE.to_string()
        } else {
            explanations
                .iter()
                .map(|e| e.text.as_str())
                .collect::<Vec<_>>()
                .join("\n")
        };

        Ok(ScoreOutcome {
            explanations,
            feedback,
            location,
        })
    }

    fn begin_common(&mut self, message: &ExportedMessage) {
        let window = self.settings.window;
        let sent = Some(message.msg_date_time);
        let detail = format_date_time(&message.msg_date_time);
        self.grader.on_or_after(
            "Message should be posted on or after #EV",
            window.open,
            sent,
            &detail,
        );
        self.grader.on_or_before(
            "Message should be posted on or before #EV",
            window.close,
            sent,
            &detail,
        );
        let days_after_open = (message.msg_date_time - window.open).num_days();
        self.grader
            .counters_mut()
            .increment(DAYS_AFTER_OPEN_LABEL, days_after_open);

        let addresses: Vec<String> = message.addresses().map(str::to_uppercase).collect();
        if let Some(required) = &self.settings.required_address {
            let required_upper = required.to_uppercase();
            self.grader.check(
                &format!("Addresses should contain {required}"),
                addresses.contains(&required_upper),
                addresses.join(","),
            );
        }

        if !self.settings.forbidden_addresses.is_empty() {
            let mut hits: Vec<String> = Vec::new();
            for forbidden in &self.settings.forbidden_addresses {
                let forbidden = forbidden.to_uppercase();
                if addresses.contains(&forbidden) && !hits.contains(&forbidden) {
                    hits.push(forbidden);
                }
            }
            self.grader.check(
                "To and Cc list should not contain \"monthly/training/clearinghouse\" addresses",
                hits.is_empty(),
                hits.join(","),
            );
        }
    }

    fn end_common(&mut self, message: &ExportedMessage) -> Option<LatLong> {
        let location = match &message.form {
            FormData::FieldSituation(_) => message.msg_location,
            _ => message.map_location,
        };
        let detail = match &location {
            None => "missing".to_string(),
            Some(l) if l.is_zero_zero() => "missing".to_string(),
            Some(l) => format!("invalid {l}"),
        };
        let usable = is_usable_location(location.as_ref());
        self.grader.check("LAT/LON should be provided", usable, detail);
        location.filter(|_| usable)
    }

    pub fn counters(&self) -> &CounterMap {
        self.grader.counters()
    }

    pub fn scored_count(&self) -> usize {
        self.scored
    }

    pub fn correct_count(&self) -> usize {
        self.correct
    }
}
