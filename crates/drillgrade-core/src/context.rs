//! Per-run context.
//!
//! Everything a run needs that does not change while it runs: the exercise,
//! the reference message, the identifier index and the settings derived from
//! configuration. Construction does all fail-fast validation, so a
//! [`RunContext`] that exists is safe to grade with.

use chrono::NaiveDate;

use crate::acknowledgement::AckTexts;
use crate::classifier::{extract_exercise_id, Classifier, LocationPolicy, ReferenceIndex};
use crate::config::DrillgradeConfig;
use crate::error::{GradeError, Result};
use crate::model::{ExportedMessage, FormType};
use crate::parser;
use crate::persistence::Exercise;
use crate::scoring::{ExerciseWindow, ScoringEngine, ScoringSettings};

/// Outbound message settings.
#[derive(Debug, Clone)]
pub struct OutboundSettings {
    pub enabled: bool,
    pub sender: String,
    pub subject: String,
    pub disclaimer: String,
    pub acknowledgements: AckTexts,
}

/// Location jitter settings; `None` in [`RunContext::jitter`] disables it.
#[derive(Debug, Clone, Copy)]
pub struct JitterSettings {
    pub radius_meters: f64,
    pub seed: u64,
}

#[derive(Debug, Clone)]
pub struct RunContext {
    pub exercise_date: NaiveDate,
    pub form_type: FormType,
    /// Lowercased identifier of the graded exercise.
    pub exercise_id: String,
    pub reference: ExportedMessage,
    pub reference_index: ReferenceIndex,
    /// Next-exercise instructions appended to outbound messages.
    pub instructions: String,
    pub kind: String,
    pub name: String,
    pub description: String,
    pub location_policy: LocationPolicy,
    pub exercise_id_marker: String,
    pub exercise_id_length: usize,
    pub scoring: ScoringSettings,
    pub jitter: Option<JitterSettings>,
    pub outbound: OutboundSettings,
}

impl RunContext {
    /// Build the context for the exercise on `date` from configuration,
    /// reading the reference tree.
    pub fn load(config: &DrillgradeConfig, date: NaiveDate) -> Result<Self> {
        let root = &config.paths.reference_root;
        let marker = &config.classification.exercise_id_marker;
        let token_len = config.classification.exercise_id_length;

        let reference = parser::load_reference_message(root, date)?;
        let reference_index = parser::build_reference_index(root, marker, token_len)?;
        let instructions = parser::load_instructions(root, date)?;
        Self::new(config, date, reference, reference_index, instructions)
    }

    /// Build a context from already-loaded parts.
    pub fn new(
        config: &DrillgradeConfig,
        date: NaiveDate,
        reference: ExportedMessage,
        reference_index: ReferenceIndex,
        instructions: String,
    ) -> Result<Self> {
        let marker = config.classification.exercise_id_marker.clone();
        let token_len = config.classification.exercise_id_length;
        if marker.is_empty() || token_len == 0 {
            return Err(GradeError::config(
                "exercise id marker and token length must be set",
            ));
        }

        let form_type = match &config.exercise.form_type {
            Some(s) => s.parse::<FormType>().map_err(GradeError::Configuration)?,
            None => reference.form_type(),
        };
        if !form_type.is_gradable() {
            return Err(GradeError::config(format!(
                "form type {form_type} cannot be graded"
            )));
        }
        if reference.form_type() != form_type {
            return Err(GradeError::config(format!(
                "reference message is {} but exercise expects {form_type}",
                reference.form_type()
            )));
        }

        let exercise_id = extract_exercise_id(&reference.plain_content, &marker, token_len);
        if exercise_id.is_empty() {
            return Err(GradeError::config(format!(
                "reference message {} has no exercise id after '{marker}'",
                reference.message_id
            )));
        }

        let (open, close) = config.window(date)?;
        let scoring = ScoringSettings {
            window: ExerciseWindow { open, close },
            tolerance: config.scoring.tolerance,
            subject_line_offset: config.scoring.subject_line_offset,
            required_address: Some(config.scoring.required_address.trim().to_string())
                .filter(|a| !a.is_empty()),
            forbidden_addresses: config.scoring.forbidden_addresses.clone(),
        };
        // Grading the reference against itself surfaces every unparsable
        // typed field before any submission is seen.
        ScoringEngine::new(scoring.clone()).score(&reference, &reference)?;

        let jitter = config.location.jitter.then_some(JitterSettings {
            radius_meters: config.location.radius_meters,
            seed: config.location.seed,
        });

        let outbound = OutboundSettings {
            enabled: config.outbound.enabled,
            sender: config.outbound.sender.clone(),
            subject: config.outbound.subject.clone(),
            disclaimer: config.outbound.disclaimer.clone(),
            acknowledgements: config.outbound.acknowledgements.clone(),
        };

        tracing::info!(
            date = %date,
            form_type = %form_type,
            exercise_id = %exercise_id,
            known_exercises = reference_index.len(),
            "run context ready"
        );

        Ok(Self {
            exercise_date: date,
            form_type,
            exercise_id,
            reference,
            reference_index,
            instructions,
            kind: config.exercise.kind.clone(),
            name: config.exercise.name.clone(),
            description: config.exercise.description.clone(),
            location_policy: config.classification.location_policy,
            exercise_id_marker: marker,
            exercise_id_length: token_len,
            scoring,
            jitter,
            outbound,
        })
    }

    pub fn window(&self) -> ExerciseWindow {
        self.scoring.window
    }

    pub fn classifier(&self) -> Classifier<'_> {
        Classifier::new(
            &self.reference_index,
            self.form_type,
            &self.exercise_id,
            self.exercise_date,
        )
        .with_location_policy(self.location_policy)
        .with_marker(&self.exercise_id_marker, self.exercise_id_length)
    }

    /// The exercise record handed to persistence.
    pub fn exercise(&self) -> Exercise {
        Exercise {
            id: 0,
            date: self.exercise_date,
            kind: self.kind.clone(),
            exercise_id: self.exercise_id.clone(),
            form_type: self.form_type,
            name: self.name.clone(),
            description: self.description.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDateTime;

    use super::*;
    use crate::model::{FieldSituationForm, FormData, Ics205Form, Ics213Form, RadioEntry};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 15).unwrap()
    }

    fn reference(body: &str) -> ExportedMessage {
        ExportedMessage {
            message_id: "REF".into(),
            from: "ETO-PRACTICE".into(),
            to: vec![],
            cc: vec![],
            subject: "ETO Practice".into(),
            msg_date_time: NaiveDateTime::parse_from_str("2026-10-15 00:00", "%Y-%m-%d %H:%M")
                .unwrap(),
            sort_date_time: None,
            map_location: None,
            msg_location: None,
            plain_content: body.into(),
            form: FormData::Ics213(Ics213Form::default()),
        }
    }

    #[test]
    fn builds_from_reference() {
        let ctx = RunContext::new(
            &DrillgradeConfig::default(),
            date(),
            reference("Exercise Id: ABCDEF123456"),
            ReferenceIndex::new(),
            String::new(),
        )
        .unwrap();
        assert_eq!(ctx.form_type, FormType::Ics213);
        assert_eq!(ctx.exercise_id, "abcdef123456");
        assert_eq!(ctx.window().open.to_string(), "2026-10-10 00:00:00");
        assert!(ctx.jitter.is_some());
        assert_eq!(ctx.exercise().kind, "Practice");
    }

    #[test]
    fn missing_marker_is_fatal() {
        let err = RunContext::new(
            &DrillgradeConfig::default(),
            date(),
            reference("no id"),
            ReferenceIndex::new(),
            String::new(),
        )
        .unwrap_err();
        assert!(matches!(err, GradeError::Configuration(_)));
    }

    #[test]
    fn unknown_or_mismatched_form_type_is_fatal() {
        let mut config = DrillgradeConfig::default();
        config.exercise.form_type = Some("ics_999".into());
        assert!(RunContext::new(
            &config,
            date(),
            reference("Exercise Id: ABCDEF123456"),
            ReferenceIndex::new(),
            String::new(),
        )
        .is_err());

        config.exercise.form_type = Some("ics_205".into());
        assert!(RunContext::new(
            &config,
            date(),
            reference("Exercise Id: ABCDEF123456"),
            ReferenceIndex::new(),
            String::new(),
        )
        .is_err());
    }

    #[test]
    fn unparsable_reference_frequency_is_fatal() {
        let mut reference = reference("Exercise Id: ABCDEF123456");
        reference.form = FormData::Ics205(Ics205Form {
            radio_entries: vec![RadioEntry {
                channel_number: "1".into(),
                function: "Tactical".into(),
                rx_frequency: "TBD".into(),
                ..Default::default()
            }],
            ..Default::default()
        });
        let err = RunContext::new(
            &DrillgradeConfig::default(),
            date(),
            reference,
            ReferenceIndex::new(),
            String::new(),
        )
        .unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(
            err,
            GradeError::ReferenceParse { ref value, .. } if value == "TBD"
        ));
    }

    #[test]
    fn field_situation_reference_needs_form_location() {
        let mut reference = reference("Exercise Id: ABCDEF123456");
        reference.form = FormData::FieldSituation(FieldSituationForm::default());
        let err = RunContext::new(
            &DrillgradeConfig::default(),
            date(),
            reference,
            ReferenceIndex::new(),
            String::new(),
        )
        .unwrap_err();
        assert!(matches!(err, GradeError::ReferenceParse { .. }));
    }

    #[test]
    fn load_fails_fast_without_reference() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = DrillgradeConfig::default();
        config.paths.reference_root = dir.path().to_path_buf();
        let err = RunContext::load(&config, date()).unwrap_err();
        assert!(matches!(err, GradeError::MissingReference { .. }));
    }
}
