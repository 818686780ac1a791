//! Run engine.
//!
//! Drives one exercise run: classify every sender, patch unusable locations,
//! score expected messages, compose outbound replies and hand the results to
//! persistence. Everything happens on the calling thread in store order.

use std::time::{Duration, Instant};

use chrono::Utc;
use uuid::Uuid;

use crate::acknowledgement::{acknowledgement_text, AckSummary, SEPARATOR};
use crate::classifier::{AckEntry, AckKey, Bucket};
use crate::context::RunContext;
use crate::error::Result;
use crate::location::jitter;
use crate::model::{ExportedMessage, LatLong};
use crate::persistence::{BulkInsertEntry, Event};
use crate::report::{ExerciseReport, PersistenceOutcome};
use crate::results::{OutboundMessage, PracticeSummary};
use crate::scoring::ScoringEngine;
use crate::statistics::RunStatistics;
use crate::traits::{MessageStore, PersistenceGateway};

/// Progress reporting trait.
pub trait ProgressReporter: Send + Sync {
    fn on_sender_classified(&self, sender: &str, entry: &AckEntry);
    fn on_message_scored(&self, summary: &PracticeSummary);
    fn on_run_complete(&self, senders: usize, scored: usize, elapsed: Duration);
}

/// No-op progress reporter.
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn on_sender_classified(&self, _: &str, _: &AckEntry) {}
    fn on_message_scored(&self, _: &PracticeSummary) {}
    fn on_run_complete(&self, _: usize, _: usize, _: Duration) {}
}

/// Grades one exercise described by a [`RunContext`].
pub struct GradingEngine<'a> {
    ctx: &'a RunContext,
}

impl<'a> GradingEngine<'a> {
    pub fn new(ctx: &'a RunContext) -> Self {
        Self { ctx }
    }

    /// Classify every sender's full history, in store order.
    pub fn classify_all(
        &self,
        store: &dyn MessageStore,
        progress: &dyn ProgressReporter,
    ) -> Vec<AckEntry> {
        let classifier = self.ctx.classifier();
        store
            .senders()
            .into_iter()
            .map(|sender| {
                let messages = store.all_messages_for_sender(sender);
                let entry = classifier.classify(sender, &messages);
                tracing::debug!(
                    sender,
                    expected = entry.count(Bucket::Expected),
                    unexpected = entry.count(Bucket::Unexpected),
                    early = entry.count(Bucket::Early),
                    late = entry.count(Bucket::Late),
                    "classified sender"
                );
                progress.on_sender_classified(sender, &entry);
                entry
            })
            .collect()
    }

    /// Replace every unusable sender location with a distinct synthetic one.
    ///
    /// Returns the senders that were patched.
    pub fn apply_jitter(&self, entries: &mut [AckEntry]) -> Vec<String> {
        let Some(settings) = self.ctx.jitter else {
            return Vec::new();
        };
        let mut bad: Vec<&mut AckEntry> = entries
            .iter_mut()
            .filter(|e| !e.has_usable_location())
            .collect();
        if bad.is_empty() {
            return Vec::new();
        }

        let points = jitter(
            bad.len(),
            LatLong::ZERO_ZERO,
            settings.radius_meters,
            settings.seed,
        );
        let mut patched = Vec::with_capacity(bad.len());
        for (entry, point) in bad.iter_mut().zip(points) {
            entry.set_synthetic_location(point);
            patched.push(entry.from.clone());
        }
        tracing::info!(
            count = patched.len(),
            senders = %patched.join(","),
            "adjusted unusable locations"
        );
        patched
    }

    /// Run the full pipeline. Persistence failures are recorded in the
    /// report, never returned as errors.
    pub fn run(
        &self,
        store: &dyn MessageStore,
        gateway: Option<&mut dyn PersistenceGateway>,
        progress: &dyn ProgressReporter,
    ) -> Result<ExerciseReport> {
        let start = Instant::now();
        let ctx = self.ctx;
        tracing::info!(
            date = %ctx.exercise_date,
            form_type = %ctx.form_type,
            senders = store.senders().len(),
            "starting grading run"
        );

        let mut entries = self.classify_all(store, progress);
        let jittered_senders = self.apply_jitter(&mut entries);

        let ack_texts: Vec<String> = entries
            .iter()
            .map(|e| acknowledgement_text(e, &ctx.outbound.acknowledgements))
            .collect();
        let acknowledgements: Vec<AckSummary> = entries
            .iter()
            .zip(&ack_texts)
            .map(|(e, text)| AckSummary::new(e, text.clone()))
            .collect();

        let mut scoring = ScoringEngine::new(ctx.scoring.clone());
        let mut summaries = Vec::new();
        let mut outbound = Vec::new();
        let mut events = Vec::new();
        let mut ack_only = Vec::new();

        for (entry, ack_text) in entries.iter().zip(&ack_texts) {
            let expected = self.expected_messages(store, entry);
            if expected.is_empty() {
                ack_only.push((entry, ack_text));
                continue;
            }

            for message in expected {
                let outcome = scoring.score(message, &ctx.reference)?;
                let summary = PracticeSummary {
                    from: entry.from.clone(),
                    to: message.to.first().cloned().unwrap_or_default(),
                    location: outcome.location.or(entry.location),
                    date_time: message.msg_date_time,
                    explanations: outcome.explanations,
                    message_id: message.message_id.clone(),
                    form_type: message.form_type(),
                };
                progress.on_message_scored(&summary);

                if ctx.outbound.enabled {
                    outbound.push(self.feedback_message(entry, ack_text, &summary, &outcome.feedback));
                }
                summaries.push(summary);
            }
            // Expected is non-empty, so the last summary is this sender's latest.
            if let Some(summary) = summaries.last() {
                events.push(Event {
                    exercise_id: 0,
                    call: summary.from.clone(),
                    location: summary.location,
                    feedback_count: summary.feedback_count(),
                    feedback: summary.feedback(),
                    metadata: Event::metadata_for(&summary.message_id),
                });
            }
        }

        if !ack_only.is_empty() {
            tracing::info!(
                senders = %ack_only.iter().map(|(e, _)| e.from.as_str()).collect::<Vec<_>>().join(","),
                "senders without an expected message"
            );
        }
        if ctx.outbound.enabled {
            for (entry, ack_text) in &ack_only {
                outbound.push(self.acknowledgement_only_message(entry, ack_text));
            }
        }

        let statistics = RunStatistics {
            participants: events.len(),
            scored_messages: scoring.scored_count(),
            correct_messages: scoring.correct_count(),
            acknowledgement_only: ack_only.len(),
        };

        let exercise = ctx.exercise();
        let persistence = match gateway {
            None => PersistenceOutcome::Disabled,
            Some(gateway) => {
                let batch = BulkInsertEntry {
                    exercise: exercise.clone(),
                    events,
                };
                let record = gateway.bulk_insert(&batch);
                if record.is_ok() {
                    tracing::info!(backend = gateway.name(), "{}", record.content);
                    PersistenceOutcome::Stored {
                        backend: gateway.name().to_string(),
                        content: record.content,
                    }
                } else {
                    tracing::error!(backend = gateway.name(), "database update failed: {}", record.content);
                    PersistenceOutcome::Failed {
                        backend: gateway.name().to_string(),
                        error: record.content,
                    }
                }
            }
        };

        let elapsed = start.elapsed();
        progress.on_run_complete(entries.len(), summaries.len(), elapsed);
        tracing::info!(
            senders = entries.len(),
            scored = statistics.scored_messages,
            correct = statistics.correct_messages,
            elapsed_ms = elapsed.as_millis() as u64,
            "grading run complete"
        );

        Ok(ExerciseReport {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            exercise,
            window: ctx.window(),
            summaries,
            acknowledgements,
            outbound,
            counters: scoring.counters().clone(),
            statistics,
            jittered_senders,
            persistence,
            duration_ms: elapsed.as_millis() as u64,
        })
    }

    /// The sender's expected messages of the graded form type, oldest first.
    fn expected_messages<'s>(
        &self,
        store: &'s dyn MessageStore,
        entry: &AckEntry,
    ) -> Vec<&'s ExportedMessage> {
        store
            .messages_for_sender(&entry.from)
            .remove(&self.ctx.form_type)
            .unwrap_or_default()
            .into_iter()
            .filter(|m| entry.bucket_of(&AckKey::of(m)) == Some(Bucket::Expected))
            .collect()
    }

    fn feedback_message(
        &self,
        entry: &AckEntry,
        ack_text: &str,
        summary: &PracticeSummary,
        feedback: &str,
    ) -> OutboundMessage {
        let settings = &self.ctx.outbound;
        let mut body = String::from("ACKNOWLEDGEMENTS\n");
        body.push_str(ack_text);
        body.push_str("FEEDBACK\n");
        body.push_str(feedback);
        body.push_str(&self.ctx.instructions);
        body.push_str(&settings.disclaimer);
        OutboundMessage {
            from: settings.sender.clone(),
            to: entry.from.clone(),
            subject: format!("{} {}", settings.subject, summary.message_id),
            body,
        }
    }

    fn acknowledgement_only_message(&self, entry: &AckEntry, ack_text: &str) -> OutboundMessage {
        let settings = &self.ctx.outbound;
        let mut body = String::from("ACKNOWLEDGEMENTS\n");
        body.push_str(ack_text);
        body.push_str(&format!("\n{SEPARATOR}\n"));
        body.push_str("\nFEEDBACK\n");
        body.push_str(&format!("no {} message received\n", self.ctx.form_type));
        body.push_str(&format!("\n{SEPARATOR}"));
        body.push_str(&self.ctx.instructions);
        body.push_str(&settings.disclaimer);
        OutboundMessage {
            from: settings.sender.clone(),
            to: entry.from.clone(),
            subject: settings.subject.clone(),
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{NaiveDate, NaiveDateTime};

    use super::*;
    use crate::classifier::{ReferenceEntry, ReferenceIndex};
    use crate::config::DrillgradeConfig;
    use crate::model::{FormData, FormType, Ics213Form};
    use crate::persistence::{Exercise, JoinedUser, ReturnRecord};
    use crate::store::InMemoryMessageStore;

    const CURRENT_ID: &str = "ABCDEF123456";
    const LAST_WEEK_ID: &str = "LASTWK000001";

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn form() -> Ics213Form {
        Ics213Form {
            organization: "EOC".into(),
            incident_name: "Cascadia Quake".into(),
            form_to: "Planning".into(),
            form_from: "Field".into(),
            form_subject: "Shelter status".into(),
            form_date: "2026-10-14".into(),
            form_time: "10:00".into(),
            form_message: "Shelter open".into(),
            approved_by: "KM6SO".into(),
            position: "Radio Operator".into(),
            is_exercise: true,
            form_location: Some(LatLong::new(47.5, -122.2)),
        }
    }

    fn message(from: &str, id: &str, exercise_id: &str, form: FormData) -> ExportedMessage {
        ExportedMessage {
            message_id: id.into(),
            from: from.into(),
            to: vec!["ETO-PRACTICE@winlink.org".into()],
            cc: vec![],
            subject: "ETO Practice".into(),
            msg_date_time: dt("2026-10-14 12:00"),
            sort_date_time: None,
            map_location: Some(LatLong::new(47.5, -122.2)),
            msg_location: Some(LatLong::new(47.5, -122.2)),
            plain_content: format!("Exercise Id: {exercise_id}\n"),
            form,
        }
    }

    fn context() -> RunContext {
        let mut index = ReferenceIndex::new();
        index.insert(
            CURRENT_ID,
            ReferenceEntry {
                date: date("2026-10-15"),
                form_type: FormType::Ics213,
            },
        );
        index.insert(
            LAST_WEEK_ID,
            ReferenceEntry {
                date: date("2026-10-08"),
                form_type: FormType::Ics213,
            },
        );
        RunContext::new(
            &DrillgradeConfig::default(),
            date("2026-10-15"),
            message("ETO-PRACTICE", "REF", CURRENT_ID, FormData::Ics213(form())),
            index,
            "\nNext week: send an ICS-205.\n".into(),
        )
        .unwrap()
    }

    struct RecordingGateway {
        fail: bool,
        batches: Vec<BulkInsertEntry>,
    }

    impl PersistenceGateway for RecordingGateway {
        fn name(&self) -> &str {
            "recording"
        }

        fn health(&self) -> ReturnRecord {
            ReturnRecord::ok("ok")
        }

        fn bulk_insert(&mut self, entry: &BulkInsertEntry) -> ReturnRecord {
            if self.fail {
                return ReturnRecord::error("disk full");
            }
            self.batches.push(entry.clone());
            ReturnRecord::ok(format!("{} events", entry.events.len()))
        }

        fn filtered_exercises(
            &self,
            _: Option<&str>,
            _: Option<NaiveDate>,
        ) -> Result<Vec<Exercise>> {
            Ok(vec![])
        }

        fn users_history(&self, _: &[Exercise]) -> Result<Vec<JoinedUser>> {
            Ok(vec![])
        }
    }

    #[derive(Default)]
    struct CountingReporter {
        classified: AtomicUsize,
        scored: AtomicUsize,
    }

    impl ProgressReporter for CountingReporter {
        fn on_sender_classified(&self, _: &str, _: &AckEntry) {
            self.classified.fetch_add(1, Ordering::SeqCst);
        }
        fn on_message_scored(&self, _: &PracticeSummary) {
            self.scored.fetch_add(1, Ordering::SeqCst);
        }
        fn on_run_complete(&self, _: usize, _: usize, _: Duration) {}
    }

    #[test]
    fn perfect_and_imperfect_messages() {
        let ctx = context();
        let mut eoc = form();
        eoc.organization = "eoc".into();
        let store = InMemoryMessageStore::new(vec![
            message("KM6SO", "M1", CURRENT_ID, FormData::Ics213(form())),
            message("W7ABC", "M2", CURRENT_ID, FormData::Ics213(eoc)),
        ]);

        let report = GradingEngine::new(&ctx).run(&store, None, &NoopReporter).unwrap();
        assert_eq!(report.summaries.len(), 2);
        assert!(report.summaries[0].is_perfect());
        assert_eq!(report.summaries[1].feedback(), "Organization Name should be EOC");
        assert_eq!(report.statistics.correct_messages, 1);
        assert_eq!(report.statistics.scored_messages, 2);

        let outbound = &report.outbound[0];
        assert_eq!(outbound.subject, "ETO Practice Exercise Feedback M1");
        assert!(outbound.body.starts_with("ACKNOWLEDGEMENTS\nThe following expected"));
        assert!(outbound.body.contains("FEEDBACK\nPerfect Message!\nNext week"));
        assert_eq!(report.persistence, PersistenceOutcome::Disabled);
    }

    #[test]
    fn late_messages_are_acknowledged_but_not_scored() {
        let ctx = context();
        let store = InMemoryMessageStore::new(vec![message(
            "KM6SO",
            "OLD",
            LAST_WEEK_ID,
            FormData::Ics213(form()),
        )]);

        let report = GradingEngine::new(&ctx).run(&store, None, &NoopReporter).unwrap();
        assert!(report.summaries.is_empty());
        assert_eq!(report.acknowledgements[0].late, 1);
        assert_eq!(report.statistics.acknowledgement_only, 1);
        assert!(report.outbound[0].body.contains("no ics_213 message received"));
    }

    #[test]
    fn unexpected_only_sender_gets_acknowledgement() {
        let ctx = context();
        let store = InMemoryMessageStore::new(vec![
            message("KM6SO", "M1", CURRENT_ID, FormData::Ics213(form())),
            message("N0CALL", "P1", "", FormData::Plain),
        ]);

        let report = GradingEngine::new(&ctx).run(&store, None, &NoopReporter).unwrap();
        assert_eq!(report.outbound.len(), 2);
        let ack_only = &report.outbound[1];
        assert_eq!(ack_only.to, "N0CALL");
        assert_eq!(ack_only.subject, "ETO Practice Exercise Feedback");
        assert!(ack_only
            .body
            .contains("The following unexpected message types are acknowledged:"));
        assert!(ack_only.body.contains("\nFEEDBACK\nno ics_213 message received\n"));
    }

    #[test]
    fn bad_locations_are_jittered_per_sender() {
        let ctx = context();
        let mut a = message("AAA", "M1", CURRENT_ID, FormData::Ics213(form()));
        a.map_location = None;
        let mut b = message("BBB", "M2", CURRENT_ID, FormData::Ics213(form()));
        b.map_location = Some(LatLong::ZERO_ZERO);
        let store = InMemoryMessageStore::new(vec![a, b]);

        let report = GradingEngine::new(&ctx).run(&store, None, &NoopReporter).unwrap();
        assert_eq!(report.jittered_senders, vec!["AAA", "BBB"]);
        let la = report.summaries[0].location.unwrap();
        let lb = report.summaries[1].location.unwrap();
        assert_ne!(la, lb);
        assert!(!la.is_zero_zero() && !lb.is_zero_zero());
        assert!(report.acknowledgements.iter().all(|a| a.location_jittered));
        assert!(report.summaries[0]
            .feedback()
            .contains("LAT/LON should be provided"));
    }

    #[test]
    fn one_event_per_scored_sender() {
        let ctx = context();
        let mut later = message("KM6SO", "M2", CURRENT_ID, FormData::Ics213(form()));
        later.msg_date_time = dt("2026-10-15 09:00");
        let store = InMemoryMessageStore::new(vec![
            message("KM6SO", "M1", CURRENT_ID, FormData::Ics213(form())),
            later,
        ]);
        let mut gateway = RecordingGateway {
            fail: false,
            batches: vec![],
        };

        let report = GradingEngine::new(&ctx)
            .run(&store, Some(&mut gateway), &NoopReporter)
            .unwrap();
        assert_eq!(report.summaries.len(), 2);
        let batch = &gateway.batches[0];
        assert_eq!(batch.events.len(), 1);
        assert_eq!(batch.events[0].metadata, r#"{"messageId":"M2"}"#);
        assert_eq!(batch.exercise.exercise_id, "abcdef123456");
        assert!(matches!(report.persistence, PersistenceOutcome::Stored { .. }));
    }

    #[test]
    fn persistence_failure_does_not_abort() {
        let ctx = context();
        let store = InMemoryMessageStore::new(vec![message(
            "KM6SO",
            "M1",
            CURRENT_ID,
            FormData::Ics213(form()),
        )]);
        let mut gateway = RecordingGateway {
            fail: true,
            batches: vec![],
        };

        let report = GradingEngine::new(&ctx)
            .run(&store, Some(&mut gateway), &NoopReporter)
            .unwrap();
        assert_eq!(report.summaries.len(), 1);
        assert_eq!(report.outbound.len(), 1);
        assert!(report.persistence.is_failed());
    }

    #[test]
    fn reports_progress() {
        let ctx = context();
        let store = InMemoryMessageStore::new(vec![
            message("KM6SO", "M1", CURRENT_ID, FormData::Ics213(form())),
            message("N0CALL", "P1", "", FormData::Plain),
        ]);
        let reporter = CountingReporter::default();
        GradingEngine::new(&ctx).run(&store, None, &reporter).unwrap();
        assert_eq!(reporter.classified.load(Ordering::SeqCst), 2);
        assert_eq!(reporter.scored.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn disabled_outbound_produces_no_messages() {
        let mut ctx = context();
        ctx.outbound.enabled = false;
        let store = InMemoryMessageStore::new(vec![message(
            "KM6SO",
            "M1",
            CURRENT_ID,
            FormData::Ics213(form()),
        )]);
        let report = GradingEngine::new(&ctx).run(&store, None, &NoopReporter).unwrap();
        assert!(report.outbound.is_empty());
        assert_eq!(report.summaries.len(), 1);
    }
}
