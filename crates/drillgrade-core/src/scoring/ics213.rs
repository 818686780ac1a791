//! ICS-213 General Message rules.

use crate::error::Result;
use crate::model::{format_date_time, parse_date_time, ExportedMessage, FormData, FormType};

use super::{form_mismatch, FormScorer, Grader};

#[derive(Debug, Default, Clone, Copy)]
pub struct Ics213Scorer;

impl FormScorer for Ics213Scorer {
    fn form_type(&self) -> FormType {
        FormType::Ics213
    }

    fn score(
        &self,
        submitted: &ExportedMessage,
        reference: &ExportedMessage,
        g: &mut Grader,
    ) -> Result<()> {
        let (FormData::Ics213(m), FormData::Ics213(r)) = (&submitted.form, &reference.form) else {
            return Err(form_mismatch(self.form_type(), submitted, reference));
        };

        g.starts_with(
            "Message Subject should start with #EV",
            &reference.subject,
            &submitted.subject,
        );
        g.location_valid("Message Location should be valid", submitted.msg_location.as_ref());
        g.location_valid("Form Location should be valid", m.form_location.as_ref());
        g.equals("Organization Name should be #EV", &r.organization, &m.organization);
        g.check("THIS IS AN EXERCISE should be checked", m.is_exercise, "");
        g.equals("Incident Name should be #EV", &r.incident_name, &m.incident_name);
        g.equals("Form To should be #EV", &r.form_to, &m.form_to);
        g.equals("Form From should be #EV", &r.form_from, &m.form_from);
        g.equals("Form Subject should be #EV", &r.form_subject, &m.form_subject);

        let raw = format!("{} {}", m.form_date, m.form_time);
        let form_date_time = parse_date_time(&raw);
        let detail = form_date_time.as_ref().map(format_date_time).unwrap_or(raw);
        g.within_window("Form Date and Time", form_date_time, &detail);

        g.equals("Message should be #EV", &r.form_message, &m.form_message);
        g.equals("Approved by should be #EV", &r.approved_by, &m.approved_by);
        g.equals("Position/Title should be #EV", &r.position, &m.position);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Ics213Form, LatLong};
    use crate::scoring::test_support::*;

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

    #[test]
    fn matching_form_passes() {
        let reference = message("REF", FormData::Ics213(form()));
        let mut g = Grader::new(window());
        Ics213Scorer.score(&reference.clone(), &reference, &mut g).unwrap();
        assert!(g.explanations().is_empty());
    }

    #[test]
    fn mismatches_are_explained_in_rule_order() {
        let reference = message("REF", FormData::Ics213(form()));
        let mut submitted = reference.clone();
        submitted.subject = "RE: something".into();
        submitted.form = FormData::Ics213(Ics213Form {
            organization: "eoc".into(),
            form_date: "2026/10/20".into(),
            form_time: "10:00".into(),
            ..form()
        });

        let mut g = Grader::new(window());
        Ics213Scorer.score(&submitted, &reference, &mut g).unwrap();
        let texts: Vec<&str> = g.explanations().iter().map(|e| e.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "Message Subject should start with ETO Practice",
                "Organization Name should be EOC",
                "Form Date and Time should be on or before 2026-10-16 08:00",
            ]
        );
    }

    #[test]
    fn unparsable_form_date_fails_both_window_checks() {
        let reference = message("REF", FormData::Ics213(form()));
        let mut submitted = reference.clone();
        submitted.form = FormData::Ics213(Ics213Form {
            form_date: "Tuesday".into(),
            ..form()
        });
        let mut g = Grader::new(window());
        Ics213Scorer.score(&submitted, &reference, &mut g).unwrap();
        assert_eq!(g.explanations().len(), 2);
        assert_eq!(g.explanations()[0].detail, "Tuesday 10:00");
    }

    #[test]
    fn wrong_form_is_an_error() {
        let reference = message("REF", FormData::Ics213(form()));
        let submitted = message("KM6SO", FormData::Plain);
        let mut g = Grader::new(window());
        assert!(Ics213Scorer.score(&submitted, &reference, &mut g).is_err());
    }
}
