//! HICS-259 Hospital Casualty/Fatality Report rules.

use crate::error::Result;
use crate::model::{CasualtyEntry, ExportedMessage, FormData, FormType, Hics259Form};

use super::{form_mismatch, FormScorer, Grader};

#[derive(Debug, Default, Clone, Copy)]
pub struct Hics259Scorer;

impl FormScorer for Hics259Scorer {
    fn form_type(&self) -> FormType {
        FormType::Hics259
    }

    fn score(
        &self,
        submitted: &ExportedMessage,
        reference: &ExportedMessage,
        g: &mut Grader,
    ) -> Result<()> {
        let (FormData::Hics259(m), FormData::Hics259(r)) = (&submitted.form, &reference.form) else {
            return Err(form_mismatch(self.form_type(), submitted, reference));
        };

        g.starts_with(
            "Message Subject should start with #EV",
            &reference.subject,
            &submitted.subject,
        );
        g.location_valid("Message Location should be valid", submitted.msg_location.as_ref());
        g.equals("Incident name should be #EV", &r.incident_name, &m.incident_name);
        g.present("Form Date should be present", &m.form_date);
        g.present("Form Time should be present", &m.form_time);
        g.equals(
            "Operational Period # should be #EV",
            &r.operational_period,
            &m.operational_period,
        );
        g.equals("Operational Date From should be #EV", &r.op_from_date, &m.op_from_date);
        g.equals("Operational Date To should be #EV", &r.op_to_date, &m.op_to_date);
        g.equals("Operational Time From should be #EV", &r.op_from_time, &m.op_from_time);
        g.equals("Operational Time To should be #EV", &r.op_to_time, &m.op_to_time);

        let blank = CasualtyEntry::default();
        for key in Hics259Form::CASUALTY_KEYS {
            let expected = r.casualties.get(key).unwrap_or(&blank);
            let actual = m.casualties.get(key).unwrap_or(&blank);
            g.equals(
                &format!("{key} Adult Count should be #EV"),
                &expected.adult_count,
                &actual.adult_count,
            );
            g.equals(
                &format!("{key} Pediatric Count should be #EV"),
                &expected.child_count,
                &actual.child_count,
            );
            g.equals(
                &format!("{key} Comment should be #EV"),
                &expected.comment,
                &actual.comment,
            );
        }

        g.equals(
            "Patient Tracking Manager should be #EV",
            &r.patient_tracking_manager,
            &m.patient_tracking_manager,
        );
        g.equals("Facility Name should be #EV", &r.facility_name, &m.facility_name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::scoring::test_support::*;

    fn form(admitted_adults: &str) -> Hics259Form {
        let mut casualties = HashMap::new();
        casualties.insert(
            "Admitted".to_string(),
            CasualtyEntry {
                adult_count: admitted_adults.into(),
                child_count: "1".into(),
                comment: String::new(),
            },
        );
        Hics259Form {
            incident_name: "Cascadia Quake".into(),
            form_date: "2026-10-14".into(),
            form_time: "10:00".into(),
            operational_period: "1".into(),
            casualties,
            facility_name: "Valley General".into(),
            ..Default::default()
        }
    }

    #[test]
    fn casualty_rows_are_compared_by_key() {
        let reference = message("REF", FormData::Hics259(form("12")));
        let mut submitted = reference.clone();
        submitted.form = FormData::Hics259(form("21"));
        let mut g = Grader::new(window());
        Hics259Scorer.score(&submitted, &reference, &mut g).unwrap();
        let texts: Vec<&str> = g.explanations().iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["Admitted Adult Count should be 12"]);
    }

    #[test]
    fn missing_rows_count_as_blank() {
        let reference = message("REF", FormData::Hics259(form("12")));
        let mut submitted = reference.clone();
        let mut f = form("12");
        f.casualties.clear();
        f.form_time.clear();
        submitted.form = FormData::Hics259(f);
        let mut g = Grader::new(window());
        Hics259Scorer.score(&submitted, &reference, &mut g).unwrap();
        let texts: Vec<&str> = g.explanations().iter().map(|e| e.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "Form Time should be present",
                "Admitted Adult Count should be 12",
                "Admitted Pediatric Count should be 1",
            ]
        );
    }
}
