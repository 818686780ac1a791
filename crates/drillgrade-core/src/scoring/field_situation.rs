//! Field Situation Report rules.

use crate::error::{GradeError, Result};
use crate::model::{ExportedMessage, FieldSituationForm, FormData, FormType, ServiceReport};

use super::{form_mismatch, CompanionRule, FormScorer, Grader};

type Select = fn(&FieldSituationForm) -> &ServiceReport;

const fn rule(status_label: &'static str, comment_label: &'static str) -> CompanionRule {
    CompanionRule {
        status_label,
        comment_label,
        trigger: "NO",
    }
}

/// Infrastructure status rows, in form order.
static SERVICES: [(CompanionRule, Select); 15] = [
    (
        rule("POTS landlines functioning should be #EV", "POTS provider"),
        |f| &f.landline,
    ),
    (
        rule("VOIP landlines functioning should be #EV", "VOIP provider"),
        |f| &f.voip,
    ),
    (
        rule(
            "Cell phone voice functioning should be #EV",
            "Cell phone voice provider",
        ),
        |f| &f.cell_phone,
    ),
    (
        rule(
            "Cell phone text functioning should be #EV",
            "Cell phone text provider",
        ),
        |f| &f.cell_text,
    ),
    (
        rule("AM/FM Broadcast functioning should be #EV", "AM/FM stations"),
        |f| &f.radio,
    ),
    (
        rule("OTA TV functioning should be #EV", "OTA TV stations"),
        |f| &f.tv,
    ),
    (
        rule("Satellite TV functioning should be #EV", "Satellite TV provider"),
        |f| &f.sat_tv,
    ),
    (
        rule("Cable TV functioning should be #EV", "Cable TV provider"),
        |f| &f.cable_tv,
    ),
    (
        rule(
            "Public Water Works functioning should be #EV",
            "Public Water Works provider",
        ),
        |f| &f.water,
    ),
    (
        rule(
            "Commercial Power functioning should be #EV",
            "Commercial Power provider",
        ),
        |f| &f.power,
    ),
    (
        rule(
            "Commercial Power stable should be #EV",
            "Commercial Power Stable provider",
        ),
        |f| &f.power_stable,
    ),
    (
        rule(
            "Natural Gas supply functioning should be #EV",
            "Natural Gas provider",
        ),
        |f| &f.natural_gas,
    ),
    (
        rule("Internet functioning should be #EV", "Internet provider"),
        |f| &f.internet,
    ),
    (
        rule(
            "NOAA Weather Radio functioning should be #EV",
            "NOAA Weather Radio station",
        ),
        |f| &f.noaa,
    ),
    // Degraded audio is the one row where YES asks for a comment.
    (
        CompanionRule {
            status_label: "NOAA Weather audio degraded should be #EV",
            comment_label: "NOAA Weather Radio degraded station",
            trigger: "YES",
        },
        |f| &f.noaa_audio_degraded,
    ),
];

#[derive(Debug, Default, Clone, Copy)]
pub struct FieldSituationScorer;

impl FormScorer for FieldSituationScorer {
    fn form_type(&self) -> FormType {
        FormType::FieldSituation
    }

    fn score(
        &self,
        submitted: &ExportedMessage,
        reference: &ExportedMessage,
        g: &mut Grader,
    ) -> Result<()> {
        let (FormData::FieldSituation(m), FormData::FieldSituation(r)) =
            (&submitted.form, &reference.form)
        else {
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
        g.equals("Precedence should be #EV", &r.precedence, &m.precedence);
        g.present("Form Date/Time should be present", &m.form_date_time);
        g.equals("Task # should be #EV", &r.task, &m.task);
        g.equals(
            "Emergent/Life Safety need should be #EV",
            &r.is_help_needed,
            &m.is_help_needed,
        );
        g.equals("City should be #EV", &r.city, &m.city);
        g.equals("County should be #EV", &r.county, &m.county);
        g.empty("Territory should be empty", &m.territory);

        let expected = r.form_location.ok_or_else(|| GradeError::ReferenceParse {
            field: "form_location".into(),
            expected: "location",
            value: String::new(),
        })?;
        let detail = m.form_location.map(|l| l.to_string()).unwrap_or_default();
        g.numeric_value(
            "LAT should be #EV",
            expected.latitude,
            m.form_location.map(|l| l.latitude),
            &detail,
        );
        g.numeric_value(
            "LON should be #EV",
            expected.longitude,
            m.form_location.map(|l| l.longitude),
            &detail,
        );

        for (rule, select) in &SERVICES {
            g.companion(rule, select(r), select(m));
        }

        g.equals(
            "Additional comments should be #EV",
            &r.additional_comments,
            &m.additional_comments,
        );
        g.equals("POC should be #EV", &r.poc, &m.poc);
        Ok(())
    }
}
