//! ICS-205 Radio Communications Plan rules.

use crate::error::Result;
use crate::model::{
    format_date_time, parse_date_time, ExportedMessage, FormData, FormType, RadioEntry,
};

use super::{form_mismatch, FormScorer, Grader};

#[derive(Debug, Default, Clone, Copy)]
pub struct Ics205Scorer;

impl FormScorer for Ics205Scorer {
    fn form_type(&self) -> FormType {
        FormType::Ics205
    }

    fn score(
        &self,
        submitted: &ExportedMessage,
        reference: &ExportedMessage,
        g: &mut Grader,
    ) -> Result<()> {
        let (FormData::Ics205(m), FormData::Ics205(r)) = (&submitted.form, &reference.form) else {
            return Err(form_mismatch(self.form_type(), submitted, reference));
        };

        g.starts_with(
            "Message Subject should start with #EV",
            &reference.subject,
            &submitted.subject,
        );
        g.location_valid("Message Location should be valid", submitted.msg_location.as_ref());
        g.equals("Organization Name should be #EV", &r.organization, &m.organization);
        g.equals("Incident Name should be #EV", &r.incident_name, &m.incident_name);

        window_field(g, "Date/Time prepared", &m.date_time_prepared);
        g.equals("Op Period Date From should be #EV", &r.date_from, &m.date_from);
        g.equals("Op Period Date To should be #EV", &r.date_to, &m.date_to);
        g.equals("Op Period Time From should be #EV", &r.time_from, &m.time_from);
        g.equals("Op Period Time To should be #EV", &r.time_to, &m.time_to);
        g.equals(
            "Special Instructions should be #EV",
            &r.special_instructions,
            &m.special_instructions,
        );
        g.equals("Approved by should be #EV", &r.approved_by, &m.approved_by);

        g.line_items(
            "radio entries",
            submitted,
            &r.radio_entries,
            &m.radio_entries,
            |n| format!("  channel use (line {n}) "),
            score_radio_entry,
        )?;

        window_field(g, "Date/Time approved", &m.approved_date_time);
        g.equals("IAP Page should be #EV", &r.iap_page, &m.iap_page);
        Ok(())
    }
}

fn window_field(g: &mut Grader, what: &str, raw: &str) {
    let parsed = parse_date_time(raw);
    let detail = parsed
        .as_ref()
        .map(format_date_time)
        .unwrap_or_else(|| raw.to_string());
    g.within_window(what, parsed, &detail);
}

fn score_radio_entry(g: &mut Grader, reference: &RadioEntry, entry: &RadioEntry) -> Result<()> {
    if reference.is_empty() {
        g.empty("Zone/Group should be empty", &entry.zone_group);
        g.empty("Channel # should be empty", &entry.channel_number);
        g.empty("Function should be empty", &entry.function);
        g.empty("Channel Name should be empty", &entry.channel_name);
        g.empty("Assignment should be empty", &entry.assignment);
        g.empty("RX Freq should be empty", &entry.rx_frequency);
        g.empty("RX N or W should be empty", &entry.rx_narrow_wide);
        g.empty("RX Tone should be empty", &entry.rx_tone);
        g.empty("TX Freq should be empty", &entry.tx_frequency);
        g.empty("TX N or W should be empty", &entry.tx_narrow_wide);
        g.empty("TX Tone should be empty", &entry.tx_tone);
        g.empty("Mode should be empty", &entry.mode);
        g.empty("Remarks should be empty", &entry.remarks);
        return Ok(());
    }

    g.empty("Zone/Group should be empty", &entry.zone_group);
    g.equals("Channel # should be #EV", &reference.channel_number, &entry.channel_number);
    g.equals("Function should be #EV", &reference.function, &entry.function);
    g.equals("Channel Name should be #EV", &reference.channel_name, &entry.channel_name);
    g.equals("Assignment should be #EV", &reference.assignment, &entry.assignment);
    g.numeric("RX Freq should be #EV", &reference.rx_frequency, &entry.rx_frequency)?;
    g.equals_or_empty("RX N or W", &reference.rx_narrow_wide, &entry.rx_narrow_wide);
    g.numeric_or_empty("RX Tone", &reference.rx_tone, &entry.rx_tone)?;
    g.numeric_or_empty("TX Freq", &reference.tx_frequency, &entry.tx_frequency)?;
    g.equals_or_empty("TX N or W", &reference.tx_narrow_wide, &entry.tx_narrow_wide);
    g.numeric_or_empty("TX Tone", &reference.tx_tone, &entry.tx_tone)?;
    g.equals("Mode should be #EV", &reference.mode, &entry.mode);
    g.equals("Remarks should be #EV", &reference.remarks, &entry.remarks);
    Ok(())
}
