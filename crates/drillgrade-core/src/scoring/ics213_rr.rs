//! ICS-213 RR Resource Request rules.

use crate::error::Result;
use crate::model::{
    format_date_time, parse_date_time, ExportedMessage, FormData, FormType, ResourceLineItem,
};

use super::{form_mismatch, FormScorer, Grader};

#[derive(Debug, Default, Clone, Copy)]
pub struct Ics213RrScorer;

impl FormScorer for Ics213RrScorer {
    fn form_type(&self) -> FormType {
        FormType::Ics213Rr
    }

    fn score(
        &self,
        submitted: &ExportedMessage,
        reference: &ExportedMessage,
        g: &mut Grader,
    ) -> Result<()> {
        let (FormData::Ics213Rr(m), FormData::Ics213Rr(r)) = (&submitted.form, &reference.form)
        else {
            return Err(form_mismatch(self.form_type(), submitted, reference));
        };

        g.multi_line_equals(
            "Message Subject should be #EV",
            &reference.subject,
            &submitted.subject,
        );
        g.location_valid("Message Location should be valid", submitted.msg_location.as_ref());
        g.equals("Organization Name should be #EV", &r.organization, &m.organization);
        g.equals("Incident Name should be #EV", &r.incident_name, &m.incident_name);

        let activity = parse_date_time(&m.activity_date_time);
        let detail = activity
            .as_ref()
            .map(format_date_time)
            .unwrap_or_else(|| m.activity_date_time.clone());
        g.within_window("Form Date and Time", activity, &detail);

        g.equals("Resource Request Number should be #EV", &r.request_number, &m.request_number);

        g.line_items(
            "line items",
            submitted,
            &r.line_items,
            &m.line_items,
            |n| format!("(line {n}) "),
            |g, reference_item, item| {
                score_line_item(g, reference_item, item);
                Ok(())
            },
        )?;

        g.equals("Delivery/Reporting Location should be #EV", &r.delivery, &m.delivery);
        g.equals("Substitutes should be #EV", &r.substitutes, &m.substitutes);
        g.equals("Requested by should be #EV", &r.requested_by, &m.requested_by);
        g.equals("Priority should be #EV", &r.priority, &m.priority);
        g.equals("Approved by should be #EV", &r.approved_by, &m.approved_by);

        // Logistics and finance sections are filled in by the receiving side.
        g.empty("Logistics Order Number should be empty", &m.logistics_order_number);
        g.empty("Supplier Phone Number should be empty", &m.supplier_info);
        g.empty("Supplier Name should be empty", &m.supplier_name);
        g.empty("Supplier POC should be empty", &m.supplier_point_of_contact);
        g.empty("Supply Notes should be empty", &m.supply_notes);
        g.empty("Logistics Authorizer should be empty", &m.logistics_authorizer);
        g.empty("Logistics Date/Time should be empty", &m.logistics_date_time);
        g.empty("Logistics Ordered by should be empty", &m.ordered_by);
        g.empty("Finance Comments should be empty", &m.finance_comments);
        g.empty("Finance Section Chief Name should be empty", &m.finance_name);
        g.empty("Finance Date/Time should be empty", &m.finance_date_time);
        Ok(())
    }
}

fn score_line_item(g: &mut Grader, reference: &ResourceLineItem, item: &ResourceLineItem) {
    if reference.is_empty() {
        g.empty("Quantity should be empty", &item.quantity);
        g.empty("Kind should be empty", &item.kind);
        g.empty("Type should be empty", &item.item_type);
        g.empty("Item should be empty", &item.item);
        g.empty("Requested Date/Time should be empty", &item.requested_date_time);
        g.empty("Estimated Date/Time should be empty", &item.estimated_date_time);
        g.empty("Cost should be empty", &item.cost);
        return;
    }

    g.equals("Quantity should be #EV", &reference.quantity, &item.quantity);
    g.equals_or_empty("Kind", &reference.kind, &item.kind);
    g.equals_or_empty("Type", &reference.item_type, &item.item_type);
    g.multi_line_equals("Item should be #EV", &reference.item, &item.item);
    g.equals(
        "Requested Date/Time should be #EV",
        &reference.requested_date_time,
        &item.requested_date_time,
    );
    g.empty("Estimated Date/Time should be empty", &item.estimated_date_time);
    g.empty("Cost should be empty", &item.cost);
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::model::Ics213RrForm;
    use crate::scoring::test_support::*;

    fn item(quantity: &str, item: &str) -> ResourceLineItem {
        ResourceLineItem {
            quantity: quantity.into(),
            item: item.into(),
            requested_date_time: "ASAP".into(),
            ..Default::default()
        }
    }

    fn form() -> Ics213RrForm {
        Ics213RrForm {
            organization: "EOC".into(),
            incident_name: "Cascadia Quake".into(),
            activity_date_time: "2026-10-14 09:00".into(),
            request_number: "RR-7".into(),
            line_items: vec![item("4", "Cots"), item("2", "Generators"), ResourceLineItem::default()],
            delivery: "Station 3".into(),
            priority: "Urgent".into(),
            ..Default::default()
        }
    }

    fn rr_message(form: Ics213RrForm) -> ExportedMessage {
        let mut m = message("KM6SO", FormData::Ics213Rr(form));
        m.subject = "ICS-213RR Resource Request".into();
        m
    }

    #[test]
    fn matching_request_passes() {
        let reference = rr_message(form());
        let mut g = Grader::new(window());
        Ics213RrScorer.score(&reference.clone(), &reference, &mut g).unwrap();
        assert!(g.explanations().is_empty(), "{:?}", g.explanations());
    }

    #[test]
    fn line_item_failures_carry_line_prefix() {
        let reference = rr_message(form());
        let mut f = form();
        f.line_items[1].quantity = "3".into();
        f.line_items[2].cost = "$40".into();
        let submitted = rr_message(f);

        let mut g = Grader::new(window());
        Ics213RrScorer.score(&submitted, &reference, &mut g).unwrap();
        let texts: Vec<&str> = g.explanations().iter().map(|e| e.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["(line 2) Quantity should be 2", "(line 3) Cost should be empty"]
        );
    }

    #[test]
    fn short_item_list_scores_common_prefix() {
        let reference = rr_message(form());
        let mut f = form();
        f.line_items.truncate(1);
        let submitted = rr_message(f);
        let mut g = Grader::new(window());
        Ics213RrScorer.score(&submitted, &reference, &mut g).unwrap();
        assert!(g.explanations().is_empty());
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn item_count_mismatch_is_logged() {
        let reference = rr_message(form());
        let mut f = form();
        f.line_items.truncate(2);
        f.line_items[1].quantity = "3".into();
        let submitted = rr_message(f);

        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let mut g = Grader::new(window());
        tracing::subscriber::with_default(subscriber, || {
            Ics213RrScorer.score(&submitted, &reference, &mut g).unwrap();
        });

        let texts: Vec<&str> = g.explanations().iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["(line 2) Quantity should be 2"]);

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("WARN"), "{output}");
        assert!(output.contains("count differs from reference"), "{output}");
        assert!(output.contains("submitted=2"), "{output}");
        assert!(output.contains("reference=3"), "{output}");
    }

    #[test]
    fn wrapped_subject_matches() {
        let reference = rr_message(form());
        let mut submitted = reference.clone();
        submitted.subject = "ICS-213RR\nResource Request".into();
        let mut g = Grader::new(window());
        Ics213RrScorer.score(&submitted, &reference, &mut g).unwrap();
        assert!(g.explanations().is_empty());
    }

    #[test]
    fn logistics_section_must_be_blank() {
        let reference = rr_message(form());
        let mut f = form();
        f.finance_name = "Pat".into();
        let submitted = rr_message(f);
        let mut g = Grader::new(window());
        Ics213RrScorer.score(&submitted, &reference, &mut g).unwrap();
        assert_eq!(
            g.explanations()[0].text,
            "Finance Section Chief Name should be empty"
        );
    }
}
