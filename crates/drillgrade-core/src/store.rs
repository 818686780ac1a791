//! In-memory message store.

use std::collections::{BTreeMap, HashMap};

use crate::model::{ExportedMessage, FormType};
use crate::traits::MessageStore;

/// Messages grouped by sender in order of first appearance.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMessageStore {
    order: Vec<String>,
    by_sender: HashMap<String, Vec<ExportedMessage>>,
}

impl InMemoryMessageStore {
    pub fn new(messages: Vec<ExportedMessage>) -> Self {
        let mut store = Self::default();
        for message in messages {
            let sender = message.from.trim().to_uppercase();
            store
                .by_sender
                .entry(sender.clone())
                .or_insert_with(|| {
                    store.order.push(sender);
                    Vec::new()
                })
                .push(message);
        }
        for messages in store.by_sender.values_mut() {
            messages.sort_by(|a, b| {
                a.sort_key()
                    .cmp(&b.sort_key())
                    .then_with(|| a.message_id.cmp(&b.message_id))
            });
        }
        store
    }

    pub fn message_count(&self) -> usize {
        self.by_sender.values().map(Vec::len).sum()
    }

    pub fn sender_count(&self) -> usize {
        self.order.len()
    }

    fn normalized(sender: &str) -> String {
        sender.trim().to_uppercase()
    }
}

impl MessageStore for InMemoryMessageStore {
    fn senders(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    fn messages_for_sender(&self, sender: &str) -> BTreeMap<FormType, Vec<&ExportedMessage>> {
        let mut grouped: BTreeMap<FormType, Vec<&ExportedMessage>> = BTreeMap::new();
        for message in self.all_messages_for_sender(sender) {
            grouped.entry(message.form_type()).or_default().push(message);
        }
        grouped
    }

    fn all_messages_for_sender(&self, sender: &str) -> Vec<&ExportedMessage> {
        self.by_sender
            .get(&Self::normalized(sender))
            .map(|messages| messages.iter().collect())
            .unwrap_or_default()
    }
}
