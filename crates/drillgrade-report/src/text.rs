//! Plain-text rendering of outbound messages.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};

use drillgrade_core::acknowledgement::SEPARATOR;
use drillgrade_core::results::OutboundMessage;

/// Every outbound message, one block each, in the order given.
pub fn render_all_feedback(messages: &[OutboundMessage]) -> String {
    let mut out = String::new();
    for message in messages {
        let _ = writeln!(out, "From: {}", message.from);
        let _ = writeln!(out, "To: {}", message.to);
        let _ = writeln!(out, "Subject: {}", message.subject);
        out.push('\n');
        out.push_str(&message.body);
        if !message.body.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(SEPARATOR);
        out.push_str("\n\n");
    }
    out
}

pub fn write_all_feedback(messages: &[OutboundMessage], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, render_all_feedback(messages))
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
