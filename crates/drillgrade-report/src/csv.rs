//! Minimal CSV writer.
//!
//! Fields are quoted only when they contain a comma, a quote or a line
//! break; embedded quotes are doubled.

use std::borrow::Cow;
use std::path::Path;

use anyhow::{Context, Result};

pub fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

fn push_record<S: AsRef<str>>(out: &mut String, fields: &[S]) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&escape_field(field.as_ref()));
    }
    out.push('\n');
}

/// Render a header row followed by `rows`.
pub fn render_table(headers: &[&str], rows: impl IntoIterator<Item = Vec<String>>) -> String {
    let mut out = String::new();
    push_record(&mut out, headers);
    for row in rows {
        push_record(&mut out, &row);
    }
    out
}

/// Write a table to `path`, creating parent directories.
pub fn write_table(
    path: &Path,
    headers: &[&str],
    rows: impl IntoIterator<Item = Vec<String>>,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = render_table(headers, rows);
    std::fs::write(path, content)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_fields_are_not_quoted() {
        assert_eq!(escape_field("KM6SO"), "KM6SO");
        assert!(matches!(escape_field("KM6SO"), Cow::Borrowed(_)));
    }

    #[test]
    fn special_fields_are_quoted() {
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_field("line 1\nline 2"), "\"line 1\nline 2\"");
    }

    #[test]
    fn table_layout() {
        let table = render_table(
            &["From", "Feedback"],
            vec![vec!["KM6SO".into(), "Perfect Message!".into()]],
        );
        assert_eq!(table, "From,Feedback\nKM6SO,Perfect Message!\n");
    }
}
