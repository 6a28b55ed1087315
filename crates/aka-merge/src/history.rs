//! Merge history snapshots.
//!
//! A [`HistorySnapshot`] records what a merge group looked like before the
//! host merged it: a bibliographic export of every record, the keys
//! involved, and the prior free-text field of each record. It is rendered as
//! an HTML note and attached to the surviving record.

use chrono::{DateTime, Utc};

use aka_types::{Record, RecordKey};

/// The prior value of the audit field on one record of the group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuditValue {
    pub key: RecordKey,
    pub primary: bool,
    pub value: String,
}

/// Pre-merge state of a merge group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistorySnapshot {
    pub actor: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub export: String,
    pub library: String,
    pub primary: RecordKey,
    pub secondaries: Vec<RecordKey>,
    pub audit_field: String,
    pub audit: Vec<AuditValue>,
}

impl HistorySnapshot {
    /// Capture the group's state. Pure: reads only its arguments.
    pub fn build(
        primary: &Record,
        secondaries: &[Record],
        export: &str,
        actor: Option<&str>,
        timestamp: DateTime<Utc>,
        audit_field: &str,
    ) -> Self {
        let audit = std::iter::once((primary, true))
            .chain(secondaries.iter().map(|s| (s, false)))
            .map(|(record, primary)| AuditValue {
                key: record.key.clone(),
                primary,
                value: record.metadata().to_string(),
            })
            .collect();

        Self {
            actor: actor.filter(|a| !a.is_empty()).map(str::to_string),
            timestamp,
            export: export.to_string(),
            library: primary.library.key().to_string(),
            primary: primary.key.clone(),
            secondaries: secondaries.iter().map(|s| s.key.clone()).collect(),
            audit_field: audit_field.to_string(),
            audit,
        }
    }

    /// Render as an HTML note body.
    pub fn render(&self) -> String {
        let mut out = format!(
            "<div><b>Item history ({})</b></div>\n",
            attribution(self.actor.as_deref(), &self.timestamp)
        );
        out.push_str(&format!("<pre>{}</pre>\n", escape_html(&self.export)));

        out.push_str("<div>\n");
        out.push_str(&format!("<p>group: {}</p>\n", escape_html(&self.library)));
        out.push_str(&format!("<p>itemKey: {}</p>\n", self.primary));
        let old_keys: Vec<&str> = self.secondaries.iter().map(RecordKey::as_str).collect();
        out.push_str(&format!("<p>itemKeyOld: {}</p>\n", old_keys.join(", ")));
        out.push_str("</div>\n");

        out.push_str("<div>\n");
        for entry in &self.audit {
            let label = if entry.primary {
                format!("item.{}", self.audit_field)
            } else {
                format!("itemOLD.{} ({})", self.audit_field, entry.key)
            };
            out.push_str(&format!(
                "<p>{}: {}</p>\n",
                escape_html(&label),
                text_to_html(&entry.value)
            ));
        }
        out.push_str("</div>\n");
        out
    }
}

/// A single record's export, saved as an "Item details" note on demand.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemDetails {
    pub actor: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub export: String,
}

impl ItemDetails {
    pub fn render(&self) -> String {
        format!(
            "<p><b>Item details ({})</b></p>\n<pre>{}</pre>",
            attribution(self.actor.as_deref(), &self.timestamp),
            escape_html(&self.export)
        )
    }
}

fn attribution(actor: Option<&str>, timestamp: &DateTime<Utc>) -> String {
    let when = timestamp.format("%Y-%m-%d %H:%M:%S UTC");
    match actor {
        Some(actor) => format!("{}, {when}", escape_html(actor)),
        None => when.to_string(),
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

fn text_to_html(text: &str) -> String {
    escape_html(text).replace('\n', "<br>")
}
