//! Chat-webhook message composition.
//!
//! Messages follow the common embed shape accepted by chat webhooks
//! (`username`, `content`, `embeds[]` with titled fields and a footer). Field
//! values are bounded so the receiver never rejects a message for length.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    report::{ReportSubmission, TicketId},
    signup::SignupRecord,
};

/// Maximum characters in an embed field value.
pub const FIELD_VALUE_LIMIT: usize = 1024;
/// Maximum characters of reproduction steps.
pub const STEPS_LIMIT: usize = 1024;
/// Maximum characters of error output, before code fencing.
pub const ERROR_OUTPUT_LIMIT: usize = 900;
/// Maximum characters in an embed description.
pub const DESCRIPTION_LIMIT: usize = 4096;
/// Shown for optional fields the reporter left empty.
pub const PLACEHOLDER: &str = "Not provided";

const REPORT_COLOR: u32 = 0x00E7_4C3C;
const SIGNUP_COLOR: u32 = 0x002E_CC71;
const DUPLICATE_COLOR: u32 = 0x0095_A5A6;

/// Top-level webhook body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookMessage {
    /// Display name override for the posting bot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Plain-text content above the embeds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Rich embeds.
    pub embeds: Vec<Embed>,
}

/// Rich message block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Embed {
    /// Bold heading.
    pub title: String,
    /// Free text under the title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Sidebar color as 0xRRGGBB.
    pub color: u32,
    /// Labelled values.
    pub fields: Vec<EmbedField>,
    /// Small text under the fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
    /// RFC 3339 timestamp rendered by the client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Labelled value inside an embed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedField {
    /// Label.
    pub name: String,
    /// Value, at most [`FIELD_VALUE_LIMIT`] characters.
    pub value: String,
    /// Render side by side with neighbouring inline fields.
    #[serde(default)]
    pub inline: bool,
}

/// Embed footer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedFooter {
    /// Footer text.
    pub text: String,
}

impl EmbedField {
    fn new(name: &str, value: impl Into<String>, inline: bool) -> Self {
        Self { name: name.to_string(), value: truncate(&value.into(), FIELD_VALUE_LIMIT), inline }
    }

    fn or_placeholder(name: &str, value: Option<&str>, inline: bool) -> Self {
        Self::new(name, value.unwrap_or(PLACEHOLDER), inline)
    }
}

/// Builds the report notification. The ticket id appears in the title and
/// the footer so it can be searched for in the channel.
pub fn compose_report_message(
    submission: &ReportSubmission,
    ticket: &TicketId,
    submitted_at: DateTime<Utc>,
) -> WebhookMessage {
    let steps = submission.steps.as_deref().map(|s| truncate(s, STEPS_LIMIT));
    let error_output = submission
        .error_output
        .as_deref()
        .map(|s| format!("```\n{}\n```", truncate(s, ERROR_OUTPUT_LIMIT)));
    let attachment = submission.attachment.as_ref().map(|a| {
        format!("{} ({}, {} bytes)", a.file_name, a.content_type, a.len())
    });

    let fields = vec![
        EmbedField::or_placeholder("Location", submission.location.as_deref(), true),
        EmbedField::or_placeholder("Contact", submission.email.as_deref(), true),
        EmbedField::or_placeholder("Page URL", submission.page_url.as_deref(), false),
        EmbedField::or_placeholder("Steps to reproduce", steps.as_deref(), false),
        EmbedField::or_placeholder("Error output", error_output.as_deref(), false),
        EmbedField::or_placeholder("User agent", submission.user_agent.as_deref(), false),
        EmbedField::or_placeholder("Viewport", submission.viewport.as_deref(), true),
        EmbedField::or_placeholder("Attachment", attachment.as_deref(), true),
    ];

    WebhookMessage {
        username: Some("Bug Reports".to_string()),
        content: None,
        embeds: vec![Embed {
            title: truncate(&format!("[{ticket}] {}", submission.summary), 256),
            description: Some(truncate(&submission.summary, DESCRIPTION_LIMIT)),
            color: REPORT_COLOR,
            fields,
            footer: Some(EmbedFooter { text: format!("Ticket {ticket}") }),
            timestamp: Some(submitted_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
        }],
    }
}

/// Builds the signup notification.
///
/// `emails` is every known signup, including this one when it was new. The
/// enumerated list goes into the description, cut to [`DESCRIPTION_LIMIT`]
/// with an "...and N more" tail.
pub fn compose_signup_message(
    record: &SignupRecord,
    emails: &[String],
    is_duplicate: bool,
) -> WebhookMessage {
    let mut fields = vec![
        EmbedField::new("Email", record.email.as_str(), true),
        EmbedField::new("Source", record.source.label(), true),
    ];
    let optional = [
        ("Name", &record.name),
        ("Platform", &record.platform),
        ("Experience", &record.experience),
        ("First tool", &record.first_tool),
        ("Idea", &record.idea),
        ("Path", &record.path),
    ];
    for (name, value) in optional {
        if let Some(value) = value {
            fields.push(EmbedField::new(name, value.as_str(), name != "Idea"));
        }
    }
    fields.push(EmbedField::new("Total signups", emails.len().to_string(), true));

    let (title, color) = if is_duplicate {
        (format!("Duplicate signup ({})", record.source.label()), DUPLICATE_COLOR)
    } else {
        (format!("New signup ({})", record.source.label()), SIGNUP_COLOR)
    };

    WebhookMessage {
        username: Some("Signups".to_string()),
        content: None,
        embeds: vec![Embed {
            title,
            description: enumerate_emails(emails, DESCRIPTION_LIMIT),
            color,
            fields,
            footer: None,
            timestamp: Some(record.submitted_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
        }],
    }
}

/// Pre-filled `mailto:` link offered when automated delivery fails.
pub fn mailto_link(
    support_email: &str,
    ticket: Option<&TicketId>,
    submission: Option<&ReportSubmission>,
) -> String {
    let subject = match ticket {
        Some(ticket) => format!("Bug report {ticket}"),
        None => "Bug report".to_string(),
    };

    let mut body = Vec::new();
    if let Some(ticket) = ticket {
        body.push(format!("Ticket: {ticket}"));
    }
    if let Some(s) = submission {
        body.push(format!("Summary: {}", s.summary));
        body.push(format!("Location: {}", s.location.as_deref().unwrap_or(PLACEHOLDER)));
        body.push(format!("Contact: {}", s.email.as_deref().unwrap_or(PLACEHOLDER)));
        body.push(format!("Page URL: {}", s.page_url.as_deref().unwrap_or(PLACEHOLDER)));
    }
    body.push(String::new());
    body.push("Describe what happened:".to_string());

    format!(
        "mailto:{support_email}?subject={}&body={}",
        urlencoding::encode(&subject),
        urlencoding::encode(&body.join("\n"))
    )
}

/// Cuts `text` to at most `limit` characters, ending in "..." when cut.
pub fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let keep = limit.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

fn enumerate_emails(emails: &[String], limit: usize) -> Option<String> {
    if emails.is_empty() {
        return None;
    }

    let reserve = format!("\n...and {} more", emails.len()).len();
    let mut out = String::new();
    let mut used = 0;

    for (i, email) in emails.iter().enumerate() {
        let line = format!("{}. {}", i + 1, email);
        let sep = usize::from(i > 0);
        let len = line.chars().count();
        let is_last = i + 1 == emails.len();
        let needed = used + sep + len + if is_last { 0 } else { reserve };

        if needed > limit {
            out.push_str(&format!("\n...and {} more", emails.len() - i));
            return Some(out.trim_start().to_string());
        }

        if sep == 1 {
            out.push('\n');
        }
        out.push_str(&line);
        used += sep + len;
    }

    Some(out)
}
