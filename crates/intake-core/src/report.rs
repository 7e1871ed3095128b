//! Bug report schema, bot screening and validation.
//!
//! A [`ReportPayload`] is whatever the browser sent, JSON or the `payload`
//! field of a multipart body. [`ReportPayload::screen`] applies the bot
//! filters and [`ReportPayload::validate`] turns the payload into a
//! [`ReportSubmission`] that message composition can trust.

use std::fmt;

use bytes::Bytes;
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{BotSignal, IntakeError, Result};

/// Minimum summary length in characters, counted after trimming.
pub const MIN_SUMMARY_CHARS: usize = 5;

const TICKET_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const TICKET_LEN: usize = 8;

/// Raw bug report as submitted by the browser.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPayload {
    /// One-line description of the problem.
    #[serde(default)]
    pub summary: Option<String>,
    /// Where in the product the problem occurred.
    #[serde(default)]
    pub location: Option<String>,
    /// Reporter's contact address.
    #[serde(default)]
    pub email: Option<String>,
    /// Reproduction steps.
    #[serde(default)]
    pub steps: Option<String>,
    /// Pasted error text.
    #[serde(default)]
    pub error_output: Option<String>,
    /// Page the report was filed from.
    #[serde(default)]
    pub page_url: Option<String>,
    /// Browser user agent as seen by the page.
    #[serde(default)]
    pub ua: Option<String>,
    /// Viewport dimensions.
    #[serde(default)]
    pub viewport: Option<String>,
    /// Honeypot. Hidden from humans, must stay empty.
    #[serde(default)]
    pub website: Option<String>,
    /// Epoch milliseconds at which the form was rendered.
    #[serde(default, deserialize_with = "lenient_millis")]
    pub form_load_time: Option<i64>,
}

/// File attached to a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Client-supplied file name.
    pub file_name: String,
    /// Declared MIME type.
    pub content_type: String,
    /// File contents.
    pub bytes: Bytes,
}

impl Attachment {
    /// Size of the file in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the file is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Validated report. Blank optional fields are normalized to `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSubmission {
    /// Trimmed summary, at least [`MIN_SUMMARY_CHARS`] long.
    pub summary: String,
    /// Location in the product.
    pub location: Option<String>,
    /// Contact email.
    pub email: Option<String>,
    /// Reproduction steps.
    pub steps: Option<String>,
    /// Error output.
    pub error_output: Option<String>,
    /// Page URL.
    pub page_url: Option<String>,
    /// User agent.
    pub user_agent: Option<String>,
    /// Viewport.
    pub viewport: Option<String>,
    /// Optional file.
    pub attachment: Option<Attachment>,
}

impl ReportPayload {
    /// Runs the honeypot and fill-time filters.
    ///
    /// A `formLoadTime` closer than `min_fill_ms` to `now_ms`, or in the
    /// future, counts as automated. A missing `formLoadTime` passes.
    ///
    /// # Errors
    ///
    /// Returns [`IntakeError::SuspectedBot`] naming the filter that fired.
    pub fn screen(&self, now_ms: i64, min_fill_ms: i64) -> Result<()> {
        if self.website.as_deref().is_some_and(|w| !w.trim().is_empty()) {
            return Err(IntakeError::SuspectedBot { signal: BotSignal::Honeypot });
        }

        if let Some(loaded_at) = self.form_load_time {
            if now_ms.saturating_sub(loaded_at) < min_fill_ms {
                return Err(IntakeError::SuspectedBot { signal: BotSignal::TooFast });
            }
        }

        Ok(())
    }

    /// Validates the payload into a [`ReportSubmission`].
    ///
    /// # Errors
    ///
    /// Returns [`IntakeError::SummaryTooShort`] when the trimmed summary is
    /// shorter than [`MIN_SUMMARY_CHARS`].
    pub fn validate(self, attachment: Option<Attachment>) -> Result<ReportSubmission> {
        let summary = self.summary.as_deref().map(str::trim).unwrap_or_default();
        if summary.chars().count() < MIN_SUMMARY_CHARS {
            return Err(IntakeError::SummaryTooShort { min_chars: MIN_SUMMARY_CHARS });
        }

        Ok(ReportSubmission {
            summary: summary.to_string(),
            location: non_blank(self.location),
            email: non_blank(self.email),
            steps: non_blank(self.steps),
            error_output: non_blank(self.error_output),
            page_url: non_blank(self.page_url),
            user_agent: non_blank(self.ua),
            viewport: non_blank(self.viewport),
            attachment,
        })
    }
}

/// Short human-shareable report identifier.
///
/// Eight characters from an uppercase alphabet without `0`, `O`, `1` or `I`.
/// Every report gets a fresh id; ids are never used for deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(String);

impl TicketId {
    /// Draws a new random ticket id.
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let id = (0..TICKET_LEN)
            .map(|_| char::from(TICKET_ALPHABET[rng.random_range(0..TICKET_ALPHABET.len())]))
            .collect();
        Self(id)
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TicketId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TicketId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Accepts a number, a numeric string, or null. Multipart text fields
/// always arrive as strings.
fn lenient_millis<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Float(f64),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Int(ms)) => Some(ms),
        #[allow(clippy::cast_possible_truncation)]
        Some(Raw::Float(ms)) if ms.is_finite() => Some(ms as i64),
        Some(Raw::Text(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    })
}
