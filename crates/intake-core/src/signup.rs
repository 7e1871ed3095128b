//! Signup request schema and the record written to the signup store.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{IntakeError, Result};

/// Body of `POST /api/signup`.
///
/// Every field is optional at the schema level so that a missing email is
/// reported as a validation error rather than a parse error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    /// Address the visitor signed up with.
    #[serde(default)]
    pub email: Option<String>,
    /// Free-text idea submitted alongside the signup.
    #[serde(default)]
    pub idea: Option<String>,
    /// Which form the signup came from.
    #[serde(default)]
    pub source: Option<String>,
    /// Page path the form was submitted from.
    #[serde(default)]
    pub path: Option<String>,
    /// Extended questionnaire answers.
    #[serde(default)]
    pub form_data: Option<SignupFormData>,
}

/// Optional questionnaire attached to a signup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupFormData {
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Platform the visitor builds for.
    #[serde(default)]
    pub platform: Option<String>,
    /// Self-reported experience level.
    #[serde(default, alias = "experienceLevel")]
    pub experience: Option<String>,
    /// Tool the visitor wants to try first.
    #[serde(default)]
    pub first_tool: Option<String>,
}

/// Form a signup originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignupSource {
    /// Main waitlist form.
    Waitlist,
    /// Idea submission form.
    Idea,
    /// Newsletter subscription.
    Newsletter,
    /// Beta programme application.
    Beta,
    /// Anything unrecognised or absent.
    Other,
}

impl SignupSource {
    /// Parses a client-supplied label, falling back to [`SignupSource::Other`].
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("waitlist") => Self::Waitlist,
            Some("idea") => Self::Idea,
            Some("newsletter") => Self::Newsletter,
            Some("beta") => Self::Beta,
            _ => Self::Other,
        }
    }

    /// Stable lowercase label written to the store.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Waitlist => "waitlist",
            Self::Idea => "idea",
            Self::Newsletter => "newsletter",
            Self::Beta => "beta",
            Self::Other => "other",
        }
    }

    /// Human-readable label used in chat notifications.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Waitlist => "Waitlist",
            Self::Idea => "Idea Submission",
            Self::Newsletter => "Newsletter",
            Self::Beta => "Beta Application",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for SignupSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated signup ready to be deduplicated and stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignupRecord {
    /// Trimmed email in its original casing.
    pub email: String,
    /// Server-side submission time.
    pub submitted_at: DateTime<Utc>,
    /// Originating form.
    pub source: SignupSource,
    /// Display name.
    pub name: Option<String>,
    /// Target platform.
    pub platform: Option<String>,
    /// Experience level.
    pub experience: Option<String>,
    /// First tool choice.
    pub first_tool: Option<String>,
    /// Idea text.
    pub idea: Option<String>,
    /// Page path.
    pub path: Option<String>,
}

impl SignupRequest {
    /// Validates the request into a [`SignupRecord`].
    ///
    /// # Errors
    ///
    /// Returns [`IntakeError::MissingEmail`] if the email is absent or blank.
    pub fn into_record(self, submitted_at: DateTime<Utc>) -> Result<SignupRecord> {
        let email = non_blank(self.email).ok_or(IntakeError::MissingEmail)?;
        let form = self.form_data.unwrap_or_default();

        Ok(SignupRecord {
            email,
            submitted_at,
            source: SignupSource::parse(self.source.as_deref()),
            name: non_blank(form.name),
            platform: non_blank(form.platform),
            experience: non_blank(form.experience),
            first_tool: non_blank(form.first_tool),
            idea: non_blank(self.idea),
            path: non_blank(self.path),
        })
    }
}

impl SignupRecord {
    /// Key used for duplicate detection.
    pub fn normalized_email(&self) -> String {
        normalize_email(&self.email)
    }

    /// Whether this email already appears in `existing`, ignoring case.
    pub fn is_duplicate_of<S: AsRef<str>>(&self, existing: &[S]) -> bool {
        let key = self.normalized_email();
        existing.iter().any(|e| normalize_email(e.as_ref()) == key)
    }

    /// Spreadsheet row: timestamp, email, source, then the optional fields.
    pub fn to_row(&self) -> Vec<String> {
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();
        vec![
            self.submitted_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.email.clone(),
            self.source.as_str().to_string(),
            opt(&self.name),
            opt(&self.platform),
            opt(&self.experience),
            opt(&self.first_tool),
            opt(&self.idea),
            opt(&self.path),
        ]
    }
}

/// Trims and lowercases an email for comparison.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
