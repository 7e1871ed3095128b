//! Core domain types for the intake relay.
//!
//! Holds the typed request schemas for signups and bug reports, their
//! validation into domain records, chat-webhook message composition and the
//! error taxonomy shared by the delivery and API crates. Nothing in here
//! performs I/O; time is read through the [`Clock`] abstraction so callers
//! can run deterministic tests.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod notification;
pub mod report;
pub mod signup;
pub mod time;

pub use error::{BotSignal, IntakeError, Result};
pub use notification::{
    compose_report_message, compose_signup_message, mailto_link, Embed, EmbedField, EmbedFooter,
    WebhookMessage,
};
pub use report::{Attachment, ReportPayload, ReportSubmission, TicketId};
pub use signup::{normalize_email, SignupFormData, SignupRecord, SignupRequest, SignupSource};
pub use time::{Clock, RealClock, TestClock};
