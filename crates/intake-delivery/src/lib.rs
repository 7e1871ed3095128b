//! Outbound delivery for the intake relay.
//!
//! Everything that leaves the process goes through this crate:
//!
//! - [`WebhookClient`] posts composed messages to chat webhooks, as JSON or
//!   as multipart with a file.
//! - [`deliver_with_retry`] wraps a send with the single rate-limit retry.
//! - [`SignupStore`] reads and appends signup rows, backed by a spreadsheet
//!   values API ([`SheetsStore`]) or memory ([`MemorySignupStore`]).
//!
//! # Example
//!
//! ```no_run
//! use intake_core::{RealClock, WebhookMessage};
//! use intake_delivery::{deliver_with_retry, RetryPolicy, WebhookClient};
//!
//! # async fn example(message: WebhookMessage) -> intake_delivery::Result<()> {
//! let client = WebhookClient::with_defaults()?;
//! let outcome = deliver_with_retry(
//!     &client,
//!     &RealClock::new(),
//!     &RetryPolicy::default(),
//!     "https://chat.example/api/webhooks/1/token",
//!     &message,
//!     None,
//! )
//! .await?;
//! println!("delivered after {} attempt(s)", outcome.attempts);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod error;
pub mod retry;
pub mod store;

pub use client::{ClientConfig, DeliveryResponse, WebhookClient};
pub use error::{DeliveryError, Result, StoreError};
pub use retry::{deliver_with_retry, DeliveryOutcome, RetryDecision, RetryPolicy};
pub use store::{MemorySignupStore, SheetsConfig, SheetsStore, SignupStore};
