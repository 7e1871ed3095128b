//! HTTP middleware for request processing.
//!
//! Resolves the client identity used as the rate-limit key and makes it
//! available to handlers as a request extension.
pub mod client_identity;

pub use client_identity::{client_identity_middleware, ClientIdentity};
