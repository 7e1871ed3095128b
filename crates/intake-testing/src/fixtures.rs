//! Builders for report and signup submissions.

use axum::{
    body::Body,
    http::{Method, Request},
};
use bytes::{BufMut, Bytes, BytesMut};
use serde_json::{Map, Value};

use crate::http::{json_request, raw_request};

const BOUNDARY: &str = "intake-test-boundary-7MA4YWxkTrZu0gW";

/// Builder for bug report payloads.
#[derive(Debug, Clone, Default)]
pub struct ReportBuilder {
    fields: Map<String, Value>,
}

impl ReportBuilder {
    /// Creates an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a report that passes validation and the bot filters.
    pub fn with_defaults() -> Self {
        Self::new()
            .summary("Export button does nothing")
            .location("Dashboard > Reports")
            .email("reporter@example.com")
            .steps("1. Open reports\n2. Click export")
            .page_url("https://app.example.com/reports")
            .field("ua", "Mozilla/5.0 (X11; Linux x86_64)")
            .field("viewport", "1280x720")
    }

    /// Sets an arbitrary top-level field.
    #[must_use]
    pub fn field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    /// Sets the summary.
    #[must_use]
    pub fn summary(self, summary: &str) -> Self {
        self.field("summary", summary)
    }

    /// Sets the location.
    #[must_use]
    pub fn location(self, location: &str) -> Self {
        self.field("location", location)
    }

    /// Sets the contact email.
    #[must_use]
    pub fn email(self, email: &str) -> Self {
        self.field("email", email)
    }

    /// Sets the reproduction steps.
    #[must_use]
    pub fn steps(self, steps: &str) -> Self {
        self.field("steps", steps)
    }

    /// Sets the pasted error output.
    #[must_use]
    pub fn error_output(self, output: &str) -> Self {
        self.field("errorOutput", output)
    }

    /// Sets the page URL.
    #[must_use]
    pub fn page_url(self, url: &str) -> Self {
        self.field("pageUrl", url)
    }

    /// Fills the honeypot field.
    #[must_use]
    pub fn honeypot(self, value: &str) -> Self {
        self.field("website", value)
    }

    /// Sets the form load time in epoch milliseconds.
    #[must_use]
    pub fn form_load_time(self, epoch_ms: i64) -> Self {
        self.field("formLoadTime", epoch_ms)
    }

    /// Payload as a JSON value.
    pub fn to_json(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    /// `POST /api/report` with a JSON body.
    pub fn json_request(&self) -> Request<Body> {
        json_request(Method::POST, "/api/report", &self.to_json())
    }

    /// `POST /api/report` as multipart with the payload field and an
    /// optional file.
    pub fn multipart_request(&self, file: Option<(&str, &str, &[u8])>) -> Request<Body> {
        let mut body = MultipartBody::new().text("payload", &self.to_json().to_string());
        if let Some((file_name, content_type, bytes)) = file {
            body = body.file("attachment", file_name, content_type, bytes);
        }
        body.request("/api/report")
    }
}

/// Builder for signup payloads.
#[derive(Debug, Clone, Default)]
pub struct SignupBuilder {
    fields: Map<String, Value>,
    form_data: Map<String, Value>,
}

impl SignupBuilder {
    /// Creates a signup for `email`.
    pub fn new(email: &str) -> Self {
        Self::default().field("email", email)
    }

    /// Creates a signup without an email.
    pub fn without_email() -> Self {
        Self::default()
    }

    /// Sets an arbitrary top-level field.
    #[must_use]
    pub fn field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    /// Sets the source tag.
    #[must_use]
    pub fn source(self, source: &str) -> Self {
        self.field("source", source)
    }

    /// Sets the idea text.
    #[must_use]
    pub fn idea(self, idea: &str) -> Self {
        self.field("idea", idea)
    }

    /// Sets the page path.
    #[must_use]
    pub fn path(self, path: &str) -> Self {
        self.field("path", path)
    }

    /// Sets a `formData` entry.
    #[must_use]
    pub fn form_data(mut self, name: &str, value: &str) -> Self {
        self.form_data.insert(name.to_string(), Value::String(value.to_string()));
        self
    }

    /// Payload as a JSON value.
    pub fn to_json(&self) -> Value {
        let mut fields = self.fields.clone();
        if !self.form_data.is_empty() {
            fields.insert("formData".to_string(), Value::Object(self.form_data.clone()));
        }
        Value::Object(fields)
    }

    /// `POST /api/signup` with a JSON body.
    pub fn request(&self) -> Request<Body> {
        json_request(Method::POST, "/api/signup", &self.to_json())
    }
}

/// Hand-assembled `multipart/form-data` body.
#[derive(Debug, Default)]
pub struct MultipartBody {
    body: BytesMut,
}

impl MultipartBody {
    /// Creates an empty body.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a text field.
    #[must_use]
    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.put_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n")
                .as_bytes(),
        );
        self.body.put_slice(value.as_bytes());
        self.body.put_slice(b"\r\n");
        self
    }

    /// Appends a file field.
    #[must_use]
    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.body.put_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; \
                 filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.put_slice(bytes);
        self.body.put_slice(b"\r\n");
        self
    }

    /// Content type header value, including the boundary.
    pub fn content_type() -> String {
        format!("multipart/form-data; boundary={BOUNDARY}")
    }

    /// Closes the body.
    pub fn finish(mut self) -> Bytes {
        self.body.put_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.body.freeze()
    }

    /// `POST uri` carrying this body.
    pub fn request(self, uri: &str) -> Request<Body> {
        raw_request(Method::POST, uri, &Self::content_type(), self.finish())
    }
}
