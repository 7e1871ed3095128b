//! Streaming multipart parsing for report submissions.
//!
//! Text fields collect into a [`ReportPayload`]: the `payload` field holds a
//! JSON object and any other text field is merged in as a top-level string
//! when the object does not already carry that key. At most one file is
//! kept. Its bytes flow through an [`AttachmentCollector`], which stops
//! reading the moment the file is known to be unacceptable.

use axum::extract::{multipart::MultipartError, Multipart};
use bytes::BytesMut;
use intake_core::{Attachment, IntakeError, ReportPayload};
use serde_json::{Map, Value};
use tracing::debug;

const PAYLOAD_FIELD: &str = "payload";
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Size and type limits for report attachments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentLimits {
    /// Largest accepted file in bytes.
    pub max_bytes: usize,
    allowed_types: Vec<String>,
}

impl AttachmentLimits {
    /// Creates limits from a byte cap and a MIME allow-list.
    pub fn new(max_bytes: usize, allowed_types: Vec<String>) -> Self {
        let allowed_types = allowed_types.iter().map(|t| essence(t)).collect();
        Self { max_bytes, allowed_types }
    }

    /// Whether `content_type` is on the allow-list. Parameters such as
    /// `charset` are ignored.
    pub fn allows(&self, content_type: &str) -> bool {
        let essence = essence(content_type);
        self.allowed_types.iter().any(|t| *t == essence)
    }
}

fn essence(content_type: &str) -> String {
    content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase()
}

/// Where an [`AttachmentCollector`] stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorState {
    /// Reading chunks.
    Accumulating,
    /// A chunk pushed the file past the size cap. Buffer released.
    RejectedOversize,
    /// Declared type is not allowed. Nothing was read.
    RejectedType,
    /// Stream ended within limits.
    Complete,
}

/// Buffers one attachment under a running byte counter.
///
/// Once rejected, further chunks are ignored and the caller is expected to
/// stop reading the stream.
#[derive(Debug)]
pub struct AttachmentCollector {
    state: CollectorState,
    max_bytes: usize,
    file_name: String,
    content_type: String,
    buffer: BytesMut,
}

impl AttachmentCollector {
    /// Starts collecting a file part. A type outside the allow-list rejects
    /// immediately.
    pub fn begin(limits: &AttachmentLimits, file_name: String, content_type: String) -> Self {
        let state = if limits.allows(&content_type) {
            CollectorState::Accumulating
        } else {
            CollectorState::RejectedType
        };

        Self { state, max_bytes: limits.max_bytes, file_name, content_type, buffer: BytesMut::new() }
    }

    /// Current state.
    pub fn state(&self) -> CollectorState {
        self.state
    }

    /// Whether more chunks should be read.
    pub fn wants_more(&self) -> bool {
        self.state == CollectorState::Accumulating
    }

    /// Feeds one chunk and returns the resulting state.
    pub fn push(&mut self, chunk: &[u8]) -> CollectorState {
        if self.state != CollectorState::Accumulating {
            return self.state;
        }

        if self.buffer.len().saturating_add(chunk.len()) > self.max_bytes {
            self.buffer = BytesMut::new();
            self.state = CollectorState::RejectedOversize;
        } else {
            self.buffer.extend_from_slice(chunk);
        }

        self.state
    }

    /// Marks the end of the stream.
    pub fn end_of_stream(&mut self) -> CollectorState {
        if self.state == CollectorState::Accumulating {
            self.state = CollectorState::Complete;
        }
        self.state
    }

    /// Yields the attachment.
    ///
    /// # Errors
    ///
    /// Returns [`IntakeError::AttachmentTooLarge`] or
    /// [`IntakeError::AttachmentTypeNotAllowed`] for a rejected file.
    pub fn finish(self) -> Result<Attachment, IntakeError> {
        match self.state {
            CollectorState::RejectedOversize => {
                Err(IntakeError::AttachmentTooLarge { limit_bytes: self.max_bytes })
            },
            CollectorState::RejectedType => {
                Err(IntakeError::AttachmentTypeNotAllowed { content_type: self.content_type })
            },
            CollectorState::Accumulating | CollectorState::Complete => Ok(Attachment {
                file_name: self.file_name,
                content_type: self.content_type,
                bytes: self.buffer.freeze(),
            }),
        }
    }
}

fn malformed(err: MultipartError) -> IntakeError {
    IntakeError::MalformedMultipart { reason: err.body_text() }
}

/// Reads a multipart report body.
///
/// # Errors
///
/// Returns a client error for an unreadable stream, a `payload` field that
/// is not a JSON object, or a rejected attachment. Reading stops at the
/// first rejection.
pub async fn parse_multipart(
    mut multipart: Multipart,
    limits: &AttachmentLimits,
) -> Result<(ReportPayload, Option<Attachment>), IntakeError> {
    let mut payload_json: Option<String> = None;
    let mut text_fields = Map::new();
    let mut attachment: Option<Attachment> = None;

    while let Some(mut field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();

        match field.file_name().map(str::to_string) {
            // Empty file inputs arrive with a blank file name.
            Some(file_name) if file_name.is_empty() => continue,
            Some(file_name) => {
                if attachment.is_some() {
                    debug!(field = %name, file_name = %file_name, "skipping extra attachment");
                    continue;
                }

                let content_type =
                    field.content_type().unwrap_or(FALLBACK_CONTENT_TYPE).to_string();
                let mut collector = AttachmentCollector::begin(limits, file_name, content_type);
                while collector.wants_more() {
                    match field.chunk().await.map_err(malformed)? {
                        Some(chunk) => {
                            collector.push(&chunk);
                        },
                        None => {
                            collector.end_of_stream();
                        },
                    }
                }
                attachment = Some(collector.finish()?);
            },
            None => {
                let text = field.text().await.map_err(malformed)?;
                if name == PAYLOAD_FIELD {
                    payload_json = Some(text);
                } else if !name.is_empty() {
                    text_fields.insert(name, Value::String(text));
                }
            },
        }
    }

    let payload = merge_payload(payload_json.as_deref(), text_fields)?;
    Ok((payload, attachment))
}

fn merge_payload(
    payload_json: Option<&str>,
    text_fields: Map<String, Value>,
) -> Result<ReportPayload, IntakeError> {
    let mut object = match payload_json.map(serde_json::from_str::<Value>).transpose()? {
        Some(Value::Object(object)) => object,
        Some(_) => {
            return Err(IntakeError::InvalidJson {
                reason: "payload field must be a JSON object".to_string(),
            })
        },
        None => Map::new(),
    };

    for (key, value) in text_fields {
        object.entry(key).or_insert(value);
    }

    Ok(serde_json::from_value(Value::Object(object))?)
}
