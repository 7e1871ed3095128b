//! Tabular signup store.
//!
//! [`SheetsStore`] talks to a spreadsheet "values" API (Google Sheets v4
//! shape). The configured range holds one row per signup with the timestamp
//! in the first column and the email in the second. [`MemorySignupStore`]
//! keeps rows in process for tests and local runs.

use std::sync::Arc;

use async_trait::async_trait;
use intake_core::SignupRecord;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::StoreError;

/// Column index of the email within a signup row.
pub const EMAIL_COLUMN: usize = 1;

/// Persistence for signups.
#[async_trait]
pub trait SignupStore: Send + Sync + std::fmt::Debug {
    /// Every email recorded so far, in row order, original casing.
    async fn existing_emails(&self) -> Result<Vec<String>, StoreError>;

    /// Appends one signup row.
    async fn append(&self, record: &SignupRecord) -> Result<(), StoreError>;
}

/// Connection settings for [`SheetsStore`].
#[derive(Clone)]
pub struct SheetsConfig {
    /// API base, e.g. `https://sheets.googleapis.com/v4`.
    pub api_base: String,
    /// Spreadsheet identifier.
    pub spreadsheet_id: String,
    /// A1 range covering the signup columns, e.g. `Signups!A:I`.
    pub range: String,
    /// OAuth bearer token.
    pub access_token: String,
}

impl std::fmt::Debug for SheetsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetsConfig")
            .field("api_base", &self.api_base)
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("range", &self.range)
            .field("access_token", &"***")
            .finish()
    }
}

/// Spreadsheet-backed signup store.
#[derive(Debug, Clone)]
pub struct SheetsStore {
    client: reqwest::Client,
    config: SheetsConfig,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Serialize)]
struct AppendBody<'a> {
    values: [&'a [String]; 1],
}

impl SheetsStore {
    /// Creates a store sharing `client`'s connection pool.
    pub fn new(client: reqwest::Client, config: SheetsConfig) -> Self {
        Self { client, config }
    }

    fn values_url(&self) -> String {
        format!(
            "{}/spreadsheets/{}/values/{}",
            self.config.api_base.trim_end_matches('/'),
            urlencoding::encode(&self.config.spreadsheet_id),
            urlencoding::encode(&self.config.range)
        )
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Status { status_code: status.as_u16(), body })
    }
}

#[async_trait]
impl SignupStore for SheetsStore {
    async fn existing_emails(&self) -> Result<Vec<String>, StoreError> {
        let response = self
            .client
            .get(self.values_url())
            .bearer_auth(&self.config.access_token)
            .send()
            .await
            .map_err(|e| StoreError::Request { message: e.to_string() })?;

        let range: ValueRange = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::InvalidResponse { message: e.to_string() })?;

        Ok(emails_from_rows(&range.values))
    }

    async fn append(&self, record: &SignupRecord) -> Result<(), StoreError> {
        let row = record.to_row();
        let response = self
            .client
            .post(format!("{}:append", self.values_url()))
            .query(&[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")])
            .bearer_auth(&self.config.access_token)
            .json(&AppendBody { values: [row.as_slice()] })
            .send()
            .await
            .map_err(|e| StoreError::Request { message: e.to_string() })?;

        Self::check(response).await?;
        Ok(())
    }
}

/// Pulls the email column out of raw rows, skipping headers and blanks.
fn emails_from_rows(rows: &[Vec<serde_json::Value>]) -> Vec<String> {
    rows.iter()
        .filter_map(|row| row.get(EMAIL_COLUMN))
        .filter_map(|cell| cell.as_str())
        .map(str::trim)
        .filter(|email| email.contains('@'))
        .map(str::to_string)
        .collect()
}

/// In-process signup store.
#[derive(Debug, Clone, Default)]
pub struct MemorySignupStore {
    records: Arc<Mutex<Vec<SignupRecord>>>,
    seeded: Arc<Mutex<Vec<String>>>,
}

impl MemorySignupStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already knows `emails`.
    pub fn with_emails<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            records: Arc::default(),
            seeded: Arc::new(Mutex::new(emails.into_iter().map(Into::into).collect())),
        }
    }

    /// Records appended through [`SignupStore::append`].
    pub async fn appended(&self) -> Vec<SignupRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl SignupStore for MemorySignupStore {
    async fn existing_emails(&self) -> Result<Vec<String>, StoreError> {
        let mut emails = self.seeded.lock().await.clone();
        emails.extend(self.records.lock().await.iter().map(|r| r.email.clone()));
        Ok(emails)
    }

    async fn append(&self, record: &SignupRecord) -> Result<(), StoreError> {
        self.records.lock().await.push(record.clone());
        Ok(())
    }
}
