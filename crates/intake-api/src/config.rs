//! Configuration for the intake relay.

use std::{net::SocketAddr, str::FromStr, time::Duration};

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use intake_delivery::{ClientConfig, RetryPolicy, SheetsConfig};
use serde::{Deserialize, Serialize};

use crate::{multipart::AttachmentLimits, rate_limit::RateLimitConfig};

const CONFIG_FILE: &str = "intake.toml";

/// Service configuration with defaults, file, and environment overrides.
///
/// Configuration is loaded in priority order:
/// 1. Environment variables (highest priority)
/// 2. Configuration file (`intake.toml`)
/// 3. Built-in defaults (lowest priority)
///
/// Every external collaborator is optional. A missing webhook URL or
/// spreadsheet credential degrades the matching endpoint instead of
/// preventing startup.
///
/// # Example
///
/// ```no_run
/// use intake_api::Config;
///
/// let config = Config::load().expect("Failed to load configuration");
/// println!("Server will bind to {}:{}", config.host, config.port);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server
    /// Server bind address.
    ///
    /// Environment variable: `HOST`
    #[serde(default = "default_host", alias = "HOST")]
    pub host: String,
    /// Server bind port.
    ///
    /// Environment variable: `PORT`
    #[serde(default = "default_port", alias = "PORT")]
    pub port: u16,
    /// Whole-request deadline in seconds. Must exceed
    /// [`Config::downstream_budget`] so handlers answer before it fires.
    ///
    /// Environment variable: `REQUEST_TIMEOUT`
    #[serde(default = "default_request_timeout", alias = "REQUEST_TIMEOUT")]
    pub request_timeout: u64,
    /// Comma-separated origins granted CORS access.
    ///
    /// Environment variable: `ALLOWED_ORIGINS`
    #[serde(default = "default_allowed_origins", alias = "ALLOWED_ORIGINS")]
    pub allowed_origins: String,

    // Webhooks
    /// Chat webhook receiving bug reports.
    ///
    /// Environment variable: `REPORT_WEBHOOK_URL`
    #[serde(default, alias = "REPORT_WEBHOOK_URL")]
    pub report_webhook_url: Option<String>,
    /// Chat webhook receiving signup notifications.
    ///
    /// Environment variable: `SIGNUP_WEBHOOK_URL`
    #[serde(default, alias = "SIGNUP_WEBHOOK_URL")]
    pub signup_webhook_url: Option<String>,
    /// Outbound HTTP timeout in seconds.
    ///
    /// Environment variable: `DELIVERY_TIMEOUT_SECONDS`
    #[serde(default = "default_delivery_timeout", alias = "DELIVERY_TIMEOUT_SECONDS")]
    pub delivery_timeout_seconds: u64,
    /// Wait before retrying when a rate-limited webhook gives no interval.
    ///
    /// Environment variable: `DEFAULT_RETRY_AFTER_MS`
    #[serde(default = "default_retry_after_ms", alias = "DEFAULT_RETRY_AFTER_MS")]
    pub default_retry_after_ms: u64,
    /// Upper bound on the retry wait.
    ///
    /// Environment variable: `MAX_RETRY_AFTER_MS`
    #[serde(default = "default_max_retry_after_ms", alias = "MAX_RETRY_AFTER_MS")]
    pub max_retry_after_ms: u64,

    // Rate limiting
    /// Sliding window length in seconds.
    ///
    /// Environment variable: `RATE_LIMIT_WINDOW_SECONDS`
    #[serde(default = "default_rate_limit_window", alias = "RATE_LIMIT_WINDOW_SECONDS")]
    pub rate_limit_window_seconds: u64,
    /// Reports allowed per client within the window.
    ///
    /// Environment variable: `RATE_LIMIT_MAX_REQUESTS`
    #[serde(default = "default_rate_limit_max", alias = "RATE_LIMIT_MAX_REQUESTS")]
    pub rate_limit_max_requests: usize,
    /// Fraction of requests that sweep the whole ledger.
    ///
    /// Environment variable: `RATE_LIMIT_PRUNE_PROBABILITY`
    #[serde(default = "default_prune_probability", alias = "RATE_LIMIT_PRUNE_PROBABILITY")]
    pub rate_limit_prune_probability: f64,

    // Reports
    /// Attachment size cap in bytes.
    ///
    /// Environment variable: `MAX_ATTACHMENT_BYTES`
    #[serde(default = "default_max_attachment_bytes", alias = "MAX_ATTACHMENT_BYTES")]
    pub max_attachment_bytes: usize,
    /// Comma-separated MIME types accepted as attachments.
    ///
    /// Environment variable: `ALLOWED_ATTACHMENT_TYPES`
    #[serde(default = "default_attachment_types", alias = "ALLOWED_ATTACHMENT_TYPES")]
    pub allowed_attachment_types: String,
    /// Minimum milliseconds between form render and submission.
    ///
    /// Environment variable: `MIN_FORM_FILL_MS`
    #[serde(default = "default_min_form_fill_ms", alias = "MIN_FORM_FILL_MS")]
    pub min_form_fill_ms: i64,
    /// Address offered in the manual fallback link.
    ///
    /// Environment variable: `SUPPORT_EMAIL`
    #[serde(default = "default_support_email", alias = "SUPPORT_EMAIL")]
    pub support_email: String,

    // Signup store
    /// Spreadsheet values API base URL.
    ///
    /// Environment variable: `SHEETS_API_BASE`
    #[serde(default = "default_sheets_api_base", alias = "SHEETS_API_BASE")]
    pub sheets_api_base: String,
    /// Spreadsheet identifier.
    ///
    /// Environment variable: `SHEETS_SPREADSHEET_ID`
    #[serde(default, alias = "SHEETS_SPREADSHEET_ID")]
    pub sheets_spreadsheet_id: Option<String>,
    /// A1 range holding signup rows.
    ///
    /// Environment variable: `SHEETS_RANGE`
    #[serde(default = "default_sheets_range", alias = "SHEETS_RANGE")]
    pub sheets_range: String,
    /// OAuth bearer token for the spreadsheet API.
    ///
    /// Environment variable: `SHEETS_ACCESS_TOKEN`
    #[serde(default, alias = "SHEETS_ACCESS_TOKEN")]
    pub sheets_access_token: Option<String>,

    // Logging
    /// Log output format, `text` or `json`.
    ///
    /// Environment variable: `LOG_FORMAT`
    #[serde(default = "default_log_format", alias = "LOG_FORMAT")]
    pub log_format: String,
    /// Log filter directives.
    ///
    /// Environment variable: `RUST_LOG`
    #[serde(default = "default_log_level", alias = "RUST_LOG")]
    pub rust_log: String,
}

impl Config {
    /// Loads configuration from defaults, `intake.toml`, and environment
    /// variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or a value fails
    /// validation.
    pub fn load() -> Result<Self> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(""));

        let config: Self = figment.extract().context("Failed to load configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Report webhook URL, if set and non-blank.
    pub fn report_webhook(&self) -> Option<&str> {
        non_blank(self.report_webhook_url.as_deref())
    }

    /// Signup webhook URL, if set and non-blank.
    pub fn signup_webhook(&self) -> Option<&str> {
        non_blank(self.signup_webhook_url.as_deref())
    }

    /// Parsed CORS allow-list.
    pub fn origin_allow_list(&self) -> Vec<String> {
        split_list(&self.allowed_origins).map(|o| o.trim_end_matches('/').to_string()).collect()
    }

    /// Parsed attachment MIME allow-list, lowercased.
    pub fn attachment_type_allow_list(&self) -> Vec<String> {
        split_list(&self.allowed_attachment_types).map(str::to_ascii_lowercase).collect()
    }

    /// Converts to the webhook client configuration.
    pub fn to_client_config(&self) -> ClientConfig {
        ClientConfig {
            timeout: Duration::from_secs(self.delivery_timeout_seconds),
            ..ClientConfig::default()
        }
    }

    /// Converts to the single-retry policy.
    pub fn to_retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: 2,
            default_retry_after: Duration::from_millis(self.default_retry_after_ms),
            max_retry_after: Duration::from_millis(self.max_retry_after_ms),
        }
    }

    /// Converts to rate limiter settings.
    pub fn to_rate_limit_config(&self) -> RateLimitConfig {
        RateLimitConfig {
            window: Duration::from_secs(self.rate_limit_window_seconds),
            max_requests: self.rate_limit_max_requests,
            prune_probability: self.rate_limit_prune_probability,
        }
    }

    /// Converts to attachment limits.
    pub fn to_attachment_limits(&self) -> AttachmentLimits {
        AttachmentLimits::new(self.max_attachment_bytes, self.attachment_type_allow_list())
    }

    /// Spreadsheet store settings, when both the id and token are present.
    pub fn to_sheets_config(&self) -> Option<SheetsConfig> {
        let spreadsheet_id = non_blank(self.sheets_spreadsheet_id.as_deref())?;
        let access_token = non_blank(self.sheets_access_token.as_deref())?;

        Some(SheetsConfig {
            api_base: self.sheets_api_base.clone(),
            spreadsheet_id: spreadsheet_id.to_string(),
            range: self.sheets_range.clone(),
            access_token: access_token.to_string(),
        })
    }

    /// Parses the server socket address from host and port.
    pub fn parse_server_addr(&self) -> Result<SocketAddr> {
        let addr_str = format!("{}:{}", self.host, self.port);
        SocketAddr::from_str(&addr_str).context("Invalid server address")
    }

    /// Report webhook URL with its secret path hidden, for logging.
    pub fn report_webhook_masked(&self) -> String {
        self.report_webhook().map_or_else(|| "missing".to_string(), mask_url)
    }

    /// Signup webhook URL with its secret path hidden, for logging.
    pub fn signup_webhook_masked(&self) -> String {
        self.signup_webhook().map_or_else(|| "missing".to_string(), mask_url)
    }

    /// Longest time a handler can spend on outbound calls.
    ///
    /// A signup makes up to three sequential calls (store read, store
    /// append, webhook). A report makes up to two webhook attempts with one
    /// retry wait between them.
    pub fn downstream_budget(&self) -> Duration {
        let call = Duration::from_secs(self.delivery_timeout_seconds);
        let signup = call.saturating_mul(3);
        let report = call
            .saturating_mul(2)
            .saturating_add(Duration::from_millis(self.max_retry_after_ms));
        signup.max(report)
    }

    /// Whether JSON log output was requested.
    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }

    /// Rejects settings the service cannot run with.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first offending setting.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("port must be greater than 0");
        }

        if self.request_timeout == 0 {
            anyhow::bail!("request_timeout must be greater than 0");
        }

        if self.delivery_timeout_seconds == 0 {
            anyhow::bail!("delivery_timeout_seconds must be greater than 0");
        }

        let budget = self.downstream_budget();
        if Duration::from_secs(self.request_timeout) <= budget {
            anyhow::bail!(
                "request_timeout ({}s) must exceed the outbound budget of {}ms \
                 (delivery_timeout_seconds and max_retry_after_ms)",
                self.request_timeout,
                budget.as_millis()
            );
        }

        if self.rate_limit_window_seconds == 0 {
            anyhow::bail!("rate_limit_window_seconds must be greater than 0");
        }

        if self.rate_limit_max_requests == 0 {
            anyhow::bail!("rate_limit_max_requests must be greater than 0");
        }

        if !(0.0..=1.0).contains(&self.rate_limit_prune_probability) {
            anyhow::bail!("rate_limit_prune_probability must be between 0.0 and 1.0");
        }

        if self.max_attachment_bytes == 0 {
            anyhow::bail!("max_attachment_bytes must be greater than 0");
        }

        if self.default_retry_after_ms > self.max_retry_after_ms {
            anyhow::bail!("default_retry_after_ms cannot exceed max_retry_after_ms");
        }

        if self.min_form_fill_ms < 0 {
            anyhow::bail!("min_form_fill_ms cannot be negative");
        }

        if !self.support_email.contains('@') {
            anyhow::bail!("support_email must be an email address");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout: default_request_timeout(),
            allowed_origins: default_allowed_origins(),
            report_webhook_url: None,
            signup_webhook_url: None,
            delivery_timeout_seconds: default_delivery_timeout(),
            default_retry_after_ms: default_retry_after_ms(),
            max_retry_after_ms: default_max_retry_after_ms(),
            rate_limit_window_seconds: default_rate_limit_window(),
            rate_limit_max_requests: default_rate_limit_max(),
            rate_limit_prune_probability: default_prune_probability(),
            max_attachment_bytes: default_max_attachment_bytes(),
            allowed_attachment_types: default_attachment_types(),
            min_form_fill_ms: default_min_form_fill_ms(),
            support_email: default_support_email(),
            sheets_api_base: default_sheets_api_base(),
            sheets_spreadsheet_id: None,
            sheets_range: default_sheets_range(),
            sheets_access_token: None,
            log_format: default_log_format(),
            rust_log: default_log_level(),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|item| !item.is_empty())
}

/// Keeps scheme and host, hides the path (webhook URLs embed their token).
fn mask_url(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else { return "***".to_string() };
    let rest = &url[scheme_end + 3..];
    let host_end = rest.find('/').unwrap_or(rest.len());
    format!("{}/***", &url[..scheme_end + 3 + host_end])
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    45
}

fn default_allowed_origins() -> String {
    "http://localhost:3000".to_string()
}

fn default_delivery_timeout() -> u64 {
    10
}

fn default_retry_after_ms() -> u64 {
    1000
}

fn default_max_retry_after_ms() -> u64 {
    5000
}

fn default_rate_limit_window() -> u64 {
    60
}

fn default_rate_limit_max() -> usize {
    5
}

fn default_prune_probability() -> f64 {
    0.01
}

fn default_max_attachment_bytes() -> usize {
    8 * 1024 * 1024
}

fn default_attachment_types() -> String {
    "image/png,image/jpeg,image/gif,image/webp,application/pdf,text/plain,application/json"
        .to_string()
}

fn default_min_form_fill_ms() -> i64 {
    3000
}

fn default_support_email() -> String {
    "support@example.com".to_string()
}

fn default_sheets_api_base() -> String {
    "https://sheets.googleapis.com/v4".to_string()
}

fn default_sheets_range() -> String {
    "Signups!A:I".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_log_level() -> String {
    "info,intake=debug,tower_http=debug".to_string()
}
