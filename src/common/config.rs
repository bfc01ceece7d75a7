use std::time::Duration;
use url::Url;

use crate::error::ToolkitError;
use crate::report::OutputFormat;

/// Default public PurlDB endpoint
pub const DEFAULT_BASE_URL: &str = "https://public.purldb.io/api/purl/";

/// Environment variable overriding the base URL
pub const BASE_URL_ENV: &str = "PURLDB_URL";

/// Environment variable carrying the API token
pub const API_KEY_ENV: &str = "PURLDB_API_KEY";

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(1);
pub const DEFAULT_BACKOFF_CAP: Duration = Duration::from_secs(8);

/// Settings for the remote client, fixed for the lifetime of a run
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub output_format: OutputFormat,
    pub api_key: Option<String>,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
}

impl ClientConfig {
    /// Parse and normalize the base URL. A trailing slash is added so that
    /// capability paths join beneath it instead of replacing its last segment.
    pub fn new(base_url: &str, output_format: OutputFormat) -> Result<Self, ToolkitError> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            output_format,
            api_key: None,
            backoff_base: DEFAULT_BACKOFF_BASE,
            backoff_cap: DEFAULT_BACKOFF_CAP,
        })
    }

    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.trim().is_empty());
        self
    }

    pub fn with_backoff(mut self, base: Duration, cap: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_cap = cap;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ToolkitError> {
    let mut normalized = raw.trim().to_string();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }

    let url = Url::parse(&normalized).map_err(|e| ToolkitError::InvalidBaseUrl {
        url: raw.to_string(),
        message: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ToolkitError::InvalidBaseUrl {
            url: raw.to_string(),
            message: format!("unsupported scheme '{}'", other),
        }),
    }
}
