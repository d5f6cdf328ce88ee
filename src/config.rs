//! Connector configuration
//!
//! Configuration consumed by the extractor: API credentials, the optional
//! replication start date, and HTTP tuning knobs. Loaded from a JSON file,
//! from environment variables, or built in code.

use crate::error::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.finance.visma.net";

/// Default OAuth2 token endpoint
pub const DEFAULT_TOKEN_URL: &str = "https://connect.visma.com/connect/token";

/// Default OAuth2 scope
pub const DEFAULT_SCOPE: &str = "vismanet_erp_service_api:read";

/// Default page size the API serves for list endpoints
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Connector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// OAuth2 client id
    pub client_id: String,

    /// OAuth2 client secret
    pub client_secret: String,

    /// Visma.net tenant (company) id
    pub tenant_id: String,

    /// Earliest record date to extract (ISO-8601 date or datetime).
    /// Absent means no lower bound for the generic date filter; streams
    /// that partition by period substitute their own epoch default.
    #[serde(default)]
    pub start_date: Option<String>,

    /// API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// OAuth2 token endpoint
    #[serde(default = "default_token_url")]
    pub token_url: String,

    /// OAuth2 scope
    #[serde(default = "default_scope")]
    pub scope: String,

    /// Records per page the API serves for list endpoints
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum retries for retryable request failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Requests per second allowed against the API
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_token_url() -> String {
    DEFAULT_TOKEN_URL.to_string()
}

fn default_scope() -> String {
    DEFAULT_SCOPE.to_string()
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_requests_per_second() -> u32 {
    10
}

impl ConnectorConfig {
    /// Create a config with the given credentials and all defaults
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        tenant_id: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            tenant_id: tenant_id.into(),
            start_date: None,
            base_url: default_base_url(),
            token_url: default_token_url(),
            scope: default_scope(),
            page_size: default_page_size(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            requests_per_second: default_requests_per_second(),
        }
    }

    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `VISMA_*` environment variables
    ///
    /// Recognized: `VISMA_CLIENT_ID`, `VISMA_CLIENT_SECRET`, `VISMA_TENANT_ID`,
    /// `VISMA_START_DATE`, `VISMA_BASE_URL`, `VISMA_TOKEN_URL`.
    pub fn from_env() -> Result<Self> {
        let get = |key: &str| std::env::var(key).ok();

        let client_id = get("VISMA_CLIENT_ID").ok_or_else(|| Error::missing_field("client_id"))?;
        let client_secret =
            get("VISMA_CLIENT_SECRET").ok_or_else(|| Error::missing_field("client_secret"))?;
        let tenant_id = get("VISMA_TENANT_ID").ok_or_else(|| Error::missing_field("tenant_id"))?;

        let mut config = Self::new(client_id, client_secret, tenant_id);
        config.start_date = get("VISMA_START_DATE");
        if let Some(base_url) = get("VISMA_BASE_URL") {
            config.base_url = base_url;
        }
        if let Some(token_url) = get("VISMA_TOKEN_URL") {
            config.token_url = token_url;
        }
        config.validate()?;
        Ok(config)
    }

    /// Set the start date
    #[must_use]
    pub fn with_start_date(mut self, start_date: impl Into<String>) -> Self {
        self.start_date = Some(start_date.into());
        self
    }

    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the token URL
    #[must_use]
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    /// Set the page size
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Validate required fields and URL shapes
    pub fn validate(&self) -> Result<()> {
        if self.client_id.is_empty() {
            return Err(Error::missing_field("client_id"));
        }
        if self.client_secret.is_empty() {
            return Err(Error::missing_field("client_secret"));
        }
        if self.tenant_id.is_empty() {
            return Err(Error::missing_field("tenant_id"));
        }
        if self.page_size == 0 {
            return Err(Error::InvalidConfigValue {
                field: "page_size".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        url::Url::parse(&self.base_url)?;
        url::Url::parse(&self.token_url)?;
        Ok(())
    }

    /// Parse the configured start date into a calendar date.
    ///
    /// Accepts a plain date (`2023-06-15`) or an RFC 3339 datetime. A
    /// malformed value is a hard error; partition enumeration is where it
    /// surfaces.
    pub fn start_date_parsed(&self) -> Result<Option<NaiveDate>> {
        match &self.start_date {
            None => Ok(None),
            Some(raw) => parse_start_date(raw).map(Some),
        }
    }

    /// Request timeout as a [`Duration`]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Parse an ISO-8601 date or datetime string into a calendar date
pub fn parse_start_date(raw: &str) -> Result<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.date_naive());
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Ok(ndt.date());
    }
    Err(Error::InvalidConfigValue {
        field: "start_date".to_string(),
        message: format!("not an ISO-8601 date or datetime: {raw}"),
    })
}
