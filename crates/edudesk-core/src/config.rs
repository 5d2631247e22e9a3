//! Client configuration for EduDesk apps.
//!
//! Resolves the backend API base URL, identity provider endpoint/key, and the
//! network timeout from the environment. These are safe-to-ship public
//! endpoints; secret credentials must never be stored here.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default bounded timeout for backend calls, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 20;

const ENV_API_BASE_URL: &str = "EDUDESK_API_BASE_URL";
const ENV_IDENTITY_API_KEY: &str = "EDUDESK_IDENTITY_API_KEY";
const ENV_IDENTITY_URL: &str = "EDUDESK_IDENTITY_URL";
const ENV_REQUEST_TIMEOUT_SECS: &str = "EDUDESK_REQUEST_TIMEOUT_SECS";

const DEFAULT_IDENTITY_URL: &str = "https://identitytoolkit.googleapis.com/v1";

/// Runtime configuration shared by the CLI and any other client surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Backend API base URL, e.g. `https://api.edudesk.app`.
    pub api_base_url: String,
    /// Identity Toolkit REST endpoint.
    pub identity_url: String,
    /// Public identity API key (web API key, not a secret).
    pub identity_api_key: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl ClientConfig {
    /// Build a config from explicit values, normalizing and validating URLs.
    pub fn new(
        api_base_url: impl Into<String>,
        identity_url: impl Into<String>,
        identity_api_key: impl Into<String>,
    ) -> Result<Self> {
        let api_base_url = normalize_base_url(api_base_url.into(), "api base URL")?;
        let identity_url = normalize_base_url(identity_url.into(), "identity URL")?;
        let identity_api_key = normalize_text_option(Some(identity_api_key.into()))
            .ok_or_else(|| Error::InvalidInput("identity API key must not be empty".to_string()))?;

        Ok(Self {
            api_base_url,
            identity_url,
            identity_api_key,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        })
    }

    /// Resolve configuration from environment variables.
    ///
    /// `EDUDESK_API_BASE_URL` and `EDUDESK_IDENTITY_API_KEY` are required;
    /// `EDUDESK_IDENTITY_URL` and `EDUDESK_REQUEST_TIMEOUT_SECS` are optional.
    pub fn from_env() -> Result<Self> {
        let api_base_url = require_env(ENV_API_BASE_URL)?;
        let identity_api_key = require_env(ENV_IDENTITY_API_KEY)?;
        let identity_url = normalize_text_option(std::env::var(ENV_IDENTITY_URL).ok())
            .unwrap_or_else(|| DEFAULT_IDENTITY_URL.to_string());

        let mut config = Self::new(api_base_url, identity_url, identity_api_key)?;

        if let Some(raw) = normalize_text_option(std::env::var(ENV_REQUEST_TIMEOUT_SECS).ok()) {
            config.request_timeout_secs = raw.parse().map_err(|_| {
                Error::InvalidInput(format!(
                    "{ENV_REQUEST_TIMEOUT_SECS} must be a positive integer, got '{raw}'"
                ))
            })?;
        }

        Ok(config)
    }

    /// The bounded timeout applied to every backend call.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn require_env(name: &str) -> Result<String> {
    normalize_text_option(std::env::var(name).ok())
        .ok_or_else(|| Error::InvalidInput(format!("environment variable {name} is required")))
}

fn normalize_base_url(raw: String, label: &str) -> Result<String> {
    let value = normalize_text_option(Some(raw))
        .ok_or_else(|| Error::InvalidInput(format!("{label} must not be empty")))?;
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(value.trim_end_matches('/').to_string())
    } else {
        Err(Error::InvalidInput(format!(
            "{label} must include http:// or https://"
        )))
    }
}

/// Trim an optional setting, treating blank values as unset.
fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
