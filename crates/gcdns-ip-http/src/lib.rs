// # HTTP IP Source
//
// This crate provides an HTTP-based public IP source for gcdns.
//
// ## Architecture
//
// Asks an external "what is my IP" service (ipify by default) for the
// caller's address. The service must answer with the address as plain
// text. Surrounding whitespace is trimmed; everything else is returned
// as-is, since validating the address is the poll loop's job.
//
// One request is made per call. Nothing is cached between calls.

use gcdns_core::config::IpSourceConfig;
use gcdns_core::traits::IpSource;
use gcdns_core::{Error, Result};

use std::time::Duration;

/// Default request timeout for the IP service
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// HTTP-based public IP source
pub struct HttpIpSource {
    /// URL to fetch IP from
    url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpIpSource {
    /// Create a new HTTP IP source with the default timeout
    ///
    /// # Parameters
    ///
    /// - `url`: URL to fetch IP from (e.g., "https://api.ipify.org")
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_timeout(url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create with a custom request timeout
    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
        }
    }

    /// Create from validated configuration
    pub fn from_config(config: &IpSourceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_timeout(config.url.clone(), config.timeout()))
    }

    /// The URL this source queries
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait::async_trait]
impl IpSource for HttpIpSource {
    async fn fetch_public_ip(&self) -> Result<String> {
        tracing::debug!("Fetching public IP from {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::transport(format!("Request to {} failed: {}", self.url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::transport(format!(
                "{} answered with HTTP {}",
                self.url, status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::transport(format!("Failed to read response: {}", e)))?;

        Ok(body.trim().to_string())
    }

    fn source_name(&self) -> &'static str {
        "http"
    }
}
