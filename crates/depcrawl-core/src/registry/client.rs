//! npm registry client implementation
//!
//! Provides an async HTTP client for the npm registry with:
//! - Manifest and weekly download-count requests
//! - Per-request timeout
//! - Retry with exponential backoff for timeouts, rate limits and 5xx

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::Client as HttpClient;
use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::config::RegistryConfig;
use crate::error::{Error, Result};

use super::Registry;
use super::types::{DownloadCount, Manifest};

/// Base delay for exponential backoff (in milliseconds)
const BACKOFF_BASE_MS: u64 = 500;

/// Wait applied to a 429 without a usable Retry-After header
const DEFAULT_RATE_LIMIT_SECS: u64 = 1;

/// npm registry client
///
/// Cheap to clone and safe to share between tasks. Holds no state besides
/// the connection pool.
#[derive(Clone)]
pub struct RegistryClient {
    /// HTTP client for making requests
    http_client: HttpClient,
    /// Base URL serving package manifests
    registry_url: String,
    /// Base URL serving download counts
    downloads_url: String,
    /// Retries after the first attempt for transient failures
    max_retries: u32,
    backoff_base_ms: u64,
}

impl std::fmt::Debug for RegistryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryClient")
            .field("registry_url", &self.registry_url)
            .field("downloads_url", &self.downloads_url)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

/// Builder for creating a RegistryClient
pub struct RegistryClientBuilder {
    config: Option<RegistryConfig>,
    registry_url: Option<String>,
    downloads_url: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    backoff_base_ms: Option<u64>,
}

impl Default for RegistryClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryClientBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            config: None,
            registry_url: None,
            downloads_url: None,
            timeout_secs: None,
            max_retries: None,
            backoff_base_ms: None,
        }
    }

    /// Set the registry configuration
    pub fn config(mut self, config: RegistryConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the manifest base URL (defaults to registry.npmjs.org)
    pub fn registry_url(mut self, url: impl Into<String>) -> Self {
        self.registry_url = Some(url.into());
        self
    }

    /// Set the download-count base URL (defaults to api.npmjs.org)
    pub fn downloads_url(mut self, url: impl Into<String>) -> Self {
        self.downloads_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Set how many times a transient failure is retried
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// Set the first backoff delay
    pub fn backoff_base_ms(mut self, ms: u64) -> Self {
        self.backoff_base_ms = Some(ms);
        self
    }

    /// Build the RegistryClient
    pub fn build(self) -> Result<RegistryClient> {
        let config = self.config.unwrap_or_default();
        let timeout_secs = self.timeout_secs.unwrap_or(config.timeout_secs);

        let http_client = HttpClient::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(Error::NetworkError)?;

        let trim = |url: String| url.trim_end_matches('/').to_string();

        Ok(RegistryClient {
            http_client,
            registry_url: trim(self.registry_url.unwrap_or(config.registry_url)),
            downloads_url: trim(self.downloads_url.unwrap_or(config.downloads_url)),
            max_retries: self.max_retries.unwrap_or(config.max_retries),
            backoff_base_ms: self.backoff_base_ms.unwrap_or(BACKOFF_BASE_MS),
        })
    }
}

impl RegistryClient {
    /// Create a new RegistryClient from configuration
    pub fn new(config: RegistryConfig) -> Result<Self> {
        RegistryClientBuilder::new().config(config).build()
    }

    /// Create a new builder for RegistryClient
    pub fn builder() -> RegistryClientBuilder {
        RegistryClientBuilder::new()
    }

    pub fn registry_url(&self) -> &str {
        &self.registry_url
    }

    /// URL of a package's weekly download count
    pub fn downloads_url(&self, package: &str) -> String {
        format!(
            "{}/downloads/point/last-week/{}",
            self.downloads_url, package
        )
    }

    /// GET a URL, retrying transient failures, and return the body
    async fn get_with_retry(&self, package: &str, url: &str) -> Result<String> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            match self.send(package, url).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_transient() && attempts <= self.max_retries => {
                    let suggested = match &e {
                        Error::RateLimited(secs) => *secs,
                        _ => 0,
                    };
                    let backoff = calculate_backoff(self.backoff_base_ms, attempts, suggested);
                    warn!(
                        package,
                        attempt = attempts,
                        wait_ms = backoff,
                        error = %e,
                        "Registry request failed, retrying after backoff"
                    );
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Send a single request
    async fn send(&self, package: &str, url: &str) -> Result<String> {
        debug!(package, url, "Sending registry request");

        let response = self.http_client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout(package.to_string())
            } else {
                Error::NetworkError(e)
            }
        })?;

        let status = response.status();

        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(package, status, retry_after, body));
        }

        response.text().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout(package.to_string())
            } else {
                Error::NetworkError(e)
            }
        })
    }
}

#[async_trait]
impl Registry for RegistryClient {
    fn manifest_url(&self, package: &str) -> String {
        format!("{}/{}", self.registry_url, encode_package(package))
    }

    async fn fetch_manifest(&self, package: &str) -> Result<Manifest> {
        let body = self
            .get_with_retry(package, &self.manifest_url(package))
            .await?;
        Manifest::from_json(package, &body)
    }

    async fn fetch_weekly_downloads(&self, package: &str) -> Result<u64> {
        let body = self
            .get_with_retry(package, &self.downloads_url(package))
            .await?;
        let count: DownloadCount =
            serde_json::from_str(&body).map_err(|e| Error::Registry {
                package: package.to_string(),
                status: 200,
                message: format!("unreadable download count: {}", e),
            })?;
        Ok(count.downloads)
    }
}

/// Map a non-success status to an error
fn status_error(
    package: &str,
    status: StatusCode,
    retry_after: Option<u64>,
    body: String,
) -> Error {
    match status.as_u16() {
        404 => Error::PackageNotFound(package.to_string()),
        429 => Error::RateLimited(retry_after.unwrap_or(DEFAULT_RATE_LIMIT_SECS)),
        code => Error::Registry {
            package: package.to_string(),
            status: code,
            message: body,
        },
    }
}

/// Scoped packages keep their `@` but encode the separating slash
fn encode_package(package: &str) -> String {
    package.replacen('/', "%2F", 1)
}

/// Calculate backoff delay with jitter
fn calculate_backoff(base_ms: u64, attempt: u32, suggested_wait_secs: u64) -> u64 {
    let base = base_ms.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
    let delay = base.max(suggested_wait_secs.saturating_mul(1000));

    // Up to 10% jitter
    let jitter = delay / 10;
    if jitter == 0 {
        delay
    } else {
        delay + rand::thread_rng().gen_range(0..=jitter)
    }
}
