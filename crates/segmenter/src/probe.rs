//! Stream availability probing.
//!
//! Before opening (or re-opening) a container, worker loops check that the
//! media URL is reachable. The probe retries a bounded number of times with
//! a fixed delay before declaring the stream offline.

use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Probe retry configuration.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Attempts before declaring the stream unavailable.
    pub max_retries: u32,
    /// Fixed delay between attempts.
    pub retry_delay: Duration,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Checks whether a live media URL is currently reachable.
#[async_trait::async_trait]
pub trait StreamProbe: Send + Sync {
    /// Single reachability check. `Ok(true)` means the URL answered 2xx.
    async fn check(&self, url: &str) -> Result<bool>;

    /// Check with bounded retries per [`ProbeConfig`].
    ///
    /// Returns `Ok(())` on the first successful check, or
    /// [`Error::StreamUnavailable`] once all attempts are exhausted.
    /// Transport errors count as failed attempts, not hard failures.
    async fn check_with_retries(&self, url: &str, config: &ProbeConfig) -> Result<()> {
        for attempt in 1..=config.max_retries {
            match self.check(url).await {
                Ok(true) => {
                    debug!(url, attempt, "stream reachable");
                    return Ok(());
                }
                Ok(false) => {
                    warn!(
                        url,
                        attempt,
                        max = config.max_retries,
                        "stream unavailable"
                    );
                }
                Err(e) => {
                    warn!(url, attempt, max = config.max_retries, error = %e, "probe failed");
                }
            }
            if attempt < config.max_retries {
                tokio::time::sleep(config.retry_delay).await;
            }
        }
        Err(Error::StreamUnavailable {
            url: url.to_string(),
            attempts: config.max_retries,
        })
    }
}

/// HEAD-request probe backed by a shared reqwest client.
pub struct HttpStreamProbe {
    client: reqwest::Client,
}

impl HttpStreamProbe {
    pub fn new(request_timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .unwrap_or_default();
        Self { client }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl StreamProbe for HttpStreamProbe {
    async fn check(&self, url: &str) -> Result<bool> {
        let response = self.client.head(url).send().await?;
        let status = response.status();
        debug!(url, status = %status, "probe response");
        Ok(status.is_success())
    }
}
