//! Webhook delivery for device notifications.
//!
//! [`WebhookDelivery`] POSTs a JSON-encoded [`DeviceEvent`] to the
//! single endpoint configured at startup, retrying with exponential
//! backoff (1 s, 2 s, 4 s) before giving up.

use std::time::Duration;

use crate::bus::DeviceEvent;

/// Attempts per event, including the first.
const MAX_ATTEMPTS: u32 = 4;

/// HTTP request timeout for a single delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Error type for webhook delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote server returned a non-2xx status code.
    #[error("Webhook returned HTTP {0}")]
    HttpStatus(u16),
}

/// Delivers device events to a fixed webhook endpoint.
pub struct WebhookDelivery {
    url: String,
    client: reqwest::Client,
}

impl WebhookDelivery {
    /// Create a delivery service for one endpoint URL.
    pub fn new(url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self { url, client }
    }

    /// Deliver one event, retrying with backoff. Returns `Ok(())` on the
    /// first successful attempt.
    pub async fn deliver(&self, event: &DeviceEvent) -> Result<(), WebhookError> {
        let mut attempt = 1;
        loop {
            match self.try_send(event).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < MAX_ATTEMPTS => {
                    // 1s, 2s, 4s between the four attempts.
                    let backoff = Duration::from_secs(1 << (attempt - 1));
                    tracing::warn!(
                        attempt,
                        url = %self.url,
                        error = %e,
                        "Webhook delivery attempt failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(url = %self.url, error = %e, "Webhook delivery failed after all retries");
                    return Err(e);
                }
            }
        }
    }

    async fn try_send(&self, event: &DeviceEvent) -> Result<(), WebhookError> {
        let response = self.client.post(&self.url).json(event).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(WebhookError::HttpStatus(response.status().as_u16()))
        }
    }
}
