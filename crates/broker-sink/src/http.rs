//! HTTP sink posting raw payloads.

use crate::{SinkError, SinkResult};
use async_trait::async_trait;
use relay_forwarder::{DeliveryError, Sink};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

const OCTET_STREAM: &str = "application/octet-stream";

/// Sink that POSTs each payload as `application/octet-stream`.
///
/// Any 2xx response counts as delivered.
pub struct HttpSink {
    client: Client,
    url: Url,
    closed: AtomicBool,
}

impl HttpSink {
    /// Create a sink posting to `url`.
    pub fn new(url: &str) -> SinkResult<Self> {
        let url = Url::parse(url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SinkError::Config(format!(
                "unsupported scheme {:?} for HTTP sink",
                url.scheme()
            )));
        }

        let client = Client::builder().build()?;
        Ok(Self {
            client,
            url,
            closed: AtomicBool::new(false),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl Sink for HttpSink {
    async fn send(&self, payload: &[u8], timeout: Duration) -> Result<(), DeliveryError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DeliveryError::Closed);
        }

        debug!(url = %self.url, bytes = payload.len(), "Posting payload");

        let response = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, OCTET_STREAM)
            .timeout(timeout)
            .body(payload.to_vec())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::Timeout(timeout)
                } else {
                    DeliveryError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected(format!("HTTP {}: {}", status, body)));
        }

        Ok(())
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            info!(url = %self.url, "HTTP sink closed");
        }
    }
}
