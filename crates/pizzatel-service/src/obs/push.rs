//! Push transport shared by the metrics exporter and the log shipper.
//!
//! A `PushTarget` POSTs one pre-encoded JSON body and reports success only
//! for a 2xx answer. No retries: callers log and drop on error.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};

use pizzatel_core::error::{Result, PizzatelError};

#[async_trait]
pub trait PushTarget: Send + Sync {
    /// POST `body` (JSON) to the collector.
    async fn post_json(&self, body: Bytes) -> Result<()>;
}

/// `Basic base64(credential)`.
pub fn basic_auth_header(credential: &str) -> String {
    format!("Basic {}", STANDARD.encode(credential))
}

/// reqwest-backed target with a fixed URL, credential and timeout.
pub struct HttpPushTarget {
    client: reqwest::Client,
    url: String,
    authorization: String,
}

impl HttpPushTarget {
    pub fn new(url: impl Into<String>, credential: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PizzatelError::Transport(format!("http client build failed: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
            authorization: basic_auth_header(credential),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl PushTarget for HttpPushTarget {
    async fn post_json(&self, body: Bytes) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, &self.authorization)
            .body(body)
            .send()
            .await
            .map_err(|e| PizzatelError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PizzatelError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_auth_encodes_credential_verbatim() {
        assert_eq!(basic_auth_header("123456:glc_abc"), "Basic MTIzNDU2OmdsY19hYmM=");
        assert_eq!(basic_auth_header("key"), "Basic a2V5");
    }
}
