//! Presence over an HTTP bridge.
//!
//! The bridge runs next to Discord and accepts `POST /update` with the flat
//! payload as JSON and `POST /clear`. Failures here are transient: the
//! bridge owns the real Discord connection and reconnects on its own.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::channel::{ChannelError, PresenceChannel};
use super::payload::PresencePayload;

pub struct RemoteBridge {
    base_url: String,
    client: Client,
}

impl RemoteBridge {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, ChannelError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ChannelError::Unavailable(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post(&self, path: &str, body: Option<serde_json::Value>) -> Result<(), ChannelError> {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.client.post(&url);
        if let Some(body) = body {
            req = req.json(&body);
        }

        let response = req
            .send()
            .await
            .map_err(|e| ChannelError::Unavailable(e.to_string()))?;

        let status = response.status();
        debug!(url = %url, status = status.as_u16(), "Bridge response");
        if status.is_success() {
            Ok(())
        } else {
            Err(ChannelError::Unavailable(format!("HTTP {status}")))
        }
    }
}

#[async_trait]
impl PresenceChannel for RemoteBridge {
    /// The bridge is stateless from our side.
    async fn connect(&mut self) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn push(&mut self, payload: &PresencePayload) -> Result<(), ChannelError> {
        let body = serde_json::to_value(payload.flat())
            .map_err(|e| ChannelError::Protocol(e.to_string()))?;
        self.post("/update", Some(body)).await
    }

    async fn clear(&mut self) -> Result<(), ChannelError> {
        self.post("/clear", None).await
    }
}
