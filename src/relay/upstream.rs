//! Upstream completion source.
//!
//! [`CompletionSource`] is the seam between the relay and the provider: it
//! opens one streaming completion and hands back the raw response body.
//! [`OpenAiClient`] is the production implementation over reqwest.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use tracing::{debug, info};

use crate::config::UpstreamConfig;
use crate::error::RelayError;
use crate::relay::types::UpstreamRequest;

/// Raw upstream body: byte chunks in arrival order.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, RelayError>> + Send>>;

/// Something that can open a streaming chat completion.
#[async_trait]
pub trait CompletionSource: Send + Sync {
    /// Issue the request once. Failures before any body bytes arrive
    /// (connection, auth, non-2xx status) are returned as `Err`.
    async fn open_stream(&self, request: &UpstreamRequest) -> Result<ByteStream, RelayError>;
}

/// OpenAI-compatible chat completions client.
pub struct OpenAiClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl OpenAiClient {
    /// Build a client from upstream settings. The API key must be present.
    pub fn new(config: &UpstreamConfig) -> Result<Self, RelayError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| RelayError::Config("upstream API key is not set".into()))?;

        let mut builder = reqwest::Client::builder();
        if config.connect_timeout_secs > 0 {
            builder = builder.connect_timeout(Duration::from_secs(config.connect_timeout_secs));
        }
        let http = builder.build().map_err(RelayError::UpstreamConnect)?;

        Ok(Self {
            http,
            endpoint: config.endpoint(),
            api_key,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl CompletionSource for OpenAiClient {
    async fn open_stream(&self, request: &UpstreamRequest) -> Result<ByteStream, RelayError> {
        debug!(
            endpoint = %self.endpoint,
            model = %request.model,
            messages = request.messages.len(),
            "Opening upstream stream"
        );

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::UpstreamStatus {
                status: status.as_u16(),
                body,
            });
        }

        info!(status = status.as_u16(), "Upstream stream opened");

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| RelayError::UpstreamTransport(e.to_string())));
        Ok(Box::pin(body))
    }
}
