//! Per-request relay handling.
//!
//! Axum commits status and headers only when a handler returns its response,
//! so the relay primes the outbound stream first: it waits for the first
//! text fragment, a clean end, or an error. An error at that point can still
//! become a 500; anything later can only cut the body short.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::info;

use crate::config::Config;
use crate::error::RelayError;
use crate::relay::stream::relay_stream;
use crate::relay::types::{PromptStreamRequest, UpstreamRequest};
use crate::relay::upstream::{ByteStream, CompletionSource};

/// Validates inbound prompts, calls upstream once, and relays the result.
pub struct StreamRelay {
    source: Arc<dyn CompletionSource>,
    model: String,
    system_prompt: String,
}

impl StreamRelay {
    pub fn new(source: Arc<dyn CompletionSource>, config: &Config) -> Self {
        Self {
            source,
            model: config.upstream.model.clone(),
            system_prompt: config.prompt.system_prompt.clone(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Handle one prompt, returning the outbound text stream ready to send.
    ///
    /// Errors returned here happened before any output was produced.
    pub async fn handle(
        &self,
        request: PromptStreamRequest,
        request_id: &str,
    ) -> Result<ByteStream, RelayError> {
        let turns = request.into_turns()?;
        let upstream_request = UpstreamRequest::new(&self.model, &self.system_prompt, turns);

        info!(
            request_id,
            model = %upstream_request.model,
            messages = upstream_request.messages.len(),
            "Relaying prompt"
        );

        let upstream = self.source.open_stream(&upstream_request).await?;
        prime(Box::pin(relay_stream(upstream, request_id.to_string()))).await
    }
}

/// Pull the first item so pre-output failures surface as `Err`.
async fn prime(mut relayed: ByteStream) -> Result<ByteStream, RelayError> {
    match relayed.next().await {
        Some(Ok(first)) => Ok(Box::pin(stream::once(async move { Ok(first) }).chain(relayed))),
        Some(Err(e)) => Err(e),
        None => Ok(Box::pin(stream::empty())),
    }
}
