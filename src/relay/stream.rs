//! Relay loop: upstream event stream in, plain text out.
//!
//! The loop is a small state machine driven by the three things the
//! upstream body can deliver: a chunk, end of input, or a transport error.
//!
//! ```text
//!               chunk (deltas forwarded)
//!              ┌────────┐
//!              ▼        │
//!          STREAMING ───┘
//!           │      │
//!  [DONE] / │      │ transport error
//!  end of   ▼      ▼
//!  input   DONE   FAILED
//! ```
//!
//! Output fragments are the raw delta text, not re-framed as SSE events.

use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use tracing::{debug, error, info, trace, warn};

use crate::error::RelayError;
use crate::relay::decoder::EventDecoder;
use crate::relay::types::UpstreamEvent;

/// Relay progress for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Streaming,
    Done,
    Failed,
}

/// Per-request bookkeeping. Logs a cancellation if dropped mid-stream,
/// which happens when the downstream client goes away.
struct RelayProgress {
    request_id: String,
    state: RelayState,
    fragments: usize,
    bytes: usize,
    malformed: usize,
}

impl RelayProgress {
    fn new(request_id: String) -> Self {
        Self {
            request_id,
            state: RelayState::Streaming,
            fragments: 0,
            bytes: 0,
            malformed: 0,
        }
    }

    /// Apply one decoded event, returning text to forward.
    fn apply(&mut self, event: UpstreamEvent) -> Option<Bytes> {
        match event {
            UpstreamEvent::Delta(text) => {
                trace!(request_id = %self.request_id, text = %text, "Forwarding delta");
                self.fragments += 1;
                self.bytes += text.len();
                Some(Bytes::from(text))
            }
            UpstreamEvent::Done => {
                self.state = RelayState::Done;
                None
            }
            UpstreamEvent::Malformed(reason) => {
                self.malformed += 1;
                warn!(request_id = %self.request_id, %reason, "Error parsing upstream event, skipping");
                None
            }
            UpstreamEvent::Ignored => None,
        }
    }
}

impl Drop for RelayProgress {
    fn drop(&mut self) {
        if self.state == RelayState::Streaming {
            debug!(
                request_id = %self.request_id,
                fragments = self.fragments,
                "Client went away, dropping upstream stream"
            );
        }
    }
}

/// Convert an upstream byte stream into the outbound text stream.
///
/// The stream ends after the `[DONE]` sentinel or at end of input. A
/// transport error is yielded once as `Err` and ends the stream.
pub fn relay_stream<S>(
    upstream: S,
    request_id: String,
) -> impl Stream<Item = Result<Bytes, RelayError>> + Send + 'static
where
    S: Stream<Item = Result<Bytes, RelayError>> + Send + 'static,
{
    async_stream::stream! {
        let mut upstream = std::pin::pin!(upstream);
        let mut decoder = EventDecoder::new();
        let mut progress = RelayProgress::new(request_id);

        while progress.state == RelayState::Streaming {
            match upstream.next().await {
                Some(Ok(chunk)) => {
                    for event in decoder.push(&chunk) {
                        if let Some(text) = progress.apply(event) {
                            yield Ok(text);
                        }
                    }
                }
                Some(Err(e)) => {
                    progress.state = RelayState::Failed;
                    error!(
                        request_id = %progress.request_id,
                        error = %e,
                        fragments = progress.fragments,
                        "Error during upstream streaming"
                    );
                    yield Err(e);
                }
                None => {
                    for event in decoder.finish() {
                        if let Some(text) = progress.apply(event) {
                            yield Ok(text);
                        }
                    }
                    if progress.state == RelayState::Streaming {
                        debug!(request_id = %progress.request_id, "Upstream closed without [DONE]");
                        progress.state = RelayState::Done;
                    }
                }
            }
        }

        if progress.state == RelayState::Done {
            info!(
                request_id = %progress.request_id,
                fragments = progress.fragments,
                bytes = progress.bytes,
                malformed = progress.malformed,
                "Streaming complete"
            );
        }
    }
}
