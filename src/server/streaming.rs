//! Outbound streaming response.
//!
//! The body is the relayed text written as-is, with event-stream headers.
//! Fragments are not framed as SSE `data:` events.

use axum::body::Body;
use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::relay::upstream::ByteStream;

/// Content type advertised for the relayed stream.
pub const EVENT_STREAM: &str = "text/event-stream";

/// Commit a 200 response whose body is `body`.
///
/// If `body` yields an error, the connection is cut without a trailer.
pub fn text_stream_response(body: ByteStream) -> Response {
    (
        [
            (header::CONTENT_TYPE, EVENT_STREAM),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Body::from_stream(body),
    )
        .into_response()
}
