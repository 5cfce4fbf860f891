//! Error taxonomy for the relay and its HTTP mapping.
//!
//! Errors raised before the outbound stream is committed become structured
//! responses. Once the body has started, an error can only end the stream.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Message returned when the upstream call cannot be established.
pub const UPSTREAM_CONNECT_MESSAGE: &str = "Error communicating with OpenAI";

/// Message returned when the upstream stream fails before any text was relayed.
pub const UPSTREAM_STREAM_MESSAGE: &str = "Error during OpenAI streaming";

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Messages is required")]
    MissingMessages,

    #[error("{0}")]
    InvalidBody(String),

    #[error("upstream request failed: {0}")]
    UpstreamConnect(#[from] reqwest::Error),

    #[error("upstream returned HTTP {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    #[error("upstream stream failed: {0}")]
    UpstreamTransport(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// JSON error body: `{"message": "..."}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
}

impl ErrorBody {
    fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        match self {
            Self::MissingMessages | Self::InvalidBody(_) => {
                (StatusCode::BAD_REQUEST, ErrorBody::new(self.to_string())).into_response()
            }
            Self::UpstreamConnect(_) | Self::UpstreamStatus { .. } => {
                error!(error = %self, "Error calling OpenAI API");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody::new(UPSTREAM_CONNECT_MESSAGE),
                )
                    .into_response()
            }
            // Already logged by the relay loop.
            Self::UpstreamTransport(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, UPSTREAM_STREAM_MESSAGE).into_response()
            }
            Self::Config(_) => {
                error!(error = %self, "Relay misconfigured");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody::new(UPSTREAM_CONNECT_MESSAGE),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_missing_messages_is_bad_request() {
        let response = RelayError::MissingMessages.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_string(response).await,
            r#"{"message":"Messages is required"}"#
        );
    }

    #[tokio::test]
    async fn test_upstream_status_hides_root_cause() {
        let response = RelayError::UpstreamStatus {
            status: 401,
            body: "invalid api key".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_string(response).await;
        assert_eq!(body, r#"{"message":"Error communicating with OpenAI"}"#);
    }

    #[tokio::test]
    async fn test_transport_error_is_plain_text() {
        let response = RelayError::UpstreamTransport("reset".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_string(response).await, UPSTREAM_STREAM_MESSAGE);
    }
}
