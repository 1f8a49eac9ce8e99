//! Error types for request handling and startup.

use std::time::Duration;

use axum::http::{HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors that end the handling of a single request.
///
/// An authorization deny is not represented here; it is a normal outcome.
#[derive(Debug, Error)]
pub enum RouteServiceError {
    /// A header required after routing is absent.
    #[error("No {0} header present")]
    MissingHeader(HeaderName),

    /// The forwarded URL is not an absolute http(s) URL.
    #[error("Invalid forwarded URL {url:?}: {reason}")]
    InvalidForwardedUrl { url: String, reason: String },

    /// The outbound call could not be established or failed before a response arrived.
    #[error("Downstream request failed: {0}")]
    Transport(#[from] hyper_util::client::legacy::Error),

    /// The downstream did not send a response head in time.
    #[error("Downstream did not respond within {0:?}")]
    ResponseTimeout(Duration),
}

impl RouteServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            RouteServiceError::MissingHeader(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RouteServiceError::InvalidForwardedUrl { .. } => StatusCode::BAD_GATEWAY,
            RouteServiceError::Transport(_) => StatusCode::BAD_GATEWAY,
            RouteServiceError::ResponseTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl IntoResponse for RouteServiceError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

/// Errors raised while assembling the server.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("TLS client configuration failed: {0}")]
    Tls(#[from] rustls::Error),
}
