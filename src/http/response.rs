//! Responses produced by the route service itself.
//!
//! Forwarded responses are built in `relay.rs`; error responses come from
//! `RouteServiceError`'s `IntoResponse` impl.

use axum::body::Body;
use axum::http::{Response, StatusCode};

/// Body of the response to an unauthorized client.
pub const ACCESS_DENIED_BODY: &str = "Access is not allowed!";

/// Fixed 403 for clients outside the allowlist. No headers are set here.
pub fn access_denied() -> Response<Body> {
    let mut response = Response::new(Body::from(ACCESS_DENIED_BODY));
    *response.status_mut() = StatusCode::FORBIDDEN;
    response
}
