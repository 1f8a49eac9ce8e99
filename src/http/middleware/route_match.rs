//! Route Match Middleware.
//! Requests without the control headers are not this service's to handle.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::Instant;

use crate::http::server::AppState;
use crate::observability::metrics::{self, Outcome};
use crate::routing::Matcher;

pub async fn route_match_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let start_time = Instant::now();
    if state.matcher.matches(&req) {
        return next.run(req).await;
    }

    tracing::debug!(
        method = %req.method(),
        uri = %req.uri(),
        "Control headers missing, no route"
    );
    metrics::record_request(req.method(), Outcome::Unmatched, StatusCode::NOT_FOUND, start_time);
    StatusCode::NOT_FOUND.into_response()
}
