//! HTTP server setup and the forwarding handler.
//!
//! # Responsibilities
//! - Create Axum Router with the forwarding handler on every path and method
//! - Wire up middleware (route match, tracing)
//! - Authorize each routed request against the allowlist
//! - Relay allowed requests, answer denied ones with a fixed 403
//! - Serve until the shutdown signal

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::config::RouteServiceConfig;
use crate::error::{RouteServiceError, StartupError};
use crate::http::headers::{self, X_CF_FORWARDED_URL, X_FORWARDED_FOR};
use crate::http::middleware::route_match_middleware;
use crate::http::relay::Relay;
use crate::http::response::access_denied;
use crate::observability::metrics::{self, Outcome};
use crate::routing::{route_service_matcher, AllOf};
use crate::security::{authorize, AccessDecision, Allowlist, ForwardedChain};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub matcher: Arc<AllOf>,
    pub allowlist: Arc<Allowlist>,
    pub relay: Relay,
}

/// HTTP server for the route service.
pub struct HttpServer {
    router: Router,
    config: RouteServiceConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: RouteServiceConfig) -> Result<Self, StartupError> {
        let allowlist = Allowlist::parse(&config.access.valid_ips);
        if allowlist.is_empty() {
            tracing::warn!("Allowlist is empty, every request will be denied");
        } else {
            tracing::info!(entries = allowlist.len(), "Allowlist loaded");
        }

        let state = AppState {
            matcher: Arc::new(route_service_matcher()),
            allowlist: Arc::new(allowlist),
            relay: Relay::new(&config.timeouts)?,
        };

        let router = Self::build_router(state);
        Ok(Self { router, config })
    }

    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/", any(forward_handler))
            .route("/{*path}", any(forward_handler))
            .route_layer(middleware::from_fn_with_state(
                state.clone(),
                route_match_middleware,
            ))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// The assembled router, for driving the service without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener until shutdown.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &RouteServiceConfig {
        &self.config
    }
}

/// Forwarding handler. Only reached once the route matched.
async fn forward_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let method = request.method().clone();

    tracing::info!(
        method = %method,
        uri = %request.uri(),
        headers = ?request.headers(),
        "Incoming request"
    );

    // Kept for the failure log; the request is consumed by the relay.
    let forwarded_url =
        headers::first_value(request.headers(), &X_CF_FORWARDED_URL).map(|v| v.into_owned());
    let chain =
        headers::first_value(request.headers(), &X_FORWARDED_FOR).map(|v| ForwardedChain::parse(&v));

    let (outcome, response) = match handle(&state, request).await {
        Ok(handled) => handled,
        Err(e) => {
            tracing::error!(
                method = %method,
                url = forwarded_url.as_deref(),
                ips = chain.as_ref().map(tracing::field::display),
                error = %e,
                "Request failed"
            );
            (Outcome::Error, e.into_response())
        }
    };

    metrics::record_request(&method, outcome, response.status(), start_time);
    response
}

async fn handle(
    state: &AppState,
    request: Request<Body>,
) -> Result<(Outcome, Response), RouteServiceError> {
    // 1. Authorize
    let chain = ForwardedChain::from_headers(request.headers())?;
    if authorize(&state.allowlist, &chain) == AccessDecision::Deny {
        tracing::info!(ips = %chain, "Client not authorized");
        return Ok((Outcome::Denied, access_denied()));
    }

    // 2. Relay
    let response = state.relay.forward(request, &chain).await.inspect_err(|e| {
        tracing::warn!(ips = %chain, error = %e, "Relay failed");
    })?;
    Ok((Outcome::Forwarded, response))
}
