//! Metrics collection and exposition.
//!
//! # Metrics
//! - `route_service_requests_total` (counter): requests by method, outcome, status
//! - `route_service_request_duration_seconds` (histogram): time to response head
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade and is a no-op until an
//!   exporter is installed
//! - Prometheus exporter only runs when enabled in config

use std::net::SocketAddr;
use std::time::Instant;

use axum::http::{Method, StatusCode};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// How a request left the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Forwarded,
    Denied,
    Error,
    Unmatched,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Forwarded => "forwarded",
            Outcome::Denied => "denied",
            Outcome::Error => "error",
            Outcome::Unmatched => "unmatched",
        }
    }
}

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &Method, outcome: Outcome, status: StatusCode, start_time: Instant) {
    ::metrics::counter!(
        "route_service_requests_total",
        "method" => method.to_string(),
        "outcome" => outcome.as_str(),
        "status" => status.as_u16().to_string()
    )
    .increment(1);

    ::metrics::histogram!(
        "route_service_request_duration_seconds",
        "method" => method.to_string(),
        "outcome" => outcome.as_str()
    )
    .record(start_time.elapsed().as_secs_f64());
}
