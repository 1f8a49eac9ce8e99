//! Route service: an HTTP intermediary that forwards allowlisted clients to
//! the URL named in `X-CF-Forwarded-Url` and rejects everyone else.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod routing;
pub mod security;

pub use config::RouteServiceConfig;
pub use error::RouteServiceError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
