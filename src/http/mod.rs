//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, tracing)
//!     → middleware/route_match.rs (control headers present? else 404)
//!     → server.rs handler (authorize X-Forwarded-For against allowlist)
//!     → relay.rs (forward to X-CF-Forwarded-Url, stream both bodies)
//!       or response.rs (fixed 403)
//!     → Send to client
//! ```

pub mod headers;
pub mod middleware;
pub mod relay;
pub mod response;
pub mod server;

pub use relay::Relay;
pub use server::{AppState, HttpServer};
