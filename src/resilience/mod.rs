//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to downstream:
//!     → connect timeout (outbound connector)
//!     → response head timeout (relay, started once the request body is sent)
//!     → timeouts.rs (idle timeout on inbound and downstream bodies)
//! ```
//!
//! # Design Decisions
//! - No retries and no fallback target; a failed exchange fails the request
//! - Every timeout can be disabled by configuring zero

pub mod timeouts;

pub use timeouts::{
    notify_end_of_stream, with_idle_timeout, EndOfStreamBody, IdleTimeout, IdleTimeoutBody,
};
