//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (headers)
//!     → matcher.rs (X-CF-Forwarded-Url, X-CF-Proxy-Metadata, X-CF-Proxy-Signature present?)
//!     → Match: forwarding handler
//!     → NoMatch: 404, handler never runs
//! ```
//!
//! # Design Decisions
//! - Matcher built at startup, immutable at runtime
//! - Path and method play no part in matching

pub mod matcher;

pub use matcher::{route_service_matcher, AllOf, HeaderPresentMatcher, Matcher};
