//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Routed request:
//!     → access_control.rs (X-Forwarded-For chain ∩ allowlist)
//!     → Allow: pass to relay
//!     → Deny: fixed 403, no downstream call
//! ```
//!
//! # Design Decisions
//! - Allowlist is parsed once and injected into handler state
//! - Missing X-Forwarded-For is an error, never a silent allow or deny

pub mod access_control;

pub use access_control::{authorize, AccessDecision, Allowlist, ForwardedChain};
