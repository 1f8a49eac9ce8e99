//! IP allowlist authorization.
//!
//! # Responsibilities
//! - Parse the configured allowlist once at startup
//! - Parse the `X-Forwarded-For` chain of each request
//! - Decide allow/deny by set intersection
//!
//! # Design Decisions
//! - IPs are compared as strings; entries are not required to be valid addresses
//! - All whitespace is removed before splitting on commas; empty entries are dropped
//! - Any hop in the chain may match, including client-supplied leftmost hops.
//!   Trusting only the nearest hop would be stricter but is not what deployed
//!   clients rely on.

use std::fmt;

use axum::http::HeaderMap;

use crate::error::RouteServiceError;
use crate::http::headers;

fn split_ips(raw: &str) -> Vec<String> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    compact
        .split(',')
        .filter(|ip| !ip.is_empty())
        .map(str::to_owned)
        .collect()
}

/// IPs allowed to use the service. Read-only after startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Allowlist {
    entries: Vec<String>,
}

impl Allowlist {
    pub fn parse(raw: &str) -> Self {
        Self {
            entries: split_ips(raw),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }
}

/// Hop history from `X-Forwarded-For`, leftmost first, duplicates kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardedChain {
    hops: Vec<String>,
}

impl ForwardedChain {
    pub fn parse(raw: &str) -> Self {
        Self {
            hops: split_ips(raw),
        }
    }

    /// Read the chain from the first `X-Forwarded-For` value.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, RouteServiceError> {
        headers::forwarded_for(headers).map(|raw| Self::parse(&raw))
    }

    pub fn contains(&self, ip: &str) -> bool {
        self.hops.iter().any(|hop| hop == ip)
    }

    pub fn hops(&self) -> &[String] {
        &self.hops
    }
}

impl fmt::Display for ForwardedChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.hops.join(", "))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    Deny,
}

/// Allow when any allowlisted IP appears anywhere in the chain.
pub fn authorize(allowlist: &Allowlist, chain: &ForwardedChain) -> AccessDecision {
    if allowlist.iter().any(|ip| chain.contains(ip)) {
        AccessDecision::Allow
    } else {
        AccessDecision::Deny
    }
}
