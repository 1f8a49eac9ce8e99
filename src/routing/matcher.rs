//! Route matching logic.
//!
//! # Responsibilities
//! - Match presence of a header (case-insensitive name, any value)
//! - Combine conditions with AND semantics
//!
//! # Design Decisions
//! - Header values are not inspected; an empty value still matches
//! - Empty condition list = always matches (wildcard)

use axum::body::Body;
use axum::http::{HeaderName, Request};

use crate::http::headers::CONTROL_HEADERS;

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the request matches this condition.
    fn matches(&self, req: &Request<Body>) -> bool;
}

/// Matches when the header is present.
#[derive(Debug, Clone)]
pub struct HeaderPresentMatcher {
    name: HeaderName,
}

impl HeaderPresentMatcher {
    pub fn new(name: HeaderName) -> Self {
        Self { name }
    }
}

impl Matcher for HeaderPresentMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        req.headers().contains_key(&self.name)
    }
}

/// Combines multiple matchers with AND semantics.
#[derive(Debug)]
pub struct AllOf {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AllOf {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }
}

impl Matcher for AllOf {
    fn matches(&self, req: &Request<Body>) -> bool {
        self.matchers.iter().all(|m| m.matches(req))
    }
}

/// The route of this service: all three control headers present.
pub fn route_service_matcher() -> AllOf {
    AllOf::new(
        CONTROL_HEADERS
            .into_iter()
            .map(|name| Box::new(HeaderPresentMatcher::new(name)) as Box<dyn Matcher>)
            .collect(),
    )
}
