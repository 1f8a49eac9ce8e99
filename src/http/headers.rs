//! Control header names, extraction and outbound filtering.
//!
//! `HeaderMap` is the multimap: names compare case-insensitively, a name may
//! carry several values, and values for one name keep their arrival order.

use std::borrow::Cow;

use axum::http::header::{HeaderMap, HeaderName, HOST};

use crate::error::RouteServiceError;

/// Absolute URL the request is forwarded to.
pub const X_CF_FORWARDED_URL: HeaderName = HeaderName::from_static("x-cf-forwarded-url");

/// Opaque routing-layer metadata, passed through unchanged.
pub const X_CF_PROXY_METADATA: HeaderName = HeaderName::from_static("x-cf-proxy-metadata");

/// Opaque routing-layer signature, passed through unchanged.
pub const X_CF_PROXY_SIGNATURE: HeaderName = HeaderName::from_static("x-cf-proxy-signature");

/// Comma-separated client/proxy IP chain.
pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Headers whose joint presence routes a request to this service.
pub const CONTROL_HEADERS: [HeaderName; 3] =
    [X_CF_FORWARDED_URL, X_CF_PROXY_METADATA, X_CF_PROXY_SIGNATURE];

/// First value of `name`, as text. Bytes that are not UTF-8 become U+FFFD.
pub fn first_value<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<Cow<'a, str>> {
    headers
        .get(name)
        .map(|value| String::from_utf8_lossy(value.as_bytes()))
}

fn required<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Result<Cow<'a, str>, RouteServiceError> {
    first_value(headers, name).ok_or_else(|| RouteServiceError::MissingHeader(name.clone()))
}

pub fn forwarded_url(headers: &HeaderMap) -> Result<Cow<'_, str>, RouteServiceError> {
    required(headers, &X_CF_FORWARDED_URL)
}

pub fn forwarded_for(headers: &HeaderMap) -> Result<Cow<'_, str>, RouteServiceError> {
    required(headers, &X_FORWARDED_FOR)
}

/// Headers sent downstream: everything except `X-CF-Forwarded-Url` and `Host`.
///
/// Multiplicity and per-name order are preserved. The outbound client
/// derives `Host` from the target URL.
pub fn forwarded_headers(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if *name == X_CF_FORWARDED_URL || *name == HOST {
            continue;
        }
        forwarded.append(name.clone(), value.clone());
    }
    forwarded
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::{CONTENT_TYPE, SET_COOKIE};
    use axum::http::HeaderValue;

    fn inbound() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("localhost"));
        headers.insert(X_CF_FORWARDED_URL, HeaderValue::from_static("http://example.com/a"));
        headers.insert(X_CF_PROXY_METADATA, HeaderValue::from_static("meta"));
        headers.insert(X_CF_PROXY_SIGNATURE, HeaderValue::from_static("sig"));
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("1.1.1.1, 5.5.5.5"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        headers.append(SET_COOKIE, HeaderValue::from_static("a=1"));
        headers.append(SET_COOKIE, HeaderValue::from_static("b=2"));
        headers
    }

    #[test]
    fn test_forwarded_headers_drop_url_and_host() {
        let forwarded = forwarded_headers(&inbound());

        assert!(forwarded.get(X_CF_FORWARDED_URL).is_none());
        assert!(forwarded.get(HOST).is_none());
        assert_eq!(forwarded.get(X_CF_PROXY_METADATA).unwrap(), "meta");
        assert_eq!(forwarded.get(X_CF_PROXY_SIGNATURE).unwrap(), "sig");
        assert_eq!(forwarded.get(X_FORWARDED_FOR).unwrap(), "1.1.1.1, 5.5.5.5");
        assert_eq!(forwarded.get(CONTENT_TYPE).unwrap(), "text/plain");
        assert_eq!(forwarded.len(), inbound().len() - 2);
    }

    #[test]
    fn test_forwarded_headers_keep_repeated_values_in_order() {
        let forwarded = forwarded_headers(&inbound());
        let cookies: Vec<_> = forwarded.get_all(SET_COOKIE).iter().collect();
        assert_eq!(cookies, vec!["a=1", "b=2"]);
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_bytes(b"X-CF-Forwarded-Url").unwrap(),
            HeaderValue::from_static("http://example.com"),
        );
        assert_eq!(forwarded_url(&headers).unwrap(), "http://example.com");
    }

    #[test]
    fn test_first_value_wins() {
        let mut headers = HeaderMap::new();
        headers.append(X_CF_FORWARDED_URL, HeaderValue::from_static("http://first"));
        headers.append(X_CF_FORWARDED_URL, HeaderValue::from_static("http://second"));
        assert_eq!(forwarded_url(&headers).unwrap(), "http://first");
    }

    #[test]
    fn test_missing_forwarded_for() {
        let err = forwarded_for(&HeaderMap::new()).unwrap_err();
        assert!(matches!(err, RouteServiceError::MissingHeader(name) if name == X_FORWARDED_FOR));
    }

    #[test]
    fn test_non_ascii_value_is_read_lossily() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_bytes(b"5.5.5.5,\xff").unwrap());
        assert_eq!(forwarded_for(&headers).unwrap(), "5.5.5.5,\u{FFFD}");
    }

    #[test]
    fn test_absent_header_has_no_value() {
        assert!(first_value(&HeaderMap::new(), &X_CF_FORWARDED_URL).is_none());
    }
}
