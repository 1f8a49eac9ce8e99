//! Request relay to the forwarded URL.
//!
//! # Responsibilities
//! - Build the outbound request: same method, forwarded URL, filtered headers,
//!   inbound body streamed through
//! - Send it over a pooled client (http and https targets)
//! - Hand the downstream status, headers and streamed body back verbatim
//!
//! # Design Decisions
//! - Bodies are never buffered; memory per exchange is bounded by the
//!   transport's frame size
//! - No retries and no fallback target
//! - The forwarded URL is used as given: no dot-segment removal, no
//!   re-encoding, no port normalization
//! - The response-head timeout starts once the request body has been sent,
//!   so a long upload is bounded only by the idle timeout
//! - Dropping the handler future (client went away) drops the outbound
//!   request and its connection

use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, Response, Uri};
use hyper::body::Incoming;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::time::Duration;
use tokio::sync::oneshot;

use crate::config::TimeoutConfig;
use crate::error::{RouteServiceError, StartupError};
use crate::http::headers;
use crate::resilience::{notify_end_of_stream, with_idle_timeout};
use crate::security::ForwardedChain;

/// Outbound half of the route service.
#[derive(Clone)]
pub struct Relay {
    client: Client<HttpsConnector<HttpConnector>, Body>,
    response_timeout: Option<Duration>,
    idle_timeout: Option<Duration>,
}

impl Relay {
    pub fn new(timeouts: &TimeoutConfig) -> Result<Self, StartupError> {
        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_connect_timeout(timeouts.connect());

        let connector = HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(rustls::crypto::ring::default_provider())?
            .https_or_http()
            .enable_http1()
            .wrap_connector(http);

        let client = Client::builder(TokioExecutor::new()).build(connector);

        Ok(Self {
            client,
            response_timeout: timeouts.response(),
            idle_timeout: timeouts.idle(),
        })
    }

    /// Forward an authorized request and return the downstream response.
    pub async fn forward(
        &self,
        request: Request<Body>,
        chain: &ForwardedChain,
    ) -> Result<Response<Body>, RouteServiceError> {
        let (parts, body) = request.into_parts();

        let forwarded_url = headers::forwarded_url(&parts.headers)?.into_owned();
        let uri = parse_forwarded_url(&forwarded_url)?;
        let outbound_headers = headers::forwarded_headers(&parts.headers);

        tracing::info!(
            method = %parts.method,
            url = %forwarded_url,
            headers = ?outbound_headers,
            ips = %chain,
            "Outgoing request"
        );

        let (body, body_sent) = notify_end_of_stream(with_idle_timeout(body, self.idle_timeout));
        let outbound = build_outbound_request(parts.method, uri, outbound_headers, body);

        let response = self.send(outbound, body_sent).await?;

        tracing::info!(
            status = %response.status(),
            headers = ?response.headers(),
            "Outgoing response"
        );

        Ok(self.map_downstream_response(response))
    }

    async fn send(
        &self,
        request: Request<Body>,
        body_sent: oneshot::Receiver<()>,
    ) -> Result<Response<Incoming>, RouteServiceError> {
        let pending = self.client.request(request);
        let Some(limit) = self.response_timeout else {
            return pending.await.map_err(RouteServiceError::from);
        };
        tokio::pin!(pending);

        // The downstream may answer before it has read the whole body.
        tokio::select! {
            result = &mut pending => return result.map_err(RouteServiceError::from),
            _ = body_sent => {}
        }

        tokio::time::timeout(limit, pending)
            .await
            .map_err(|_| RouteServiceError::ResponseTimeout(limit))?
            .map_err(RouteServiceError::from)
    }

    /// Status and headers are copied as-is; the body is streamed through.
    fn map_downstream_response(&self, response: Response<Incoming>) -> Response<Body> {
        let (parts, body) = response.into_parts();

        let mut outward = Response::new(with_idle_timeout(body, self.idle_timeout));
        *outward.status_mut() = parts.status;
        *outward.headers_mut() = parts.headers;
        outward
    }
}

/// Parse the `X-CF-Forwarded-Url` value into an absolute request URI.
///
/// Only the fragment is removed; path, query and authority are kept byte for byte.
pub fn parse_forwarded_url(raw: &str) -> Result<Uri, RouteServiceError> {
    let invalid = |reason: String| RouteServiceError::InvalidForwardedUrl {
        url: raw.to_owned(),
        reason,
    };

    let target = raw.split_once('#').map_or(raw, |(target, _)| target);
    let uri = target.parse::<Uri>().map_err(|e| invalid(e.to_string()))?;

    match uri.scheme_str() {
        Some("http") | Some("https") => {}
        Some(other) => return Err(invalid(format!("unsupported scheme '{other}'"))),
        None => return Err(invalid("not an absolute URL".to_owned())),
    }
    if uri.host().map_or(true, str::is_empty) {
        return Err(invalid("missing host".to_owned()));
    }

    Ok(uri)
}

/// Outbound request with the inbound method, the forwarded URI and the given headers and body.
pub fn build_outbound_request(
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Body,
) -> Request<Body> {
    let mut request = Request::new(body);
    *request.method_mut() = method;
    *request.uri_mut() = uri;
    *request.headers_mut() = headers;
    request
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_parse_forwarded_url() {
        let uri = parse_forwarded_url("http://127.0.0.1:8080/original/get?a=b").unwrap();
        assert_eq!(uri.scheme_str(), Some("http"));
        assert_eq!(uri.authority().unwrap().as_str(), "127.0.0.1:8080");
        assert_eq!(uri.path_and_query().unwrap().as_str(), "/original/get?a=b");
    }

    #[test]
    fn test_parse_forwarded_url_drops_fragment() {
        let uri = parse_forwarded_url("https://example.com/page#section").unwrap();
        assert_eq!(uri.to_string(), "https://example.com/page");
    }

    #[test]
    fn test_parse_forwarded_url_keeps_path_verbatim() {
        let uri = parse_forwarded_url("http://example.com:80/a/../secret/./x%2Fy?q=%20").unwrap();
        assert_eq!(uri.authority().unwrap().as_str(), "example.com:80");
        assert_eq!(uri.path_and_query().unwrap().as_str(), "/a/../secret/./x%2Fy?q=%20");
    }

    #[test]
    fn test_relative_url_is_rejected() {
        let err = parse_forwarded_url("/original/get").unwrap_err();
        assert!(matches!(err, RouteServiceError::InvalidForwardedUrl { .. }));
    }

    #[test]
    fn test_non_http_scheme_is_rejected() {
        let err = parse_forwarded_url("ftp://example.com/file").unwrap_err();
        assert!(matches!(err, RouteServiceError::InvalidForwardedUrl { .. }));
    }

    #[test]
    fn test_garbage_url_is_rejected() {
        let err = parse_forwarded_url("not a url").unwrap_err();
        assert!(matches!(err, RouteServiceError::InvalidForwardedUrl { .. }));
    }

    #[test]
    fn test_build_outbound_request() {
        let mut outbound_headers = HeaderMap::new();
        outbound_headers.insert(headers::X_CF_PROXY_METADATA, HeaderValue::from_static("meta"));

        let request = build_outbound_request(
            Method::PATCH,
            "http://example.com/original/patch".parse().unwrap(),
            outbound_headers,
            Body::from("test-body"),
        );

        assert_eq!(request.method(), Method::PATCH);
        assert_eq!(request.uri(), "http://example.com/original/patch");
        assert_eq!(request.headers().get(headers::X_CF_PROXY_METADATA).unwrap(), "meta");
    }
}
