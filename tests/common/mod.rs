//! Shared utilities for integration testing.

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::Response,
    Router,
};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

use route_service::config::RouteServiceConfig;
use route_service::{HttpServer, Shutdown};

pub const BODY_VALUE: &str = "test-body";
pub const PROXY_METADATA_VALUE: &str = "test-proxy-metadata";
pub const PROXY_SIGNATURE_VALUE: &str = "test-proxy-signature";
pub const FORWARDED_FOR_VALUE: &str = "123.456.789.123, 5.5.5.5, 127.0.0.1";
pub const FORWARDED_FOR_VALUE_403: &str = "123.456.789.123, 1.1.1.1, 127.0.0.1";
pub const VALID_IPS: &str = "5.5.5.5";

/// A request as the downstream saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// What the stub answers with.
#[derive(Clone)]
pub enum StubBody {
    Fixed(Bytes),
    /// Send the request body back.
    Echo,
}

#[derive(Clone)]
pub struct StubResponse {
    pub status: StatusCode,
    pub headers: Vec<(&'static str, &'static str)>,
    pub body: StubBody,
}

impl StubResponse {
    pub fn ok() -> Self {
        Self {
            status: StatusCode::OK,
            headers: Vec::new(),
            body: StubBody::Fixed(Bytes::new()),
        }
    }

    pub fn text(body: &'static str) -> Self {
        Self {
            status: StatusCode::OK,
            headers: vec![("content-type", "text/plain")],
            body: StubBody::Fixed(Bytes::from_static(body.as_bytes())),
        }
    }

    pub fn echo() -> Self {
        Self {
            status: StatusCode::OK,
            headers: Vec::new(),
            body: StubBody::Echo,
        }
    }
}

#[derive(Clone)]
struct StubState {
    response: StubResponse,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

/// Downstream server that records every request it receives.
pub struct StubDownstream {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl StubDownstream {
    pub async fn start(response: StubResponse) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let state = StubState {
            response,
            requests: requests.clone(),
        };
        let app = Router::new().fallback(record).with_state(state);

        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { addr, requests }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn host(&self) -> String {
        self.addr.to_string()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// The single recorded request; panics unless exactly one arrived.
    pub fn take_request(&self) -> RecordedRequest {
        let requests = self.requests();
        assert_eq!(requests.len(), 1, "expected exactly one downstream request");
        requests.into_iter().next().unwrap()
    }
}

async fn record(State(state): State<StubState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();

    state.requests.lock().unwrap().push(RecordedRequest {
        method: parts.method,
        uri: parts.uri,
        headers: parts.headers,
        body: body.clone(),
    });

    let payload = match &state.response.body {
        StubBody::Fixed(bytes) => bytes.clone(),
        StubBody::Echo => body,
    };

    let mut response = Response::new(Body::from(payload));
    *response.status_mut() = state.response.status;
    for (name, value) in &state.response.headers {
        response.headers_mut().append(
            HeaderName::from_static(*name),
            HeaderValue::from_static(*value),
        );
    }
    response
}

/// A running route service bound to an ephemeral port.
pub struct RunningService {
    pub addr: SocketAddr,
    shutdown: Shutdown,
}

impl RunningService {
    pub async fn start(valid_ips: &str) -> Self {
        let mut config = RouteServiceConfig::default();
        config.access.valid_ips = valid_ips.to_string();
        Self::start_with(config).await
    }

    pub async fn start_with(mut config: RouteServiceConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        config.listener.bind_address = addr.to_string();

        let shutdown = Shutdown::new();
        let server = HttpServer::new(config).unwrap();
        let server_shutdown = shutdown.subscribe();

        tokio::spawn(async move {
            let _ = server.run(listener, server_shutdown).await;
        });

        Self { addr, shutdown }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for RunningService {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// A request carrying all control headers and the given forwarding chain.
pub fn routed(
    client: &reqwest::Client,
    method: reqwest::Method,
    service: &RunningService,
    path: &str,
    forwarded_url: &str,
    forwarded_for: &str,
) -> reqwest::RequestBuilder {
    client
        .request(method, service.url(path))
        .header("X-CF-Forwarded-Url", forwarded_url)
        .header("X-CF-Proxy-Metadata", PROXY_METADATA_VALUE)
        .header("X-CF-Proxy-Signature", PROXY_SIGNATURE_VALUE)
        .header("X-Forwarded-For", forwarded_for)
}

/// Assertions shared by every allowed request.
pub fn assert_forwarded(request: &RecordedRequest, method: Method, stub: &StubDownstream, path: &str) {
    assert_eq!(request.method, method);
    assert_eq!(request.uri.path(), path);
    assert!(request.header("X-CF-Forwarded-Url").is_none());
    assert_eq!(request.header("Host"), Some(stub.host().as_str()));
    assert_eq!(request.header("X-CF-Proxy-Metadata"), Some(PROXY_METADATA_VALUE));
    assert_eq!(request.header("X-CF-Proxy-Signature"), Some(PROXY_SIGNATURE_VALUE));
    assert_eq!(request.header("X-Forwarded-For"), Some(FORWARDED_FOR_VALUE));
}
