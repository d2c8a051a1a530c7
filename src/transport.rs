//! HTTP transport seam between the provider adapters and the network.
//!
//! Adapters build an [`HttpRequest`] and interpret the [`HttpResponse`]; the
//! transport only moves bytes. Production code uses [`ReqwestTransport`],
//! tests substitute in-memory doubles.

use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use thiserror::Error;
use tracing::{debug, warn};

use crate::cancel::CancellationToken;

const USER_AGENT: &str = concat!("trail-route/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("request cancelled")]
    Cancelled,
}

/// An outbound GET request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            query: Vec::new(),
            timeout,
        }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// A fully-read response. Header names are stored lowercase.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// `Retry-After` expressed in seconds, when present.
    pub fn retry_after(&self) -> Option<Duration> {
        self.header("retry-after")
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }
}

/// Opaque request/response function supplied by the REST client layer.
pub trait HttpTransport: Send + Sync {
    fn get(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// How often a waiting caller re-checks its token while an exchange is in flight.
const CANCEL_POLL: Duration = Duration::from_millis(20);

/// Sends `request` on a worker thread and waits for it under `cancel`.
///
/// The request timeout is clamped to the token's remaining budget. When the
/// token fires mid-exchange the caller gets `Cancelled` immediately; the
/// worker's receiver is gone, so its response (and connection) is dropped as
/// soon as the exchange ends or times out.
pub fn send(
    transport: &Arc<dyn HttpTransport>,
    mut request: HttpRequest,
    cancel: &CancellationToken,
) -> Result<HttpResponse, TransportError> {
    if cancel.is_cancelled() {
        return Err(TransportError::Cancelled);
    }
    if let Some(remaining) = cancel.remaining() {
        request.timeout = request.timeout.min(remaining);
    }

    let url = request.url.clone();
    let (tx, rx) = mpsc::sync_channel(1);
    let worker = Arc::clone(transport);
    thread::Builder::new()
        .name("trail-route-http".to_string())
        .spawn(move || {
            let _ = tx.send(worker.get(&request));
        })
        .map_err(|err| TransportError::Request(format!("cannot spawn HTTP worker: {err}")))?;

    let response = loop {
        match rx.recv_timeout(CANCEL_POLL) {
            Ok(response) => break response,
            Err(RecvTimeoutError::Timeout) if cancel.is_cancelled() => {
                debug!(url = %url, "abandoning in-flight request");
                return Err(TransportError::Cancelled);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                return Err(TransportError::Request("HTTP worker exited without a response".to_string()));
            }
        }
    };

    if cancel.is_cancelled() {
        debug!(url = %url, "discarding response for cancelled request");
        return Err(TransportError::Cancelled);
    }
    response
}

/// Blocking `reqwest` transport with a shared connection pool.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        Self::with_headers(&[])
    }

    /// Builds a transport that sends `headers` (e.g. authorization) on every request.
    pub fn with_headers(headers: &[(String, String)]) -> Result<Self, TransportError> {
        let mut defaults = HeaderMap::new();
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|err| TransportError::Request(format!("invalid header name {name:?}: {err}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|err| TransportError::Request(format!("invalid header value: {err}")))?;
            defaults.insert(name, value);
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(defaults)
            .build()
            .map_err(|err| TransportError::Request(err.to_string()))?;

        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    fn get(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let response = self
            .client
            .get(&request.url)
            .query(&request.query)
            .timeout(request.timeout)
            .send()
            .map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_ascii_lowercase(), value.to_string()))
            })
            .collect();
        let body = response.text().map_err(map_reqwest_error)?;

        if status >= 500 {
            warn!(url = %request.url, status, "provider returned server error");
        }

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Request(err.to_string())
    }
}
