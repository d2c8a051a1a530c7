//! Error taxonomy for the route construction pipeline.

use std::time::Duration;

use thiserror::Error;

use crate::transport::{HttpResponse, TransportError};

/// Convenient result alias for the crate.
pub type Result<T> = std::result::Result<T, RouteError>;

/// Every failure the pipeline can surface to its caller.
///
/// Adapters never swallow errors; the orchestrator aborts on the first one
/// and hands it back unchanged (after retries, for the retryable kinds).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RouteError {
    /// The provider's encoded geometry could not be decoded.
    #[error("malformed polyline at byte {position}: {message}")]
    Decode { message: String, position: usize },

    /// Geocoding returned no candidates for the query.
    #[error("no geocoding match for {query:?}")]
    NoMatch { query: String },

    /// A provider payload did not have the expected shape.
    #[error("unexpected {provider} response: {message}")]
    ProviderFormat { provider: String, message: String },

    /// Transport-level failure, including timeouts.
    #[error("network error: {message}")]
    Network { message: String },

    /// The provider asked us to back off.
    #[error("rate limited by provider{}", format_retry_after(.retry_after))]
    RateLimited { retry_after: Option<Duration> },

    /// The routing provider found no path between the endpoints.
    #[error("no route found between the requested points")]
    NoRoute,

    /// A point lies outside the supported service region.
    #[error("point #{index} ({lat:.6}, {lng:.6}) is outside the service region")]
    OutOfRegion { index: usize, lat: f64, lng: f64 },

    /// Latitude or longitude outside the valid WGS84 range.
    #[error("invalid coordinate ({lat}, {lng})")]
    InvalidCoordinate { lat: f64, lng: f64 },

    /// Caller-supplied input was unusable.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// The request was cancelled or its deadline passed.
    #[error("request cancelled")]
    Cancelled,

    /// Configuration could not be loaded or is inconsistent.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl RouteError {
    pub fn decode(message: impl Into<String>, position: usize) -> Self {
        Self::Decode {
            message: message.into(),
            position,
        }
    }

    pub fn provider_format(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderFormat {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether the orchestrator may retry the failed call.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::RateLimited { .. })
    }
}

impl From<TransportError> for RouteError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Cancelled => RouteError::Cancelled,
            other => RouteError::network(other.to_string()),
        }
    }
}

/// Maps a non-success HTTP status onto the taxonomy.
pub(crate) fn status_error(provider: &str, response: &HttpResponse) -> RouteError {
    match response.status {
        429 => RouteError::RateLimited {
            retry_after: response.retry_after(),
        },
        408 | 500..=u16::MAX => RouteError::network(format!("{provider} returned HTTP {}", response.status)),
        status => RouteError::provider_format(
            provider,
            format!("HTTP {status}: {}", excerpt(&response.body)),
        ),
    }
}

/// First 200 characters of a payload, for error messages.
pub(crate) fn excerpt(body: &str) -> String {
    const LIMIT: usize = 200;
    match body.char_indices().nth(LIMIT) {
        Some((cut, _)) => format!("{}…", &body[..cut]),
        None => body.to_string(),
    }
}

fn format_retry_after(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(delay) => format!(" (retry after {:.1}s)", delay.as_secs_f64()),
        None => String::new(),
    }
}
