//! HTTP geocoding adapter (Pelias-style GeoJSON search API).

use std::sync::Arc;
use std::time::Duration;

use geojson::{Feature, GeoJson};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::cancel::CancellationToken;
use crate::error::{Result, RouteError, excerpt, status_error};
use crate::traits::Geocoder;
use crate::transport::{self, HttpRequest, HttpTransport};
use crate::types::{Coordinate, GeocodeResult};

const PROVIDER: &str = "geocoder";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
    pub base_url: String,
    pub path: String,
    /// Name of the free-text query parameter.
    pub query_param: String,
    pub max_results: usize,
    pub timeout_secs: u64,
    pub api_key: Option<String>,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:4000".to_string(),
            path: "/v1/search".to_string(),
            query_param: "text".to_string(),
            max_results: 5,
            timeout_secs: 10,
            api_key: None,
        }
    }
}

pub struct HttpGeocoder {
    config: GeocoderConfig,
    transport: Arc<dyn HttpTransport>,
}

impl HttpGeocoder {
    pub fn new(config: GeocoderConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self { config, transport }
    }

    fn request_for(&self, query: &str) -> HttpRequest {
        let url = format!(
            "{}{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.path
        );
        let mut request = HttpRequest::get(url, Duration::from_secs(self.config.timeout_secs))
            .query(self.config.query_param.as_str(), query)
            .query("size", self.config.max_results.to_string());
        if let Some(key) = &self.config.api_key {
            request = request.query("api_key", key.as_str());
        }
        request
    }
}

impl Geocoder for HttpGeocoder {
    #[instrument(skip(self, cancel))]
    fn geocode(&self, query: &str, cancel: &CancellationToken) -> Result<Vec<GeocodeResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RouteError::invalid_input("geocoding query is empty"));
        }

        let response = transport::send(&self.transport, self.request_for(query), cancel)?;
        if !response.is_success() {
            return Err(status_error(PROVIDER, &response));
        }

        let results = parse_features(&response.body, self.config.max_results)?;
        if results.is_empty() {
            return Err(RouteError::NoMatch {
                query: query.to_string(),
            });
        }

        debug!(
            count = results.len(),
            best = %results[0].display_name,
            "geocoded query"
        );
        Ok(results)
    }
}

/// Maps a GeoJSON feature collection to ranked results, preserving provider
/// order and keeping at most `limit` entries.
pub fn parse_features(body: &str, limit: usize) -> Result<Vec<GeocodeResult>> {
    let geojson: GeoJson = body
        .parse()
        .map_err(|err| RouteError::provider_format(PROVIDER, format!("{err}: {}", excerpt(body))))?;

    let GeoJson::FeatureCollection(collection) = geojson else {
        return Err(RouteError::provider_format(PROVIDER, "expected a FeatureCollection"));
    };

    collection
        .features
        .iter()
        .take(limit)
        .enumerate()
        .map(|(rank, feature)| feature_to_result(rank, feature))
        .collect()
}

fn feature_to_result(rank: usize, feature: &Feature) -> Result<GeocodeResult> {
    let malformed = |message: &str| RouteError::provider_format(PROVIDER, format!("feature #{rank}: {message}"));

    let geometry = feature.geometry.as_ref().ok_or_else(|| malformed("missing geometry"))?;
    let geojson::Value::Point(position) = &geometry.value else {
        return Err(malformed("geometry is not a Point"));
    };
    let [lng, lat, ..] = position.as_slice() else {
        return Err(malformed("point has fewer than two ordinates"));
    };
    let coord = Coordinate::new(*lat, *lng).map_err(|_| malformed("coordinates out of range"))?;

    let label = feature
        .property("label")
        .and_then(|value| value.as_str())
        .ok_or_else(|| malformed("missing properties.label"))?;

    Ok(GeocodeResult {
        lat: coord.lat(),
        lng: coord.lng(),
        display_name: label.to_string(),
    })
}
