//! Runtime configuration.
//!
//! Every section has a `Default` that targets local development services, so
//! a config file only needs the keys it changes. Environment variables
//! override the file for deployment secrets and endpoints.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, RouteError};
use crate::geocoder::GeocoderConfig;
use crate::haversine::HaversineRouter;
use crate::osrm::OsrmConfig;
use crate::polyline;
use crate::region::{BUSAN_OUTLINE, RegionBounds, RemoteRegionCheck};
use crate::retry::RetryPolicy;
use crate::transport::{HttpTransport, ReqwestTransport};
use crate::types::Coordinate;

pub const ENV_GEOCODER_URL: &str = "TRAIL_ROUTE_GEOCODER_URL";
pub const ENV_GEOCODER_KEY: &str = "TRAIL_ROUTE_GEOCODER_KEY";
pub const ENV_ROUTER_URL: &str = "TRAIL_ROUTE_ROUTER_URL";
pub const ENV_REGION_CHECK_URL: &str = "TRAIL_ROUTE_REGION_CHECK_URL";

/// Service-area polygon as `[lat, lng]` pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    pub name: String,
    pub outline: Vec<[f64; 2]>,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            name: "busan".to_string(),
            outline: BUSAN_OUTLINE.iter().map(|&(lat, lng)| [lat, lng]).collect(),
        }
    }
}

/// Optional server-side region endpoint used to cross-check the local polygon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionCheckConfig {
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for RegionCheckConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrailRouteConfig {
    pub geocoder: GeocoderConfig,
    pub router: OsrmConfig,
    pub region: RegionConfig,
    pub region_check: RegionCheckConfig,
    pub retry: RetryPolicy,
    /// Straight-line router used when the routing provider stays unavailable.
    /// Disabled unless present.
    pub fallback: Option<HaversineRouter>,
    /// Sent as `Authorization: Bearer <token>` on every provider request.
    pub auth_token: Option<String>,
}

impl TrailRouteConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|err| RouteError::config(format!("invalid config: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|err| RouteError::config(format!("cannot read {}: {err}", path.display())))?;
        debug!(path = %path.display(), "loaded config file");
        Self::from_json_str(&json)
    }

    /// Applies overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(url) = lookup(ENV_GEOCODER_URL) {
            self.geocoder.base_url = url;
        }
        if let Some(key) = lookup(ENV_GEOCODER_KEY) {
            self.geocoder.api_key = Some(key);
        }
        if let Some(url) = lookup(ENV_ROUTER_URL) {
            self.router.base_url = url;
        }
        if let Some(url) = lookup(ENV_REGION_CHECK_URL) {
            self.region_check.base_url = Some(url);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.geocoder.timeout_secs == 0 || self.router.timeout_secs == 0 || self.region_check.timeout_secs == 0 {
            return Err(RouteError::config("provider timeouts must be greater than zero"));
        }
        if self.geocoder.max_results == 0 {
            return Err(RouteError::config("geocoder.max_results must be at least 1"));
        }
        if self.retry.max_attempts == 0 {
            return Err(RouteError::config("retry.max_attempts must be at least 1"));
        }
        if self.router.geometries.precision() > polyline::MAX_PRECISION {
            return Err(RouteError::config("geometry precision out of range"));
        }
        if let Some(fallback) = &self.fallback {
            fallback.validate()?;
        }
        self.region_bounds().map(|_| ())
    }

    /// Builds the configured service-area polygon.
    pub fn region_bounds(&self) -> Result<RegionBounds> {
        let ring = self
            .region
            .outline
            .iter()
            .map(|&[lat, lng]| Coordinate::new(lat, lng))
            .collect::<Result<Vec<_>>>()
            .map_err(|err| RouteError::config(format!("region outline: {err}")))?;
        RegionBounds::polygon(self.region.name.as_str(), &ring)
    }

    /// The production transport with configured default headers.
    pub fn transport(&self) -> Result<Arc<dyn HttpTransport>> {
        let headers: Vec<(String, String)> = self
            .auth_token
            .iter()
            .map(|token| ("authorization".to_string(), format!("Bearer {token}")))
            .collect();
        let transport = ReqwestTransport::with_headers(&headers)
            .map_err(|err| RouteError::config(format!("cannot build HTTP client: {err}")))?;
        Ok(Arc::new(transport))
    }

    /// Client for the server-side region check, when one is configured.
    pub fn remote_region_check(&self, transport: Arc<dyn HttpTransport>) -> Option<RemoteRegionCheck> {
        self.region_check.base_url.as_ref().map(|url| {
            RemoteRegionCheck::new(
                transport,
                url.as_str(),
                Duration::from_secs(self.region_check.timeout_secs),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config_is_valid() {
        let config = TrailRouteConfig::default();
        config.validate().unwrap();
        assert_eq!(config.region.outline.len(), BUSAN_OUTLINE.len());
        assert_eq!(config.region_bounds().unwrap().name(), "busan");
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = TrailRouteConfig::from_json_str(
            r#"{
                "router": { "base_url": "https://osrm.example.org", "geometries": "polyline6" },
                "retry": { "max_attempts": 5 }
            }"#,
        )
        .unwrap();
        assert_eq!(config.router.base_url, "https://osrm.example.org");
        assert_eq!(config.router.geometries.precision(), 6);
        assert_eq!(config.router.timeout_secs, 10);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay_ms, 200);
        assert_eq!(config.geocoder, GeocoderConfig::default());
    }

    #[test]
    fn test_fallback_router_is_opt_in() {
        assert_eq!(TrailRouteConfig::default().fallback, None);

        let config = TrailRouteConfig::from_json_str(r#"{ "fallback": { "walking_kmh": 5.0 } }"#).unwrap();
        let fallback = config.fallback.unwrap();
        assert_eq!(fallback.walking_kmh, 5.0);
        assert_eq!(fallback.driving_kmh, HaversineRouter::default().driving_kmh);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let cases = [
            r#"{ "router": { "timeout_secs": 0 } }"#,
            r#"{ "retry": { "max_attempts": 0 } }"#,
            r#"{ "geocoder": { "max_results": 0 } }"#,
            r#"{ "region": { "outline": [[35.0, 129.0], [35.1, 129.1]] } }"#,
            r#"{ "region": { "outline": [[95.0, 129.0], [35.1, 129.1], [35.2, 129.0]] } }"#,
            r#"{ "router": { "geometries": "wkt" } }"#,
            r#"{ "fallback": { "driving_kmh": -10.0 } }"#,
        ];
        for json in cases {
            let err = TrailRouteConfig::from_json_str(json).unwrap_err();
            assert!(matches!(err, RouteError::Config { .. }), "{json}: {err:?}");
        }
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_ROUTER_URL, "http://router:5000"),
            (ENV_GEOCODER_KEY, "secret"),
            (ENV_REGION_CHECK_URL, "https://api.example.org"),
            (ENV_GEOCODER_URL, "  "),
        ]
        .into_iter()
        .collect();

        let mut config = TrailRouteConfig::default();
        config.apply_env_from(|key| env.get(key).map(|value| value.to_string()));

        assert_eq!(config.router.base_url, "http://router:5000");
        assert_eq!(config.geocoder.api_key.as_deref(), Some("secret"));
        assert_eq!(config.geocoder.base_url, GeocoderConfig::default().base_url);
        assert_eq!(config.region_check.base_url.as_deref(), Some("https://api.example.org"));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = TrailRouteConfig::from_file("/nonexistent/trail-route.json").unwrap_err();
        assert!(matches!(err, RouteError::Config { .. }));
    }
}
