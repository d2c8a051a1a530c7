//! OSRM-compatible HTTP routing adapter.
//!
//! Also accepts the OpenRouteService response dialect (`summary` blocks and
//! `error.code` failures), which shares the `routes[]` layout.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::cancel::CancellationToken;
use crate::error::{Result, RouteError, excerpt, status_error};
use crate::polyline;
use crate::traits::RouteProvider;
use crate::transport::{self, HttpRequest, HttpResponse, HttpTransport};
use crate::types::{Coordinate, Geometry, ProviderRoute, TravelProfile};

const PROVIDER: &str = "router";

/// Geometry encoding requested from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryFormat {
    Polyline,
    Polyline6,
    GeoJson,
}

impl GeometryFormat {
    fn as_param(&self) -> &'static str {
        match self {
            GeometryFormat::Polyline => "polyline",
            GeometryFormat::Polyline6 => "polyline6",
            GeometryFormat::GeoJson => "geojson",
        }
    }

    /// Precision used to decode encoded geometries. GeoJSON responses may
    /// still carry an encoded string from older deployments; treat it as
    /// precision 5.
    pub fn precision(&self) -> u32 {
        match self {
            GeometryFormat::Polyline6 => polyline::PRECISION_6,
            GeometryFormat::Polyline | GeometryFormat::GeoJson => polyline::PRECISION_5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OsrmConfig {
    pub base_url: String,
    pub geometries: GeometryFormat,
    pub timeout_secs: u64,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            geometries: GeometryFormat::Polyline,
            timeout_secs: 10,
        }
    }
}

pub struct OsrmClient {
    config: OsrmConfig,
    transport: Arc<dyn HttpTransport>,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self { config, transport }
    }

    fn request_for(&self, start: &Coordinate, end: &Coordinate, profile: TravelProfile) -> HttpRequest {
        let url = format!(
            "{}/route/v1/{}/{:.6},{:.6};{:.6},{:.6}",
            self.config.base_url.trim_end_matches('/'),
            profile.osrm_profile(),
            start.lng(),
            start.lat(),
            end.lng(),
            end.lat()
        );
        HttpRequest::get(url, Duration::from_secs(self.config.timeout_secs))
            .query("overview", "full")
            .query("geometries", self.config.geometries.as_param())
            .query("alternatives", "false")
            .query("steps", "false")
    }
}

impl RouteProvider for OsrmClient {
    #[instrument(skip(self, cancel), fields(start = %start, end = %end, profile = %profile))]
    fn route(
        &self,
        start: &Coordinate,
        end: &Coordinate,
        profile: TravelProfile,
        cancel: &CancellationToken,
    ) -> Result<ProviderRoute> {
        let request = self.request_for(start, end, profile);
        let response = transport::send(&self.transport, request, cancel)?;
        let route = parse_route_response(&response, self.config.geometries.precision())?;
        debug!(
            distance_m = route.distance_meters,
            duration_s = route.duration_seconds,
            "route received"
        );
        Ok(route)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawGeometry {
    Encoded(String),
    Positions(Vec<Vec<f64>>),
    LineString { coordinates: Vec<Vec<f64>> },
}

impl RawGeometry {
    /// Resolves the wire shape into a tagged [`Geometry`]; encoded strings
    /// are left for the caller to decode.
    fn resolve(self, precision: u32) -> Result<Geometry> {
        match self {
            RawGeometry::Encoded(polyline) => Ok(Geometry::Encoded { polyline, precision }),
            RawGeometry::Positions(positions) | RawGeometry::LineString { coordinates: positions } => positions
                .iter()
                .map(|position| position_to_coordinate(position))
                .collect::<Result<Vec<_>>>()
                .map(Geometry::Structured),
        }
    }
}

fn position_to_coordinate(position: &[f64]) -> Result<Coordinate> {
    let invalid = || RouteError::provider_format(PROVIDER, format!("invalid position {position:?}"));
    match *position {
        [lng, lat] => Coordinate::new(lat, lng).map_err(|_| invalid()),
        [lng, lat, elevation, ..] => Coordinate::with_elevation(lat, lng, elevation).map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

#[derive(Debug, Deserialize)]
struct RouteServiceResponse {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<ErrorBody>,
    #[serde(default)]
    routes: Vec<RawRoute>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawRoute {
    geometry: RawGeometry,
    #[serde(default)]
    summary: Option<Summary>,
    #[serde(default)]
    distance: Option<f64>,
    #[serde(default)]
    duration: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Summary {
    #[serde(default)]
    distance: f64,
    #[serde(default)]
    duration: f64,
}

/// OpenRouteService codes for "route could not be found" and "point not
/// routable".
const ORS_NO_ROUTE_CODES: [i64; 2] = [2009, 2010];

impl RouteServiceResponse {
    fn is_no_route(&self) -> bool {
        let osrm = matches!(self.code.as_deref(), Some("NoRoute" | "NoSegment"));
        let ors = self
            .error
            .as_ref()
            .and_then(|error| error.code)
            .is_some_and(|code| ORS_NO_ROUTE_CODES.contains(&code));
        osrm || ors
    }

    fn failure_message(&self) -> Option<String> {
        if let Some(error) = &self.error {
            return Some(error.message.clone().unwrap_or_else(|| "provider error".to_string()));
        }
        match self.code.as_deref() {
            Some("Ok") | None => None,
            Some(code) => Some(match &self.message {
                Some(message) => format!("{code}: {message}"),
                None => code.to_string(),
            }),
        }
    }
}

/// Normalizes a routing response, selecting the first (best) route.
/// Geometry stays encoded until [`ProviderRoute::decode`].
pub fn parse_route_response(response: &HttpResponse, precision: u32) -> Result<ProviderRoute> {
    if response.status == 429 || response.status == 408 || response.status >= 500 {
        return Err(status_error(PROVIDER, response));
    }

    let parsed = serde_json::from_str::<RouteServiceResponse>(&response.body);
    if let Ok(body) = &parsed {
        if body.is_no_route() {
            return Err(RouteError::NoRoute);
        }
    }
    if !response.is_success() {
        return Err(status_error(PROVIDER, response));
    }

    let body = parsed.map_err(|err| {
        RouteError::provider_format(PROVIDER, format!("{err}: {}", excerpt(&response.body)))
    })?;
    if let Some(message) = body.failure_message() {
        return Err(RouteError::provider_format(PROVIDER, message));
    }

    let route = body.routes.into_iter().next().ok_or(RouteError::NoRoute)?;
    let (distance_meters, duration_seconds) = match (&route.summary, route.distance, route.duration) {
        (Some(summary), _, _) => (summary.distance, summary.duration),
        (None, Some(distance), Some(duration)) => (distance, duration),
        _ => {
            return Err(RouteError::provider_format(PROVIDER, "route has no distance/duration summary"));
        }
    };
    for (name, value) in [("distance", distance_meters), ("duration", duration_seconds)] {
        if !value.is_finite() || value < 0.0 {
            return Err(RouteError::provider_format(PROVIDER, format!("invalid {name} {value}")));
        }
    }

    Ok(ProviderRoute {
        geometry: route.geometry.resolve(precision)?,
        distance_meters,
        duration_seconds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportError;
    use std::sync::Mutex;

    fn ok(body: &str) -> HttpResponse {
        HttpResponse::new(200, body)
    }

    #[test]
    fn test_encoded_geometry_with_summary_block() {
        let body = r#"{"routes":[{"geometry":"_p~iF~ps|U_ulLnnqC","summary":{"distance":1500,"duration":1200}}]}"#;
        let route = parse_route_response(&ok(body), 5).unwrap();
        assert_eq!(
            route.geometry,
            Geometry::Encoded {
                polyline: "_p~iF~ps|U_ulLnnqC".to_string(),
                precision: 5
            }
        );
        let route = route.decode().unwrap();
        assert_eq!(route.distance_meters, 1500.0);
        assert_eq!(route.duration_seconds, 1200.0);
        assert_eq!(route.coordinates.len(), 2);
        assert_eq!(route.coordinates[0].lat(), 38.5);
    }

    #[test]
    fn test_osrm_top_level_summary() {
        let body = r#"{"code":"Ok","routes":[{"geometry":"_p~iF~ps|U","distance":812.4,"duration":655.1,"weight":655.1}],"waypoints":[]}"#;
        let route = parse_route_response(&ok(body), 5).unwrap();
        assert_eq!(route.distance_meters, 812.4);
        assert_eq!(route.duration_seconds, 655.1);
    }

    #[test]
    fn test_structured_geometry_passes_through() {
        let body = r#"{"code":"Ok","routes":[{"geometry":{"type":"LineString","coordinates":[[129.0422,35.1151],[129.1604,35.1587,12.5]]},"distance":12000,"duration":9000}]}"#;
        let route = parse_route_response(&ok(body), 5).unwrap().decode().unwrap();
        assert_eq!(route.coordinates.len(), 2);
        assert_eq!(route.coordinates[0].lng(), 129.0422);
        assert_eq!(route.coordinates[1].elevation(), Some(12.5));

        let bare = r#"{"routes":[{"geometry":[[129.0422,35.1151],[129.1604,35.1587]],"summary":{"distance":1,"duration":1}}]}"#;
        assert!(matches!(
            parse_route_response(&ok(bare), 5).unwrap().geometry,
            Geometry::Structured(points) if points.len() == 2
        ));
    }

    #[test]
    fn test_first_route_is_selected() {
        let body = r#"{"routes":[
            {"geometry":"_p~iF~ps|U","summary":{"distance":100,"duration":60}},
            {"geometry":"_p~iF~ps|U","summary":{"distance":50,"duration":30}}
        ]}"#;
        let route = parse_route_response(&ok(body), 5).unwrap();
        assert_eq!(route.distance_meters, 100.0);
    }

    #[test]
    fn test_no_route_variants() {
        let osrm = HttpResponse::new(400, r#"{"code":"NoRoute","message":"Impossible route between points"}"#);
        assert_eq!(parse_route_response(&osrm, 5), Err(RouteError::NoRoute));

        let ors = HttpResponse::new(404, r#"{"error":{"code":2009,"message":"Route could not be found"}}"#);
        assert_eq!(parse_route_response(&ors, 5), Err(RouteError::NoRoute));

        assert_eq!(parse_route_response(&ok(r#"{"code":"Ok","routes":[]}"#), 5), Err(RouteError::NoRoute));
    }

    #[test]
    fn test_retryable_statuses() {
        let limited = HttpResponse::new(429, "").with_header("Retry-After", "1");
        assert_eq!(
            parse_route_response(&limited, 5),
            Err(RouteError::RateLimited {
                retry_after: Some(Duration::from_secs(1))
            })
        );
        assert!(matches!(
            parse_route_response(&HttpResponse::new(502, "bad gateway"), 5),
            Err(RouteError::Network { .. })
        ));
    }

    #[test]
    fn test_malformed_payloads() {
        assert!(matches!(
            parse_route_response(&ok("<html>"), 5),
            Err(RouteError::ProviderFormat { .. })
        ));
        assert!(matches!(
            parse_route_response(&ok(r#"{"routes":[{"geometry":"_p~iF~ps|U"}]}"#), 5),
            Err(RouteError::ProviderFormat { .. })
        ));
        assert!(matches!(
            parse_route_response(&ok(r#"{"routes":[{"geometry":"_p~iF~ps|U","distance":-1,"duration":3}]}"#), 5),
            Err(RouteError::ProviderFormat { .. })
        ));
        assert!(matches!(
            parse_route_response(&ok(r#"{"code":"InvalidQuery","message":"bad coords"}"#), 5),
            Err(RouteError::ProviderFormat { .. })
        ));
        assert!(matches!(
            parse_route_response(&ok(r#"{"routes":[{"geometry":[[400.0,35.0]],"distance":1,"duration":1}]}"#), 5),
            Err(RouteError::ProviderFormat { .. })
        ));
    }

    #[test]
    fn test_truncated_geometry_fails_on_decode() {
        let body = r#"{"routes":[{"geometry":"_p~iF~ps|","distance":1,"duration":1}]}"#;
        let route = parse_route_response(&ok(body), 5).unwrap();
        assert!(matches!(route.decode(), Err(RouteError::Decode { .. })));
    }

    struct CapturingTransport {
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl HttpTransport for CapturingTransport {
        fn get(&self, request: &HttpRequest) -> std::result::Result<HttpResponse, TransportError> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(HttpResponse::new(
                200,
                r#"{"code":"Ok","routes":[{"geometry":"_p~iF~ps|U","distance":10,"duration":5}]}"#,
            ))
        }
    }

    #[test]
    fn test_request_layout() {
        let transport = Arc::new(CapturingTransport {
            requests: Mutex::new(Vec::new()),
        });
        let client = OsrmClient::new(
            OsrmConfig {
                base_url: "http://osrm.example/".to_string(),
                geometries: GeometryFormat::Polyline6,
                timeout_secs: 3,
            },
            transport.clone(),
        );
        let start = Coordinate::new(35.1151, 129.0422).unwrap();
        let end = Coordinate::new(35.1587, 129.1604).unwrap();

        client
            .route(&start, &end, TravelProfile::Cycling, &CancellationToken::new())
            .unwrap();

        let requests = transport.requests.lock().unwrap();
        assert_eq!(
            requests[0].url,
            "http://osrm.example/route/v1/bike/129.042200,35.115100;129.160400,35.158700"
        );
        assert_eq!(requests[0].query_param("geometries"), Some("polyline6"));
        assert_eq!(requests[0].query_param("alternatives"), Some("false"));
        assert_eq!(requests[0].timeout, Duration::from_secs(3));
    }
}
