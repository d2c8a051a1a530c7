//! Canonical coordinate and route types shared by every stage.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RouteError};
use crate::polyline;

/// A WGS84 point with optional elevation in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    lat: f64,
    lng: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    elevation: Option<f64>,
}

impl Coordinate {
    /// Creates a coordinate, rejecting values outside the valid lat/lng range.
    pub fn new(lat: f64, lng: f64) -> Result<Self> {
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
            return Err(RouteError::InvalidCoordinate { lat, lng });
        }
        Ok(Self {
            lat,
            lng,
            elevation: None,
        })
    }

    pub fn with_elevation(lat: f64, lng: f64, elevation: f64) -> Result<Self> {
        let mut coord = Self::new(lat, lng)?;
        coord.elevation = elevation.is_finite().then_some(elevation);
        Ok(coord)
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lng(&self) -> f64 {
        self.lng
    }

    pub fn elevation(&self) -> Option<f64> {
        self.elevation
    }

    /// True when both axes agree within `tolerance` degrees.
    pub fn approx_eq(&self, other: &Coordinate, tolerance: f64) -> bool {
        (self.lat - other.lat).abs() <= tolerance && (self.lng - other.lng).abs() <= tolerance
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.lat, self.lng)
    }
}

impl FromStr for Coordinate {
    type Err = RouteError;

    /// Parses `"lat,lng"`.
    fn from_str(s: &str) -> Result<Self> {
        let (lat, lng) = s
            .split_once(',')
            .ok_or_else(|| RouteError::invalid_input(format!("expected \"lat,lng\", got {s:?}")))?;
        let lat = lat
            .trim()
            .parse::<f64>()
            .map_err(|_| RouteError::invalid_input(format!("invalid latitude {lat:?}")))?;
        let lng = lng
            .trim()
            .parse::<f64>()
            .map_err(|_| RouteError::invalid_input(format!("invalid longitude {lng:?}")))?;
        Coordinate::new(lat, lng)
    }
}

/// One geocoding candidate. Lists of these are ranked best-first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeResult {
    pub lat: f64,
    pub lng: f64,
    pub display_name: String,
}

impl GeocodeResult {
    pub fn coordinate(&self) -> Result<Coordinate> {
        Coordinate::new(self.lat, self.lng)
    }
}

/// A routed path normalized from the provider's response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteResponse {
    pub coordinates: Vec<Coordinate>,
    pub distance_meters: f64,
    pub duration_seconds: f64,
}

/// Route geometry as a provider returned it, tagged once at the adapter
/// boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    /// An encoded polyline and the precision it was requested with.
    Encoded { polyline: String, precision: u32 },
    Structured(Vec<Coordinate>),
}

impl Geometry {
    pub fn decode(self) -> Result<Vec<Coordinate>> {
        match self {
            Geometry::Encoded { polyline, precision } => Ok(polyline::decode(&polyline, precision)?.into_points()),
            Geometry::Structured(points) => Ok(points),
        }
    }
}

/// A provider's selected route before its geometry is decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRoute {
    pub geometry: Geometry,
    pub distance_meters: f64,
    pub duration_seconds: f64,
}

impl ProviderRoute {
    pub fn decode(self) -> Result<RouteResponse> {
        Ok(RouteResponse {
            coordinates: self.geometry.decode()?,
            distance_meters: self.distance_meters,
            duration_seconds: self.duration_seconds,
        })
    }
}

/// The final artifact handed to the application layer.
///
/// Built once per request and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteCalculationResult {
    coordinates: Vec<Coordinate>,
    geocoded_addresses: Vec<GeocodeResult>,
    distance_meters: f64,
    duration_seconds: f64,
}

impl RouteCalculationResult {
    pub(crate) fn new(route: RouteResponse, geocoded_addresses: Vec<GeocodeResult>) -> Self {
        Self {
            coordinates: route.coordinates,
            geocoded_addresses,
            distance_meters: route.distance_meters,
            duration_seconds: route.duration_seconds,
        }
    }

    pub fn coordinates(&self) -> &[Coordinate] {
        &self.coordinates
    }

    pub fn geocoded_addresses(&self) -> &[GeocodeResult] {
        &self.geocoded_addresses
    }

    pub fn distance_meters(&self) -> f64 {
        self.distance_meters
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }
}

/// Mode of transport used to parameterize a routing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TravelProfile {
    Walking,
    Cycling,
    Driving,
}

impl TravelProfile {
    /// Profile segment used in OSRM route URLs.
    pub fn osrm_profile(&self) -> &'static str {
        match self {
            TravelProfile::Walking => "foot",
            TravelProfile::Cycling => "bike",
            TravelProfile::Driving => "car",
        }
    }

    /// Lua profile shipped in the osrm-backend image.
    pub fn osrm_lua(&self) -> &'static str {
        match self {
            TravelProfile::Walking => "/opt/foot.lua",
            TravelProfile::Cycling => "/opt/bicycle.lua",
            TravelProfile::Driving => "/opt/car.lua",
        }
    }
}

impl fmt::Display for TravelProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TravelProfile::Walking => "walking",
            TravelProfile::Cycling => "cycling",
            TravelProfile::Driving => "driving",
        };
        f.write_str(name)
    }
}

impl FromStr for TravelProfile {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "walking" | "walk" | "foot" => Ok(TravelProfile::Walking),
            "cycling" | "bike" | "bicycle" => Ok(TravelProfile::Cycling),
            "driving" | "drive" | "car" => Ok(TravelProfile::Driving),
            other => Err(RouteError::invalid_input(format!("unknown travel profile {other:?}"))),
        }
    }
}

/// Raw user input for one route-construction request.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteInput {
    /// Free-text endpoints that must be geocoded first.
    Places {
        start_query: String,
        end_query: String,
        profile: TravelProfile,
    },
    /// Already-resolved endpoints, e.g. from an uploaded track log.
    Points {
        start: Coordinate,
        end: Coordinate,
        profile: TravelProfile,
    },
}

impl RouteInput {
    pub fn profile(&self) -> TravelProfile {
        match self {
            RouteInput::Places { profile, .. } | RouteInput::Points { profile, .. } => *profile,
        }
    }
}
