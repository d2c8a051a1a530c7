//! Service-region validation.
//!
//! The region is a fixed polygon configured at start-up and shared read-only
//! by every request. Containment is boundary-inclusive.

use std::sync::Arc;
use std::time::Duration;

use geo::coordinate_position::{CoordPos, CoordinatePosition};
use geo::{Coord, LineString, Polygon, Rect};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::cancel::CancellationToken;
use crate::error::{Result, RouteError, excerpt, status_error};
use crate::traits::RegionCheckProvider;
use crate::transport::{self, HttpRequest, HttpTransport};
use crate::types::Coordinate;

/// Busan City Hall, the reference center of the default region.
pub const BUSAN_CITY_HALL: (f64, f64) = (35.179_8, 129.075_0);

/// Approximate outline of the Busan metropolitan area as `(lat, lng)` pairs.
pub const BUSAN_OUTLINE: &[(f64, f64)] = &[
    (35.09, 128.76),
    (34.98, 128.80),
    (35.03, 128.95),
    (35.05, 129.13),
    (35.14, 129.20),
    (35.23, 129.29),
    (35.32, 129.31),
    (35.39, 129.25),
    (35.35, 129.12),
    (35.32, 129.05),
    (35.27, 128.98),
    (35.24, 128.88),
];

/// An immutable service-area polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionBounds {
    name: String,
    polygon: Polygon<f64>,
}

impl RegionBounds {
    /// Builds a region from an outer ring of at least three points. The ring
    /// is closed automatically.
    pub fn polygon(name: impl Into<String>, ring: &[Coordinate]) -> Result<Self> {
        if ring.len() < 3 {
            return Err(RouteError::config(format!(
                "region outline needs at least 3 points, got {}",
                ring.len()
            )));
        }
        let exterior: LineString<f64> = ring
            .iter()
            .map(|point| Coord {
                x: point.lng(),
                y: point.lat(),
            })
            .collect();
        Ok(Self {
            name: name.into(),
            polygon: Polygon::new(exterior, Vec::new()),
        })
    }

    /// Builds an axis-aligned bounding box.
    pub fn rectangle(name: impl Into<String>, south_west: Coordinate, north_east: Coordinate) -> Self {
        let rect = Rect::new(
            Coord {
                x: south_west.lng(),
                y: south_west.lat(),
            },
            Coord {
                x: north_east.lng(),
                y: north_east.lat(),
            },
        );
        Self {
            name: name.into(),
            polygon: rect.to_polygon(),
        }
    }

    /// The default Busan service area.
    pub fn busan() -> Self {
        let ring: Vec<Coord<f64>> = BUSAN_OUTLINE
            .iter()
            .map(|&(lat, lng)| Coord { x: lng, y: lat })
            .collect();
        Self {
            name: "busan".to_string(),
            polygon: Polygon::new(LineString::new(ring), Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_within_region(&self, point: &Coordinate) -> bool {
        let coord = Coord {
            x: point.lng(),
            y: point.lat(),
        };
        self.polygon.coordinate_position(&coord) != CoordPos::Outside
    }

    /// Short-circuits on the first point outside the region.
    pub fn all_within_region(&self, points: &[Coordinate]) -> bool {
        points.iter().all(|point| self.is_within_region(point))
    }

    /// Like [`all_within_region`](Self::all_within_region) but names the
    /// first offending point.
    pub fn check_all(&self, points: &[Coordinate]) -> RegionCheck {
        match points.iter().position(|point| !self.is_within_region(point)) {
            Some(index) => RegionCheck::Outside {
                index,
                point: points[index],
            },
            None => RegionCheck::Inside,
        }
    }
}

/// Diagnostic outcome of a multi-point containment check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RegionCheck {
    Inside,
    Outside { index: usize, point: Coordinate },
}

impl RegionCheck {
    pub fn is_inside(&self) -> bool {
        matches!(self, RegionCheck::Inside)
    }

    /// Converts a failed check into `RouteError::OutOfRegion`.
    pub fn into_result(self) -> Result<()> {
        match self {
            RegionCheck::Inside => Ok(()),
            RegionCheck::Outside { index, point } => Err(RouteError::OutOfRegion {
                index,
                lat: point.lat(),
                lng: point.lng(),
            }),
        }
    }
}

/// Shared, read-only handle to the configured region.
#[derive(Debug, Clone)]
pub struct RegionValidator {
    bounds: Arc<RegionBounds>,
}

impl RegionValidator {
    pub fn new(bounds: RegionBounds) -> Self {
        Self {
            bounds: Arc::new(bounds),
        }
    }

    pub fn bounds(&self) -> &RegionBounds {
        &self.bounds
    }

    pub fn is_within_region(&self, point: &Coordinate) -> bool {
        self.bounds.is_within_region(point)
    }

    pub fn all_within_region(&self, points: &[Coordinate]) -> bool {
        self.bounds.all_within_region(points)
    }

    pub fn check_all(&self, points: &[Coordinate]) -> RegionCheck {
        self.bounds.check_all(points)
    }
}

impl RegionCheckProvider for RegionValidator {
    fn is_in_region(&self, point: &Coordinate, _cancel: &CancellationToken) -> Result<bool> {
        Ok(self.is_within_region(point))
    }
}

const REMOTE_PROVIDER: &str = "region-check";

/// Client for the server-side `is-in-busan` endpoint used at course creation.
pub struct RemoteRegionCheck {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    timeout: Duration,
}

impl RemoteRegionCheck {
    pub fn new(transport: Arc<dyn HttpTransport>, base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
            timeout,
        }
    }
}

impl RegionCheckProvider for RemoteRegionCheck {
    #[instrument(skip(self, cancel), fields(point = %point))]
    fn is_in_region(&self, point: &Coordinate, cancel: &CancellationToken) -> Result<bool> {
        let url = format!("{}/is-in-busan", self.base_url.trim_end_matches('/'));
        let request = HttpRequest::get(url, self.timeout)
            .query("lon", point.lng().to_string())
            .query("lat", point.lat().to_string());

        let response = transport::send(&self.transport, request, cancel)?;
        if !response.is_success() {
            return Err(status_error(REMOTE_PROVIDER, &response));
        }

        let inside = parse_region_flag(&response.body)?;
        debug!(inside, "remote region check");
        Ok(inside)
    }
}

fn parse_region_flag(body: &str) -> Result<bool> {
    let value: Value = serde_json::from_str(body)
        .map_err(|err| RouteError::provider_format(REMOTE_PROVIDER, err.to_string()))?;
    let flag = match &value {
        Value::Bool(flag) => Some(*flag),
        Value::Object(map) => ["result", "isInBusan", "data"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_bool)),
        _ => None,
    };
    flag.ok_or_else(|| {
        RouteError::provider_format(REMOTE_PROVIDER, format!("expected a boolean, got {}", excerpt(body)))
    })
}
