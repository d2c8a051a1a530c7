//! GPS track-log import and course summaries.
//!
//! Uploaded GPX files supply pre-resolved coordinates for course creation:
//! the whole track must lie inside the service region, and its first/last
//! points become the endpoints of a routing request.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, RouteError};
use crate::haversine;
use crate::region::RegionValidator;
use crate::types::Coordinate;

#[derive(Debug, Deserialize)]
struct Gpx {
    #[serde(rename = "trk", default)]
    tracks: Vec<GpxTrack>,
    #[serde(rename = "rte", default)]
    routes: Vec<GpxRoute>,
}

#[derive(Debug, Deserialize)]
struct GpxTrack {
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "trkseg", default)]
    segments: Vec<GpxSegment>,
}

#[derive(Debug, Deserialize)]
struct GpxSegment {
    #[serde(rename = "trkpt", default)]
    points: Vec<GpxPoint>,
}

#[derive(Debug, Deserialize)]
struct GpxRoute {
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "rtept", default)]
    points: Vec<GpxPoint>,
}

#[derive(Debug, Deserialize)]
struct GpxPoint {
    #[serde(rename = "@lat")]
    lat: f64,
    #[serde(rename = "@lon")]
    lon: f64,
    #[serde(default)]
    ele: Option<f64>,
}

impl GpxPoint {
    fn to_coordinate(&self) -> Result<Coordinate> {
        match self.ele {
            Some(ele) => Coordinate::with_elevation(self.lat, self.lon, ele),
            None => Coordinate::new(self.lat, self.lon),
        }
    }
}

/// Points read from a track log, in recording order.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackLog {
    pub name: Option<String>,
    pub points: Vec<Coordinate>,
}

/// Parses GPX 1.0/1.1. Track segments are concatenated; files without
/// tracks fall back to their first route.
pub fn parse_gpx(xml: &str) -> Result<TrackLog> {
    let gpx: Gpx = quick_xml::de::from_str(xml)
        .map_err(|err| RouteError::invalid_input(format!("unreadable GPX: {err}")))?;

    let (name, raw_points): (Option<String>, Vec<&GpxPoint>) = if let Some(track) = gpx.tracks.first() {
        let points = gpx
            .tracks
            .iter()
            .flat_map(|track| &track.segments)
            .flat_map(|segment| &segment.points)
            .collect();
        (track.name.clone(), points)
    } else if let Some(route) = gpx.routes.first() {
        (route.name.clone(), route.points.iter().collect())
    } else {
        (None, Vec::new())
    };

    if raw_points.is_empty() {
        return Err(RouteError::invalid_input("GPX contains no track or route points"));
    }

    let points = raw_points
        .into_iter()
        .map(GpxPoint::to_coordinate)
        .collect::<Result<Vec<_>>>()?;
    debug!(points = points.len(), ?name, "parsed track log");

    Ok(TrackLog { name, points })
}

/// Distance and elevation aggregates for a track.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackSummary {
    pub point_count: usize,
    pub distance_meters: f64,
    pub elevation_gain_meters: f64,
    pub elevation_loss_meters: f64,
    pub min_elevation: Option<f64>,
    pub max_elevation: Option<f64>,
}

pub fn summarize(points: &[Coordinate]) -> TrackSummary {
    let mut gain = 0.0;
    let mut loss = 0.0;
    let mut previous: Option<f64> = None;
    let mut min_elevation: Option<f64> = None;
    let mut max_elevation: Option<f64> = None;

    for elevation in points.iter().filter_map(Coordinate::elevation) {
        if let Some(prev) = previous {
            let delta = elevation - prev;
            if delta > 0.0 {
                gain += delta;
            } else {
                loss -= delta;
            }
        }
        previous = Some(elevation);
        min_elevation = Some(min_elevation.map_or(elevation, |min| min.min(elevation)));
        max_elevation = Some(max_elevation.map_or(elevation, |max| max.max(elevation)));
    }

    TrackSummary {
        point_count: points.len(),
        distance_meters: haversine::path_length_meters(points),
        elevation_gain_meters: gain,
        elevation_loss_meters: loss,
        min_elevation,
        max_elevation,
    }
}

/// A course accepted for creation: at least two points, all inside the region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Course {
    name: String,
    points: Vec<Coordinate>,
    summary: TrackSummary,
}

impl Course {
    pub fn from_track(name: impl Into<String>, points: Vec<Coordinate>, region: &RegionValidator) -> Result<Self> {
        if points.len() < 2 {
            return Err(RouteError::invalid_input("a course needs at least two points"));
        }
        region.check_all(&points).into_result()?;
        let summary = summarize(&points);
        Ok(Self {
            name: name.into(),
            points,
            summary,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Never fewer than two points.
    pub fn points(&self) -> &[Coordinate] {
        &self.points
    }

    pub fn summary(&self) -> &TrackSummary {
        &self.summary
    }

    pub fn start(&self) -> Coordinate {
        self.points[0]
    }

    pub fn end(&self) -> Coordinate {
        self.points[self.points.len() - 1]
    }
}
