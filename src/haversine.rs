//! Great-circle helpers and a straight-line route provider, used as the
//! fallback when the routing service stays unavailable after retries.
//!
//! Uses great-circle distance and an assumed speed per travel profile.
//! Less accurate than a road network (ignores trails and streets) but always
//! available.

use serde::{Deserialize, Serialize};

use crate::cancel::CancellationToken;
use crate::error::{Result, RouteError};
use crate::traits::RouteProvider;
use crate::types::{Coordinate, Geometry, ProviderRoute, TravelProfile};

/// Earth radius in meters.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

const WALKING_SPEED_KMH: f64 = 4.5;
const CYCLING_SPEED_KMH: f64 = 15.0;
const DRIVING_SPEED_KMH: f64 = 40.0;

/// Haversine distance between two points in meters.
pub fn distance_meters(from: &Coordinate, to: &Coordinate) -> f64 {
    let lat1_rad = from.lat().to_radians();
    let lat2_rad = to.lat().to_radians();
    let delta_lat = (to.lat() - from.lat()).to_radians();
    let delta_lng = (to.lng() - from.lng()).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_M * c
}

/// Sum of segment lengths along `points`.
pub fn path_length_meters(points: &[Coordinate]) -> f64 {
    points
        .windows(2)
        .map(|pair| distance_meters(&pair[0], &pair[1]))
        .sum()
}

/// Straight-line route provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HaversineRouter {
    pub walking_kmh: f64,
    pub cycling_kmh: f64,
    pub driving_kmh: f64,
}

impl Default for HaversineRouter {
    fn default() -> Self {
        Self {
            walking_kmh: WALKING_SPEED_KMH,
            cycling_kmh: CYCLING_SPEED_KMH,
            driving_kmh: DRIVING_SPEED_KMH,
        }
    }
}

impl HaversineRouter {
    pub fn validate(&self) -> Result<()> {
        for (profile, speed) in [
            ("walking", self.walking_kmh),
            ("cycling", self.cycling_kmh),
            ("driving", self.driving_kmh),
        ] {
            if !speed.is_finite() || speed <= 0.0 {
                return Err(RouteError::config(format!("fallback {profile} speed must be positive, got {speed}")));
            }
        }
        Ok(())
    }

    pub fn speed_kmh(&self, profile: TravelProfile) -> f64 {
        match profile {
            TravelProfile::Walking => self.walking_kmh,
            TravelProfile::Cycling => self.cycling_kmh,
            TravelProfile::Driving => self.driving_kmh,
        }
    }

    /// Convert distance in meters to travel time in seconds.
    fn meters_to_seconds(&self, meters: f64, profile: TravelProfile) -> f64 {
        let speed_ms = self.speed_kmh(profile) / 3.6;
        (meters / speed_ms).round()
    }
}

impl RouteProvider for HaversineRouter {
    fn route(
        &self,
        start: &Coordinate,
        end: &Coordinate,
        profile: TravelProfile,
        cancel: &CancellationToken,
    ) -> Result<ProviderRoute> {
        cancel.check()?;
        let distance = distance_meters(start, end);
        Ok(ProviderRoute {
            geometry: Geometry::Structured(vec![*start, *end]),
            distance_meters: distance,
            duration_seconds: self.meters_to_seconds(distance, profile),
        })
    }
}
