//! Real Busan locations for realistic test fixtures.
//!
//! Coordinates sourced from OpenStreetMap. Everything under the Busan
//! sections lies inside the default service region; the last section does not.

#![allow(dead_code)]

use trail_route::{Coordinate, GeocodeResult};

/// A named location with coordinates.
#[derive(Debug, Clone, Copy)]
pub struct Location {
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    pub const fn new(name: &'static str, lat: f64, lng: f64) -> Self {
        Self { name, lat, lng }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lng).expect("fixture coordinates are valid")
    }

    /// The location as a geocoder would report it.
    pub fn geocoded(&self) -> GeocodeResult {
        GeocodeResult {
            lat: self.lat,
            lng: self.lng,
            display_name: format!("{}, Busan, South Korea", self.name),
        }
    }
}

// ============================================================================
// Transit hubs and civic landmarks
// ============================================================================

pub const BUSAN_STATION: Location = Location::new("Busan Station", 35.1151, 129.0422);
pub const CITY_HALL: Location = Location::new("Busan City Hall", 35.1798, 129.0750);
pub const SEOMYEON: Location = Location::new("Seomyeon Station", 35.1578, 129.0597);

// ============================================================================
// Trails, beaches and viewpoints
// ============================================================================

pub const TRAILHEADS: &[Location] = &[
    Location::new("Haeundae Beach", 35.1587, 129.1604),
    Location::new("Gwangalli Beach", 35.1532, 129.1186),
    Location::new("Gamcheon Culture Village", 35.0975, 129.0106),
    Location::new("Taejongdae", 35.0532, 129.0870),
    Location::new("Geumjeongsanseong North Gate", 35.2675, 129.0545),
    Location::new("Igidae Coastal Walk", 35.1167, 129.1210),
];

pub const HAEUNDAE: Location = TRAILHEADS[0];
pub const GAMCHEON: Location = TRAILHEADS[2];

// ============================================================================
// Outside the service region
// ============================================================================

pub const OUTSIDE: &[Location] = &[
    Location::new("Seoul City Hall", 37.5665, 126.9780),
    Location::new("Changwon City Hall", 35.2280, 128.6819),
    Location::new("Ulsan Station", 35.5511, 129.1383),
];

pub const SEOUL: Location = OUTSIDE[0];
