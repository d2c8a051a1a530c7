//! Polyline representation and codec for route geometries.
//!
//! Routing providers ship geometry in the compact "encoded polyline" format:
//! each coordinate is the signed delta from the previous one, scaled by
//! `10^precision`, zigzag-encoded and packed into 5-bit chunks offset by 63
//! with `0x20` as the continuation bit. Decoding happens once at the
//! provider boundary; everything downstream works with [`Polyline`].

use serde::Serialize;

use crate::error::{Result, RouteError};
use crate::types::Coordinate;

/// Precision of the classic Google / OSRM `polyline` format.
pub const PRECISION_5: u32 = 5;

/// Precision of OSRM / Valhalla `polyline6`.
pub const PRECISION_6: u32 = 6;

pub const MAX_PRECISION: u32 = 10;
const CHUNK_OFFSET: u8 = 63;
const CONTINUATION: u64 = 0x20;
const CHUNK_MASK: u64 = 0x1f;

/// A polyline representing a route geometry as decoded coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Polyline {
    points: Vec<Coordinate>,
}

impl Polyline {
    /// Creates a new Polyline from decoded coordinate points.
    pub fn new(points: Vec<Coordinate>) -> Self {
        Self { points }
    }

    /// Decodes an encoded polyline string.
    pub fn decode(encoded: &str, precision: u32) -> Result<Self> {
        decode(encoded, precision)
    }

    /// Returns a reference to the coordinate points.
    pub fn points(&self) -> &[Coordinate] {
        &self.points
    }

    /// Consumes the polyline and returns the owned coordinate points.
    pub fn into_points(self) -> Vec<Coordinate> {
        self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Encodes the points back into the compact string form.
    pub fn encode(&self, precision: u32) -> Result<String> {
        encode(&self.points, precision)
    }
}

fn scale(precision: u32) -> Result<f64> {
    if precision > MAX_PRECISION {
        return Err(RouteError::invalid_input(format!(
            "polyline precision {precision} exceeds {MAX_PRECISION}"
        )));
    }
    Ok(10f64.powi(precision as i32))
}

/// Decodes `encoded` into an ordered coordinate sequence.
///
/// Fails on truncated chunk groups, characters outside `'?'..='~'`, integer
/// overflow and decoded points outside the valid lat/lng range. Never returns
/// a partial sequence.
pub fn decode(encoded: &str, precision: u32) -> Result<Polyline> {
    let factor = scale(precision)?;
    let bytes = encoded.as_bytes();

    let mut index = 0;
    let mut lat: i64 = 0;
    let mut lng: i64 = 0;
    let mut points = Vec::with_capacity(bytes.len() / 4);

    while index < bytes.len() {
        let start = index;
        let dlat = next_value(bytes, &mut index)?;
        if index >= bytes.len() {
            return Err(RouteError::decode("latitude without a matching longitude", start));
        }
        let dlng = next_value(bytes, &mut index)?;

        lat = lat
            .checked_add(dlat)
            .ok_or_else(|| RouteError::decode("latitude accumulator overflow", start))?;
        lng = lng
            .checked_add(dlng)
            .ok_or_else(|| RouteError::decode("longitude accumulator overflow", start))?;

        // Exact division keeps the provider's rounding; a reciprocal multiply drifts.
        let coord = Coordinate::new(lat as f64 / factor, lng as f64 / factor)
            .map_err(|_| RouteError::decode("decoded point outside valid range", start))?;
        points.push(coord);
    }

    Ok(Polyline::new(points))
}

fn next_value(bytes: &[u8], index: &mut usize) -> Result<i64> {
    let mut raw: u64 = 0;
    let mut shift = 0u32;

    loop {
        let Some(&byte) = bytes.get(*index) else {
            return Err(RouteError::decode("truncated chunk sequence", *index));
        };
        if !(CHUNK_OFFSET..=b'~').contains(&byte) {
            return Err(RouteError::decode(
                format!("invalid character {:?}", byte as char),
                *index,
            ));
        }
        if shift > 60 {
            return Err(RouteError::decode("chunk group does not terminate", *index));
        }

        let chunk = u64::from(byte - CHUNK_OFFSET);
        *index += 1;
        raw |= (chunk & CHUNK_MASK) << shift;
        shift += 5;

        if chunk & CONTINUATION == 0 {
            break;
        }
    }

    Ok(((raw >> 1) as i64) ^ -((raw & 1) as i64))
}

/// Encodes coordinates; the inverse of [`decode`] within `10^-precision`.
pub fn encode(coords: &[Coordinate], precision: u32) -> Result<String> {
    let factor = scale(precision)?;
    let mut out = String::with_capacity(coords.len() * 8);
    let mut prev_lat: i64 = 0;
    let mut prev_lng: i64 = 0;

    for coord in coords {
        let lat = (coord.lat() * factor).round() as i64;
        let lng = (coord.lng() * factor).round() as i64;
        push_value(&mut out, lat - prev_lat);
        push_value(&mut out, lng - prev_lng);
        prev_lat = lat;
        prev_lng = lng;
    }

    Ok(out)
}

fn push_value(out: &mut String, value: i64) {
    let mut raw = ((value << 1) ^ (value >> 63)) as u64;
    while raw >= CONTINUATION {
        out.push(char::from((CONTINUATION | (raw & CHUNK_MASK)) as u8 + CHUNK_OFFSET));
        raw >>= 5;
    }
    out.push(char::from(raw as u8 + CHUNK_OFFSET));
}
