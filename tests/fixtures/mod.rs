//! Test fixtures for trail-route.
//!
//! Provides realistic test data including:
//! - Real Busan locations (from OpenStreetMap)
//! - In-memory provider doubles with call counters

pub mod busan_locations;
pub mod doubles;

#[allow(unused_imports)]
pub use busan_locations::*;
#[allow(unused_imports)]
pub use doubles::*;
