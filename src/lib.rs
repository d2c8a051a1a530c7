//! trail-route core
//!
//! Turns free-text place names or coordinates into a drawable route inside
//! the Busan service area: geocode, check the region, ask a routing provider,
//! decode its geometry.

pub mod cancel;
pub mod config;
pub mod error;
pub mod geocoder;
pub mod haversine;
pub mod locate;
pub mod osrm;
pub mod osrm_data;
pub mod polyline;
pub mod region;
pub mod retry;
pub mod route;
pub mod track;
pub mod traits;
pub mod transport;
pub mod types;

pub use cancel::CancellationToken;
pub use config::TrailRouteConfig;
pub use error::{Result, RouteError};
pub use region::{RegionBounds, RegionValidator};
pub use route::{RouteConstructor, RouteStage};
pub use types::{
    Coordinate, GeocodeResult, Geometry, ProviderRoute, RouteCalculationResult, RouteInput, RouteResponse, TravelProfile,
};
