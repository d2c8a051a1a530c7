//! Provider seams for the route construction pipeline.
//!
//! Each external collaborator sits behind a small trait so the orchestrator
//! can be driven by HTTP adapters in production and by doubles in tests.

use crate::cancel::CancellationToken;
use crate::error::Result;
use crate::types::{Coordinate, GeocodeResult, ProviderRoute, TravelProfile};

/// Resolves free-text place names to ranked candidates.
pub trait Geocoder: Send + Sync {
    /// Returns candidates best-first. Never returns an empty list: no
    /// candidates is reported as `RouteError::NoMatch`.
    fn geocode(&self, query: &str, cancel: &CancellationToken) -> Result<Vec<GeocodeResult>>;
}

/// Requests a routed path between two resolved points. The geometry is
/// returned undecoded; the orchestrator decodes it in its own stage.
pub trait RouteProvider: Send + Sync {
    fn route(
        &self,
        start: &Coordinate,
        end: &Coordinate,
        profile: TravelProfile,
        cancel: &CancellationToken,
    ) -> Result<ProviderRoute>;
}

/// Answers whether a point lies within the supported service region.
pub trait RegionCheckProvider: Send + Sync {
    fn is_in_region(&self, point: &Coordinate, cancel: &CancellationToken) -> Result<bool>;
}

/// Reports the device's current position.
pub trait GeolocationProvider: Send + Sync {
    fn current_location(&self, cancel: &CancellationToken) -> Result<Coordinate>;
}
