//! Route construction orchestrator.
//!
//! Drives one request through
//! `Pending → Geocoding → RegionCheck → Routing → Decoding → Done`, where
//! geocoding only runs for free-text input and any stage may end in
//! `Failed`. The region check precedes routing: an out-of-region request
//! never reaches the routing provider. Providers hand back undecoded
//! geometry, which is decoded and joined to the endpoints in `Decoding`.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cancel::CancellationToken;
use crate::config::TrailRouteConfig;
use crate::error::{Result, RouteError};
use crate::geocoder::HttpGeocoder;
use crate::osrm::OsrmClient;
use crate::region::RegionValidator;
use crate::retry::RetryPolicy;
use crate::traits::{Geocoder, RouteProvider};
use crate::types::{
    Coordinate, GeocodeResult, ProviderRoute, RouteCalculationResult, RouteInput, RouteResponse, TravelProfile,
};

/// Maximum gap, in degrees, between a requested endpoint and the provider's
/// snapped geometry before the endpoint is stitched on.
const ENDPOINT_TOLERANCE_DEG: f64 = 1e-6;

/// Pipeline stage of a single request.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteStage {
    Pending,
    Geocoding,
    RegionCheck,
    Routing,
    Decoding,
    Done,
    Failed(RouteError),
}

/// Stateless orchestrator; share it across threads and requests.
#[derive(Clone)]
pub struct RouteConstructor {
    geocoder: Arc<dyn Geocoder>,
    router: Arc<dyn RouteProvider>,
    fallback: Option<Arc<dyn RouteProvider>>,
    region: RegionValidator,
    retry: RetryPolicy,
}

impl RouteConstructor {
    pub fn new(
        geocoder: Arc<dyn Geocoder>,
        router: Arc<dyn RouteProvider>,
        region: RegionValidator,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            geocoder,
            router,
            fallback: None,
            region,
            retry,
        }
    }

    /// Routes through `fallback` when the primary router is still failing
    /// with a transient error after all retries.
    pub fn with_fallback(mut self, fallback: Arc<dyn RouteProvider>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Wires the HTTP providers described by `config` onto one shared transport.
    pub fn from_config(config: &TrailRouteConfig) -> Result<Self> {
        config.validate()?;
        let transport = config.transport()?;
        let constructor = Self::new(
            Arc::new(HttpGeocoder::new(config.geocoder.clone(), Arc::clone(&transport))),
            Arc::new(OsrmClient::new(config.router.clone(), transport)),
            RegionValidator::new(config.region_bounds()?),
            config.retry,
        );
        Ok(match &config.fallback {
            Some(fallback) => constructor.with_fallback(Arc::new(fallback.clone())),
            None => constructor,
        })
    }

    pub fn region(&self) -> &RegionValidator {
        &self.region
    }

    /// Builds a route for `input`, aborting on the first failure.
    pub fn construct_route(&self, input: RouteInput, cancel: &CancellationToken) -> Result<RouteCalculationResult> {
        self.construct_route_observed(input, cancel, |_| {})
    }

    /// Like [`construct_route`](Self::construct_route), reporting every stage
    /// transition to `observer`.
    pub fn construct_route_observed(
        &self,
        input: RouteInput,
        cancel: &CancellationToken,
        mut observer: impl FnMut(&RouteStage),
    ) -> Result<RouteCalculationResult> {
        let mut enter = |stage: RouteStage| {
            debug!(?stage, "route stage");
            observer(&stage);
        };
        enter(RouteStage::Pending);

        match self.run(input, cancel, &mut enter) {
            Ok(result) => {
                enter(RouteStage::Done);
                info!(
                    points = result.coordinates().len(),
                    distance_m = result.distance_meters(),
                    duration_s = result.duration_seconds(),
                    "route constructed"
                );
                Ok(result)
            }
            Err(err) => {
                warn!(error = %err, "route construction failed");
                enter(RouteStage::Failed(err.clone()));
                Err(err)
            }
        }
    }

    fn run(
        &self,
        input: RouteInput,
        cancel: &CancellationToken,
        enter: &mut impl FnMut(RouteStage),
    ) -> Result<RouteCalculationResult> {
        let profile = input.profile();
        let (start, end, addresses) = match input {
            RouteInput::Places {
                start_query,
                end_query,
                ..
            } => {
                enter(RouteStage::Geocoding);
                let (start, end) = self.resolve_pair(&start_query, &end_query, cancel)?;
                (start.coordinate()?, end.coordinate()?, vec![start, end])
            }
            RouteInput::Points { start, end, .. } => (start, end, Vec::new()),
        };

        enter(RouteStage::RegionCheck);
        cancel.check()?;
        self.region.check_all(&[start, end]).into_result()?;

        enter(RouteStage::Routing);
        let route = self.route_with_fallback(&start, &end, profile, cancel)?;

        enter(RouteStage::Decoding);
        cancel.check()?;
        let route = stitch_endpoints(route.decode()?, &start, &end);

        Ok(RouteCalculationResult::new(route, addresses))
    }

    fn route_with_fallback(
        &self,
        start: &Coordinate,
        end: &Coordinate,
        profile: TravelProfile,
        cancel: &CancellationToken,
    ) -> Result<ProviderRoute> {
        let primary = self
            .retry
            .run("route", cancel, || self.router.route(start, end, profile, cancel));
        match (primary, &self.fallback) {
            (Err(err), Some(fallback)) if err.is_retryable() => {
                warn!(error = %err, "routing provider unavailable, using fallback router");
                fallback.route(start, end, profile, cancel)
            }
            (result, _) => result,
        }
    }

    /// Geocodes both endpoints concurrently and joins on both.
    ///
    /// The first failure cancels the sibling lookup and is returned in
    /// preference to the sibling's resulting `Cancelled`.
    pub fn resolve_pair(
        &self,
        start_query: &str,
        end_query: &str,
        cancel: &CancellationToken,
    ) -> Result<(GeocodeResult, GeocodeResult)> {
        let scope = cancel.child();
        let best_match = |query: &str| -> Result<GeocodeResult> {
            let result = self
                .retry
                .run("geocode", &scope, || self.geocoder.geocode(query, &scope))
                .and_then(|results| {
                    results.into_iter().next().ok_or_else(|| RouteError::NoMatch {
                        query: query.to_string(),
                    })
                });
            if result.is_err() {
                scope.cancel();
            }
            result
        };

        let (start, end) = rayon::join(|| best_match(start_query), || best_match(end_query));

        match (start, end) {
            (Ok(start), Ok(end)) => {
                debug!(start = %start.display_name, end = %end.display_name, "endpoints geocoded");
                Ok((start, end))
            }
            (Err(RouteError::Cancelled), Err(err)) if !cancel.is_cancelled() => Err(err),
            (Err(err), _) | (_, Err(err)) => Err(err),
        }
    }

    /// Routes between the first and last point of an uploaded track after
    /// checking that the whole track lies inside the region.
    pub fn construct_course_route(
        &self,
        track: &[Coordinate],
        profile: TravelProfile,
        cancel: &CancellationToken,
    ) -> Result<RouteCalculationResult> {
        let (Some(start), Some(end)) = (track.first(), track.last()) else {
            return Err(RouteError::invalid_input("track has no points"));
        };
        if track.len() < 2 {
            return Err(RouteError::invalid_input("track needs at least two points"));
        }
        self.region.check_all(track).into_result()?;
        self.construct_route(
            RouteInput::Points {
                start: *start,
                end: *end,
                profile,
            },
            cancel,
        )
    }
}

/// Connects the provider's snapped geometry to the requested endpoints.
fn stitch_endpoints(mut route: RouteResponse, start: &Coordinate, end: &Coordinate) -> RouteResponse {
    if !route
        .coordinates
        .first()
        .is_some_and(|first| first.approx_eq(start, ENDPOINT_TOLERANCE_DEG))
    {
        route.coordinates.insert(0, *start);
    }
    if !route
        .coordinates
        .last()
        .is_some_and(|last| last.approx_eq(end, ENDPOINT_TOLERANCE_DEG))
    {
        route.coordinates.push(*end);
    }
    route
}
