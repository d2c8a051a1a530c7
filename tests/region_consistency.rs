mod fixtures;

use std::sync::Arc;
use std::time::Duration;

use fixtures::*;
use trail_route::region::RemoteRegionCheck;
use trail_route::traits::RegionCheckProvider;
use trail_route::transport::{HttpRequest, HttpResponse, TransportError};
use trail_route::{CancellationToken, RegionBounds, RegionValidator, RouteError};

/// Answers `is-in-busan` from the fixture partition, in the server's
/// `{ "result": bool }` shape.
fn fixture_server() -> Arc<dyn trail_route::transport::HttpTransport> {
    Arc::new(FnTransport::new(
        |request: &HttpRequest| -> Result<HttpResponse, TransportError> {
            let lat: f64 = request.query_param("lat").unwrap_or_default().parse().unwrap_or(f64::NAN);
            let lng: f64 = request.query_param("lon").unwrap_or_default().parse().unwrap_or(f64::NAN);
            let inside = !OUTSIDE
                .iter()
                .any(|location| location.lat == lat && location.lng == lng);
            Ok(HttpResponse::new(200, format!(r#"{{"result":{inside}}}"#)))
        },
    ))
}

fn all_fixtures() -> Vec<Location> {
    let mut locations = vec![BUSAN_STATION, CITY_HALL, SEOMYEON];
    locations.extend_from_slice(TRAILHEADS);
    locations.extend_from_slice(OUTSIDE);
    locations
}

#[test]
fn local_and_remote_checks_agree() {
    let local = RegionValidator::new(RegionBounds::busan());
    let remote = RemoteRegionCheck::new(fixture_server(), "https://api.example.org", Duration::from_secs(5));
    let cancel = CancellationToken::new();

    for location in all_fixtures() {
        let point = location.coordinate();
        let local_answer = local.is_in_region(&point, &cancel).unwrap();
        let remote_answer = remote.is_in_region(&point, &cancel).unwrap();
        assert_eq!(local_answer, remote_answer, "disagreement at {}", location.name);
    }
}

#[test]
fn batch_check_matches_single_checks() {
    let local = RegionValidator::new(RegionBounds::busan());
    let inside: Vec<_> = TRAILHEADS.iter().map(Location::coordinate).collect();
    assert!(local.all_within_region(&inside));
    assert!(local.check_all(&inside).is_inside());

    for outside in OUTSIDE {
        let mut points = inside.clone();
        points.insert(2, outside.coordinate());
        assert!(!local.all_within_region(&points));
        let err = local.check_all(&points).into_result().unwrap_err();
        assert!(matches!(err, RouteError::OutOfRegion { index: 2, .. }), "{}", outside.name);
    }
}

#[test]
fn remote_check_surfaces_server_errors() {
    let transport = Arc::new(FnTransport::new(
        |_: &HttpRequest| -> Result<HttpResponse, TransportError> { Ok(HttpResponse::new(503, "maintenance")) },
    ));
    let remote = RemoteRegionCheck::new(transport, "https://api.example.org", Duration::from_secs(5));

    let err = remote
        .is_in_region(&CITY_HALL.coordinate(), &CancellationToken::new())
        .unwrap_err();
    assert!(err.is_retryable(), "{err:?}");
}
