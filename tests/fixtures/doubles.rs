//! In-memory providers for exercising the pipeline without a network.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Read;
use std::net::TcpListener;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use trail_route::traits::{Geocoder, RouteProvider};
use trail_route::transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};
use trail_route::{
    CancellationToken, Coordinate, GeocodeResult, Geometry, ProviderRoute, Result, RouteError, TravelProfile,
};

/// Geocoder answering from a fixed table, optionally after a delay.
#[derive(Default)]
pub struct StubGeocoder {
    answers: HashMap<String, Result<Vec<GeocodeResult>>>,
    delays: HashMap<String, Duration>,
    calls: AtomicUsize,
}

impl StubGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_place(mut self, query: &str, result: GeocodeResult) -> Self {
        self.answers.insert(query.to_string(), Ok(vec![result]));
        self
    }

    pub fn with_error(mut self, query: &str, err: RouteError) -> Self {
        self.answers.insert(query.to_string(), Err(err));
        self
    }

    pub fn with_delay(mut self, query: &str, delay: Duration) -> Self {
        self.delays.insert(query.to_string(), delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Geocoder for StubGeocoder {
    fn geocode(&self, query: &str, cancel: &CancellationToken) -> Result<Vec<GeocodeResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(query) {
            cancel.sleep(*delay)?;
        }
        cancel.check()?;
        self.answers.get(query).cloned().unwrap_or_else(|| {
            Err(RouteError::NoMatch {
                query: query.to_string(),
            })
        })
    }
}

/// Router replaying a script of outcomes; the last entry repeats.
pub struct ScriptedRouter {
    script: Vec<Result<ProviderRoute>>,
    calls: AtomicUsize,
    seen: Mutex<Vec<(Coordinate, Coordinate, TravelProfile)>>,
}

impl ScriptedRouter {
    pub fn new(script: Vec<Result<ProviderRoute>>) -> Self {
        assert!(!script.is_empty(), "router script needs at least one outcome");
        Self {
            script,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn always(outcome: Result<ProviderRoute>) -> Self {
        Self::new(vec![outcome])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<(Coordinate, Coordinate, TravelProfile)> {
        self.seen.lock().unwrap().clone()
    }
}

impl RouteProvider for ScriptedRouter {
    fn route(
        &self,
        start: &Coordinate,
        end: &Coordinate,
        profile: TravelProfile,
        cancel: &CancellationToken,
    ) -> Result<ProviderRoute> {
        cancel.check()?;
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push((*start, *end, profile));
        self.script[call.min(self.script.len() - 1)].clone()
    }
}

/// Transport backed by a closure, recording every request.
pub struct FnTransport<F> {
    handler: F,
    requests: Mutex<Vec<HttpRequest>>,
}

impl<F> FnTransport<F>
where
    F: Fn(&HttpRequest) -> std::result::Result<HttpResponse, TransportError> + Send + Sync,
{
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl<F> HttpTransport for FnTransport<F>
where
    F: Fn(&HttpRequest) -> std::result::Result<HttpResponse, TransportError> + Send + Sync,
{
    fn get(&self, request: &HttpRequest) -> std::result::Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        (self.handler)(request)
    }
}

/// A successful route between two points.
pub fn straight_route(start: Coordinate, end: Coordinate) -> ProviderRoute {
    ProviderRoute {
        geometry: Geometry::Structured(vec![start, end]),
        distance_meters: 1_000.0,
        duration_seconds: 800.0,
    }
}

/// A route whose geometry is a precision-5 polyline.
pub fn encoded_route(polyline: &str) -> ProviderRoute {
    ProviderRoute {
        geometry: Geometry::Encoded {
            polyline: polyline.to_string(),
            precision: 5,
        },
        distance_meters: 1_500.0,
        duration_seconds: 1_200.0,
    }
}

/// Accepts connections and reads requests but never answers.
pub fn silent_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind local listener");
    let addr = listener.local_addr().expect("listener address");
    thread::spawn(move || {
        for mut stream in listener.incoming().flatten() {
            thread::spawn(move || {
                let mut buf = [0u8; 1024];
                while matches!(stream.read(&mut buf), Ok(n) if n > 0) {}
            });
        }
    });
    format!("http://{addr}")
}

/// A Pelias-style GeoJSON body with a single labelled point.
pub fn geocoder_body(label: &str, lat: f64, lng: f64) -> String {
    serde_json::json!({
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "geometry": { "type": "Point", "coordinates": [lng, lat] },
            "properties": { "label": label }
        }]
    })
    .to_string()
}
