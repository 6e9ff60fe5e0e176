//! Scripted geocoder shared by the unit tests in this crate.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use checkpoint_shared::Coordinate;
use tokio::time::Instant;

use crate::geocoder::{GeocodeError, GeocodeFuture, GeocodeHit, GeocodeQuery, Geocoder};

#[derive(Debug, Clone)]
pub(crate) enum Scripted {
    Hit(GeocodeHit),
    Fail,
    Hang,
}

#[derive(Debug, Default)]
pub(crate) struct ScriptedGeocoder {
    responses: Mutex<HashMap<String, Scripted>>,
    calls: Mutex<Vec<(String, Instant)>>,
    latency: Duration,
}

impl ScriptedGeocoder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    pub(crate) fn respond(self, text: &str, scripted: Scripted) -> Self {
        self.responses
            .lock()
            .expect("responses lock")
            .insert(text.to_string(), scripted);
        self
    }

    pub(crate) fn hit(self, text: &str, latitude: f64, longitude: f64) -> Self {
        self.respond(
            text,
            Scripted::Hit(GeocodeHit {
                coordinate: Coordinate::new(latitude, longitude),
                geometry: None,
            }),
        )
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .expect("calls lock")
            .iter()
            .map(|(text, _)| text.clone())
            .collect()
    }

    pub(crate) fn call_times(&self) -> Vec<Instant> {
        self.calls
            .lock()
            .expect("calls lock")
            .iter()
            .map(|(_, at)| *at)
            .collect()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().expect("calls lock").len()
    }
}

impl Geocoder for ScriptedGeocoder {
    fn search<'a>(&'a self, query: &'a GeocodeQuery) -> GeocodeFuture<'a> {
        Box::pin(async move {
            self.calls
                .lock()
                .expect("calls lock")
                .push((query.text.clone(), Instant::now()));
            let scripted = self
                .responses
                .lock()
                .expect("responses lock")
                .get(&query.text)
                .cloned();
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            match scripted {
                Some(Scripted::Hit(hit)) => Ok(Some(hit)),
                Some(Scripted::Fail) => Err(GeocodeError::Status(
                    reqwest::StatusCode::SERVICE_UNAVAILABLE,
                )),
                Some(Scripted::Hang) => std::future::pending().await,
                None => Ok(None),
            }
        })
    }
}
