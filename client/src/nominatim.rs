//! Nominatim search provider.

use reqwest::header::{HeaderValue, InvalidHeaderValue, USER_AGENT};
use serde::Deserialize;
use serde_json::Value;

use checkpoint_shared::Coordinate;

use crate::geocoder::{GeocodeError, GeocodeFuture, GeocodeHit, GeocodeQuery, Geocoder};

pub const DEFAULT_BASE_URL: &str = "https://nominatim.openstreetmap.org";
pub const DEFAULT_USER_AGENT: &str = "DUI-Checkpoint-Map/1.0";

#[derive(Deserialize)]
struct Place {
    lat: Value,
    lon: Value,
    #[serde(default)]
    geojson: Option<Value>,
}

/// `GET {base}/search?q=…&format=json&limit=1`. Every request names the
/// application in `User-Agent`, whatever the shared reqwest client carries.
#[derive(Debug, Clone)]
pub struct NominatimClient {
    client: reqwest::Client,
    base_url: String,
    user_agent: HeaderValue,
}

impl NominatimClient {
    /// Fails when `user_agent` is not a valid header value.
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        user_agent: &str,
    ) -> Result<Self, InvalidHeaderValue> {
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user_agent: HeaderValue::from_str(user_agent)?,
        })
    }

    async fn search_first(&self, query: &GeocodeQuery) -> Result<Option<GeocodeHit>, GeocodeError> {
        let mut params = vec![
            ("q", query.text.as_str()),
            ("format", "json"),
            ("limit", "1"),
        ];
        if query.with_geometry {
            params.push(("polygon_geojson", "1"));
        }

        let resp = self
            .client
            .get(format!("{}/search", self.base_url))
            .header(USER_AGENT, self.user_agent.clone())
            .query(&params)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(GeocodeError::Status(status));
        }
        let bytes = resp.bytes().await?;
        parse_places(&bytes)
    }
}

impl Geocoder for NominatimClient {
    fn search<'a>(&'a self, query: &'a GeocodeQuery) -> GeocodeFuture<'a> {
        Box::pin(self.search_first(query))
    }
}

fn parse_places(bytes: &[u8]) -> Result<Option<GeocodeHit>, GeocodeError> {
    let places: Vec<Place> = serde_json::from_slice(bytes).map_err(|e| {
        let preview = String::from_utf8_lossy(bytes)
            .chars()
            .take(200)
            .collect::<String>();
        GeocodeError::Decode(format!("{e}; body preview: {preview}"))
    })?;
    let Some(place) = places.into_iter().next() else {
        return Ok(None);
    };

    let (Some(latitude), Some(longitude)) = (degrees(&place.lat), degrees(&place.lon)) else {
        return Err(GeocodeError::Decode(format!(
            "unparsable position lat={} lon={}",
            place.lat, place.lon
        )));
    };
    Ok(Some(GeocodeHit {
        coordinate: Coordinate::new(latitude, longitude),
        geometry: place.geojson,
    }))
}

/// Nominatim sends degrees as strings; accept plain numbers too.
fn degrees(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        Value::Number(number) => number.as_f64()?,
        _ => return None,
    };
    parsed.is_finite().then_some(parsed)
}
