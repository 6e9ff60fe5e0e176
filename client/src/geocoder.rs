use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use checkpoint_shared::Coordinate;
use tracing::warn;

pub type GeocodeFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Option<GeocodeHit>, GeocodeError>> + Send + 'a>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeocodeQuery {
    pub text: String,
    /// Ask the provider for the matched area's outline.
    pub with_geometry: bool,
}

impl GeocodeQuery {
    pub fn point(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            with_geometry: false,
        }
    }

    pub fn outline(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            with_geometry: true,
        }
    }
}

/// First result of a provider search.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeHit {
    pub coordinate: Coordinate,
    /// Raw GeoJSON geometry, present only for outline queries.
    pub geometry: Option<serde_json::Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum GeocodeError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("upstream status {0}")]
    Status(reqwest::StatusCode),
    #[error("failed to decode response: {0}")]
    Decode(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// External geocoding collaborator: free text in, zero or one hit out.
pub trait Geocoder: Send + Sync {
    fn search<'a>(&'a self, query: &'a GeocodeQuery) -> GeocodeFuture<'a>;
}

/// Run one search bounded by `timeout`, folding every failure into "no result".
pub(crate) async fn search_or_none(
    geocoder: &dyn Geocoder,
    query: &GeocodeQuery,
    timeout: Duration,
) -> Option<GeocodeHit> {
    let outcome = match tokio::time::timeout(timeout, geocoder.search(query)).await {
        Ok(result) => result,
        Err(_) => Err(GeocodeError::Timeout(timeout)),
    };
    match outcome {
        Ok(hit) => hit,
        Err(e) => {
            warn!(error = %e, query = %query.text, "geocoding failed; treating as no result");
            None
        }
    }
}
