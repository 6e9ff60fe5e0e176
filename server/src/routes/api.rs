use std::fmt::Write as _;
use std::sync::Arc;

use axum::Json;
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use checkpoint_shared::{Coordinate, RecordFilter};
use serde::Deserialize;
use tokio::sync::oneshot;
use tracing::warn;

use crate::services::map_actor::MapCommand;
use crate::state::{AppState, ObservabilitySnapshot};

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";
const MAP_CACHE_CONTROL: &str = "no-cache";

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let map_revision = state.map_snapshot.read().await.revision;
    let observability = state.observability.snapshot();
    Json(serde_json::json!({
        "status": "ok",
        "map_revision": map_revision,
        "resolution_cache_size": state.resolver.cache().entry_count(),
        "memoized_colors": state.colors.memoized(),
        "observability": observability,
    }))
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let map_revision = state.map_snapshot.read().await.revision;
    let body = render_prometheus_metrics(
        map_revision,
        state.resolver.cache().entry_count(),
        state.observability.snapshot(),
    );

    (
        [
            (header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-store"),
        ],
        body,
    )
}

fn render_prometheus_metrics(
    map_revision: u64,
    resolution_cache_size: usize,
    observability: ObservabilitySnapshot,
) -> String {
    let gauges = [
        (
            "checkpoint_map_revision",
            "Revision of the published map snapshot.",
            map_revision,
        ),
        (
            "checkpoint_resolution_cache_size",
            "Location keys with a cached geocoding outcome.",
            resolution_cache_size as u64,
        ),
    ];
    let counters = [
        (
            "checkpoint_record_polls_total",
            "Total record-source polls.",
            observability.record_polls_total,
        ),
        (
            "checkpoint_record_poll_failures_total",
            "Total record-source polls that failed.",
            observability.record_poll_failures_total,
        ),
        (
            "checkpoint_map_requests_total",
            "Total /api/map requests.",
            observability.map_requests_total,
        ),
        (
            "checkpoint_markers_repositioned_total",
            "Total markers moved to a background-geocoded coordinate.",
            observability.markers_repositioned_total,
        ),
        (
            "checkpoint_overlays_attached_total",
            "Total boundary overlays drawn for a selection.",
            observability.overlays_attached_total,
        ),
        (
            "checkpoint_stale_overlays_discarded_total",
            "Total boundary overlays dropped because the selection moved on.",
            observability.stale_overlays_discarded_total,
        ),
        (
            "checkpoint_marker_selections_total",
            "Total marker selections.",
            observability.marker_selections_total,
        ),
        (
            "checkpoint_view_details_requests_total",
            "Total view-details events forwarded.",
            observability.view_details_requests_total,
        ),
    ];

    let mut body = String::new();
    for (name, help, value) in gauges {
        let _ = writeln!(body, "# HELP {name} {help}");
        let _ = writeln!(body, "# TYPE {name} gauge");
        let _ = writeln!(body, "{name} {value}");
    }
    for (name, help, value) in counters {
        let _ = writeln!(body, "# HELP {name} {help}");
        let _ = writeln!(body, "# TYPE {name} counter");
        let _ = writeln!(body, "{name} {value}");
    }
    body
}

/// Serve the map snapshot exactly as the actor serialized it.
pub async fn get_map(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    state.observability.record_map_request();
    let (etag, json): (String, Arc<Bytes>) = {
        let snapshot = state.map_snapshot.read().await;
        (map_etag(snapshot.revision), Arc::clone(&snapshot.json))
    };

    if if_none_match_matches(&headers, &etag) {
        return not_modified_response(MAP_CACHE_CONTROL, Some(etag.as_str()));
    }

    json_bytes_response((*json).clone(), MAP_CACHE_CONTROL, Some(etag.as_str()))
}

pub async fn post_filter(
    State(state): State<AppState>,
    Json(filter): Json<RecordFilter>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let report = ask(&state, |reply| MapCommand::SetFilter { filter, reply }).await?;
    Ok(Json(serde_json::json!({
        "created": report.created,
        "updated": report.updated,
        "removed": report.removed,
    })))
}

#[derive(Debug, Deserialize)]
pub struct SelectBody {
    #[serde(default)]
    pub id: Option<String>,
}

pub async fn post_select(
    State(state): State<AppState>,
    Json(body): Json<SelectBody>,
) -> Result<impl IntoResponse, StatusCode> {
    let id = body.id.filter(|id| !id.trim().is_empty());
    let outcome = ask(&state, |reply| MapCommand::Select { id, reply }).await?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
pub struct ViewDetailsBody {
    pub id: String,
}

pub async fn post_view_details(
    State(state): State<AppState>,
    Json(body): Json<ViewDetailsBody>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let id = body.id;
    let forwarded = ask(&state, |reply| MapCommand::ViewDetails {
        id: id.clone(),
        reply,
    })
    .await?;
    if !forwarded {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(serde_json::json!({ "id": id, "forwarded": true })))
}

pub async fn post_user_location(
    State(state): State<AppState>,
    Json(position): Json<Coordinate>,
) -> Result<StatusCode, StatusCode> {
    if !is_valid_position(&position) {
        return Err(StatusCode::BAD_REQUEST);
    }
    ask(&state, |reply| MapCommand::SetUserLocation { position, reply }).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct ColorQuery {
    pub name: Option<String>,
}

pub async fn get_color(
    State(state): State<AppState>,
    Query(query): Query<ColorQuery>,
) -> Json<serde_json::Value> {
    let color = state.colors.color_for(query.name.as_deref());
    Json(serde_json::json!({ "name": query.name, "color": color }))
}

/// Send one command to the map actor and wait for its reply.
async fn ask<T>(
    state: &AppState,
    command: impl FnOnce(oneshot::Sender<T>) -> MapCommand,
) -> Result<T, StatusCode> {
    let (reply, response) = oneshot::channel();
    if state.commands.send(command(reply)).await.is_err() {
        warn!("map actor unavailable");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }
    response.await.map_err(|_| {
        warn!("map actor dropped request without replying");
        StatusCode::SERVICE_UNAVAILABLE
    })
}

fn is_valid_position(position: &Coordinate) -> bool {
    position.latitude.is_finite()
        && position.longitude.is_finite()
        && (-90.0..=90.0).contains(&position.latitude)
        && (-180.0..=180.0).contains(&position.longitude)
}

fn map_etag(revision: u64) -> String {
    format!("\"map-{revision}\"")
}

fn json_bytes_response(body: Bytes, cache_control: &'static str, etag: Option<&str>) -> Response {
    let mut response = Response::new(Body::from(body));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(cache_control),
    );
    if let Some(etag) = etag
        && let Ok(etag_header) = HeaderValue::from_str(etag)
    {
        headers.insert(header::ETAG, etag_header);
    }
    response
}

fn not_modified_response(cache_control: &'static str, etag: Option<&str>) -> Response {
    let mut response = StatusCode::NOT_MODIFIED.into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(cache_control),
    );
    if let Some(etag) = etag
        && let Ok(etag_header) = HeaderValue::from_str(etag)
    {
        headers.insert(header::ETAG, etag_header);
    }
    response
}

fn normalize_etag(candidate: &str) -> &str {
    candidate.strip_prefix("W/").unwrap_or(candidate).trim()
}

fn if_none_match_matches(headers: &HeaderMap, etag: &str) -> bool {
    let Some(value) = headers.get(header::IF_NONE_MATCH) else {
        return false;
    };
    let Ok(raw) = value.to_str() else {
        return false;
    };

    raw.split(',').any(|candidate| {
        let candidate = candidate.trim();
        candidate == "*" || normalize_etag(candidate) == normalize_etag(etag)
    })
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use checkpoint_shared::CheckpointRecord;
    use tower::ServiceExt;

    use super::{if_none_match_matches, render_prometheus_metrics};
    use crate::services::map_actor::MapCommand;
    use crate::state::test_support::spawn_state;
    use crate::state::{AppState, ObservabilitySnapshot};

    fn test_state() -> AppState {
        spawn_state("http://127.0.0.1:9")
    }

    async fn spawn_test_server(state: AppState) -> (SocketAddr, tokio::task::JoinHandle<()>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("listener address");
        let app = crate::app::build_app(state);
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve test app");
        });
        (addr, handle)
    }

    fn record(id: &str, city: &str, county: &str, date: &str) -> CheckpointRecord {
        CheckpointRecord {
            id: id.to_string(),
            state: "CA".to_string(),
            city: Some(city.to_string()),
            county: Some(county.to_string()),
            date: Some(date.to_string()),
            ..Default::default()
        }
    }

    async fn seed(state: &AppState) {
        let records = vec![
            record("1", "Fresno", "Fresno", "2025-06-01"),
            record("2", "Oakland", "Alameda", "2025-05-01"),
            record("3", "San Diego", "San Diego", "2025-07-04"),
        ];
        state
            .commands
            .send(MapCommand::ReplaceRecords { records })
            .await
            .expect("actor running");
    }

    async fn send_json(
        state: &AppState,
        uri: &str,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request");
        let response = crate::app::build_app(state.clone())
            .oneshot(request)
            .await
            .expect("router response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, json)
    }

    async fn get_json(state: &AppState, uri: &str) -> serde_json::Value {
        let request = Request::builder().uri(uri).body(Body::empty()).expect("request");
        let response = crate::app::build_app(state.clone())
            .oneshot(request)
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[test]
    fn metrics_output_contains_prometheus_help_type_and_values() {
        let observability = ObservabilitySnapshot {
            record_polls_total: 12,
            record_poll_failures_total: 3,
            map_requests_total: 40,
            markers_repositioned_total: 7,
            overlays_attached_total: 5,
            stale_overlays_discarded_total: 1,
            marker_selections_total: 6,
            view_details_requests_total: 2,
        };

        let metrics = render_prometheus_metrics(9, 4, observability);

        assert!(metrics.contains("# HELP checkpoint_map_revision"));
        assert!(metrics.contains("# TYPE checkpoint_map_revision gauge"));
        assert!(metrics.contains("# TYPE checkpoint_record_polls_total counter"));
        assert!(metrics.contains("checkpoint_map_revision 9"));
        assert!(metrics.contains("checkpoint_resolution_cache_size 4"));
        assert!(metrics.contains("checkpoint_record_polls_total 12"));
        assert!(metrics.contains("checkpoint_record_poll_failures_total 3"));
        assert!(metrics.contains("checkpoint_map_requests_total 40"));
        assert!(metrics.contains("checkpoint_stale_overlays_discarded_total 1"));
        assert!(metrics.contains("checkpoint_view_details_requests_total 2"));
    }

    #[test]
    fn if_none_match_supports_weak_and_multiple_etags() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert(
            axum::http::header::IF_NONE_MATCH,
            axum::http::HeaderValue::from_static("W/\"other\", \"map-42\""),
        );
        assert!(if_none_match_matches(&headers, "\"map-42\""));
    }

    #[tokio::test]
    async fn filter_select_and_map_reflect_the_record_set() {
        let state = test_state();
        seed(&state).await;

        let (status, report) =
            send_json(&state, "/api/filter", serde_json::json!({"mode": "upcoming"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["removed"], 1);

        let map = get_json(&state, "/api/map").await;
        assert_eq!(map["marker_count"], 2);
        let today = map["markers"]
            .as_array()
            .expect("markers")
            .iter()
            .find(|marker| marker["id"] == "1")
            .expect("today's marker");
        assert_eq!(today["today"], true);
        assert_eq!(today["size_px"], 34);

        let (status, outcome) =
            send_json(&state, "/api/select", serde_json::json!({"id": "1"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(outcome["selected"], "1");
        assert_eq!(outcome["generation"], 1);

        let (_, repeat) = send_json(&state, "/api/select", serde_json::json!({"id": "1"})).await;
        assert_eq!(repeat["generation"], 1);
        assert_eq!(state.observability.snapshot().marker_selections_total, 1);

        let map = get_json(&state, "/api/map").await;
        assert_eq!(map["selected"], "1");

        let (status, outcome) =
            send_json(&state, "/api/select", serde_json::json!({"id": null})).await;
        assert_eq!(status, StatusCode::OK);
        assert!(outcome["selected"].is_null());
    }

    #[tokio::test]
    async fn view_details_for_unknown_id_is_not_found() {
        let state = test_state();
        seed(&state).await;

        let (status, body) =
            send_json(&state, "/api/view-details", serde_json::json!({"id": "3"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["forwarded"], true);

        let (status, _) =
            send_json(&state, "/api/view-details", serde_json::json!({"id": "99"})).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(state.observability.snapshot().view_details_requests_total, 1);
    }

    #[tokio::test]
    async fn user_location_is_validated_and_published() {
        let state = test_state();

        let (status, _) = send_json(
            &state,
            "/api/user-location",
            serde_json::json!({"latitude": 123.0, "longitude": -118.0}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send_json(
            &state,
            "/api/user-location",
            serde_json::json!({"latitude": 34.05, "longitude": -118.24}),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let map = get_json(&state, "/api/map").await;
        assert_eq!(map["user_location"]["latitude"], 34.05);
        assert_eq!(map["viewport"]["kind"], "center");
    }

    #[tokio::test]
    async fn color_endpoint_is_stable_across_spelling_variants() {
        let state = test_state();
        let first = get_json(&state, "/api/color?name=Los%20Angeles").await;
        let second = get_json(&state, "/api/color?name=%20los%20angeles%20").await;
        assert_eq!(first["color"], second["color"]);

        let missing = get_json(&state, "/api/color").await;
        assert_eq!(missing["color"], checkpoint_shared::DEFAULT_COLOR);
    }

    #[tokio::test]
    async fn commands_answer_unavailable_once_actor_is_gone() {
        let (state, actor) = crate::state::AppState::build(crate::state::Services {
            record_source: checkpoint_client::RecordSource::new(
                reqwest::Client::new(),
                "http://127.0.0.1:9",
            ),
            geocoder: std::sync::Arc::new(crate::state::test_support::NoResults),
            gazetteer: checkpoint_client::Gazetteer::default(),
            clock: std::sync::Arc::new(checkpoint_shared::LocalClock),
            locator: checkpoint_client::LocatorConfig::default(),
            command_buffer: 1,
        });
        drop(actor);

        let (status, _) =
            send_json(&state, "/api/select", serde_json::json!({"id": "1"})).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn health_metrics_and_map_etag_over_http() {
        let state = test_state();
        let (addr, server_handle) = spawn_test_server(state).await;
        let base_url = format!("http://{addr}");
        let client = reqwest::Client::new();

        let first = client
            .get(format!("{base_url}/api/map"))
            .send()
            .await
            .expect("map request should succeed");
        assert_eq!(first.status(), reqwest::StatusCode::OK);
        let etag = first
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
            .expect("etag header should be present");

        let second = client
            .get(format!("{base_url}/api/map"))
            .header(reqwest::header::IF_NONE_MATCH, etag)
            .send()
            .await
            .expect("conditional map request should succeed");
        assert_eq!(second.status(), reqwest::StatusCode::NOT_MODIFIED);

        let health = client
            .get(format!("{base_url}/api/health"))
            .send()
            .await
            .expect("health request")
            .error_for_status()
            .expect("health status")
            .json::<serde_json::Value>()
            .await
            .expect("parse health");
        assert_eq!(health.get("status").and_then(|v| v.as_str()), Some("ok"));
        assert_eq!(health["observability"]["map_requests_total"], 2);

        let metrics = client
            .get(format!("{base_url}/api/metrics"))
            .send()
            .await
            .expect("metrics request")
            .error_for_status()
            .expect("metrics status")
            .text()
            .await
            .expect("parse metrics text");
        assert!(metrics.contains("checkpoint_map_requests_total 2"));

        server_handle.abort();
        let _ = server_handle.await;
    }
}
