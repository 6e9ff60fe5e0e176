use axum::Router;
use axum::http::{Method, header};
use axum::routing::{get, post};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};

use crate::routes;
use crate::state::AppState;

pub(crate) fn build_app(state: AppState) -> Router {
    let app = Router::new()
        .route("/api/health", get(routes::api::health))
        .route("/api/metrics", get(routes::api::metrics))
        .route("/api/map", get(routes::api::get_map))
        .route("/api/filter", post(routes::api::post_filter))
        .route("/api/select", post(routes::api::post_select))
        .route("/api/view-details", post(routes::api::post_view_details))
        .route("/api/user-location", post(routes::api::post_user_location))
        .route("/api/color", get(routes::api::get_color));

    app.layer(cors_layer())
        .layer(CompressionLayer::new())
        .with_state(state)
}

/// Any origin may read the map and drive it, matching the public record API.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode, header};
    use tower::ServiceExt;

    use super::build_app;
    use crate::state::test_support::spawn_state;

    #[tokio::test]
    async fn preflight_allows_cross_origin_posts() {
        let app = build_app(spawn_state("http://127.0.0.1:9"));
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/select")
            .header(header::ORIGIN, "https://example.org")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
            .body(Body::empty())
            .expect("request");

        let response = app.oneshot(request).await.expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .and_then(|value| value.to_str().ok()),
            Some("*")
        );
    }

    #[tokio::test]
    async fn unknown_routes_are_not_found() {
        let app = build_app(spawn_state("http://127.0.0.1:9"));
        let request = Request::builder()
            .uri("/api/checkpoints")
            .body(Body::empty())
            .expect("request");

        let response = app.oneshot(request).await.expect("router response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
