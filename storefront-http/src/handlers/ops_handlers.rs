use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde_json::json;

use storefront_application::queries::health_queries;
use storefront_application::AppState;
use storefront_domain::StoreStatus;

use crate::error::HttpError;
use crate::middleware::authorize;

pub const SERVICE_NAME: &str = "storefront";

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let report = health_queries::health_report(&state).await;
    let (status, label) = if report.is_healthy() {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };
    (
        status,
        Json(json!({
            "status": label,
            "primary": report.primary,
            "secondary": report.secondary,
            "timestamp": Utc::now().to_rfc3339(),
            "service": SERVICE_NAME,
        })),
    )
}

pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    match health_queries::primary_status(&state).await {
        StoreStatus::Connected => (StatusCode::OK, Json(json!({ "status": "ready" }))),
        _ => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "not ready",
                "error": "primary store unavailable",
            })),
        ),
    }
}

pub async fn metrics_prometheus(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if !authorize(&state.config, &headers) {
        return HttpError::Unauthorized.into_response();
    }
    let payload = state.metrics.render_prometheus();
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"),
    );
    (headers, payload).into_response()
}
