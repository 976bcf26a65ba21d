use axum::routing::{get, post, put};
use axum::Router;

use storefront_application::AppState;

use crate::handlers::{analytics_handlers, ops_handlers, order_handlers, track_handlers};

fn analytics_routes() -> Router<AppState> {
    Router::new()
        .route("/track/page-visit", post(track_handlers::track_page_visit))
        .route("/track/event", post(track_handlers::track_event))
        .route("/track/click", post(track_handlers::track_click))
        .route("/track/scroll", post(track_handlers::track_scroll))
        .route("/track/session", post(track_handlers::track_session))
        .route("/page-visits", get(analytics_handlers::list_page_visits))
        .route("/click-analytics", get(analytics_handlers::list_click_analytics))
        .route("/scroll-analytics", get(analytics_handlers::list_scroll_analytics))
        .route("/dashboard", get(analytics_handlers::get_dashboard))
}

fn order_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            post(order_handlers::create_order).get(order_handlers::list_orders),
        )
        .route("/user/:user_id", get(order_handlers::list_user_orders))
        .route(
            "/:id",
            get(order_handlers::get_order).delete(order_handlers::cancel_order),
        )
        .route("/:id/status", put(order_handlers::update_order_status))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/analytics", analytics_routes())
        .nest("/analytics", analytics_routes())
        .nest("/api/orders", order_routes())
        .nest("/orders", order_routes())
        .route("/health", get(ops_handlers::health))
        .route("/ready", get(ops_handlers::ready))
        .route("/metrics", get(ops_handlers::metrics_prometheus))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use storefront_application::testing::{StaticHealth, StoreMode, TestStores};
    use storefront_domain::{OrderStatus, StoreStatus};

    async fn send(router: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .header("user-agent", "Mozilla/5.0 (Windows NT 10.0) Chrome/120.0");
        let request = match body {
            Some(body) => builder.body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");
        let response = router.oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn page_visit() -> Value {
        json!({
            "session_id": "sess-1",
            "user_id": 42,
            "url": "https://shop.example/games",
            "path": "/games"
        })
    }

    #[tokio::test]
    async fn page_visit_is_created_on_both_prefixes() {
        let stores = TestStores::new(Some(StoreMode::Healthy));

        for prefix in ["/api/analytics", "/analytics"] {
            let router = build_router(stores.state());
            let uri = format!("{}/track/page-visit", prefix);
            let (status, body) = send(router, "POST", &uri, Some(page_visit())).await;
            assert_eq!(status, StatusCode::CREATED);
            assert_eq!(body["message"], "Page visit tracked successfully");
            assert!(body["visit_id"].is_string());
            assert!(body["timestamp"].is_string());
        }
        assert_eq!(stores.primary.len(), 2);
        assert_eq!(stores.primary.events()[0].ip_address.as_deref(), Some("127.0.0.1"));
        assert_eq!(stores.primary.events()[0].browser(), Some("Chrome"));
    }

    #[tokio::test]
    async fn missing_fields_are_listed() {
        let stores = TestStores::new(Some(StoreMode::Healthy));
        let router = build_router(stores.state());

        let (status, body) = send(
            router,
            "POST",
            "/api/analytics/track/click",
            Some(json!({ "session_id": "sess-1" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing required fields");
        assert_eq!(body["required"], json!(["session_id", "element_type", "page_url"]));
        assert_eq!(body["missing"], json!(["element_type", "page_url"]));
        assert!(stores.primary.is_empty());
    }

    #[tokio::test]
    async fn malformed_json_is_a_bad_request() {
        let stores = TestStores::new(None);
        let router = build_router(stores.state());
        let request = Request::builder()
            .method("POST")
            .uri("/api/analytics/track/event")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .expect("request");

        let response = router.oneshot(request).await.expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn hanging_secondary_still_answers_created() {
        let stores = TestStores::new(Some(StoreMode::Hanging));
        let router = build_router(stores.state());

        let (status, body) = send(
            router,
            "POST",
            "/api/analytics/track/scroll",
            Some(json!({
                "session_id": "sess-1",
                "page_url": "/games",
                "scroll_depth_percent": 0
            })),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert!(body["scroll_id"].is_string());
    }

    #[tokio::test]
    async fn primary_failure_hides_the_cause_outside_development() {
        let stores = TestStores::new(Some(StoreMode::Healthy)).with_primary(StoreMode::Failing);
        let mut state = stores.state();
        state.config.environment = "production".to_string();
        let router = build_router(state);

        let (status, body) =
            send(router, "POST", "/api/analytics/track/page-visit", Some(page_visit())).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to track page visit");
        assert_eq!(body["message"], "Something went wrong");
    }

    #[tokio::test]
    async fn page_visits_fall_back_to_primary() {
        let stores = TestStores::new(Some(StoreMode::Failing));
        let state = stores.state();
        let (status, _) = send(
            build_router(state.clone()),
            "POST",
            "/api/analytics/track/page-visit",
            Some(page_visit()),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(
            build_router(state),
            "GET",
            "/api/analytics/page-visits?limit=5",
            None,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["source"], "primary");
        assert_eq!(body["total"], 1);
        assert_eq!(body["data"][0]["path"], "/games");
    }

    #[tokio::test]
    async fn click_analytics_fall_back_to_primary() {
        let stores = TestStores::new(Some(StoreMode::Failing));
        let state = stores.state();
        for element in ["buy", "buy", "wishlist"] {
            let (status, _) = send(
                build_router(state.clone()),
                "POST",
                "/api/analytics/track/click",
                Some(json!({
                    "session_id": "sess-1",
                    "element_type": "button",
                    "element_id": element,
                    "page_url": "/games"
                })),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, body) = send(
            build_router(state.clone()),
            "GET",
            "/analytics/click-analytics?limit=1",
            None,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["source"], "primary");
        assert_eq!(body["total"], 1);
        assert_eq!(body["data"][0]["element_id"], "buy");
        assert_eq!(body["data"][0]["click_count"], 2);
        assert_eq!(body["data"][0]["browser"], "Chrome");
        assert!(body["start_date"].is_string());

        let (status, body) = send(
            build_router(state),
            "GET",
            "/api/analytics/scroll-analytics?start_date=2024-05-02&end_date=2024-05-01",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn dashboard_defaults_to_seven_days() {
        let stores = TestStores::new(None);
        let router = build_router(stores.state());

        let (status, body) = send(router, "GET", "/analytics/dashboard", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["date_range"]["period"], "7d");
        assert_eq!(body["metrics"]["page_visits"]["total_visits"], 0);
    }

    fn order_body() -> Value {
        json!({
            "userId": 42,
            "items": [{ "gameId": "7", "quantity": 2, "unitPrice": 19.99 }],
            "totalAmount": 39.98,
            "shippingAddress": { "city": "Lisbon" }
        })
    }

    #[tokio::test]
    async fn order_lifecycle_over_http() {
        let stores = TestStores::new(None);
        let state = stores.state();

        let (status, created) =
            send(build_router(state.clone()), "POST", "/api/orders", Some(order_body())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["success"], true);
        let number = created["data"]["orderNumber"].as_str().expect("number").to_string();
        assert_eq!(
            created["message"],
            format!("Order {} created successfully", number)
        );
        let id = created["data"]["id"].as_str().expect("id").to_string();

        let (status, fetched) =
            send(build_router(state.clone()), "GET", &format!("/orders/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["data"]["items"][0]["quantity"], 2);

        let (status, mine) =
            send(build_router(state.clone()), "GET", "/api/orders/user/42", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(mine["count"], 1);

        let (status, updated) = send(
            build_router(state.clone()),
            "PUT",
            &format!("/api/orders/{}/status", id),
            Some(json!({ "status": "shipped" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["message"], "Order status updated to shipped");

        let (status, page) =
            send(build_router(state), "GET", "/api/orders?status=shipped", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["pagination"]["total"], 1);
        assert_eq!(page["pagination"]["current_page"], 1);
    }

    #[tokio::test]
    async fn order_errors_use_the_envelope() {
        let stores = TestStores::new(None);
        let state = stores.state();

        let (status, body) = send(
            build_router(state.clone()),
            "POST",
            "/api/orders",
            Some(json!({ "userId": 42 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["missing"], json!(["items", "totalAmount", "shippingAddress"]));

        let unknown = uuid::Uuid::new_v4();
        let (status, body) = send(
            build_router(state.clone()),
            "GET",
            &format!("/api/orders/{}", unknown),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], format!("Order with ID {} not found", unknown));

        let order = stores.orders.seed("42", OrderStatus::Pending);
        let (status, _) = send(
            build_router(state),
            "PUT",
            &format!("/api/orders/{}/status", order.id),
            Some(json!({ "status": "returned" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_cancels_instead_of_removing() {
        let stores = TestStores::new(None);
        let state = stores.state();
        let order = stores.orders.seed("42", OrderStatus::Pending);

        let (status, body) = send(
            build_router(state.clone()),
            "DELETE",
            &format!("/api/orders/{}", order.id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Order cancelled successfully");
        assert_eq!(body["data"]["status"], "cancelled");

        let (status, fetched) =
            send(build_router(state.clone()), "GET", &format!("/orders/{}", order.id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["data"]["status"], "cancelled");

        let (status, body) = send(
            build_router(state),
            "DELETE",
            &format!("/orders/{}", uuid::Uuid::new_v4()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn illegal_transition_is_a_conflict_when_enforced() {
        let stores = TestStores::new(None);
        let mut state = stores.state();
        state.config.enforce_status_transitions = true;
        let order = stores.orders.seed("42", OrderStatus::Delivered);

        let (status, body) = send(
            build_router(state),
            "PUT",
            &format!("/orders/{}/status", order.id),
            Some(json!({ "status": "pending" })),
        )
        .await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn health_reports_each_store() {
        let stores = TestStores::new(None);
        let (status, body) = send(build_router(stores.state()), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["primary"], "connected");
        assert_eq!(body["secondary"], "disabled");

        let mut state = stores.state();
        state.health = Arc::new(StaticHealth {
            primary: false,
            secondary: StoreStatus::Connected,
        });
        let (status, body) = send(build_router(state.clone()), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["primary"], "disconnected");

        let (status, body) = send(build_router(state), "GET", "/ready", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "not ready");
    }

    #[tokio::test]
    async fn metrics_require_the_token_when_configured() {
        let stores = TestStores::new(None);
        let mut state = stores.state();
        state.config.api_token = Some("s3cret".to_string());

        let request = Request::builder()
            .uri("/metrics")
            .body(Body::empty())
            .expect("request");
        let response = build_router(state.clone()).oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let request = Request::builder()
            .uri("/metrics")
            .header("Authorization", "Bearer s3cret")
            .body(Body::empty())
            .expect("request");
        let response = build_router(state).oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let text = String::from_utf8(bytes.to_vec()).expect("utf8");
        assert!(text.contains("storefront_tracked_events_total"));
    }
}
