use chrono::Utc;
use tracing::error;

use crate::AppError;
use crate::AppState;
use storefront_domain::{Dashboard, DashboardMetrics, DashboardPeriod, DashboardQuery, DateRange};

pub const TOP_PAGES_LIMIT: i64 = 10;

pub async fn dashboard(state: &AppState, query: DashboardQuery) -> Result<Dashboard, AppError> {
    let range = DateRange::parse(query.date_range.as_deref());
    let window = range.window_ending(Utc::now());
    let store = state.primary_events.as_ref();

    let (page_visits, events, top_pages, device_breakdown) = tokio::try_join!(
        store.page_visit_totals(&window),
        store.event_totals(&window),
        store.top_pages(&window, TOP_PAGES_LIMIT),
        store.device_breakdown(&window),
    )
    .map_err(|err| {
        error!("failed to build {} dashboard: {:#}", range.as_str(), err);
        AppError::primary("Failed to retrieve dashboard data", err)
    })?;

    Ok(Dashboard {
        date_range: DashboardPeriod {
            start: window.start,
            end: window.end,
            period: range.as_str(),
        },
        metrics: DashboardMetrics { page_visits, events },
        top_pages,
        device_breakdown,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::track_commands::track;
    use crate::testing::{StoreMode, TestStores};
    use storefront_domain::{ClientContext, CustomEventRequest, PageVisitRequest};

    #[tokio::test]
    async fn dashboard_summarises_the_primary_store() {
        let stores = TestStores::new(Some(StoreMode::Failing));
        let state = stores.state();
        let desktop = ClientContext {
            ip_address: None,
            user_agent: Some("Mozilla/5.0 (X11; Linux x86_64) Firefox/125.0".to_string()),
        };
        for (session, path) in [("s1", "/"), ("s2", "/"), ("s2", "/games")] {
            let request = PageVisitRequest {
                session_id: Some(session.to_string()),
                user_id: Some(format!("user-{}", session)),
                url: Some(format!("https://shop.example{}", path)),
                path: Some(path.to_string()),
                duration_seconds: Some(10),
                ..Default::default()
            };
            track(&state, request, desktop.clone()).await.expect("visit");
        }
        let event = CustomEventRequest {
            session_id: Some("s1".to_string()),
            event_type: Some("ecommerce".to_string()),
            event_name: Some("add_to_cart".to_string()),
            ..Default::default()
        };
        track(&state, event, desktop).await.expect("event");

        let dashboard = dashboard(&state, DashboardQuery::default()).await.expect("dashboard");

        assert_eq!(dashboard.date_range.period, "7d");
        assert_eq!(dashboard.metrics.page_visits.total_visits, 3);
        assert_eq!(dashboard.metrics.page_visits.unique_sessions, 2);
        assert_eq!(dashboard.metrics.page_visits.unique_users, 2);
        assert_eq!(dashboard.metrics.page_visits.avg_duration, Some(10.0));
        assert_eq!(dashboard.metrics.events.total_events, 1);
        assert_eq!(dashboard.top_pages[0].path, "/");
        assert_eq!(dashboard.top_pages[0].visits, 2);
        assert_eq!(dashboard.device_breakdown[0].device_type, "desktop");
        assert_eq!(dashboard.device_breakdown[0].count, 3);
    }

    #[tokio::test]
    async fn primary_failure_surfaces() {
        let stores = TestStores::new(None).with_primary(StoreMode::Failing);
        let state = stores.state();

        let err = dashboard(
            &state,
            DashboardQuery {
                date_range: Some("30d".to_string()),
            },
        )
        .await
        .expect_err("primary down");
        assert_eq!(err.to_string(), "Failed to retrieve dashboard data");
    }
}
