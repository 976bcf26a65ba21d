use chrono::{DateTime, Utc};
use tracing::error;

use super::secondary_reads::prefer_secondary;
use crate::AppError;
use crate::AppState;
use storefront_domain::{
    parse_time_bound, DataSource, PageVisitFilter, PageVisitQuery, PageVisitReport, PageVisitStat,
};

pub const DEFAULT_PAGE_VISIT_LIMIT: i64 = 100;
pub const MAX_PAGE_VISIT_LIMIT: i64 = 1000;

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

/// Parses an optional `start_date`/`end_date` parameter. A bare end date
/// covers the whole day.
pub(crate) fn parse_bound(
    value: Option<String>,
    end_of_day: bool,
    name: &str,
) -> Result<Option<DateTime<Utc>>, AppError> {
    non_blank(value)
        .map(|text| {
            parse_time_bound(&text, end_of_day)
                .map_err(|_| AppError::BadRequest(format!("invalid {} '{}'", name, text)))
        })
        .transpose()
}

pub fn build_filter(query: PageVisitQuery) -> Result<PageVisitFilter, AppError> {
    let start = parse_bound(query.start_date, false, "start_date")?;
    let end = parse_bound(query.end_date, true, "end_date")?;
    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            return Err(AppError::BadRequest(
                "start_date must not be after end_date".to_string(),
            ));
        }
    }

    Ok(PageVisitFilter {
        start,
        end,
        path: non_blank(query.path),
        user_id: non_blank(query.user_id),
        limit: query
            .limit
            .unwrap_or(DEFAULT_PAGE_VISIT_LIMIT)
            .clamp(1, MAX_PAGE_VISIT_LIMIT),
        offset: query.offset.unwrap_or(0).max(0),
    })
}

fn report(data: Vec<PageVisitStat>, source: DataSource) -> PageVisitReport {
    PageVisitReport {
        total: data.len(),
        data,
        source,
    }
}

/// Reads from the secondary store when it answers in time, otherwise from the primary.
pub async fn page_visits(state: &AppState, query: PageVisitQuery) -> Result<PageVisitReport, AppError> {
    let filter = build_filter(query)?;

    let secondary = state
        .secondary_events
        .as_ref()
        .map(|store| store.page_visit_stats(&filter));
    let primary = state.primary_events.page_visit_stats(&filter);
    let (data, source) = prefer_secondary(state, "page-visit", secondary, primary)
        .await
        .map_err(|err| {
            error!("failed to fetch page visits: {:#}", err);
            AppError::primary("Failed to retrieve page visits", err)
        })?;
    Ok(report(data, source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::track_commands::track;
    use crate::testing::{StoreMode, TestStores};
    use storefront_domain::{ClientContext, PageVisitRequest};

    fn visit(session: &str, path: &str) -> PageVisitRequest {
        PageVisitRequest {
            session_id: Some(session.to_string()),
            url: Some(format!("https://shop.example{}", path)),
            path: Some(path.to_string()),
            duration_seconds: Some(30),
            ..Default::default()
        }
    }

    async fn seed(state: &AppState) {
        for (session, path) in [("s1", "/"), ("s2", "/"), ("s1", "/cart")] {
            track(state, visit(session, path), ClientContext::default())
                .await
                .expect("tracked");
        }
    }

    #[test]
    fn limit_and_offset_are_clamped() {
        let filter = build_filter(PageVisitQuery {
            limit: Some(5000),
            offset: Some(-3),
            ..Default::default()
        })
        .expect("filter");
        assert_eq!(filter.limit, MAX_PAGE_VISIT_LIMIT);
        assert_eq!(filter.offset, 0);

        let filter = build_filter(PageVisitQuery::default()).expect("filter");
        assert_eq!(filter.limit, DEFAULT_PAGE_VISIT_LIMIT);
    }

    #[test]
    fn malformed_dates_are_rejected() {
        let err = build_filter(PageVisitQuery {
            start_date: Some("yesterday".to_string()),
            ..Default::default()
        })
        .expect_err("bad date");
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn bare_end_date_covers_the_whole_day() {
        let filter = build_filter(PageVisitQuery {
            start_date: Some("2024-05-01".to_string()),
            end_date: Some("2024-05-01".to_string()),
            ..Default::default()
        })
        .expect("filter");
        let (Some(start), Some(end)) = (filter.start, filter.end) else {
            panic!("both bounds expected");
        };
        assert_eq!(start.to_rfc3339(), "2024-05-01T00:00:00+00:00");
        assert!(end > start);
    }

    #[tokio::test]
    async fn healthy_secondary_answers_reads() {
        let stores = TestStores::new(Some(StoreMode::Healthy));
        let state = stores.state();
        seed(&state).await;

        let report = page_visits(&state, PageVisitQuery::default()).await.expect("report");

        assert_eq!(report.source, DataSource::Secondary);
        assert_eq!(report.data[0].path, "/");
        assert_eq!(report.data[0].visit_count, 2);
        assert_eq!(report.data[0].unique_sessions, 2);
    }

    #[tokio::test]
    async fn failing_secondary_falls_back_to_primary() {
        let stores = TestStores::new(Some(StoreMode::Failing));
        let state = stores.state();
        seed(&state).await;

        let report = page_visits(&state, PageVisitQuery::default()).await.expect("report");

        assert_eq!(report.source, DataSource::Primary);
        assert_eq!(report.total, 2);
        assert_eq!(state.metrics.secondary_read_fallbacks(), 1);
    }

    #[tokio::test]
    async fn hanging_secondary_falls_back_to_primary() {
        let stores = TestStores::new(Some(StoreMode::Hanging));
        let state = stores.state();
        seed(&state).await;

        let report = page_visits(
            &state,
            PageVisitQuery {
                path: Some("/cart".to_string()),
                ..Default::default()
            },
        )
        .await
        .expect("report");

        assert_eq!(report.source, DataSource::Primary);
        assert_eq!(report.total, 1);
        assert_eq!(report.data[0].path, "/cart");
    }
}
