use chrono::{DateTime, Duration, Utc};
use tracing::error;

use super::page_visit_queries::parse_bound;
use super::secondary_reads::prefer_secondary;
use crate::AppError;
use crate::AppState;
use storefront_domain::{
    ClickStat, DataSource, InteractionFilter, InteractionQuery, InteractionReport, ScrollStat,
    TimeWindow,
};

pub const DEFAULT_INTERACTION_DAYS: i64 = 7;
pub const MAX_INTERACTION_ROWS: i64 = 1000;

/// Missing bounds default to the last seven days ending at `now`.
pub fn build_interaction_filter(
    query: InteractionQuery,
    now: DateTime<Utc>,
) -> Result<InteractionFilter, AppError> {
    let end = parse_bound(query.end_date, true, "end_date")?.unwrap_or(now);
    let start = parse_bound(query.start_date, false, "start_date")?
        .unwrap_or(end - Duration::days(DEFAULT_INTERACTION_DAYS));
    if start > end {
        return Err(AppError::BadRequest(
            "start_date must not be after end_date".to_string(),
        ));
    }

    Ok(InteractionFilter {
        window: TimeWindow { start, end },
        limit: query
            .limit
            .unwrap_or(MAX_INTERACTION_ROWS)
            .clamp(1, MAX_INTERACTION_ROWS),
    })
}

fn report<T>(data: Vec<T>, source: DataSource, filter: &InteractionFilter) -> InteractionReport<T> {
    InteractionReport {
        total: data.len(),
        data,
        source,
        start_date: filter.window.start,
        end_date: filter.window.end,
    }
}

pub async fn click_analytics(
    state: &AppState,
    query: InteractionQuery,
) -> Result<InteractionReport<ClickStat>, AppError> {
    let filter = build_interaction_filter(query, Utc::now())?;

    let secondary = state
        .secondary_events
        .as_ref()
        .map(|store| store.click_stats(&filter));
    let primary = state.primary_events.click_stats(&filter);
    let (data, source) = prefer_secondary(state, "click", secondary, primary)
        .await
        .map_err(|err| {
            error!("failed to fetch click analytics: {:#}", err);
            AppError::primary("Failed to retrieve click analytics", err)
        })?;
    Ok(report(data, source, &filter))
}

pub async fn scroll_analytics(
    state: &AppState,
    query: InteractionQuery,
) -> Result<InteractionReport<ScrollStat>, AppError> {
    let filter = build_interaction_filter(query, Utc::now())?;

    let secondary = state
        .secondary_events
        .as_ref()
        .map(|store| store.scroll_stats(&filter));
    let primary = state.primary_events.scroll_stats(&filter);
    let (data, source) = prefer_secondary(state, "scroll", secondary, primary)
        .await
        .map_err(|err| {
            error!("failed to fetch scroll analytics: {:#}", err);
            AppError::primary("Failed to retrieve scroll analytics", err)
        })?;
    Ok(report(data, source, &filter))
}
