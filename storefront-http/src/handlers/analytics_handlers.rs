use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;

use storefront_application::queries::{dashboard_queries, interaction_queries, page_visit_queries};
use storefront_application::AppState;
use storefront_domain::{
    ClickStat, Dashboard, DashboardQuery, InteractionQuery, InteractionReport, PageVisitQuery,
    PageVisitReport, ScrollStat,
};

use crate::error::HttpError;

pub async fn list_page_visits(
    State(state): State<AppState>,
    query: Result<Query<PageVisitQuery>, QueryRejection>,
) -> Result<Json<PageVisitReport>, HttpError> {
    let Query(query) = query?;
    let report = page_visit_queries::page_visits(&state, query)
        .await
        .map_err(|err| HttpError::from_app(err, state.config.is_development()))?;
    Ok(Json(report))
}

pub async fn list_click_analytics(
    State(state): State<AppState>,
    query: Result<Query<InteractionQuery>, QueryRejection>,
) -> Result<Json<InteractionReport<ClickStat>>, HttpError> {
    let Query(query) = query?;
    let report = interaction_queries::click_analytics(&state, query)
        .await
        .map_err(|err| HttpError::from_app(err, state.config.is_development()))?;
    Ok(Json(report))
}

pub async fn list_scroll_analytics(
    State(state): State<AppState>,
    query: Result<Query<InteractionQuery>, QueryRejection>,
) -> Result<Json<InteractionReport<ScrollStat>>, HttpError> {
    let Query(query) = query?;
    let report = interaction_queries::scroll_analytics(&state, query)
        .await
        .map_err(|err| HttpError::from_app(err, state.config.is_development()))?;
    Ok(Json(report))
}

pub async fn get_dashboard(
    State(state): State<AppState>,
    query: Result<Query<DashboardQuery>, QueryRejection>,
) -> Result<Json<Dashboard>, HttpError> {
    let Query(query) = query?;
    let dashboard = dashboard_queries::dashboard(&state, query)
        .await
        .map_err(|err| HttpError::from_app(err, state.config.is_development()))?;
    Ok(Json(dashboard))
}
