use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use storefront_application::commands::order_commands;
use storefront_application::queries::order_queries;
use storefront_application::{AppError, AppState};
use storefront_domain::{
    CreateOrderRequest, Order, OrderListQuery, OrderSummary, Pagination, StatusChange,
    StatusUpdateRequest,
};

use crate::error::{HttpError, OrderError};

#[derive(Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: T,
}

#[derive(Serialize)]
pub struct CountedEnvelope<T: Serialize> {
    pub success: bool,
    pub data: Vec<T>,
    pub count: usize,
}

#[derive(Serialize)]
pub struct PagedEnvelope<T: Serialize> {
    pub success: bool,
    pub data: Vec<T>,
    pub pagination: Pagination,
}

fn order_error(state: &AppState) -> impl Fn(AppError) -> OrderError + '_ {
    move |err| OrderError(HttpError::from_app(err, state.config.is_development()))
}

pub async fn create_order(
    State(state): State<AppState>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<Order>>), OrderError> {
    let Json(request) = payload?;
    let order = order_commands::create_order(&state, request)
        .await
        .map_err(order_error(&state))?;
    Ok((
        StatusCode::CREATED,
        Json(Envelope {
            success: true,
            message: Some(format!("Order {} created successfully", order.order_number)),
            data: order,
        }),
    ))
}

pub async fn list_orders(
    State(state): State<AppState>,
    query: Result<Query<OrderListQuery>, QueryRejection>,
) -> Result<Json<PagedEnvelope<OrderSummary>>, OrderError> {
    let Query(query) = query?;
    let page = order_queries::list_orders(&state, query)
        .await
        .map_err(order_error(&state))?;
    Ok(Json(PagedEnvelope {
        success: true,
        data: page.orders,
        pagination: page.pagination,
    }))
}

pub async fn list_user_orders(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<CountedEnvelope<Order>>, OrderError> {
    let orders = order_queries::list_user_orders(&state, &user_id)
        .await
        .map_err(order_error(&state))?;
    Ok(Json(CountedEnvelope {
        success: true,
        count: orders.len(),
        data: orders,
    }))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<Order>>, OrderError> {
    let order = order_queries::get_order(&state, &id)
        .await
        .map_err(order_error(&state))?;
    Ok(Json(Envelope {
        success: true,
        message: None,
        data: order,
    }))
}

pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<StatusUpdateRequest>, JsonRejection>,
) -> Result<Json<Envelope<StatusChange>>, OrderError> {
    let Json(request) = payload?;
    let change = order_commands::update_order_status(&state, &id, request)
        .await
        .map_err(order_error(&state))?;
    Ok(Json(Envelope {
        success: true,
        message: Some(format!("Order status updated to {}", change.status)),
        data: change,
    }))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<StatusChange>>, OrderError> {
    let change = order_commands::cancel_order(&state, &id)
        .await
        .map_err(order_error(&state))?;
    Ok(Json(Envelope {
        success: true,
        message: Some("Order cancelled successfully".to_string()),
        data: change,
    }))
}
