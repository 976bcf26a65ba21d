use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use storefront_application::commands::track_commands;
use storefront_application::AppState;
use storefront_domain::{
    ClickRequest, ClientContext, CustomEventRequest, EventKind, PageVisitRequest, ScrollRequest,
    SessionRequest, TrackReceipt, TrackRequest,
};

use crate::error::HttpError;
use crate::middleware::Client;

type Created = (StatusCode, Json<Value>);

pub fn success_message(kind: EventKind) -> String {
    let label = kind.label();
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => format!("{}{} tracked successfully", first.to_uppercase(), chars.as_str()),
        None => "Tracked successfully".to_string(),
    }
}

fn receipt_body(receipt: &TrackReceipt) -> Value {
    let mut body = Map::new();
    body.insert("message".to_string(), Value::String(success_message(receipt.kind)));
    body.insert(
        receipt.kind.id_field().to_string(),
        Value::String(receipt.event_id.to_string()),
    );
    body.insert(
        "timestamp".to_string(),
        Value::String(receipt.occurred_at.to_rfc3339()),
    );
    Value::Object(body)
}

async fn track_kind<R>(
    state: &AppState,
    client: ClientContext,
    payload: Result<Json<R>, JsonRejection>,
) -> Result<Created, HttpError>
where
    R: TrackRequest + DeserializeOwned + Send,
{
    let Json(request) = payload?;
    let outcome = track_commands::track(state, request, client)
        .await
        .map_err(|err| HttpError::from_app(err, state.config.is_development()))?;
    Ok((StatusCode::CREATED, Json(receipt_body(&outcome.receipt))))
}

pub async fn track_page_visit(
    State(state): State<AppState>,
    Client(client): Client,
    payload: Result<Json<PageVisitRequest>, JsonRejection>,
) -> Result<Created, HttpError> {
    track_kind(&state, client, payload).await
}

pub async fn track_event(
    State(state): State<AppState>,
    Client(client): Client,
    payload: Result<Json<CustomEventRequest>, JsonRejection>,
) -> Result<Created, HttpError> {
    track_kind(&state, client, payload).await
}

pub async fn track_click(
    State(state): State<AppState>,
    Client(client): Client,
    payload: Result<Json<ClickRequest>, JsonRejection>,
) -> Result<Created, HttpError> {
    track_kind(&state, client, payload).await
}

pub async fn track_scroll(
    State(state): State<AppState>,
    Client(client): Client,
    payload: Result<Json<ScrollRequest>, JsonRejection>,
) -> Result<Created, HttpError> {
    track_kind(&state, client, payload).await
}

pub async fn track_session(
    State(state): State<AppState>,
    Client(client): Client,
    payload: Result<Json<SessionRequest>, JsonRejection>,
) -> Result<Created, HttpError> {
    track_kind(&state, client, payload).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_match_each_kind() {
        assert_eq!(success_message(EventKind::PageVisit), "Page visit tracked successfully");
        assert_eq!(success_message(EventKind::CustomEvent), "Event tracked successfully");
        assert_eq!(success_message(EventKind::Click), "Click event tracked successfully");
        assert_eq!(success_message(EventKind::Scroll), "Scroll event tracked successfully");
        assert_eq!(success_message(EventKind::Session), "Session data tracked successfully");
    }
}
