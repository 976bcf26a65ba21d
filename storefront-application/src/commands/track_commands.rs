use std::time::Duration;

use chrono::Utc;
use tokio::time::timeout;
use tracing::{error, warn};
use uuid::Uuid;

use crate::AppError;
use crate::AppState;
use storefront_domain::{detect_device, ClientContext, TrackReceipt, TrackRequest, TrackedEvent};

/// What happened to the secondary copy of an event. Never shown to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorOutcome {
    Mirrored,
    Failed(String),
    TimedOut,
    Skipped,
}

#[derive(Debug, Clone)]
pub struct TrackOutcome {
    pub receipt: TrackReceipt,
    pub mirror: MirrorOutcome,
}

pub async fn track<R: TrackRequest>(
    state: &AppState,
    request: R,
    client: ClientContext,
) -> Result<TrackOutcome, AppError> {
    let validated = request.validate().map_err(|violation| {
        state.metrics.record_validation_rejection();
        warn!("rejected {}: {}", R::KIND.label(), violation);
        AppError::from(violation)
    })?;

    let event = TrackedEvent {
        event_id: Uuid::new_v4(),
        session_id: validated.session_id,
        user_id: validated.user_id,
        occurred_at: Utc::now(),
        ip_address: client.ip_address,
        device: detect_device(client.user_agent.as_deref()),
        user_agent: client.user_agent,
        payload: validated.payload,
    };
    record_event(state, event).await
}

/// Writes to the primary store, then mirrors to the secondary one.
/// Only the primary write can fail the call.
pub async fn record_event(state: &AppState, event: TrackedEvent) -> Result<TrackOutcome, AppError> {
    let kind = event.kind();
    if let Err(err) = state.primary_events.insert_event(&event).await {
        state.metrics.record_primary_failure();
        error!("failed to write {} {} to primary store: {:#}", kind.label(), event.event_id, err);
        return Err(AppError::primary(format!("Failed to track {}", kind.label()), err));
    }
    state.metrics.record_tracked_event();

    let mirror = mirror_event(state, &event).await;
    Ok(TrackOutcome {
        receipt: TrackReceipt {
            kind,
            event_id: event.event_id,
            occurred_at: event.occurred_at,
        },
        mirror,
    })
}

async fn mirror_event(state: &AppState, event: &TrackedEvent) -> MirrorOutcome {
    let Some(secondary) = state.secondary_events.as_ref() else {
        return MirrorOutcome::Skipped;
    };
    let budget = Duration::from_millis(state.config.secondary_timeout_ms);
    match timeout(budget, secondary.insert_event(event)).await {
        Ok(Ok(())) => {
            state.metrics.record_mirror_success();
            MirrorOutcome::Mirrored
        }
        Ok(Err(err)) => {
            state.metrics.record_mirror_failure();
            warn!(
                "secondary insert failed for {} {}: {:#}",
                event.kind().label(),
                event.event_id,
                err
            );
            MirrorOutcome::Failed(format!("{:#}", err))
        }
        Err(_) => {
            state.metrics.record_mirror_timeout();
            warn!(
                "secondary insert for {} {} timed out after {}ms",
                event.kind().label(),
                event.event_id,
                budget.as_millis()
            );
            MirrorOutcome::TimedOut
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StoreMode, TestStores};
    use storefront_domain::ports::PrimaryEventStore;
    use storefront_domain::{EventKind, PageVisitRequest, ScrollRequest};

    fn page_visit() -> PageVisitRequest {
        PageVisitRequest {
            session_id: Some("sess-1".to_string()),
            user_id: Some("42".to_string()),
            url: Some("https://shop.example/games".to_string()),
            path: Some("/games".to_string()),
            ..Default::default()
        }
    }

    fn iphone() -> ClientContext {
        ClientContext {
            ip_address: Some("203.0.113.9".to_string()),
            user_agent: Some(
                "Mozilla/5.0 (iPhone; CPU iPhone OS) AppleWebKit/605 Safari/604".to_string(),
            ),
        }
    }

    #[tokio::test]
    async fn accepted_event_is_retrievable_from_primary() {
        let stores = TestStores::new(Some(StoreMode::Healthy));
        let state = stores.state();

        let outcome = track(&state, page_visit(), iphone()).await.expect("tracked");

        let record = stores
            .primary
            .find_event(EventKind::PageVisit, outcome.receipt.event_id)
            .await
            .expect("lookup")
            .expect("stored");
        assert_eq!(record.session_id, "sess-1");
        assert_eq!(record.occurred_at, outcome.receipt.occurred_at);
        assert_eq!(outcome.mirror, MirrorOutcome::Mirrored);
    }

    #[tokio::test]
    async fn both_stores_see_the_same_id_and_time() {
        let stores = TestStores::new(Some(StoreMode::Healthy));
        let state = stores.state();

        track(&state, page_visit(), iphone()).await.expect("tracked");

        let primary = stores.primary.events();
        let secondary = stores.secondary.as_ref().expect("secondary").events();
        assert_eq!(primary.len(), 1);
        assert_eq!(secondary.len(), 1);
        assert_eq!(primary[0].event_id, secondary[0].event_id);
        assert_eq!(primary[0].occurred_at, secondary[0].occurred_at);
        assert_eq!(primary[0].device_type(), Some("mobile"));
        assert_eq!(primary[0].os(), Some("iOS"));
    }

    #[tokio::test]
    async fn secondary_failure_is_recorded_not_returned() {
        let stores = TestStores::new(Some(StoreMode::Failing));
        let state = stores.state();

        let outcome = track(&state, page_visit(), iphone()).await.expect("tracked");

        assert!(matches!(outcome.mirror, MirrorOutcome::Failed(_)));
        assert_eq!(stores.primary.len(), 1);
        assert_eq!(state.metrics.mirror_failures(), 1);
    }

    #[tokio::test]
    async fn hanging_secondary_is_cut_off_by_the_timeout() {
        let stores = TestStores::new(Some(StoreMode::Hanging));
        let state = stores.state();

        let outcome = track(&state, page_visit(), iphone()).await.expect("tracked");

        assert_eq!(outcome.mirror, MirrorOutcome::TimedOut);
        assert_eq!(stores.primary.len(), 1);
        assert_eq!(state.metrics.mirror_timeouts(), 1);
    }

    #[tokio::test]
    async fn disabled_secondary_is_skipped() {
        let stores = TestStores::new(None);
        let state = stores.state();

        let outcome = track(&state, page_visit(), ClientContext::default())
            .await
            .expect("tracked");

        assert_eq!(outcome.mirror, MirrorOutcome::Skipped);
        assert!(stores.primary.events()[0].device.is_none());
    }

    #[tokio::test]
    async fn primary_failure_skips_the_mirror() {
        let stores = TestStores::new(Some(StoreMode::Healthy)).with_primary(StoreMode::Failing);
        let state = stores.state();

        let err = track(&state, page_visit(), iphone()).await.expect_err("primary down");

        assert!(matches!(err, AppError::Primary { .. }));
        assert_eq!(err.to_string(), "Failed to track page visit");
        assert!(stores.secondary.as_ref().expect("secondary").is_empty());
        assert_eq!(state.metrics.tracked_events(), 0);
    }

    #[tokio::test]
    async fn invalid_payload_touches_no_store() {
        let stores = TestStores::new(Some(StoreMode::Healthy));
        let state = stores.state();
        let request = ScrollRequest {
            session_id: Some("sess-1".to_string()),
            page_url: Some("/games".to_string()),
            ..Default::default()
        };

        let err = track(&state, request, iphone()).await.expect_err("depth missing");

        match err {
            AppError::Validation { missing, required } => {
                assert_eq!(missing, vec!["scroll_depth_percent"]);
                assert_eq!(required.len(), 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(stores.primary.is_empty());
    }
}
