// Schema registry for tracking payloads
// Each payload type knows its required fields and how to become an EventPayload

use serde_json::json;
use thiserror::Error;

use crate::entities::{
    ClickEvent, ClickRequest, CustomEvent, CustomEventRequest, EventPayload, PageVisit,
    PageVisitRequest, ScrollEvent, ScrollRequest, SessionRequest, SessionSummary,
};
use crate::value_objects::EventKind;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("missing required fields for {}: {}", kind.label(), missing.join(", "))]
pub struct SchemaViolation {
    pub kind: EventKind,
    pub missing: Vec<&'static str>,
}

impl SchemaViolation {
    pub fn required(&self) -> &'static [&'static str] {
        self.kind.required_fields()
    }
}

/// Fields shared by every event variant once validated.
#[derive(Debug, Clone)]
pub struct ValidatedEvent {
    pub session_id: String,
    pub user_id: Option<String>,
    pub payload: EventPayload,
}

pub trait TrackRequest {
    const KIND: EventKind;

    fn validate(self) -> Result<ValidatedEvent, SchemaViolation>;
}

fn require_text(
    missing: &mut Vec<&'static str>,
    name: &'static str,
    value: Option<String>,
) -> Option<String> {
    match value {
        Some(text) if !text.trim().is_empty() => Some(text),
        _ => {
            missing.push(name);
            None
        }
    }
}

fn require<T>(missing: &mut Vec<&'static str>, name: &'static str, value: Option<T>) -> Option<T> {
    if value.is_none() {
        missing.push(name);
    }
    value
}

fn violation(kind: EventKind, missing: Vec<&'static str>) -> SchemaViolation {
    SchemaViolation { kind, missing }
}

impl TrackRequest for PageVisitRequest {
    const KIND: EventKind = EventKind::PageVisit;

    fn validate(self) -> Result<ValidatedEvent, SchemaViolation> {
        let mut missing = Vec::new();
        let session_id = require_text(&mut missing, "session_id", self.session_id);
        let url = require_text(&mut missing, "url", self.url);
        let path = require_text(&mut missing, "path", self.path);
        let (Some(session_id), Some(url), Some(path)) = (session_id, url, path) else {
            return Err(violation(Self::KIND, missing));
        };
        Ok(ValidatedEvent {
            session_id,
            user_id: self.user_id,
            payload: EventPayload::PageVisit(PageVisit {
                url,
                path,
                referrer: self.referrer,
                screen_resolution: self.screen_resolution,
                duration_seconds: self.duration_seconds.unwrap_or(0),
                country: self.country,
                city: self.city,
            }),
        })
    }
}

impl TrackRequest for CustomEventRequest {
    const KIND: EventKind = EventKind::CustomEvent;

    fn validate(self) -> Result<ValidatedEvent, SchemaViolation> {
        let mut missing = Vec::new();
        let session_id = require_text(&mut missing, "session_id", self.session_id);
        let event_type = require_text(&mut missing, "event_type", self.event_type);
        let event_name = require_text(&mut missing, "event_name", self.event_name);
        let (Some(session_id), Some(event_type), Some(event_name)) =
            (session_id, event_type, event_name)
        else {
            return Err(violation(Self::KIND, missing));
        };
        Ok(ValidatedEvent {
            session_id,
            user_id: self.user_id,
            payload: EventPayload::Custom(CustomEvent {
                event_type,
                event_name,
                properties: self.properties.unwrap_or_else(|| json!({})),
                url: self.url,
                country: self.country,
                city: self.city,
            }),
        })
    }
}

impl TrackRequest for ClickRequest {
    const KIND: EventKind = EventKind::Click;

    fn validate(self) -> Result<ValidatedEvent, SchemaViolation> {
        let mut missing = Vec::new();
        let session_id = require_text(&mut missing, "session_id", self.session_id);
        let element_type = require_text(&mut missing, "element_type", self.element_type);
        let page_url = require_text(&mut missing, "page_url", self.page_url);
        let (Some(session_id), Some(element_type), Some(page_url)) =
            (session_id, element_type, page_url)
        else {
            return Err(violation(Self::KIND, missing));
        };
        Ok(ValidatedEvent {
            session_id,
            user_id: self.user_id,
            payload: EventPayload::Click(ClickEvent {
                element_type,
                element_id: self.element_id,
                element_class: self.element_class,
                element_text: self.element_text,
                page_url,
                x_coordinate: self.x_coordinate,
                y_coordinate: self.y_coordinate,
                timestamp_client: self.timestamp_client,
            }),
        })
    }
}

impl TrackRequest for ScrollRequest {
    const KIND: EventKind = EventKind::Scroll;

    fn validate(self) -> Result<ValidatedEvent, SchemaViolation> {
        let mut missing = Vec::new();
        let session_id = require_text(&mut missing, "session_id", self.session_id);
        let page_url = require_text(&mut missing, "page_url", self.page_url);
        // a depth of 0 is a real reading, only absence counts as missing
        let depth = require(&mut missing, "scroll_depth_percent", self.scroll_depth_percent);
        let (Some(session_id), Some(page_url), Some(scroll_depth_percent)) =
            (session_id, page_url, depth)
        else {
            return Err(violation(Self::KIND, missing));
        };
        Ok(ValidatedEvent {
            session_id,
            user_id: self.user_id,
            payload: EventPayload::Scroll(ScrollEvent {
                page_url,
                scroll_depth_percent,
                max_scroll_depth_percent: self.max_scroll_depth_percent,
                page_height: self.page_height,
                viewport_height: self.viewport_height,
                scroll_time_seconds: self.scroll_time_seconds.unwrap_or(0),
                timestamp_client: self.timestamp_client,
            }),
        })
    }
}

impl TrackRequest for SessionRequest {
    const KIND: EventKind = EventKind::Session;

    fn validate(self) -> Result<ValidatedEvent, SchemaViolation> {
        let mut missing = Vec::new();
        let session_id = require_text(&mut missing, "session_id", self.session_id);
        let start = require(&mut missing, "session_start_time", self.session_start_time);
        let (Some(session_id), Some(session_start_time)) = (session_id, start) else {
            return Err(violation(Self::KIND, missing));
        };
        Ok(ValidatedEvent {
            session_id,
            user_id: self.user_id,
            payload: EventPayload::Session(SessionSummary {
                session_start_time,
                session_end_time: self.session_end_time,
                session_duration_seconds: self.session_duration_seconds,
                pages_visited: self.pages_visited.unwrap_or(0),
                total_clicks: self.total_clicks.unwrap_or(0),
                total_scroll_events: self.total_scroll_events.unwrap_or(0),
                bounce_rate: self.bounce_rate,
                is_active: self.is_active.unwrap_or(true),
                exit_page: self.exit_page,
                referrer_source: self.referrer_source,
            }),
        })
    }
}
