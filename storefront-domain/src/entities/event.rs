// Event entity
// One recorded user-interaction fact, shared by the primary and secondary stores

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value_objects::EventKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub device_type: String,
    pub browser: String,
    pub os: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TrackedEvent {
    pub event_id: Uuid,
    pub session_id: String,
    pub user_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub device: Option<DeviceInfo>,
    pub payload: EventPayload,
}

impl TrackedEvent {
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    pub fn device_type(&self) -> Option<&str> {
        self.device.as_ref().map(|device| device.device_type.as_str())
    }

    pub fn browser(&self) -> Option<&str> {
        self.device.as_ref().map(|device| device.browser.as_str())
    }

    pub fn os(&self) -> Option<&str> {
        self.device.as_ref().map(|device| device.os.as_str())
    }
}

#[derive(Debug, Clone)]
pub enum EventPayload {
    PageVisit(PageVisit),
    Custom(CustomEvent),
    Click(ClickEvent),
    Scroll(ScrollEvent),
    Session(SessionSummary),
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::PageVisit(_) => EventKind::PageVisit,
            EventPayload::Custom(_) => EventKind::CustomEvent,
            EventPayload::Click(_) => EventKind::Click,
            EventPayload::Scroll(_) => EventKind::Scroll,
            EventPayload::Session(_) => EventKind::Session,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PageVisit {
    pub url: String,
    pub path: String,
    pub referrer: Option<String>,
    pub screen_resolution: Option<String>,
    pub duration_seconds: i32,
    pub country: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CustomEvent {
    pub event_type: String,
    pub event_name: String,
    pub properties: serde_json::Value,
    pub url: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ClickEvent {
    pub element_type: String,
    pub element_id: Option<String>,
    pub element_class: Option<String>,
    pub element_text: Option<String>,
    pub page_url: String,
    pub x_coordinate: Option<f64>,
    pub y_coordinate: Option<f64>,
    pub timestamp_client: Option<DateTime<Utc>>,
}

/// `scroll_depth_percent` is the milestone the client crossed (25, 50, ...);
/// `max_scroll_depth_percent` is the deepest point seen on the page so far.
#[derive(Debug, Clone)]
pub struct ScrollEvent {
    pub page_url: String,
    pub scroll_depth_percent: f64,
    pub max_scroll_depth_percent: Option<f64>,
    pub page_height: Option<i32>,
    pub viewport_height: Option<i32>,
    pub scroll_time_seconds: i32,
    pub timestamp_client: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub session_start_time: DateTime<Utc>,
    pub session_end_time: Option<DateTime<Utc>>,
    pub session_duration_seconds: Option<i32>,
    pub pages_visited: i32,
    pub total_clicks: i32,
    pub total_scroll_events: i32,
    pub bounce_rate: Option<f64>,
    pub is_active: bool,
    pub exit_page: Option<String>,
    pub referrer_source: Option<String>,
}

/// Envelope of a stored event, as read back from the primary store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    pub event_id: Uuid,
    pub kind: EventKind,
    pub session_id: String,
    pub user_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// What the caller learns about an accepted event.
#[derive(Debug, Clone, Serialize)]
pub struct TrackReceipt {
    pub kind: EventKind,
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
}
