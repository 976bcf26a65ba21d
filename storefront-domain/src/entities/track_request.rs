// Tracking payloads as sent by the browser beacon
// Every field is optional here; the schema registry decides what is required

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::utils::{opt_client_timestamp, opt_string_or_number};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageVisitRequest {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub session_id: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub user_id: Option<String>,
    pub url: Option<String>,
    pub path: Option<String>,
    pub referrer: Option<String>,
    pub screen_resolution: Option<String>,
    pub duration_seconds: Option<i32>,
    pub country: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomEventRequest {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub session_id: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub user_id: Option<String>,
    pub event_type: Option<String>,
    pub event_name: Option<String>,
    pub properties: Option<serde_json::Value>,
    pub url: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClickRequest {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub session_id: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub user_id: Option<String>,
    pub element_type: Option<String>,
    pub element_id: Option<String>,
    pub element_class: Option<String>,
    pub element_text: Option<String>,
    pub page_url: Option<String>,
    pub x_coordinate: Option<f64>,
    pub y_coordinate: Option<f64>,
    #[serde(default, deserialize_with = "opt_client_timestamp")]
    pub timestamp_client: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScrollRequest {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub session_id: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub user_id: Option<String>,
    pub page_url: Option<String>,
    pub scroll_depth_percent: Option<f64>,
    pub max_scroll_depth_percent: Option<f64>,
    pub page_height: Option<i32>,
    pub viewport_height: Option<i32>,
    pub scroll_time_seconds: Option<i32>,
    #[serde(default, deserialize_with = "opt_client_timestamp")]
    pub timestamp_client: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionRequest {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub session_id: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "opt_client_timestamp")]
    pub session_start_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "opt_client_timestamp")]
    pub session_end_time: Option<DateTime<Utc>>,
    pub session_duration_seconds: Option<i32>,
    pub pages_visited: Option<i32>,
    pub total_clicks: Option<i32>,
    pub total_scroll_events: Option<i32>,
    pub bounce_rate: Option<f64>,
    pub is_active: Option<bool>,
    pub exit_page: Option<String>,
    pub referrer_source: Option<String>,
}
