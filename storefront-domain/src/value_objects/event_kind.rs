// Event kind value object

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    PageVisit,
    CustomEvent,
    Click,
    Scroll,
    Session,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::PageVisit,
        EventKind::CustomEvent,
        EventKind::Click,
        EventKind::Scroll,
        EventKind::Session,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::PageVisit => "page_visit",
            EventKind::CustomEvent => "custom_event",
            EventKind::Click => "click",
            EventKind::Scroll => "scroll",
            EventKind::Session => "session",
        }
    }

    /// Table name shared by both stores (schema-qualified in the primary store).
    pub fn table(&self) -> &'static str {
        match self {
            EventKind::PageVisit => "page_visits",
            EventKind::CustomEvent => "events",
            EventKind::Click => "click_events",
            EventKind::Scroll => "scroll_events",
            EventKind::Session => "session_data",
        }
    }

    /// Fields a tracking payload must carry to be accepted.
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            EventKind::PageVisit => &["session_id", "url", "path"],
            EventKind::CustomEvent => &["session_id", "event_type", "event_name"],
            EventKind::Click => &["session_id", "element_type", "page_url"],
            EventKind::Scroll => &["session_id", "page_url", "scroll_depth_percent"],
            EventKind::Session => &["session_id", "session_start_time"],
        }
    }

    /// Key under which the generated id is echoed back to the client.
    pub fn id_field(&self) -> &'static str {
        match self {
            EventKind::PageVisit => "visit_id",
            EventKind::CustomEvent => "event_id",
            EventKind::Click => "click_id",
            EventKind::Scroll => "scroll_id",
            EventKind::Session => "session_data_id",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EventKind::PageVisit => "page visit",
            EventKind::CustomEvent => "event",
            EventKind::Click => "click event",
            EventKind::Scroll => "scroll event",
            EventKind::Session => "session data",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scroll_requires_depth_percent() {
        assert!(EventKind::Scroll
            .required_fields()
            .contains(&"scroll_depth_percent"));
    }

    #[test]
    fn every_kind_requires_session_id() {
        for kind in EventKind::ALL {
            assert_eq!(kind.required_fields()[0], "session_id", "{}", kind.as_str());
        }
    }
}
