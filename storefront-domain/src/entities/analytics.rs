// Analytics read models

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageVisitQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub path: Option<String>,
    pub user_id: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageVisitFilter {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub path: Option<String>,
    pub user_id: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl PageVisitFilter {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start.map(|start| at >= start).unwrap_or(true)
            && self.end.map(|end| at <= end).unwrap_or(true)
    }
}

/// One row of the page-visit breakdown, grouped by
/// `(path, device_type, browser, country)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageVisitStat {
    pub path: String,
    pub visit_count: u64,
    pub unique_sessions: u64,
    pub unique_users: u64,
    pub avg_duration: f64,
    pub device_type: Option<String>,
    pub browser: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Primary,
    Secondary,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageVisitReport {
    pub data: Vec<PageVisitStat>,
    pub source: DataSource,
    pub total: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InteractionQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InteractionFilter {
    pub window: TimeWindow,
    pub limit: i64,
}

/// Clicks per day, grouped by
/// `(date, element_type, element_id, page_url, device_type, browser)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClickStat {
    pub date: NaiveDate,
    pub element_type: String,
    pub element_id: Option<String>,
    pub page_url: String,
    pub click_count: u64,
    pub unique_sessions: u64,
    pub unique_users: u64,
    pub device_type: Option<String>,
    pub browser: Option<String>,
}

/// Scroll milestones per day, grouped by
/// `(date, page_url, scroll_depth_percent, device_type, browser)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScrollStat {
    pub date: NaiveDate,
    pub page_url: String,
    pub scroll_depth_percent: f64,
    pub scroll_events: u64,
    pub unique_sessions: u64,
    pub avg_page_height: Option<f64>,
    pub device_type: Option<String>,
    pub browser: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InteractionReport<T> {
    pub data: Vec<T>,
    pub source: DataSource,
    pub total: usize,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateRange {
    OneDay,
    #[default]
    SevenDays,
    ThirtyDays,
}

impl DateRange {
    /// Unknown values fall back to the seven-day window.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim()) {
            Some("1d") => DateRange::OneDay,
            Some("30d") => DateRange::ThirtyDays,
            _ => DateRange::SevenDays,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DateRange::OneDay => "1d",
            DateRange::SevenDays => "7d",
            DateRange::ThirtyDays => "30d",
        }
    }

    pub fn days(&self) -> i64 {
        match self {
            DateRange::OneDay => 1,
            DateRange::SevenDays => 7,
            DateRange::ThirtyDays => 30,
        }
    }

    pub fn window_ending(&self, end: DateTime<Utc>) -> TimeWindow {
        TimeWindow {
            start: end - Duration::days(self.days()),
            end,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DashboardQuery {
    pub date_range: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PageVisitTotals {
    pub total_visits: u64,
    pub unique_sessions: u64,
    pub unique_users: u64,
    pub avg_duration: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EventTotals {
    pub total_events: u64,
    pub unique_event_types: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopPage {
    pub path: String,
    pub visits: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceCount {
    pub device_type: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub period: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardMetrics {
    pub page_visits: PageVisitTotals,
    pub events: EventTotals,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub date_range: DashboardPeriod,
    pub metrics: DashboardMetrics,
    pub top_pages: Vec<TopPage>,
    pub device_breakdown: Vec<DeviceCount>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_date_range_defaults_to_seven_days() {
        assert_eq!(DateRange::parse(Some("90d")), DateRange::SevenDays);
        assert_eq!(DateRange::parse(None), DateRange::SevenDays);
        assert_eq!(DateRange::parse(Some("30d")), DateRange::ThirtyDays);
    }

    #[test]
    fn window_spans_the_requested_days() {
        let end = Utc::now();
        let window = DateRange::OneDay.window_ending(end);
        assert_eq!(window.end - window.start, Duration::days(1));
        assert!(window.contains(end));
        assert!(!window.contains(end - Duration::days(2)));
    }
}
