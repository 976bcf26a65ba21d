use anyhow::Result;
use chrono::NaiveDate;
use async_trait::async_trait;
use clickhouse::{Client, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::utils::{chrono_to_offset, opt_chrono_to_offset};
use storefront_domain::ports::SecondaryEventStore;
use storefront_domain::{
    ClickStat, EventPayload, InteractionFilter, PageVisitFilter, PageVisitStat, ScrollStat,
    TrackedEvent,
};

#[derive(Debug, Clone, Serialize, Row)]
struct PageVisitRow {
    #[serde(with = "clickhouse::serde::uuid")]
    id: Uuid,
    session_id: String,
    user_id: String,
    #[serde(with = "clickhouse::serde::time::datetime64::millis")]
    timestamp: OffsetDateTime,
    url: String,
    path: String,
    referrer: String,
    user_agent: String,
    ip_address: String,
    country: String,
    city: String,
    device_type: String,
    browser: String,
    os: String,
    screen_resolution: String,
    duration_seconds: i32,
}

#[derive(Debug, Clone, Serialize, Row)]
struct CustomEventRow {
    #[serde(with = "clickhouse::serde::uuid")]
    id: Uuid,
    session_id: String,
    user_id: String,
    #[serde(with = "clickhouse::serde::time::datetime64::millis")]
    timestamp: OffsetDateTime,
    event_type: String,
    event_name: String,
    properties: String,
    url: String,
    user_agent: String,
    ip_address: String,
    country: String,
    city: String,
}

#[derive(Debug, Clone, Serialize, Row)]
struct ClickEventRow {
    #[serde(with = "clickhouse::serde::uuid")]
    id: Uuid,
    session_id: String,
    user_id: String,
    #[serde(with = "clickhouse::serde::time::datetime64::millis")]
    timestamp: OffsetDateTime,
    element_type: String,
    element_id: String,
    element_class: String,
    element_text: String,
    page_url: String,
    x_coordinate: Option<f64>,
    y_coordinate: Option<f64>,
    #[serde(with = "clickhouse::serde::time::datetime64::millis")]
    timestamp_client: OffsetDateTime,
    user_agent: String,
    ip_address: String,
    device_type: String,
    browser: String,
    os: String,
}

#[derive(Debug, Clone, Serialize, Row)]
struct ScrollEventRow {
    #[serde(with = "clickhouse::serde::uuid")]
    id: Uuid,
    session_id: String,
    user_id: String,
    #[serde(with = "clickhouse::serde::time::datetime64::millis")]
    timestamp: OffsetDateTime,
    page_url: String,
    scroll_depth_percent: f64,
    max_scroll_depth_percent: Option<f64>,
    page_height: Option<i32>,
    viewport_height: Option<i32>,
    scroll_time_seconds: i32,
    #[serde(with = "clickhouse::serde::time::datetime64::millis")]
    timestamp_client: OffsetDateTime,
    user_agent: String,
    ip_address: String,
    device_type: String,
    browser: String,
    os: String,
}

#[derive(Debug, Clone, Serialize, Row)]
struct SessionRow {
    #[serde(with = "clickhouse::serde::uuid")]
    id: Uuid,
    session_id: String,
    user_id: String,
    #[serde(with = "clickhouse::serde::time::datetime64::millis")]
    timestamp: OffsetDateTime,
    #[serde(with = "clickhouse::serde::time::datetime64::millis")]
    session_start_time: OffsetDateTime,
    #[serde(with = "clickhouse::serde::time::datetime64::millis")]
    session_end_time: OffsetDateTime,
    session_duration_seconds: i32,
    pages_visited: i32,
    total_clicks: i32,
    total_scroll_events: i32,
    bounce_rate: f64,
    is_active: u8,
    exit_page: String,
    referrer_source: String,
    user_agent: String,
    ip_address: String,
    device_type: String,
    browser: String,
    os: String,
}

#[derive(Debug, Clone, Deserialize, Row)]
struct PageVisitStatRow {
    path: String,
    visit_count: u64,
    unique_sessions: u64,
    unique_users: u64,
    avg_duration: f64,
    device_type: String,
    browser: String,
    country: String,
}

#[derive(Debug, Clone, Deserialize, Row)]
struct ClickStatRow {
    date: String,
    element_type: String,
    element_id: String,
    page_url: String,
    click_count: u64,
    unique_sessions: u64,
    unique_users: u64,
    device_type: String,
    browser: String,
}

#[derive(Debug, Clone, Deserialize, Row)]
struct ScrollStatRow {
    date: String,
    page_url: String,
    scroll_depth_percent: f64,
    scroll_events: u64,
    unique_sessions: u64,
    avg_page_height: Option<f64>,
    device_type: String,
    browser: String,
}

const CLICK_STATS: &str = "SELECT toString(toDate(timestamp)) AS date, element_type, element_id, \
     page_url, count() AS click_count, uniq(session_id) AS unique_sessions, \
     uniqIf(user_id, user_id != '') AS unique_users, device_type, browser \
     FROM click_events \
     WHERE timestamp >= fromUnixTimestamp64Milli(?) AND timestamp <= fromUnixTimestamp64Milli(?) \
     GROUP BY date, element_type, element_id, page_url, device_type, browser \
     ORDER BY date DESC, click_count DESC LIMIT ?";

const SCROLL_STATS: &str = "SELECT toString(toDate(timestamp)) AS date, page_url, \
     scroll_depth_percent, count() AS scroll_events, uniq(session_id) AS unique_sessions, \
     avg(page_height) AS avg_page_height, device_type, browser \
     FROM scroll_events \
     WHERE timestamp >= fromUnixTimestamp64Milli(?) AND timestamp <= fromUnixTimestamp64Milli(?) \
     GROUP BY date, page_url, scroll_depth_percent, device_type, browser \
     ORDER BY date DESC, scroll_depth_percent DESC LIMIT ?";

// Shared tail for every table: monthly partitions, one year of retention.
const TABLE_ENGINE: &str = "ENGINE = MergeTree
PARTITION BY toYYYYMM(timestamp)
ORDER BY (timestamp, session_id)
TTL toDateTime(timestamp) + INTERVAL 1 YEAR";

const TABLES: [(&str, &str); 5] = [
    (
        "page_visits",
        r#"
    id UUID,
    session_id String,
    user_id String,
    timestamp DateTime64(3),
    url String,
    path String,
    referrer String,
    user_agent String,
    ip_address String,
    country String,
    city String,
    device_type String,
    browser String,
    os String,
    screen_resolution String,
    duration_seconds Int32
"#,
    ),
    (
        "events",
        r#"
    id UUID,
    session_id String,
    user_id String,
    timestamp DateTime64(3),
    event_type String,
    event_name String,
    properties String,
    url String,
    user_agent String,
    ip_address String,
    country String,
    city String
"#,
    ),
    (
        "click_events",
        r#"
    id UUID,
    session_id String,
    user_id String,
    timestamp DateTime64(3),
    element_type String,
    element_id String,
    element_class String,
    element_text String,
    page_url String,
    x_coordinate Nullable(Float64),
    y_coordinate Nullable(Float64),
    timestamp_client DateTime64(3),
    user_agent String,
    ip_address String,
    device_type String,
    browser String,
    os String
"#,
    ),
    (
        "scroll_events",
        r#"
    id UUID,
    session_id String,
    user_id String,
    timestamp DateTime64(3),
    page_url String,
    scroll_depth_percent Float64,
    max_scroll_depth_percent Nullable(Float64),
    page_height Nullable(Int32),
    viewport_height Nullable(Int32),
    scroll_time_seconds Int32,
    timestamp_client DateTime64(3),
    user_agent String,
    ip_address String,
    device_type String,
    browser String,
    os String
"#,
    ),
    (
        "session_data",
        r#"
    id UUID,
    session_id String,
    user_id String,
    timestamp DateTime64(3),
    session_start_time DateTime64(3),
    session_end_time DateTime64(3),
    session_duration_seconds Int32,
    pages_visited Int32,
    total_clicks Int32,
    total_scroll_events Int32,
    bounce_rate Float64,
    is_active UInt8,
    exit_page String,
    referrer_source String,
    user_agent String,
    ip_address String,
    device_type String,
    browser String,
    os String
"#,
    ),
];

fn create_table_sql(table: &str, columns: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({}) {}",
        table, columns, TABLE_ENGINE
    )
}

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn device_text(value: Option<&str>) -> String {
    value.unwrap_or_default().to_string()
}

fn day(value: &str) -> Result<NaiveDate> {
    Ok(value.parse::<NaiveDate>()?)
}

fn blank_to_none(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Columnar mirror of the event tables. Missing optional text lands as `""`,
/// missing client timestamps as the epoch.
#[derive(Clone)]
pub struct ClickhouseRepo {
    client: Client,
    database: String,
}

impl ClickhouseRepo {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    async fn write<T: Row + Serialize>(&self, table: &str, row: &T) -> Result<()> {
        let mut insert = self.client.insert::<T>(table)?;
        insert.write(row).await?;
        insert.end().await?;
        Ok(())
    }
}

#[async_trait]
impl SecondaryEventStore for ClickhouseRepo {
    async fn ensure_schema(&self) -> Result<()> {
        let create_db = format!("CREATE DATABASE IF NOT EXISTS {}", self.database);
        // the target database may not exist yet
        self.client
            .clone()
            .with_database("default")
            .query(&create_db)
            .execute()
            .await?;

        for (table, columns) in TABLES {
            self.client
                .query(&create_table_sql(table, columns))
                .execute()
                .await?;
        }
        Ok(())
    }

    async fn insert_event(&self, event: &TrackedEvent) -> Result<()> {
        let timestamp = chrono_to_offset(event.occurred_at);
        let session_id = event.session_id.clone();
        let user_id = text(&event.user_id);
        let user_agent = text(&event.user_agent);
        let ip_address = text(&event.ip_address);
        let device_type = device_text(event.device_type());
        let browser = device_text(event.browser());
        let os = device_text(event.os());

        match &event.payload {
            EventPayload::PageVisit(visit) => {
                let row = PageVisitRow {
                    id: event.event_id,
                    session_id,
                    user_id,
                    timestamp,
                    url: visit.url.clone(),
                    path: visit.path.clone(),
                    referrer: text(&visit.referrer),
                    user_agent,
                    ip_address,
                    country: text(&visit.country),
                    city: text(&visit.city),
                    device_type,
                    browser,
                    os,
                    screen_resolution: text(&visit.screen_resolution),
                    duration_seconds: visit.duration_seconds,
                };
                self.write("page_visits", &row).await
            }
            EventPayload::Custom(custom) => {
                let row = CustomEventRow {
                    id: event.event_id,
                    session_id,
                    user_id,
                    timestamp,
                    event_type: custom.event_type.clone(),
                    event_name: custom.event_name.clone(),
                    properties: custom.properties.to_string(),
                    url: text(&custom.url),
                    user_agent,
                    ip_address,
                    country: text(&custom.country),
                    city: text(&custom.city),
                };
                self.write("events", &row).await
            }
            EventPayload::Click(click) => {
                let row = ClickEventRow {
                    id: event.event_id,
                    session_id,
                    user_id,
                    timestamp,
                    element_type: click.element_type.clone(),
                    element_id: text(&click.element_id),
                    element_class: text(&click.element_class),
                    element_text: text(&click.element_text),
                    page_url: click.page_url.clone(),
                    x_coordinate: click.x_coordinate,
                    y_coordinate: click.y_coordinate,
                    timestamp_client: opt_chrono_to_offset(click.timestamp_client),
                    user_agent,
                    ip_address,
                    device_type,
                    browser,
                    os,
                };
                self.write("click_events", &row).await
            }
            EventPayload::Scroll(scroll) => {
                let row = ScrollEventRow {
                    id: event.event_id,
                    session_id,
                    user_id,
                    timestamp,
                    page_url: scroll.page_url.clone(),
                    scroll_depth_percent: scroll.scroll_depth_percent,
                    max_scroll_depth_percent: scroll.max_scroll_depth_percent,
                    page_height: scroll.page_height,
                    viewport_height: scroll.viewport_height,
                    scroll_time_seconds: scroll.scroll_time_seconds,
                    timestamp_client: opt_chrono_to_offset(scroll.timestamp_client),
                    user_agent,
                    ip_address,
                    device_type,
                    browser,
                    os,
                };
                self.write("scroll_events", &row).await
            }
            EventPayload::Session(session) => {
                let row = SessionRow {
                    id: event.event_id,
                    session_id,
                    user_id,
                    timestamp,
                    session_start_time: chrono_to_offset(session.session_start_time),
                    session_end_time: opt_chrono_to_offset(session.session_end_time),
                    session_duration_seconds: session.session_duration_seconds.unwrap_or_default(),
                    pages_visited: session.pages_visited,
                    total_clicks: session.total_clicks,
                    total_scroll_events: session.total_scroll_events,
                    bounce_rate: session.bounce_rate.unwrap_or_default(),
                    is_active: u8::from(session.is_active),
                    exit_page: text(&session.exit_page),
                    referrer_source: text(&session.referrer_source),
                    user_agent,
                    ip_address,
                    device_type,
                    browser,
                    os,
                };
                self.write("session_data", &row).await
            }
        }
    }

    async fn page_visit_stats(&self, filter: &PageVisitFilter) -> Result<Vec<PageVisitStat>> {
        let mut sql = String::from(
            "SELECT path, count() AS visit_count, uniq(session_id) AS unique_sessions, \
             uniqIf(user_id, user_id != '') AS unique_users, \
             toFloat64(avg(duration_seconds)) AS avg_duration, device_type, browser, country \
             FROM page_visits WHERE 1 = 1",
        );
        if filter.start.is_some() {
            sql.push_str(" AND timestamp >= fromUnixTimestamp64Milli(?)");
        }
        if filter.end.is_some() {
            sql.push_str(" AND timestamp <= fromUnixTimestamp64Milli(?)");
        }
        if filter.path.is_some() {
            sql.push_str(" AND path = ?");
        }
        if filter.user_id.is_some() {
            sql.push_str(" AND user_id = ?");
        }
        sql.push_str(
            " GROUP BY path, device_type, browser, country \
             ORDER BY visit_count DESC, path LIMIT ? OFFSET ?",
        );

        let mut query = self.client.query(&sql);
        if let Some(start) = filter.start {
            query = query.bind(start.timestamp_millis());
        }
        if let Some(end) = filter.end {
            query = query.bind(end.timestamp_millis());
        }
        if let Some(path) = &filter.path {
            query = query.bind(path.as_str());
        }
        if let Some(user_id) = &filter.user_id {
            query = query.bind(user_id.as_str());
        }
        let rows = query
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all::<PageVisitStatRow>()
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| PageVisitStat {
                path: row.path,
                visit_count: row.visit_count,
                unique_sessions: row.unique_sessions,
                unique_users: row.unique_users,
                avg_duration: row.avg_duration,
                device_type: blank_to_none(row.device_type),
                browser: blank_to_none(row.browser),
                country: blank_to_none(row.country),
            })
            .collect())
    }

    async fn click_stats(&self, filter: &InteractionFilter) -> Result<Vec<ClickStat>> {
        let rows = self
            .client
            .query(CLICK_STATS)
            .bind(filter.window.start.timestamp_millis())
            .bind(filter.window.end.timestamp_millis())
            .bind(filter.limit)
            .fetch_all::<ClickStatRow>()
            .await?;

        rows.into_iter()
            .map(|row| {
                Ok(ClickStat {
                    date: day(&row.date)?,
                    element_type: row.element_type,
                    element_id: blank_to_none(row.element_id),
                    page_url: row.page_url,
                    click_count: row.click_count,
                    unique_sessions: row.unique_sessions,
                    unique_users: row.unique_users,
                    device_type: blank_to_none(row.device_type),
                    browser: blank_to_none(row.browser),
                })
            })
            .collect()
    }

    async fn scroll_stats(&self, filter: &InteractionFilter) -> Result<Vec<ScrollStat>> {
        let rows = self
            .client
            .query(SCROLL_STATS)
            .bind(filter.window.start.timestamp_millis())
            .bind(filter.window.end.timestamp_millis())
            .bind(filter.limit)
            .fetch_all::<ScrollStatRow>()
            .await?;

        rows.into_iter()
            .map(|row| {
                Ok(ScrollStat {
                    date: day(&row.date)?,
                    page_url: row.page_url,
                    scroll_depth_percent: row.scroll_depth_percent,
                    scroll_events: row.scroll_events,
                    unique_sessions: row.unique_sessions,
                    avg_page_height: row.avg_page_height,
                    device_type: blank_to_none(row.device_type),
                    browser: blank_to_none(row.browser),
                })
            })
            .collect()
    }

    async fn ping(&self) -> Result<()> {
        let _: u8 = self.client.query("SELECT toUInt8(1)").fetch_one().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_domain::EventKind;

    #[test]
    fn every_event_kind_has_a_table() {
        for kind in EventKind::ALL {
            assert!(
                TABLES.iter().any(|(table, _)| *table == kind.table()),
                "no table for {}",
                kind.as_str()
            );
        }
    }

    #[test]
    fn tables_partition_by_month_and_expire_after_a_year() {
        let sql = create_table_sql("page_visits", "id UUID");
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS page_visits (id UUID)"));
        assert!(sql.contains("PARTITION BY toYYYYMM(timestamp)"));
        assert!(sql.contains("INTERVAL 1 YEAR"));
    }

    #[test]
    fn stat_days_parse_from_clickhouse_dates() {
        assert_eq!(
            day("2024-05-01").expect("date"),
            NaiveDate::from_ymd_opt(2024, 5, 1).expect("valid")
        );
        assert!(day("").is_err());
    }

    #[test]
    fn blank_dimensions_read_back_as_none() {
        assert_eq!(blank_to_none(String::new()), None);
        assert_eq!(blank_to_none("mobile".to_string()), Some("mobile".to_string()));
    }
}
