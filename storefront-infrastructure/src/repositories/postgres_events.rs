use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use storefront_domain::ports::PrimaryEventStore;
use storefront_domain::{
    ClickStat, DeviceCount, EventKind, EventPayload, EventRecord, EventTotals, InteractionFilter,
    PageVisitFilter, PageVisitStat, PageVisitTotals, ScrollStat, TimeWindow, TopPage,
    TrackedEvent,
};

const SCHEMA: [&str; 14] = [
    "CREATE SCHEMA IF NOT EXISTS analytics",
    r#"
CREATE TABLE IF NOT EXISTS analytics.page_visits (
    id UUID PRIMARY KEY,
    session_id VARCHAR(255) NOT NULL,
    user_id VARCHAR(255),
    timestamp TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    url TEXT NOT NULL,
    path VARCHAR(500) NOT NULL,
    referrer TEXT,
    user_agent TEXT,
    ip_address VARCHAR(64),
    country VARCHAR(100),
    city VARCHAR(100),
    device_type VARCHAR(50),
    browser VARCHAR(100),
    os VARCHAR(100),
    screen_resolution VARCHAR(50),
    duration_seconds INTEGER NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS analytics.events (
    id UUID PRIMARY KEY,
    session_id VARCHAR(255) NOT NULL,
    user_id VARCHAR(255),
    timestamp TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    event_type VARCHAR(100) NOT NULL,
    event_name VARCHAR(200) NOT NULL,
    properties JSONB NOT NULL DEFAULT '{}'::jsonb,
    url TEXT,
    user_agent TEXT,
    ip_address VARCHAR(64),
    country VARCHAR(100),
    city VARCHAR(100),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS analytics.click_events (
    id UUID PRIMARY KEY,
    session_id VARCHAR(255) NOT NULL,
    user_id VARCHAR(255),
    timestamp TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    element_type VARCHAR(100) NOT NULL,
    element_id VARCHAR(255),
    element_class TEXT,
    element_text TEXT,
    page_url TEXT NOT NULL,
    x_coordinate DOUBLE PRECISION,
    y_coordinate DOUBLE PRECISION,
    timestamp_client TIMESTAMPTZ,
    user_agent TEXT,
    ip_address VARCHAR(64),
    device_type VARCHAR(50),
    browser VARCHAR(100),
    os VARCHAR(100),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS analytics.scroll_events (
    id UUID PRIMARY KEY,
    session_id VARCHAR(255) NOT NULL,
    user_id VARCHAR(255),
    timestamp TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    page_url TEXT NOT NULL,
    scroll_depth_percent DOUBLE PRECISION NOT NULL,
    max_scroll_depth_percent DOUBLE PRECISION,
    page_height INTEGER,
    viewport_height INTEGER,
    scroll_time_seconds INTEGER NOT NULL DEFAULT 0,
    timestamp_client TIMESTAMPTZ,
    user_agent TEXT,
    ip_address VARCHAR(64),
    device_type VARCHAR(50),
    browser VARCHAR(100),
    os VARCHAR(100),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS analytics.session_data (
    id UUID PRIMARY KEY,
    session_id VARCHAR(255) NOT NULL,
    user_id VARCHAR(255),
    timestamp TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    session_start_time TIMESTAMPTZ NOT NULL,
    session_end_time TIMESTAMPTZ,
    session_duration_seconds INTEGER,
    pages_visited INTEGER NOT NULL DEFAULT 0,
    total_clicks INTEGER NOT NULL DEFAULT 0,
    total_scroll_events INTEGER NOT NULL DEFAULT 0,
    bounce_rate DOUBLE PRECISION,
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    exit_page TEXT,
    referrer_source TEXT,
    user_agent TEXT,
    ip_address VARCHAR(64),
    device_type VARCHAR(50),
    browser VARCHAR(100),
    os VARCHAR(100),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#,
    "CREATE INDEX IF NOT EXISTS idx_page_visits_timestamp ON analytics.page_visits (timestamp DESC)",
    "CREATE INDEX IF NOT EXISTS idx_page_visits_session ON analytics.page_visits (session_id, timestamp DESC)",
    "CREATE INDEX IF NOT EXISTS idx_events_timestamp ON analytics.events (timestamp DESC)",
    "CREATE INDEX IF NOT EXISTS idx_events_type ON analytics.events (event_type, timestamp DESC)",
    "CREATE INDEX IF NOT EXISTS idx_click_events_session ON analytics.click_events (session_id, timestamp DESC)",
    "CREATE INDEX IF NOT EXISTS idx_scroll_events_session ON analytics.scroll_events (session_id, timestamp DESC)",
    "CREATE INDEX IF NOT EXISTS idx_session_data_session ON analytics.session_data (session_id)",
    "CREATE INDEX IF NOT EXISTS idx_session_data_start ON analytics.session_data (session_start_time DESC)",
];

#[derive(sqlx::FromRow)]
struct EventEnvelopeRow {
    id: Uuid,
    session_id: String,
    user_id: Option<String>,
    timestamp: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct PageVisitStatRow {
    path: String,
    visit_count: i64,
    unique_sessions: i64,
    unique_users: i64,
    avg_duration: f64,
    device_type: Option<String>,
    browser: Option<String>,
    country: Option<String>,
}

#[derive(sqlx::FromRow)]
struct PageVisitTotalsRow {
    total_visits: i64,
    unique_sessions: i64,
    unique_users: i64,
    avg_duration: Option<f64>,
}

#[derive(sqlx::FromRow)]
struct EventTotalsRow {
    total_events: i64,
    unique_event_types: i64,
}

#[derive(sqlx::FromRow)]
struct ClickStatRow {
    date: NaiveDate,
    element_type: String,
    element_id: Option<String>,
    page_url: String,
    click_count: i64,
    unique_sessions: i64,
    unique_users: i64,
    device_type: Option<String>,
    browser: Option<String>,
}

#[derive(sqlx::FromRow)]
struct ScrollStatRow {
    date: NaiveDate,
    page_url: String,
    scroll_depth_percent: f64,
    scroll_events: i64,
    unique_sessions: i64,
    avg_page_height: Option<f64>,
    device_type: Option<String>,
    browser: Option<String>,
}

const CLICK_STATS: &str = r#"
    SELECT
        (timestamp AT TIME ZONE 'UTC')::date AS date,
        element_type,
        element_id,
        page_url,
        COUNT(*) AS click_count,
        COUNT(DISTINCT session_id) AS unique_sessions,
        COUNT(DISTINCT user_id) AS unique_users,
        device_type,
        browser
    FROM analytics.click_events
    WHERE timestamp >= $1 AND timestamp <= $2
    GROUP BY 1, element_type, element_id, page_url, device_type, browser
    ORDER BY date DESC, click_count DESC
    LIMIT $3
"#;

const SCROLL_STATS: &str = r#"
    SELECT
        (timestamp AT TIME ZONE 'UTC')::date AS date,
        page_url,
        scroll_depth_percent,
        COUNT(*) AS scroll_events,
        COUNT(DISTINCT session_id) AS unique_sessions,
        AVG(page_height)::FLOAT8 AS avg_page_height,
        device_type,
        browser
    FROM analytics.scroll_events
    WHERE timestamp >= $1 AND timestamp <= $2
    GROUP BY 1, page_url, scroll_depth_percent, device_type, browser
    ORDER BY date DESC, scroll_depth_percent DESC
    LIMIT $3
"#;

fn count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

/// Relational event store: one table per event kind under the `analytics` schema.
#[derive(Clone)]
pub struct PostgresEventRepo {
    pool: PgPool,
}

impl PostgresEventRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PrimaryEventStore for PostgresEventRepo {
    async fn ensure_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn insert_event(&self, event: &TrackedEvent) -> Result<()> {
        match &event.payload {
            EventPayload::PageVisit(visit) => {
                sqlx::query(
                    r#"
                    INSERT INTO analytics.page_visits (
                        id, session_id, user_id, timestamp, url, path, referrer,
                        user_agent, ip_address, country, city, device_type, browser, os,
                        screen_resolution, duration_seconds
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
                    "#,
                )
                .bind(event.event_id)
                .bind(&event.session_id)
                .bind(&event.user_id)
                .bind(event.occurred_at)
                .bind(&visit.url)
                .bind(&visit.path)
                .bind(&visit.referrer)
                .bind(&event.user_agent)
                .bind(&event.ip_address)
                .bind(&visit.country)
                .bind(&visit.city)
                .bind(event.device_type())
                .bind(event.browser())
                .bind(event.os())
                .bind(&visit.screen_resolution)
                .bind(visit.duration_seconds)
                .execute(&self.pool)
                .await?;
            }
            EventPayload::Custom(custom) => {
                sqlx::query(
                    r#"
                    INSERT INTO analytics.events (
                        id, session_id, user_id, timestamp, event_type, event_name,
                        properties, url, user_agent, ip_address, country, city
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                    "#,
                )
                .bind(event.event_id)
                .bind(&event.session_id)
                .bind(&event.user_id)
                .bind(event.occurred_at)
                .bind(&custom.event_type)
                .bind(&custom.event_name)
                .bind(&custom.properties)
                .bind(&custom.url)
                .bind(&event.user_agent)
                .bind(&event.ip_address)
                .bind(&custom.country)
                .bind(&custom.city)
                .execute(&self.pool)
                .await?;
            }
            EventPayload::Click(click) => {
                sqlx::query(
                    r#"
                    INSERT INTO analytics.click_events (
                        id, session_id, user_id, timestamp, element_type, element_id,
                        element_class, element_text, page_url, x_coordinate, y_coordinate,
                        timestamp_client, user_agent, ip_address, device_type, browser, os
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
                    "#,
                )
                .bind(event.event_id)
                .bind(&event.session_id)
                .bind(&event.user_id)
                .bind(event.occurred_at)
                .bind(&click.element_type)
                .bind(&click.element_id)
                .bind(&click.element_class)
                .bind(&click.element_text)
                .bind(&click.page_url)
                .bind(click.x_coordinate)
                .bind(click.y_coordinate)
                .bind(click.timestamp_client)
                .bind(&event.user_agent)
                .bind(&event.ip_address)
                .bind(event.device_type())
                .bind(event.browser())
                .bind(event.os())
                .execute(&self.pool)
                .await?;
            }
            EventPayload::Scroll(scroll) => {
                sqlx::query(
                    r#"
                    INSERT INTO analytics.scroll_events (
                        id, session_id, user_id, timestamp, page_url, scroll_depth_percent,
                        max_scroll_depth_percent, page_height, viewport_height,
                        scroll_time_seconds, timestamp_client, user_agent, ip_address,
                        device_type, browser, os
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
                    "#,
                )
                .bind(event.event_id)
                .bind(&event.session_id)
                .bind(&event.user_id)
                .bind(event.occurred_at)
                .bind(&scroll.page_url)
                .bind(scroll.scroll_depth_percent)
                .bind(scroll.max_scroll_depth_percent)
                .bind(scroll.page_height)
                .bind(scroll.viewport_height)
                .bind(scroll.scroll_time_seconds)
                .bind(scroll.timestamp_client)
                .bind(&event.user_agent)
                .bind(&event.ip_address)
                .bind(event.device_type())
                .bind(event.browser())
                .bind(event.os())
                .execute(&self.pool)
                .await?;
            }
            EventPayload::Session(session) => {
                sqlx::query(
                    r#"
                    INSERT INTO analytics.session_data (
                        id, session_id, user_id, timestamp, session_start_time,
                        session_end_time, session_duration_seconds, pages_visited,
                        total_clicks, total_scroll_events, bounce_rate, is_active,
                        exit_page, referrer_source, user_agent, ip_address, device_type,
                        browser, os
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
                    "#,
                )
                .bind(event.event_id)
                .bind(&event.session_id)
                .bind(&event.user_id)
                .bind(event.occurred_at)
                .bind(session.session_start_time)
                .bind(session.session_end_time)
                .bind(session.session_duration_seconds)
                .bind(session.pages_visited)
                .bind(session.total_clicks)
                .bind(session.total_scroll_events)
                .bind(session.bounce_rate)
                .bind(session.is_active)
                .bind(&session.exit_page)
                .bind(&session.referrer_source)
                .bind(&event.user_agent)
                .bind(&event.ip_address)
                .bind(event.device_type())
                .bind(event.browser())
                .bind(event.os())
                .execute(&self.pool)
                .await?;
            }
        }
        Ok(())
    }

    async fn find_event(&self, kind: EventKind, event_id: Uuid) -> Result<Option<EventRecord>> {
        // table names come from the closed EventKind set, never from input
        let sql = format!(
            "SELECT id, session_id, user_id, timestamp FROM analytics.{} WHERE id = $1",
            kind.table()
        );
        let row: Option<EventEnvelopeRow> = sqlx::query_as(&sql)
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| EventRecord {
            event_id: row.id,
            kind,
            session_id: row.session_id,
            user_id: row.user_id,
            occurred_at: row.timestamp,
        }))
    }

    async fn page_visit_stats(&self, filter: &PageVisitFilter) -> Result<Vec<PageVisitStat>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"
            SELECT
                path,
                COUNT(*) AS visit_count,
                COUNT(DISTINCT session_id) AS unique_sessions,
                COUNT(DISTINCT user_id) AS unique_users,
                COALESCE(AVG(duration_seconds), 0)::FLOAT8 AS avg_duration,
                device_type,
                browser,
                country
            FROM analytics.page_visits
            WHERE TRUE
            "#,
        );
        if let Some(start) = filter.start {
            builder.push(" AND timestamp >= ").push_bind(start);
        }
        if let Some(end) = filter.end {
            builder.push(" AND timestamp <= ").push_bind(end);
        }
        if let Some(path) = &filter.path {
            builder.push(" AND path = ").push_bind(path.clone());
        }
        if let Some(user_id) = &filter.user_id {
            builder.push(" AND user_id = ").push_bind(user_id.clone());
        }
        builder
            .push(" GROUP BY path, device_type, browser, country ORDER BY visit_count DESC, path LIMIT ")
            .push_bind(filter.limit)
            .push(" OFFSET ")
            .push_bind(filter.offset);

        let rows: Vec<PageVisitStatRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .map(|row| PageVisitStat {
                path: row.path,
                visit_count: count(row.visit_count),
                unique_sessions: count(row.unique_sessions),
                unique_users: count(row.unique_users),
                avg_duration: row.avg_duration,
                device_type: row.device_type,
                browser: row.browser,
                country: row.country,
            })
            .collect())
    }

    async fn page_visit_totals(&self, window: &TimeWindow) -> Result<PageVisitTotals> {
        let row: PageVisitTotalsRow = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) AS total_visits,
                COUNT(DISTINCT session_id) AS unique_sessions,
                COUNT(DISTINCT user_id) AS unique_users,
                AVG(duration_seconds)::FLOAT8 AS avg_duration
            FROM analytics.page_visits
            WHERE timestamp >= $1 AND timestamp <= $2
            "#,
        )
        .bind(window.start)
        .bind(window.end)
        .fetch_one(&self.pool)
        .await?;
        Ok(PageVisitTotals {
            total_visits: count(row.total_visits),
            unique_sessions: count(row.unique_sessions),
            unique_users: count(row.unique_users),
            avg_duration: row.avg_duration,
        })
    }

    async fn event_totals(&self, window: &TimeWindow) -> Result<EventTotals> {
        let row: EventTotalsRow = sqlx::query_as(
            r#"
            SELECT COUNT(*) AS total_events, COUNT(DISTINCT event_type) AS unique_event_types
            FROM analytics.events
            WHERE timestamp >= $1 AND timestamp <= $2
            "#,
        )
        .bind(window.start)
        .bind(window.end)
        .fetch_one(&self.pool)
        .await?;
        Ok(EventTotals {
            total_events: count(row.total_events),
            unique_event_types: count(row.unique_event_types),
        })
    }

    async fn top_pages(&self, window: &TimeWindow, limit: i64) -> Result<Vec<TopPage>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT path, COUNT(*) AS visits
            FROM analytics.page_visits
            WHERE timestamp >= $1 AND timestamp <= $2
            GROUP BY path
            ORDER BY visits DESC, path
            LIMIT $3
            "#,
        )
        .bind(window.start)
        .bind(window.end)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(path, visits)| TopPage {
                path,
                visits: count(visits),
            })
            .collect())
    }

    async fn device_breakdown(&self, window: &TimeWindow) -> Result<Vec<DeviceCount>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT device_type, COUNT(*) AS count
            FROM analytics.page_visits
            WHERE timestamp >= $1 AND timestamp <= $2 AND device_type IS NOT NULL
            GROUP BY device_type
            ORDER BY count DESC, device_type
            "#,
        )
        .bind(window.start)
        .bind(window.end)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(device_type, total)| DeviceCount {
                device_type,
                count: count(total),
            })
            .collect())
    }

    async fn click_stats(&self, filter: &InteractionFilter) -> Result<Vec<ClickStat>> {
        let rows: Vec<ClickStatRow> = sqlx::query_as(CLICK_STATS)
            .bind(filter.window.start)
            .bind(filter.window.end)
            .bind(filter.limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| ClickStat {
                date: row.date,
                element_type: row.element_type,
                element_id: row.element_id,
                page_url: row.page_url,
                click_count: count(row.click_count),
                unique_sessions: count(row.unique_sessions),
                unique_users: count(row.unique_users),
                device_type: row.device_type,
                browser: row.browser,
            })
            .collect())
    }

    async fn scroll_stats(&self, filter: &InteractionFilter) -> Result<Vec<ScrollStat>> {
        let rows: Vec<ScrollStatRow> = sqlx::query_as(SCROLL_STATS)
            .bind(filter.window.start)
            .bind(filter.window.end)
            .bind(filter.limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| ScrollStat {
                date: row.date,
                page_url: row.page_url,
                scroll_depth_percent: row.scroll_depth_percent,
                scroll_events: count(row.scroll_events),
                unique_sessions: count(row.unique_sessions),
                avg_page_height: row.avg_page_height,
                device_type: row.device_type,
                browser: row.browser,
            })
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        let _: i32 = sqlx::query_scalar("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_event_table_is_created() {
        for kind in EventKind::ALL {
            let create = format!("CREATE TABLE IF NOT EXISTS analytics.{} (", kind.table());
            assert!(
                SCHEMA.iter().any(|statement| statement.contains(&create)),
                "missing table for {}",
                kind.as_str()
            );
        }
    }

    #[test]
    fn interaction_stats_bucket_by_utc_day() {
        for sql in [CLICK_STATS, SCROLL_STATS] {
            assert!(sql.contains("(timestamp AT TIME ZONE 'UTC')::date AS date"));
            assert!(sql.contains("ORDER BY date DESC"));
        }
    }

    #[test]
    fn negative_counts_clamp_to_zero() {
        assert_eq!(count(-1), 0);
        assert_eq!(count(42), 42);
    }
}
