use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};

pub fn parse_date(date: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|err| anyhow!(err))
}

/// Parses a query-string time bound. Accepts RFC 3339 or a bare `YYYY-MM-DD`;
/// a bare date expands to the start of the day, or its last millisecond when
/// `end_of_day` is set.
pub fn parse_time_bound(value: &str, end_of_day: bool) -> Result<DateTime<Utc>> {
    let trimmed = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }
    let date = parse_date(trimmed).map_err(|_| anyhow!("invalid date '{}'", trimmed))?;
    let time = if end_of_day {
        NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)
    }
    .ok_or_else(|| anyhow!("invalid time of day"))?;
    Ok(Utc.from_utc_datetime(&date.and_time(time)))
}

pub fn millis_to_datetime(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(ms)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TextOrNumber {
    Text(String),
    Integer(i64),
    Float(f64),
}

/// Identifiers sent by browsers are sometimes numbers; store them as text.
pub fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<TextOrNumber>::deserialize(deserializer)?;
    Ok(value.map(|value| match value {
        TextOrNumber::Text(text) => text,
        TextOrNumber::Integer(number) => number.to_string(),
        TextOrNumber::Float(number) => number.to_string(),
    }))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ClientTimestamp {
    Millis(i64),
    Text(String),
}

/// Client clocks arrive either as epoch milliseconds or as RFC 3339 text.
pub fn opt_client_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<ClientTimestamp>::deserialize(deserializer)?;
    match value {
        None => Ok(None),
        Some(ClientTimestamp::Millis(ms)) => millis_to_datetime(ms)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("timestamp out of range: {}", ms))),
        Some(ClientTimestamp::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(ClientTimestamp::Text(text)) => parse_time_bound(&text, false)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}
