use chrono::{DateTime, Utc};
use time::OffsetDateTime;

pub fn millis_to_utc(ms: i64) -> OffsetDateTime {
    let nanos = i128::from(ms).saturating_mul(1_000_000);
    OffsetDateTime::from_unix_timestamp_nanos(nanos).unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

pub fn chrono_to_offset(at: DateTime<Utc>) -> OffsetDateTime {
    millis_to_utc(at.timestamp_millis())
}

/// Absent times become the epoch.
pub fn opt_chrono_to_offset(at: Option<DateTime<Utc>>) -> OffsetDateTime {
    at.map(chrono_to_offset).unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn conversion_keeps_millisecond_precision() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let converted = chrono_to_offset(at);
        assert_eq!(converted.unix_timestamp(), 1_700_000_000);
        assert_eq!(converted.millisecond(), 123);
    }

    #[test]
    fn missing_time_is_epoch() {
        assert_eq!(opt_chrono_to_offset(None), OffsetDateTime::UNIX_EPOCH);
    }
}
