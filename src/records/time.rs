//! Timestamp parsing. Zoned inputs are converted to UTC, naive inputs are taken as UTC.
//! Sub-second precision is dropped.

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parse and drop sub-second precision.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    parse_instant(raw).map(|t| t.trunc_subsecs(0))
}

/// Parse at full precision.
pub(crate) fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // "2023-01-17 08:00:00+00:00" as written by pandas
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
        .map(|naive| naive.and_utc())
}

/// Seconds from `from` to `to`, sub-second part kept.
pub(crate) fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let d = to - from;
    d.num_microseconds().map_or(d.num_seconds() as f64, |us| us as f64 / 1e6)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn instant_keeps_fraction() {
        let a = parse_instant("2023-01-17 08:09:30").unwrap();
        let b = parse_instant("2023-01-17 08:10:00.5").unwrap();
        assert_eq!(seconds_between(a, b), 30.5);
        assert_eq!(parse_timestamp("2023-01-17 08:10:00.5"), Some(b.trunc_subsecs(0)));
    }

    #[test]
    fn zoned_and_naive_agree_in_utc() {
        let expected = Utc.with_ymd_and_hms(2023, 1, 17, 13, 5, 0).unwrap();
        assert_eq!(parse_timestamp("2023-01-17T08:05:00-05:00"), Some(expected));
        assert_eq!(parse_timestamp("2023-01-17 08:05:00-05:00"), Some(expected));
        assert_eq!(parse_timestamp("2023-01-17 13:05:00"), Some(expected));
        assert_eq!(parse_timestamp("2023-01-17T13:05:00.734"), Some(expected));
    }

    #[test]
    fn garbage_is_rejected() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("yesterday"), None);
    }
}
