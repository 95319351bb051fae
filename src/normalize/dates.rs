use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

const NAIVE_DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%m/%d/%Y %H:%M:%S"];
const NAIVE_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y", "%B %d, %Y", "%b %d, %Y", "%Y/%m/%d"];

fn midnight_utc(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0).map(|dt| Utc.from_utc_datetime(&dt))
}

/// Parse the date shapes the feeds and the store produce.
///
/// Accepts 8-digit `YYYYMMDD`, RFC 3339, RFC 2822, ISO dates with or without
/// time, and `MM/DD/YYYY` (optionally followed by a time of day). Date-only
/// values land on midnight UTC.
pub fn parse_recall_date(input: &str) -> Option<DateTime<Utc>> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }

    if s.len() == 8 && s.chars().all(|c| c.is_ascii_digit()) {
        return NaiveDate::parse_from_str(s, "%Y%m%d").ok().and_then(midnight_utc);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&dt));
        }
    }
    for fmt in NAIVE_DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return midnight_utc(d);
        }
    }

    // "09/20/2025 10:15 AM" and similar: the leading date is enough
    let head = s.split_whitespace().next().unwrap_or(s);
    if head != s {
        return parse_recall_date(head);
    }
    None
}

/// Strings, 8-digit numbers and epoch milliseconds
pub fn parse_date_value(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_recall_date(s),
        Value::Number(n) => {
            let i = n.as_i64()?;
            if (10_000_000..=99_999_999).contains(&i) {
                parse_recall_date(&i.to_string())
            } else if i > 100_000_000_000 {
                Utc.timestamp_millis_opt(i).single()
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Parse or fall back to the current instant
pub fn parse_or_now(input: Option<&str>) -> DateTime<Utc> {
    input.and_then(parse_recall_date).unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use serde_json::json;

    fn ymd(dt: DateTime<Utc>) -> (i32, u32, u32) {
        (dt.year(), dt.month(), dt.day())
    }

    #[test]
    fn test_compact_dates() {
        assert_eq!(ymd(parse_recall_date("20250920").unwrap()), (2025, 9, 20));
        assert!(parse_recall_date("20251340").is_none());
    }

    #[test]
    fn test_iso_and_us_dates() {
        assert_eq!(ymd(parse_recall_date("2025-09-20T14:30:00Z").unwrap()), (2025, 9, 20));
        assert_eq!(ymd(parse_recall_date("2025-09-20T14:30:00.000").unwrap()), (2025, 9, 20));
        assert_eq!(ymd(parse_recall_date("2025-09-20").unwrap()), (2025, 9, 20));
        assert_eq!(ymd(parse_recall_date("09/20/2025").unwrap()), (2025, 9, 20));
        assert_eq!(ymd(parse_recall_date("9/20/2025 10:15 AM").unwrap()), (2025, 9, 20));
        assert_eq!(ymd(parse_recall_date("September 20, 2025").unwrap()), (2025, 9, 20));
        assert_eq!(ymd(parse_recall_date("Sat, 20 Sep 2025 10:00:00 +0000").unwrap()), (2025, 9, 20));
    }

    #[test]
    fn test_garbage_dates() {
        assert!(parse_recall_date("not-a-date").is_none());
        assert!(parse_recall_date("").is_none());
    }

    #[test]
    fn test_numeric_values() {
        assert_eq!(ymd(parse_date_value(&json!(20250920)).unwrap()), (2025, 9, 20));
        assert_eq!(ymd(parse_date_value(&json!(1758326400000i64)).unwrap()), (2025, 9, 20));
        assert!(parse_date_value(&json!(42)).is_none());
        assert!(parse_date_value(&json!(null)).is_none());
    }

    #[test]
    fn test_parse_or_now_falls_back() {
        let before = Utc::now();
        let dt = parse_or_now(Some("garbage"));
        assert!(dt >= before);
        assert_eq!(ymd(parse_or_now(Some("20250101"))), (2025, 1, 1));
    }
}
