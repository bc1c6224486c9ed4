//! Tolerant parsing of publication dates as job boards render them.
//!
//! Handles RFC 3339 timestamps, naive date-times, plain dates, unix
//! seconds, and relative phrases in English and German ("3 days ago",
//! "vor 2 Wochen", "heute").

use std::sync::OnceLock;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;

fn relative_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(
                r"(?ix)
                ^(?:vor\s+)?(?P<n>\d+)\s*
                (?P<unit>minuten|minute|minutes|min|stunden|stunde|hours|hour|h|tagen|tage|tag|days|day|d|wochen|woche|weeks|week|w|monaten|monat|months|month)
                (?:\s+ago)?$",
            )
            .ok()
        })
        .as_ref()
}

/// Parse a posted-date string relative to `now`.
///
/// Returns `None` for anything unrecognized; callers fall back to the
/// scrape time.
pub fn parse_posted_date(value: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    for format in ["%Y-%m-%d", "%d.%m.%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return date.and_hms_opt(0, 0, 0).map(|naive| Utc.from_utc_datetime(&naive));
        }
    }

    if value.chars().all(|c| c.is_ascii_digit()) {
        return value
            .parse::<i64>()
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0));
    }

    parse_relative(value, now)
}

fn parse_relative(value: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let lower = value.to_lowercase();
    match lower.as_str() {
        "heute" | "today" | "just now" | "gerade eben" => return Some(now),
        "gestern" | "yesterday" => return Some(now - Duration::days(1)),
        _ => {}
    }

    let caps = relative_pattern()?.captures(&lower)?;
    let n: i64 = caps.name("n")?.as_str().parse().ok()?;
    let unit = caps.name("unit")?.as_str();

    let delta = if unit.starts_with("min") {
        Duration::minutes(n)
    } else if unit.starts_with("stund") || unit.starts_with('h') {
        Duration::hours(n)
    } else if unit.starts_with("tag") || unit.starts_with('d') {
        Duration::days(n)
    } else if unit.starts_with("woch") || unit.starts_with('w') {
        Duration::weeks(n)
    } else {
        Duration::days(n * 30)
    };

    now.checked_sub_signed(delta)
}
