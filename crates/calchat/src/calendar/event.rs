//! Extracted event record and date/time normalization.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Applied when the utterance carries no usable time.
pub const DEFAULT_TIME: &str = "0900";

/// Two-digit years are resolved into this century.
const CENTURY_PREFIX: &str = "20";

fn default_time() -> String {
    DEFAULT_TIME.to_string()
}

/// Structured record produced by the extraction pipeline. Transient:
/// held in the session's pending slot until confirmed, denied, or
/// displaced by the next utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEvent {
    pub title: String,
    /// Six digits (YYMMDD) or eight digits (YYYYMMDD).
    pub date: String,
    /// Four digits, HHMM, 24-hour.
    #[serde(default = "default_time")]
    pub time: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Normalize a date to eight digits: six-digit input gains the fixed
/// century prefix, eight-digit input passes through, everything else is
/// refused.
pub fn normalize_date(raw: &str) -> Option<String> {
    if !raw.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    match raw.len() {
        6 => Some(format!("{CENTURY_PREFIX}{raw}")),
        8 => Some(raw.to_string()),
        _ => None,
    }
}

/// Normalize a clock time to `HH:MM:SS`. Anything that is not exactly
/// four digits falls back to the default start of day.
pub fn normalize_time(raw: &str) -> String {
    if raw.len() == 4 && raw.chars().all(|c| c.is_ascii_digit()) {
        format!("{}:{}:00", &raw[..2], &raw[2..])
    } else {
        format!("{}:{}:00", &DEFAULT_TIME[..2], &DEFAULT_TIME[2..])
    }
}

/// Compute the event window: start at the normalized date/time, end one
/// hour later. The end rolls over past midnight onto the next calendar
/// date. Returns `None` when the normalized parts do not name a real
/// calendar instant (month 13, hour 25, and the like).
pub fn event_window(date8: &str, time: &str) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let date = NaiveDate::parse_from_str(date8, "%Y%m%d").ok()?;
    let clock = NaiveTime::parse_from_str(time, "%H:%M:%S").ok()?;
    let start = date.and_time(clock);
    let end = start + Duration::hours(1);
    Some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn six_digit_dates_gain_the_century_prefix() {
        assert_eq!(normalize_date("250217").as_deref(), Some("20250217"));
    }

    #[test]
    fn eight_digit_dates_pass_through() {
        assert_eq!(normalize_date("20250217").as_deref(), Some("20250217"));
    }

    #[test]
    fn other_lengths_and_non_digits_are_refused() {
        assert!(normalize_date("2502").is_none());
        assert!(normalize_date("202502171").is_none());
        assert!(normalize_date("2025021a").is_none());
        assert!(normalize_date("").is_none());
    }

    #[test]
    fn four_digit_times_are_formatted() {
        assert_eq!(normalize_time("1400"), "14:00:00");
        assert_eq!(normalize_time("0905"), "09:05:00");
    }

    #[test]
    fn odd_times_fall_back_to_default() {
        assert_eq!(normalize_time(""), "09:00:00");
        assert_eq!(normalize_time("930"), "09:00:00");
        assert_eq!(normalize_time("14h00"), "09:00:00");
    }

    #[test]
    fn window_is_one_hour() {
        let (start, end) = event_window("20250219", "14:00:00").expect("window");
        assert_eq!(start.format("%Y-%m-%dT%H:%M:%S").to_string(), "2025-02-19T14:00:00");
        assert_eq!(end.format("%Y-%m-%dT%H:%M:%S").to_string(), "2025-02-19T15:00:00");
    }

    #[test]
    fn end_rolls_over_past_midnight() {
        let (start, end) = event_window("20250217", "23:30:00").expect("window");
        assert_eq!(start.format("%Y-%m-%d").to_string(), "2025-02-17");
        assert_eq!(end.format("%Y-%m-%dT%H:%M:%S").to_string(), "2025-02-18T00:30:00");
    }

    #[test]
    fn impossible_dates_are_refused() {
        assert!(event_window("20251317", "09:00:00").is_none());
        assert!(event_window("20250230", "09:00:00").is_none());
    }

    #[test]
    fn missing_time_field_defaults_during_deserialization() {
        let event: ExtractedEvent = serde_json::from_str(
            r#"{"title": "meet Jiwoo", "date": "250219", "location": "cafe"}"#,
        )
        .expect("valid event");
        assert_eq!(event.time, DEFAULT_TIME);
        assert_eq!(event.location.as_deref(), Some("cafe"));
        assert!(event.description.is_none());
    }
}
