//! Wall-clock helpers shared by the schedule and appointment cells.
//!
//! Slot times travel as `HH:MM` strings. Older schedule rows may hold 12-hour
//! values such as `9:30 AM`; [`to_24_hour`] is the single place that converts them.

use std::sync::LazyLock;

use chrono::{NaiveTime, Timelike};
use regex::Regex;
use thiserror::Error;

static HH_MM_24: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([01]\d|2[0-3]):([0-5]\d)$").expect("valid 24h pattern"));

static H_MM_12: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(0?[1-9]|1[0-2])(?::([0-5]\d))?\s*([AP])\.?M\.?$").expect("valid 12h pattern")
});

static H_MM_LOOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2}):([0-5]\d)(?::[0-5]\d)?$").expect("valid loose pattern"));

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimeFormatError {
    #[error("'{0}' is not a valid time (expected HH:MM)")]
    InvalidFormat(String),

    #[error("'{0}' is outside 00:00-23:59")]
    OutOfRange(String),
}

/// Strict `HH:MM` 24-hour check, the only format accepted from callers.
pub fn is_valid_24_hour(value: &str) -> bool {
    HH_MM_24.is_match(value)
}

/// Normalise `HH:MM`, `H:MM`, `HH:MM:SS` or `h[:MM] AM/PM` into `HH:MM`.
pub fn to_24_hour(value: &str) -> Result<String, TimeFormatError> {
    let trimmed = value.trim();

    if let Some(caps) = H_MM_12.captures(trimmed) {
        let hour: u32 = caps[1].parse().map_err(|_| TimeFormatError::InvalidFormat(value.to_string()))?;
        let minute: u32 = caps.get(2).map_or(Ok(0), |m| m.as_str().parse())
            .map_err(|_| TimeFormatError::InvalidFormat(value.to_string()))?;
        let is_pm = caps[3].eq_ignore_ascii_case("p");

        let hour = match (hour, is_pm) {
            (12, false) => 0,
            (12, true) => 12,
            (h, true) => h + 12,
            (h, false) => h,
        };
        return Ok(format!("{:02}:{:02}", hour, minute));
    }

    if let Some(caps) = H_MM_LOOSE.captures(trimmed) {
        let hour: u32 = caps[1].parse().map_err(|_| TimeFormatError::InvalidFormat(value.to_string()))?;
        let minute: u32 = caps[2].parse().map_err(|_| TimeFormatError::InvalidFormat(value.to_string()))?;
        if hour > 23 {
            return Err(TimeFormatError::OutOfRange(value.to_string()));
        }
        return Ok(format!("{:02}:{:02}", hour, minute));
    }

    Err(TimeFormatError::InvalidFormat(value.to_string()))
}

/// `13:05` -> `1:05 PM`. Used for human-facing notification text.
pub fn to_12_hour(value: &str) -> Result<String, TimeFormatError> {
    let normalized = to_24_hour(value)?;
    let time = parse_time(&normalized)?;
    let (is_pm, hour) = time.hour12();
    Ok(format!("{}:{:02} {}", hour, time.minute(), if is_pm { "PM" } else { "AM" }))
}

/// Minutes since midnight for any format [`to_24_hour`] accepts.
pub fn minutes_since_midnight(value: &str) -> Result<u32, TimeFormatError> {
    let time = parse_time(&to_24_hour(value)?)?;
    Ok(time.hour() * 60 + time.minute())
}

pub fn parse_time(value: &str) -> Result<NaiveTime, TimeFormatError> {
    let normalized = to_24_hour(value)?;
    NaiveTime::parse_from_str(&normalized, "%H:%M")
        .map_err(|_| TimeFormatError::InvalidFormat(value.to_string()))
}

/// Span between two wall-clock times in minutes; zero or negative when `end <= start`.
pub fn span_minutes(start: &str, end: &str) -> Result<i64, TimeFormatError> {
    Ok(minutes_since_midnight(end)? as i64 - minutes_since_midnight(start)? as i64)
}
