//! Parsing of human-readable schedule times

use chrono::{DateTime, Duration, Utc};

use crate::error::{FanoutError, Result};

/// Parse a schedule string relative to `now`.
///
/// Supports:
/// - Relative durations: "30m", "2h", "1d", optionally prefixed with "in "
/// - RFC 3339 timestamps: "2026-11-20T15:00:00Z"
/// - Natural language: "tomorrow", "next monday 10am"
///
/// # Errors
///
/// Returns `InvalidInput` if the string is empty or matches none of the formats.
pub fn parse_schedule(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return Err(FanoutError::InvalidInput(
            "Schedule string cannot be empty".to_string(),
        ));
    }

    let relative = input.strip_prefix("in ").unwrap_or(input).trim();
    if let Ok(duration) = parse_duration(relative) {
        return Ok(now + duration);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    chrono_english::parse_date_string(input, now, chrono_english::Dialect::Us).map_err(|_| {
        FanoutError::InvalidInput(format!("Could not parse schedule string: {}", input))
    })
}

fn parse_duration(input: &str) -> Result<Duration> {
    let std_duration = humantime::parse_duration(input)
        .map_err(|e| FanoutError::InvalidInput(format!("Could not parse duration: {}", e)))?;
    let seconds = i64::try_from(std_duration.as_secs())
        .map_err(|_| FanoutError::InvalidInput("Duration out of range".to_string()))?;
    Duration::try_seconds(seconds)
        .ok_or_else(|| FanoutError::InvalidInput("Duration out of range".to_string()))
}
