//! Schedule time parsing
//!
//! Parses the human-readable `--publish-at` argument into a concrete UTC
//! timestamp for the scheduled-post queue.

use chrono::{DateTime, Duration, Utc};

use crate::error::{CrosscastError, Result};

/// Parse a schedule string into a DateTime
///
/// Supports multiple formats:
/// - "now" for immediate publication
/// - Relative durations: "1h", "30m", "2d", "90 minutes"
/// - Natural language: "tomorrow", "next friday 10am"
/// - Absolute times: "2026-09-01 15:00"
///
/// # Errors
///
/// Returns an error if the time format is invalid or cannot be parsed.
pub fn parse_schedule(input: &str) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CrosscastError::InvalidInput(
            "Schedule string cannot be empty".to_string(),
        ));
    }

    if input.eq_ignore_ascii_case("now") {
        return Ok(Utc::now());
    }

    // Try duration parsing first ("30m" is a duration, not a date)
    if let Ok(duration) = parse_duration(input) {
        return Ok(Utc::now() + duration);
    }

    // Fall back to natural language / absolute times
    if let Ok(dt) = parse_natural_language(input) {
        return Ok(dt);
    }

    Err(CrosscastError::InvalidInput(format!(
        "Could not parse schedule string: {}",
        input
    )))
}

fn parse_duration(input: &str) -> Result<Duration> {
    if let Ok(std_duration) = humantime::parse_duration(input) {
        let seconds = std_duration.as_secs() as i64;
        return Duration::try_seconds(seconds)
            .ok_or_else(|| CrosscastError::InvalidInput("Duration out of range".to_string()));
    }

    Err(CrosscastError::InvalidInput(format!(
        "Could not parse duration: {}",
        input
    )))
}

fn parse_natural_language(input: &str) -> Result<DateTime<Utc>> {
    chrono_english::parse_date_string(input, Utc::now(), chrono_english::Dialect::Us)
        .map_err(|e| CrosscastError::InvalidInput(format!("Could not parse time: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_now() {
        let result = parse_schedule("now").unwrap();
        let diff = (result - Utc::now()).num_seconds().abs();
        assert!(diff <= 2, "Expected ~now, got {}s away", diff);
    }

    #[test]
    fn test_parse_duration_minutes() {
        let scheduled_time = parse_schedule("30m").unwrap();
        let diff = (scheduled_time - Utc::now()).num_minutes();
        assert!(
            (29..=31).contains(&diff),
            "Expected ~30 minutes, got {}",
            diff
        );
    }

    #[test]
    fn test_parse_duration_hours() {
        let scheduled_time = parse_schedule("2h").unwrap();
        let diff = (scheduled_time - Utc::now()).num_minutes();
        assert!(
            (119..=121).contains(&diff),
            "Expected ~120 minutes, got {}",
            diff
        );
    }

    #[test]
    fn test_parse_duration_with_space() {
        let scheduled_time = parse_schedule("1 hour").unwrap();
        let diff = (scheduled_time - Utc::now()).num_minutes();
        assert!(
            (59..=61).contains(&diff),
            "Expected ~60 minutes, got {}",
            diff
        );
    }

    #[test]
    fn test_parse_tomorrow() {
        let scheduled_time = parse_schedule("tomorrow").unwrap();
        let diff = (scheduled_time - Utc::now()).num_hours();
        assert!(
            (20..=28).contains(&diff),
            "Expected ~24 hours, got {}",
            diff
        );
    }

    #[test]
    fn test_parse_empty_string() {
        assert!(parse_schedule("").is_err());
        assert!(parse_schedule("   ").is_err());
    }

    #[test]
    fn test_parse_invalid_format() {
        let result = parse_schedule("not a time");
        assert!(result.is_err());
    }
}
