use chrono::{NaiveTime, Timelike};

const MINUTES_PER_DAY: i64 = 24 * 60;

/// Parse a time string in HH:MM format
///
/// # Errors
///
/// Returns an error if the string cannot be parsed as a valid time in HH:MM format.
pub fn parse_time_hm(s: &str) -> Result<NaiveTime, chrono::ParseError> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
}

/// Convert an HH:MM schedule string to minutes since midnight
///
/// # Errors
///
/// Returns an error if the string is not a valid HH:MM time.
pub fn time_to_minutes(s: &str) -> Result<i64, chrono::ParseError> {
    let time = parse_time_hm(s)?;
    Ok(i64::from(time.hour()) * 60 + i64::from(time.minute()))
}

/// Format minutes since midnight as HH:MM, wrapping around the day in both directions
#[must_use]
pub fn minutes_to_time(minutes: i64) -> String {
    let wrapped = minutes.rem_euclid(MINUTES_PER_DAY);
    format!("{:02}:{:02}", wrapped / 60, wrapped % 60)
}

/// Scheduled arrival plus accumulated delay, in minutes since midnight.
///
/// Not wrapped at midnight so that ordering across the day boundary is preserved.
///
/// # Errors
///
/// Returns an error if `arrival_time` is not a valid HH:MM time.
pub fn effective_arrival(arrival_time: &str, delay: i64) -> Result<i64, chrono::ParseError> {
    Ok(time_to_minutes(arrival_time)? + delay)
}
