//! All persisted timestamps are Unix milliseconds taken from `chrono::Utc`.

/// Returns the current Unix timestamp in milliseconds.
pub fn now_timestamp_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Formats a Unix millisecond timestamp as RFC 3339 for display.
///
/// Out-of-range values render as the raw number.
pub fn format_millis(millis: i64) -> String {
    match chrono::DateTime::from_timestamp_millis(millis) {
        Some(dt) => dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        None => millis.to_string(),
    }
}
