// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timestamp formatting for machine and human records.
//!
//! Machine records (registry rows, result files, caches) use UTC ISO-8601
//! with second precision: `YYYY-MM-DDTHH:MM:SSZ`. The progress log uses
//! local time `YYYY-MM-DD HH:MM:SS`.

use chrono::{DateTime, Local, TimeZone, Utc};

/// Format epoch milliseconds as `YYYY-MM-DDTHH:MM:SSZ` (UTC, second precision).
pub fn format_utc(epoch_ms: u64) -> String {
    let dt = Utc
        .timestamp_millis_opt(epoch_ms as i64)
        .single()
        .unwrap_or_default();
    dt.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Format epoch milliseconds as local `YYYY-MM-DD HH:MM:SS` for the progress log.
pub fn format_local(epoch_ms: u64) -> String {
    let utc = Utc
        .timestamp_millis_opt(epoch_ms as i64)
        .single()
        .unwrap_or_default();
    let local: DateTime<Local> = utc.with_timezone(&Local);
    local.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Parse a `YYYY-MM-DDTHH:MM:SSZ` timestamp back to epoch milliseconds.
///
/// Returns `None` for malformed input; callers treat unparseable stamps
/// as "very old" or "absent" rather than failing.
pub fn parse_utc(ts: &str) -> Option<u64> {
    DateTime::parse_from_rfc3339(ts)
        .ok()
        .map(|dt| dt.timestamp_millis().max(0) as u64)
}

#[cfg(test)]
#[path = "time_fmt_tests.rs"]
mod tests;
