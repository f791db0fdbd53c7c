//! Duration rendering in the backend's `d.hh:mm:ss.fffffff` convention.

use std::time::Duration;

/// Number of 100 ns ticks per second; the schema's fractional part is ticks.
const TICKS_PER_SECOND: u64 = 10_000_000;

/// Format an elapsed time for the `duration` field of request and
/// dependency payloads.
///
/// Sub-second precision is seven digits (100 ns ticks). The day component
/// is omitted when zero: `00:00:01.5000000`, `2.03:04:05.0000000`.
pub fn format_duration(duration: Duration) -> String {
    let ticks = duration.as_secs() * TICKS_PER_SECOND + u64::from(duration.subsec_nanos()) / 100;
    let fraction = ticks % TICKS_PER_SECOND;
    let total_seconds = ticks / TICKS_PER_SECOND;

    let seconds = total_seconds % 60;
    let minutes = (total_seconds / 60) % 60;
    let hours = (total_seconds / 3600) % 24;
    let days = total_seconds / 86_400;

    if days > 0 {
        format!("{days}.{hours:02}:{minutes:02}:{seconds:02}.{fraction:07}")
    } else {
        format!("{hours:02}:{minutes:02}:{seconds:02}.{fraction:07}")
    }
}
