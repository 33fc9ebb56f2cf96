use chrono::{Duration, NaiveTime};
use std::cmp::Ordering;

/// Start time offered for a fresh event
pub const DEFAULT_START_TIME: &str = "09:00 AM";
/// End time offered for a fresh event
pub const DEFAULT_END_TIME: &str = "10:00 AM";

/// Display format used by the time pickers
const SLOT_FORMAT: &str = "%I:%M %p";

/// Parse a wall-clock time in either "hh:mm AM/PM" or 24h "HH:MM" form
pub fn parse_time(time_str: &str) -> Option<NaiveTime> {
    let normalized = time_str.trim().to_ascii_uppercase();
    if normalized.is_empty() {
        return None;
    }

    if normalized.ends_with("AM") || normalized.ends_with("PM") {
        // Tolerate "9:00AM" as well as "9:00 AM"
        let (clock, meridiem) = normalized.split_at(normalized.len() - 2);
        let candidate = format!("{} {}", clock.trim_end(), meridiem);
        return NaiveTime::parse_from_str(&candidate, "%I:%M %p").ok();
    }

    NaiveTime::parse_from_str(&normalized, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(&normalized, "%H:%M:%S"))
        .ok()
}

/// Order two wall-clock strings for display within a single day.
///
/// Parsable times compare chronologically. Strings that do not parse sort
/// after the parsable ones and compare lexicographically among themselves.
pub fn compare_times(a: &str, b: &str) -> Ordering {
    match (parse_time(a), parse_time(b)) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// Format a time the way the pickers show it ("02:30 PM")
pub fn format_time(time: NaiveTime) -> String {
    time.format(SLOT_FORMAT).to_string()
}

/// End time suggested for a start time: one hour later, wrapping at midnight
pub fn default_end_time(start: &str) -> Option<String> {
    let start = parse_time(start)?;
    let (end, _) = start.overflowing_add_signed(Duration::minutes(60));
    Some(format_time(end))
}

/// Duration between two wall-clock times on the same day
pub fn duration_between(start: &str, end: &str) -> Option<Duration> {
    let start = parse_time(start)?;
    let end = parse_time(end)?;
    Some(end.signed_duration_since(start))
}

/// Human readable duration, e.g. "1 hour 30 minutes".
///
/// Zero or negative durations render as an empty string.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.num_minutes();
    if total <= 0 {
        return String::new();
    }

    let hours = total / 60;
    let minutes = total % 60;

    let mut parts = Vec::new();
    if hours > 0 {
        parts.push(format!("{} hour{}", hours, if hours > 1 { "s" } else { "" }));
    }
    if minutes > 0 {
        parts.push(format!("{} minute{}", minutes, if minutes > 1 { "s" } else { "" }));
    }
    parts.join(" ")
}

/// All picker slots of a day, `step_minutes` apart, starting at midnight
pub fn time_slots(step_minutes: u32) -> Vec<String> {
    if step_minutes == 0 || step_minutes > 24 * 60 {
        return Vec::new();
    }

    (0..24 * 60)
        .step_by(step_minutes as usize)
        .filter_map(|minute_of_day: u32| {
            NaiveTime::from_hms_opt(minute_of_day / 60, minute_of_day % 60, 0)
        })
        .map(format_time)
        .collect()
}
