//! Locale-aware event date display

use chrono::{DateTime, TimeZone};
use std::fmt::Display;

fn patterns(locale: &str) -> (&'static str, &'static str) {
    match locale {
        "ko" => ("%Y년 %-m월 %-d일 %H:%M", "%H:%M"),
        _ => ("%b %-d, %Y, %-I:%M %p", "%-I:%M %p"),
    }
}

/// Render an event's start and optional end for `locale`
///
/// An end on the same day only shows its time. Unknown locales use English.
pub fn format_event_range<Tz>(
    start: &DateTime<Tz>,
    end: Option<&DateTime<Tz>>,
    locale: &str,
) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let (full, time_only) = patterns(locale);
    let from = start.format(full).to_string();

    match end {
        None => from,
        Some(end) if end.date_naive() == start.date_naive() => {
            format!("{} - {}", from, end.format(time_only))
        }
        Some(end) => format!("{} - {}", from, end.format(full)),
    }
}
