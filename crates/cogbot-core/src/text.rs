//! Small text helpers shared by command output.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

const STAMP_FORMAT: &str = "%d-%b-%Y | %H:%M:%S";

const DATETIME_FORMATS: &[&str] = &[
    STAMP_FORMAT,
    "%d-%m-%Y %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%d.%m.%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%d/%m/%Y %H:%M",
    "%d.%m.%Y %H:%M",
    "%d %B %Y %H:%M",
    "%d %b %Y %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

const DATE_FORMATS: &[&str] = &[
    "%d-%m-%Y",
    "%d/%m/%Y",
    "%d.%m.%Y",
    "%d %B %Y",
    "%d %b %Y",
    "%d-%b-%Y",
    "%Y-%m-%d",
];

/// Regional-indicator emoji for an ASCII letter (`'a'` → 🇦).
pub fn letter_emoji(c: char) -> Option<char> {
    if !c.is_ascii_alphabetic() {
        return None;
    }
    char::from_u32(c.to_ascii_uppercase() as u32 + 0x1F1A5)
}

/// Prefix every line with `> `.
pub fn quote(s: &str) -> String {
    s.split('\n')
        .map(|line| format!("> {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Cut `s` to at most `max_chars` characters.
pub fn trim(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// `"dd-Mon-YYYY | HH:MM:SS"` (UTC) for a unix timestamp.
pub fn stamp_to_str(timestamp: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp(timestamp, 0).map(|dt| dt.format(STAMP_FORMAT).to_string())
}

/// Parse a day-first date (optionally with a time) into a unix timestamp, as UTC.
///
/// The parts are joined with spaces first, so `["12/03/2024", "10:00"]` works.
pub fn str_to_stamp(parts: &[&str]) -> Option<i64> {
    let joined = parts.join(" ");
    let input = joined.trim();

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(input, fmt) {
            return Some(dt.and_utc().timestamp());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(input, fmt) {
            return d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().timestamp());
        }
    }
    None
}
