use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

use super::ParseError;
use crate::config::LogRecord;

// ASCII classes only: `\d`, `\w` and `\s` must not widen to Unicode.
// The message stops at any line terminator, not just `\n`.
const LOG_PATTERN: &str = concat!(
    r"^(?P<timestamp>[0-9]{4}-[0-9]{2}-[0-9]{2} [0-9]{2}:[0-9]{2}:[0-9]{2})?(?-u:\s)*",
    r"(?P<level>[A-Z]+)?(?-u:\s)*",
    r"(?P<kv>(?:(?-u:\w)+=[^\t\n\x0B\x0C\r ]+(?-u:\s)*)*)",
    r"(?P<message>[^\n\r\x{85}\x{2028}\x{2029}]*)$",
);

// (offset, separator) pairs of `YYYY-MM-DD HH:MM:SS`
const TIMESTAMP_SEPARATORS: [(usize, u8); 5] =
    [(4, b'-'), (7, b'-'), (10, b' '), (13, b':'), (16, b':')];

static LOG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(LOG_PATTERN).expect("log pattern is a valid regex"));

/// Parse one raw line.
///
/// Lines that do not fit the pattern at all come back as a fallback record
/// holding the untouched line. Only a captured field that cannot be
/// converted (month 13, say) is an error.
pub fn parse_line(line: &str) -> Result<LogRecord, ParseError> {
    let Some(caps) = LOG_RE.captures(line) else {
        return Ok(LogRecord::fallback(line));
    };

    let timestamp = caps
        .name("timestamp")
        .map(|m| trim_control(m.as_str()))
        .filter(|ts| !ts.is_empty())
        .map(parse_timestamp)
        .transpose()?;

    let level = caps.name("level").map(|m| m.as_str().to_string());
    let kv = caps
        .name("kv")
        .map(|m| trim_control(m.as_str()).to_string());
    let message = caps
        .name("message")
        .map(|m| trim_control(m.as_str()))
        .unwrap_or_default()
        .to_string();

    Ok(LogRecord::new(timestamp, level, kv, message))
}

/// Resolve `YYYY-MM-DD HH:MM:SS` leniently where the calendar allows it.
///
/// Each field must sit in its nominal range (year from 1, month 1-12,
/// day 1-31, hour 0-24, minute and second 0-59). A day past the end of the
/// month is pulled back to the month's last day, and `24:00:00` means
/// midnight of the following day.
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime, ParseError> {
    let invalid = |reason: String| ParseError::Timestamp {
        value: value.to_string(),
        reason,
    };

    let bytes = value.as_bytes();
    let shaped = bytes.len() == 19
        && TIMESTAMP_SEPARATORS
            .iter()
            .all(|&(at, sep)| bytes[at] == sep);
    if !shaped {
        return Err(invalid("expected YYYY-MM-DD HH:MM:SS".to_string()));
    }

    let field = |range: Range<usize>,
                 name: &str,
                 valid: Range<u32>|
     -> Result<u32, ParseError> {
        let n: u32 = value
            .get(range)
            .filter(|digits| digits.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|digits| digits.parse().ok())
            .ok_or_else(|| invalid(format!("{name} is not a number")))?;
        if valid.contains(&n) {
            Ok(n)
        } else {
            Err(invalid(format!(
                "{name} {n} is out of range {}..={}",
                valid.start,
                valid.end - 1
            )))
        }
    };

    let year = field(0..4, "year", 1..10_000)?;
    let month = field(5..7, "month", 1..13)?;
    let day = field(8..10, "day", 1..32)?;
    let hour = field(11..13, "hour", 0..25)?;
    let minute = field(14..16, "minute", 0..60)?;
    let second = field(17..19, "second", 0..60)?;

    if hour == 24 && (minute, second) != (0, 0) {
        return Err(invalid("hour 24 is only valid as 24:00:00".to_string()));
    }

    let date = (1..=day)
        .rev()
        .find_map(|d| NaiveDate::from_ymd_opt(year as i32, month, d))
        .ok_or_else(|| invalid("date is out of range".to_string()))?;

    let resolved = if hour == 24 {
        date.succ_opt().and_then(|next| next.and_hms_opt(0, 0, 0))
    } else {
        date.and_hms_opt(hour, minute, second)
    };
    resolved.ok_or_else(|| invalid("time is out of range".to_string()))
}

/// Strip leading/trailing spaces and ASCII control characters.
#[inline]
fn trim_control(s: &str) -> &str {
    s.trim_matches(|c: char| c <= ' ')
}
