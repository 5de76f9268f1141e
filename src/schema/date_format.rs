//! Date patterns declared by date fields
//!
//! Mapping sources declare formats the way the index mapping does: Joda-style
//! patterns (`yyyy-MM-dd'T'HH:mm:ssZZ`), built-in names
//! (`strict_date_optional_time`) or epoch encodings (`epoch_millis`), joined
//! with `||`. Each pattern is converted once into a chrono format string.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Format applied when a date field declares none
pub const DEFAULT_DATE_FORMAT: &str = "strict_date_optional_time||epoch_millis";

#[derive(Debug, Clone, PartialEq, Eq)]
enum FormatKind {
    EpochSeconds,
    EpochMillis,
    /// ISO-8601 date with optional time and zone
    OptionalTime,
    Pattern {
        chrono: String,
        has_time: bool,
        has_zone: bool,
    },
}

/// One accepted date pattern
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DateFormat {
    pattern: String,
    kind: FormatKind,
}

impl DateFormat {
    /// Parse a single pattern
    pub fn new(pattern: &str) -> Result<Self, String> {
        let pattern = pattern.trim();
        let kind = match pattern {
            "" => return Err("empty date format".to_string()),
            "epoch_second" => FormatKind::EpochSeconds,
            "epoch_millis" => FormatKind::EpochMillis,
            "date_optional_time" | "strict_date_optional_time" | "date_time"
            | "strict_date_time" | "date_time_no_millis" | "strict_date_time_no_millis" => {
                FormatKind::OptionalTime
            }
            "date" | "strict_date" | "year_month_day" | "strict_year_month_day" => {
                FormatKind::Pattern {
                    chrono: "%Y-%m-%d".to_string(),
                    has_time: false,
                    has_zone: false,
                }
            }
            "basic_date" => FormatKind::Pattern {
                chrono: "%Y%m%d".to_string(),
                has_time: false,
                has_zone: false,
            },
            other => joda_to_chrono(other)?,
        };

        Ok(Self {
            pattern: pattern.to_string(),
            kind,
        })
    }

    /// Parse a `||`-joined format list, preserving order
    pub fn parse_list(formats: &str) -> Result<Vec<Self>, String> {
        formats.split("||").map(Self::new).collect()
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_epoch(&self) -> bool {
        matches!(self.kind, FormatKind::EpochSeconds | FormatKind::EpochMillis)
    }

    /// Parse an input string with this format only
    pub fn parse(&self, input: &str) -> Option<DateTime<Utc>> {
        let input = input.trim();
        match &self.kind {
            FormatKind::EpochSeconds => input
                .parse::<i64>()
                .ok()
                .and_then(|secs| DateTime::from_timestamp(secs, 0)),
            FormatKind::EpochMillis => input
                .parse::<i64>()
                .ok()
                .and_then(DateTime::from_timestamp_millis),
            FormatKind::OptionalTime => parse_optional_time(input),
            FormatKind::Pattern {
                chrono,
                has_time,
                has_zone,
            } => parse_pattern(input, chrono, *has_time, *has_zone),
        }
    }

    /// Render a timestamp in this format, as the backend stores it
    pub fn format(&self, value: &DateTime<Utc>) -> Value {
        match &self.kind {
            FormatKind::EpochSeconds => Value::from(value.timestamp()),
            FormatKind::EpochMillis => Value::from(value.timestamp_millis()),
            FormatKind::OptionalTime => {
                Value::from(value.to_rfc3339_opts(SecondsFormat::AutoSi, false))
            }
            FormatKind::Pattern { chrono, .. } => Value::from(value.format(chrono).to_string()),
        }
    }
}

impl TryFrom<String> for DateFormat {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<DateFormat> for String {
    fn from(format: DateFormat) -> Self {
        format.pattern
    }
}

impl std::fmt::Display for DateFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.pattern)
    }
}

fn parse_optional_time(input: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn parse_pattern(input: &str, fmt: &str, has_time: bool, has_zone: bool) -> Option<DateTime<Utc>> {
    if has_zone {
        if let Ok(dt) = DateTime::parse_from_str(input, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
        // Joda zone patterns also accept a literal `Z` for UTC
        let stripped = input.strip_suffix('Z')?;
        return DateTime::parse_from_str(&format!("{}+00:00", stripped), fmt)
            .or_else(|_| DateTime::parse_from_str(&format!("{}+0000", stripped), fmt))
            .ok()
            .map(|dt| dt.with_timezone(&Utc));
    }
    if has_time {
        return NaiveDateTime::parse_from_str(input, fmt)
            .ok()
            .map(|naive| naive.and_utc());
    }
    NaiveDate::parse_from_str(input, fmt)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Convert a Joda-style pattern into a chrono format string
fn joda_to_chrono(pattern: &str) -> Result<FormatKind, String> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::new();
    let mut has_time = false;
    let mut has_zone = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '\'' {
            // Quoted literal; '' is an escaped quote
            i += 1;
            while i < chars.len() && chars[i] != '\'' {
                push_literal(&mut out, chars[i]);
                i += 1;
            }
            if i >= chars.len() {
                return Err(format!("unterminated literal in date format '{}'", pattern));
            }
            if i + 1 < chars.len() && chars[i + 1] == '\'' {
                out.push('\'');
                i += 1;
            }
            i += 1;
            continue;
        }

        if !c.is_ascii_alphabetic() {
            push_literal(&mut out, c);
            i += 1;
            continue;
        }

        let start = i;
        while i < chars.len() && chars[i] == c {
            i += 1;
        }
        let run = i - start;

        let spec = match (c, run) {
            ('y', 2) => "%y",
            ('y', _) | ('Y', _) | ('u', _) => "%Y",
            ('M', 1) | ('M', 2) => "%m",
            ('M', 3) => "%b",
            ('M', _) => "%B",
            ('d', _) => "%d",
            ('D', _) => "%j",
            ('E', 1..=3) => "%a",
            ('E', _) => "%A",
            ('H', _) => {
                has_time = true;
                "%H"
            }
            ('h', _) => {
                has_time = true;
                "%I"
            }
            ('m', _) => "%M",
            ('s', _) => "%S",
            ('a', _) => "%p",
            ('S', _) => {
                if out.ends_with('.') {
                    out.pop();
                    "%.f"
                } else {
                    "%f"
                }
            }
            ('Z', 1) => {
                has_zone = true;
                "%z"
            }
            ('Z', _) | ('X', _) | ('x', _) => {
                has_zone = true;
                "%:z"
            }
            _ => {
                return Err(format!(
                    "unsupported pattern letter '{}' in date format '{}'",
                    c, pattern
                ))
            }
        };
        out.push_str(spec);
    }

    Ok(FormatKind::Pattern {
        chrono: out,
        has_time,
        has_zone,
    })
}

fn push_literal(out: &mut String, c: char) {
    if c == '%' {
        out.push_str("%%");
    } else {
        out.push(c);
    }
}
