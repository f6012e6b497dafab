//! Value-shape classification and per-column consistency tallies.
//!
//! Every non-empty cell is classified into one [`ValueFormat`]: numeric,
//! HTTP(S) URI, one of ten date/time shapes, or plain string. Date/time
//! candidates are gated by a shape regex and confirmed only when formatting
//! the parsed value back through the same pattern reproduces the original
//! text exactly; a failed round-trip falls through to the next candidate.
//!
//! [`FormatTally`] accumulates shape counts per column; at end of stream a
//! column whose dominant shape covers less than 90% of its classified
//! values is flagged as inconsistent.

use std::{collections::BTreeMap, sync::LazyLock};

use chrono::{
    NaiveDate, NaiveDateTime, NaiveTime,
    format::{Parsed, StrftimeItems, parse},
};
use regex::Regex;
use serde::Serialize;

const CONSISTENCY_THRESHOLD: f64 = 0.9;

const MONTH_ABBR: &str = "Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec";
const MONTH_FULL: &str = "January|February|March|April|May|June|July|August|September|October|November|December";

static NUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-+]?\d*\.?\d+(?:[eE][-+]?\d+)?$").expect("numeric pattern"));

// Cheap gate before trying any date/time shape: digits or a month name.
static POSSIBLE_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^(?:\d|\s\d|{MONTH_ABBR}|{MONTH_FULL})")).expect("date gate pattern")
});

static DATE_DB: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4,}-\d\d-\d\d$").expect("date pattern"));
static DATE_SHORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^[ \d]\d (?:{MONTH_ABBR})$")).expect("date pattern")
});
static DATE_RFC822: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^[ \d]\d (?:{MONTH_ABBR}) \d{{4,}}$")).expect("date pattern")
});
static DATE_LONG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^(?:{MONTH_FULL}) [ \d]\d, \d{{4,}}$")).expect("date pattern")
});
static TIME_HM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d\d:\d\d$").expect("time pattern"));
static TIME_HMS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d\d:\d\d:\d\d$").expect("time pattern"));
static DATETIME_DB: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4,}-\d\d-\d\d \d\d:\d\d:\d\d$").expect("datetime pattern"));
static DATETIME_ISO8601: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4,}-\d\d-\d\dT\d\d:\d\d:\d\dZ$").expect("datetime pattern")
});
static DATETIME_SHORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^\d\d (?:{MONTH_ABBR}) \d\d:\d\d$")).expect("datetime pattern")
});
static DATETIME_LONG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^(?:{MONTH_FULL}) \d\d, \d{{4,}} \d\d:\d\d$")).expect("datetime pattern")
});

/// Inferred semantic shape of a cell's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueFormat {
    Numeric,
    Uri,
    DateDb,
    DateShort,
    DateRfc822,
    DateLong,
    TimeHm,
    TimeHms,
    DateTimeDb,
    DateTimeIso8601,
    DateTimeShort,
    DateTimeLong,
    String,
}

/// Classifies one non-empty value. Priority: numeric, then HTTP(S) URI,
/// then the date/time shapes in fixed order, then plain string.
pub fn classify(value: &str) -> ValueFormat {
    if NUMERIC.is_match(value.trim()) {
        return ValueFormat::Numeric;
    }
    if is_http_uri(value) {
        return ValueFormat::Uri;
    }
    if POSSIBLE_DATE.is_match(value)
        && let Some(shape) = date_shape(value)
    {
        return shape;
    }
    ValueFormat::String
}

fn date_shape(value: &str) -> Option<ValueFormat> {
    if DATE_DB.is_match(value) && round_trip_date(value, "%Y-%m-%d") {
        Some(ValueFormat::DateDb)
    } else if DATE_SHORT.is_match(value) && round_trip_partial(value, "%e %b", false) {
        Some(ValueFormat::DateShort)
    } else if DATE_RFC822.is_match(value) && round_trip_date(value, "%e %b %Y") {
        Some(ValueFormat::DateRfc822)
    } else if DATE_LONG.is_match(value) && round_trip_date(value, "%B %e, %Y") {
        Some(ValueFormat::DateLong)
    } else if TIME_HM.is_match(value) && round_trip_time(value, "%H:%M") {
        Some(ValueFormat::TimeHm)
    } else if TIME_HMS.is_match(value) && round_trip_time(value, "%H:%M:%S") {
        Some(ValueFormat::TimeHms)
    } else if DATETIME_DB.is_match(value) && round_trip_datetime(value, "%Y-%m-%d %H:%M:%S") {
        Some(ValueFormat::DateTimeDb)
    } else if DATETIME_ISO8601.is_match(value) && round_trip_datetime(value, "%Y-%m-%dT%H:%M:%SZ") {
        Some(ValueFormat::DateTimeIso8601)
    } else if DATETIME_SHORT.is_match(value) && round_trip_partial(value, "%d %b %H:%M", true) {
        Some(ValueFormat::DateTimeShort)
    } else if DATETIME_LONG.is_match(value) && round_trip_datetime(value, "%B %d, %Y %H:%M") {
        Some(ValueFormat::DateTimeLong)
    } else {
        None
    }
}

fn is_http_uri(value: &str) -> bool {
    let rest = value
        .strip_prefix("https:")
        .or_else(|| value.strip_prefix("http:"));
    let Some(rest) = rest else { return false };
    let Some(rest) = rest.strip_prefix("//") else {
        return false;
    };
    let authority = rest.split(['/', '?', '#']).next().unwrap_or("");
    !authority.is_empty() && !value.chars().any(char::is_whitespace)
}

fn round_trip_date(value: &str, pattern: &str) -> bool {
    NaiveDate::parse_from_str(value, pattern)
        .map(|date| date.format(pattern).to_string() == value)
        .unwrap_or(false)
}

fn round_trip_time(value: &str, pattern: &str) -> bool {
    NaiveTime::parse_from_str(value, pattern)
        .map(|time| time.format(pattern).to_string() == value)
        .unwrap_or(false)
}

fn round_trip_datetime(value: &str, pattern: &str) -> bool {
    NaiveDateTime::parse_from_str(value, pattern)
        .map(|dt| dt.format(pattern).to_string() == value)
        .unwrap_or(false)
}

/// Round-trips a pattern that carries no year. A leap-year default is
/// supplied for parsing only; the pattern never formats it back out.
fn round_trip_partial(value: &str, pattern: &str, with_time: bool) -> bool {
    let mut parsed = Parsed::new();
    if parse(&mut parsed, value, StrftimeItems::new(pattern)).is_err() {
        return false;
    }
    if parsed.set_year(2000).is_err() {
        return false;
    }
    let Ok(date) = parsed.to_naive_date() else {
        return false;
    };
    if with_time {
        let Ok(time) = parsed.to_naive_time() else {
            return false;
        };
        date.and_time(time).format(pattern).to_string() == value
    } else {
        date.format(pattern).to_string() == value
    }
}

/// Per-column occurrence counts of value shapes. A column appears only once
/// it has received at least one non-empty value.
#[derive(Debug, Clone, Default)]
pub struct FormatTally {
    columns: BTreeMap<usize, BTreeMap<ValueFormat, usize>>,
}

impl FormatTally {
    pub fn record(&mut self, column: usize, value: &str) {
        if value.is_empty() {
            return;
        }
        *self
            .columns
            .entry(column)
            .or_default()
            .entry(classify(value))
            .or_insert(0) += 1;
    }

    pub fn record_row(&mut self, row: &[String]) {
        for (column, value) in row.iter().enumerate() {
            self.record(column, value);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Zero-based indices of columns whose dominant shape covers less than
    /// the consistency threshold.
    pub fn inconsistent_columns(&self) -> Vec<usize> {
        self.columns
            .iter()
            .filter_map(|(column, counts)| {
                let total: usize = counts.values().sum();
                let dominant = counts.values().copied().max().unwrap_or(0);
                ((dominant as f64) < (total as f64) * CONSISTENCY_THRESHOLD).then_some(*column)
            })
            .collect()
    }
}
