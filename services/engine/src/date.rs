//! Date normalization for checklist cells.
//!
//! Cells arrive as spreadsheet serial numbers, ISO strings, day-first strings,
//! or free-form date-times with a "(UTC +8)" suffix. Everything is reduced to a
//! calendar date rendered as `YYYY-MM-DD`. Time of day and offsets are dropped:
//! the dashboard works on date-only values.
//!
//! Unparseable input yields `None` and is never an error.

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

static SERIAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+(\.\d+)?$").expect("serial pattern"));
static TZ_PAREN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\(.*?UTC\s*[+-]?\s*8.*?\)").expect("tz paren pattern"));
static TZ_BARE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bUTC\s*[+-]?\s*8\b").expect("tz bare pattern"));
static ISO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})[-/.](\d{1,2})[-/.](\d{1,2})$").expect("iso pattern"));
static DMY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})[-/.](\d{1,2})[-/.](\d{4})$").expect("dmy pattern"));

/// Date-time layouts tried by the fallback parser (time of day is discarded).
const FALLBACK_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %I:%M %p",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d/%m/%Y %I:%M %p",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%Y/%m/%d %I:%M %p",
    "%b %d, %Y %I:%M %p",
    "%b %d, %Y %H:%M",
    "%b %d %Y %H:%M:%S",
    "%b %d %Y %H:%M",
    "%a %b %d %Y %H:%M:%S",
    "%d %b %Y %H:%M:%S",
    "%d %b %Y %H:%M",
    "%d-%b-%Y %H:%M",
    "%B %d, %Y %I:%M %p",
    "%B %d, %Y %H:%M",
];

/// Date-only layouts with month names.
const FALLBACK_DATE_FORMATS: &[&str] = &[
    "%d %b %Y",
    "%d-%b-%Y",
    "%d %B %Y",
    "%d-%B-%Y",
    "%b %d %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%B %d, %Y",
    "%a %b %d %Y",
];

/// Spreadsheet serial day count (day 0 = 1899-12-30) to a calendar date.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() {
        return None;
    }
    let millis = (serial * MILLIS_PER_DAY).round();
    if millis.abs() > 1e15 {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let delta = TimeDelta::try_milliseconds(millis as i64)?;
    base.checked_add_signed(delta).map(|dt| dt.date())
}

pub fn excel_serial_to_iso(serial: f64) -> Option<String> {
    excel_serial_to_date(serial).map(format_ymd)
}

pub fn format_ymd(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parse a canonical `YYYY-MM-DD` string.
pub fn parse_iso_ymd(iso: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(iso.trim(), "%Y-%m-%d").ok()
}

/// Remove "(... UTC +8 ...)" and bare "UTC +8" annotations.
fn strip_timezone(raw: &str) -> String {
    let without_paren = TZ_PAREN_RE.replace(raw, "");
    TZ_BARE_RE.replace(&without_paren, "").trim().to_string()
}

fn ymd(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

fn parse_fallback(s: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    for format in FALLBACK_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt.date());
        }
    }
    FALLBACK_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(s, format).ok())
}

/// Parse any supported cell representation to a calendar date.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if SERIAL_RE.is_match(raw) {
        return raw.parse::<f64>().ok().and_then(excel_serial_to_date);
    }

    let s = strip_timezone(raw);
    if s.is_empty() {
        return None;
    }

    if let Some(caps) = ISO_RE.captures(&s) {
        return ymd(&caps[1], &caps[2], &caps[3]);
    }
    if let Some(caps) = DMY_RE.captures(&s) {
        return ymd(&caps[3], &caps[2], &caps[1]);
    }

    parse_fallback(&s)
}

/// Normalize a raw cell to `YYYY-MM-DD`, or `None` when it holds no date.
pub fn normalize_to_iso_date(raw: &str) -> Option<String> {
    parse_date(raw).map(format_ymd)
}

/// Monday of the week containing `date`.
pub fn start_of_week(date: NaiveDate) -> NaiveDate {
    let offset = u64::from(date.weekday().num_days_from_monday());
    date.checked_sub_days(Days::new(offset)).unwrap_or(date)
}

pub fn start_of_iso_week_ymd(iso: &str) -> Option<String> {
    parse_iso_ymd(iso).map(|d| format_ymd(start_of_week(d)))
}

/// Last calendar day of the month containing `date`.
pub fn end_of_month(date: NaiveDate) -> Option<NaiveDate> {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)?.pred_opt()
}

pub fn end_of_month_ymd(iso: &str) -> Option<String> {
    parse_iso_ymd(iso).and_then(end_of_month).map(format_ymd)
}

/// `YYYY-MM` bucket of a canonical date string.
pub fn month_key(iso: &str) -> &str {
    iso.get(..7).unwrap_or(iso)
}

/// `YYYY` bucket of a canonical date string.
pub fn year_key(iso: &str) -> &str {
    iso.get(..4).unwrap_or(iso)
}
