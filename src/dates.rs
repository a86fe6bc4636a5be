use chrono::{Datelike, NaiveDate, Weekday};
use regex::Regex;

pub const DEFAULT_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%m/%d/%Y", "%d/%m/%Y"];

/// Drop a trailing weekday ("2024-05-01 星期三") unless one of the formats
/// expects text after the date.
fn strip_weekday<'a>(raw: &'a str, formats: &[String]) -> &'a str {
    let raw = raw.trim();
    if formats.iter().any(|f| f.contains(char::is_whitespace)) {
        return raw;
    }
    raw.split_whitespace().next().unwrap_or(raw)
}

/// Try each format in order; the first one that parses wins.
pub fn parse_with_formats(raw: &str, formats: &[String]) -> Option<NaiveDate> {
    let cleaned = strip_weekday(raw, formats);
    if cleaned.is_empty() {
        return None;
    }
    formats
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(cleaned, fmt).ok())
        .and_then(widen_year)
}

/// `%Y` also takes one or two digits; read those as 20yy.
fn widen_year(date: NaiveDate) -> Option<NaiveDate> {
    if date.year() < 100 {
        date.with_year(normalize_year(date.year()))
    } else {
        Some(date)
    }
}

pub fn default_formats() -> Vec<String> {
    DEFAULT_DATE_FORMATS.iter().map(|s| s.to_string()).collect()
}

/// Two-digit years are taken as 20yy.
pub fn normalize_year(year: i32) -> i32 {
    if year < 100 {
        year + 2000
    } else {
        year
    }
}

pub fn ymd(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(normalize_year(year), month, day)
}

/// Build a date from three regex capture groups (year, month, day).
pub fn from_captures(caps: &regex::Captures) -> Option<NaiveDate> {
    let y: i32 = caps.get(1)?.as_str().parse().ok()?;
    let m: u32 = caps.get(2)?.as_str().parse().ok()?;
    let d: u32 = caps.get(3)?.as_str().parse().ok()?;
    ymd(y, m, d)
}

/// Date embedded anywhere in `raw` with `-`, `/`, `.` or 年/月/日 separators.
pub fn parse_loose(raw: &str) -> Option<NaiveDate> {
    let re = Regex::new(r"(?:^|\D)(\d{4}|\d{2})[-/.年](\d{1,2})[-/.月](\d{1,2})").ok()?;
    let found = re.captures_iter(raw).find_map(|c| from_captures(&c));
    found
}

pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    // Excel epoch is 1899-12-30 (accounting for the 1900 leap year bug)
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    let days = chrono::Duration::try_days(serial.floor() as i64)?;
    base.checked_add_signed(days)
}

pub fn weekday_name(date: NaiveDate) -> &'static str {
    match date.weekday() {
        Weekday::Mon => "星期一",
        Weekday::Tue => "星期二",
        Weekday::Wed => "星期三",
        Weekday::Thu => "星期四",
        Weekday::Fri => "星期五",
        Weekday::Sat => "星期六",
        Weekday::Sun => "星期日",
    }
}
