//! Multi-format date parsing.
//!
//! Accepted encodings:
//!
//! | Form | Example |
//! |------|---------|
//! | `D.M.YYYY` | `01.05.2025` |
//! | `YYYY-MM-DD` (time suffix ignored) | `2025-01-13`, `2025-01-13 00:00:00` |
//! | spreadsheet serial (epoch 1899-12-30) | `45670` |
//! | 7-digit `DMMYYYY` | `7052025` |
//! | 8-digit `YYYYMMDD` or `DDMMYYYY` | `20250113`, `31012025` |
//!
//! Eight-digit values are ambiguous. `YYYYMMDD` wins when the first four
//! digits are a year from 2000 on and the remaining pairs are a valid month and
//! day; otherwise `DDMMYYYY` is tried. Anything else is unparseable: the
//! parser never guesses.

use chrono::{Datelike, Days, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::Cell;

/// Smallest accepted spreadsheet serial (1970-01-01).
pub const SERIAL_MIN: f64 = 25_569.0;
/// Largest accepted spreadsheet serial (2099-12-31).
pub const SERIAL_MAX: f64 = 73_050.0;

static DOTTED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})\.(\d{1,2})\.(\d{4})$").unwrap());
static ISO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})(?:[T ].*)?$").unwrap());
static SERIAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{5}(?:\.\d+)?$").unwrap());

/// Parse a cell into a calendar date.
pub fn parse_date(cell: &Cell) -> Option<NaiveDate> {
    match cell {
        Cell::Text(s) => parse_date_str(s),
        Cell::Number(n) => parse_date_number(*n),
        Cell::Absent => None,
    }
}

/// Parse a textual date.
pub fn parse_date_str(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();

    if let Some(caps) = DOTTED_RE.captures(s) {
        return ymd(&caps[3], &caps[2], &caps[1]);
    }
    if let Some(caps) = ISO_RE.captures(s) {
        return ymd(&caps[1], &caps[2], &caps[3]);
    }
    if s.len() >= 7 && s.len() <= 8 && s.bytes().all(|b| b.is_ascii_digit()) {
        return parse_compact(s);
    }
    if SERIAL_RE.is_match(s) {
        return s.parse::<f64>().ok().and_then(from_serial);
    }
    None
}

fn parse_date_number(n: f64) -> Option<NaiveDate> {
    if !n.is_finite() {
        return None;
    }
    if n.fract() == 0.0 && (1_000_000.0..=99_999_999.0).contains(&n) {
        return parse_compact(&format!("{}", n as u64));
    }
    from_serial(n)
}

/// Spreadsheet serial day number to date. Fractions (time of day) are dropped.
pub fn from_serial(serial: f64) -> Option<NaiveDate> {
    if !(SERIAL_MIN..=SERIAL_MAX).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_days(Days::new(serial.floor() as u64))
}

/// Disambiguate 7- and 8-digit compact dates.
fn parse_compact(digits: &str) -> Option<NaiveDate> {
    match digits.len() {
        7 => ymd(&digits[3..7], &digits[1..3], &digits[0..1]),
        8 => {
            let year: i32 = digits[0..4].parse().ok()?;
            let month: u32 = digits[4..6].parse().ok()?;
            let day: u32 = digits[6..8].parse().ok()?;
            if year >= 2000 && (1..=12).contains(&month) && (1..=31).contains(&day) {
                if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                    return Some(date);
                }
            }
            let day: u32 = digits[0..2].parse().ok()?;
            let month: u32 = digits[2..4].parse().ok()?;
            if day <= 31 && month <= 12 {
                ymd(&digits[4..8], &digits[2..4], &digits[0..2])
            } else {
                None
            }
        }
        _ => None,
    }
}

fn ymd(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    let year: i32 = year.parse().ok()?;
    if year < 1900 {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month.parse().ok()?, day.parse().ok()?)
}

/// Canonical textual form written back into normalized date columns.
pub fn canonical_date(date: NaiveDate) -> String {
    format!("{:04}-{:02}-{:02}", date.year(), date.month(), date.day())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, day)
    }

    #[test]
    fn test_compact_yyyymmdd() {
        assert_eq!(parse_date(&Cell::Number(20250113.0)), d(2025, 1, 13));
        assert_eq!(parse_date_str("20250113"), d(2025, 1, 13));
    }

    #[test]
    fn test_compact_seven_digits() {
        assert_eq!(parse_date(&Cell::Number(7052025.0)), d(2025, 5, 7));
        assert_eq!(parse_date_str("7052025"), d(2025, 5, 7));
    }

    #[test]
    fn test_compact_ddmmyyyy() {
        assert_eq!(parse_date(&Cell::Number(31012025.0)), d(2025, 1, 31));
        assert_eq!(parse_date_str("01052025"), d(2025, 5, 1));
    }

    #[test]
    fn test_dotted_and_iso() {
        assert_eq!(parse_date_str("01.05.2025"), d(2025, 5, 1));
        assert_eq!(parse_date_str("1.5.2025"), d(2025, 5, 1));
        assert_eq!(parse_date_str("2025-05-01"), d(2025, 5, 1));
        assert_eq!(parse_date_str("2025-05-01T10:22:00"), d(2025, 5, 1));
    }

    #[test]
    fn test_serial() {
        assert_eq!(from_serial(45670.0), d(2025, 1, 13));
        assert_eq!(parse_date(&Cell::Number(45670.5)), d(2025, 1, 13));
        assert_eq!(parse_date_str("45670"), d(2025, 1, 13));
        assert_eq!(from_serial(100.0), None);
    }

    #[test]
    fn test_unparseable() {
        assert_eq!(parse_date_str("31.02.2025"), None);
        assert_eq!(parse_date_str("99999999"), None);
        assert_eq!(parse_date_str("next week"), None);
        assert_eq!(parse_date(&Cell::Absent), None);
    }

    #[test]
    fn test_canonical_is_reparsed_to_itself() {
        let date = parse_date_str("7052025").unwrap();
        let text = canonical_date(date);
        assert_eq!(text, "2025-05-07");
        assert_eq!(parse_date_str(&text), Some(date));
    }
}
