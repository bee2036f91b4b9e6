//! Locale-aware numeric parsing.
//!
//! Broker exports mix European (`1.234,56`), plain (`1234.56`) and truncated
//! (`,50`) notations, sometimes within one file. The separator roles are
//! decided per value:
//!
//! - both `.` and `,` present: the right-most one is the decimal separator
//! - a single `,`: decimal comma
//! - a single `.`: decimal point
//! - the same separator several times: thousands grouping (groups of three)
//!
//! Spaces and apostrophes are always grouping characters.

use crate::models::Cell;

/// Parse a cell into a number.
///
/// Number cells pass through; text is interpreted with [`parse_number_str`];
/// absent cells are not numbers.
pub fn parse_number(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::Number(n) if n.is_finite() => Some(*n),
        Cell::Number(_) | Cell::Absent => None,
        Cell::Text(s) => parse_number_str(s),
    }
}

/// Parse a raw textual value into a number, or `None` if it is not one.
pub fn parse_number_str(raw: &str) -> Option<f64> {
    let s = raw.trim();
    let (negative, body) = match s.as_bytes().first()? {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };

    let body: String = body
        .chars()
        .filter(|c| !matches!(c, ' ' | '\'' | '\u{a0}' | '\u{202f}'))
        .collect();

    if !body.chars().any(|c| c.is_ascii_digit())
        || !body.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',')
    {
        return None;
    }

    let dots = body.matches('.').count();
    let commas = body.matches(',').count();

    let canonical = match (dots, commas) {
        (0, 0) | (1, 0) => body,
        (0, 1) => body.replace(',', "."),
        (_, 0) => ungroup(&body, '.')?,
        (0, _) => ungroup(&body, ',')?,
        _ => {
            let last_dot = body.rfind('.')?;
            let last_comma = body.rfind(',')?;
            let (decimal, grouping) = if last_dot > last_comma {
                ('.', ',')
            } else {
                (',', '.')
            };
            if body.matches(decimal).count() > 1 {
                return None;
            }
            let (int_part, frac_part) = body.split_once(decimal)?;
            if frac_part.contains(grouping) {
                return None;
            }
            format!("{}.{}", ungroup(int_part, grouping)?, frac_part)
        }
    };

    let canonical = match (canonical.starts_with('.'), canonical.ends_with('.')) {
        (true, _) => format!("0{}", canonical),
        (_, true) => format!("{}0", canonical),
        _ => canonical,
    };

    let value: f64 = canonical.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(if negative { -value } else { value })
}

/// Strip thousands separators, checking that the groups are well formed.
fn ungroup(s: &str, sep: char) -> Option<String> {
    if !s.contains(sep) {
        return Some(s.to_string());
    }
    let mut groups = s.split(sep);
    let head = groups.next()?;
    if head.is_empty() || head.len() > 3 {
        return None;
    }
    let mut out = head.to_string();
    for group in groups {
        if group.len() != 3 {
            return None;
        }
        out.push_str(group);
    }
    Some(out)
}
