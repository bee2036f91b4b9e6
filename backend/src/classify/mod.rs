//! Cell classifiers.
//!
//! Pure predicates deciding whether a raw cell *looks like* a semantic type.
//! They never interpret a format (decimal separators, date orders): that is
//! the job of [`crate::normalize`]. Every other component speaks in terms of
//! these predicates, so they are kept as named functions and exposed to schema
//! documents through the [`Classifier`] enum.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::Cell;
use crate::normalize::date::{SERIAL_MAX, SERIAL_MIN};

static COUNTRY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{2}$").unwrap());
static CURRENCY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{3}$").unwrap());
static TARIFF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{8,11}$").unwrap());
static PROCEDURE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{3,4}$").unwrap());
static NUMERIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?[\d.,' ]*\d[\d.,' ]*$").unwrap());
static DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2}\.\d{1,2}\.\d{4}|\d{4}-\d{2}-\d{2}([T ].*)?|\d{7,8})$").unwrap()
});
static SERIAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{5}(\.\d+)?$").unwrap());

/// Incoterms 2020 plus the retired 2000/2010 codes still seen in older exports.
const INCOTERMS: &[&str] = &[
    "EXW", "FCA", "FAS", "FOB", "CFR", "CIF", "CPT", "CIP", "DAP", "DPU", "DDP", "DAT", "DAF",
    "DES", "DEQ", "DDU",
];

fn trimmed(cell: &Cell) -> Option<&str> {
    cell.as_text().map(str::trim)
}

fn is_integral(n: f64) -> bool {
    n.is_finite() && n.fract() == 0.0
}

/// Empty cell: absent or whitespace-only text.
pub fn is_empty(cell: &Cell) -> bool {
    cell.is_blank()
}

/// Two-letter ISO 3166 country code, upper case.
pub fn is_country_code(cell: &Cell) -> bool {
    trimmed(cell).is_some_and(|s| COUNTRY_RE.is_match(s))
}

/// Three-letter ISO 4217 currency code, upper case.
pub fn is_currency_code(cell: &Cell) -> bool {
    trimmed(cell).is_some_and(|s| CURRENCY_RE.is_match(s))
}

/// Combined nomenclature / TARIC code: 8 to 11 digits.
pub fn is_tariff_code(cell: &Cell) -> bool {
    match cell {
        Cell::Text(s) => TARIFF_RE.is_match(s.trim()),
        Cell::Number(n) => is_integral(*n) && (1e7..1e11).contains(n),
        Cell::Absent => false,
    }
}

/// Customs procedure code: 3 or 4 digits.
pub fn is_procedure_code(cell: &Cell) -> bool {
    match cell {
        Cell::Text(s) => PROCEDURE_RE.is_match(s.trim()),
        Cell::Number(n) => is_integral(*n) && (100.0..=9999.0).contains(n),
        Cell::Absent => false,
    }
}

/// Digits with optional sign and grouping/decimal separators.
pub fn is_numeric_like(cell: &Cell) -> bool {
    match cell {
        Cell::Text(s) => NUMERIC_RE.is_match(s.trim()),
        Cell::Number(n) => n.is_finite(),
        Cell::Absent => false,
    }
}

/// Something shaped like one of the date encodings the normalizer accepts.
pub fn is_date_like(cell: &Cell) -> bool {
    match cell {
        Cell::Text(s) => {
            let s = s.trim();
            if DATE_RE.is_match(s) {
                return true;
            }
            SERIAL_RE.is_match(s)
                && s.parse::<f64>()
                    .is_ok_and(|n| (SERIAL_MIN..=SERIAL_MAX).contains(&n))
        }
        Cell::Number(n) => {
            (is_integral(*n) && (1_000_000.0..=99_999_999.0).contains(n))
                || (SERIAL_MIN..=SERIAL_MAX).contains(n)
        }
        Cell::Absent => false,
    }
}

/// Delivery term code (EXW, FOB, DAP, ...).
pub fn is_incoterm_code(cell: &Cell) -> bool {
    trimmed(cell).is_some_and(|s| INCOTERMS.contains(&s))
}

/// Named classifier, as referenced from broker schema documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classifier {
    CountryCode,
    CurrencyCode,
    TariffCode,
    ProcedureCode,
    NumericLike,
    DateLike,
    IncotermCode,
    NonEmpty,
}

impl Classifier {
    /// Apply the named predicate to a cell.
    pub fn matches(&self, cell: &Cell) -> bool {
        match self {
            Self::CountryCode => is_country_code(cell),
            Self::CurrencyCode => is_currency_code(cell),
            Self::TariffCode => is_tariff_code(cell),
            Self::ProcedureCode => is_procedure_code(cell),
            Self::NumericLike => is_numeric_like(cell),
            Self::DateLike => is_date_like(cell),
            Self::IncotermCode => is_incoterm_code(cell),
            Self::NonEmpty => !is_empty(cell),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::CountryCode => "country_code",
            Self::CurrencyCode => "currency_code",
            Self::TariffCode => "tariff_code",
            Self::ProcedureCode => "procedure_code",
            Self::NumericLike => "numeric_like",
            Self::DateLike => "date_like",
            Self::IncotermCode => "incoterm_code",
            Self::NonEmpty => "non_empty",
        }
    }

    pub fn all() -> &'static [Classifier] {
        &[
            Self::CountryCode,
            Self::CurrencyCode,
            Self::TariffCode,
            Self::ProcedureCode,
            Self::NumericLike,
            Self::DateLike,
            Self::IncotermCode,
            Self::NonEmpty,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    #[test]
    fn test_country_code() {
        assert!(is_country_code(&t("DE")));
        assert!(is_country_code(&t(" CN ")));
        assert!(!is_country_code(&t("de")));
        assert!(!is_country_code(&t("DEU")));
        assert!(!is_country_code(&Cell::Number(12.0)));
        assert!(!is_country_code(&Cell::Absent));
    }

    #[test]
    fn test_currency_code() {
        assert!(is_currency_code(&t("EUR")));
        assert!(!is_currency_code(&t("EU")));
        assert!(!is_currency_code(&t("eur")));
    }

    #[test]
    fn test_tariff_code() {
        assert!(is_tariff_code(&t("84713000")));
        assert!(is_tariff_code(&t("8471300000")));
        assert!(is_tariff_code(&t("84713000001")));
        assert!(!is_tariff_code(&t("8471300")));
        assert!(!is_tariff_code(&t("847130000012")));
        assert!(!is_tariff_code(&t("8471 3000")));
        assert!(is_tariff_code(&Cell::Number(84713000.0)));
        assert!(!is_tariff_code(&Cell::Number(84713000.5)));
    }

    #[test]
    fn test_procedure_code() {
        assert!(is_procedure_code(&t("4000")));
        assert!(is_procedure_code(&t("400")));
        assert!(!is_procedure_code(&t("40")));
        assert!(!is_procedure_code(&t("40000")));
        assert!(is_procedure_code(&Cell::Number(4000.0)));
    }

    #[test]
    fn test_numeric_like_does_not_interpret() {
        assert!(is_numeric_like(&t("1.234,56")));
        assert!(is_numeric_like(&t(",50")));
        assert!(is_numeric_like(&t("-75,5")));
        assert!(is_numeric_like(&Cell::Number(3.0)));
        assert!(!is_numeric_like(&t("12 kg")));
        assert!(!is_numeric_like(&t(",")));
    }

    #[test]
    fn test_date_like() {
        assert!(is_date_like(&t("01.05.2025")));
        assert!(is_date_like(&t("2025-01-13")));
        assert!(is_date_like(&t("2025-01-13 00:00:00")));
        assert!(is_date_like(&t("7052025")));
        assert!(is_date_like(&Cell::Number(20250113.0)));
        assert!(is_date_like(&Cell::Number(45678.0)));
        assert!(is_date_like(&t("45678")));
        assert!(!is_date_like(&t("12345")));
        assert!(!is_date_like(&t("May 2025")));
    }

    #[test]
    fn test_incoterm() {
        assert!(is_incoterm_code(&t("FOB")));
        assert!(is_incoterm_code(&t("DDU")));
        assert!(!is_incoterm_code(&t("EUR")));
    }

    #[test]
    fn test_empty() {
        assert!(is_empty(&Cell::Absent));
        assert!(is_empty(&t("  ")));
        assert!(!is_empty(&t("x")));
        assert!(!is_empty(&Cell::Number(0.0)));
    }

    #[test]
    fn test_classifier_dispatch_and_serde() {
        let c: Classifier = serde_json::from_str("\"tariff_code\"").unwrap();
        assert_eq!(c, Classifier::TariffCode);
        assert!(c.matches(&t("84713000")));
        for c in Classifier::all() {
            let json = serde_json::to_string(c).unwrap();
            assert_eq!(json, format!("\"{}\"", c.name()));
        }
    }
}
