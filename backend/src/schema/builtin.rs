//! Built-in broker layouts.
//!
//! Column positions are zero-based. Every party zone ends with its country
//! code; every goods zone starts with the description followed by the tariff
//! code, which is where description overflow shows up first.

use super::{Anchor, Broker, BrokerSchema, FooterRule, SearchWindows, Zone, ZoneKind};
use crate::classify::Classifier;
use crate::normalize::ScaleRule;

/// Party zone `[start, start + len)` whose last column is the country code.
fn party(name: &str, start: usize, len: usize, text_column: usize) -> Zone {
    let country = start + len - 1;
    Zone {
        name: name.to_string(),
        kind: ZoneKind::Party,
        start,
        end: start + len,
        text_column,
        anchors: vec![Anchor::new(country, Classifier::CountryCode)],
    }
}

fn goods(start: usize, end: usize, anchors: Vec<Anchor>) -> Zone {
    Zone {
        name: "Goods".to_string(),
        kind: ZoneKind::Goods,
        start,
        end,
        text_column: start,
        anchors,
    }
}

fn names(columns: &[&str]) -> Vec<String> {
    columns.iter().map(|s| s.to_string()).collect()
}

/// DHL customs declaration export.
pub fn dhl() -> BrokerSchema {
    BrokerSchema {
        broker: Broker::Dhl,
        version: "2024".to_string(),
        width: 24,
        column_names: names(&[
            "Registriernummer",
            "Anmeldedatum",
            "Verkäufer Name",
            "Verkäufer Straße",
            "Verkäufer PLZ",
            "Verkäufer Ort",
            "Verkäufer Land",
            "Empfänger Name",
            "Empfänger Straße",
            "Empfänger PLZ",
            "Empfänger Ort",
            "Empfänger Land",
            "Warenbezeichnung",
            "Warennummer",
            "Ursprungsland",
            "Verfahren",
            "Eigenmasse",
            "Rohmasse",
            "Rechnungsbetrag",
            "Währung",
            "Lieferbedingung",
            "Zollwert",
            "Zoll",
            "EUSt",
        ]),
        zones: vec![
            party("Seller", 2, 5, 3),
            party("Consignee", 7, 5, 8),
            goods(
                12,
                24,
                vec![
                    Anchor::new(13, Classifier::TariffCode),
                    Anchor::new(14, Classifier::CountryCode),
                    Anchor::new(15, Classifier::ProcedureCode),
                    Anchor::new(19, Classifier::CurrencyCode),
                    Anchor::new(20, Classifier::IncotermCode).optional(),
                ],
            ),
        ],
        numeric_columns: vec![16, 17, 18, 21, 22, 23],
        date_columns: vec![1],
        scale_rules: vec![
            ScaleRule::mass_milligrams(16),
            ScaleRule::mass_milligrams(17),
            ScaleRule::invoice_cents(18),
        ],
        footer: FooterRule { min_filled: 5 },
        windows: SearchWindows::default(),
    }
}

/// DB Schenker import declaration export.
pub fn schenker() -> BrokerSchema {
    BrokerSchema {
        broker: Broker::Schenker,
        version: "2024".to_string(),
        width: 22,
        column_names: names(&[
            "Referenz",
            "Datum",
            "Versender Name",
            "Versender Straße",
            "Versender Ort",
            "Versender PLZ",
            "Versender Land",
            "Empfänger Name",
            "Empfänger Straße",
            "Empfänger Ort",
            "Empfänger PLZ",
            "Empfänger Land",
            "Warenbeschreibung",
            "Zolltarifnummer",
            "Verfahrenscode",
            "Ursprung",
            "Rohmasse",
            "Nettomasse",
            "Rechnungspreis",
            "Währung",
            "Zoll",
            "EUSt",
        ]),
        zones: vec![
            party("Shipper", 2, 5, 3),
            party("Consignee", 7, 5, 8),
            goods(
                12,
                22,
                vec![
                    Anchor::new(13, Classifier::TariffCode),
                    Anchor::new(14, Classifier::ProcedureCode),
                    Anchor::new(15, Classifier::CountryCode),
                    Anchor::new(19, Classifier::CurrencyCode),
                ],
            ),
        ],
        numeric_columns: vec![16, 17, 18, 20, 21],
        date_columns: vec![1],
        scale_rules: vec![ScaleRule::invoice_cents(18)],
        footer: FooterRule { min_filled: 5 },
        windows: SearchWindows::default(),
    }
}

/// Kuehne+Nagel customs export: three party zones before the goods line.
pub fn kuehne_nagel() -> BrokerSchema {
    BrokerSchema {
        broker: Broker::KuehneNagel,
        version: "2023".to_string(),
        width: 27,
        column_names: names(&[
            "Job Number",
            "Declaration Date",
            "Release Date",
            "Seller Name",
            "Seller Address",
            "Seller City",
            "Seller Country",
            "Shipper Name",
            "Shipper Address",
            "Shipper City",
            "Shipper Country",
            "Consignee Name",
            "Consignee Address",
            "Consignee City",
            "Consignee Country",
            "Goods Description",
            "Commodity Code",
            "Country of Origin",
            "Procedure Code",
            "Packages",
            "Net Weight",
            "Gross Weight",
            "Invoice Value",
            "Invoice Currency",
            "Incoterm",
            "Duty",
            "Import VAT",
        ]),
        zones: vec![
            party("Seller", 3, 4, 4),
            party("Shipper", 7, 4, 8),
            party("Consignee", 11, 4, 12),
            goods(
                15,
                27,
                vec![
                    Anchor::new(16, Classifier::TariffCode),
                    Anchor::new(17, Classifier::CountryCode),
                    Anchor::new(18, Classifier::ProcedureCode),
                    Anchor::new(23, Classifier::CurrencyCode),
                    Anchor::new(24, Classifier::IncotermCode).optional(),
                ],
            ),
        ],
        numeric_columns: vec![19, 20, 21, 22, 25, 26],
        date_columns: vec![1, 2],
        scale_rules: vec![
            ScaleRule::mass_milligrams(20),
            ScaleRule::mass_milligrams(21),
        ],
        footer: FooterRule { min_filled: 6 },
        windows: SearchWindows::default(),
    }
}

/// Dachser export. Column counts drift across vintages, but the leading
/// consignee and goods columns below are stable in every version; the
/// varying tail is merged by the header unifier.
pub fn dachser() -> BrokerSchema {
    BrokerSchema {
        broker: Broker::Dachser,
        version: "common".to_string(),
        width: 14,
        column_names: names(&[
            "Sendungsnummer",
            "Datum",
            "Empfänger",
            "Straße",
            "PLZ",
            "Ort",
            "Land",
            "Warenbeschreibung",
            "Warentarifnummer",
            "Verfahren",
            "Ursprungsland",
            "Rechnungsbetrag",
            "Währung",
            "Gewicht",
        ]),
        zones: vec![
            party("Consignee", 2, 5, 3),
            goods(
                7,
                14,
                vec![
                    Anchor::new(8, Classifier::TariffCode),
                    Anchor::new(9, Classifier::ProcedureCode),
                    Anchor::new(10, Classifier::CountryCode),
                    Anchor::new(12, Classifier::CurrencyCode),
                ],
            ),
        ],
        numeric_columns: vec![11, 13],
        date_columns: vec![1],
        scale_rules: vec![ScaleRule::invoice_cents(11)],
        footer: FooterRule::default(),
        windows: SearchWindows::default(),
    }
}
