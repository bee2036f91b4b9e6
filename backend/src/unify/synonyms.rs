//! Legacy field name → canonical field name.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::error::UnifyError;

/// Field names seen across broker export vintages.
const BUILTIN: &[(&str, &str)] = &[
    ("Sendungsnummer", "Shipment Number"),
    ("Sendungs-Nr.", "Shipment Number"),
    ("Referenz", "Shipment Number"),
    ("Datum", "Declaration Date"),
    ("Anmeldedatum", "Declaration Date"),
    ("Empfänger", "Consignee Name"),
    ("Empfaenger", "Consignee Name"),
    ("Warenbeschreibung", "Goods Description"),
    ("Warenbezeichnung", "Goods Description"),
    ("Warentarifnummer", "Tariff Code"),
    ("Zolltarifnummer", "Tariff Code"),
    ("Warennummer", "Tariff Code"),
    ("Commodity Code", "Tariff Code"),
    ("Verfahren", "Procedure Code"),
    ("Verfahrenscode", "Procedure Code"),
    ("Ursprungsland", "Country of Origin"),
    ("Ursprung", "Country of Origin"),
    ("Rechnungsbetrag", "Invoice Value"),
    ("Rechnungspreis", "Invoice Value"),
    ("Betrag", "Invoice Value"),
    ("Währung", "Currency"),
    ("Waehrung", "Currency"),
    ("Rechnungswährung", "Currency"),
    ("Currency Code", "Currency"),
    ("Invoice Currency", "Currency"),
    ("Gewicht", "Gross Weight"),
    ("Rohmasse", "Gross Weight"),
    ("Bruttogewicht", "Gross Weight"),
    ("Eigenmasse", "Net Weight"),
    ("Nettomasse", "Net Weight"),
    ("Nettogewicht", "Net Weight"),
];

/// Many-to-one mapping of legacy names onto canonical names.
///
/// Lookups are exact after trimming; there is no fuzzy matching. A canonical
/// name may not itself be a legacy name, so every name resolves in one step.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SynonymTable {
    map: HashMap<String, String>,
}

impl SynonymTable {
    /// Build a table, rejecting contradictory or chained entries.
    ///
    /// Repeating an identical entry is allowed; an entry mapping a name onto
    /// itself is ignored.
    pub fn new<I, K, V>(pairs: I) -> Result<Self, UnifyError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map: HashMap<String, String> = HashMap::new();
        for (name, target) in pairs {
            let name = name.into().trim().to_string();
            let target = target.into().trim().to_string();
            if name == target {
                continue;
            }
            match map.get(&name) {
                Some(existing) if *existing != target => {
                    return Err(UnifyError::SynonymConflict {
                        name,
                        first: existing.clone(),
                        second: target,
                    });
                }
                Some(_) => {}
                None => {
                    map.insert(name, target);
                }
            }
        }

        let mut chained: Vec<(&String, &String)> = map
            .iter()
            .filter(|(_, target)| map.contains_key(*target))
            .collect();
        chained.sort();
        if let Some((name, target)) = chained.first() {
            return Err(UnifyError::SynonymChain {
                name: (*name).clone(),
                target: (*target).clone(),
            });
        }

        Ok(Self { map })
    }

    /// A table without entries: names only match exactly.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in table for the known broker field names.
    pub fn builtin() -> Self {
        Self {
            map: BUILTIN
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// Load a JSON object of `"legacy name": "canonical name"` entries.
    pub fn from_json(json: &str) -> Result<Self, UnifyError> {
        let entries: BTreeMap<String, String> = serde_json::from_str(json)?;
        Self::new(entries)
    }

    /// Canonical key of a name: its mapped name, or the trimmed name itself.
    pub fn canonical<'a>(&'a self, name: &'a str) -> &'a str {
        let name = name.trim();
        self.map.get(name).map_or(name, String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Entries sorted by legacy name.
    pub fn entries(&self) -> Vec<(&str, &str)> {
        let mut entries: Vec<_> = self
            .map
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        entries.sort_unstable();
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_passes_validation() {
        let checked = SynonymTable::new(BUILTIN.iter().copied()).unwrap();
        assert_eq!(checked, SynonymTable::builtin());
    }

    #[test]
    fn test_canonical_lookup() {
        let table = SynonymTable::builtin();
        assert_eq!(table.canonical("Waehrung"), "Currency");
        assert_eq!(table.canonical(" Währung "), "Currency");
        assert_eq!(table.canonical("Bemerkung"), "Bemerkung");
    }

    #[test]
    fn test_conflicting_entries_rejected() {
        let err = SynonymTable::new([("Währung", "Currency"), ("Währung", "Betrag")]).unwrap_err();
        assert!(matches!(err, UnifyError::SynonymConflict { ref name, .. } if name == "Währung"));
    }

    #[test]
    fn test_repeated_entry_allowed() {
        let table = SynonymTable::new([("Betrag", "Invoice Value"), ("Betrag", "Invoice Value")]);
        assert_eq!(table.unwrap().len(), 1);
    }

    #[test]
    fn test_chains_rejected() {
        let err = SynonymTable::new([("Waehrung", "Währung"), ("Währung", "Currency")]).unwrap_err();
        assert!(matches!(
            err,
            UnifyError::SynonymChain { ref name, ref target } if name == "Waehrung" && target == "Währung"
        ));
    }

    #[test]
    fn test_from_json() {
        let table = SynonymTable::from_json(r#"{"Gew.": "Gross Weight", "Gewicht": "Gross Weight"}"#)
            .unwrap();
        assert_eq!(table.canonical("Gew."), "Gross Weight");
        assert!(SynonymTable::from_json("[1, 2]").is_err());
    }
}
