//! Broker schemas.
//!
//! A [`BrokerSchema`] is the static description of one broker's export
//! layout: which contiguous column ranges form logical [`Zone`]s (Seller,
//! Consignee, Goods, ...), which column of each zone is the overflow-prone
//! free-text field, and which [`Anchor`] columns must satisfy which
//! [`Classifier`] when the row is aligned. It also scopes value
//! normalization (numeric, date and scaled-integer columns) and the footer
//! rule that separates data rows from summary lines.
//!
//! Built-in layouts live in [`builtin`]; JSON documents with the same shape
//! can override them through the [`crate::cache::SchemaRegistry`].

pub mod builtin;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::classify::Classifier;
use crate::error::SchemaError;
use crate::models::{filled_cells, Cell};
use crate::normalize::ScaleRule;

// =============================================================================
// Brokers
// =============================================================================

/// The brokers whose exports are supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Broker {
    Dhl,
    Schenker,
    KuehneNagel,
    Dachser,
}

impl Broker {
    pub fn all() -> &'static [Broker] {
        &[Self::Dhl, Self::Schenker, Self::KuehneNagel, Self::Dachser]
    }

    /// Identifier used in schema documents, CLI flags and API fields.
    pub fn id(&self) -> &'static str {
        match self {
            Self::Dhl => "dhl",
            Self::Schenker => "schenker",
            Self::KuehneNagel => "kuehne_nagel",
            Self::Dachser => "dachser",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Dhl => "DHL",
            Self::Schenker => "DB Schenker",
            Self::KuehneNagel => "Kuehne+Nagel",
            Self::Dachser => "Dachser",
        }
    }

    /// The built-in layout for this broker.
    pub fn builtin_schema(&self) -> BrokerSchema {
        match self {
            Self::Dhl => builtin::dhl(),
            Self::Schenker => builtin::schenker(),
            Self::KuehneNagel => builtin::kuehne_nagel(),
            Self::Dachser => builtin::dachser(),
        }
    }
}

impl fmt::Display for Broker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Broker {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', '+', ' '], "_");
        match normalized.as_str() {
            "dhl" => Ok(Self::Dhl),
            "schenker" | "db_schenker" => Ok(Self::Schenker),
            "kuehne_nagel" | "kn" => Ok(Self::KuehneNagel),
            "dachser" => Ok(Self::Dachser),
            _ => Err(SchemaError::UnknownBroker(s.to_string())),
        }
    }
}

// =============================================================================
// Zones and anchors
// =============================================================================

/// What a zone describes. Decides which overflow pattern applies to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneKind {
    /// A party (seller, shipper, consignee): name and address lines.
    Party,
    /// The goods line: free-text description followed by code fields.
    Goods,
}

/// A column whose content confirms the row is aligned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub column: usize,
    pub classifier: Classifier,
    /// Optional anchors accept an empty cell.
    #[serde(default)]
    pub optional: bool,
}

impl Anchor {
    pub fn new(column: usize, classifier: Classifier) -> Self {
        Self {
            column,
            classifier,
            optional: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Check the anchor against a row. Columns beyond the row fail.
    pub fn holds(&self, row: &[Cell]) -> bool {
        match row.get(self.column) {
            Some(cell) if self.optional && cell.is_blank() => true,
            Some(cell) => self.classifier.matches(cell),
            None => false,
        }
    }
}

/// A contiguous column range `[start, end)` describing one logical entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub name: String,
    pub kind: ZoneKind,
    pub start: usize,
    pub end: usize,
    /// Free-text column that absorbs overflow fragments when repaired.
    pub text_column: usize,
    /// Anchors in column order.
    pub anchors: Vec<Anchor>,
}

impl Zone {
    pub fn contains(&self, column: usize) -> bool {
        (self.start..self.end).contains(&column)
    }

    /// A zone with no content at all is not present in the row.
    pub fn is_vacant(&self, row: &[Cell]) -> bool {
        row.get(self.start..self.end.min(row.len()))
            .map_or(true, |cells| cells.iter().all(Cell::is_blank))
    }

    /// First anchor that does not hold, if any.
    pub fn first_failing_anchor(&self, row: &[Cell]) -> Option<&Anchor> {
        self.anchors.iter().find(|a| !a.holds(row))
    }
}

// =============================================================================
// Schema
// =============================================================================

/// Rows with fewer filled cells than this are footers or separators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FooterRule {
    pub min_filled: usize,
}

impl Default for FooterRule {
    fn default() -> Self {
        Self { min_filled: 3 }
    }
}

/// Forward search limits of the shift detector, in columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchWindows {
    /// Zone-local overflow in party zones.
    pub local: usize,
    /// Overflow that spills into the next zone.
    pub cascade: usize,
    /// Empty cells in front of an anchor value.
    pub gap: usize,
    /// Description overflow into code fields.
    pub description: usize,
}

impl Default for SearchWindows {
    fn default() -> Self {
        Self {
            local: 4,
            cascade: 8,
            gap: 4,
            description: 3,
        }
    }
}

/// Static description of one broker export layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerSchema {
    pub broker: Broker,
    /// Free-form layout label, e.g. the export vintage.
    #[serde(default)]
    pub version: String,
    /// Minimum number of columns the layout addresses.
    pub width: usize,
    /// Header names for the addressed columns, used in reports.
    #[serde(default)]
    pub column_names: Vec<String>,
    /// Zones in column order.
    pub zones: Vec<Zone>,
    #[serde(default)]
    pub numeric_columns: Vec<usize>,
    #[serde(default)]
    pub date_columns: Vec<usize>,
    #[serde(default)]
    pub scale_rules: Vec<ScaleRule>,
    #[serde(default)]
    pub footer: FooterRule,
    #[serde(default)]
    pub windows: SearchWindows,
}

impl BrokerSchema {
    /// Parse a schema document. Does not run [`BrokerSchema::validate`].
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Reject layouts the detector cannot work with.
    pub fn validate(&self) -> Result<(), SchemaError> {
        let w = &self.windows;
        for (name, value) in [
            ("local", w.local),
            ("cascade", w.cascade),
            ("gap", w.gap),
            ("description", w.description),
        ] {
            if value == 0 {
                return Err(SchemaError::InvalidWindow(name));
            }
        }
        if self.footer.min_filled == 0 {
            return Err(SchemaError::InvalidFooter);
        }

        let mut previous: Option<&Zone> = None;
        for zone in &self.zones {
            if zone.start >= zone.end || zone.end > self.width {
                return Err(SchemaError::InvalidZoneRange {
                    zone: zone.name.clone(),
                    start: zone.start,
                    end: zone.end,
                    width: self.width,
                });
            }
            if let Some(prev) = previous {
                if zone.start < prev.end {
                    return Err(SchemaError::OverlappingZones {
                        zone: zone.name.clone(),
                        previous: prev.name.clone(),
                    });
                }
            }
            if !zone.contains(zone.text_column) {
                return Err(SchemaError::TextColumnOutsideZone {
                    zone: zone.name.clone(),
                    column: zone.text_column,
                });
            }
            if zone.anchors.is_empty() {
                return Err(SchemaError::NoAnchors(zone.name.clone()));
            }
            for anchor in &zone.anchors {
                if !zone.contains(anchor.column) || anchor.column <= zone.text_column {
                    return Err(SchemaError::MisplacedAnchor {
                        zone: zone.name.clone(),
                        column: anchor.column,
                    });
                }
            }
            previous = Some(zone);
        }

        for (kind, columns) in [
            ("Numeric", &self.numeric_columns),
            ("Date", &self.date_columns),
        ] {
            if let Some(&column) = columns.iter().find(|&&c| c >= self.width) {
                return Err(SchemaError::ColumnOutOfRange {
                    kind,
                    column,
                    width: self.width,
                });
            }
        }

        for rule in &self.scale_rules {
            if !rule.is_well_formed() || !self.numeric_columns.contains(&rule.column) {
                return Err(SchemaError::InvalidScaleRule(rule.name.clone()));
            }
        }

        Ok(())
    }

    /// Footer predicate: a row is data if enough of its cells are filled.
    pub fn is_data_row(&self, row: &[Cell]) -> bool {
        filled_cells(row) >= self.footer.min_filled
    }

    /// All anchors with the index of their zone, in column order.
    pub fn anchors(&self) -> impl Iterator<Item = (usize, &Anchor)> {
        self.zones
            .iter()
            .enumerate()
            .flat_map(|(i, z)| z.anchors.iter().map(move |a| (i, a)))
    }

    /// Scale rules scoped to a column.
    pub fn scale_rules_for(&self, column: usize) -> impl Iterator<Item = &ScaleRule> {
        self.scale_rules.iter().filter(move |r| r.column == column)
    }

    /// Human-readable label for a column.
    pub fn column_label(&self, column: usize) -> String {
        match self.column_names.get(column) {
            Some(name) => format!("{} ({})", name, column),
            None => format!("column {}", column),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_schemas_are_valid() {
        for broker in Broker::all() {
            let schema = broker.builtin_schema();
            assert_eq!(schema.broker, *broker);
            schema.validate().unwrap_or_else(|e| panic!("{}: {}", broker, e));
            assert_eq!(schema.column_names.len(), schema.width);
        }
    }

    #[test]
    fn test_broker_from_str() {
        assert_eq!("DHL".parse::<Broker>().unwrap(), Broker::Dhl);
        assert_eq!("Kuehne+Nagel".parse::<Broker>().unwrap(), Broker::KuehneNagel);
        assert_eq!("db-schenker".parse::<Broker>().unwrap(), Broker::Schenker);
        assert!("ups".parse::<Broker>().is_err());
    }

    #[test]
    fn test_schema_json_roundtrip_keeps_layout() {
        let schema = Broker::Dhl.builtin_schema();
        let parsed = BrokerSchema::from_json(&schema.to_json().unwrap()).unwrap();
        assert_eq!(parsed, schema);
    }

    #[test]
    fn test_overlapping_zones_rejected() {
        let mut schema = Broker::Dhl.builtin_schema();
        schema.zones[1].start = schema.zones[0].end - 1;
        assert!(matches!(
            schema.validate(),
            Err(SchemaError::OverlappingZones { .. })
        ));
    }

    #[test]
    fn test_anchor_before_text_column_rejected() {
        let mut schema = Broker::Dhl.builtin_schema();
        let zone = &mut schema.zones[0];
        zone.anchors[0].column = zone.text_column;
        assert!(matches!(
            schema.validate(),
            Err(SchemaError::MisplacedAnchor { .. })
        ));
    }

    #[test]
    fn test_scale_rule_must_target_numeric_column() {
        let mut schema = Broker::Dhl.builtin_schema();
        schema.scale_rules.push(ScaleRule::invoice_cents(0));
        assert!(matches!(
            schema.validate(),
            Err(SchemaError::InvalidScaleRule(_))
        ));
    }

    #[test]
    fn test_zero_window_rejected() {
        let mut schema = Broker::Schenker.builtin_schema();
        schema.windows.gap = 0;
        assert!(matches!(
            schema.validate(),
            Err(SchemaError::InvalidWindow("gap"))
        ));
    }

    #[test]
    fn test_optional_anchor_accepts_blank() {
        let anchor = Anchor::new(0, Classifier::IncotermCode).optional();
        assert!(anchor.holds(&[Cell::Absent]));
        assert!(anchor.holds(&[Cell::text("FOB")]));
        assert!(!anchor.holds(&[Cell::text("EUR")]));
        assert!(!Anchor::new(3, Classifier::NonEmpty).holds(&[Cell::text("x")]));
    }

    #[test]
    fn test_footer_rule() {
        let schema = Broker::Dhl.builtin_schema();
        let mut row = vec![Cell::Absent; schema.width];
        row[0] = Cell::text("Summe");
        row[18] = Cell::text("12.345,00");
        assert!(!schema.is_data_row(&row));
    }
}
