//! Domain models shared by the repair and unification stages.
//!
//! - [`Cell`] - a single raw or normalized value
//! - [`Row`] - an ordered, fixed-length sequence of cells
//! - [`Table`] - a decoded file: header names plus rows
//! - [`ShiftDescriptor`] / [`ShiftCategory`] - what the detector reports for a row

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

// =============================================================================
// Cells and rows
// =============================================================================

/// One cell of a broker export.
///
/// Serializes untagged: numbers as JSON numbers, text as strings and
/// [`Cell::Absent`] as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    /// Numeric value, either decoded by a spreadsheet loader or normalized.
    Number(f64),
    /// Raw or normalized text, kept verbatim.
    Text(String),
    /// No value.
    Absent,
}

/// A row is a plain vector of cells. Its length is fixed for a given file.
pub type Row = Vec<Cell>;

impl Cell {
    /// Build a text cell, mapping blank input to [`Cell::Absent`].
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.trim().is_empty() {
            Cell::Absent
        } else {
            Cell::Text(value)
        }
    }

    /// True for `Absent` and whitespace-only text.
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Absent => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(_) => false,
        }
    }

    /// Borrow the text content, if this is a text cell.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric content, if this is a number cell.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Render the cell the way it would appear in an export.
    ///
    /// Integral numbers are printed without a fractional part so that
    /// `Number(84713000.0)` renders as `84713000`.
    pub fn render(&self) -> Cow<'_, str> {
        match self {
            Cell::Text(s) => Cow::Borrowed(s.as_str()),
            Cell::Number(n) => Cow::Owned(format_number(*n)),
            Cell::Absent => Cow::Borrowed(""),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::text(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Count the non-blank cells of a row.
pub fn filled_cells(row: &[Cell]) -> usize {
    row.iter().filter(|c| !c.is_blank()).count()
}

// =============================================================================
// Tables
// =============================================================================

/// A decoded broker file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Column names from the header line, in file order.
    pub headers: Vec<String>,
    /// Data rows, each padded to the file width.
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Row>) -> Self {
        Self { headers, rows }
    }

    /// Width of the widest row or header.
    pub fn width(&self) -> usize {
        self.rows
            .iter()
            .map(|r| r.len())
            .chain(std::iter::once(self.headers.len()))
            .max()
            .unwrap_or(0)
    }

    /// Pad every row to the table width with absent cells.
    pub fn pad_rows(&mut self) {
        let width = self.width();
        for row in &mut self.rows {
            row.resize(width, Cell::Absent);
        }
    }
}

// =============================================================================
// Shift descriptors
// =============================================================================

/// Closed set of explanations for a misaligned row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftCategory {
    /// A zone's text field spilled into the zone's trailing columns.
    SingleZone,
    /// A zone's overflow pushed the next zone's anchor further than a
    /// zone-local search can see.
    Cascading,
    /// A free-text description spilled into a fixed-format code field.
    Description,
    /// Empty cells sit in front of an anchor value; nothing overflowed.
    StructuralGap,
    /// The anomaly matched none of the patterns above.
    Unclassifiable,
}

impl ShiftCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SingleZone => "single_zone",
            Self::Cascading => "cascading",
            Self::Description => "description",
            Self::StructuralGap => "structural_gap",
            Self::Unclassifiable => "unclassifiable",
        }
    }

    /// Whether the repair merges overflow text (as opposed to removing gaps).
    pub fn merges_text(&self) -> bool {
        matches!(self, Self::SingleZone | Self::Cascading | Self::Description)
    }
}

impl fmt::Display for ShiftCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where and how far a row is shifted.
///
/// `origin` is the text column that absorbs the overflow for merge repairs, or
/// the first gap cell for structural gaps. `magnitude` is the number of
/// columns the trailing cells moved right, so a repair moves them left by the
/// same amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftDescriptor {
    pub origin: usize,
    pub magnitude: isize,
    pub category: ShiftCategory,
}

impl ShiftDescriptor {
    pub fn new(origin: usize, magnitude: isize, category: ShiftCategory) -> Self {
        Self {
            origin,
            magnitude,
            category,
        }
    }
}

impl fmt::Display for ShiftDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} shift at column {} by {:+}",
            self.category, self.origin, self.magnitude
        )
    }
}
