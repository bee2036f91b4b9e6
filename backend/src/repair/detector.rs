//! Shift detection.
//!
//! A row is aligned when every anchor of every populated zone satisfies its
//! classifier. When one does not, the detector looks for the pattern that
//! explains it and proposes a [`ShiftDescriptor`]. A proposal is only
//! returned if simulating its repair actually fixes the failing anchor
//! without breaking any anchor that held before.
//!
//! Candidates are tried in this order:
//!
//! 1. structural gap: the anchor is empty and its value sits a few columns
//!    further right, behind empty cells only
//! 2. zone-local (party) or description (goods) overflow: the zone's text
//!    column spilled into the following cells
//! 3. cascading overflow: the spill is wider than the zone-local window and
//!    is confirmed through the anchor of the next zone
//!
//! Within a pattern the smallest magnitude wins.

use crate::models::{Cell, ShiftCategory, ShiftDescriptor};
use crate::schema::{Anchor, BrokerSchema, Zone, ZoneKind};

use super::engine::apply_shift;

/// Outcome of examining one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    /// Every anchor of every populated zone holds.
    Clean,
    /// A verified, repairable shift.
    Shift(ShiftDescriptor),
    /// An anchor fails and no known pattern explains it. The descriptor
    /// points at the failing anchor and carries no magnitude.
    Unclassifiable(ShiftDescriptor),
}

impl Detection {
    pub fn is_clean(&self) -> bool {
        matches!(self, Detection::Clean)
    }

    pub fn descriptor(&self) -> Option<&ShiftDescriptor> {
        match self {
            Detection::Clean => None,
            Detection::Shift(d) | Detection::Unclassifiable(d) => Some(d),
        }
    }
}

/// Examine a row against a schema.
///
/// The row is not modified. Zones whose cells are all empty are treated as
/// not present and never examined.
pub fn detect_shift(row: &[Cell], schema: &BrokerSchema) -> Detection {
    let Some((zone_idx, primary)) = first_failure(row, schema) else {
        return Detection::Clean;
    };
    let zone = &schema.zones[zone_idx];

    if let Some(d) = structural_gap(row, schema, primary) {
        return Detection::Shift(d);
    }
    if let Some(d) = local_overflow(row, schema, zone, primary) {
        return Detection::Shift(d);
    }
    if let Some(d) = cascading_overflow(row, schema, zone_idx, primary) {
        return Detection::Shift(d);
    }

    Detection::Unclassifiable(ShiftDescriptor::new(
        primary.column,
        0,
        ShiftCategory::Unclassifiable,
    ))
}

/// First populated zone with a failing anchor, and that anchor.
fn first_failure<'a>(row: &[Cell], schema: &'a BrokerSchema) -> Option<(usize, &'a Anchor)> {
    schema
        .zones
        .iter()
        .enumerate()
        .filter(|(_, zone)| !zone.is_vacant(row))
        .find_map(|(i, zone)| zone.first_failing_anchor(row).map(|a| (i, a)))
}

/// Pass/fail per anchor in schema order; `None` for anchors of vacant zones.
pub(crate) fn anchor_states(row: &[Cell], schema: &BrokerSchema) -> Vec<Option<bool>> {
    schema
        .zones
        .iter()
        .flat_map(|zone| {
            let vacant = zone.is_vacant(row);
            zone.anchors
                .iter()
                .map(move |a| (!vacant).then(|| a.holds(row)))
        })
        .collect()
}

/// Anchors of populated zones that do not hold.
pub(crate) fn failing_anchors<'a>(row: &[Cell], schema: &'a BrokerSchema) -> Vec<&'a Anchor> {
    schema
        .anchors()
        .zip(anchor_states(row, schema))
        .filter(|(_, state)| *state == Some(false))
        .map(|((_, anchor), _)| anchor)
        .collect()
}

/// Simulate a repair and accept it only if it helps without collateral damage.
fn verify(row: &[Cell], schema: &BrokerSchema, target: &Anchor, shift: &ShiftDescriptor) -> bool {
    let mut simulated = row.to_vec();
    if !apply_shift(&mut simulated, shift) || !target.holds(&simulated) {
        return false;
    }

    let before = anchor_states(row, schema);
    let after = anchor_states(&simulated, schema);
    let failing = |states: &[Option<bool>]| states.iter().filter(|s| **s == Some(false)).count();
    if failing(&after) >= failing(&before) {
        return false;
    }
    before
        .iter()
        .zip(&after)
        .all(|(b, a)| *b != Some(true) || *a == Some(true))
}

/// Any non-empty cell in `(text_column, text_column + magnitude]`.
fn has_fragment(row: &[Cell], text_column: usize, magnitude: usize) -> bool {
    row.iter()
        .skip(text_column + 1)
        .take(magnitude)
        .any(|c| !c.is_blank())
}

fn structural_gap(row: &[Cell], schema: &BrokerSchema, anchor: &Anchor) -> Option<ShiftDescriptor> {
    if !row.get(anchor.column)?.is_blank() {
        return None;
    }
    for j in 1..=schema.windows.gap {
        let cell = row.get(anchor.column + j)?;
        if cell.is_blank() {
            continue;
        }
        // Only empty cells may separate the anchor from its value.
        if !anchor.classifier.matches(cell) {
            return None;
        }
        let shift = ShiftDescriptor::new(anchor.column, j as isize, ShiftCategory::StructuralGap);
        return verify(row, schema, anchor, &shift).then_some(shift);
    }
    None
}

fn local_overflow(
    row: &[Cell],
    schema: &BrokerSchema,
    zone: &Zone,
    anchor: &Anchor,
) -> Option<ShiftDescriptor> {
    if row.get(zone.text_column).map_or(true, Cell::is_blank) {
        return None;
    }
    let (window, category) = match zone.kind {
        ZoneKind::Party => (schema.windows.local, ShiftCategory::SingleZone),
        ZoneKind::Goods => (schema.windows.description, ShiftCategory::Description),
    };

    (1..=window)
        .take_while(|j| anchor.column + j < row.len())
        .filter(|&j| anchor.classifier.matches(&row[anchor.column + j]))
        .filter(|&j| has_fragment(row, zone.text_column, j))
        .map(|j| ShiftDescriptor::new(zone.text_column, j as isize, category))
        .find(|shift| verify(row, schema, anchor, shift))
}

fn cascading_overflow(
    row: &[Cell],
    schema: &BrokerSchema,
    zone_idx: usize,
    anchor: &Anchor,
) -> Option<ShiftDescriptor> {
    let zone = &schema.zones[zone_idx];
    let next = schema.zones.get(zone_idx + 1)?;
    let next_anchor = next.first_failing_anchor(row)?;
    if row.get(zone.text_column).map_or(true, Cell::is_blank) {
        return None;
    }

    (1..=schema.windows.cascade)
        .take_while(|j| next_anchor.column + j < row.len())
        .filter(|&j| next_anchor.classifier.matches(&row[next_anchor.column + j]))
        .filter(|&j| has_fragment(row, zone.text_column, j))
        .map(|j| ShiftDescriptor::new(zone.text_column, j as isize, ShiftCategory::Cascading))
        .find(|shift| verify(row, schema, anchor, shift))
}
