//! Integer-scaled values.
//!
//! Some broker exports store masses and amounts as scaled integers (a net mass
//! of 210 kg arrives as `210000000`, an invoice value of 26 389,27 as
//! `2638927`). The encoding is column-specific and only recognizable by
//! magnitude, so it is expressed as explicit, named [`ScaleRule`]s attached to
//! a broker schema rather than inferred.
//!
//! A rule fires only for integral values inside
//! `(min_exclusive, min_exclusive * divisor]`. Everything it produces is at
//! most `min_exclusive`, so applying a rule to its own output is a no-op.

use serde::{Deserialize, Serialize};

/// Scaled-integer decoding rule for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleRule {
    /// Stable rule name, reported with every fix.
    pub name: String,
    /// Column the rule is scoped to.
    pub column: usize,
    /// Values at or below this magnitude are taken as already decoded.
    pub min_exclusive: f64,
    /// Power of ten the source multiplied by.
    pub divisor: f64,
}

/// What a rule decided for a value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScaleOutcome {
    /// Not a scaled value (fractional, or within the plausible range).
    Unchanged,
    /// Decoded value.
    Scaled(f64),
    /// Integral but beyond the range the rule knows about.
    OutOfRange,
}

impl ScaleRule {
    pub fn new(name: impl Into<String>, column: usize, min_exclusive: f64, divisor: f64) -> Self {
        Self {
            name: name.into(),
            column,
            min_exclusive,
            divisor,
        }
    }

    /// Masses exported in milligrams: anything above 10 t read as kilograms
    /// is implausible for a single declaration line.
    pub fn mass_milligrams(column: usize) -> Self {
        Self::new("mass_milligrams", column, 10_000_000.0, 1_000_000.0)
    }

    /// Invoice amounts exported as integer cents.
    pub fn invoice_cents(column: usize) -> Self {
        Self::new("invoice_cents", column, 1_000_000.0, 100.0)
    }

    /// Largest raw magnitude the rule decodes.
    pub fn max_inclusive(&self) -> f64 {
        self.min_exclusive * self.divisor
    }

    /// Decide whether `value` is a scaled integer under this rule.
    pub fn apply(&self, value: f64) -> ScaleOutcome {
        let magnitude = value.abs();
        if !value.is_finite() || value.fract() != 0.0 || magnitude <= self.min_exclusive {
            return ScaleOutcome::Unchanged;
        }
        if magnitude > self.max_inclusive() {
            return ScaleOutcome::OutOfRange;
        }
        ScaleOutcome::Scaled(value / self.divisor)
    }

    /// Structural sanity of the rule itself.
    pub fn is_well_formed(&self) -> bool {
        self.min_exclusive.is_finite()
            && self.min_exclusive > 0.0
            && self.divisor.is_finite()
            && self.divisor > 1.0
            && !self.name.trim().is_empty()
    }
}
