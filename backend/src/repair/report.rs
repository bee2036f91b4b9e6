//! Validation report.
//!
//! Every mutation and every unresolved anomaly of a run is recorded as an
//! [`Issue`]. A report is assembled by the run that produces it and is
//! read-only for callers afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::ShiftDescriptor;

/// Fixes were applied confidently; warnings need a human decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Fix,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// A detected shift was repaired.
    ShiftFix,
    /// Text converted to a number.
    NumberFix,
    /// A scaled integer was decoded by a named rule.
    ScaleFix,
    /// A date was rewritten in canonical form.
    DateFix,
    /// The row is misaligned in a way no pattern explains.
    UnclassifiableShift,
    /// An anchor still fails after repair.
    AnchorMismatch,
    /// A numeric column holds text that is not a number.
    NumberUnparseable,
    /// A date column holds text no date rule accepts.
    DateUnparseable,
    /// An integral value exceeds the range its scale rule covers.
    ScaleOutOfRange,
    /// A header column matched no canonical column.
    UnmappedColumn,
    /// A row had a value past the end of its file's header; it was dropped.
    ValueOutsideHeader,
}

impl IssueKind {
    pub fn severity(&self) -> Severity {
        match self {
            Self::ShiftFix | Self::NumberFix | Self::ScaleFix | Self::DateFix => Severity::Fix,
            _ => Severity::Warning,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ShiftFix => "shift_fix",
            Self::NumberFix => "number_fix",
            Self::ScaleFix => "scale_fix",
            Self::DateFix => "date_fix",
            Self::UnclassifiableShift => "unclassifiable_shift",
            Self::AnchorMismatch => "anchor_mismatch",
            Self::NumberUnparseable => "number_unparseable",
            Self::DateUnparseable => "date_unparseable",
            Self::ScaleOutOfRange => "scale_out_of_range",
            Self::UnmappedColumn => "unmapped_column",
            Self::ValueOutsideHeader => "value_outside_header",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded fix or warning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// Zero-based data row index, absent for header-level issues.
    pub row: Option<usize>,
    /// Source file, for issues raised while unifying several files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub column: Option<usize>,
    pub kind: IssueKind,
    pub severity: Severity,
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shift: Option<ShiftDescriptor>,
}

impl Issue {
    pub fn new(kind: IssueKind, detail: impl Into<String>) -> Self {
        Self {
            row: None,
            file: None,
            column: None,
            kind,
            severity: kind.severity(),
            detail: detail.into(),
            before: None,
            after: None,
            shift: None,
        }
    }

    pub fn with_row(mut self, row: usize) -> Self {
        self.row = Some(row);
        self
    }

    pub fn with_column(mut self, column: usize) -> Self {
        self.column = Some(column);
        self
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_values(mut self, before: impl Into<String>, after: impl Into<String>) -> Self {
        self.before = Some(before.into());
        self.after = Some(after.into());
        self
    }

    pub fn with_shift(mut self, shift: ShiftDescriptor) -> Self {
        self.shift = Some(shift);
        self
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref file) = self.file {
            write!(f, "{}: ", file)?;
        }
        match (self.row, self.column) {
            (Some(row), Some(col)) => write!(f, "row {}, column {}: ", row, col)?,
            (Some(row), None) => write!(f, "row {}: ", row)?,
            (None, Some(col)) => write!(f, "column {}: ", col)?,
            (None, None) => {}
        }
        write!(f, "[{}] {}", self.kind, self.detail)
    }
}

/// Outcome of one validation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    issues: Vec<Issue>,
    fix_count: usize,
    warning_count: usize,
    rows_processed: usize,
    rows_skipped: usize,
}

impl ValidationReport {
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn fix_count(&self) -> usize {
        self.fix_count
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    /// Data rows examined.
    pub fn rows_processed(&self) -> usize {
        self.rows_processed
    }

    /// Rows rejected by the footer rule.
    pub fn rows_skipped(&self) -> usize {
        self.rows_skipped
    }

    /// No warnings were recorded.
    pub fn is_clean(&self) -> bool {
        self.warning_count == 0
    }

    pub fn count(&self, kind: IssueKind) -> usize {
        self.issues.iter().filter(|i| i.kind == kind).count()
    }

    pub fn fixes(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.severity == Severity::Fix)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }

    pub fn issues_for_row(&self, row: usize) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(move |i| i.row == Some(row))
    }

    /// Rows that carry at least one warning.
    pub fn rows_with_warnings(&self) -> Vec<usize> {
        let mut rows: Vec<usize> = self.warnings().filter_map(|i| i.row).collect();
        rows.sort_unstable();
        rows.dedup();
        rows
    }

    /// One-line counts for logs.
    pub fn summary(&self) -> String {
        format!(
            "Processed: {} rows ({} skipped), {} fixes ({} shifts), {} warnings",
            self.rows_processed,
            self.rows_skipped,
            self.fix_count,
            self.count(IssueKind::ShiftFix),
            self.warning_count
        )
    }
}

/// Accumulates a report during a run.
#[derive(Debug, Default)]
pub(crate) struct ReportBuilder {
    report: ValidationReport,
}

impl ReportBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, issue: Issue) {
        match issue.severity {
            Severity::Fix => self.report.fix_count += 1,
            Severity::Warning => self.report.warning_count += 1,
        }
        self.report.issues.push(issue);
    }

    pub(crate) fn extend(&mut self, issues: impl IntoIterator<Item = Issue>) {
        for issue in issues {
            self.push(issue);
        }
    }

    pub(crate) fn row_processed(&mut self) {
        self.report.rows_processed += 1;
    }

    pub(crate) fn row_skipped(&mut self) {
        self.report.rows_skipped += 1;
    }

    pub(crate) fn finish(self) -> ValidationReport {
        self.report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ShiftCategory;

    #[test]
    fn test_counts_follow_severity() {
        let mut builder = ReportBuilder::new();
        builder.push(Issue::new(IssueKind::NumberFix, "75,5 -> 75.5").with_row(0));
        builder.push(Issue::new(IssueKind::DateUnparseable, "next week").with_row(1));
        builder.row_processed();
        builder.row_processed();
        builder.row_skipped();
        let report = builder.finish();

        assert_eq!(report.fix_count(), 1);
        assert_eq!(report.warning_count(), 1);
        assert_eq!(report.rows_processed(), 2);
        assert_eq!(report.rows_skipped(), 1);
        assert!(!report.is_clean());
        assert_eq!(report.rows_with_warnings(), vec![1]);
    }

    #[test]
    fn test_issue_display() {
        let issue = Issue::new(IssueKind::ShiftFix, "merged 2 cells")
            .with_row(4)
            .with_column(12)
            .with_shift(ShiftDescriptor::new(12, 1, ShiftCategory::Description));
        assert_eq!(issue.to_string(), "row 4, column 12: [shift_fix] merged 2 cells");
        assert_eq!(issue.severity, Severity::Fix);
    }

    #[test]
    fn test_report_serializes_counts() {
        let mut builder = ReportBuilder::new();
        builder.push(
            Issue::new(IssueKind::UnmappedColumn, "Bemerkung").with_file("dachser_2021.csv"),
        );
        let json = serde_json::to_value(builder.finish()).unwrap();
        assert_eq!(json["warning_count"], 1);
        assert_eq!(json["issues"][0]["kind"], "unmapped_column");
        assert_eq!(json["issues"][0]["file"], "dachser_2021.csv");
        assert!(json["issues"][0].get("before").is_none());
    }
}
