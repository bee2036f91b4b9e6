//! Row repair engine.
//!
//! Each data row is driven to a fixed point: shifts are detected and repaired
//! until the detector is satisfied, then numeric, scaled and date columns are
//! normalized, and the whole round repeats until nothing changes. Warnings
//! are derived from the final state of the row only, which is what makes a
//! second pass over repaired rows report zero fixes and the same warnings.

use crate::error::RepairError;
use crate::models::{Cell, Row, ShiftCategory, ShiftDescriptor};
use crate::normalize::{canonical_date, parse_date, parse_number_str, ScaleOutcome};
use crate::schema::BrokerSchema;

use super::detector::{detect_shift, failing_anchors, Detection};
use super::report::{Issue, IssueKind, ReportBuilder, ValidationReport};

/// Shift repairs attempted per round before giving up on a row.
const MAX_REPAIRS_PER_ROUND: usize = 8;

/// Repair/normalize rounds per row.
const MAX_ROUNDS: usize = 4;

/// Repair and normalize `rows` in place.
///
/// Rows failing the schema's footer rule are counted as skipped and left
/// untouched. The rule is applied to the row as it would be after repair, so
/// a row that only reaches the threshold through unmerged fragments is
/// skipped on every pass. Row lengths never change.
///
/// # Errors
///
/// - [`RepairError::Schema`] if the schema does not validate
/// - [`RepairError::RowTooNarrow`] if any row is narrower than the schema;
///   no row is modified in that case
pub fn repair_and_normalize(
    rows: &mut [Row],
    schema: &BrokerSchema,
) -> Result<ValidationReport, RepairError> {
    schema.validate()?;
    if let Some((idx, row)) = rows
        .iter()
        .enumerate()
        .find(|(_, row)| row.len() < schema.width)
    {
        return Err(RepairError::RowTooNarrow {
            row: idx,
            expected: schema.width,
            found: row.len(),
        });
    }

    let mut report = ReportBuilder::new();
    for (idx, row) in rows.iter_mut().enumerate() {
        if !schema.is_data_row(row) {
            report.row_skipped();
            continue;
        }
        // Merges absorb cells, so the footer rule is judged on the repaired row.
        let mut repaired = row.clone();
        let issues = repair_row(idx, &mut repaired, schema);
        if !schema.is_data_row(&repaired) {
            report.row_skipped();
            continue;
        }
        *row = repaired;
        report.row_processed();
        report.extend(issues);
    }
    Ok(report.finish())
}

/// Apply a shift repair to a row.
///
/// Merge categories join the trimmed non-empty cells of
/// `origin ..= origin + magnitude` with single spaces into `origin` and move
/// the rest of the row left. A structural gap drops the empty cells
/// `origin .. origin + magnitude`. Either way the row is padded back to its
/// original length with absent cells.
///
/// Returns `false` (and leaves the row alone) for unclassifiable
/// descriptors, non-positive magnitudes and origins outside the row.
pub fn apply_shift(row: &mut Vec<Cell>, shift: &ShiftDescriptor) -> bool {
    if shift.category == ShiftCategory::Unclassifiable
        || shift.magnitude <= 0
        || shift.origin + 1 >= row.len()
    {
        return false;
    }
    let origin = shift.origin;
    let magnitude = (shift.magnitude as usize).min(row.len() - 1 - origin);

    if shift.category.merges_text() {
        let merged = row[origin..=origin + magnitude]
            .iter()
            .filter(|c| !c.is_blank())
            .map(|c| c.render().trim().to_string())
            .collect::<Vec<_>>()
            .join(" ");
        row[origin] = Cell::text(merged);
        row.drain(origin + 1..=origin + magnitude);
    } else {
        row.drain(origin..origin + magnitude);
    }
    row.extend(std::iter::repeat(Cell::Absent).take(magnitude));
    true
}

fn render_span(row: &[Cell], shift: &ShiftDescriptor) -> String {
    let end = (shift.origin + shift.magnitude.max(0) as usize).min(row.len().saturating_sub(1));
    row[shift.origin..=end]
        .iter()
        .map(|c| c.render().into_owned())
        .collect::<Vec<_>>()
        .join(" | ")
}

fn repair_row(idx: usize, row: &mut Row, schema: &BrokerSchema) -> Vec<Issue> {
    let mut issues = Vec::new();
    let mut warnings = Vec::new();

    for _ in 0..MAX_ROUNDS {
        let mut changed = false;

        for _ in 0..MAX_REPAIRS_PER_ROUND {
            let Detection::Shift(shift) = detect_shift(row, schema) else {
                break;
            };
            let before = render_span(row, &shift);
            if !apply_shift(row, &shift) {
                break;
            }
            let zone = schema
                .zones
                .iter()
                .find(|z| z.contains(shift.origin))
                .map_or("row", |z| z.name.as_str());
            issues.push(
                Issue::new(IssueKind::ShiftFix, format!("{}: {}", zone, shift))
                    .with_row(idx)
                    .with_column(shift.origin)
                    .with_values(before, row[shift.origin].render())
                    .with_shift(shift),
            );
            changed = true;
        }

        // A row the detector cannot explain keeps its cells as found.
        let rewrite = !matches!(detect_shift(row, schema), Detection::Unclassifiable(_));
        let outcome = normalize_row(idx, row, schema, rewrite);
        changed |= !outcome.fixes.is_empty();
        issues.extend(outcome.fixes);
        warnings = outcome.warnings;

        if !changed {
            break;
        }
    }

    let mut unclassified = None;
    if let Detection::Unclassifiable(shift) = detect_shift(row, schema) {
        unclassified = Some(shift.origin);
        issues.push(
            Issue::new(
                IssueKind::UnclassifiableShift,
                format!(
                    "{} fails {} and no known shift pattern explains it",
                    schema.column_label(shift.origin),
                    classifier_name(schema, shift.origin)
                ),
            )
            .with_row(idx)
            .with_column(shift.origin)
            .with_shift(shift),
        );
    }
    for anchor in failing_anchors(row, schema) {
        if unclassified == Some(anchor.column) {
            continue;
        }
        issues.push(
            Issue::new(
                IssueKind::AnchorMismatch,
                format!(
                    "{} expected {}, found '{}'",
                    schema.column_label(anchor.column),
                    anchor.classifier.name(),
                    row[anchor.column]
                ),
            )
            .with_row(idx)
            .with_column(anchor.column),
        );
    }
    issues.extend(warnings);
    issues
}

fn classifier_name(schema: &BrokerSchema, column: usize) -> &'static str {
    schema
        .anchors()
        .find(|(_, a)| a.column == column)
        .map_or("its anchor", |(_, a)| a.classifier.name())
}

#[derive(Default)]
struct Normalization {
    fixes: Vec<Issue>,
    warnings: Vec<Issue>,
}

/// Normalize numeric, scaled and date columns.
///
/// With `rewrite` off nothing is modified; only values that would not parse
/// are reported.
fn normalize_row(idx: usize, row: &mut Row, schema: &BrokerSchema, rewrite: bool) -> Normalization {
    let mut out = Normalization::default();

    for &col in &schema.numeric_columns {
        let label = schema.column_label(col);
        let cell = &mut row[col];

        if let Some(raw) = cell.as_text().filter(|s| !s.trim().is_empty()).map(str::to_string) {
            match parse_number_str(&raw) {
                Some(_) if !rewrite => {}
                Some(value) => {
                    *cell = Cell::Number(value);
                    out.fixes.push(
                        Issue::new(IssueKind::NumberFix, format!("{} parsed as number", label))
                            .with_row(idx)
                            .with_column(col)
                            .with_values(raw, cell.render()),
                    );
                }
                None => out.warnings.push(
                    Issue::new(IssueKind::NumberUnparseable, format!("{} is not a number", label))
                        .with_row(idx)
                        .with_column(col)
                        .with_values(raw.clone(), raw),
                ),
            }
        }

        let Some(value) = cell.as_number().filter(|_| rewrite) else {
            continue;
        };
        for rule in schema.scale_rules_for(col) {
            match rule.apply(value) {
                ScaleOutcome::Unchanged => continue,
                ScaleOutcome::Scaled(decoded) => {
                    *cell = Cell::Number(decoded);
                    out.fixes.push(
                        Issue::new(IssueKind::ScaleFix, format!("{} decoded by {}", label, rule.name))
                            .with_row(idx)
                            .with_column(col)
                            .with_values(Cell::Number(value).render(), cell.render()),
                    );
                }
                ScaleOutcome::OutOfRange => out.warnings.push(
                    Issue::new(
                        IssueKind::ScaleOutOfRange,
                        format!(
                            "{} exceeds the range of {} (max {})",
                            label,
                            rule.name,
                            Cell::Number(rule.max_inclusive())
                        ),
                    )
                    .with_row(idx)
                    .with_column(col),
                ),
            }
            break;
        }
    }

    for &col in &schema.date_columns {
        let label = schema.column_label(col);
        let cell = &mut row[col];
        if cell.is_blank() {
            continue;
        }
        match parse_date(cell) {
            Some(_) if !rewrite => {}
            Some(date) => {
                let canonical = Cell::Text(canonical_date(date));
                if *cell != canonical {
                    out.fixes.push(
                        Issue::new(IssueKind::DateFix, format!("{} normalized", label))
                            .with_row(idx)
                            .with_column(col)
                            .with_values(cell.render(), canonical.render()),
                    );
                    *cell = canonical;
                }
            }
            None => out.warnings.push(
                Issue::new(IssueKind::DateUnparseable, format!("{} is not a date", label))
                    .with_row(idx)
                    .with_column(col)
                    .with_values(cell.render(), cell.render()),
            ),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RepairError;
    use crate::repair::Severity;
    use crate::schema::Broker;

    fn t(s: &str) -> Cell {
        Cell::text(s)
    }

    fn dachser_row() -> Row {
        vec![
            t("SN-1001"),
            t("13.01.2025"),
            t("Muster GmbH"),
            t("Hauptstraße 5"),
            t("10115"),
            t("Berlin"),
            t("DE"),
            t("Bluetooth headphones"),
            t("85183000"),
            t("4000"),
            t("CN"),
            t("26.389,27"),
            t("EUR"),
            t("120,5"),
            Cell::Absent,
            Cell::Absent,
        ]
    }

    fn insert(row: &mut Row, at: usize, cell: Cell) {
        row.insert(at, cell);
        row.pop();
    }

    fn repaired_dachser_row() -> Row {
        let mut row = dachser_row();
        row[1] = t("2025-01-13");
        row[11] = Cell::Number(26389.27);
        row[13] = Cell::Number(120.5);
        row
    }

    fn dhl_row() -> Row {
        let mut row = vec![
            t("DE2025000123"),
            t("13.01.2025"),
            t("Shenzhen Trading Co"),
            t("Nanshan Road 12"),
            t("518000"),
            t("Shenzhen"),
            t("CN"),
            t("Muster GmbH"),
            t("Hauptstraße 5"),
            t("10115"),
            t("Berlin"),
            t("DE"),
            t("Headphones"),
            t("85183000"),
            t("CN"),
            t("4000"),
            t("120,5"),
            t("130"),
            t("26.389,27"),
            t("EUR"),
            t("FOB"),
            t("26.500,00"),
            t("1.060,00"),
            t("5.236,70"),
        ];
        row.extend(std::iter::repeat(Cell::Absent).take(6));
        row
    }

    #[test]
    fn test_apply_merge_keeps_length() {
        let mut row = vec![t("a"), t("b"), Cell::Absent, t("c"), t("d")];
        let shift = ShiftDescriptor::new(0, 2, ShiftCategory::SingleZone);
        assert!(apply_shift(&mut row, &shift));
        assert_eq!(row, vec![t("a b"), t("c"), t("d"), Cell::Absent, Cell::Absent]);
    }

    #[test]
    fn test_apply_merge_trims_fragments() {
        let mut row = vec![t("Muster GmbH "), t(" Hinterhaus"), t("DE")];
        let shift = ShiftDescriptor::new(0, 1, ShiftCategory::SingleZone);
        assert!(apply_shift(&mut row, &shift));
        assert_eq!(row, vec![t("Muster GmbH Hinterhaus"), t("DE"), Cell::Absent]);
    }

    #[test]
    fn test_apply_gap_drops_empty_cells() {
        let mut row = vec![t("x"), Cell::Absent, Cell::Absent, t("DE"), t("y")];
        let shift = ShiftDescriptor::new(1, 2, ShiftCategory::StructuralGap);
        assert!(apply_shift(&mut row, &shift));
        assert_eq!(row, vec![t("x"), t("DE"), t("y"), Cell::Absent, Cell::Absent]);
    }

    #[test]
    fn test_apply_ignores_unclassifiable() {
        let mut row = vec![t("x"), t("y")];
        let shift = ShiftDescriptor::new(0, 0, ShiftCategory::Unclassifiable);
        assert!(!apply_shift(&mut row, &shift));
        assert_eq!(row, vec![t("x"), t("y")]);
    }

    #[test]
    fn test_description_overflow_scenario() {
        let schema = Broker::Dachser.builtin_schema();
        let mut rows = vec![dachser_row()];
        insert(&mut rows[0], 8, t("with charging case"));

        let report = repair_and_normalize(&mut rows, &schema).unwrap();

        assert_eq!(report.count(IssueKind::ShiftFix), 1);
        assert_eq!(report.warning_count(), 0);
        let mut expected = repaired_dachser_row();
        expected[7] = t("Bluetooth headphones with charging case");
        assert_eq!(rows[0], expected);

        let fix = &report.issues()[0];
        assert_eq!(fix.kind, IssueKind::ShiftFix);
        assert_eq!(
            fix.shift,
            Some(ShiftDescriptor::new(7, 1, ShiftCategory::Description))
        );
        assert_eq!(fix.after.as_deref(), Some("Bluetooth headphones with charging case"));
    }

    #[test]
    fn test_structural_gap_scenario() {
        let schema = Broker::Dachser.builtin_schema();
        let mut rows = vec![dachser_row()];
        rows[0][6] = Cell::Absent;
        insert(&mut rows[0], 7, t("DE"));

        let report = repair_and_normalize(&mut rows, &schema).unwrap();

        let shifts: Vec<_> = report
            .issues()
            .iter()
            .filter_map(|i| i.shift)
            .collect();
        assert_eq!(
            shifts,
            vec![ShiftDescriptor::new(6, 1, ShiftCategory::StructuralGap)]
        );
        assert_eq!(rows[0], repaired_dachser_row());
        assert!(report.is_clean());
    }

    #[test]
    fn test_second_pass_is_a_no_op() {
        let schema = Broker::Dachser.builtin_schema();
        let mut overflow = dachser_row();
        insert(&mut overflow, 4, t("Hinterhaus"));
        insert(&mut overflow, 9, t("Farbe schwarz"));
        let mut broken = dachser_row();
        broken[12] = t("Euro");
        broken[13] = t("n/a");
        let mut cents = dachser_row();
        cents[11] = t("2638927");
        let mut footer = vec![Cell::Absent; 16];
        footer[0] = t("Summe");
        footer[1] = t("3");
        let mut rows = vec![overflow, broken, cents, footer];

        let first = repair_and_normalize(&mut rows, &schema).unwrap();
        assert_eq!(first.count(IssueKind::ShiftFix), 2);
        let after_first = rows.clone();

        let second = repair_and_normalize(&mut rows, &schema).unwrap();
        assert_eq!(second.fix_count(), 0);
        assert_eq!(rows, after_first);

        let first_warnings: Vec<_> = first.warnings().cloned().collect();
        let second_warnings: Vec<_> = second.warnings().cloned().collect();
        assert_eq!(first_warnings, second_warnings);
        assert_eq!(second.rows_skipped(), 1);
    }

    #[test]
    fn test_failing_anchors_always_carry_a_warning() {
        let schema = Broker::Dachser.builtin_schema();
        let mut row = dachser_row();
        row[6] = t("Deutschland");
        row[12] = t("Euro");
        let mut rows = vec![row];

        let report = repair_and_normalize(&mut rows, &schema).unwrap();

        for anchor in failing_anchors(&rows[0], &schema) {
            assert!(
                report
                    .warnings()
                    .any(|w| w.row == Some(0) && w.column == Some(anchor.column)),
                "anchor {} has no warning",
                anchor.column
            );
        }
        assert_eq!(report.count(IssueKind::UnclassifiableShift), 1);
        assert_eq!(report.count(IssueKind::AnchorMismatch), 1);
        assert_eq!(report.count(IssueKind::ShiftFix), 0);
    }

    #[test]
    fn test_integer_cents_decoded() {
        let schema = Broker::Dachser.builtin_schema();
        let mut row = dachser_row();
        row[11] = t("2638927");
        let mut rows = vec![row];

        let report = repair_and_normalize(&mut rows, &schema).unwrap();

        assert_eq!(rows[0][11], Cell::Number(26389.27));
        assert_eq!(report.count(IssueKind::NumberFix), 2);
        assert_eq!(report.count(IssueKind::ScaleFix), 1);
    }

    #[test]
    fn test_out_of_range_scale_is_a_warning() {
        let schema = Broker::Dachser.builtin_schema();
        let mut row = dachser_row();
        row[11] = Cell::Number(500_000_000.0);
        let mut rows = vec![row];

        let report = repair_and_normalize(&mut rows, &schema).unwrap();

        assert_eq!(rows[0][11], Cell::Number(500_000_000.0));
        assert_eq!(report.count(IssueKind::ScaleOutOfRange), 1);
        assert!(report
            .issues()
            .iter()
            .filter(|i| i.kind == IssueKind::ScaleOutOfRange)
            .all(|i| i.severity == Severity::Warning));
    }

    #[test]
    fn test_unparseable_values_are_left_alone() {
        let schema = Broker::Dachser.builtin_schema();
        let mut row = dachser_row();
        row[1] = t("next week");
        row[13] = t("ca. 120 kg");
        let mut rows = vec![row];

        let report = repair_and_normalize(&mut rows, &schema).unwrap();

        assert_eq!(rows[0][1], t("next week"));
        assert_eq!(rows[0][13], t("ca. 120 kg"));
        assert_eq!(report.count(IssueKind::DateUnparseable), 1);
        assert_eq!(report.count(IssueKind::NumberUnparseable), 1);
    }

    #[test]
    fn test_footer_rows_are_skipped() {
        let schema = Broker::Dachser.builtin_schema();
        let mut footer = vec![Cell::Absent; 16];
        footer[0] = t("Summe");
        footer[11] = t("52.778,54");
        let mut rows = vec![dachser_row(), footer.clone()];

        let report = repair_and_normalize(&mut rows, &schema).unwrap();

        assert_eq!(report.rows_processed(), 1);
        assert_eq!(report.rows_skipped(), 1);
        assert_eq!(rows[1], footer);
    }

    #[test]
    fn test_narrow_row_is_structural() {
        let schema = Broker::Dachser.builtin_schema();
        let mut rows = vec![dachser_row(), vec![t("SN-1"), t("x"), t("y")]];
        let before = rows.clone();

        let err = repair_and_normalize(&mut rows, &schema).unwrap_err();

        assert!(matches!(
            err,
            RepairError::RowTooNarrow { row: 1, expected: 14, found: 3 }
        ));
        assert_eq!(rows, before);
    }

    #[test]
    fn test_invalid_schema_is_structural() {
        let mut schema = Broker::Dachser.builtin_schema();
        schema.zones[0].anchors.clear();
        let mut rows = vec![dachser_row()];
        assert!(matches!(
            repair_and_normalize(&mut rows, &schema),
            Err(RepairError::Schema(_))
        ));
    }

    #[test]
    fn test_two_column_structural_gap() {
        let schema = Broker::Dachser.builtin_schema();
        let mut rows = vec![dachser_row()];
        rows[0][6] = Cell::Absent;
        insert(&mut rows[0], 7, Cell::Absent);
        insert(&mut rows[0], 8, t("DE"));

        let first = repair_and_normalize(&mut rows, &schema).unwrap();

        let shifts: Vec<_> = first.issues().iter().filter_map(|i| i.shift).collect();
        assert_eq!(
            shifts,
            vec![ShiftDescriptor::new(6, 2, ShiftCategory::StructuralGap)]
        );
        assert_eq!(rows[0], repaired_dachser_row());
        assert!(first.is_clean());

        let after_first = rows.clone();
        let second = repair_and_normalize(&mut rows, &schema).unwrap();
        assert_eq!(second.fix_count(), 0);
        assert_eq!(rows, after_first);
    }

    #[test]
    fn test_cascading_overflow_is_repaired_once() {
        let schema = Broker::Dhl.builtin_schema();
        let mut row = dhl_row();
        let fragments = ["Block A", "Floor 3", "Unit 7", "Tower B", "Gate 2", "Wing C"];
        for (i, frag) in fragments.iter().enumerate() {
            insert(&mut row, 4 + i, t(frag));
        }
        let mut rows = vec![row];

        let first = repair_and_normalize(&mut rows, &schema).unwrap();

        let shifts: Vec<_> = first.issues().iter().filter_map(|i| i.shift).collect();
        assert_eq!(
            shifts,
            vec![ShiftDescriptor::new(3, 6, ShiftCategory::Cascading)]
        );
        assert_eq!(
            rows[0][3],
            t("Nanshan Road 12 Block A Floor 3 Unit 7 Tower B Gate 2 Wing C")
        );
        assert_eq!(rows[0][6], t("CN"));
        assert_eq!(rows[0][11], t("DE"));
        assert_eq!(rows[0][13], t("85183000"));
        assert_eq!(rows[0][18], Cell::Number(26389.27));
        assert_eq!(first.warning_count(), 0);

        let after_first = rows.clone();
        let second = repair_and_normalize(&mut rows, &schema).unwrap();
        assert_eq!(second.fix_count(), 0);
        assert_eq!(second.warning_count(), 0);
        assert_eq!(rows, after_first);
    }

    #[test]
    fn test_unclassifiable_row_is_left_as_found() {
        let schema = Broker::Dhl.builtin_schema();
        let mut row = dhl_row();
        let fragments = ["in black", "with case", "two pieces", "boxed", "set of two"];
        for (i, frag) in fragments.iter().enumerate() {
            insert(&mut row, 13 + i, t(frag));
        }
        let mut rows = vec![row];
        let before = rows.clone();

        let first = repair_and_normalize(&mut rows, &schema).unwrap();

        assert_eq!(rows, before);
        assert_eq!(rows[0][18], t("85183000"));
        assert_eq!(first.count(IssueKind::UnclassifiableShift), 1);
        assert_eq!(first.fix_count(), 0);
        assert_eq!(first.count(IssueKind::NumberUnparseable), 2);

        let second = repair_and_normalize(&mut rows, &schema).unwrap();
        assert_eq!(rows, before);
        let first_warnings: Vec<_> = first.warnings().cloned().collect();
        let second_warnings: Vec<_> = second.warnings().cloned().collect();
        assert_eq!(first_warnings, second_warnings);
    }

    #[test]
    fn test_footer_rule_applies_to_repaired_row() {
        let schema = Broker::Dhl.builtin_schema();
        // Five filled cells, one of them an address fragment.
        let mut short = vec![Cell::Absent; 30];
        short[3] = t("Shenzhen Trading Co");
        short[4] = t("Block A");
        short[5] = t("518000");
        short[6] = t("Shenzhen");
        short[7] = t("CN");
        let mut long = short.clone();
        long[0] = t("DE2025000124");
        let mut rows = vec![short.clone(), long];

        let first = repair_and_normalize(&mut rows, &schema).unwrap();

        assert_eq!(first.rows_skipped(), 1);
        assert_eq!(first.rows_processed(), 1);
        assert_eq!(rows[0], short);
        assert_eq!(rows[1][3], t("Shenzhen Trading Co Block A"));
        assert_eq!(rows[1][6], t("CN"));
        assert_eq!(first.count(IssueKind::ShiftFix), 1);

        let after_first = rows.clone();
        let second = repair_and_normalize(&mut rows, &schema).unwrap();
        assert_eq!(second.rows_skipped(), 1);
        assert_eq!(second.rows_processed(), 1);
        assert_eq!(second.fix_count(), 0);
        assert_eq!(rows, after_first);
        let first_warnings: Vec<_> = first.warnings().cloned().collect();
        let second_warnings: Vec<_> = second.warnings().cloned().collect();
        assert_eq!(first_warnings, second_warnings);
    }
}
