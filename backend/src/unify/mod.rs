//! Header unification across export vintages.
//!
//! One broker ships files whose headers differ in width, order and naming.
//! Unification builds a single canonical header for all of them and a column
//! mapping per file, so that every row can be re-laid onto the canonical
//! columns:
//!
//! 1. files are processed in lexicographic name order
//! 2. duplicate names inside one header become `Name`, `Name.1`, `Name.2`
//! 3. the widest header is the base; ties go to the first file by name
//! 4. other files append names not present exactly or by synonym
//! 5. each file maps by exact name first, by synonym second
//!
//! The canonical identity of a column (its synonym-resolved name) must land
//! on the same index in every file, otherwise unification halts.

pub mod synonyms;

pub use synonyms::SynonymTable;

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::error::UnifyError;
use crate::models::{Cell, Row};
use crate::repair::{Issue, IssueKind, ReportBuilder, ValidationReport};

/// One file's header line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileHeader {
    /// File name, used for ordering and in reports.
    pub name: String,
    pub columns: Vec<String>,
}

impl FileHeader {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }
}

/// Ordered, duplicate-free canonical column names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalHeader {
    columns: Vec<String>,
    /// Synonym-resolved key of every column, unique.
    keys: Vec<String>,
}

impl CanonicalHeader {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    fn contains(&self, name: &str, key: &str) -> bool {
        self.columns.iter().any(|c| c == name) || self.keys.iter().any(|k| k == key)
    }

    fn push(&mut self, name: &str, synonyms: &SynonymTable) {
        let key = synonyms.canonical(name);
        if !self.contains(name, key) {
            self.keys.push(key.to_string());
            self.columns.push(name.to_string());
        }
    }
}

/// For each file column, its canonical index, or `None` if unmapped.
pub type ColumnMapping = Vec<Option<usize>>;

/// Mapping of one file onto the canonical header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMapping {
    pub file: String,
    /// Header names after trimming and duplicate disambiguation.
    pub columns: Vec<String>,
    pub mapping: ColumnMapping,
}

impl FileMapping {
    pub fn unmapped(&self) -> impl Iterator<Item = (usize, &str)> {
        self.mapping
            .iter()
            .zip(&self.columns)
            .enumerate()
            .filter(|(_, (m, _))| m.is_none())
            .map(|(i, (_, name))| (i, name.as_str()))
    }
}

/// Result of unifying a set of headers.
#[derive(Debug, Clone, Serialize)]
pub struct Unification {
    pub header: CanonicalHeader,
    /// One entry per file, in processing (name) order.
    pub mappings: Vec<FileMapping>,
    pub report: ValidationReport,
}

impl Unification {
    pub fn mapping_for(&self, file: &str) -> Option<&FileMapping> {
        self.mappings.iter().find(|m| m.file == file)
    }
}

/// Trim names and disambiguate duplicates as `Name`, `Name.1`, `Name.2`.
pub fn disambiguate(columns: &[String]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut counters: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::with_capacity(columns.len());

    for column in columns {
        let base = column.trim().to_string();
        let mut name = base.clone();
        while seen.contains(&name) {
            let n = counters.entry(base.clone()).or_insert(0);
            *n += 1;
            name = format!("{}.{}", base, n);
        }
        seen.insert(name.clone());
        out.push(name);
    }
    out
}

fn sorted(files: &[FileHeader]) -> Vec<&FileHeader> {
    let mut files: Vec<&FileHeader> = files.iter().collect();
    files.sort_by(|a, b| a.name.cmp(&b.name));
    files
}

/// Build the canonical header for a set of files.
///
/// The result depends only on the set of files, not on the order they are
/// passed in.
pub fn build_unified_header(
    files: &[FileHeader],
    synonyms: &SynonymTable,
) -> Result<CanonicalHeader, UnifyError> {
    let files = sorted(files);
    let widest = files
        .iter()
        .map(|f| f.columns.len())
        .max()
        .ok_or(UnifyError::NoFiles)?;
    let base = files
        .iter()
        .position(|f| f.columns.len() == widest)
        .ok_or(UnifyError::NoFiles)?;

    let mut header = CanonicalHeader::default();
    for name in disambiguate(&files[base].columns) {
        header.push(&name, synonyms);
    }
    for (i, file) in files.iter().enumerate() {
        if i == base {
            continue;
        }
        for name in disambiguate(&file.columns) {
            header.push(&name, synonyms);
        }
    }
    Ok(header)
}

/// Map one file header onto the canonical header.
///
/// Exact names are matched first; remaining columns are matched by synonym
/// key against canonical columns not already taken. The mapping is injective.
pub fn build_column_mapping(
    file_header: &[String],
    canonical: &CanonicalHeader,
    synonyms: &SynonymTable,
) -> ColumnMapping {
    let columns = disambiguate(file_header);
    let mut taken = vec![false; canonical.len()];
    let mut mapping: ColumnMapping = vec![None; columns.len()];

    for (i, name) in columns.iter().enumerate() {
        if let Some(j) = canonical.position(name).filter(|&j| !taken[j]) {
            taken[j] = true;
            mapping[i] = Some(j);
        }
    }

    for (i, name) in columns.iter().enumerate() {
        if mapping[i].is_some() {
            continue;
        }
        let key = synonyms.canonical(name);
        if let Some(j) = canonical
            .keys
            .iter()
            .enumerate()
            .position(|(j, k)| k == key && !taken[j])
        {
            taken[j] = true;
            mapping[i] = Some(j);
        }
    }

    mapping
}

/// Re-lay a file row onto the canonical columns.
///
/// Unmapped columns are dropped (they are reported once per file). Cells
/// beyond the mapping must be empty.
pub fn remap_row(row: &[Cell], mapping: &[Option<usize>], width: usize) -> Result<Row, UnifyError> {
    let mut out = vec![Cell::Absent; width];
    for (i, cell) in row.iter().enumerate() {
        match mapping.get(i) {
            Some(Some(j)) if *j >= width => {
                return Err(UnifyError::MappingOutOfRange { index: *j, width });
            }
            Some(Some(j)) => out[*j] = cell.clone(),
            Some(None) => {}
            None if cell.is_blank() => {}
            None => {
                return Err(UnifyError::RowWiderThanMapping {
                    column: i,
                    mapping_len: mapping.len(),
                });
            }
        }
    }
    Ok(out)
}

/// Re-lay all rows of one file onto the canonical columns.
///
/// Unlike [`remap_row`], values beyond the mapping do not fail the file: the
/// row is kept, the value is dropped and reported as a warning.
pub fn remap_rows(
    file: &str,
    rows: &[Row],
    mapping: &[Option<usize>],
    width: usize,
) -> Result<(Vec<Row>, Vec<Issue>), UnifyError> {
    let mut out = Vec::with_capacity(rows.len());
    let mut warnings = Vec::new();
    for (idx, row) in rows.iter().enumerate() {
        let covered = row.len().min(mapping.len());
        for (column, cell) in row.iter().enumerate().skip(covered) {
            if cell.is_blank() {
                continue;
            }
            warnings.push(
                Issue::new(
                    IssueKind::ValueOutsideHeader,
                    format!("'{}' has no header column and was dropped", cell),
                )
                .with_file(file)
                .with_row(idx)
                .with_column(column)
                .with_values(cell.render(), ""),
            );
        }
        out.push(remap_row(&row[..covered], mapping, width)?);
    }
    Ok((out, warnings))
}

/// Check that every canonical key resolves to one index across all files.
pub fn verify_canonical_identity(
    mappings: &[FileMapping],
    synonyms: &SynonymTable,
) -> Result<(), UnifyError> {
    let mut seen: HashMap<&str, (&str, usize)> = HashMap::new();
    for file in mappings {
        for (name, index) in file.columns.iter().zip(&file.mapping) {
            let Some(index) = *index else {
                continue;
            };
            let key = synonyms.canonical(name);
            match seen.get(key) {
                Some(&(first_file, first_index)) if first_index != index => {
                    return Err(UnifyError::IdentityViolation {
                        column: key.to_string(),
                        first_file: first_file.to_string(),
                        first_index,
                        second_file: file.file.clone(),
                        second_index: index,
                    });
                }
                Some(_) => {}
                None => {
                    seen.insert(key, (file.file.as_str(), index));
                }
            }
        }
    }
    Ok(())
}

/// Build the canonical header and every file's mapping, then verify
/// canonical identity.
pub fn unify(files: &[FileHeader], synonyms: &SynonymTable) -> Result<Unification, UnifyError> {
    let header = build_unified_header(files, synonyms)?;
    let mut report = ReportBuilder::new();

    let mappings: Vec<FileMapping> = sorted(files)
        .into_iter()
        .map(|file| FileMapping {
            file: file.name.clone(),
            columns: disambiguate(&file.columns),
            mapping: build_column_mapping(&file.columns, &header, synonyms),
        })
        .collect();

    for file in &mappings {
        for (i, name) in file.unmapped() {
            report.push(
                Issue::new(
                    IssueKind::UnmappedColumn,
                    format!("'{}' matches no canonical column", name),
                )
                .with_file(file.file.as_str())
                .with_column(i),
            );
        }
    }

    verify_canonical_identity(&mappings, synonyms)?;

    Ok(Unification {
        header,
        mappings,
        report: report.finish(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(name: &str, columns: &[&str]) -> FileHeader {
        FileHeader::new(name, columns.iter().map(|s| s.to_string()).collect())
    }

    fn vintages() -> Vec<FileHeader> {
        vec![
            header(
                "dachser_2022.csv",
                &["Sendungsnummer", "Datum", "Empfänger", "Land", "Incoterm", "Currency Code", "Betrag"],
            ),
            header(
                "dachser_2019.csv",
                &["Sendungsnummer", "Datum", "Empfänger", "Land", "Warentarifnummer", "Währung", "Betrag"],
            ),
            header(
                "dachser_2021.csv",
                &[
                    "Sendungsnummer",
                    "Datum",
                    "Empfänger",
                    "Straße",
                    "Land",
                    "Warentarifnummer",
                    "Waehrung",
                    "Betrag",
                    "Gewicht",
                ],
            ),
        ]
    }

    #[test]
    fn test_disambiguate_duplicates() {
        let columns: Vec<String> = ["A", " B ", "A", "A", "A.1"].iter().map(|s| s.to_string()).collect();
        assert_eq!(disambiguate(&columns), vec!["A", "B", "A.1", "A.2", "A.1.1"]);
    }

    #[test]
    fn test_widest_file_is_base() {
        let header = build_unified_header(&vintages(), &SynonymTable::builtin()).unwrap();
        assert_eq!(
            header.columns(),
            &[
                "Sendungsnummer",
                "Datum",
                "Empfänger",
                "Straße",
                "Land",
                "Warentarifnummer",
                "Waehrung",
                "Betrag",
                "Gewicht",
                "Incoterm",
            ]
        );
    }

    #[test]
    fn test_header_ignores_input_order() {
        let synonyms = SynonymTable::builtin();
        let mut reversed = vintages();
        reversed.reverse();
        assert_eq!(
            build_unified_header(&vintages(), &synonyms).unwrap(),
            build_unified_header(&reversed, &synonyms).unwrap()
        );
    }

    #[test]
    fn test_tie_goes_to_first_file_by_name() {
        let files = vec![header("b.csv", &["X", "Y"]), header("a.csv", &["Y", "Z"])];
        let header = build_unified_header(&files, &SynonymTable::empty()).unwrap();
        assert_eq!(header.columns(), &["Y", "Z", "X"]);
    }

    #[test]
    fn test_mapping_uses_synonyms_after_exact_names() {
        let synonyms = SynonymTable::builtin();
        let unification = unify(&vintages(), &synonyms).unwrap();

        let m2019 = unification.mapping_for("dachser_2019.csv").unwrap();
        assert_eq!(
            m2019.mapping,
            vec![Some(0), Some(1), Some(2), Some(4), Some(5), Some(6), Some(7)]
        );
        let m2022 = unification.mapping_for("dachser_2022.csv").unwrap();
        assert_eq!(
            m2022.mapping,
            vec![Some(0), Some(1), Some(2), Some(4), Some(9), Some(6), Some(7)]
        );
        assert_eq!(unification.report.warning_count(), 0);
        let files: Vec<&str> = unification.mappings.iter().map(|m| m.file.as_str()).collect();
        assert_eq!(files, vec!["dachser_2019.csv", "dachser_2021.csv", "dachser_2022.csv"]);
    }

    #[test]
    fn test_synonyms_in_one_file_leave_one_unmapped() {
        let files = vec![header("a.csv", &["Währung", "Currency Code", "Betrag"])];
        let unification = unify(&files, &SynonymTable::builtin()).unwrap();

        assert_eq!(unification.header.columns(), &["Währung", "Betrag"]);
        assert_eq!(unification.mappings[0].mapping, vec![Some(0), None, Some(1)]);
        let warning = &unification.report.issues()[0];
        assert_eq!(warning.kind, IssueKind::UnmappedColumn);
        assert_eq!(warning.file.as_deref(), Some("a.csv"));
        assert_eq!(warning.column, Some(1));
    }

    #[test]
    fn test_identity_violation_detected() {
        let synonyms = SynonymTable::builtin();
        let mappings = vec![
            FileMapping {
                file: "a.csv".into(),
                columns: vec!["Währung".into()],
                mapping: vec![Some(3)],
            },
            FileMapping {
                file: "b.csv".into(),
                columns: vec!["Waehrung".into()],
                mapping: vec![Some(5)],
            },
        ];
        let err = verify_canonical_identity(&mappings, &synonyms).unwrap_err();
        assert!(matches!(
            err,
            UnifyError::IdentityViolation { ref column, first_index: 3, second_index: 5, .. }
                if column == "Currency"
        ));
    }

    #[test]
    fn test_remap_row() {
        let row = vec![Cell::text("SN-1"), Cell::text("EUR"), Cell::text("drop me")];
        let mapping = vec![Some(2), Some(0), None];
        let remapped = remap_row(&row, &mapping, 4).unwrap();
        assert_eq!(
            remapped,
            vec![Cell::text("EUR"), Cell::Absent, Cell::text("SN-1"), Cell::Absent]
        );
    }

    #[test]
    fn test_remap_row_rejects_unmapped_values() {
        let row = vec![Cell::text("SN-1"), Cell::text("stray")];
        assert!(matches!(
            remap_row(&row, &[Some(0)], 2),
            Err(UnifyError::RowWiderThanMapping { column: 1, mapping_len: 1 })
        ));
        let padded = vec![Cell::text("SN-1"), Cell::Absent];
        assert!(remap_row(&padded, &[Some(0)], 2).is_ok());
        assert!(matches!(
            remap_row(&padded, &[Some(7)], 2),
            Err(UnifyError::MappingOutOfRange { index: 7, width: 2 })
        ));
    }

    #[test]
    fn test_remap_rows_keeps_wide_rows() {
        let rows = vec![
            vec![Cell::text("SN-1"), Cell::text("EUR"), Cell::Absent],
            vec![Cell::text("SN-2"), Cell::text("EUR"), Cell::text("stray overflow")],
        ];
        let mapping = vec![Some(1), Some(0)];

        let (remapped, warnings) = remap_rows("a.csv", &rows, &mapping, 3).unwrap();

        assert_eq!(remapped.len(), 2);
        assert_eq!(
            remapped[1],
            vec![Cell::text("EUR"), Cell::text("SN-2"), Cell::Absent]
        );
        assert_eq!(warnings.len(), 1);
        let warning = &warnings[0];
        assert_eq!(warning.kind, IssueKind::ValueOutsideHeader);
        assert_eq!(warning.file.as_deref(), Some("a.csv"));
        assert_eq!(warning.row, Some(1));
        assert_eq!(warning.column, Some(2));
        assert_eq!(warning.before.as_deref(), Some("stray overflow"));
    }

    #[test]
    fn test_no_files() {
        assert!(matches!(
            build_unified_header(&[], &SynonymTable::empty()),
            Err(UnifyError::NoFiles)
        ));
    }
}
