//! High-level pipeline API: broker file to repaired, unified dataset.
//!
//! Combines the steps a caller would otherwise chain by hand: loading and
//! decoding files, resolving the broker layout, repairing and normalizing
//! rows, unifying headers across vintages, and writing the result.
//!
//! # Example
//!
//! ```rust,ignore
//! use brokerload::pipeline::{repair_file, write_csv_file, PipelineOptions};
//! use brokerload::schema::Broker;
//! use std::path::Path;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let result = repair_file(Path::new("dhl_2024_03.csv"), Broker::Dhl, &PipelineOptions::default())?;
//!     println!("{}", result.report.summary());
//!     write_csv_file(Path::new("dhl_2024_03.repaired.csv"), &result.table.headers, &result.table.rows)?;
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::api::logs::{log_error, log_info, log_info_indent, log_issue, log_success, log_warning};
use crate::cache::{SchemaOrigin, SchemaRegistry};
use crate::error::{PipelineError, PipelineResult};
use crate::models::{Row, Table};
use crate::parser::{parse_bytes_auto, parse_file_auto, ParseResult};
use crate::repair::{repair_and_normalize, IssueKind, ReportBuilder, ValidationReport};
use crate::schema::{Broker, BrokerSchema};
use crate::unify::{remap_rows, unify, FileHeader, SynonymTable, Unification};
use crate::validation::parse_schema_document;

/// Warnings echoed to the log per run; the report always has all of them.
const MAX_LOGGED_WARNINGS: usize = 5;

/// Options for the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOptions {
    /// Use a specific schema document instead of the registry/built-in layout
    pub schema_path: Option<String>,

    /// Look up layout overrides in the schema registry
    pub use_registry: bool,

    /// Synonym table JSON file; the built-in table is used when absent
    pub synonyms_path: Option<String>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            schema_path: None,
            use_registry: true,
            synonyms_path: None,
        }
    }
}

/// Where the layout of a run came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaSource {
    Builtin,
    Registry,
    File(String),
}

/// Input file information
#[derive(Debug, Clone, Serialize)]
pub struct FileInfo {
    pub name: String,
    pub encoding: String,
    pub delimiter: char,
    pub headers: Vec<String>,
    pub row_count: usize,
}

impl FileInfo {
    fn from_parse(name: &str, parsed: &ParseResult) -> Self {
        Self {
            name: name.to_string(),
            encoding: parsed.encoding.clone(),
            delimiter: parsed.delimiter,
            headers: parsed.table.headers.clone(),
            row_count: parsed.table.rows.len(),
        }
    }
}

/// Result of repairing one file
#[derive(Debug, Clone, Serialize)]
pub struct RepairResult {
    pub broker: Broker,
    pub schema_source: SchemaSource,
    /// Repaired and normalized rows with the file's header
    pub table: Table,
    pub report: ValidationReport,
    pub file_info: FileInfo,
}

/// Outcome of running the repair twice over the same rows.
#[derive(Debug, Clone, Serialize)]
pub struct IdempotenceAudit {
    pub first_pass_fixes: usize,
    pub second_pass_fixes: usize,
    /// Rows the second pass still changed
    pub rows_changed: Vec<usize>,
    /// Both passes reported the same warnings
    pub warnings_stable: bool,
}

impl IdempotenceAudit {
    pub fn is_idempotent(&self) -> bool {
        self.second_pass_fixes == 0 && self.rows_changed.is_empty() && self.warnings_stable
    }
}

/// Several files merged onto one canonical header
#[derive(Debug, Clone, Serialize)]
pub struct UnifiedDataset {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
    pub unification: Unification,
    /// Repair report per file, when files were repaired before unification
    pub repairs: Vec<(String, ValidationReport)>,
}

// =============================================================================
// Schemas and synonyms
// =============================================================================

/// Resolve the layout to use for a broker.
pub fn resolve_schema(
    broker: Broker,
    options: &PipelineOptions,
) -> PipelineResult<(BrokerSchema, SchemaSource)> {
    if let Some(ref path) = options.schema_path {
        let content = std::fs::read_to_string(path)?;
        let schema = parse_schema_document(&content)?;
        if schema.broker != broker {
            log_warning(format!(
                "Schema file {} describes {}, not {}",
                path,
                schema.broker.display_name(),
                broker.display_name()
            ));
        }
        return Ok((schema, SchemaSource::File(path.clone())));
    }

    if options.use_registry {
        let registry = SchemaRegistry::new();
        let (schema, origin) = registry.resolve(broker);
        let source = match origin {
            SchemaOrigin::Builtin => SchemaSource::Builtin,
            SchemaOrigin::Registry => SchemaSource::Registry,
        };
        return Ok((schema, source));
    }

    Ok((broker.builtin_schema(), SchemaSource::Builtin))
}

/// Load the synonym table named by the options, or the built-in one.
pub fn load_synonyms(options: &PipelineOptions) -> PipelineResult<SynonymTable> {
    match options.synonyms_path {
        Some(ref path) => {
            let content = std::fs::read_to_string(path)?;
            Ok(SynonymTable::from_json(&content)?)
        }
        None => Ok(SynonymTable::builtin()),
    }
}

// =============================================================================
// Repair
// =============================================================================

/// Repair a broker file.
///
/// This is the main entry point for a single file. It:
/// 1. Parses the file with auto-detection
/// 2. Resolves the broker layout
/// 3. Repairs shifts and normalizes values
pub fn repair_file(path: &Path, broker: Broker, options: &PipelineOptions) -> PipelineResult<RepairResult> {
    log_info(format!("📖 Reading {}...", path.display()));
    let parsed = parse_file_auto(path)?;
    repair_parsed(&file_name(path), parsed, broker, options)
}

/// Repair an uploaded file.
///
/// Same as `repair_file` but accepts raw bytes instead of a file path.
pub fn repair_bytes(
    bytes: &[u8],
    name: &str,
    broker: Broker,
    options: &PipelineOptions,
) -> PipelineResult<RepairResult> {
    log_info(format!("📖 Reading {}...", name));
    let parsed = parse_bytes_auto(bytes)?;
    repair_parsed(name, parsed, broker, options)
}

fn repair_parsed(
    name: &str,
    parsed: ParseResult,
    broker: Broker,
    options: &PipelineOptions,
) -> PipelineResult<RepairResult> {
    log_success(format!("Detected encoding: {}", parsed.encoding));
    log_success(format!("Detected separator: '{}'", format_delimiter(parsed.delimiter)));
    log_success(format!(
        "Read {} rows, {} columns",
        parsed.table.rows.len(),
        parsed.table.headers.len()
    ));
    let file_info = FileInfo::from_parse(name, &parsed);

    let (schema, schema_source) = resolve_schema(broker, options)?;
    log_info(format!(
        "📋 Layout: {} {} ({:?})",
        broker.display_name(),
        schema.version,
        schema_source
    ));

    let mut table = parsed.table;
    let report = repair_table(&mut table, &schema)?;

    Ok(RepairResult {
        broker,
        schema_source,
        table,
        report,
        file_info,
    })
}

/// Repair and normalize a table in place.
pub fn repair_table(table: &mut Table, schema: &BrokerSchema) -> PipelineResult<ValidationReport> {
    if table.rows.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    log_info("🔧 Repairing column shifts...");
    let report = match repair_and_normalize(&mut table.rows, schema) {
        Ok(report) => report,
        Err(e) => {
            log_error(format!("Repair aborted: {}", e));
            return Err(e.into());
        }
    };

    log_success(report.summary());
    let shifts = report.count(IssueKind::ShiftFix);
    if shifts > 0 {
        log_info_indent(format!("{} shifted rows realigned", shifts), 1);
    }
    log_warnings(&report);
    Ok(report)
}

fn log_warnings(report: &ValidationReport) {
    if report.is_clean() {
        return;
    }
    log_warning(format!("{} warnings need review", report.warning_count()));
    for issue in report.warnings().take(MAX_LOGGED_WARNINGS) {
        log_issue(issue, 1);
    }
    if report.warning_count() > MAX_LOGGED_WARNINGS {
        log_info_indent(
            format!("... and {} more", report.warning_count() - MAX_LOGGED_WARNINGS),
            1,
        );
    }
}

/// Run the repair twice and check that the second pass is a no-op.
///
/// The table itself is not modified.
pub fn audit_idempotence(table: &Table, schema: &BrokerSchema) -> PipelineResult<IdempotenceAudit> {
    let mut rows = table.rows.clone();
    let first = repair_and_normalize(&mut rows, schema)?;
    let after_first = rows.clone();
    let second = repair_and_normalize(&mut rows, schema)?;

    let rows_changed = after_first
        .iter()
        .zip(&rows)
        .enumerate()
        .filter(|(_, (a, b))| a != b)
        .map(|(i, _)| i)
        .collect();

    Ok(IdempotenceAudit {
        first_pass_fixes: first.fix_count(),
        second_pass_fixes: second.fix_count(),
        rows_changed,
        warnings_stable: first.warnings().eq(second.warnings()),
    })
}

// =============================================================================
// Unification
// =============================================================================

/// Merge named tables onto one canonical header.
///
/// Rows are emitted file by file in file name order.
pub fn unify_tables(tables: &[(String, Table)], synonyms: &SynonymTable) -> PipelineResult<UnifiedDataset> {
    if tables.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    log_info(format!("🧩 Unifying headers of {} files...", tables.len()));
    let headers: Vec<FileHeader> = tables
        .iter()
        .map(|(name, table)| FileHeader::new(name.clone(), table.headers.clone()))
        .collect();
    let mut unification = unify(&headers, synonyms)?;
    let width = unification.header.len();
    log_success(format!("Canonical header has {} columns", width));

    let mut rows = Vec::new();
    let mut report = ReportBuilder::new();
    report.extend(unification.report.issues().iter().cloned());
    for mapping in &unification.mappings {
        let Some((_, table)) = tables.iter().find(|(name, _)| *name == mapping.file) else {
            continue;
        };
        let (remapped, dropped) = remap_rows(&mapping.file, &table.rows, &mapping.mapping, width)?;
        rows.extend(remapped);
        report.extend(dropped);
        log_info_indent(format!("{}: {} rows", mapping.file, table.rows.len()), 1);
    }
    unification.report = report.finish();

    for issue in unification.report.warnings() {
        log_issue(issue, 1);
    }

    Ok(UnifiedDataset {
        headers: unification.header.columns().to_vec(),
        rows,
        unification,
        repairs: Vec::new(),
    })
}

/// Load, optionally repair, and unify several files.
///
/// With a broker, every file is repaired against that broker's layout before
/// its header is unified.
pub fn unify_files(
    paths: &[PathBuf],
    broker: Option<Broker>,
    options: &PipelineOptions,
) -> PipelineResult<UnifiedDataset> {
    let mut tables = Vec::with_capacity(paths.len());
    for path in paths {
        let name = file_name(path);
        log_info(format!("📖 Reading {}...", name));
        tables.push((name, parse_file_auto(path)?.table));
    }
    repair_and_unify(tables, broker, options)
}

/// Same as `unify_files` for uploaded `(name, bytes)` pairs.
pub fn unify_bytes(
    files: &[(String, Vec<u8>)],
    broker: Option<Broker>,
    options: &PipelineOptions,
) -> PipelineResult<UnifiedDataset> {
    let mut tables = Vec::with_capacity(files.len());
    for (name, bytes) in files {
        log_info(format!("📖 Reading {}...", name));
        tables.push((name.clone(), parse_bytes_auto(bytes)?.table));
    }
    repair_and_unify(tables, broker, options)
}

fn repair_and_unify(
    mut tables: Vec<(String, Table)>,
    broker: Option<Broker>,
    options: &PipelineOptions,
) -> PipelineResult<UnifiedDataset> {
    let synonyms = load_synonyms(options)?;

    let mut repairs = Vec::new();
    if let Some(broker) = broker {
        let (schema, _) = resolve_schema(broker, options)?;
        for (name, table) in tables.iter_mut() {
            log_info(format!("🔧 {}", name));
            let report = repair_table(table, &schema)?;
            repairs.push((name.clone(), report));
        }
    }

    let mut dataset = unify_tables(&tables, &synonyms)?;
    repairs.sort_by(|a, b| a.0.cmp(&b.0));
    dataset.repairs = repairs;
    Ok(dataset)
}

// =============================================================================
// Output
// =============================================================================

/// Write a header and rows as semicolon-separated CSV.
pub fn write_csv<W: Write>(writer: W, headers: &[String], rows: &[Row]) -> PipelineResult<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_writer(writer);

    writer.write_record(headers).map_err(std::io::Error::from)?;
    for row in rows {
        writer
            .write_record(row.iter().map(|c| c.render().into_owned()))
            .map_err(std::io::Error::from)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write CSV to a file, creating parent directories.
pub fn write_csv_file(path: &Path, headers: &[String], rows: &[Row]) -> PipelineResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    write_csv(file, headers, rows)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

/// Format delimiter for display
fn format_delimiter(d: char) -> &'static str {
    match d {
        ';' => ";",
        ',' => ",",
        '\t' => "TAB",
        '|' => "|",
        _ => "?",
    }
}
