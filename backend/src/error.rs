//! Error types for the brokerload pipeline.
//!
//! Only *structural* problems are errors. Per-row anomalies (unclassifiable
//! shifts, unparseable values, unmapped header columns) are recorded in a
//! [`crate::repair::ValidationReport`] and never abort a run.
//!
//! - [`CsvError`] - decoding input files
//! - [`SchemaError`] - broker schema misconfiguration
//! - [`RepairError`] - structural failures of a repair run
//! - [`UnifyError`] - synonym table defects and header identity violations
//! - [`RegistryError`] - schema registry storage
//! - [`PipelineError`] - top-level orchestration
//! - [`ServerError`] - HTTP layer
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// CSV Parsing Errors
// =============================================================================

/// Errors while decoding an input file into a table.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// Invalid CSV record.
    #[error("Invalid CSV at line {line}: {message}")]
    ParseError { line: usize, message: String },

    /// Invalid JSON table document.
    #[error("Invalid JSON table: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Empty file.
    #[error("File is empty")]
    EmptyFile,

    /// No headers found.
    #[error("No headers found")]
    NoHeaders,
}

// =============================================================================
// Broker Schema Errors
// =============================================================================

/// A broker schema that cannot be applied safely.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Zone range is empty or exceeds the schema width.
    #[error("Zone '{zone}' has invalid range {start}..{end} (width {width})")]
    InvalidZoneRange {
        zone: String,
        start: usize,
        end: usize,
        width: usize,
    },

    /// Zones overlap or are not in column order.
    #[error("Zone '{zone}' overlaps or precedes zone '{previous}'")]
    OverlappingZones { zone: String, previous: String },

    /// Text column outside its zone.
    #[error("Zone '{zone}' text column {column} is outside the zone")]
    TextColumnOutsideZone { zone: String, column: usize },

    /// Anchor outside its zone, or not after the zone's text column.
    #[error("Zone '{zone}' anchor column {column} must lie inside the zone after the text column")]
    MisplacedAnchor { zone: String, column: usize },

    /// Zone declares no anchor.
    #[error("Zone '{0}' declares no anchor")]
    NoAnchors(String),

    /// Numeric/date/scale column beyond the schema width.
    #[error("{kind} column {column} is beyond schema width {width}")]
    ColumnOutOfRange {
        kind: &'static str,
        column: usize,
        width: usize,
    },

    /// Scale rule with a non-positive threshold or divisor.
    #[error("Scale rule '{0}' is malformed")]
    InvalidScaleRule(String),

    /// Search windows must be at least one column.
    #[error("Search window '{0}' must be at least 1")]
    InvalidWindow(&'static str),

    /// Footer threshold of zero would accept blank rows.
    #[error("Footer rule must require at least one filled cell")]
    InvalidFooter,

    /// Schema document failed JSON Schema validation.
    #[error("Schema document invalid: {errors:?}")]
    InvalidDocument { errors: Vec<String> },

    /// JSON error.
    #[error("Schema JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Unknown broker identifier.
    #[error("Unknown broker: {0}")]
    UnknownBroker(String),
}

// =============================================================================
// Repair Errors
// =============================================================================

/// Structural failures that abort a repair run.
#[derive(Debug, Error)]
pub enum RepairError {
    /// The schema itself is invalid.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// A row does not reach the columns the schema addresses.
    #[error("Row {row} has {found} columns, schema needs at least {expected}")]
    RowTooNarrow {
        row: usize,
        expected: usize,
        found: usize,
    },
}

// =============================================================================
// Header Unification Errors
// =============================================================================

/// Structural failures of header unification.
#[derive(Debug, Error)]
pub enum UnifyError {
    /// Nothing to unify.
    #[error("No file headers to unify")]
    NoFiles,

    /// The same legacy name maps to two canonical names.
    #[error("Synonym '{name}' maps to both '{first}' and '{second}'")]
    SynonymConflict {
        name: String,
        first: String,
        second: String,
    },

    /// A canonical name is itself a legacy name of something else.
    #[error("Synonym '{name}' maps to '{target}', which is itself mapped")]
    SynonymChain { name: String, target: String },

    /// Two files resolve the same column to different canonical slots.
    #[error(
        "Column '{column}' resolves to index {first_index} in '{first_file}' \
         but {second_index} in '{second_file}'"
    )]
    IdentityViolation {
        column: String,
        first_file: String,
        first_index: usize,
        second_file: String,
        second_index: usize,
    },

    /// A row carries values beyond the columns its mapping covers.
    #[error("Row has a value in column {column}, mapping covers {mapping_len} columns")]
    RowWiderThanMapping { column: usize, mapping_len: usize },

    /// A mapping points outside the canonical header.
    #[error("Mapped index {index} is outside canonical width {width}")]
    MappingOutOfRange { index: usize, width: usize },

    /// JSON error while loading a synonym table.
    #[error("Synonym JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

// =============================================================================
// Registry Errors
// =============================================================================

/// Errors from the broker schema registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Schema not found.
    #[error("Schema not found: {0}")]
    NotFound(String),

    /// Stored or imported schema is invalid.
    #[error("Invalid schema: {0}")]
    InvalidSchema(#[from] SchemaError),

    /// IO error.
    #[error("Registry IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON error.
    #[error("Registry JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// This is the error type returned by [`crate::pipeline::repair_file`] and
/// [`crate::pipeline::unify_files`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Input decoding error.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// Repair run aborted.
    #[error("Repair error: {0}")]
    Repair(#[from] RepairError),

    /// Unification halted.
    #[error("Unify error: {0}")]
    Unify(#[from] UnifyError),

    /// Registry error.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Schema error outside a repair run (lookup, parsing).
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No data rows.
    #[error("No rows to process")]
    EmptyInput,
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for input decoding.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Result type for repair runs.
pub type RepairResult<T> = Result<T, RepairError>;

/// Result type for header unification.
pub type UnifyResult<T> = Result<T, UnifyError>;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
