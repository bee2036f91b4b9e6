//! # Brokerload - Customs broker export repair and header unification
//!
//! Brokerload reads the CSV exports customs brokers (DHL, DB Schenker,
//! Kuehne+Nagel, Dachser) hand out, realigns rows whose columns slid out of
//! place because a free-text field overflowed, normalizes numbers, dates and
//! scaled integers, and merges files of different vintages onto one
//! canonical header.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ Broker CSV  │────▶│   Parser    │────▶│   Repair    │────▶│   Unify     │
//! │  (ISO/UTF8) │     │  (auto-enc) │     │ (shift+norm)│     │ (canonical) │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use brokerload::{repair_file, Broker, PipelineOptions};
//!
//! let result = repair_file("dhl_2024_03.csv".as_ref(), Broker::Dhl, &PipelineOptions::default())?;
//! println!("{}", result.report.summary());
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Cells, rows, tables and shift descriptors
//! - [`classify`] - Cell classifiers used as anchors
//! - [`normalize`] - Number, date and scaled-integer normalization
//! - [`schema`] - Broker layouts (zones, anchors, footer rule)
//! - [`repair`] - Shift detection, repair and the validation report
//! - [`unify`] - Canonical header construction and row remapping
//! - [`parser`] - CSV parsing with auto-detection
//! - [`validation`] - JSON Schema validation of layout documents
//! - [`cache`] - Layout override registry
//! - [`pipeline`] - File-level orchestration
//! - [`api`] - HTTP API server

// Core modules
pub mod error;
pub mod models;

// Cell-level rules
pub mod classify;
pub mod normalize;

// Layouts
pub mod schema;

// Repair and unification
pub mod repair;
pub mod unify;

// Parsing
pub mod parser;

// Validation
pub mod validation;

// Layout registry
pub mod cache;

// Orchestration
pub mod pipeline;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    CsvError, PipelineError, RegistryError, RepairError, SchemaError, ServerError, UnifyError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{Cell, Row, ShiftCategory, ShiftDescriptor, Table};

// =============================================================================
// Re-exports - Schemas
// =============================================================================

pub use classify::Classifier;
pub use normalize::{ScaleOutcome, ScaleRule};
pub use schema::{Anchor, Broker, BrokerSchema, FooterRule, SearchWindows, Zone, ZoneKind};

// =============================================================================
// Re-exports - Repair
// =============================================================================

pub use repair::{
    apply_shift, detect_shift, repair_and_normalize, Detection, Issue, IssueKind, Severity,
    ValidationReport,
};

// =============================================================================
// Re-exports - Unification
// =============================================================================

pub use unify::{
    build_column_mapping, build_unified_header, remap_row, remap_rows, unify,
    verify_canonical_identity, CanonicalHeader, FileHeader, FileMapping, SynonymTable,
    Unification,
};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    decode_content, detect_delimiter, detect_encoding, parse_bytes_auto, parse_file_auto,
    parse_json_table, parse_str, ParseResult,
};

// =============================================================================
// Re-exports - Validation and registry
// =============================================================================

pub use cache::{SchemaOrigin, SchemaRegistry, StoredSchema};
pub use validation::{is_valid_broker_schema, parse_schema_document, validate_broker_schema};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use pipeline::{
    audit_idempotence, repair_bytes, repair_file, repair_table, unify_bytes, unify_files,
    unify_tables, write_csv, write_csv_file, IdempotenceAudit, PipelineOptions, RepairResult,
    UnifiedDataset,
};

// =============================================================================
// Re-exports - API
// =============================================================================

pub use api::types::{error_response, RepairResponse, UnifyResponse};

// Server
pub mod server {
    pub use crate::api::server::start_server;
}
