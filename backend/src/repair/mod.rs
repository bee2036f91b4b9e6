//! Column-shift repair.
//!
//! - [`detector`] - decides whether and how a row is shifted
//! - [`engine`] - applies repairs and value normalization in place
//! - [`report`] - the fixes and warnings of a run

pub mod detector;
pub mod engine;
pub mod report;

pub use detector::{detect_shift, Detection};
pub use engine::{apply_shift, repair_and_normalize};
pub use report::{Issue, IssueKind, Severity, ValidationReport};
pub(crate) use report::ReportBuilder;
