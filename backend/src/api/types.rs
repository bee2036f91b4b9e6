//! REST API types.
//!
//! Responses carry the repaired rows as JSON cells (numbers stay numbers,
//! blanks are `null`) together with the full fix/warning report.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::models::Row;
use crate::pipeline::{RepairResult, SchemaSource, UnifiedDataset};
use crate::repair::{Issue, IssueKind, ValidationReport};
use crate::unify::FileMapping;

/// Response sent after a single file was repaired.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairResponse {
    pub job_id: String,

    /// "ready" when nothing needs review, "warning" otherwise
    pub status: String,

    pub broker: String,
    pub schema_source: SchemaSource,
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
    pub summary: ReportSummary,
    pub report: ValidationReport,
    pub file_info: FileMetadata,
}

/// Response sent after several files were unified.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifyResponse {
    pub job_id: String,
    pub status: String,
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
    pub mappings: Vec<FileMapping>,
    /// Unification warnings (unmapped columns, dropped values)
    pub warnings: Vec<Issue>,
    /// Per-file repair summaries, when files were repaired first
    pub repairs: Vec<FileRepair>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRepair {
    pub file: String,
    pub summary: ReportSummary,
}

/// Counters of one report
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub rows_processed: usize,
    pub rows_skipped: usize,
    pub fixes: usize,
    pub shift_fixes: usize,
    pub warnings: usize,
    /// Rows that carry at least one warning
    pub rows_to_review: Vec<usize>,
}

impl From<&ValidationReport> for ReportSummary {
    fn from(report: &ValidationReport) -> Self {
        Self {
            rows_processed: report.rows_processed(),
            rows_skipped: report.rows_skipped(),
            fixes: report.fix_count(),
            shift_fixes: report.count(IssueKind::ShiftFix),
            warnings: report.warning_count(),
            rows_to_review: report.rows_with_warnings(),
        }
    }
}

/// Input file metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub name: String,
    pub encoding: String,
    pub delimiter: String,
    pub row_count: usize,
    pub columns: Vec<String>,
}

fn status(clean: bool) -> String {
    if clean { "ready" } else { "warning" }.to_string()
}

impl From<RepairResult> for RepairResponse {
    fn from(result: RepairResult) -> Self {
        let info = result.file_info;
        RepairResponse {
            job_id: Uuid::new_v4().to_string(),
            status: status(result.report.is_clean()),
            broker: result.broker.id().to_string(),
            schema_source: result.schema_source,
            headers: result.table.headers,
            rows: result.table.rows,
            summary: ReportSummary::from(&result.report),
            report: result.report,
            file_info: FileMetadata {
                name: info.name,
                encoding: info.encoding,
                delimiter: info.delimiter.to_string(),
                row_count: info.row_count,
                columns: info.headers,
            },
        }
    }
}

impl From<UnifiedDataset> for UnifyResponse {
    fn from(dataset: UnifiedDataset) -> Self {
        let repairs: Vec<FileRepair> = dataset
            .repairs
            .iter()
            .map(|(file, report)| FileRepair {
                file: file.clone(),
                summary: ReportSummary::from(report),
            })
            .collect();
        let clean = dataset.unification.report.is_clean() && repairs.iter().all(|r| r.summary.warnings == 0);

        UnifyResponse {
            job_id: Uuid::new_v4().to_string(),
            status: status(clean),
            headers: dataset.headers,
            rows: dataset.rows,
            warnings: dataset.unification.report.issues().to_vec(),
            mappings: dataset.unification.mappings,
            repairs,
        }
    }
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "jobId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
        "headers": [],
        "rows": []
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{repair_bytes, PipelineOptions};
    use crate::schema::Broker;

    #[test]
    fn test_repair_response_shape() {
        let csv = "Sendungsnummer;Datum;Empfänger;Straße;PLZ;Ort;Land;Warenbeschreibung;Warentarifnummer;Verfahren;Ursprungsland;Rechnungsbetrag;Währung;Gewicht\n\
                   SN-1;13.01.2025;Muster GmbH;Hauptstraße 5;10115;Berlin;DE;Headphones;85183000;4000;CN;2638927;EUR;12\n";
        let options = PipelineOptions {
            use_registry: false,
            ..PipelineOptions::default()
        };
        let result = repair_bytes(csv.as_bytes(), "dachser.csv", Broker::Dachser, &options).unwrap();

        let json = serde_json::to_value(RepairResponse::from(result)).unwrap();
        assert_eq!(json["status"], "ready");
        assert_eq!(json["broker"], "dachser");
        assert_eq!(json["schemaSource"], "builtin");
        assert_eq!(json["rows"][0][11], 26389.27);
        assert_eq!(json["summary"]["rowsProcessed"], 1);
        assert_eq!(json["fileInfo"]["delimiter"], ";");
    }

    #[test]
    fn test_error_response() {
        let json = error_response("No file provided");
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"], "No file provided");
    }
}
