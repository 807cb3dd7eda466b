//! Parsing label batches from CSV / JSON text.
//!
//! Parsing only checks that every field is readable. Empty ids and
//! catalog membership are the reconciler's job, so programmatically built
//! batches go through the same checks.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ReconError, ValidationError, ValidationIssue};
use crate::model::{parse_verified, Batch, LabelRecord, Producer, Relevance};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchFormat {
    Csv,
    Json,
}

impl BatchFormat {
    /// Infer from a file extension (`.csv`, `.json`).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Column names accepted for each field. The first entry is canonical.
const ICON_COLUMNS: &[&str] = &["icon_id", "icon"];
const LABEL_COLUMNS: &[&str] = &["label_text", "text", "label"];
const PRODUCER_COLUMNS: &[&str] = &["produced_by"];
const VERIFIED_COLUMNS: &[&str] = &["verified"];
const RELEVANCE_COLUMNS: &[&str] = &["relevance"];

pub fn parse_batch(batch_id: &str, format: BatchFormat, data: &str) -> Result<Batch, ReconError> {
    match format {
        BatchFormat::Csv => parse_csv_batch(batch_id, data),
        BatchFormat::Json => parse_json_batch(batch_id, data),
    }
}

/// Fields of one input row before validation.
struct RawRecord<'a> {
    icon_id: &'a str,
    label_text: &'a str,
    produced_by: &'a str,
    verified: VerifiedField<'a>,
    relevance: &'a str,
}

enum VerifiedField<'a> {
    Bool(bool),
    Text(&'a str),
}

fn batch_error(batch_id: &str, row: Option<usize>, detail: impl Into<String>) -> ValidationError {
    ValidationError {
        batch_id: batch_id.into(),
        row,
        icon_id: String::new(),
        label_text: String::new(),
        issue: ValidationIssue::Malformed {
            detail: detail.into(),
        },
    }
}

fn rejected(batch_id: &str, errors: Vec<ValidationError>) -> ReconError {
    ReconError::InvalidBatch {
        batch_id: batch_id.into(),
        errors,
    }
}

fn build_record(batch_id: &str, row: usize, raw: RawRecord<'_>) -> Result<LabelRecord, ValidationError> {
    let icon_id = raw.icon_id.trim();
    let label_text = raw.label_text.trim();
    let malformed = |detail: String| ValidationError {
        batch_id: batch_id.into(),
        row: Some(row),
        icon_id: icon_id.into(),
        label_text: label_text.into(),
        issue: ValidationIssue::Malformed { detail },
    };

    let produced_by: Producer = raw.produced_by.parse().map_err(malformed)?;
    let relevance: Relevance = raw.relevance.parse().map_err(malformed)?;
    let verified = match raw.verified {
        VerifiedField::Bool(b) => b,
        VerifiedField::Text(s) => parse_verified(s).map_err(malformed)?,
    };

    Ok(LabelRecord {
        icon_id: icon_id.into(),
        label_text: label_text.into(),
        produced_by,
        verified,
        relevance,
    })
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

/// Parse a CSV batch with a header row. Column order is free; `icon` and
/// `text` / `label` are accepted for the first two columns.
pub fn parse_csv_batch(batch_id: &str, csv_data: &str) -> Result<Batch, ReconError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(csv_data.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| rejected(batch_id, vec![batch_error(batch_id, None, e.to_string())]))?
        .iter()
        .map(|h| h.trim().to_ascii_lowercase())
        .collect();

    let mut missing = Vec::new();
    let mut idx = |names: &[&str]| -> usize {
        match headers.iter().position(|h| names.contains(&h.as_str())) {
            Some(i) => i,
            None => {
                missing.push(batch_error(
                    batch_id,
                    None,
                    format!("missing column '{}'", names[0]),
                ));
                0
            }
        }
    };

    let icon_idx = idx(ICON_COLUMNS);
    let label_idx = idx(LABEL_COLUMNS);
    let producer_idx = idx(PRODUCER_COLUMNS);
    let verified_idx = idx(VERIFIED_COLUMNS);
    let relevance_idx = idx(RELEVANCE_COLUMNS);

    if !missing.is_empty() {
        return Err(rejected(batch_id, missing));
    }

    let mut records = Vec::new();
    let mut errors = Vec::new();

    for (i, record) in reader.records().enumerate() {
        let row = i + 1;
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                errors.push(batch_error(batch_id, Some(row), e.to_string()));
                continue;
            }
        };
        let field = |i: usize| record.get(i).unwrap_or("");
        let raw = RawRecord {
            icon_id: field(icon_idx),
            label_text: field(label_idx),
            produced_by: field(producer_idx),
            verified: VerifiedField::Text(field(verified_idx)),
            relevance: field(relevance_idx),
        };
        match build_record(batch_id, row, raw) {
            Ok(r) => records.push(r),
            Err(e) => errors.push(e),
        }
    }

    if !errors.is_empty() {
        return Err(rejected(batch_id, errors));
    }
    Ok(Batch::new(batch_id, records))
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonVerified {
    Bool(bool),
    Text(String),
}

#[derive(Deserialize)]
struct JsonRecord {
    #[serde(alias = "icon")]
    icon_id: String,
    #[serde(alias = "text", alias = "label")]
    label_text: String,
    produced_by: String,
    verified: JsonVerified,
    relevance: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonBatch {
    /// Bare array of records.
    Records(Vec<serde_json::Value>),
    /// Object carrying batch metadata next to the records.
    Document {
        #[serde(default)]
        source: Option<String>,
        #[serde(default)]
        created_at: Option<DateTime<Utc>>,
        records: Vec<serde_json::Value>,
    },
}

/// Parse a JSON batch: either an array of record objects, or
/// `{"source": .., "created_at": .., "records": [..]}`.
pub fn parse_json_batch(batch_id: &str, json_data: &str) -> Result<Batch, ReconError> {
    let doc: JsonBatch = serde_json::from_str(json_data)
        .map_err(|e| rejected(batch_id, vec![batch_error(batch_id, None, e.to_string())]))?;

    let (source, created_at, values) = match doc {
        JsonBatch::Records(values) => (None, None, values),
        JsonBatch::Document {
            source,
            created_at,
            records,
        } => (source, created_at, records),
    };

    let mut records = Vec::new();
    let mut errors = Vec::new();

    for (i, value) in values.into_iter().enumerate() {
        let row = i + 1;
        let parsed: JsonRecord = match serde_json::from_value(value) {
            Ok(r) => r,
            Err(e) => {
                errors.push(batch_error(batch_id, Some(row), e.to_string()));
                continue;
            }
        };
        let raw = RawRecord {
            icon_id: &parsed.icon_id,
            label_text: &parsed.label_text,
            produced_by: &parsed.produced_by,
            verified: match &parsed.verified {
                JsonVerified::Bool(b) => VerifiedField::Bool(*b),
                JsonVerified::Text(s) => VerifiedField::Text(s),
            },
            relevance: &parsed.relevance,
        };
        match build_record(batch_id, row, raw) {
            Ok(r) => records.push(r),
            Err(e) => errors.push(e),
        }
    }

    if !errors.is_empty() {
        return Err(rejected(batch_id, errors));
    }

    let mut batch = Batch::new(batch_id, records);
    batch.source = source;
    batch.created_at = created_at;
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_basic() {
        let csv = "\
icon_id,label_text,produced_by,verified,relevance
broadsword,sword,machine,false,high
broadsword, weapon ,human,TRUE,Medium
";
        let batch = parse_csv_batch("gpt-1", csv).unwrap();
        assert_eq!(batch.id, "gpt-1");
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.records[1].label_text, "weapon");
        assert_eq!(batch.records[1].produced_by, Producer::Human);
        assert!(batch.records[1].verified);
        assert_eq!(batch.records[1].relevance, Relevance::Medium);
    }

    #[test]
    fn csv_accepts_aliases_and_any_column_order() {
        let csv = "\
relevance,verified,text,icon,produced_by
low,no,blade,broadsword,machine
";
        let batch = parse_csv_batch("b", csv).unwrap();
        let r = &batch.records[0];
        assert_eq!(r.icon_id, "broadsword");
        assert_eq!(r.label_text, "blade");
        assert_eq!(r.relevance, Relevance::Low);
        assert!(!r.verified);
    }

    #[test]
    fn csv_missing_column_rejects_batch() {
        let csv = "icon,text\nbroadsword,sword\n";
        let err = parse_csv_batch("old", csv).unwrap_err();
        let errors = err.validation_errors();
        assert_eq!(errors.len(), 3);
        assert!(errors[0].to_string().contains("missing column 'produced_by'"));
    }

    #[test]
    fn csv_collects_every_bad_row() {
        let csv = "\
icon_id,label_text,produced_by,verified,relevance
axe,chop,robot,false,high
axe,wood,machine,false,high
axe,tree,machine,perhaps,high
";
        let err = parse_csv_batch("b", csv).unwrap_err();
        let errors = err.validation_errors();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].row, Some(1));
        assert_eq!(errors[0].icon_id, "axe");
        assert_eq!(errors[1].row, Some(3));
    }

    #[test]
    fn csv_empty_body_is_empty_batch() {
        let csv = "icon_id,label_text,produced_by,verified,relevance\n";
        let batch = parse_csv_batch("b", csv).unwrap();
        assert!(batch.records.is_empty());
    }

    #[test]
    fn json_array() {
        let json = r#"[
            {"icon_id": "axe", "label_text": "chop", "produced_by": "machine", "verified": false, "relevance": "high"},
            {"icon": "axe", "text": "wood", "produced_by": "human", "verified": "yes", "relevance": "low"}
        ]"#;
        let batch = parse_json_batch("j", json).unwrap();
        assert_eq!(batch.records.len(), 2);
        assert!(!batch.records[0].verified);
        assert!(batch.records[1].verified);
        assert_eq!(batch.source, None);
    }

    #[test]
    fn json_document_carries_metadata() {
        let json = r#"{
            "source": "gpt-4o-2024-08-06",
            "created_at": "2024-09-01T12:00:00Z",
            "records": [
                {"icon_id": "axe", "label_text": "chop", "produced_by": "machine", "verified": false, "relevance": "high"}
            ]
        }"#;
        let batch = parse_json_batch("j", json).unwrap();
        assert_eq!(batch.source.as_deref(), Some("gpt-4o-2024-08-06"));
        assert_eq!(
            batch.created_at.unwrap().to_rfc3339(),
            "2024-09-01T12:00:00+00:00"
        );
        assert_eq!(batch.records.len(), 1);
    }

    #[test]
    fn json_syntax_error_rejects_batch() {
        let err = parse_json_batch("j", "[{").unwrap_err();
        assert!(matches!(err, ReconError::InvalidBatch { .. }));
    }

    #[test]
    fn json_missing_field_reports_row() {
        let json = r#"[{"icon_id": "axe", "label_text": "chop", "verified": false, "relevance": "high"}]"#;
        let err = parse_json_batch("j", json).unwrap_err();
        let errors = err.validation_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].row, Some(1));
        assert!(errors[0].to_string().contains("produced_by"));
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(BatchFormat::from_path(Path::new("a/b.CSV")), Some(BatchFormat::Csv));
        assert_eq!(BatchFormat::from_path(Path::new("b.json")), Some(BatchFormat::Json));
        assert_eq!(BatchFormat::from_path(Path::new("b.txt")), None);
    }
}
