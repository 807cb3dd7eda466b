use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Why a single record was refused at ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationIssue {
    EmptyIconId,
    EmptyLabel,
    UnknownIcon {
        #[serde(skip_serializing_if = "Option::is_none")]
        suggestion: Option<String>,
    },
    /// A field could not be parsed (bad enum value, missing column, ...).
    Malformed { detail: String },
    /// The batch id was already applied with different contents.
    BatchModified { expected: String, found: String },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyIconId => write!(f, "empty icon_id"),
            Self::EmptyLabel => write!(f, "empty label_text"),
            Self::UnknownIcon { suggestion: Some(s) } => {
                write!(f, "unknown icon (did you mean '{s}'?)")
            }
            Self::UnknownIcon { suggestion: None } => write!(f, "unknown icon"),
            Self::Malformed { detail } => write!(f, "malformed record: {detail}"),
            Self::BatchModified { expected, found } => write!(
                f,
                "batch was already applied with fingerprint {expected}, now {found}"
            ),
        }
    }
}

/// A record (or whole batch) rejected at ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("batch '{batch_id}'{}, icon '{icon_id}': {issue}", row_suffix(.row))]
pub struct ValidationError {
    pub batch_id: String,
    /// 1-based data row within the batch, when the error is tied to one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
    pub icon_id: String,
    pub label_text: String,
    pub issue: ValidationIssue,
}

fn row_suffix(row: &Option<usize>) -> String {
    row.map(|r| format!(", row {r}")).unwrap_or_default()
}

#[derive(Debug, Error)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),
    /// Config validation error (no views, duplicate names, bad format, ...).
    #[error("config validation error: {0}")]
    ConfigValidation(String),
    /// One or more records of a batch failed validation; nothing from it was applied.
    #[error("batch '{batch_id}' rejected: {}", summarize(.errors))]
    InvalidBatch {
        batch_id: String,
        errors: Vec<ValidationError>,
    },
    /// A view's selection left an icon that has labels with none.
    #[error("view '{view}': selection is empty for {} icon(s): {}", .icons.len(), .icons.join(", "))]
    EmptySelection { view: String, icons: Vec<String> },
    /// Two batches in one run share an id.
    #[error("duplicate batch id '{0}'")]
    DuplicateBatch(String),
    /// Input that could not be read as CSV / JSON at all.
    #[error("{source_name}: {message}")]
    Parse {
        source_name: String,
        message: String,
    },
    /// Output serialization failure.
    #[error("serialization error: {0}")]
    Serialize(String),
    /// IO error (file read, etc.).
    #[error("IO error: {0}")]
    Io(String),
}

fn summarize(errors: &[ValidationError]) -> String {
    match errors {
        [] => "no details".into(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{first} (and {} more)", rest.len()),
    }
}

impl ReconError {
    /// Validation errors carried by this error, if it is a rejected batch.
    pub fn validation_errors(&self) -> &[ValidationError] {
        match self {
            Self::InvalidBatch { errors, .. } => errors,
            _ => &[],
        }
    }
}

impl From<std::io::Error> for ReconError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn err(row: Option<usize>, issue: ValidationIssue) -> ValidationError {
        ValidationError {
            batch_id: "b1".into(),
            row,
            icon_id: "sword".into(),
            label_text: "blade".into(),
            issue,
        }
    }

    #[test]
    fn validation_error_mentions_batch_row_and_icon() {
        let e = err(Some(3), ValidationIssue::EmptyLabel);
        assert_eq!(e.to_string(), "batch 'b1', row 3, icon 'sword': empty label_text");
    }

    #[test]
    fn unknown_icon_with_suggestion() {
        let e = err(
            None,
            ValidationIssue::UnknownIcon {
                suggestion: Some("broadsword".into()),
            },
        );
        assert!(e.to_string().contains("did you mean 'broadsword'"));
    }

    #[test]
    fn invalid_batch_summarizes_extra_errors() {
        let e = ReconError::InvalidBatch {
            batch_id: "b1".into(),
            errors: vec![
                err(Some(1), ValidationIssue::EmptyLabel),
                err(Some(2), ValidationIssue::EmptyIconId),
                err(Some(4), ValidationIssue::EmptyLabel),
            ],
        };
        let msg = e.to_string();
        assert!(msg.starts_with("batch 'b1' rejected: "));
        assert!(msg.ends_with("(and 2 more)"));
        assert_eq!(e.validation_errors().len(), 3);
    }

    #[test]
    fn empty_selection_lists_icons() {
        let e = ReconError::EmptySelection {
            view: "verified".into(),
            icons: vec!["axe".into(), "sword".into()],
        };
        assert_eq!(
            e.to_string(),
            "view 'verified': selection is empty for 2 icon(s): axe, sword"
        );
    }
}
