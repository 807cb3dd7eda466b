use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::ReconError;
use crate::export::{EmptySelectionPolicy, ViewFormat};
use crate::ingest::BatchFormat;
use crate::model::{Producer, Relevance};
use crate::reconcile::InvalidBatchPolicy;
use crate::selection::Selection;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LabelsConfig {
    pub name: String,
    /// Icon catalog CSV (`icon,path`). Absent means any icon id is accepted.
    #[serde(default)]
    pub icons: Option<String>,
    /// Directory whose `*.csv` / `*.json` files are batches, ordered by name.
    #[serde(default)]
    pub labels_dir: Option<String>,
    /// Store snapshot to continue from and write back.
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub on_invalid_batch: InvalidBatchPolicy,
    #[serde(default)]
    pub on_empty_selection: EmptySelectionPolicy,
    #[serde(default)]
    pub batches: Vec<BatchConfig>,
    #[serde(default)]
    pub views: Vec<ViewConfig>,
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchConfig {
    pub id: String,
    pub file: String,
    #[serde(default)]
    pub format: Option<BatchFormat>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub source: Option<String>,
}

impl BatchConfig {
    pub fn format(&self) -> Result<BatchFormat, ReconError> {
        self.format
            .or_else(|| BatchFormat::from_path(Path::new(&self.file)))
            .ok_or_else(|| {
                ReconError::ConfigValidation(format!(
                    "batch '{}': cannot infer format of '{}' (set format = \"csv\" or \"json\")",
                    self.id, self.file
                ))
            })
    }
}

// ---------------------------------------------------------------------------
// View
// ---------------------------------------------------------------------------

/// A `[[views]]` table. Selection keys sit directly in the table; a
/// misspelled key is a parse error rather than a silently wider view.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ViewConfig {
    pub name: String,
    pub file: String,
    #[serde(default)]
    pub format: Option<ViewFormat>,
    #[serde(default)]
    pub verified_only: bool,
    #[serde(default)]
    pub min_relevance: Relevance,
    #[serde(default)]
    pub produced_by: Option<Producer>,
    /// Overrides the top-level policy for this view.
    #[serde(default)]
    pub on_empty_selection: Option<EmptySelectionPolicy>,
}

impl ViewConfig {
    pub fn new(
        name: impl Into<String>,
        file: impl Into<String>,
        format: Option<ViewFormat>,
        selection: &Selection,
    ) -> Self {
        Self {
            name: name.into(),
            file: file.into(),
            format,
            verified_only: selection.verified_only,
            min_relevance: selection.min_relevance,
            produced_by: selection.produced_by,
            on_empty_selection: None,
        }
    }

    pub fn selection(&self) -> Selection {
        Selection {
            verified_only: self.verified_only,
            min_relevance: self.min_relevance,
            produced_by: self.produced_by,
        }
    }

    pub fn format(&self) -> Result<ViewFormat, ReconError> {
        self.format
            .or_else(|| ViewFormat::from_path(Path::new(&self.file)))
            .ok_or_else(|| {
                ReconError::ConfigValidation(format!(
                    "view '{}': cannot infer format of '{}' (set format = \"csv\", \"json\" or \"grouped_json\")",
                    self.name, self.file
                ))
            })
    }

    pub fn empty_policy(&self, default: EmptySelectionPolicy) -> EmptySelectionPolicy {
        self.on_empty_selection.unwrap_or(default)
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl LabelsConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: LabelsConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.name.trim().is_empty() {
            return Err(ReconError::ConfigValidation("name must not be empty".into()));
        }

        if self.views.is_empty() {
            return Err(ReconError::ConfigValidation(
                "at least one [[views]] entry is required".into(),
            ));
        }

        let mut batch_ids = HashSet::new();
        for batch in &self.batches {
            if batch.id.trim().is_empty() {
                return Err(ReconError::ConfigValidation(format!(
                    "batch for '{}' has an empty id",
                    batch.file
                )));
            }
            if batch.file.trim().is_empty() {
                return Err(ReconError::ConfigValidation(format!(
                    "batch '{}': file must not be empty",
                    batch.id
                )));
            }
            if !batch_ids.insert(batch.id.as_str()) {
                return Err(ReconError::DuplicateBatch(batch.id.clone()));
            }
            batch.format()?;
        }

        let mut view_names = HashSet::new();
        let mut view_files = HashSet::new();
        for view in &self.views {
            if view.name.trim().is_empty() {
                return Err(ReconError::ConfigValidation("view name must not be empty".into()));
            }
            if !view_names.insert(view.name.as_str()) {
                return Err(ReconError::ConfigValidation(format!(
                    "duplicate view name '{}'",
                    view.name
                )));
            }
            if view.file.trim().is_empty() {
                return Err(ReconError::ConfigValidation(format!(
                    "view '{}': file must not be empty",
                    view.name
                )));
            }
            if !view_files.insert(view.file.as_str()) {
                return Err(ReconError::ConfigValidation(format!(
                    "view '{}': file '{}' is written by another view",
                    view.name, view.file
                )));
            }
            view.format()?;
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
