//! Projecting the store into filtered, serialized views.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ReconError;
use crate::model::LabelRecord;
use crate::selection::Selection;
use crate::store::{LabelStore, StoredLabel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewFormat {
    /// `icon_id,label_text,produced_by,verified,relevance`
    Csv,
    /// Array of record objects, each with its occurrence `count`.
    Json,
    /// `{ icon_id: [label_text, ...] }`
    GroupedJson,
}

impl ViewFormat {
    /// Infer from a file extension. `.json` means full records, not grouped.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

impl std::fmt::Display for ViewFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Csv => write!(f, "csv"),
            Self::Json => write!(f, "json"),
            Self::GroupedJson => write!(f, "grouped_json"),
        }
    }
}

/// What to do when a selection leaves a labeled icon with nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptySelectionPolicy {
    #[default]
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportView {
    pub name: String,
    pub selection: Selection,
    #[serde(skip)]
    pub labels: Vec<StoredLabel>,
    /// Icons with labels in the store but none in this view.
    pub empty_icons: Vec<String>,
}

impl ExportView {
    /// Plain records in export order.
    pub fn records(&self) -> Vec<LabelRecord> {
        self.labels.iter().map(|s| s.record.clone()).collect()
    }

    pub fn render(&self, format: ViewFormat) -> Result<String, ReconError> {
        render(&self.labels, format)
    }
}

/// One element of a JSON view.
#[derive(Serialize)]
struct JsonLabel<'a> {
    #[serde(flatten)]
    record: &'a LabelRecord,
    count: usize,
}

/// Select records from `store` in (icon_id, label_text) order.
pub fn export(
    store: &LabelStore,
    name: &str,
    selection: &Selection,
    policy: EmptySelectionPolicy,
) -> Result<ExportView, ReconError> {
    let labels: Vec<StoredLabel> = store
        .iter()
        .filter(|s| selection.matches(&s.record))
        .cloned()
        .collect();

    let empty_icons: Vec<String> = store
        .icons()
        .into_iter()
        .filter(|icon| !store.labels_for(icon).any(|s| selection.matches(&s.record)))
        .map(String::from)
        .collect();

    if !empty_icons.is_empty() {
        match policy {
            EmptySelectionPolicy::Fail => {
                return Err(ReconError::EmptySelection {
                    view: name.into(),
                    icons: empty_icons,
                });
            }
            EmptySelectionPolicy::Warn => {
                warn!(
                    view = %name,
                    selection = %selection,
                    icons = empty_icons.len(),
                    "selection is empty for some labeled icons"
                );
            }
        }
    }

    Ok(ExportView {
        name: name.into(),
        selection: selection.clone(),
        labels,
        empty_icons,
    })
}

pub fn render(labels: &[StoredLabel], format: ViewFormat) -> Result<String, ReconError> {
    let mut buf = Vec::new();
    write_labels(labels, format, &mut buf)?;
    String::from_utf8(buf).map_err(|e| ReconError::Serialize(e.to_string()))
}

/// CSV carries the five record columns only, so it re-ingests unchanged.
pub fn write_labels<W: Write>(
    labels: &[StoredLabel],
    format: ViewFormat,
    writer: W,
) -> Result<(), ReconError> {
    let ser = |e: &dyn std::fmt::Display| ReconError::Serialize(e.to_string());
    match format {
        ViewFormat::Csv => {
            let mut wtr = csv::Writer::from_writer(writer);
            if labels.is_empty() {
                wtr.write_record(["icon_id", "label_text", "produced_by", "verified", "relevance"])
                    .map_err(|e| ser(&e))?;
            }
            for s in labels {
                wtr.serialize(&s.record).map_err(|e| ser(&e))?;
            }
            wtr.flush()?;
        }
        ViewFormat::Json => {
            let rows: Vec<JsonLabel<'_>> = labels
                .iter()
                .map(|s| JsonLabel {
                    record: &s.record,
                    count: s.count(),
                })
                .collect();
            let mut writer = writer;
            serde_json::to_writer_pretty(&mut writer, &rows).map_err(|e| ser(&e))?;
            writeln!(writer)?;
        }
        ViewFormat::GroupedJson => {
            let mut grouped: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
            for s in labels {
                grouped
                    .entry(&s.record.icon_id)
                    .or_default()
                    .push(&s.record.label_text);
            }
            let mut writer = writer;
            serde_json::to_writer_pretty(&mut writer, &grouped).map_err(|e| ser(&e))?;
            writeln!(writer)?;
        }
    }
    Ok(())
}
