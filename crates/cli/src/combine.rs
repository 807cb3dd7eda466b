//! `iconlabels combine`: every label file in a directory into the standard
//! `dist/` outputs, without a config file.

use std::path::{Path, PathBuf};

use iconlabels_recon::config::{LabelsConfig, ViewConfig};
use iconlabels_recon::{EmptySelectionPolicy, InvalidBatchPolicy, Selection, ViewFormat};
use tracing::warn;

use crate::load::{load_input, scan_labels_dir};
use crate::recon::{print_summary, rejected_exit, write_outputs};
use crate::CliError;

pub const ALL_LABELS_CSV: &str = "all_labels.csv";
pub const ALL_LABELS_JSON: &str = "all_labels.json";
pub const VERIFIED_LABELS_CSV: &str = "verified_labels.csv";

fn view(name: &str, out_dir: &Path, file: &str, format: ViewFormat, selection: Selection) -> ViewConfig {
    ViewConfig::new(
        name,
        out_dir.join(file).to_string_lossy(),
        Some(format),
        &selection,
    )
}

/// The run config `combine` is shorthand for.
pub fn combine_config(labels_dir: &Path, out_dir: &Path, icons: Option<&Path>) -> LabelsConfig {
    LabelsConfig {
        name: format!("combine {}", labels_dir.display()),
        icons: icons.map(|p| p.to_string_lossy().into_owned()),
        labels_dir: Some(labels_dir.to_string_lossy().into_owned()),
        state: None,
        on_invalid_batch: InvalidBatchPolicy::Skip,
        on_empty_selection: EmptySelectionPolicy::Warn,
        batches: Vec::new(),
        views: vec![
            view("all", out_dir, ALL_LABELS_CSV, ViewFormat::Csv, Selection::all()),
            view("grouped", out_dir, ALL_LABELS_JSON, ViewFormat::GroupedJson, Selection::all()),
            view("verified", out_dir, VERIFIED_LABELS_CSV, ViewFormat::Csv, Selection::verified()),
        ],
    }
}

pub fn cmd_combine(labels_dir: PathBuf, out_dir: PathBuf, icons: Option<PathBuf>) -> Result<(), CliError> {
    if scan_labels_dir(&labels_dir)?.is_empty() {
        warn!(dir = %labels_dir.display(), "no label files found");
        eprintln!("no label files found in {}", labels_dir.display());
        return Ok(());
    }

    let config = combine_config(&labels_dir, &out_dir, icons.as_deref());
    config.validate()?;

    let base_dir = Path::new("");
    let input = load_input(&config, base_dir)?;
    let result = iconlabels_recon::run(&config, input)?;
    write_outputs(&config, &result, base_dir)?;

    print_summary(&result, false);
    rejected_exit(&result)
}
