//! `iconlabels export`: ad-hoc merge of label files into one filtered view.

use std::io::Write;
use std::path::PathBuf;

use iconlabels_recon::config::{LabelsConfig, ViewConfig};
use iconlabels_recon::engine::RunInput;
use iconlabels_recon::ingest::BatchFormat;
use iconlabels_recon::{EmptySelectionPolicy, InvalidBatchPolicy, Producer, Relevance, Selection, ViewFormat};

use crate::load::{load_batch_file, load_catalog};
use crate::recon::rejected_exit;
use crate::CliError;

pub struct ExportArgs {
    pub files: Vec<PathBuf>,
    pub icons: Option<PathBuf>,
    pub verified_only: bool,
    pub min_relevance: Option<Relevance>,
    pub produced_by: Option<Producer>,
    pub format: Option<ViewFormat>,
    pub output: Option<PathBuf>,
    pub strict: bool,
}

impl ExportArgs {
    fn selection(&self) -> Selection {
        let mut selection = Selection::all();
        selection.verified_only = self.verified_only;
        if let Some(relevance) = self.min_relevance {
            selection = selection.min_relevance(relevance);
        }
        if let Some(producer) = self.produced_by {
            selection = selection.produced_by(producer);
        }
        selection
    }

    fn view_format(&self) -> ViewFormat {
        self.format
            .or_else(|| self.output.as_deref().and_then(ViewFormat::from_path))
            .unwrap_or(ViewFormat::Csv)
    }

    /// A one-view run config. The view file is only a label here; the
    /// rendered text goes to `--output` or stdout.
    fn config(&self) -> LabelsConfig {
        LabelsConfig {
            name: "export".into(),
            icons: None,
            labels_dir: None,
            state: None,
            on_invalid_batch: InvalidBatchPolicy::Skip,
            on_empty_selection: if self.strict {
                EmptySelectionPolicy::Fail
            } else {
                EmptySelectionPolicy::Warn
            },
            batches: Vec::new(),
            views: vec![ViewConfig::new(
                "export",
                self.output
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "-".into()),
                Some(self.view_format()),
                &self.selection(),
            )],
        }
    }
}

pub fn cmd_export(args: ExportArgs) -> Result<(), CliError> {
    let mut input = RunInput {
        catalog: load_catalog(args.icons.as_deref())?,
        ..RunInput::default()
    };

    // The path as given is the batch id, so listing a file twice is a
    // duplicate batch.
    for path in &args.files {
        let format = BatchFormat::from_path(path).ok_or_else(|| {
            CliError::usage(format!("cannot infer format of {}", path.display()))
                .with_hint("label files must end in .csv or .json")
        })?;
        input
            .batches
            .push(load_batch_file(&path.display().to_string(), path, format)?);
    }

    let config = args.config();
    let result = iconlabels_recon::run(&config, input)?;
    let view = &result.views[0];

    match &args.output {
        Some(path) => {
            std::fs::write(path, &view.rendered).map_err(|e| {
                CliError::runtime(format!("cannot write {}: {e}", path.display()))
            })?;
            eprintln!("wrote {} ({}, {} records)", path.display(), view.format, view.records);
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(view.rendered.as_bytes())
                .and_then(|()| stdout.flush())
                .map_err(|e| CliError::runtime(format!("cannot write to stdout: {e}")))?;
        }
    }

    for rejection in &result.rejected {
        eprintln!("  rejected '{}':", rejection.batch_id);
        for err in &rejection.errors {
            eprintln!("    {err}");
        }
    }
    if !view.empty_icons.is_empty() {
        eprintln!(
            "warning: {} icon(s) have no labels in this selection: {}",
            view.empty_icons.len(),
            view.empty_icons.join(", "),
        );
    }

    rejected_exit(&result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> ExportArgs {
        ExportArgs {
            files: vec![PathBuf::from("a.csv")],
            icons: None,
            verified_only: false,
            min_relevance: None,
            produced_by: None,
            format: None,
            output: None,
            strict: false,
        }
    }

    #[test]
    fn format_falls_back_to_output_extension_then_csv() {
        assert_eq!(args().view_format(), ViewFormat::Csv);

        let to_json = ExportArgs { output: Some("out.json".into()), ..args() };
        assert_eq!(to_json.view_format(), ViewFormat::Json);

        let explicit = ExportArgs {
            output: Some("out.json".into()),
            format: Some(ViewFormat::GroupedJson),
            ..args()
        };
        assert_eq!(explicit.view_format(), ViewFormat::GroupedJson);
    }

    #[test]
    fn selection_from_flags() {
        let a = ExportArgs {
            verified_only: true,
            min_relevance: Some(Relevance::Medium),
            produced_by: Some(Producer::Human),
            ..args()
        };
        let s = a.selection();
        assert!(s.verified_only);
        assert_eq!(s.min_relevance, Relevance::Medium);
        assert_eq!(s.produced_by, Some(Producer::Human));
        assert!(args().selection().is_all());
    }

    #[test]
    fn strict_fails_empty_selection() {
        let strict = ExportArgs { strict: true, ..args() };
        assert_eq!(strict.config().on_empty_selection, EmptySelectionPolicy::Fail);
        assert_eq!(args().config().on_empty_selection, EmptySelectionPolicy::Warn);
        strict.config().validate().unwrap();
    }
}
