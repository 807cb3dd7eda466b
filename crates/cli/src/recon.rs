//! `iconlabels run` and `iconlabels validate`: config-driven reconciliation.

use std::path::{Path, PathBuf};

use iconlabels_recon::config::LabelsConfig;
use iconlabels_recon::engine::RunResult;
use iconlabels_recon::Reconciler;
use tracing::info;

use crate::exit_codes::EXIT_REJECTED;
use crate::load::{load_input, read_config};
use crate::CliError;

pub fn cmd_run(
    config_path: PathBuf,
    json_output: bool,
    output_file: Option<PathBuf>,
    dry_run: bool,
) -> Result<(), CliError> {
    let (config, base_dir) = read_config(&config_path)?;
    let input = load_input(&config, &base_dir)?;
    let result = iconlabels_recon::run(&config, input)?;

    if !dry_run {
        write_outputs(&config, &result, &base_dir)?;
    }

    // Output
    let json_str = serde_json::to_string_pretty(&result)
        .map_err(|e| CliError::runtime(format!("JSON serialization error: {e}")))?;

    if let Some(ref path) = output_file {
        std::fs::write(path, &json_str)
            .map_err(|e| CliError::runtime(format!("cannot write output: {e}")))?;
        eprintln!("wrote {}", path.display());
    }

    if json_output {
        println!("{json_str}");
    }

    print_summary(&result, dry_run);
    rejected_exit(&result)
}

/// Write every rendered view, then the state snapshot when configured.
/// Parent directories are created as needed.
pub fn write_outputs(config: &LabelsConfig, result: &RunResult, base_dir: &Path) -> Result<(), CliError> {
    for view in &result.views {
        let path = base_dir.join(&view.file);
        write_file(&path, &view.rendered)?;
        info!(view = %view.name, path = %path.display(), "view written");
    }

    if let Some(state) = &config.state {
        let path = base_dir.join(state);
        let snapshot = result.store.to_json_pretty()?;
        write_file(&path, &snapshot)?;
        info!(path = %path.display(), labels = result.store.len(), "state snapshot written");
    }
    Ok(())
}

fn write_file(path: &Path, contents: &str) -> Result<(), CliError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            CliError::runtime(format!("cannot create {}: {e}", parent.display()))
        })?;
    }
    std::fs::write(path, contents)
        .map_err(|e| CliError::runtime(format!("cannot write {}: {e}", path.display())))
}

/// Human summary to stderr.
pub fn print_summary(result: &RunResult, dry_run: bool) {
    let s = &result.summary;
    eprintln!(
        "'{}': {} batch(es) applied, {} rejected, {} already applied; {} records seen, {} conflicts resolved",
        result.meta.config_name,
        s.batches_applied,
        s.batches_rejected,
        s.batches_skipped,
        s.records_seen,
        s.conflicts_resolved,
    );
    eprintln!(
        "store: {} labels across {} icons, {} verified",
        s.labels, s.icons, s.verified,
    );

    for rejection in &result.rejected {
        eprintln!("  rejected '{}':", rejection.batch_id);
        for err in &rejection.errors {
            eprintln!("    {err}");
        }
    }

    for view in &result.views {
        let verb = if dry_run { "would write" } else { "wrote" };
        eprintln!("  {verb} {} ({}, {} records)", view.file, view.format, view.records);
        if !view.empty_icons.is_empty() {
            eprintln!(
                "    warning: {} icon(s) have no labels in view '{}'",
                view.empty_icons.len(),
                view.name,
            );
        }
    }
}

/// Exit 3 when anything was skipped; views were still written.
pub fn rejected_exit(result: &RunResult) -> Result<(), CliError> {
    if result.rejected.is_empty() {
        return Ok(());
    }
    Err(CliError::new(
        EXIT_REJECTED,
        format!("{} batch(es) rejected", result.rejected.len()),
    )
    .with_hint("fix the listed rows and run again; accepted batches are not re-applied"))
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let (config, base_dir) = read_config(&config_path)?;
    let input = load_input(&config, &base_dir)?;

    // Validate every batch against the catalog and the stored fingerprints.
    let checker = Reconciler::with_store(input.catalog, input.store);

    let total = input.batches.len();
    let mut bad = 0usize;
    for loaded in input.batches {
        let outcome = loaded.and_then(|batch| checker.validate(&batch).map(|()| batch.id));
        match outcome {
            Ok(id) => eprintln!("  ok       {id}"),
            Err(err) => {
                bad += 1;
                eprintln!("  invalid  {err}");
                for detail in err.validation_errors().iter().skip(1) {
                    eprintln!("           {detail}");
                }
            }
        }
    }

    eprintln!(
        "valid config '{}': {} batch(es), {} view(s)",
        config.name,
        total,
        config.views.len(),
    );

    if bad > 0 {
        return Err(CliError::new(EXIT_REJECTED, format!("{bad} of {total} batch(es) invalid")));
    }
    Ok(())
}
