//! Reading configs, catalogs, snapshots and batches from disk.
//!
//! File-level IO failures are runtime errors. A batch file that reads fine
//! but does not parse is handed to the engine as `Err`, so the invalid-batch
//! policy decides whether it is skipped or aborts the run.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use iconlabels_recon::config::LabelsConfig;
use iconlabels_recon::engine::RunInput;
use iconlabels_recon::ingest::{parse_batch, BatchFormat};
use iconlabels_recon::{Batch, IconCatalog, LabelStore, ReconError};
use tracing::{debug, info};

use crate::exit_codes::EXIT_INVALID_CONFIG;
use crate::CliError;

fn read(path: &Path, what: &str) -> Result<String, CliError> {
    std::fs::read_to_string(path)
        .map_err(|e| CliError::runtime(format!("cannot read {what} {}: {e}", path.display())))
}

/// Parse and validate a config file. Returns the config and the directory
/// its relative paths resolve against.
pub fn read_config(config_path: &Path) -> Result<(LabelsConfig, PathBuf), CliError> {
    let config_str = read(config_path, "config")?;
    let config = LabelsConfig::from_toml(&config_str)
        .map_err(|e| CliError::new(EXIT_INVALID_CONFIG, e.to_string()))?;
    let base_dir = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok((config, base_dir))
}

pub fn load_catalog(path: Option<&Path>) -> Result<IconCatalog, CliError> {
    let Some(path) = path else {
        return Ok(IconCatalog::Unrestricted);
    };
    let data = read(path, "icon catalog")?;
    let catalog = IconCatalog::from_csv(&path.display().to_string(), &data)?;
    info!(path = %path.display(), icons = catalog.len().unwrap_or(0), "icon catalog loaded");
    Ok(catalog)
}

/// Load a store snapshot. A missing file is an empty store (first run).
pub fn load_state(path: &Path) -> Result<LabelStore, CliError> {
    if !path.exists() {
        debug!(path = %path.display(), "no state snapshot yet");
        return Ok(LabelStore::new());
    }
    let data = read(path, "state")?;
    let store = LabelStore::from_json(&path.display().to_string(), &data)?;
    info!(path = %path.display(), labels = store.len(), "state snapshot loaded");
    Ok(store)
}

/// Read one batch file. The outer `Result` is the file read; the inner one
/// is the parse.
pub fn load_batch_file(
    batch_id: &str,
    path: &Path,
    format: BatchFormat,
) -> Result<Result<Batch, ReconError>, CliError> {
    let data = read(path, "batch")?;
    Ok(parse_batch(batch_id, format, &data))
}

/// `.csv` / `.json` files directly under `dir`, sorted by file name.
pub fn scan_labels_dir(dir: &Path) -> Result<Vec<PathBuf>, CliError> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        CliError::runtime(format!("cannot read labels directory {}: {e}", dir.display()))
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| CliError::runtime(format!("cannot read {}: {e}", dir.display())))?
            .path();
        if path.is_file() && BatchFormat::from_path(&path).is_some() {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Batch id for a file found by directory scan: its file name, extension
/// included, so `a.csv` and `a.json` are distinct batches.
pub fn batch_id_for(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Identity of a file on disk for de-duplication. Falls back to a lexical
/// form (no `.` segments, `..` folded) when the file cannot be resolved.
fn path_key(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| {
        let mut key = PathBuf::new();
        for component in path.components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir
                    if matches!(key.components().next_back(), Some(Component::Normal(_))) =>
                {
                    key.pop();
                }
                other => key.push(other),
            }
        }
        key
    })
}

/// Load everything a run over `config` needs.
///
/// Explicit `[[batches]]` come first, then `labels_dir` files not already
/// listed. Metadata set in the config overrides what the file carries.
pub fn load_input(config: &LabelsConfig, base_dir: &Path) -> Result<RunInput, CliError> {
    let catalog = load_catalog(config.icons.as_ref().map(|f| base_dir.join(f)).as_deref())?;
    let store = match &config.state {
        Some(file) => load_state(&base_dir.join(file))?,
        None => LabelStore::new(),
    };

    let mut batches = Vec::new();
    let mut listed = HashSet::new();
    for batch_config in &config.batches {
        let path = base_dir.join(&batch_config.file);
        let format = batch_config.format()?;
        let loaded = load_batch_file(&batch_config.id, &path, format)?.map(|mut batch| {
            if batch_config.created_at.is_some() {
                batch.created_at = batch_config.created_at;
            }
            if batch_config.source.is_some() {
                batch.source = batch_config.source.clone();
            }
            batch
        });
        listed.insert(path_key(&path));
        batches.push(loaded);
    }

    if let Some(dir) = &config.labels_dir {
        for path in scan_labels_dir(&base_dir.join(dir))? {
            if listed.contains(&path_key(&path)) {
                debug!(path = %path.display(), "already listed in [[batches]]");
                continue;
            }
            let Some(format) = BatchFormat::from_path(&path) else {
                continue;
            };
            batches.push(load_batch_file(&batch_id_for(&path), &path, format)?);
        }
    }

    debug!(batches = batches.len(), "batches loaded");
    Ok(RunInput { catalog, store, batches })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_sorts_by_name_and_skips_other_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.json"), "[]").unwrap();
        std::fs::write(dir.path().join("a.csv"), "").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();
        std::fs::create_dir(dir.path().join("nested.csv")).unwrap();

        let files = scan_labels_dir(dir.path()).unwrap();
        let names: Vec<_> = files.iter().map(|p| batch_id_for(p)).collect();
        assert_eq!(names, vec!["a.csv", "b.json"]);
    }

    const ROW: &str = "icon_id,label_text,produced_by,verified,relevance\naxe,chop,human,true,high\n";

    #[test]
    fn same_stem_files_load_as_separate_batches() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("labels")).unwrap();
        std::fs::write(dir.path().join("labels/a.csv"), ROW).unwrap();
        std::fs::write(
            dir.path().join("labels/a.json"),
            r#"[{"icon_id": "axe", "label_text": "tool", "produced_by": "machine", "verified": false, "relevance": "low"}]"#,
        )
        .unwrap();

        let config = LabelsConfig::from_toml(
            r#"
name = "t"
labels_dir = "labels"

[[views]]
name = "full"
file = "full.csv"
"#,
        )
        .unwrap();
        let input = load_input(&config, dir.path()).unwrap();
        let ids: Vec<_> = input
            .batches
            .iter()
            .map(|b| b.as_ref().unwrap().id.clone())
            .collect();
        assert_eq!(ids, vec!["a.csv", "a.json"]);
    }

    #[test]
    fn listed_batch_is_not_scanned_again() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("labels")).unwrap();
        std::fs::write(dir.path().join("labels/a.csv"), ROW).unwrap();
        std::fs::write(dir.path().join("labels/b.csv"), ROW).unwrap();

        let config = LabelsConfig::from_toml(
            r#"
name = "t"
labels_dir = "labels"

[[batches]]
id = "first"
file = "./labels/../labels/a.csv"

[[views]]
name = "full"
file = "full.csv"
"#,
        )
        .unwrap();
        let input = load_input(&config, dir.path()).unwrap();
        let ids: Vec<_> = input
            .batches
            .iter()
            .map(|b| b.as_ref().unwrap().id.clone())
            .collect();
        assert_eq!(ids, vec!["first", "b.csv"]);
    }

    #[test]
    fn lexical_key_drops_dot_segments() {
        assert_eq!(
            path_key(Path::new("missing/./x/../a.csv")),
            PathBuf::from("missing/a.csv")
        );
    }

    #[test]
    fn missing_state_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = load_state(&dir.path().join("state.json")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn unparseable_batch_is_inner_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "icon_id\naxe\n").unwrap();
        let loaded = load_batch_file("bad", &path, BatchFormat::Csv).unwrap();
        assert!(matches!(loaded, Err(ReconError::InvalidBatch { .. })));
    }

    #[test]
    fn missing_batch_file_is_runtime_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_batch_file("gone", &dir.path().join("gone.csv"), BatchFormat::Csv).unwrap_err();
        assert_eq!(err.code, crate::exit_codes::EXIT_RUNTIME);
    }
}
