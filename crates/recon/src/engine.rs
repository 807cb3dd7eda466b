use std::collections::HashSet;

use serde::Serialize;
use tracing::info;

use crate::config::LabelsConfig;
use crate::error::ReconError;
use crate::export::{export, ViewFormat};
use crate::icons::IconCatalog;
use crate::model::{Batch, BatchRejection, BatchReport, ReconSummary, RunMeta};
use crate::reconcile::Reconciler;
use crate::selection::Selection;
use crate::store::LabelStore;
use crate::summary::compute_summary;

/// Everything a run needs, already loaded from disk.
#[derive(Debug, Default)]
pub struct RunInput {
    pub catalog: IconCatalog,
    /// Store to continue from; empty for a fresh run.
    pub store: LabelStore,
    /// Batches in configuration order. `Err` entries are batches that
    /// failed to parse; they go through the invalid-batch policy.
    pub batches: Vec<Result<Batch, ReconError>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ViewOutput {
    pub name: String,
    pub file: String,
    pub format: ViewFormat,
    pub selection: Selection,
    pub records: usize,
    pub empty_icons: Vec<String>,
    #[serde(skip)]
    pub rendered: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub meta: RunMeta,
    pub summary: ReconSummary,
    pub applied: Vec<BatchReport>,
    pub rejected: Vec<BatchRejection>,
    pub views: Vec<ViewOutput>,
    #[serde(skip)]
    pub store: LabelStore,
}

/// Sort batches by `created_at`, oldest first. Untimestamped batches come
/// first; equal keys keep their given order.
pub fn order_batches(batches: &mut [Batch]) {
    batches.sort_by_key(|b| b.created_at);
}

/// Reconcile all batches and render every configured view.
pub fn run(config: &LabelsConfig, input: RunInput) -> Result<RunResult, ReconError> {
    let mut reconciler = Reconciler::with_store(input.catalog, input.store)
        .on_invalid(config.on_invalid_batch);

    let mut seen = HashSet::new();
    let mut batches = Vec::new();
    for loaded in input.batches {
        match loaded {
            Ok(batch) => {
                if !seen.insert(batch.id.clone()) {
                    return Err(ReconError::DuplicateBatch(batch.id));
                }
                batches.push(batch);
            }
            Err(err) => {
                let batch_id = match &err {
                    ReconError::InvalidBatch { batch_id, .. } => batch_id.clone(),
                    _ => String::from("<unknown>"),
                };
                if !seen.insert(batch_id.clone()) {
                    return Err(ReconError::DuplicateBatch(batch_id));
                }
                reconciler.handle_rejection(&batch_id, err)?;
            }
        }
    }

    order_batches(&mut batches);
    reconciler.apply_all(batches)?;
    let reconciliation = reconciler.finish();

    let mut views = Vec::with_capacity(config.views.len());
    for view_config in &config.views {
        let format = view_config.format()?;
        let view = export(
            &reconciliation.store,
            &view_config.name,
            &view_config.selection(),
            view_config.empty_policy(config.on_empty_selection),
        )?;
        let rendered = view.render(format)?;
        info!(view = %view.name, records = view.labels.len(), %format, "view rendered");
        views.push(ViewOutput {
            name: view.name,
            file: view_config.file.clone(),
            format,
            selection: view.selection,
            records: view.labels.len(),
            empty_icons: view.empty_icons,
            rendered,
        });
    }

    let summary = compute_summary(
        &reconciliation.store,
        &reconciliation.applied,
        &reconciliation.rejected,
    );

    Ok(RunResult {
        meta: RunMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        summary,
        applied: reconciliation.applied,
        rejected: reconciliation.rejected,
        views,
        store: reconciliation.store,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::parse_csv_batch;
    use crate::model::{LabelRecord, Producer, Relevance};
    use chrono::{TimeZone, Utc};

    const CONFIG: &str = r#"
name = "engine test"

[[views]]
name = "full"
file = "full.csv"

[[views]]
name = "verified"
file = "verified.json"
verified_only = true
"#;

    fn rec(icon: &str, text: &str, p: Producer, v: bool, r: Relevance) -> LabelRecord {
        LabelRecord::new(icon, text, p, v, r)
    }

    #[test]
    fn order_by_created_at_then_given_order() {
        let t = |d| Utc.with_ymd_and_hms(2024, 9, d, 0, 0, 0).unwrap();
        let mut batches = vec![
            Batch::new("late", vec![]).created_at(t(3)),
            Batch::new("untimed-1", vec![]),
            Batch::new("early", vec![]).created_at(t(1)),
            Batch::new("untimed-2", vec![]),
        ];
        order_batches(&mut batches);
        let ids: Vec<_> = batches.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["untimed-1", "untimed-2", "early", "late"]);
    }

    #[test]
    fn timestamps_decide_recency_not_list_order() {
        let t = |d| Utc.with_ymd_and_hms(2024, 9, d, 0, 0, 0).unwrap();
        let config = LabelsConfig::from_toml(CONFIG).unwrap();
        let newer = Batch::new("newer", vec![rec("axe", "chop", Producer::Machine, false, Relevance::High)])
            .created_at(t(2));
        let older = Batch::new("older", vec![rec("axe", "chop", Producer::Machine, false, Relevance::High)])
            .created_at(t(1));

        let result = run(
            &config,
            RunInput {
                batches: vec![Ok(newer), Ok(older)],
                ..RunInput::default()
            },
        )
        .unwrap();
        assert_eq!(result.store.get("axe", "chop").unwrap().batch_id, "newer");
    }

    #[test]
    fn unparseable_batch_is_reported_not_fatal() {
        let config = LabelsConfig::from_toml(CONFIG).unwrap();
        let bad = parse_csv_batch("bad", "icon_id,label_text\naxe,chop\n");
        let good = parse_csv_batch(
            "good",
            "icon_id,label_text,produced_by,verified,relevance\naxe,chop,human,true,high\n",
        );
        let result = run(
            &config,
            RunInput {
                batches: vec![bad, good],
                ..RunInput::default()
            },
        )
        .unwrap();

        assert_eq!(result.summary.batches_rejected, 1);
        assert_eq!(result.rejected[0].batch_id, "bad");
        assert_eq!(result.summary.batches_applied, 1);
        assert_eq!(result.views[0].records, 1);
        assert_eq!(result.views[1].records, 1);
        assert!(result.views[0].rendered.contains("axe,chop,human,true,high"));
    }

    #[test]
    fn duplicate_batch_ids_in_one_run() {
        let config = LabelsConfig::from_toml(CONFIG).unwrap();
        let err = run(
            &config,
            RunInput {
                batches: vec![Ok(Batch::new("a", vec![])), Ok(Batch::new("a", vec![]))],
                ..RunInput::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, ReconError::DuplicateBatch(_)));
    }

    #[test]
    fn empty_run_renders_empty_views() {
        let config = LabelsConfig::from_toml(CONFIG).unwrap();
        let result = run(&config, RunInput::default()).unwrap();
        assert!(result.store.is_empty());
        assert_eq!(result.summary.labels, 0);
        assert_eq!(result.views.len(), 2);
        assert_eq!(result.views[1].rendered.trim(), "[]");
        assert_eq!(result.meta.config_name, "engine test");
    }

    #[test]
    fn empty_selection_fail_policy_aborts_run() {
        let input = format!("on_empty_selection = \"fail\"\n{CONFIG}");
        let config = LabelsConfig::from_toml(&input).unwrap();
        let err = run(
            &config,
            RunInput {
                batches: vec![Ok(Batch::new(
                    "a",
                    vec![rec("axe", "chop", Producer::Machine, false, Relevance::High)],
                ))],
                ..RunInput::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, ReconError::EmptySelection { ref view, .. } if view == "verified"));
    }
}
