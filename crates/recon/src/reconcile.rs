//! Folding batches into a Label Store.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ReconError, ValidationError, ValidationIssue};
use crate::icons::IconCatalog;
use crate::model::{Batch, BatchRejection, BatchReport};
use crate::store::{LabelStore, Upsert};

/// What to do with a batch that fails validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidBatchPolicy {
    /// Record the rejection and keep going.
    #[default]
    Skip,
    /// Abort with the validation error.
    Fail,
}

/// Result of a reconciliation: the store plus per-batch provenance.
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    pub store: LabelStore,
    pub applied: Vec<BatchReport>,
    pub rejected: Vec<BatchRejection>,
}

pub struct Reconciler {
    catalog: IconCatalog,
    policy: InvalidBatchPolicy,
    store: LabelStore,
    applied: Vec<BatchReport>,
    rejected: Vec<BatchRejection>,
}

impl Reconciler {
    pub fn new(catalog: IconCatalog) -> Self {
        Self::with_store(catalog, LabelStore::new())
    }

    /// Continue from an existing store (incremental update).
    pub fn with_store(catalog: IconCatalog, store: LabelStore) -> Self {
        Self {
            catalog,
            policy: InvalidBatchPolicy::default(),
            store,
            applied: Vec::new(),
            rejected: Vec::new(),
        }
    }

    pub fn on_invalid(mut self, policy: InvalidBatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn store(&self) -> &LabelStore {
        &self.store
    }

    /// Check every record of `batch` without touching the store.
    pub fn validate(&self, batch: &Batch) -> Result<(), ReconError> {
        let mut errors = Vec::new();

        if let Some(expected) = self.store.batch_fingerprint(&batch.id) {
            let found = batch.fingerprint();
            if expected != found {
                errors.push(ValidationError {
                    batch_id: batch.id.clone(),
                    row: None,
                    icon_id: String::new(),
                    label_text: String::new(),
                    issue: ValidationIssue::BatchModified {
                        expected: expected.to_string(),
                        found,
                    },
                });
            }
        }

        for (i, record) in batch.records.iter().enumerate() {
            let issue = if record.icon_id.trim().is_empty() {
                ValidationIssue::EmptyIconId
            } else if record.label_text.trim().is_empty() {
                ValidationIssue::EmptyLabel
            } else if !self.catalog.contains(&record.icon_id) {
                ValidationIssue::UnknownIcon {
                    suggestion: self.catalog.suggest(&record.icon_id),
                }
            } else {
                continue;
            };
            errors.push(ValidationError {
                batch_id: batch.id.clone(),
                row: Some(i + 1),
                icon_id: record.icon_id.clone(),
                label_text: record.label_text.clone(),
                issue,
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ReconError::InvalidBatch {
                batch_id: batch.id.clone(),
                errors,
            })
        }
    }

    /// Validate and apply one batch. The batch is atomic: on error nothing
    /// from it reaches the store. Re-applying an already applied batch with
    /// identical contents is a no-op.
    pub fn apply(&mut self, mut batch: Batch) -> Result<BatchReport, ReconError> {
        batch.normalize();
        self.validate(&batch)?;

        let fingerprint = batch.fingerprint();
        let mut report = BatchReport {
            batch_id: batch.id.clone(),
            source: batch.source.clone(),
            created_at: batch.created_at,
            fingerprint: fingerprint.clone(),
            records: batch.records.len(),
            inserted: 0,
            replaced: 0,
            kept: 0,
            already_applied: false,
        };

        if self.store.batch_fingerprint(&batch.id).is_some() {
            info!(batch = %batch.id, "batch already applied, skipping");
            report.already_applied = true;
            self.applied.push(report.clone());
            return Ok(report);
        }

        for record in batch.records {
            let (icon_id, label_text) = (record.icon_id.clone(), record.label_text.clone());
            match self.store.offer(record, &batch.id) {
                Upsert::Inserted => report.inserted += 1,
                Upsert::Replaced => {
                    debug!(batch = %batch.id, icon = %icon_id, label = %label_text, "record replaced");
                    report.replaced += 1;
                }
                Upsert::Kept => {
                    debug!(batch = %batch.id, icon = %icon_id, label = %label_text, "existing record kept");
                    report.kept += 1;
                }
            }
        }
        self.store.mark_applied(&batch.id, &fingerprint);

        info!(
            batch = %report.batch_id,
            records = report.records,
            inserted = report.inserted,
            replaced = report.replaced,
            kept = report.kept,
            "batch applied"
        );
        self.applied.push(report.clone());
        Ok(report)
    }

    /// Apply batches in order (earliest first). Under `Skip`, rejected
    /// batches are recorded and the fold continues.
    pub fn apply_all<I>(&mut self, batches: I) -> Result<(), ReconError>
    where
        I: IntoIterator<Item = Batch>,
    {
        for batch in batches {
            let batch_id = batch.id.clone();
            if let Err(e) = self.apply(batch) {
                self.handle_rejection(&batch_id, e)?;
            }
        }
        Ok(())
    }

    /// Route a batch-level failure (from `apply` or from loading) through the
    /// invalid-batch policy.
    pub fn handle_rejection(&mut self, batch_id: &str, err: ReconError) -> Result<(), ReconError> {
        match (err, self.policy) {
            (ReconError::InvalidBatch { batch_id, errors }, InvalidBatchPolicy::Skip) => {
                warn!(batch = %batch_id, errors = errors.len(), "batch rejected");
                for e in &errors {
                    warn!("  {e}");
                }
                self.rejected.push(BatchRejection { batch_id, errors });
                Ok(())
            }
            (err @ ReconError::InvalidBatch { .. }, InvalidBatchPolicy::Fail) => Err(err),
            (err, _) => {
                warn!(batch = %batch_id, "batch could not be applied: {err}");
                Err(err)
            }
        }
    }

    pub fn finish(self) -> Reconciliation {
        Reconciliation {
            store: self.store,
            applied: self.applied,
            rejected: self.rejected,
        }
    }
}

/// Fold `batches` (earliest first) into a fresh store, skipping invalid batches.
pub fn reconcile<I>(catalog: &IconCatalog, batches: I) -> Result<Reconciliation, ReconError>
where
    I: IntoIterator<Item = Batch>,
{
    let mut reconciler = Reconciler::new(catalog.clone());
    reconciler.apply_all(batches)?;
    Ok(reconciler.finish())
}
