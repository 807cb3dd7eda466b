//! `iconlabels-recon`: label batch reconciliation and export engine.
//!
//! Pure engine crate: receives batch text or pre-built batches, returns a
//! reconciled store and rendered views. No CLI or filesystem dependencies.

pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod icons;
pub mod ingest;
pub mod model;
pub mod precedence;
pub mod reconcile;
pub mod selection;
pub mod store;
pub mod summary;

pub use config::LabelsConfig;
pub use engine::{run, RunInput, RunResult};
pub use error::{ReconError, ValidationError, ValidationIssue};
pub use export::{export, EmptySelectionPolicy, ExportView, ViewFormat};
pub use icons::IconCatalog;
pub use model::{Batch, LabelRecord, Producer, Relevance};
pub use reconcile::{reconcile, InvalidBatchPolicy, Reconciler, Reconciliation};
pub use selection::Selection;
pub use store::{LabelStore, StoredLabel};
