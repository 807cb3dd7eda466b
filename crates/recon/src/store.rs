//! The Label Store: one record per (icon_id, label_text), plus the ids of
//! every batch that has been applied to it.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::ReconError;
use crate::model::{Batch, LabelKey, LabelRecord};
use crate::precedence::supersedes;

const SNAPSHOT_VERSION: u32 = 1;

/// A winning record, the batch it came from, and how often each batch
/// produced the pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredLabel {
    #[serde(flatten)]
    pub record: LabelRecord,
    pub batch_id: String,
    /// batch id -> times that batch offered this (icon_id, label_text)
    #[serde(default)]
    pub occurrences: BTreeMap<String, usize>,
}

impl StoredLabel {
    fn new(record: LabelRecord, batch_id: &str) -> Self {
        Self {
            record,
            batch_id: batch_id.into(),
            occurrences: BTreeMap::from([(batch_id.to_string(), 1)]),
        }
    }

    /// Times the pair was produced, across every contributing batch.
    pub fn count(&self) -> usize {
        self.occurrences.values().sum()
    }

    /// Contributing batch ids, sorted.
    pub fn batch_ids(&self) -> impl Iterator<Item = &str> {
        self.occurrences.keys().map(String::as_str)
    }
}

/// Outcome of offering one record to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Replaced,
    Kept,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "StoreSnapshot", try_from = "StoreSnapshot")]
pub struct LabelStore {
    labels: BTreeMap<LabelKey, StoredLabel>,
    /// batch id -> fingerprint
    batches: BTreeMap<String, String>,
}

/// On-disk layout. Labels are a sorted list since JSON map keys must be strings.
#[derive(Serialize, Deserialize)]
struct StoreSnapshot {
    version: u32,
    batches: BTreeMap<String, String>,
    labels: Vec<StoredLabel>,
}

impl From<LabelStore> for StoreSnapshot {
    fn from(store: LabelStore) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            batches: store.batches,
            labels: store.labels.into_values().collect(),
        }
    }
}

impl TryFrom<StoreSnapshot> for LabelStore {
    type Error = String;

    fn try_from(snapshot: StoreSnapshot) -> Result<Self, Self::Error> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(format!(
                "unsupported store snapshot version {} (expected {SNAPSHOT_VERSION})",
                snapshot.version
            ));
        }
        let mut labels = BTreeMap::new();
        for mut stored in snapshot.labels {
            if stored.occurrences.is_empty() {
                stored.occurrences.insert(stored.batch_id.clone(), 1);
            }
            let key = stored.record.key();
            if labels.insert(key.clone(), stored).is_some() {
                return Err(format!(
                    "duplicate label ('{}', '{}') in snapshot",
                    key.icon_id, key.label_text
                ));
            }
        }
        Ok(Self {
            labels,
            batches: snapshot.batches,
        })
    }
}

impl LabelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, icon_id: &str, label_text: &str) -> Option<&StoredLabel> {
        self.labels.get(&LabelKey {
            icon_id: icon_id.into(),
            label_text: label_text.into(),
        })
    }

    /// Stored labels in (icon_id, label_text) order.
    pub fn iter(&self) -> impl Iterator<Item = &StoredLabel> {
        self.labels.values()
    }

    /// Plain records in (icon_id, label_text) order.
    pub fn records(&self) -> Vec<LabelRecord> {
        self.labels.values().map(|s| s.record.clone()).collect()
    }

    /// Every icon with at least one label.
    pub fn icons(&self) -> BTreeSet<&str> {
        self.labels.keys().map(|k| k.icon_id.as_str()).collect()
    }

    pub fn labels_for<'a>(&'a self, icon_id: &'a str) -> impl Iterator<Item = &'a StoredLabel> + 'a {
        let start = LabelKey {
            icon_id: icon_id.to_string(),
            label_text: String::new(),
        };
        self.labels
            .range(start..)
            .take_while(move |(k, _)| k.icon_id == icon_id)
            .map(|(_, v)| v)
    }

    /// Fingerprint recorded for an applied batch.
    pub fn batch_fingerprint(&self, batch_id: &str) -> Option<&str> {
        self.batches.get(batch_id).map(String::as_str)
    }

    pub fn applied_batches(&self) -> impl Iterator<Item = (&str, &str)> {
        self.batches.iter().map(|(id, fp)| (id.as_str(), fp.as_str()))
    }

    /// Offer a record from `batch_id`, treated as more recent than anything
    /// already stored. Applies the precedence rule; every offer counts as
    /// one occurrence whether or not it wins.
    pub fn offer(&mut self, mut record: LabelRecord, batch_id: &str) -> Upsert {
        record.normalize();
        let key = record.key();
        let Some(existing) = self.labels.get_mut(&key) else {
            self.labels.insert(key, StoredLabel::new(record, batch_id));
            return Upsert::Inserted;
        };

        *existing.occurrences.entry(batch_id.to_string()).or_insert(0) += 1;
        if supersedes(&record, &existing.record) {
            existing.record = record;
            existing.batch_id = batch_id.into();
            Upsert::Replaced
        } else {
            Upsert::Kept
        }
    }

    pub(crate) fn mark_applied(&mut self, batch_id: &str, fingerprint: &str) {
        self.batches.insert(batch_id.into(), fingerprint.into());
    }

    /// Merge `other` into this store under the same precedence rule, with
    /// `other` treated as more recent. Batch provenance is unioned; an id
    /// already known here keeps its fingerprint.
    ///
    /// Occurrences merge per batch id: counts from a batch already known here
    /// are kept, so absorbing a store twice changes nothing.
    pub fn absorb(&mut self, other: &LabelStore) {
        for (key, incoming) in &other.labels {
            let Some(existing) = self.labels.get_mut(key) else {
                self.labels.insert(key.clone(), incoming.clone());
                continue;
            };
            for (batch_id, n) in &incoming.occurrences {
                existing.occurrences.entry(batch_id.clone()).or_insert(*n);
            }
            if supersedes(&incoming.record, &existing.record) {
                existing.record = incoming.record.clone();
                existing.batch_id = incoming.batch_id.clone();
            }
        }
        for (id, fp) in &other.batches {
            self.batches.entry(id.clone()).or_insert_with(|| fp.clone());
        }
    }

    /// The store's records as a single batch, e.g. for re-ingestion elsewhere.
    pub fn to_batch(&self, batch_id: impl Into<String>) -> Batch {
        Batch::new(batch_id, self.records())
    }

    pub fn to_json_pretty(&self) -> Result<String, ReconError> {
        serde_json::to_string_pretty(self).map_err(|e| ReconError::Serialize(e.to_string()))
    }

    pub fn from_json(source_name: &str, data: &str) -> Result<Self, ReconError> {
        serde_json::from_str(data).map_err(|e| ReconError::Parse {
            source_name: source_name.into(),
            message: e.to_string(),
        })
    }
}
