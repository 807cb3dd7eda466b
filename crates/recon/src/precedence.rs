use std::cmp::Ordering;

use crate::model::{LabelRecord, Producer, Relevance};

/// Rank of a record's metadata, compared field by field:
/// verified > unverified, then human > machine, then higher relevance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Rank {
    pub verified: bool,
    pub produced_by: Producer,
    pub relevance: Relevance,
}

impl Rank {
    pub fn of(record: &LabelRecord) -> Self {
        Self {
            verified: record.verified,
            produced_by: record.produced_by,
            relevance: record.relevance,
        }
    }
}

/// Compare two records for the same (icon_id, label_text) by metadata alone.
pub fn compare(a: &LabelRecord, b: &LabelRecord) -> Ordering {
    Rank::of(a).cmp(&Rank::of(b))
}

/// Whether `incoming` (from a more recent batch) replaces `existing`.
///
/// Equal ranks go to the more recent record.
pub fn supersedes(incoming: &LabelRecord, existing: &LabelRecord) -> bool {
    compare(incoming, existing) != Ordering::Less
}
