use std::collections::BTreeMap;

use crate::model::{BatchRejection, BatchReport, ReconSummary};
use crate::store::LabelStore;

/// Compute summary statistics from a reconciled store and its provenance.
pub fn compute_summary(
    store: &LabelStore,
    applied: &[BatchReport],
    rejected: &[BatchRejection],
) -> ReconSummary {
    let mut by_producer: BTreeMap<String, usize> = BTreeMap::new();
    let mut by_relevance: BTreeMap<String, usize> = BTreeMap::new();
    let mut verified = 0;

    for stored in store.iter() {
        let r = &stored.record;
        *by_producer.entry(r.produced_by.to_string()).or_insert(0) += 1;
        *by_relevance.entry(r.relevance.to_string()).or_insert(0) += 1;
        if r.verified {
            verified += 1;
        }
    }

    let mut summary = ReconSummary {
        batches_rejected: rejected.len(),
        labels: store.len(),
        icons: store.icons().len(),
        verified,
        by_producer,
        by_relevance,
        ..ReconSummary::default()
    };

    for report in applied {
        if report.already_applied {
            summary.batches_skipped += 1;
            continue;
        }
        summary.batches_applied += 1;
        summary.records_seen += report.records;
        summary.conflicts_resolved += report.replaced + report.kept;
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LabelRecord, Producer, Relevance};

    fn report(id: &str, records: usize, replaced: usize, kept: usize, skipped: bool) -> BatchReport {
        BatchReport {
            batch_id: id.into(),
            source: None,
            created_at: None,
            fingerprint: String::new(),
            records,
            inserted: records - replaced - kept,
            replaced,
            kept,
            already_applied: skipped,
        }
    }

    #[test]
    fn summary_counts() {
        let mut store = LabelStore::new();
        store.offer(LabelRecord::new("axe", "chop", Producer::Human, true, Relevance::High), "a");
        store.offer(LabelRecord::new("axe", "wood", Producer::Machine, false, Relevance::Low), "a");
        store.offer(LabelRecord::new("bow", "arrow", Producer::Machine, false, Relevance::Low), "b");

        let applied = vec![
            report("a", 2, 0, 0, false),
            report("b", 3, 1, 1, false),
            report("c", 0, 0, 0, true),
        ];
        let rejected = vec![BatchRejection {
            batch_id: "d".into(),
            errors: Vec::new(),
        }];

        let summary = compute_summary(&store, &applied, &rejected);
        assert_eq!(summary.batches_applied, 2);
        assert_eq!(summary.batches_skipped, 1);
        assert_eq!(summary.batches_rejected, 1);
        assert_eq!(summary.records_seen, 5);
        assert_eq!(summary.conflicts_resolved, 2);
        assert_eq!(summary.labels, 3);
        assert_eq!(summary.icons, 2);
        assert_eq!(summary.verified, 1);
        assert_eq!(summary.by_producer["machine"], 2);
        assert_eq!(summary.by_relevance["low"], 2);
        assert_eq!(summary.by_relevance.get("medium"), None);
    }
}
