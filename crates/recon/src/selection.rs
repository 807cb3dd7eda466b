use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{LabelRecord, Producer, Relevance};

/// Export predicate. The default selects every record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    #[serde(default)]
    pub verified_only: bool,
    #[serde(default)]
    pub min_relevance: Relevance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub produced_by: Option<Producer>,
}

impl Default for Selection {
    fn default() -> Self {
        Self::all()
    }
}

impl Selection {
    pub fn all() -> Self {
        Self {
            verified_only: false,
            min_relevance: Relevance::Low,
            produced_by: None,
        }
    }

    pub fn verified() -> Self {
        Self {
            verified_only: true,
            ..Self::all()
        }
    }

    pub fn min_relevance(mut self, relevance: Relevance) -> Self {
        self.min_relevance = relevance;
        self
    }

    pub fn produced_by(mut self, producer: Producer) -> Self {
        self.produced_by = Some(producer);
        self
    }

    pub fn matches(&self, record: &LabelRecord) -> bool {
        (!self.verified_only || record.verified)
            && record.relevance >= self.min_relevance
            && self.produced_by.map_or(true, |p| p == record.produced_by)
    }

    pub fn is_all(&self) -> bool {
        *self == Self::all()
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_all() {
            return write!(f, "all");
        }
        let mut parts = Vec::new();
        if self.verified_only {
            parts.push("verified".to_string());
        }
        if self.min_relevance > Relevance::Low {
            parts.push(format!("relevance>={}", self.min_relevance));
        }
        if let Some(p) = self.produced_by {
            parts.push(format!("produced_by={p}"));
        }
        write!(f, "{}", parts.join(", "))
    }
}
