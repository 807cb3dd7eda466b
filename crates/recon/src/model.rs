use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ---------------------------------------------------------------------------
// Label metadata
// ---------------------------------------------------------------------------

/// Who produced a label. Ordered by precedence: `Machine < Human`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum Producer {
    Machine,
    Human,
}

impl Producer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Machine => "machine",
            Self::Human => "human",
        }
    }
}

impl fmt::Display for Producer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Producer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "machine" => Ok(Self::Machine),
            "human" => Ok(Self::Human),
            other => Err(format!("produced_by must be 'human' or 'machine', got '{other}'")),
        }
    }
}

impl TryFrom<String> for Producer {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Coarse rating of how well a label fits an icon. Ordered `Low < Medium < High`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum Relevance {
    #[default]
    Low,
    Medium,
    High,
}

impl Relevance {
    pub const ALL: [Relevance; 3] = [Self::Low, Self::Medium, Self::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Relevance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Relevance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("relevance must be high, medium or low, got '{other}'")),
        }
    }
}

impl TryFrom<String> for Relevance {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Parse the `verified` column. Accepts the spellings spreadsheets tend to emit.
pub fn parse_verified(s: &str) -> Result<bool, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Ok(true),
        "false" | "no" | "n" | "0" => Ok(false),
        other => Err(format!("verified must be true or false, got '{other}'")),
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Identity of a label within a store. Ordering is the export ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LabelKey {
    pub icon_id: String,
    pub label_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LabelRecord {
    pub icon_id: String,
    pub label_text: String,
    pub produced_by: Producer,
    pub verified: bool,
    pub relevance: Relevance,
}

impl LabelRecord {
    pub fn new(
        icon_id: impl Into<String>,
        label_text: impl Into<String>,
        produced_by: Producer,
        verified: bool,
        relevance: Relevance,
    ) -> Self {
        Self {
            icon_id: icon_id.into(),
            label_text: label_text.into(),
            produced_by,
            verified,
            relevance,
        }
    }

    /// Trim `icon_id` and `label_text`. Store keys are always trimmed.
    pub fn normalize(&mut self) {
        trim_in_place(&mut self.icon_id);
        trim_in_place(&mut self.label_text);
    }

    pub fn key(&self) -> LabelKey {
        LabelKey {
            icon_id: self.icon_id.clone(),
            label_text: self.label_text.clone(),
        }
    }
}

fn trim_in_place(s: &mut String) {
    let trimmed = s.trim();
    if trimmed.len() != s.len() {
        *s = trimmed.to_string();
    }
}

// ---------------------------------------------------------------------------
// Batches
// ---------------------------------------------------------------------------

/// One run's worth of labels. Consumed by value when applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub id: String,
    pub source: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub records: Vec<LabelRecord>,
}

impl Batch {
    pub fn new(id: impl Into<String>, records: Vec<LabelRecord>) -> Self {
        Self {
            id: id.into(),
            source: None,
            created_at: None,
            records,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }

    pub fn normalize(&mut self) {
        self.records.iter_mut().for_each(LabelRecord::normalize);
    }

    /// SHA-256 over the records in order, hex encoded.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for r in &self.records {
            hasher.update(r.icon_id.as_bytes());
            hasher.update([0x1f]);
            hasher.update(r.label_text.as_bytes());
            hasher.update([0x1f]);
            hasher.update(r.produced_by.as_str().as_bytes());
            hasher.update([0x1f]);
            hasher.update(if r.verified { b"1" } else { b"0" });
            hasher.update([0x1f]);
            hasher.update(r.relevance.as_str().as_bytes());
            hasher.update([0x1e]);
        }
        format!("{:x}", hasher.finalize())
    }
}

// ---------------------------------------------------------------------------
// Reporting
// ---------------------------------------------------------------------------

/// What applying one batch did to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub batch_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    pub fingerprint: String,
    pub records: usize,
    /// New (icon_id, label_text) pairs.
    pub inserted: usize,
    /// Existing pairs whose record this batch overrode.
    pub replaced: usize,
    /// Existing pairs that outranked this batch's record.
    pub kept: usize,
    /// True when the batch had already been applied and was skipped.
    pub already_applied: bool,
}

/// A batch that was refused, with every offending record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchRejection {
    pub batch_id: String,
    pub errors: Vec<crate::error::ValidationError>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconSummary {
    pub batches_applied: usize,
    pub batches_rejected: usize,
    pub batches_skipped: usize,
    pub records_seen: usize,
    pub conflicts_resolved: usize,
    pub labels: usize,
    pub icons: usize,
    pub verified: usize,
    pub by_producer: BTreeMap<String, usize>,
    pub by_relevance: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
}
