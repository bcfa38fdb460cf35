//! Record types and structures
//!
//! A `Record` is one precedent or subject entity, immutable once loaded.
//! Records are held in a `RecordSet` keyed by identifier; the engine never
//! mutates them after construction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::{AnalysisError, Result};

/// Unique record identifier (e.g. a clearance number)
pub type RecordId = String;

/// Regulatory pathway under which a record was cleared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathwayType {
    /// Standard premarket notification with predicate comparison
    Standard,
    /// Cleared without a predicate requirement
    NoPrecedentRequired,
    /// Full high-risk approval; not comparable via predicates
    HighRiskApproval,
}

impl PathwayType {
    /// Whether records on this pathway may serve as predicates
    pub fn predicate_eligible(&self) -> bool {
        matches!(self, PathwayType::Standard | PathwayType::NoPrecedentRequired)
    }
}

/// Market status of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Active,
    Recalled,
    Withdrawn,
}

impl RecordStatus {
    /// Whether the record is legally available on the market
    pub fn legally_available(&self) -> bool {
        matches!(self, RecordStatus::Active)
    }
}

/// A typed attribute value on a record
///
/// Closed set of variants; dimension comparison rules dispatch on the rule
/// family and expect the matching variant here. A mismatched variant is
/// reported as an inconclusive comparison, never a panic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    Number(f64),
    Text(String),
    Standards(BTreeSet<String>),
    Features(BTreeSet<String>),
    Flag(bool),
}

impl AttributeValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_standards(&self) -> Option<&BTreeSet<String>> {
        match self {
            AttributeValue::Standards(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_features(&self) -> Option<&BTreeSet<String>> {
        match self {
            AttributeValue::Features(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            AttributeValue::Flag(b) => Some(*b),
            _ => None,
        }
    }

    /// Short rendering for report rationales
    pub fn render(&self) -> String {
        match self {
            AttributeValue::Number(n) => n.to_string(),
            AttributeValue::Text(s) => s.clone(),
            AttributeValue::Standards(set) | AttributeValue::Features(set) => {
                set.iter().cloned().collect::<Vec<_>>().join(", ")
            }
            AttributeValue::Flag(b) => b.to_string(),
        }
    }
}

/// One precedent or subject entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    /// Unique identifier
    pub id: RecordId,
    /// Classification code (e.g. a product code)
    pub classification_code: String,
    /// Pathway under which the record was cleared
    pub pathway: PathwayType,
    /// Current market status
    pub status: RecordStatus,
    /// Free-text intended-use statement
    pub intended_use: String,
    /// Dimension name -> typed value
    ///
    /// BTreeMap keeps attribute order deterministic, which keeps the
    /// attribute fingerprint (and thus template cache keys) stable.
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeValue>,
    /// When the record was cleared
    pub clearance_date: DateTime<Utc>,
    /// Identifiers this record cites as precedent
    #[serde(default)]
    pub cites: BTreeSet<RecordId>,
}

impl Record {
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    /// Age in whole years at `now`
    pub fn age_years(&self, now: DateTime<Utc>) -> i64 {
        (now - self.clearance_date).num_days() / 365
    }

    /// Citation edges declared by this record
    pub fn citation_edges(&self) -> impl Iterator<Item = CitationEdge> + '_ {
        self.cites.iter().map(|cited| CitationEdge {
            citing: self.id.clone(),
            cited: cited.clone(),
        })
    }
}

/// Ordered pair (citing identifier, cited identifier)
///
/// The source data may legitimately contain cycles; the lineage analyzer
/// handles them, it does not assume acyclicity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CitationEdge {
    pub citing: RecordId,
    pub cited: RecordId,
}

impl CitationEdge {
    pub fn new(citing: impl Into<RecordId>, cited: impl Into<RecordId>) -> Self {
        Self {
            citing: citing.into(),
            cited: cited.into(),
        }
    }
}

/// Immutable collection of records for one analysis run, keyed by id
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    records: HashMap<RecordId, Record>,
}

impl RecordSet {
    /// Build a record set, rejecting duplicate identifiers
    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Result<Self> {
        let mut map = HashMap::new();
        for record in records {
            let id = record.id.clone();
            if map.insert(id.clone(), record).is_some() {
                return Err(AnalysisError::DuplicateRecord { id });
            }
        }
        Ok(Self { records: map })
    }

    pub fn get(&self, id: &str) -> Option<&Record> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    /// All citation edges declared across the set
    pub fn citation_edges(&self) -> Vec<CitationEdge> {
        let mut edges: Vec<CitationEdge> = self
            .records
            .values()
            .flat_map(|r| r.citation_edges())
            .collect();
        edges.sort_by(|a, b| (&a.citing, &a.cited).cmp(&(&b.citing, &b.cited)));
        edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(id: &str) -> Record {
        Record {
            id: id.to_string(),
            classification_code: "ABC".to_string(),
            pathway: PathwayType::Standard,
            status: RecordStatus::Active,
            intended_use: "test".to_string(),
            attributes: BTreeMap::new(),
            clearance_date: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            cites: BTreeSet::new(),
        }
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let result = RecordSet::from_records([record("K001"), record("K001")]);
        assert!(matches!(
            result,
            Err(AnalysisError::DuplicateRecord { id }) if id == "K001"
        ));
    }

    #[test]
    fn test_pathway_eligibility() {
        assert!(PathwayType::Standard.predicate_eligible());
        assert!(PathwayType::NoPrecedentRequired.predicate_eligible());
        assert!(!PathwayType::HighRiskApproval.predicate_eligible());
    }

    #[test]
    fn test_recalled_not_legally_available() {
        assert!(RecordStatus::Active.legally_available());
        assert!(!RecordStatus::Recalled.legally_available());
        assert!(!RecordStatus::Withdrawn.legally_available());
    }

    #[test]
    fn test_attribute_value_accessors() {
        let v = AttributeValue::Number(42.0);
        assert_eq!(v.as_number(), Some(42.0));
        assert_eq!(v.as_text(), None);

        let v = AttributeValue::Text("hello".to_string());
        assert_eq!(v.as_text(), Some("hello"));
    }
}
