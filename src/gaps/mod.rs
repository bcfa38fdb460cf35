//! Gap Records
//!
//! A `GapRecord` is one detected, categorized difference between the subject
//! and one precedent along one comparison dimension. Created by the detector,
//! scored by the scorer, and only mutated by downstream tracking
//! (status/owner/evidence) after that; re-analysis never touches existing
//! records.

pub mod detector;
pub mod scoring;

pub use detector::{
    DetectionOutcome, GapCandidate, GapDetector, InconclusiveComparison, InconclusiveReason,
};
pub use scoring::SeverityScorer;

use serde::{Deserialize, Serialize};

use crate::record::RecordId;
use crate::template::DimensionCategory;

/// Kind of difference a gap represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GapType {
    /// Subject text asserts content the precedent lacks
    NewClaim,
    /// Precedent text asserts content the subject dropped
    RemovedClaim,
    /// New claim on an intended-use dimension: a new clinical indication
    NewIndication,
    /// Quantitative value exceeds tolerance above the precedent
    LargerThanPredicate,
    /// Quantitative value exceeds tolerance below the precedent
    SmallerThanPredicate,
    /// A required standard the precedent has not demonstrated
    MissingStandard,
    /// Feature present on the subject only
    NewFeature,
    /// Feature present on the precedent only
    MissingFeature,
    /// Claim with little or no precedent anywhere in the graph
    NovelClaim,
}

/// Severity category with exact boundaries:
/// MAJOR >= 71, MODERATE 31-70, MINOR <= 30
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeverityCategory {
    Major,
    Moderate,
    Minor,
}

impl SeverityCategory {
    pub fn from_score(score: f64) -> Self {
        if score >= 71.0 {
            SeverityCategory::Major
        } else if score > 30.0 {
            SeverityCategory::Moderate
        } else {
            SeverityCategory::Minor
        }
    }
}

/// Tracking status; Open at creation, advanced only by downstream tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GapStatus {
    Open,
    InProgress,
    Resolved,
}

/// Coarse remediation effort estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemediationEffort {
    Low,
    Medium,
    High,
}

/// One scored gap between subject and precedent on one dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapRecord {
    pub dimension: String,
    pub category: DimensionCategory,
    /// Subject-side value rendering
    pub subject_value: String,
    pub precedent_id: RecordId,
    /// Precedent-side value rendering
    pub precedent_value: String,
    pub gap_type: GapType,
    /// 0-100
    pub severity: f64,
    pub severity_category: SeverityCategory,
    pub testing_required: bool,
    pub remediation_effort: RemediationEffort,
    /// Cited precedent's health was REVIEW_REQUIRED or NOT_RECOMMENDED
    pub precedent_risk: bool,
    pub status: GapStatus,
    pub rationale: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_boundaries_exact() {
        assert_eq!(SeverityCategory::from_score(71.0), SeverityCategory::Major);
        assert_eq!(SeverityCategory::from_score(70.9), SeverityCategory::Moderate);
        assert_eq!(SeverityCategory::from_score(31.0), SeverityCategory::Moderate);
        assert_eq!(SeverityCategory::from_score(30.0), SeverityCategory::Minor);
        assert_eq!(SeverityCategory::from_score(0.0), SeverityCategory::Minor);
        assert_eq!(SeverityCategory::from_score(100.0), SeverityCategory::Major);
    }

    #[test]
    fn test_category_sort_order() {
        // Major sorts before Moderate sorts before Minor
        assert!(SeverityCategory::Major < SeverityCategory::Moderate);
        assert!(SeverityCategory::Moderate < SeverityCategory::Minor);
    }
}
