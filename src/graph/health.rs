//! Predicate Health Classification
//!
//! Per-precedent fitness assessment combining compliance flags with lineage
//! position (chain depth, hub rank, cycle involvement). A recalled or
//! withdrawn record can never classify as ACCEPTABLE; that is an absolute
//! rule, not a weighted score.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::AnalysisConfig;
use crate::record::{Record, RecordId};
use crate::text::token_similarity;

/// Fitness classification of a precedent record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthClassification {
    Acceptable,
    ReviewRequired,
    NotRecommended,
}

/// Individual compliance checks behind a health classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceFlags {
    /// Status is Active
    pub legally_available: bool,
    /// Status is not Recalled
    pub not_recalled: bool,
    /// Pathway type permits use as a predicate
    pub correct_pathway: bool,
    /// Intended-use overlap with the subject met the configured threshold
    pub intended_use_overlap: bool,
    /// Classification code matches the subject's, or is allow-listed
    pub code_match: bool,
}

impl ComplianceFlags {
    pub fn all_pass(&self) -> bool {
        self.legally_available
            && self.not_recalled
            && self.correct_pathway
            && self.intended_use_overlap
            && self.code_match
    }

    /// A fatal failure rules out the predicate outright
    pub fn fatal_failure(&self) -> bool {
        !self.legally_available || !self.not_recalled || !self.correct_pathway
    }
}

/// Health assessment for one precedent record
///
/// Recomputed when the graph or record statuses change; immutable within an
/// analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredicateHealthAssessment {
    pub record_id: RecordId,
    pub flags: ComplianceFlags,
    /// Measured intended-use overlap with the subject (0.0 - 1.0)
    pub intended_use_similarity: f64,
    /// Precedent generations behind this record
    pub chain_depth: usize,
    /// 1-based rank in the hub ranking, if ranked
    pub hub_rank: Option<usize>,
    /// Record sat on a citation cycle in the source data
    pub cycle_detected: bool,
    /// Chain depth exceeded the configured threshold
    pub deep_chain: bool,
    /// Clearance older than the configured age limit
    pub aged: bool,
    pub classification: HealthClassification,
}

impl PredicateHealthAssessment {
    pub fn is_acceptable(&self) -> bool {
        self.classification == HealthClassification::Acceptable
    }
}

/// Classify one precedent against the subject.
///
/// ACCEPTABLE requires every compliance flag to pass and no condition flag
/// (deep chain, age, cycle) to be raised. Fatal compliance failures (not
/// legally available, recalled, wrong pathway) classify NOT_RECOMMENDED;
/// everything else degrades to REVIEW_REQUIRED.
pub fn classify_health(
    record: &Record,
    subject: &Record,
    config: &AnalysisConfig,
    chain_depth: usize,
    hub_rank: Option<usize>,
    cycle_detected: bool,
    now: DateTime<Utc>,
) -> PredicateHealthAssessment {
    let similarity = token_similarity(&record.intended_use, &subject.intended_use);

    let flags = ComplianceFlags {
        legally_available: record.status.legally_available(),
        not_recalled: record.status != crate::record::RecordStatus::Recalled,
        correct_pathway: record.pathway.predicate_eligible(),
        intended_use_overlap: similarity >= config.lineage.intended_use_overlap_threshold,
        code_match: config.code_acceptable(&subject.classification_code, &record.classification_code),
    };

    let deep_chain = chain_depth > config.lineage.deep_chain_threshold;
    let aged = record.age_years(now) > config.lineage.max_predicate_age_years;

    let classification = if flags.fatal_failure() {
        HealthClassification::NotRecommended
    } else if !flags.all_pass() || deep_chain || aged || cycle_detected {
        HealthClassification::ReviewRequired
    } else {
        HealthClassification::Acceptable
    };

    PredicateHealthAssessment {
        record_id: record.id.clone(),
        flags,
        intended_use_similarity: similarity,
        chain_depth,
        hub_rank,
        cycle_detected,
        deep_chain,
        aged,
        classification,
    }
}
