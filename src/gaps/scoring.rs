//! Severity Scoring
//!
//! Turns detector candidates into scored `GapRecord`s. The score is a
//! bounded additive model:
//!
//!   clamp(0, 100, base + testing_burden + precedent_adjustment
//!                 - 30 * strength + 10 * (1 - strength) + risk_offset)
//!
//! where `strength` is the candidate's precedent strength (nonzero only for
//! novel claims) and `risk_offset` penalizes gaps whose cited precedent
//! classified REVIEW_REQUIRED or NOT_RECOMMENDED.

use tracing::debug;

use super::detector::GapCandidate;
use super::{GapRecord, GapStatus, GapType, RemediationEffort, SeverityCategory};
use crate::config::AnalysisConfig;
use crate::graph::health::{HealthClassification, PredicateHealthAssessment};
use crate::template::DimensionCategory;

/// Scores gap candidates into final gap records
pub struct SeverityScorer<'a> {
    config: &'a AnalysisConfig,
}

impl<'a> SeverityScorer<'a> {
    pub fn new(config: &'a AnalysisConfig) -> Self {
        Self { config }
    }

    /// Score one candidate. `health` is the cited precedent's assessment,
    /// absent when lineage analysis was not run.
    pub fn score(
        &self,
        candidate: GapCandidate,
        health: Option<&PredicateHealthAssessment>,
    ) -> GapRecord {
        let base = base_score(candidate.gap_type);
        let burden = testing_burden(candidate.gap_type, candidate.category);
        let strength = candidate.precedent_strength.clamp(0.0, 1.0);

        let aged = health.map(|h| h.aged).unwrap_or(false);
        let precedent_adjustment = if aged {
            self.config.scoring.aged_precedent_adjustment
        } else {
            0.0
        };

        let (precedent_risk, risk_offset) = match health.map(|h| h.classification) {
            Some(HealthClassification::ReviewRequired) => {
                (true, self.config.scoring.review_required_offset)
            }
            Some(HealthClassification::NotRecommended) => {
                (true, self.config.scoring.not_recommended_offset)
            }
            _ => (false, 0.0),
        };

        let raw = base + burden + precedent_adjustment - 30.0 * strength
            + 10.0 * (1.0 - strength)
            + risk_offset;
        let severity = raw.clamp(0.0, 100.0);
        let severity_category = SeverityCategory::from_score(severity);
        let testing_required = testing_required(candidate.gap_type, candidate.category);
        let remediation_effort =
            remediation_effort(severity_category, testing_required);

        debug!(
            dimension = %candidate.dimension,
            gap_type = ?candidate.gap_type,
            severity,
            category = ?severity_category,
            "gap scored"
        );

        GapRecord {
            dimension: candidate.dimension,
            category: candidate.category,
            subject_value: candidate.subject_value,
            precedent_id: candidate.precedent_id,
            precedent_value: candidate.precedent_value,
            gap_type: candidate.gap_type,
            severity,
            severity_category,
            testing_required,
            remediation_effort,
            precedent_risk,
            status: GapStatus::Open,
            rationale: candidate.rationale,
        }
    }
}

/// Base severity by gap type
fn base_score(gap_type: GapType) -> f64 {
    match gap_type {
        GapType::NewIndication => 55.0,
        GapType::NovelClaim => 55.0,
        GapType::MissingStandard => 45.0,
        GapType::NewClaim => 40.0,
        GapType::NewFeature => 30.0,
        GapType::RemovedClaim => 20.0,
        GapType::MissingFeature => 15.0,
        GapType::LargerThanPredicate | GapType::SmallerThanPredicate => 15.0,
    }
}

/// Additional weight for gaps that imply new verification or clinical work
fn testing_burden(gap_type: GapType, category: DimensionCategory) -> f64 {
    match gap_type {
        GapType::NewIndication | GapType::MissingStandard => 20.0,
        GapType::NovelClaim => 15.0,
        GapType::NewFeature => match category {
            DimensionCategory::Safety | DimensionCategory::Performance => 10.0,
            _ => 5.0,
        },
        _ => 0.0,
    }
}

fn testing_required(gap_type: GapType, category: DimensionCategory) -> bool {
    match gap_type {
        GapType::NewIndication | GapType::MissingStandard | GapType::NovelClaim => true,
        GapType::NewFeature => matches!(
            category,
            DimensionCategory::Safety | DimensionCategory::Performance
        ),
        _ => false,
    }
}

fn remediation_effort(category: SeverityCategory, testing_required: bool) -> RemediationEffort {
    match (category, testing_required) {
        (SeverityCategory::Major, true) => RemediationEffort::High,
        (SeverityCategory::Major, false) => RemediationEffort::Medium,
        (_, true) => RemediationEffort::Medium,
        (SeverityCategory::Moderate, false) => RemediationEffort::Medium,
        (SeverityCategory::Minor, false) => RemediationEffort::Low,
    }
}
