//! Report Assembly
//!
//! Collects scored gaps, inconclusive markers, and the lineage findings for
//! the precedents involved into one deterministic report. Gap ordering is
//! total: severity category first (MAJOR, MODERATE, MINOR), then score
//! descending, then dimension name ascending, then precedent id ascending.
//! Identical inputs always serialize to identical JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::gaps::{GapRecord, InconclusiveComparison, SeverityCategory};
use crate::graph::health::PredicateHealthAssessment;
use crate::graph::lineage::LineageReport;
use crate::record::{CitationEdge, RecordId};
use crate::template::{ResolutionTier, ResolvedTemplate};

/// Aggregate counts over the assembled report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportStats {
    pub total_gaps: usize,
    pub major: usize,
    pub moderate: usize,
    pub minor: usize,
    pub testing_required: usize,
    pub inconclusive: usize,
    pub precedents_compared: usize,
}

impl ReportStats {
    fn from_gaps(gaps: &[GapRecord], inconclusive: usize, precedents: usize) -> Self {
        let mut stats = ReportStats {
            total_gaps: gaps.len(),
            inconclusive,
            precedents_compared: precedents,
            ..Default::default()
        };
        for gap in gaps {
            match gap.severity_category {
                SeverityCategory::Major => stats.major += 1,
                SeverityCategory::Moderate => stats.moderate += 1,
                SeverityCategory::Minor => stats.minor += 1,
            }
            if gap.testing_required {
                stats.testing_required += 1;
            }
        }
        stats
    }
}

/// Complete analysis output for one subject
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub subject_id: RecordId,
    pub generated_at: DateTime<Utc>,
    /// Base template that drove the comparison, with its resolution tier
    pub template_name: String,
    pub template_tier: ResolutionTier,
    /// Scored gaps in the canonical order
    pub gaps: Vec<GapRecord>,
    /// Dimensions that could not be compared, in detection order
    pub inconclusive: Vec<InconclusiveComparison>,
    /// Health assessments for the precedents that were compared
    pub assessments: BTreeMap<RecordId, PredicateHealthAssessment>,
    /// Cycle-closing citation edges dropped during lineage analysis
    pub dropped_edges: Vec<CitationEdge>,
    /// Citations excluded at graph build for unknown identifiers
    pub unresolved_citations: usize,
    pub stats: ReportStats,
}

impl AnalysisReport {
    /// Assemble a report from analysis outputs. Gaps are sorted into the
    /// canonical order here; callers pass them in any order.
    pub fn assemble(
        subject_id: RecordId,
        template: &ResolvedTemplate,
        mut gaps: Vec<GapRecord>,
        inconclusive: Vec<InconclusiveComparison>,
        precedent_ids: &[RecordId],
        lineage: Option<&LineageReport>,
        generated_at: DateTime<Utc>,
    ) -> Self {
        sort_gaps(&mut gaps);

        let assessments: BTreeMap<RecordId, PredicateHealthAssessment> = lineage
            .map(|l| {
                precedent_ids
                    .iter()
                    .filter_map(|id| l.assessment(id).map(|a| (id.clone(), a.clone())))
                    .collect()
            })
            .unwrap_or_default();

        let stats = ReportStats::from_gaps(&gaps, inconclusive.len(), precedent_ids.len());

        AnalysisReport {
            subject_id,
            generated_at,
            template_name: template.base_name.clone(),
            template_tier: template.tier,
            gaps,
            inconclusive,
            assessments,
            dropped_edges: lineage.map(|l| l.dropped_edges.clone()).unwrap_or_default(),
            unresolved_citations: lineage.map(|l| l.unresolved_citations).unwrap_or(0),
            stats,
        }
    }

    /// Gaps in a given severity category, preserving report order
    pub fn gaps_in(&self, category: SeverityCategory) -> impl Iterator<Item = &GapRecord> {
        self.gaps
            .iter()
            .filter(move |g| g.severity_category == category)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Canonical gap order: category, score descending, dimension, precedent id
fn sort_gaps(gaps: &mut [GapRecord]) {
    gaps.sort_by(|a, b| {
        a.severity_category
            .cmp(&b.severity_category)
            .then_with(|| {
                b.severity
                    .partial_cmp(&a.severity)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| a.dimension.cmp(&b.dimension))
            .then_with(|| a.precedent_id.cmp(&b.precedent_id))
    });
}
