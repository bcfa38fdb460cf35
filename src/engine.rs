//! Analysis Engine
//!
//! Orchestrates one full run: build the citation graph, run lineage analysis,
//! resolve the comparison template for the subject, detect and score gaps
//! against each named precedent, and assemble the report. The engine owns
//! only configuration; records and catalogs are passed per run.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, Result};
use crate::gaps::{GapDetector, GapRecord, InconclusiveComparison, SeverityScorer};
use crate::graph::lineage::{analyze_lineage, LineageReport};
use crate::graph::CitationGraph;
use crate::record::{RecordId, RecordSet};
use crate::report::AnalysisReport;
use crate::template::selector::resolve_template;
use crate::template::TemplateCatalog;

/// Top-level entry point for predicate analysis runs
pub struct AnalysisEngine {
    config: AnalysisConfig,
}

impl AnalysisEngine {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(AnalysisConfig::default())
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Lineage analysis only: health assessments, hub ranking, cycle findings
    pub fn analyze_lineage(
        &self,
        records: &RecordSet,
        graph: &CitationGraph,
        subject_id: &str,
        now: DateTime<Utc>,
    ) -> Result<LineageReport> {
        analyze_lineage(records, graph, subject_id, &self.config, now)
    }

    /// Full analysis anchored at the current time
    pub fn analyze(
        &self,
        records: &RecordSet,
        subject_id: &str,
        precedent_ids: &[RecordId],
        catalog: &TemplateCatalog,
    ) -> Result<AnalysisReport> {
        self.analyze_at(records, subject_id, precedent_ids, catalog, Utc::now())
    }

    /// Full analysis anchored at `now`, for reproducible runs
    pub fn analyze_at(
        &self,
        records: &RecordSet,
        subject_id: &str,
        precedent_ids: &[RecordId],
        catalog: &TemplateCatalog,
        now: DateTime<Utc>,
    ) -> Result<AnalysisReport> {
        let subject = records
            .get(subject_id)
            .ok_or_else(|| AnalysisError::SubjectNotFound {
                id: subject_id.to_string(),
            })?;

        let graph = CitationGraph::from_records(records);
        let lineage = analyze_lineage(records, &graph, subject_id, &self.config, now)?;

        let template = resolve_template(catalog, &self.config, subject)?;
        info!(
            subject = %subject.id,
            template = %template.base_name,
            tier = ?template.tier,
            precedents = precedent_ids.len(),
            "analysis started"
        );

        let detector = GapDetector::new(&self.config, records);
        let scorer = SeverityScorer::new(&self.config);

        let mut gaps: Vec<GapRecord> = Vec::new();
        let mut inconclusive: Vec<InconclusiveComparison> = Vec::new();
        for precedent_id in precedent_ids {
            let precedent =
                records
                    .get(precedent_id)
                    .ok_or_else(|| AnalysisError::UnknownRecord {
                        id: precedent_id.clone(),
                    })?;
            let outcome = detector.compare(subject, precedent, &template);
            let health = lineage.assessment(precedent_id);
            gaps.extend(
                outcome
                    .candidates
                    .into_iter()
                    .map(|candidate| scorer.score(candidate, health)),
            );
            inconclusive.extend(outcome.inconclusive);
        }

        let report = AnalysisReport::assemble(
            subject.id.clone(),
            &template,
            gaps,
            inconclusive,
            precedent_ids,
            Some(&lineage),
            now,
        );
        info!(
            subject = %report.subject_id,
            gaps = report.stats.total_gaps,
            major = report.stats.major,
            "analysis complete"
        );
        Ok(report)
    }
}
