//! Gap Detection
//!
//! Compares subject and precedent values for every dimension in the resolved
//! template, dispatching on the rule family. Emits gap candidates (scored
//! later) and inconclusive markers for dimensions that could not be compared.
//! No candidate is emitted when the values compare equivalent under the
//! dimension's rule.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::GapType;
use crate::config::AnalysisConfig;
use crate::record::{AttributeValue, Record, RecordId, RecordSet};
use crate::template::{ComparisonRule, Dimension, DimensionCategory, ResolvedTemplate};
use crate::text::{token_differences, token_similarity};

/// An unscored gap produced by the detector
#[derive(Debug, Clone, PartialEq)]
pub struct GapCandidate {
    pub dimension: String,
    pub category: DimensionCategory,
    pub subject_value: String,
    pub precedent_id: RecordId,
    pub precedent_value: String,
    pub gap_type: GapType,
    /// How precedented the claim is across the whole graph, 0.0 - 1.0.
    /// Only NOVEL_CLAIM detection raises this above zero.
    pub precedent_strength: f64,
    pub rationale: String,
}

/// Why a dimension could not be compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InconclusiveReason {
    MissingSubjectValue,
    MissingPrecedentValue,
    TypeMismatch,
}

/// A dimension whose comparison was marked inconclusive rather than dropped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InconclusiveComparison {
    pub dimension: String,
    pub precedent_id: RecordId,
    pub reason: InconclusiveReason,
}

/// Result of comparing one subject against one precedent
#[derive(Debug, Clone, Default)]
pub struct DetectionOutcome {
    pub candidates: Vec<GapCandidate>,
    pub inconclusive: Vec<InconclusiveComparison>,
}

/// Dimension-wise comparison of subject vs precedent records
pub struct GapDetector<'a> {
    config: &'a AnalysisConfig,
    /// Full record set; NOVEL_CLAIM searches the whole graph, not just the
    /// precedent being compared
    records: &'a RecordSet,
}

impl<'a> GapDetector<'a> {
    pub fn new(config: &'a AnalysisConfig, records: &'a RecordSet) -> Self {
        Self { config, records }
    }

    /// Compare every dimension of the resolved template
    pub fn compare(
        &self,
        subject: &Record,
        precedent: &Record,
        template: &ResolvedTemplate,
    ) -> DetectionOutcome {
        let mut outcome = DetectionOutcome::default();
        for dimension in &template.dimensions {
            self.compare_dimension(subject, precedent, dimension, &mut outcome);
        }
        debug!(
            subject = %subject.id,
            precedent = %precedent.id,
            candidates = outcome.candidates.len(),
            inconclusive = outcome.inconclusive.len(),
            "dimension comparison complete"
        );
        outcome
    }

    fn compare_dimension(
        &self,
        subject: &Record,
        precedent: &Record,
        dimension: &Dimension,
        outcome: &mut DetectionOutcome,
    ) {
        match &dimension.rule {
            ComparisonRule::Textual {
                similarity_threshold,
            } => {
                let threshold = similarity_threshold
                    .unwrap_or(self.config.comparison.textual_similarity_threshold);
                self.compare_textual(subject, precedent, dimension, threshold, outcome);
            }
            ComparisonRule::Quantitative { tolerance } => {
                let tolerance =
                    tolerance.unwrap_or(self.config.comparison.quantitative_tolerance);
                self.compare_quantitative(subject, precedent, dimension, tolerance, outcome);
            }
            ComparisonRule::StandardsSet { required_standards } => {
                self.compare_standards(subject, precedent, dimension, required_standards, outcome);
            }
            ComparisonRule::FeatureSet => {
                self.compare_features(subject, precedent, dimension, outcome);
            }
            ComparisonRule::NovelClaim { saturation_count } => {
                let saturation =
                    saturation_count.unwrap_or(self.config.comparison.claim_saturation_count);
                self.compare_novel_claim(subject, precedent, dimension, saturation, outcome);
            }
        }
    }

    fn compare_textual(
        &self,
        subject: &Record,
        precedent: &Record,
        dimension: &Dimension,
        threshold: f64,
        outcome: &mut DetectionOutcome,
    ) {
        let Some((subject_text, precedent_text)) = both_texts(
            subject,
            precedent,
            dimension,
            &precedent.id,
            outcome,
        ) else {
            return;
        };

        let similarity = token_similarity(subject_text, precedent_text);
        if similarity >= threshold {
            return; // equivalent under the rule: no gap
        }

        let (subject_only, precedent_only) = token_differences(subject_text, precedent_text);
        let gap_type = if subject_only.len() >= precedent_only.len() {
            if dimension.category == DimensionCategory::IntendedUse {
                GapType::NewIndication
            } else {
                GapType::NewClaim
            }
        } else {
            GapType::RemovedClaim
        };

        outcome.candidates.push(GapCandidate {
            dimension: dimension.name.clone(),
            category: dimension.category,
            subject_value: subject_text.to_string(),
            precedent_id: precedent.id.clone(),
            precedent_value: precedent_text.to_string(),
            gap_type,
            precedent_strength: 0.0,
            rationale: format!(
                "token overlap {:.2} below threshold {:.2}; subject-only terms: [{}]",
                similarity,
                threshold,
                subject_only.into_iter().collect::<Vec<_>>().join(", ")
            ),
        });
    }

    fn compare_quantitative(
        &self,
        subject: &Record,
        precedent: &Record,
        dimension: &Dimension,
        tolerance: f64,
        outcome: &mut DetectionOutcome,
    ) {
        let subject_value = match required_value(subject, dimension, true, &precedent.id, outcome) {
            Some(v) => v,
            None => return,
        };
        let precedent_value =
            match required_value(precedent, dimension, false, &precedent.id, outcome) {
                Some(v) => v,
                None => return,
            };
        let (Some(s), Some(p)) = (subject_value.as_number(), precedent_value.as_number()) else {
            outcome.inconclusive.push(InconclusiveComparison {
                dimension: dimension.name.clone(),
                precedent_id: precedent.id.clone(),
                reason: InconclusiveReason::TypeMismatch,
            });
            return;
        };

        // Relative difference against the precedent; a zero precedent with a
        // nonzero subject always exceeds any finite tolerance.
        let exceeds = if p == 0.0 {
            s != 0.0
        } else {
            ((s - p) / p).abs() > tolerance
        };
        if !exceeds {
            return;
        }

        let gap_type = if s > p {
            GapType::LargerThanPredicate
        } else {
            GapType::SmallerThanPredicate
        };
        let relative = if p == 0.0 {
            f64::INFINITY
        } else {
            ((s - p) / p).abs()
        };

        outcome.candidates.push(GapCandidate {
            dimension: dimension.name.clone(),
            category: dimension.category,
            subject_value: s.to_string(),
            precedent_id: precedent.id.clone(),
            precedent_value: p.to_string(),
            gap_type,
            precedent_strength: 0.0,
            rationale: format!(
                "relative difference {:.2} exceeds tolerance {:.2}",
                relative, tolerance
            ),
        });
    }

    // Requirements come from the dimension metadata, not the subject's own
    // standards set; only the precedent side is inspected.
    fn compare_standards(
        &self,
        _subject: &Record,
        precedent: &Record,
        dimension: &Dimension,
        required: &std::collections::BTreeSet<String>,
        outcome: &mut DetectionOutcome,
    ) {
        let precedent_value =
            match required_value(precedent, dimension, false, &precedent.id, outcome) {
                Some(v) => v,
                None => return,
            };
        let Some(demonstrated) = precedent_value.as_standards() else {
            outcome.inconclusive.push(InconclusiveComparison {
                dimension: dimension.name.clone(),
                precedent_id: precedent.id.clone(),
                reason: InconclusiveReason::TypeMismatch,
            });
            return;
        };

        // One gap per standard the precedent has not demonstrated.
        for standard in required.difference(demonstrated) {
            outcome.candidates.push(GapCandidate {
                dimension: dimension.name.clone(),
                category: dimension.category,
                subject_value: standard.clone(),
                precedent_id: precedent.id.clone(),
                precedent_value: precedent_value.render(),
                gap_type: GapType::MissingStandard,
                precedent_strength: 0.0,
                rationale: format!(
                    "required standard {} not in precedent's demonstrated set",
                    standard
                ),
            });
        }
    }

    fn compare_features(
        &self,
        subject: &Record,
        precedent: &Record,
        dimension: &Dimension,
        outcome: &mut DetectionOutcome,
    ) {
        let subject_value = match required_value(subject, dimension, true, &precedent.id, outcome) {
            Some(v) => v,
            None => return,
        };
        let precedent_value =
            match required_value(precedent, dimension, false, &precedent.id, outcome) {
                Some(v) => v,
                None => return,
            };
        let (Some(subject_set), Some(precedent_set)) =
            (subject_value.as_features(), precedent_value.as_features())
        else {
            outcome.inconclusive.push(InconclusiveComparison {
                dimension: dimension.name.clone(),
                precedent_id: precedent.id.clone(),
                reason: InconclusiveReason::TypeMismatch,
            });
            return;
        };

        for feature in subject_set.difference(precedent_set) {
            outcome.candidates.push(GapCandidate {
                dimension: dimension.name.clone(),
                category: dimension.category,
                subject_value: feature.clone(),
                precedent_id: precedent.id.clone(),
                precedent_value: precedent_value.render(),
                gap_type: GapType::NewFeature,
                precedent_strength: 0.0,
                rationale: format!("feature {} absent from precedent", feature),
            });
        }
        for feature in precedent_set.difference(subject_set) {
            outcome.candidates.push(GapCandidate {
                dimension: dimension.name.clone(),
                category: dimension.category,
                subject_value: subject_value.render(),
                precedent_id: precedent.id.clone(),
                precedent_value: feature.clone(),
                gap_type: GapType::MissingFeature,
                precedent_strength: 0.0,
                rationale: format!("precedent feature {} absent from subject", feature),
            });
        }
    }

    fn compare_novel_claim(
        &self,
        subject: &Record,
        precedent: &Record,
        dimension: &Dimension,
        saturation: usize,
        outcome: &mut DetectionOutcome,
    ) {
        // No claim asserted means nothing to compare; not inconclusive.
        let Some(claim) = subject
            .attribute(&dimension.name)
            .and_then(AttributeValue::as_text)
        else {
            return;
        };

        let threshold = self.config.comparison.textual_similarity_threshold;

        // The compared precedent asserting an equivalent claim suppresses the
        // gap outright.
        let precedent_claim = precedent
            .attribute(&dimension.name)
            .and_then(AttributeValue::as_text);
        if let Some(text) = precedent_claim {
            if token_similarity(claim, text) >= threshold {
                return;
            }
        }

        // Precedent strength comes from the whole graph: any record other
        // than the subject asserting an equivalent claim counts.
        let prior_count = self
            .records
            .iter()
            .filter(|r| r.id != subject.id)
            .filter_map(|r| r.attribute(&dimension.name).and_then(AttributeValue::as_text))
            .filter(|text| token_similarity(claim, text) >= threshold)
            .count();
        let strength = if saturation == 0 {
            1.0
        } else {
            (prior_count as f64 / saturation as f64).min(1.0)
        };

        outcome.candidates.push(GapCandidate {
            dimension: dimension.name.clone(),
            category: dimension.category,
            subject_value: claim.to_string(),
            precedent_id: precedent.id.clone(),
            precedent_value: precedent_claim.unwrap_or("(no equivalent claim)").to_string(),
            gap_type: GapType::NovelClaim,
            precedent_strength: strength,
            rationale: format!(
                "{} prior record(s) assert an equivalent claim (strength {:.2})",
                prior_count, strength
            ),
        });
    }
}

/// Fetch a required attribute, recording an inconclusive marker when absent
fn required_value<'r>(
    record: &'r Record,
    dimension: &Dimension,
    is_subject: bool,
    precedent_id: &RecordId,
    outcome: &mut DetectionOutcome,
) -> Option<&'r AttributeValue> {
    match record.attribute(&dimension.name) {
        Some(v) => Some(v),
        None => {
            outcome.inconclusive.push(InconclusiveComparison {
                dimension: dimension.name.clone(),
                precedent_id: precedent_id.clone(),
                reason: if is_subject {
                    InconclusiveReason::MissingSubjectValue
                } else {
                    InconclusiveReason::MissingPrecedentValue
                },
            });
            None
        }
    }
}

/// Fetch text values from both sides, handling absence and type mismatch
fn both_texts<'r>(
    subject: &'r Record,
    precedent: &'r Record,
    dimension: &Dimension,
    precedent_id: &RecordId,
    outcome: &mut DetectionOutcome,
) -> Option<(&'r str, &'r str)> {
    let subject_value = required_value(subject, dimension, true, precedent_id, outcome)?;
    let precedent_value = required_value(precedent, dimension, false, precedent_id, outcome)?;
    match (subject_value.as_text(), precedent_value.as_text()) {
        (Some(s), Some(p)) => Some((s, p)),
        _ => {
            outcome.inconclusive.push(InconclusiveComparison {
                dimension: dimension.name.clone(),
                precedent_id: precedent_id.clone(),
                reason: InconclusiveReason::TypeMismatch,
            });
            None
        }
    }
}
