//! Template Selection
//!
//! Five-tier resolution, most specific first: exact classification code,
//! device family, pathway type, keyword heuristic over intended-use text,
//! generic fallback. The first matching tier wins. Resolution is a pure
//! function of (code, family membership, pathway, intended-use text,
//! attribute set); the fingerprint covers every input resolution reads, so
//! results are cacheable by (code, fingerprint).

use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use super::{ComparisonTemplate, Dimension, TemplateCatalog};
use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, Result};
use crate::fingerprint::Fingerprint;
use crate::record::Record;

/// Which tier produced a resolved template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionTier {
    ExactCode,
    DeviceFamily,
    Pathway,
    Keyword,
    Generic,
}

/// A fully resolved template: base dimensions plus conditional additions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedTemplate {
    /// Name of the base template that matched
    pub base_name: String,
    pub tier: ResolutionTier,
    /// Final ordered dimension list, conditionals appended
    pub dimensions: Vec<Dimension>,
}

impl ResolvedTemplate {
    pub fn dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.name == name)
    }
}

/// Resolves templates for subject records, caching by
/// (classification code, attribute fingerprint)
pub struct TemplateSelector<'a> {
    catalog: &'a TemplateCatalog,
    config: &'a AnalysisConfig,
    cache: HashMap<(String, Fingerprint), ResolvedTemplate>,
}

impl<'a> TemplateSelector<'a> {
    pub fn new(catalog: &'a TemplateCatalog, config: &'a AnalysisConfig) -> Self {
        Self {
            catalog,
            config,
            cache: HashMap::new(),
        }
    }

    /// Resolve the template for a subject, consulting the cache first
    pub fn resolve(&mut self, subject: &Record) -> Result<ResolvedTemplate> {
        let key = (
            subject.classification_code.clone(),
            Fingerprint::of_record(subject),
        );
        if let Some(resolved) = self.cache.get(&key) {
            return Ok(resolved.clone());
        }

        let resolved = resolve_template(self.catalog, self.config, subject)?;
        self.cache.insert(key, resolved.clone());
        Ok(resolved)
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

/// Pure resolution, no cache. Exposed for callers that manage their own
/// memoization.
pub fn resolve_template(
    catalog: &TemplateCatalog,
    config: &AnalysisConfig,
    subject: &Record,
) -> Result<ResolvedTemplate> {
    let (base, tier) = select_base(catalog, config, subject)?;
    debug!(
        subject = %subject.id,
        template = %base.name,
        tier = ?tier,
        "template resolved"
    );
    Ok(apply_conditionals(base, tier, subject))
}

fn select_base<'c>(
    catalog: &'c TemplateCatalog,
    config: &AnalysisConfig,
    subject: &Record,
) -> Result<(&'c ComparisonTemplate, ResolutionTier)> {
    // Tier 1: exact classification-code match
    if let Some(t) = catalog.by_code.get(&subject.classification_code) {
        return Ok((t, ResolutionTier::ExactCode));
    }

    // Tier 2: device-family match via configured family groups
    if let Some(family) = config.families.family_of(&subject.classification_code) {
        if let Some(t) = catalog.by_family.get(family) {
            return Ok((t, ResolutionTier::DeviceFamily));
        }
    }

    // Tier 3: pathway-type match
    let pathway_key = serde_json::to_value(subject.pathway)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    if let Some(t) = catalog.by_pathway.get(&pathway_key) {
        return Ok((t, ResolutionTier::Pathway));
    }

    // Tier 4: keyword heuristic over intended-use text, first rule wins
    for rule in &catalog.keyword_rules {
        let regex = RegexBuilder::new(&rule.pattern)
            .case_insensitive(true)
            .build()
            .map_err(|source| AnalysisError::InvalidKeywordPattern {
                pattern: rule.pattern.clone(),
                source,
            })?;
        if regex.is_match(&subject.intended_use) {
            if let Some(t) = catalog.named.get(&rule.template) {
                return Ok((t, ResolutionTier::Keyword));
            }
        }
    }

    // Tier 5: generic fallback, always present by construction
    Ok((&catalog.generic, ResolutionTier::Generic))
}

/// Evaluate conditional rules in catalog order and append their dimensions,
/// deduplicating by dimension name so the final list stays well-formed.
fn apply_conditionals(
    base: &ComparisonTemplate,
    tier: ResolutionTier,
    subject: &Record,
) -> ResolvedTemplate {
    let mut dimensions = base.dimensions.clone();

    for rule in &base.conditional_rules {
        if !rule.when.matches(subject) {
            continue;
        }
        for dim in &rule.add_dimensions {
            if dimensions.iter().all(|d| d.name != dim.name) {
                dimensions.push(dim.clone());
            }
        }
    }

    ResolvedTemplate {
        base_name: base.name.clone(),
        tier,
        dimensions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{AttributeValue, PathwayType, RecordStatus};
    use crate::template::{AttributePredicate, ComparisonRule, ConditionalRule, DimensionCategory};
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn dim(name: &str) -> Dimension {
        Dimension {
            name: name.to_string(),
            category: DimensionCategory::Technological,
            rule: ComparisonRule::Textual {
                similarity_threshold: None,
            },
        }
    }

    fn subject(code: &str, pathway: PathwayType, intended_use: &str) -> Record {
        Record {
            id: "SUBJ".to_string(),
            classification_code: code.to_string(),
            pathway,
            status: RecordStatus::Active,
            intended_use: intended_use.to_string(),
            attributes: BTreeMap::new(),
            clearance_date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            cites: Default::default(),
        }
    }

    fn catalog() -> TemplateCatalog {
        TemplateCatalog::new(ComparisonTemplate::new("generic", vec![dim("intended_use")]))
            .with_code_template("HRS", ComparisonTemplate::new("hrs", vec![dim("material")]))
            .with_family_template(
                "orthopedic-fixation",
                ComparisonTemplate::new("ortho", vec![dim("fixation_type")]),
            )
            .with_pathway_template(
                "standard",
                ComparisonTemplate::new("standard-pathway", vec![dim("design")]),
            )
            .with_keyword_rule(
                r"catheter",
                ComparisonTemplate::new("catheter", vec![dim("lumen_count")]),
            )
    }

    fn config_with_family() -> AnalysisConfig {
        let mut config = AnalysisConfig::default();
        config.families.groups.insert(
            "orthopedic-fixation".to_string(),
            vec!["HWC".to_string(), "KTT".to_string()],
        );
        config
    }

    #[test]
    fn test_tier1_exact_code() {
        let catalog = catalog();
        let config = config_with_family();
        let resolved =
            resolve_template(&catalog, &config, &subject("HRS", PathwayType::Standard, "x"))
                .unwrap();
        assert_eq!(resolved.tier, ResolutionTier::ExactCode);
        assert_eq!(resolved.base_name, "hrs");
    }

    #[test]
    fn test_tier2_family_beats_pathway_and_generic() {
        // No exact template for HWC, but it belongs to a configured family
        let catalog = catalog();
        let config = config_with_family();
        let resolved =
            resolve_template(&catalog, &config, &subject("HWC", PathwayType::Standard, "x"))
                .unwrap();
        assert_eq!(resolved.tier, ResolutionTier::DeviceFamily);
        assert_eq!(resolved.base_name, "ortho");
    }

    #[test]
    fn test_tier3_pathway() {
        let catalog = catalog();
        let config = AnalysisConfig::default(); // no families configured
        let resolved =
            resolve_template(&catalog, &config, &subject("ZZZ", PathwayType::Standard, "x"))
                .unwrap();
        assert_eq!(resolved.tier, ResolutionTier::Pathway);
    }

    #[test]
    fn test_tier4_keyword() {
        let catalog = catalog();
        let config = AnalysisConfig::default();
        let resolved = resolve_template(
            &catalog,
            &config,
            &subject(
                "ZZZ",
                PathwayType::NoPrecedentRequired,
                "Balloon CATHETER for vascular access",
            ),
        )
        .unwrap();
        assert_eq!(resolved.tier, ResolutionTier::Keyword);
        assert_eq!(resolved.base_name, "catheter");
    }

    #[test]
    fn test_tier5_generic_fallback() {
        let catalog = catalog();
        let config = AnalysisConfig::default();
        let resolved = resolve_template(
            &catalog,
            &config,
            &subject("ZZZ", PathwayType::NoPrecedentRequired, "nothing matches"),
        )
        .unwrap();
        assert_eq!(resolved.tier, ResolutionTier::Generic);
        assert_eq!(resolved.base_name, "generic");
    }

    #[test]
    fn test_conditional_dimensions_appended_deterministically() {
        let mut template = ComparisonTemplate::new("hrs", vec![dim("material")]);
        template.conditional_rules = vec![
            ConditionalRule {
                when: AttributePredicate::FlagSet {
                    attribute: "reusable".to_string(),
                },
                add_dimensions: vec![dim("reprocessing"), dim("cleaning_validation")],
            },
            ConditionalRule {
                when: AttributePredicate::NumberAbove {
                    attribute: "shelf_life_months".to_string(),
                    threshold: 24.0,
                },
                add_dimensions: vec![dim("aging_methodology")],
            },
        ];
        let catalog = TemplateCatalog::new(ComparisonTemplate::new("generic", vec![]))
            .with_code_template("HRS", template);
        let config = AnalysisConfig::default();

        let mut record = subject("HRS", PathwayType::Standard, "x");
        record
            .attributes
            .insert("reusable".to_string(), AttributeValue::Flag(true));
        record.attributes.insert(
            "shelf_life_months".to_string(),
            AttributeValue::Number(36.0),
        );

        let resolved = resolve_template(&catalog, &config, &record).unwrap();
        let names: Vec<&str> = resolved.dimensions.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "material",
                "reprocessing",
                "cleaning_validation",
                "aging_methodology"
            ]
        );
    }

    #[test]
    fn test_cache_distinguishes_keyword_tier_subjects() {
        // Same code and attributes, different intended-use text: the first
        // resolves through the keyword tier, the second must not get the
        // cached catheter template
        let catalog = catalog();
        let config = AnalysisConfig::default();
        let mut selector = TemplateSelector::new(&catalog, &config);

        let catheter = subject(
            "ZZZ",
            PathwayType::NoPrecedentRequired,
            "Balloon catheter for vascular access",
        );
        let plate = subject("ZZZ", PathwayType::NoPrecedentRequired, "bone fixation plate");

        let a = selector.resolve(&catheter).unwrap();
        let b = selector.resolve(&plate).unwrap();
        assert_eq!(a.base_name, "catheter");
        assert_eq!(a.tier, ResolutionTier::Keyword);
        assert_eq!(b.base_name, "generic");
        assert_eq!(b.tier, ResolutionTier::Generic);
        assert_eq!(selector.cache_len(), 2);
    }

    #[test]
    fn test_resolution_idempotent_and_cached() {
        let catalog = catalog();
        let config = config_with_family();
        let mut selector = TemplateSelector::new(&catalog, &config);

        let record = subject("HRS", PathwayType::Standard, "x");
        let a = selector.resolve(&record).unwrap();
        let b = selector.resolve(&record).unwrap();
        assert_eq!(a, b);
        assert_eq!(selector.cache_len(), 1);
    }
}
