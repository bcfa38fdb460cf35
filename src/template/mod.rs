//! Comparison Templates
//!
//! A `ComparisonTemplate` is an ordered list of dimensions plus conditional
//! rules that append further dimensions based on subject attributes.
//! Templates are selected, never mutated; the catalog is loaded once per run
//! and threaded through the engine as immutable configuration.

pub mod selector;

pub use selector::{ResolutionTier, ResolvedTemplate, TemplateSelector};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::error::{AnalysisError, Result};
use crate::record::{AttributeValue, Record};

/// Comparison rule family for a dimension
///
/// Closed set dispatched by a single match in the gap detector; parameters
/// override the configured defaults where present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComparisonRule {
    /// Normalized token-overlap similarity on free text
    Textual {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        similarity_threshold: Option<f64>,
    },
    /// Relative numeric difference against a tolerance fraction
    Quantitative {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tolerance: Option<f64>,
    },
    /// Required standards (from dimension metadata) must be a subset of the
    /// precedent's demonstrated set
    StandardsSet { required_standards: BTreeSet<String> },
    /// Set difference both ways over feature sets
    FeatureSet,
    /// Claim searched across the full precedent graph for prior assertions
    NovelClaim {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        saturation_count: Option<usize>,
    },
}

/// Category a dimension belongs to; feeds testing-burden scoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionCategory {
    IntendedUse,
    Technological,
    Performance,
    Safety,
    Materials,
    Software,
    Sterilization,
}

/// One comparison dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    /// Name; also the attribute key on records
    pub name: String,
    pub category: DimensionCategory,
    pub rule: ComparisonRule,
}

/// Predicate over subject attributes guarding a conditional rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttributePredicate {
    /// A Flag attribute is present and true (e.g. "reusable")
    FlagSet { attribute: String },
    /// The attribute exists at all, whatever its type
    HasAttribute { attribute: String },
    /// A Number attribute exceeds a threshold (e.g. claimed shelf life)
    NumberAbove { attribute: String, threshold: f64 },
    /// A Text attribute contains a normalized token
    TextContains { attribute: String, token: String },
}

impl AttributePredicate {
    /// Evaluate against a subject record; absent or mismatched attributes
    /// simply fail the predicate
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            AttributePredicate::FlagSet { attribute } => record
                .attribute(attribute)
                .and_then(AttributeValue::as_flag)
                .unwrap_or(false),
            AttributePredicate::HasAttribute { attribute } => {
                record.attribute(attribute).is_some()
            }
            AttributePredicate::NumberAbove {
                attribute,
                threshold,
            } => record
                .attribute(attribute)
                .and_then(AttributeValue::as_number)
                .map(|n| n > *threshold)
                .unwrap_or(false),
            AttributePredicate::TextContains { attribute, token } => record
                .attribute(attribute)
                .and_then(AttributeValue::as_text)
                .map(|t| crate::text::normalize_tokens(t).contains(&token.to_lowercase()))
                .unwrap_or(false),
        }
    }
}

/// Conditional-dimension rule: predicate -> dimensions to append
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalRule {
    pub when: AttributePredicate,
    pub add_dimensions: Vec<Dimension>,
}

/// Ordered sequence of dimensions plus conditional rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonTemplate {
    /// Template name, for report transparency
    pub name: String,
    pub dimensions: Vec<Dimension>,
    /// Evaluated in order after base-tier selection
    #[serde(default)]
    pub conditional_rules: Vec<ConditionalRule>,
}

impl ComparisonTemplate {
    pub fn new(name: impl Into<String>, dimensions: Vec<Dimension>) -> Self {
        Self {
            name: name.into(),
            dimensions,
            conditional_rules: Vec::new(),
        }
    }

    pub fn dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.name == name)
    }
}

/// Keyword heuristic entry for resolution tier 4
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordRule {
    /// Regex matched case-insensitively against the intended-use text
    pub pattern: String,
    /// Name of the template to select on match
    pub template: String,
}

/// Template catalog for one analysis run, keyed by classification code,
/// family, pathway, and keyword heuristics, with a mandatory generic
/// fallback.
///
/// Construction requires the generic template, so tier-5 resolution can
/// never fail by construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateCatalog {
    /// Exact classification-code templates (tier 1)
    #[serde(default)]
    pub by_code: HashMap<String, ComparisonTemplate>,
    /// Device-family templates (tier 2); family membership comes from config
    #[serde(default)]
    pub by_family: HashMap<String, ComparisonTemplate>,
    /// Pathway-type templates (tier 3), keyed by serialized pathway name
    #[serde(default)]
    pub by_pathway: HashMap<String, ComparisonTemplate>,
    /// Keyword heuristics over intended-use text (tier 4), evaluated in order
    #[serde(default)]
    pub keyword_rules: Vec<KeywordRule>,
    /// Named templates referenced by keyword rules
    #[serde(default)]
    pub named: HashMap<String, ComparisonTemplate>,
    /// Generic fallback (tier 5); always present
    pub generic: ComparisonTemplate,
}

impl TemplateCatalog {
    pub fn new(generic: ComparisonTemplate) -> Self {
        Self {
            by_code: HashMap::new(),
            by_family: HashMap::new(),
            by_pathway: HashMap::new(),
            keyword_rules: Vec::new(),
            named: HashMap::new(),
            generic,
        }
    }

    pub fn with_code_template(mut self, code: impl Into<String>, t: ComparisonTemplate) -> Self {
        self.by_code.insert(code.into(), t);
        self
    }

    pub fn with_family_template(
        mut self,
        family: impl Into<String>,
        t: ComparisonTemplate,
    ) -> Self {
        self.by_family.insert(family.into(), t);
        self
    }

    pub fn with_pathway_template(
        mut self,
        pathway: impl Into<String>,
        t: ComparisonTemplate,
    ) -> Self {
        self.by_pathway.insert(pathway.into(), t);
        self
    }

    pub fn with_keyword_rule(
        mut self,
        pattern: impl Into<String>,
        template: ComparisonTemplate,
    ) -> Self {
        let name = template.name.clone();
        self.named.insert(name.clone(), template);
        self.keyword_rules.push(KeywordRule {
            pattern: pattern.into(),
            template: name,
        });
        self
    }

    /// Load a catalog from JSON produced by an external catalog source
    pub fn from_json(json: &str) -> Result<Self> {
        let catalog: TemplateCatalog = serde_json::from_str(json)?;
        if catalog.generic.dimensions.is_empty() {
            return Err(AnalysisError::MissingGenericTemplate);
        }
        Ok(catalog)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
