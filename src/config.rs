//! Configuration management for the analysis engine
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (predicate.toml)
//! - Environment variables (PREDICATE_*)
//!
//! The thresholds here are working defaults taken from how reviewers apply
//! them in practice, not canonical regulatory constants; deployments tune
//! them per program. The config object is immutable once loaded and threaded
//! explicitly through the engine, never read from global state.
//!
//! ## Example config file (predicate.toml):
//! ```toml
//! [lineage]
//! intended_use_overlap_threshold = 0.5
//! deep_chain_threshold = 3
//! max_predicate_age_years = 10
//!
//! [comparison]
//! textual_similarity_threshold = 0.7
//! quantitative_tolerance = 0.10
//! claim_saturation_count = 3
//!
//! [families]
//! orthopedic-fixation = ["HRS", "HWC", "KTT"]
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Main configuration for the analysis engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Lineage / predicate-health settings
    #[serde(default)]
    pub lineage: LineageConfig,

    /// Dimension comparison settings
    #[serde(default)]
    pub comparison: ComparisonConfig,

    /// Severity scoring settings
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Device family groupings: family name -> classification codes
    #[serde(default)]
    pub families: FamilyConfig,
}

/// Lineage analysis and health classification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineageConfig {
    /// Minimum intended-use textual overlap with the subject for a predicate
    /// to be considered aligned (0.0 - 1.0)
    #[serde(default = "default_overlap_threshold")]
    pub intended_use_overlap_threshold: f64,

    /// Chain depth above which a predicate carries the deep_chain flag
    #[serde(default = "default_deep_chain")]
    pub deep_chain_threshold: usize,

    /// Age in years above which a predicate carries the aged flag
    #[serde(default = "default_max_age")]
    pub max_predicate_age_years: i64,

    /// Classification codes accepted across code boundaries:
    /// subject code -> acceptable predicate codes
    #[serde(default)]
    pub cross_code_allowlist: HashMap<String, Vec<String>>,
}

/// Dimension comparison configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonConfig {
    /// Token-overlap similarity at or above which two texts compare
    /// equivalent (0.0 - 1.0)
    #[serde(default = "default_similarity_threshold")]
    pub textual_similarity_threshold: f64,

    /// Relative numeric difference tolerated before a quantitative gap fires
    #[serde(default = "default_tolerance")]
    pub quantitative_tolerance: f64,

    /// Number of prior records asserting a claim at which the claim counts
    /// as fully precedented (precedent strength 1.0)
    #[serde(default = "default_saturation")]
    pub claim_saturation_count: usize,
}

/// Severity scoring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Severity offset when the cited predicate's health is REVIEW_REQUIRED
    #[serde(default = "default_review_offset")]
    pub review_required_offset: f64,

    /// Severity offset when the cited predicate's health is NOT_RECOMMENDED
    #[serde(default = "default_not_recommended_offset")]
    pub not_recommended_offset: f64,

    /// Severity offset when the cited predicate carries the aged flag
    #[serde(default = "default_aged_adjustment")]
    pub aged_precedent_adjustment: f64,
}

/// Device family groupings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FamilyConfig {
    /// Map of family name to member classification codes
    #[serde(flatten)]
    pub groups: HashMap<String, Vec<String>>,
}

impl FamilyConfig {
    /// Find the family a classification code belongs to, if any.
    /// Ties (a code listed in several families) resolve to the family whose
    /// name sorts first, keeping template resolution deterministic.
    pub fn family_of(&self, code: &str) -> Option<&str> {
        let mut matches: Vec<&str> = self
            .groups
            .iter()
            .filter(|(_, codes)| codes.iter().any(|c| c == code))
            .map(|(name, _)| name.as_str())
            .collect();
        matches.sort_unstable();
        matches.first().copied()
    }
}

// Default value functions
fn default_overlap_threshold() -> f64 {
    0.5
}

fn default_deep_chain() -> usize {
    3
}

fn default_max_age() -> i64 {
    10
}

fn default_similarity_threshold() -> f64 {
    0.7
}

fn default_tolerance() -> f64 {
    0.10
}

fn default_saturation() -> usize {
    3
}

fn default_review_offset() -> f64 {
    10.0
}

fn default_not_recommended_offset() -> f64 {
    20.0
}

fn default_aged_adjustment() -> f64 {
    5.0
}

impl Default for LineageConfig {
    fn default() -> Self {
        Self {
            intended_use_overlap_threshold: default_overlap_threshold(),
            deep_chain_threshold: default_deep_chain(),
            max_predicate_age_years: default_max_age(),
            cross_code_allowlist: HashMap::new(),
        }
    }
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            textual_similarity_threshold: default_similarity_threshold(),
            quantitative_tolerance: default_tolerance(),
            claim_saturation_count: default_saturation(),
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            review_required_offset: default_review_offset(),
            not_recommended_offset: default_not_recommended_offset(),
            aged_precedent_adjustment: default_aged_adjustment(),
        }
    }
}

impl AnalysisConfig {
    /// Whether `predicate_code` is acceptable for a subject under
    /// `subject_code`, either by exact match or by allowlist
    pub fn code_acceptable(&self, subject_code: &str, predicate_code: &str) -> bool {
        if subject_code == predicate_code {
            return true;
        }
        self.lineage
            .cross_code_allowlist
            .get(subject_code)
            .map(|codes| codes.iter().any(|c| c == predicate_code))
            .unwrap_or(false)
    }

    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration from a specific file
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["predicate.toml", ".predicate.toml", "config/predicate.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Load from environment variables (PREDICATE_*)
        builder = builder.add_source(
            Environment::with_prefix("PREDICATE")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AnalysisConfig::default();
        assert_eq!(config.comparison.quantitative_tolerance, 0.10);
        assert_eq!(config.lineage.deep_chain_threshold, 3);
        assert_eq!(config.comparison.claim_saturation_count, 3);
    }

    #[test]
    fn test_code_acceptable_exact_and_allowlisted() {
        let mut config = AnalysisConfig::default();
        assert!(config.code_acceptable("HRS", "HRS"));
        assert!(!config.code_acceptable("HRS", "HWC"));

        config
            .lineage
            .cross_code_allowlist
            .insert("HRS".to_string(), vec!["HWC".to_string()]);
        assert!(config.code_acceptable("HRS", "HWC"));
        assert!(!config.code_acceptable("HWC", "HRS"));
    }

    #[test]
    fn test_family_lookup_deterministic() {
        let mut families = FamilyConfig::default();
        families
            .groups
            .insert("beta".to_string(), vec!["XYZ".to_string()]);
        families
            .groups
            .insert("alpha".to_string(), vec!["XYZ".to_string()]);
        // Code in two families resolves to the first name in sort order
        assert_eq!(families.family_of("XYZ"), Some("alpha"));
        assert_eq!(families.family_of("ABC"), None);
    }

    #[test]
    fn test_config_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("predicate.toml");

        let mut config = AnalysisConfig::default();
        config.comparison.quantitative_tolerance = 0.25;
        config.save(path.to_str().unwrap()).unwrap();

        let loaded = AnalysisConfig::load_from(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(loaded.comparison.quantitative_tolerance, 0.25);
    }
}
