//! Predicate Gap Analysis Engine
//!
//! Builds a citation graph over clearance records, assesses each candidate
//! predicate's health, resolves a comparison template for the subject, and
//! produces scored, categorized gap reports against the chosen precedents.
//!
//! ## Features
//!
//! - **Citation Lineage**: Chain depth with deterministic cycle breaking,
//!   hub ranking by reverse citations
//! - **Predicate Health**: ACCEPTABLE / REVIEW_REQUIRED / NOT_RECOMMENDED
//!   classification; recalled or withdrawn records are never acceptable
//! - **Template Resolution**: Five-tier selection from exact classification
//!   code down to a guaranteed generic fallback, with conditional dimensions
//! - **Gap Detection**: Textual, quantitative, standards-set, feature-set,
//!   and novel-claim rule families
//! - **Severity Scoring**: Bounded additive model with exact category
//!   boundaries and a canonical report ordering
//!
//! ## Architecture
//!
//! ```text
//! records --> CitationGraph --> LineageReport (health, hubs, cycles)
//!     \                              |
//!      \--> TemplateSelector --> GapDetector --> SeverityScorer
//!                                                     |
//!                                            AnalysisReport (JSON)
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod gaps;
pub mod graph;
pub mod record;
pub mod report;
pub mod template;
pub mod text;

pub use config::AnalysisConfig;
pub use engine::AnalysisEngine;
pub use error::{AnalysisError, Result};
pub use gaps::{GapRecord, GapType, SeverityCategory};
pub use graph::health::{HealthClassification, PredicateHealthAssessment};
pub use graph::lineage::LineageReport;
pub use graph::CitationGraph;
pub use record::{AttributeValue, CitationEdge, PathwayType, Record, RecordSet, RecordStatus};
pub use report::AnalysisReport;
pub use template::{ComparisonTemplate, ResolvedTemplate, TemplateCatalog, TemplateSelector};
