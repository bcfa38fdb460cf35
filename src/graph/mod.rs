//! Citation Graph
//!
//! Directed graph over precedent records using petgraph, with HashMap indexes
//! for fast id lookup. Built once per analysis run from a flat edge list and
//! treated as an immutable snapshot afterwards; lineage analysis and gap
//! detection share it read-only.
//!
//! Cycles are possible in source data despite being logically invalid; the
//! graph stores them as-is and the lineage analyzer resolves them
//! deterministically.

pub mod health;
pub mod lineage;

pub use health::{ComplianceFlags, HealthClassification, PredicateHealthAssessment};
pub use lineage::{HubEntry, LineageReport};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::record::{CitationEdge, RecordId, RecordSet};

/// The citation graph for one analysis run
pub struct CitationGraph {
    /// Primary graph structure; node weights are record ids
    pub(crate) graph: DiGraph<RecordId, ()>,

    /// Node index lookup: record id -> NodeIndex
    pub(crate) node_indices: HashMap<RecordId, NodeIndex>,

    /// Edges excluded because they referenced an unknown identifier
    unresolved_citations: usize,
}

impl CitationGraph {
    /// Build the graph from a record set and an ordered edge sequence.
    ///
    /// Every record becomes a node. Edges referencing identifiers absent from
    /// the set are excluded and counted, never fatal; the count is surfaced
    /// on the final report so reviewers see what was degraded.
    pub fn build(records: &RecordSet, edges: &[CitationEdge]) -> Self {
        let mut graph = DiGraph::new();
        let mut node_indices = HashMap::with_capacity(records.len());

        // Insert nodes in sorted id order so NodeIndex assignment does not
        // depend on RecordSet iteration order.
        let mut ids: Vec<&RecordId> = records.iter().map(|r| &r.id).collect();
        ids.sort_unstable();
        for id in ids {
            let idx = graph.add_node(id.clone());
            node_indices.insert(id.clone(), idx);
        }

        let mut unresolved = 0;
        for edge in edges {
            match (
                node_indices.get(&edge.citing),
                node_indices.get(&edge.cited),
            ) {
                (Some(&citing), Some(&cited)) => {
                    // Duplicate edges collapse; citation is a set relation.
                    if graph.find_edge(citing, cited).is_none() {
                        graph.add_edge(citing, cited, ());
                    }
                }
                _ => {
                    warn!(
                        citing = %edge.citing,
                        cited = %edge.cited,
                        "excluding citation edge with unknown identifier"
                    );
                    unresolved += 1;
                }
            }
        }

        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            unresolved,
            "citation graph built"
        );

        Self {
            graph,
            node_indices,
            unresolved_citations: unresolved,
        }
    }

    /// Build from the citation sets declared on the records themselves
    pub fn from_records(records: &RecordSet) -> Self {
        Self::build(records, &records.citation_edges())
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Count of edges excluded for referencing unknown identifiers
    pub fn unresolved_citations(&self) -> usize {
        self.unresolved_citations
    }

    pub fn contains(&self, id: &str) -> bool {
        self.node_indices.contains_key(id)
    }

    /// Records this record cites (forward traversal), sorted by id
    pub fn cites(&self, id: &str) -> Vec<&RecordId> {
        self.neighbors(id, Direction::Outgoing)
    }

    /// Records citing this record (reverse traversal), sorted by id
    pub fn cited_by(&self, id: &str) -> Vec<&RecordId> {
        self.neighbors(id, Direction::Incoming)
    }

    /// Number of records citing this record
    pub fn cited_by_count(&self, id: &str) -> usize {
        let Some(&idx) = self.node_indices.get(id) else {
            return 0;
        };
        self.graph.edges_directed(idx, Direction::Incoming).count()
    }

    fn neighbors(&self, id: &str, direction: Direction) -> Vec<&RecordId> {
        let Some(&idx) = self.node_indices.get(id) else {
            return Vec::new();
        };

        let mut out: Vec<&RecordId> = self
            .graph
            .edges_directed(idx, direction)
            .filter_map(|e| {
                let other = match direction {
                    Direction::Outgoing => e.target(),
                    Direction::Incoming => e.source(),
                };
                self.graph.node_weight(other)
            })
            .collect();
        out.sort_unstable();
        out
    }

    /// All record ids in the graph, sorted
    pub fn all_ids(&self) -> Vec<&RecordId> {
        let mut ids: Vec<&RecordId> = self.graph.node_weights().collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{PathwayType, Record, RecordStatus};
    use chrono::{TimeZone, Utc};
    use std::collections::{BTreeMap, BTreeSet};

    fn record(id: &str, cites: &[&str]) -> Record {
        Record {
            id: id.to_string(),
            classification_code: "ABC".to_string(),
            pathway: PathwayType::Standard,
            status: RecordStatus::Active,
            intended_use: "test".to_string(),
            attributes: BTreeMap::new(),
            clearance_date: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            cites: cites.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
        }
    }

    fn records(specs: &[(&str, &[&str])]) -> RecordSet {
        RecordSet::from_records(specs.iter().map(|(id, cites)| record(id, cites))).unwrap()
    }

    #[test]
    fn test_build_forward_and_reverse() {
        let set = records(&[("A", &[]), ("B", &["A"]), ("C", &["A", "B"])]);
        let graph = CitationGraph::from_records(&set);

        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.cites("C"), vec!["A", "B"]);
        assert_eq!(graph.cited_by("A"), vec!["B", "C"]);
        assert_eq!(graph.cited_by_count("A"), 2);
    }

    #[test]
    fn test_unresolved_edges_excluded_not_fatal() {
        let set = records(&[("A", &[]), ("B", &["A", "GHOST"])]);
        let graph = CitationGraph::from_records(&set);

        assert_eq!(graph.unresolved_citations(), 1);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.cites("B"), vec!["A"]);
    }

    #[test]
    fn test_duplicate_edges_collapse() {
        let set = records(&[("A", &[]), ("B", &["A"])]);
        let mut edges = set.citation_edges();
        edges.extend(set.citation_edges());
        let graph = CitationGraph::build(&set, &edges);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_cycles_stored_as_is() {
        let set = records(&[("A", &["B"]), ("B", &["A"])]);
        let graph = CitationGraph::from_records(&set);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.cites("A"), vec!["B"]);
        assert_eq!(graph.cites("B"), vec!["A"]);
    }
}
