//! Lineage Analysis
//!
//! Computes chain depth with deterministic cycle breaking, ranks hub
//! predicates by reverse-citation count, and classifies per-record predicate
//! health. Operates on the read-only citation graph snapshot; the output is
//! immutable for the duration of an analysis run.

use petgraph::algo::kosaraju_scc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info};

use super::health::{classify_health, PredicateHealthAssessment};
use super::CitationGraph;
use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, Result};
use crate::record::{CitationEdge, RecordId, RecordSet};
use chrono::{DateTime, Utc};

/// One entry in the hub ranking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubEntry {
    pub id: RecordId,
    /// Number of records citing this one
    pub cited_by_count: usize,
    /// 1-based rank; lower is more cited
    pub rank: usize,
}

/// Result of lineage analysis for one subject
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineageReport {
    /// Subject the assessments were computed against
    pub subject_id: RecordId,
    /// Per-precedent health assessments, keyed by record id
    pub assessments: BTreeMap<RecordId, PredicateHealthAssessment>,
    /// Hub ranking over the whole graph, most-cited first
    pub hub_ranking: Vec<HubEntry>,
    /// Cycle-closing edges dropped during depth computation
    pub dropped_edges: Vec<CitationEdge>,
    /// Citation edges excluded at build time for unknown identifiers
    pub unresolved_citations: usize,
}

impl LineageReport {
    pub fn assessment(&self, id: &str) -> Option<&PredicateHealthAssessment> {
        self.assessments.get(id)
    }

    /// Hub rank for a record, if it appears in the ranking
    pub fn hub_rank(&self, id: &str) -> Option<usize> {
        self.hub_ranking
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.rank)
    }
}

/// Forward adjacency after cycle breaking, plus what was dropped
struct CycleResolution {
    /// id -> cited ids, cycle-closing edges removed, targets sorted
    retained: HashMap<RecordId, Vec<RecordId>>,
    /// Edges removed to guarantee termination
    dropped: Vec<CitationEdge>,
    /// Records that were part of a cycle
    flagged: BTreeSet<RecordId>,
}

/// Break citation cycles deterministically.
///
/// Each pass finds the cyclic strongly connected components and removes, per
/// component, the single intra-component edge whose source identifier sorts
/// lexicographically largest (largest target as the secondary tie-break),
/// then repeats until no cyclic component remains. Every pass removes one
/// edge from each cyclic component, so this terminates and never drops more
/// edges than needed; the result depends only on graph shape, never on edge
/// insertion order. All members of a cyclic component are flagged.
fn break_cycles(graph: &CitationGraph) -> CycleResolution {
    // Working adjacency keyed by id; BTreeSet keeps targets sorted.
    let mut adjacency: HashMap<RecordId, BTreeSet<RecordId>> = HashMap::new();
    for id in graph.all_ids() {
        let targets: BTreeSet<RecordId> =
            graph.cites(id).into_iter().cloned().collect();
        adjacency.insert(id.clone(), targets);
    }

    let mut dropped = Vec::new();
    let mut flagged = BTreeSet::new();

    loop {
        // Rebuild a scratch graph for SCC detection over current adjacency.
        let mut scratch = petgraph::graph::DiGraph::<RecordId, ()>::new();
        let mut indices = HashMap::new();
        let mut ids: Vec<&RecordId> = adjacency.keys().collect();
        ids.sort_unstable();
        for id in &ids {
            indices.insert((*id).clone(), scratch.add_node((*id).clone()));
        }
        for (source, targets) in &adjacency {
            for target in targets {
                scratch.add_edge(indices[source], indices[target], ());
            }
        }

        let mut removed_any = false;
        for scc in kosaraju_scc(&scratch) {
            let members: BTreeSet<RecordId> = scc
                .iter()
                .filter_map(|&idx| scratch.node_weight(idx).cloned())
                .collect();

            let cyclic = members.len() > 1
                || members.iter().any(|m| adjacency[m].contains(m));
            if !cyclic {
                continue;
            }

            flagged.extend(members.iter().cloned());

            // Tie-break: drop the one edge leaving the lexicographically
            // largest member toward its largest intra-component target.
            let Some(largest) = members.iter().next_back().cloned() else {
                continue;
            };
            let Some(targets) = adjacency.get_mut(&largest) else {
                continue;
            };
            let Some(target) = targets
                .iter()
                .filter(|t| members.contains(*t))
                .next_back()
                .cloned()
            else {
                continue;
            };
            targets.remove(&target);
            dropped.push(CitationEdge::new(largest, target));
            removed_any = true;
        }

        if !removed_any {
            break;
        }
    }

    dropped.sort_by(|a, b| (&a.citing, &a.cited).cmp(&(&b.citing, &b.cited)));

    let retained = adjacency
        .into_iter()
        .map(|(id, targets)| (id, targets.into_iter().collect()))
        .collect();

    CycleResolution {
        retained,
        dropped,
        flagged,
    }
}

/// Chain depth per record over the cycle-broken adjacency.
///
/// depth(R) = 0 if R cites nothing; else 1 + max over cited. Explicit stack
/// with memoization rather than recursion, so depth-heavy graphs cannot blow
/// the call stack. The adjacency is acyclic here, so every node resolves.
fn chain_depths(retained: &HashMap<RecordId, Vec<RecordId>>) -> HashMap<RecordId, usize> {
    let mut depths: HashMap<RecordId, usize> = HashMap::with_capacity(retained.len());

    let mut roots: Vec<&RecordId> = retained.keys().collect();
    roots.sort_unstable();

    for root in roots {
        if depths.contains_key(root) {
            continue;
        }

        // (node, children_pushed)
        let mut stack: Vec<(&RecordId, bool)> = vec![(root, false)];
        while let Some((node, expanded)) = stack.pop() {
            if depths.contains_key(node) {
                continue;
            }
            let children = &retained[node];
            if expanded {
                let depth = children
                    .iter()
                    .map(|c| depths.get(c).copied().unwrap_or(0) + 1)
                    .max()
                    .unwrap_or(0);
                depths.insert(node.clone(), depth);
            } else {
                stack.push((node, true));
                for child in children {
                    if !depths.contains_key(child) {
                        stack.push((child, false));
                    }
                }
            }
        }
    }

    depths
}

/// Hub ranking: cited-by count descending, ties by id ascending.
///
/// Uses the full graph including any cycle-closing edges; dropping an edge
/// for depth purposes does not erase the citation itself. Stable under
/// permutation of edge insertion order.
fn rank_hubs(graph: &CitationGraph) -> Vec<HubEntry> {
    let mut entries: Vec<(usize, RecordId)> = graph
        .all_ids()
        .into_iter()
        .map(|id| (graph.cited_by_count(id), id.clone()))
        .collect();
    entries.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

    entries
        .into_iter()
        .enumerate()
        .map(|(i, (count, id))| HubEntry {
            id,
            cited_by_count: count,
            rank: i + 1,
        })
        .collect()
}

/// Run lineage analysis for one subject over the whole graph.
///
/// Computes cycle-safe chain depths, the hub ranking, and one health
/// assessment per record other than the subject. `now` anchors the age
/// check so runs are reproducible.
pub fn analyze_lineage(
    records: &RecordSet,
    graph: &CitationGraph,
    subject_id: &str,
    config: &AnalysisConfig,
    now: DateTime<Utc>,
) -> Result<LineageReport> {
    let subject = records
        .get(subject_id)
        .ok_or_else(|| AnalysisError::SubjectNotFound {
            id: subject_id.to_string(),
        })?;

    let resolution = break_cycles(graph);
    if !resolution.dropped.is_empty() {
        info!(
            dropped = resolution.dropped.len(),
            flagged = resolution.flagged.len(),
            "citation cycles broken for depth computation"
        );
    }

    let depths = chain_depths(&resolution.retained);
    let hub_ranking = rank_hubs(graph);
    let hub_ranks: HashMap<&RecordId, usize> =
        hub_ranking.iter().map(|e| (&e.id, e.rank)).collect();

    let mut assessments = BTreeMap::new();
    for record in records.iter() {
        if record.id == subject.id {
            continue;
        }
        let assessment = classify_health(
            record,
            subject,
            config,
            depths.get(&record.id).copied().unwrap_or(0),
            hub_ranks.get(&record.id).copied(),
            resolution.flagged.contains(&record.id),
            now,
        );
        debug!(
            id = %record.id,
            classification = ?assessment.classification,
            depth = assessment.chain_depth,
            "predicate assessed"
        );
        assessments.insert(record.id.clone(), assessment);
    }

    Ok(LineageReport {
        subject_id: subject.id.clone(),
        assessments,
        hub_ranking,
        dropped_edges: resolution.dropped,
        unresolved_citations: graph.unresolved_citations(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{PathwayType, Record, RecordStatus};
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn record(id: &str, cites: &[&str]) -> Record {
        Record {
            id: id.to_string(),
            classification_code: "ABC".to_string(),
            pathway: PathwayType::Standard,
            status: RecordStatus::Active,
            intended_use: "bone fixation".to_string(),
            attributes: BTreeMap::new(),
            clearance_date: Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap(),
            cites: cites.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn setup(specs: &[(&str, &[&str])]) -> (RecordSet, CitationGraph) {
        let set =
            RecordSet::from_records(specs.iter().map(|(id, cites)| record(id, cites))).unwrap();
        let graph = CitationGraph::from_records(&set);
        (set, graph)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_chain_depth_linear() {
        // D cites C cites B cites A
        let (_, graph) = setup(&[("A", &[]), ("B", &["A"]), ("C", &["B"]), ("D", &["C"])]);
        let resolution = break_cycles(&graph);
        let depths = chain_depths(&resolution.retained);
        assert_eq!(depths["A"], 0);
        assert_eq!(depths["B"], 1);
        assert_eq!(depths["C"], 2);
        assert_eq!(depths["D"], 3);
        assert!(resolution.dropped.is_empty());
    }

    #[test]
    fn test_cycle_broken_deterministically() {
        // A -> B -> C -> A: the edge leaving the largest source (C) drops
        let (_, graph) = setup(&[("A", &["B"]), ("B", &["C"]), ("C", &["A"])]);
        let resolution = break_cycles(&graph);

        assert_eq!(
            resolution.dropped,
            vec![CitationEdge::new("C", "A")]
        );
        assert_eq!(
            resolution.flagged.iter().collect::<Vec<_>>(),
            vec!["A", "B", "C"]
        );

        let depths = chain_depths(&resolution.retained);
        assert_eq!(depths["C"], 0);
        assert_eq!(depths["B"], 1);
        assert_eq!(depths["A"], 2);
        // Termination bound: depth never exceeds node count
        assert!(depths.values().all(|&d| d <= 3));
    }

    #[test]
    fn test_one_edge_dropped_per_cycle() {
        // Two independent two-cycles: exactly one edge drops from each
        let (_, graph) = setup(&[
            ("A", &["B"]),
            ("B", &["A"]),
            ("C", &["D"]),
            ("D", &["C"]),
        ]);
        let resolution = break_cycles(&graph);
        assert_eq!(
            resolution.dropped,
            vec![CitationEdge::new("B", "A"), CitationEdge::new("D", "C")]
        );

        let depths = chain_depths(&resolution.retained);
        assert_eq!(depths["A"], 1);
        assert_eq!(depths["B"], 0);
        assert_eq!(depths["C"], 1);
        assert_eq!(depths["D"], 0);
    }

    #[test]
    fn test_self_citation_dropped() {
        let (_, graph) = setup(&[("A", &["A"])]);
        let resolution = break_cycles(&graph);
        assert_eq!(resolution.dropped, vec![CitationEdge::new("A", "A")]);
        let depths = chain_depths(&resolution.retained);
        assert_eq!(depths["A"], 0);
    }

    #[test]
    fn test_hub_ranking_order_and_ties() {
        // A cited by B, C, D; B cited by C; ties by id ascending
        let (_, graph) = setup(&[
            ("A", &[]),
            ("B", &["A"]),
            ("C", &["A", "B"]),
            ("D", &["A"]),
        ]);
        let ranking = rank_hubs(&graph);
        assert_eq!(ranking[0].id, "A");
        assert_eq!(ranking[0].cited_by_count, 3);
        assert_eq!(ranking[1].id, "B");
        // C and D both have zero citations; C sorts first
        assert_eq!(ranking[2].id, "C");
        assert_eq!(ranking[3].id, "D");
    }

    #[test]
    fn test_hub_ranking_insertion_order_invariant() {
        let set = RecordSet::from_records([
            record("A", &[]),
            record("B", &["A"]),
            record("C", &["A", "B"]),
        ])
        .unwrap();

        let forward = set.citation_edges();
        let mut reversed = forward.clone();
        reversed.reverse();

        let g1 = CitationGraph::build(&set, &forward);
        let g2 = CitationGraph::build(&set, &reversed);
        assert_eq!(rank_hubs(&g1), rank_hubs(&g2));
    }

    #[test]
    fn test_analyze_lineage_excludes_subject() {
        let (set, graph) = setup(&[("SUBJ", &["A"]), ("A", &[])]);
        let config = AnalysisConfig::default();
        let report = analyze_lineage(&set, &graph, "SUBJ", &config, now()).unwrap();
        assert!(report.assessment("SUBJ").is_none());
        assert!(report.assessment("A").is_some());
    }

    #[test]
    fn test_analyze_lineage_unknown_subject_fatal() {
        let (set, graph) = setup(&[("A", &[])]);
        let config = AnalysisConfig::default();
        let result = analyze_lineage(&set, &graph, "MISSING", &config, now());
        assert!(matches!(
            result,
            Err(AnalysisError::SubjectNotFound { id }) if id == "MISSING"
        ));
    }
}
