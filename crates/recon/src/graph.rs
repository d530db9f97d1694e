//! Graph metrics over a relationship-graph snapshot: degree centrality,
//! risk banding and the small node tallies the risk views are drawn from.

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::model::{BandCounts, DegreeEntry, GraphLink, GraphNode, GraphSnapshot, RiskBand};

/// Scores below this are LOW.
pub const MEDIUM_THRESHOLD: f64 = 40.0;
/// Scores at or above this are HIGH.
pub const HIGH_THRESHOLD: f64 = 71.0;

/// Classify a 0..100 risk score into a band.
pub fn classify(score: f64) -> RiskBand {
    if score < MEDIUM_THRESHOLD {
        RiskBand::Low
    } else if score < HIGH_THRESHOLD {
        RiskBand::Medium
    } else {
        RiskBand::High
    }
}

/// Undirected degree per node, keyed in first-appearance order.
///
/// Each link adds one to both endpoints; a self-loop adds two to its node.
pub fn degree_centrality(links: &[GraphLink]) -> IndexMap<String, usize> {
    let mut degrees: IndexMap<String, usize> = IndexMap::new();
    for link in links {
        *degrees.entry(link.source.clone()).or_insert(0) += 1;
        *degrees.entry(link.target.clone()).or_insert(0) += 1;
    }
    degrees
}

/// The `n` best-connected nodes, highest degree first. Ties keep
/// first-appearance order.
pub fn top_degrees(links: &[GraphLink], n: usize) -> Vec<DegreeEntry> {
    if n == 0 {
        return Vec::new();
    }
    let mut entries: Vec<DegreeEntry> = degree_centrality(links)
        .into_iter()
        .map(|(id, degree)| DegreeEntry { id, degree })
        .collect();
    // stable sort
    entries.sort_by(|a, b| b.degree.cmp(&a.degree));
    entries.truncate(n);
    entries
}

/// Count nodes per band using each node's `risk_band` property. Nodes with
/// no band or an unrecognised one are not counted.
pub fn band_counts(nodes: &[GraphNode]) -> BandCounts {
    let mut counts = BandCounts::default();
    for node in nodes {
        match node.properties.risk_band {
            Some(RiskBand::Low) => counts.low += 1,
            Some(RiskBand::Medium) => counts.medium += 1,
            Some(RiskBand::High) => counts.high += 1,
            Some(RiskBand::Unknown(_)) | None => {}
        }
    }
    counts
}

/// Risk score per node, missing scores read as zero.
pub fn risk_scores(nodes: &[GraphNode]) -> Vec<f64> {
    nodes
        .iter()
        .map(|n| n.properties.risk_score.unwrap_or(0.0))
        .collect()
}

/// Node count per state code, first-seen order. Stateless nodes are skipped.
pub fn state_counts(nodes: &[GraphNode]) -> IndexMap<String, usize> {
    let mut counts: IndexMap<String, usize> = IndexMap::new();
    for node in nodes {
        if let Some(state) = node.properties.state.as_deref().filter(|s| !s.is_empty()) {
            *counts.entry(state.to_string()).or_insert(0) += 1;
        }
    }
    counts
}

/// Keep nodes whose risk score is at or above `threshold`, and the links
/// between them. When no node qualifies the snapshot is returned whole.
pub fn filter_by_risk(snapshot: &GraphSnapshot, threshold: f64) -> GraphSnapshot {
    let nodes: Vec<GraphNode> = snapshot
        .nodes
        .iter()
        .filter(|n| n.properties.risk_score.unwrap_or(0.0) >= threshold)
        .cloned()
        .collect();

    if nodes.is_empty() {
        return snapshot.clone();
    }

    let kept: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    let links = snapshot
        .links
        .iter()
        .filter(|l| kept.contains(l.source.as_str()) && kept.contains(l.target.as_str()))
        .cloned()
        .collect();

    GraphSnapshot { nodes, links }
}
