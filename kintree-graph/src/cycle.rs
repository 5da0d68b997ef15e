//! Ancestry cycle detection.
//!
//! A parent-child edge must never make someone their own ancestor.
//! [`would_create_cycle`] answers that for a proposed edge before it is
//! stored; [`ancestry_cycles`] finds loops already present in loaded data.

use crate::adjacency::AdjacencyIndex;
use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;
use std::collections::HashSet;
use tracing::debug;

/// Returns true if storing `candidate_parent -> candidate_child` would
/// create an ancestry cycle.
///
/// That is the case when the child is the proposed parent itself, or is
/// already an ancestor of the proposed parent. The search walks upward
/// from the proposed parent and stops at the first hit. Ancestors already
/// seen are not walked twice, so the search terminates even when the
/// stored data contains a loop.
pub fn would_create_cycle(
    candidate_parent: &str,
    candidate_child: &str,
    adjacency: &AdjacencyIndex,
) -> bool {
    if candidate_parent == candidate_child {
        return true;
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&str> = vec![candidate_parent];

    while let Some(current) = stack.pop() {
        if !visited.insert(current) {
            continue;
        }
        for parent in adjacency.parents_of(current) {
            if parent == candidate_child {
                debug!(
                    "{} is an ancestor of {}; edge {} -> {} rejected",
                    candidate_child, candidate_parent, candidate_parent, candidate_child
                );
                return true;
            }
            if !visited.contains(parent.as_str()) {
                stack.push(parent);
            }
        }
    }

    false
}

/// Finds every ancestry loop already present in the parent-of graph.
///
/// Each returned group is a strongly connected component of the
/// parent → child graph with more than one member, or a single person
/// listed as their own parent. Members are sorted and groups are ordered
/// by their first member, so the output is stable across runs.
pub fn ancestry_cycles(adjacency: &AdjacencyIndex) -> Vec<Vec<String>> {
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    let mut children: Vec<&String> = adjacency.parents_table().keys().collect();
    children.sort();
    for child in children {
        for parent in adjacency.parents_of(child) {
            graph.add_edge(parent.as_str(), child.as_str(), ());
        }
    }

    let mut cycles: Vec<Vec<String>> = tarjan_scc(&graph)
        .into_iter()
        .filter(|component| {
            component.len() > 1 || graph.contains_edge(component[0], component[0])
        })
        .map(|component| {
            let mut members: Vec<String> = component.into_iter().map(str::to_string).collect();
            members.sort();
            members
        })
        .collect();
    cycles.sort();
    cycles
}
