//! Dependency analysis for the dataflow graph.

use std::collections::{BTreeMap, VecDeque};

use crate::error::GraphError;
use crate::graph::Graph;
use crate::model::connection::NodeHandle;

/// Topological order of all nodes (Kahn's algorithm).
///
/// Returns nodes in dependency order: for every connection A→B, A precedes
/// B. The ready set is seeded in handle order, so the result is
/// deterministic. Returns `CyclicGraph` when edges remain after the ready
/// set is exhausted.
pub fn topological_order(graph: &Graph) -> Result<Vec<NodeHandle>, GraphError> {
    let mut in_degree: BTreeMap<NodeHandle, usize> =
        graph.node_handles().map(|handle| (handle, 0)).collect();
    let mut adj: BTreeMap<NodeHandle, Vec<NodeHandle>> =
        graph.node_handles().map(|handle| (handle, Vec::new())).collect();

    for conn in graph.connections() {
        adj.get_mut(&conn.from.node).unwrap().push(conn.to.node);
        *in_degree.get_mut(&conn.to.node).unwrap() += 1;
    }

    let mut queue: VecDeque<NodeHandle> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(handle, _)| *handle)
        .collect();

    let mut sorted = Vec::with_capacity(graph.node_count());

    while let Some(handle) = queue.pop_front() {
        sorted.push(handle);
        if let Some(neighbors) = adj.get(&handle) {
            for &neighbor in neighbors {
                let degree = in_degree.get_mut(&neighbor).unwrap();
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(neighbor);
                }
            }
        }
    }

    if sorted.len() != graph.node_count() {
        return Err(GraphError::CyclicGraph);
    }

    Ok(sorted)
}
