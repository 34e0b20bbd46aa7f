/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Longest-path walks over a DAG task's graph.
//!
//! The distance of a node is its WCET plus the largest distance of any of its
//! predecessors; the critical path length is the largest distance overall.
//! Distances are returned, never stored on the nodes.

use std::cmp::Reverse;
use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::stable_graph::StableDiGraph;
use petgraph::Direction::Incoming;
use tracing::warn;

use super::{DagNode, NodeId};

/// Nodes in topological order.  Empty if the graph has a cycle, which
/// [`DagTask`](super::DagTask) never lets happen.
pub fn topological_order(graph: &StableDiGraph<DagNode, ()>) -> Vec<NodeId> {
    match toposort(graph, None) {
        Ok(order) => order,
        Err(cycle) => {
            warn!(node = ?cycle.node_id(), "cycle in DAG, no topological order");
            Vec::new()
        }
    }
}

/// Distance of every node, in topological order.
pub fn distances(graph: &StableDiGraph<DagNode, ()>) -> Vec<(NodeId, u64)> {
    let order = topological_order(graph);
    let mut dist: HashMap<NodeId, u64> = HashMap::with_capacity(order.len());
    let mut out = Vec::with_capacity(order.len());

    for id in order {
        let longest_pred = graph
            .neighbors_directed(id, Incoming)
            .filter_map(|p| dist.get(&p).copied())
            .max()
            .unwrap_or(0);
        let d = longest_pred.saturating_add(graph[id].wcet());
        dist.insert(id, d);
        out.push((id, d));
    }
    out
}

/// Length of the longest chain of dependent nodes; `0` for an empty graph.
pub fn critical_path_length(graph: &StableDiGraph<DagNode, ()>) -> u64 {
    distances(graph)
        .into_iter()
        .map(|(_, d)| d)
        .max()
        .unwrap_or(0)
}

/// The nodes of one critical path, source first.
pub fn critical_path(graph: &StableDiGraph<DagNode, ()>) -> Vec<NodeId> {
    let dist: HashMap<NodeId, u64> = distances(graph).into_iter().collect();
    let Some((&end, _)) = dist.iter().max_by_key(|&(&id, &d)| (d, Reverse(id))) else {
        return Vec::new();
    };

    let mut path = vec![end];
    let mut cursor = end;
    while let Some(prev) = graph
        .neighbors_directed(cursor, Incoming)
        .filter(|p| dist.contains_key(p))
        .max_by_key(|p| (dist[p], Reverse(*p)))
    {
        path.push(prev);
        cursor = prev;
    }
    path.reverse();
    path
}

// ── Tests ─────────────────────────────────────────────────────────────────────
