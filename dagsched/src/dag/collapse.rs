/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Collapsing two nodes that share an execution unit into one.
//!
//! ```text
//!        a
//!      /   \
//!   s        t     collapse(a, b)     s - "a,b" - t
//!      \   /
//!        b
//! ```
//!
//! The merged node takes the union of both neighbourhoods, the summed thread
//! count, and the per-thread WCET model of `a`.  A pair is only legal when
//! merging cannot close a cycle: no chain through a third node may lead from
//! one to the other.

use std::collections::BTreeMap;
use std::fmt;

use petgraph::algo::has_path_connecting;
use petgraph::Direction::{Incoming, Outgoing};
use thiserror::Error;
use tracing::{debug, info};

use super::{DagNode, DagTask, NodeId};

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollapseError {
    #[error("DAG task '{task}' has no node '{node}'")]
    NodeNotFound { task: String, node: String },

    #[error("cannot collapse '{a}' and '{b}' in DAG task '{task}': {reason}")]
    IllegalOperation {
        task: String,
        a: String,
        b: String,
        reason: &'static str,
    },
}

// ── Legality ──────────────────────────────────────────────────────────────────

impl DagTask {
    /// Whether `a` and `b` may be merged.
    ///
    /// Both must exist, be distinct and share an object, and neither may
    /// reach the other through an intermediate node.  A direct edge alone is
    /// fine: it disappears inside the merged node.
    pub fn can_collapse(&self, a: NodeId, b: NodeId) -> bool {
        self.illegal_reason(a, b).is_none()
    }

    fn illegal_reason(&self, a: NodeId, b: NodeId) -> Option<&'static str> {
        let (Some(na), Some(nb)) = (self.node(a), self.node(b)) else {
            return Some("node not in graph");
        };
        if a == b {
            return Some("same node");
        }
        if na.object != nb.object {
            return Some("different objects");
        }
        if self.reaches_indirectly(a, b) || self.reaches_indirectly(b, a) {
            return Some("connected through another node");
        }
        None
    }

    /// A path `from -> x -> ... -> to` with at least one node in between.
    fn reaches_indirectly(&self, from: NodeId, to: NodeId) -> bool {
        let graph = self.graph();
        graph
            .neighbors_directed(from, Outgoing)
            .filter(|&s| s != to)
            .any(|s| has_path_connecting(graph, s, to, None))
    }

    /// Upper bound on the number of legal pairs: `Σ C(n, 2)` over the node
    /// count `n` of every object.
    pub fn count_candidates(&self) -> u64 {
        let mut per_object: BTreeMap<u64, u64> = BTreeMap::new();
        for (_, node) in self.nodes() {
            *per_object.entry(node.object).or_default() += 1;
        }
        per_object.values().map(|&n| n * n.saturating_sub(1) / 2).sum()
    }

    // ── Collapse ──────────────────────────────────────────────────────────────

    /// Merge `a` and `b` into a new node named `"a,b"` and return its id.
    ///
    /// # Errors
    /// [`CollapseError::NodeNotFound`] if either node is absent,
    /// [`CollapseError::IllegalOperation`] if the pair is not legal.
    pub fn collapse(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, CollapseError> {
        let (na, nb) = match (self.node(a), self.node(b)) {
            (Some(na), Some(nb)) => (na.clone(), nb.clone()),
            (None, _) => return Err(self.not_found(a)),
            (_, None) => return Err(self.not_found(b)),
        };
        if let Some(reason) = self.illegal_reason(a, b) {
            return Err(CollapseError::IllegalOperation {
                task: self.name.clone(),
                a: na.name,
                b: nb.name,
                reason,
            });
        }

        let preds = self.neighbourhood(a, b, Incoming);
        let succs = self.neighbourhood(a, b, Outgoing);

        let merged = DagNode::new(
            format!("{},{}", na.name, nb.name),
            na.object,
            na.threads() + nb.threads(),
            na.wcet_one(),
            na.factor(),
        );
        debug!(
            task = %self.name,
            merged = %merged.name,
            threads = merged.threads(),
            wcet = merged.wcet(),
            "collapsing nodes"
        );

        let graph = self.graph_mut();
        graph.remove_node(a);
        graph.remove_node(b);
        let id = graph.add_node(merged);
        for p in preds {
            graph.update_edge(p, id, ());
        }
        for s in succs {
            graph.update_edge(id, s, ());
        }
        self.refresh();
        Ok(id)
    }

    /// [`collapse`](Self::collapse) with both nodes looked up by name.
    pub fn collapse_by_name(&mut self, a: &str, b: &str) -> Result<NodeId, CollapseError> {
        let ia = self.find_node(a)?;
        let ib = self.find_node(b)?;
        self.collapse(ia, ib)
    }

    /// Neighbours of `a` or `b` in direction `dir`, without `a` and `b`.
    fn neighbourhood(&self, a: NodeId, b: NodeId, dir: petgraph::Direction) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = self
            .graph()
            .neighbors_directed(a, dir)
            .chain(self.graph().neighbors_directed(b, dir))
            .filter(|&n| n != a && n != b)
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    fn find_node(&self, name: &str) -> Result<NodeId, CollapseError> {
        self.find(name).ok_or_else(|| CollapseError::NodeNotFound {
            task: self.name.clone(),
            node: name.to_string(),
        })
    }

    fn not_found(&self, id: NodeId) -> CollapseError {
        CollapseError::NodeNotFound {
            task: self.name.clone(),
            node: format!("{id:?}"),
        }
    }

    // ── Plans ─────────────────────────────────────────────────────────────────

    /// Whether a collapsed copy is worth keeping: the critical path still
    /// meets the deadline and the fractional core demand does not grow.
    pub fn is_beneficial(&self, collapsed: &DagTask) -> Result<(), SkipReason> {
        if collapsed.critical_path_length() > self.deadline {
            return Err(SkipReason::DeadlineMiss);
        }
        if collapsed.core_demand() > self.core_demand() {
            return Err(SkipReason::CoresIncrease);
        }
        Ok(())
    }

    /// Apply a list of named pairs in order.
    ///
    /// Unknown names abort the plan.  Illegal pairs are skipped, as are
    /// non-beneficial ones unless `ignore_benefit` is set.  Later pairs may
    /// name nodes produced by earlier collapses (`"a,b"`).
    pub fn apply_collapse_plan(
        &mut self,
        plan: &[(String, String)],
        ignore_benefit: bool,
    ) -> Result<CollapseReport, CollapseError> {
        let mut report = CollapseReport::default();

        for (a_name, b_name) in plan {
            let a = self.find_node(a_name)?;
            let b = self.find_node(b_name)?;
            let pair = format!("{a_name},{b_name}");

            if !self.can_collapse(a, b) {
                info!(task = %self.name, pair = %pair, "cannot collapse, skipping");
                report.skipped.push((pair, SkipReason::Illegal));
                continue;
            }

            let mut copy = self.clone();
            copy.collapse(a, b)?;
            if let Err(reason) = self.is_beneficial(&copy) {
                if !ignore_benefit {
                    info!(task = %self.name, pair = %pair, %reason, "skipping collapse");
                    report.skipped.push((pair, reason));
                    continue;
                }
                debug!(task = %self.name, pair = %pair, %reason, "collapsing anyway");
            }

            *self = copy;
            report.applied.push(pair);
        }

        info!(
            task = %self.name,
            applied = report.applied.len(),
            skipped = report.skipped.len(),
            "collapse plan done"
        );
        Ok(report)
    }
}

/// Why a planned collapse was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Illegal,
    CoresIncrease,
    DeadlineMiss,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Illegal => write!(f, "not a legal pair"),
            SkipReason::CoresIncrease => write!(f, "not beneficial: m increases"),
            SkipReason::DeadlineMiss => write!(f, "not beneficial: L > D"),
        }
    }
}

/// Outcome of [`DagTask::apply_collapse_plan`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollapseReport {
    /// Pairs collapsed, as `"a,b"`.
    pub applied: Vec<String>,
    pub skipped: Vec<(String, SkipReason)>,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
