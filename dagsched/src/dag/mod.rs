/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Parallel tasks modelled as DAGs of execution nodes.
//!
//! A [`DagTask`] owns its nodes in a `petgraph` stable graph; nodes are
//! addressed by [`NodeId`], which survives the removal of other nodes.  Node
//! names are display data only.
//!
//! Derived values never go stale: a node's WCET is recomputed by every setter
//! and the task's critical path and workload are refreshed after every graph
//! mutation, so readers can rely on the cached values.

pub mod candidate;
pub mod collapse;
pub mod walk;

use petgraph::algo::has_path_connecting;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::Direction::{Incoming, Outgoing};
use thiserror::Error;
use tracing::debug;

use crate::task::Task;

pub use candidate::{Candidate, CandidateOrder, Candidates};
pub use collapse::{CollapseError, CollapseReport, SkipReason};

/// Stable handle of a node inside one [`DagTask`].
pub type NodeId = NodeIndex;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors raised while building a DAG task.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DagError {
    #[error("DAG task '{task}' already has a node named '{node}'")]
    DuplicateNode { task: String, node: String },

    #[error("DAG task '{task}' has no node '{node}'")]
    UnknownNode { task: String, node: String },

    #[error("edge {from} -> {to} would close a cycle in DAG task '{task}'")]
    Cycle {
        task: String,
        from: String,
        to: String,
    },
}

// ── DagNode ───────────────────────────────────────────────────────────────────

/// One execution segment of a DAG task.
///
/// Its WCET grows with the thread count:
/// `wcet = wcet_one + ceil((threads - 1) * wcet_one * factor)`.
#[derive(Debug, Clone, PartialEq)]
pub struct DagNode {
    pub name: String,
    /// Execution unit; only nodes sharing it may be collapsed.
    pub object: u64,
    threads: u64,
    wcet_one: u64,
    factor: f64,
    wcet: u64,
}

impl DagNode {
    pub fn new(name: impl Into<String>, object: u64, threads: u64, wcet_one: u64, factor: f64) -> Self {
        let mut node = Self {
            name: name.into(),
            object,
            threads,
            wcet_one,
            factor,
            wcet: 0,
        };
        node.recompute();
        node
    }

    pub fn threads(&self) -> u64 {
        self.threads
    }

    pub fn wcet_one(&self) -> u64 {
        self.wcet_one
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    /// WCET at the current thread count.
    pub fn wcet(&self) -> u64 {
        self.wcet
    }

    pub fn set_threads(&mut self, threads: u64) {
        self.threads = threads;
        self.recompute();
    }

    pub fn set_wcet_one(&mut self, wcet_one: u64) {
        self.wcet_one = wcet_one;
        self.recompute();
    }

    pub fn set_factor(&mut self, factor: f64) {
        self.factor = factor;
        self.recompute();
    }

    fn recompute(&mut self) {
        let extra = self.threads.saturating_sub(1) as f64 * self.wcet_one as f64 * self.factor;
        // `as` saturates; a negative factor contributes nothing.
        let extra = extra.max(0.0).ceil() as u64;
        self.wcet = self.wcet_one.saturating_add(extra);
    }
}

// ── DagTask ───────────────────────────────────────────────────────────────────

/// A sporadic task whose jobs execute a DAG of nodes.
#[derive(Debug, Clone)]
pub struct DagTask {
    pub name: String,
    pub period: u64,
    pub deadline: u64,
    graph: StableDiGraph<DagNode, ()>,
    cpathlen: u64,
    workload: u64,
}

impl DagTask {
    pub fn new(name: impl Into<String>, period: u64, deadline: u64) -> Self {
        Self {
            name: name.into(),
            period,
            deadline,
            graph: StableDiGraph::new(),
            cpathlen: 0,
            workload: 0,
        }
    }

    pub fn graph(&self) -> &StableDiGraph<DagNode, ()> {
        &self.graph
    }

    /// Insert a node; names must be unique within the task.
    pub fn add_node(&mut self, node: DagNode) -> Result<NodeId, DagError> {
        if self.find(&node.name).is_some() {
            return Err(DagError::DuplicateNode {
                task: self.name.clone(),
                node: node.name,
            });
        }
        let id = self.graph.add_node(node);
        self.refresh();
        Ok(id)
    }

    /// Add the precedence edge `from -> to`.  Adding an existing edge is a
    /// no-op; an edge that would close a cycle is rejected.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId) -> Result<(), DagError> {
        let from_name = self.node_name(from)?;
        let to_name = self.node_name(to)?;
        if from == to || has_path_connecting(&self.graph, to, from, None) {
            return Err(DagError::Cycle {
                task: self.name.clone(),
                from: from_name,
                to: to_name,
            });
        }
        self.graph.update_edge(from, to, ());
        self.refresh();
        Ok(())
    }

    /// [`add_edge`](Self::add_edge) with both ends looked up by name.
    pub fn add_edge_by_name(&mut self, from: &str, to: &str) -> Result<(), DagError> {
        let a = self.find_or_err(from)?;
        let b = self.find_or_err(to)?;
        self.add_edge(a, b)
    }

    /// Change a node in place; WCET and the task metrics are refreshed
    /// afterwards.
    pub fn update_node<F>(&mut self, id: NodeId, f: F) -> Result<(), DagError>
    where
        F: FnOnce(&mut DagNode),
    {
        let node = self
            .graph
            .node_weight_mut(id)
            .ok_or_else(|| DagError::UnknownNode {
                task: self.name.clone(),
                node: format!("{id:?}"),
            })?;
        f(node);
        node.recompute();
        self.refresh();
        Ok(())
    }

    pub fn node(&self, id: NodeId) -> Option<&DagNode> {
        self.graph.node_weight(id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.graph.contains_node(id)
    }

    /// Node named `name`.  A linear scan; meant for input and CLI lookups.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.graph
            .node_indices()
            .find(|&i| self.graph[i].name == name)
    }

    pub(crate) fn find_or_err(&self, name: &str) -> Result<NodeId, DagError> {
        self.find(name).ok_or_else(|| DagError::UnknownNode {
            task: self.name.clone(),
            node: name.to_string(),
        })
    }

    fn node_name(&self, id: NodeId) -> Result<String, DagError> {
        self.node(id)
            .map(|n| n.name.clone())
            .ok_or_else(|| DagError::UnknownNode {
                task: self.name.clone(),
                node: format!("{id:?}"),
            })
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &DagNode)> {
        self.graph.node_indices().map(|i| (i, &self.graph[i]))
    }

    /// Edges as `(from, to)` pairs.
    pub fn edges(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.graph
            .edge_indices()
            .filter_map(|e| self.graph.edge_endpoints(e))
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn predecessors(&self, id: NodeId) -> Vec<NodeId> {
        self.graph.neighbors_directed(id, Incoming).collect()
    }

    pub fn successors(&self, id: NodeId) -> Vec<NodeId> {
        self.graph.neighbors_directed(id, Outgoing).collect()
    }

    /// Sum of all node WCETs.
    pub fn workload(&self) -> u64 {
        self.workload
    }

    /// Length of the longest chain of dependent nodes.
    pub fn critical_path_length(&self) -> u64 {
        self.cpathlen
    }

    /// Threads released by one job, summed over all nodes.
    pub fn threads(&self) -> u64 {
        self.weights().map(DagNode::threads).sum()
    }

    /// `workload / period`.
    pub fn utilization(&self) -> f64 {
        if self.period == 0 {
            return 0.0;
        }
        self.workload as f64 / self.period as f64
    }

    /// A job cannot finish in time even with unlimited cores.
    pub fn is_infeasible(&self) -> bool {
        self.cpathlen > self.deadline
    }

    /// Fractional core demand under federated scheduling,
    /// `(C - L) / (D - L)`; infinite when `L >= D`.
    pub fn core_demand(&self) -> f64 {
        if self.cpathlen >= self.deadline {
            return f64::INFINITY;
        }
        (self.workload - self.cpathlen.min(self.workload)) as f64
            / (self.deadline - self.cpathlen) as f64
    }

    /// Sequential equivalent: one thread carrying the whole workload.
    pub fn to_task(&self) -> Task {
        Task::new(self.name.clone(), self.period, self.deadline, vec![self.workload])
    }

    fn weights(&self) -> impl Iterator<Item = &DagNode> {
        self.graph.node_indices().map(|i| &self.graph[i])
    }

    pub(crate) fn graph_mut(&mut self) -> &mut StableDiGraph<DagNode, ()> {
        &mut self.graph
    }

    /// Recompute the cached critical path and workload.
    pub(crate) fn refresh(&mut self) {
        self.workload = self
            .weights()
            .fold(0u64, |acc, n| acc.saturating_add(n.wcet()));
        self.cpathlen = walk::critical_path_length(&self.graph);
        debug!(
            task = %self.name,
            workload = self.workload,
            cpathlen = self.cpathlen,
            "refreshed DAG task"
        );
    }
}

// ── DagTaskSet ────────────────────────────────────────────────────────────────

/// An owning collection of DAG tasks, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct DagTaskSet {
    tasks: Vec<DagTask>,
}

impl DagTaskSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, task: DagTask) {
        self.tasks.push(task);
    }

    pub fn find(&self, name: &str) -> Option<&DagTask> {
        self.tasks.iter().find(|t| t.name == name)
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut DagTask> {
        self.tasks.iter_mut().find(|t| t.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DagTask> {
        self.tasks.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn utilization(&self) -> f64 {
        self.tasks.iter().map(DagTask::utilization).sum()
    }

    /// Every task has `deadline == period`.
    pub fn is_implicit(&self) -> bool {
        self.tasks.iter().all(|t| t.deadline == t.period)
    }
}

impl FromIterator<DagTask> for DagTaskSet {
    fn from_iter<I: IntoIterator<Item = DagTask>>(iter: I) -> Self {
        Self {
            tasks: iter.into_iter().collect(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
