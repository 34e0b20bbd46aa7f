/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Collapse candidates and the orders in which to try them.
//!
//! [`Candidates`] enumerates every pair of nodes sharing an object, lazily,
//! object by object.  Scoring a pair performs the collapse on a clone of the
//! task, so the task itself is never touched.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use tracing::debug;

use super::{CollapseError, DagTask, NodeId};

// ── Enumeration ───────────────────────────────────────────────────────────────

/// Lazy iterator over same-object node pairs `(a, b)`, `a` before `b` in
/// node order.  Pairs are not legality checked.
pub struct Candidates {
    groups: Vec<Vec<NodeId>>,
    group: usize,
    i: usize,
    j: usize,
}

impl Candidates {
    fn new(task: &DagTask) -> Self {
        let mut by_object: BTreeMap<u64, Vec<NodeId>> = BTreeMap::new();
        for (id, node) in task.nodes() {
            by_object.entry(node.object).or_default().push(id);
        }
        Self {
            groups: by_object.into_values().collect(),
            group: 0,
            i: 0,
            j: 1,
        }
    }
}

impl Iterator for Candidates {
    type Item = (NodeId, NodeId);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let members = self.groups.get(self.group)?;
            if self.j < members.len() {
                let pair = (members[self.i], members[self.j]);
                self.j += 1;
                return Some(pair);
            }
            self.i += 1;
            self.j = self.i + 1;
            if self.j >= members.len() {
                self.group += 1;
                self.i = 0;
                self.j = 1;
            }
        }
    }
}

// ── Scored candidates ─────────────────────────────────────────────────────────

/// A legal pair, optionally annotated with what collapsing it would change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub a: NodeId,
    pub b: NodeId,
    /// `"a,b"`, the name the merged node would get.
    pub name: String,
    /// Workload before minus after.
    pub delta_workload: Option<i64>,
    /// Critical path length before minus after.
    pub delta_cpathlen: Option<i64>,
}

impl Candidate {
    fn unscored(task: &DagTask, a: NodeId, b: NodeId) -> Self {
        let name_of = |id| task.node(id).map_or("?", |n| n.name.as_str());
        Self {
            a,
            b,
            name: format!("{},{}", name_of(a), name_of(b)),
            delta_workload: None,
            delta_cpathlen: None,
        }
    }

    /// Score `(a, b)` by collapsing it on a scratch copy of `task`.
    pub fn score(task: &DagTask, a: NodeId, b: NodeId) -> Result<Self, CollapseError> {
        let mut copy = task.clone();
        copy.collapse(a, b)?;
        let mut cand = Self::unscored(task, a, b);
        cand.delta_workload = Some(task.workload() as i64 - copy.workload() as i64);
        cand.delta_cpathlen =
            Some(task.critical_path_length() as i64 - copy.critical_path_length() as i64);
        Ok(cand)
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |d: Option<i64>| d.map_or_else(|| "-".to_string(), |v| v.to_string());
        write!(
            f,
            "{:<16} dC:{:>6} dL:{:>6}",
            self.name,
            show(self.delta_workload),
            show(self.delta_cpathlen)
        )
    }
}

// ── Orders ────────────────────────────────────────────────────────────────────

/// Order in which legal candidates are listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CandidateOrder {
    /// Enumeration order, unscored.
    #[default]
    Arbitrary,
    /// Largest workload reduction first.
    MaxBenefit,
    /// Ascending `delta_cpathlen` (before minus after): the pair that
    /// lengthens the critical path most comes first.
    MinPathGrowth,
}

impl FromStr for CandidateOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "arb" => Ok(Self::Arbitrary),
            "maxb" => Ok(Self::MaxBenefit),
            "minp" => Ok(Self::MinPathGrowth),
            other => Err(format!("unknown candidate order '{other}' (arb, maxb, minp)")),
        }
    }
}

impl DagTask {
    /// All same-object pairs, lazily.
    pub fn candidates(&self) -> Candidates {
        Candidates::new(self)
    }

    /// Same-object pairs that pass [`can_collapse`](Self::can_collapse).
    pub fn legal_candidates(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.candidates().filter(|&(a, b)| self.can_collapse(a, b))
    }

    /// Legal candidates in `order`.  Ties keep enumeration order.
    pub fn order_candidates(&self, order: CandidateOrder) -> Result<Vec<Candidate>, CollapseError> {
        if order == CandidateOrder::Arbitrary {
            return Ok(self
                .legal_candidates()
                .map(|(a, b)| Candidate::unscored(self, a, b))
                .collect());
        }

        let mut scored = self
            .legal_candidates()
            .map(|(a, b)| Candidate::score(self, a, b))
            .collect::<Result<Vec<_>, _>>()?;
        match order {
            CandidateOrder::MaxBenefit => {
                scored.sort_by_key(|c| std::cmp::Reverse(c.delta_workload));
            }
            CandidateOrder::MinPathGrowth => {
                scored.sort_by_key(|c| c.delta_cpathlen);
            }
            CandidateOrder::Arbitrary => {}
        }
        debug!(task = %self.name, ?order, candidates = scored.len(), "ordered candidates");
        Ok(scored)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
