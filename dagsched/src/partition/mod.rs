/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Core partitioning and the federated system check.
//!
//! Low-utilization tasks are packed onto cores with a bin-packing heuristic
//! and every core is then analysed on its own:
//!
//! | Strategy | Core chosen for a task |
//! |---|---|
//! | best fit | smallest remaining capacity `1 - U` that still exceeds the task's utilization |
//! | worst fit | lowest current utilization, whether or not the task fits |
//!
//! Ties go to the lowest core index, so the packing is deterministic.
//!
//! [`DagTaskSet::schedule`] puts it together: DAG tasks with utilization
//! above one get dedicated cores, the rest are converted to sequential tasks
//! and partitioned onto whatever cores remain.

pub mod error;

use std::fmt;

use tracing::{debug, info, warn};

use crate::analysis::{max_chunks_with, tpj, CancelToken, Verdict};
use crate::dag::DagTaskSet;
use crate::task::{Task, TaskSet};

pub use error::PartitionError;

// ── Options ───────────────────────────────────────────────────────────────────

/// Bin-packing heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    #[default]
    BestFit,
    WorstFit,
}

/// How each core schedules its tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Policy {
    /// Preemptive EDF; checked by MaxChunks.
    Preemptive,
    /// Non-preemptive EDF; checked by TPJ.
    #[default]
    NonPreemptive,
}

// ── Partitioning ──────────────────────────────────────────────────────────────

/// Tasks placed on one core.
#[derive(Debug, Clone, Default)]
pub struct CoreAssignment {
    pub core: u32,
    pub tasks: TaskSet,
}

impl CoreAssignment {
    pub fn utilization(&self) -> f64 {
        self.tasks.utilization()
    }
}

/// Place `tasks`, in order, onto `cores` cores.
///
/// # Errors
/// [`PartitionError::NoCores`] if there are tasks but no cores, and
/// [`PartitionError::NoCoreFits`] when best fit finds no core for a task.
pub fn partition(
    cores: u32,
    tasks: &[Task],
    strategy: Strategy,
) -> Result<Vec<CoreAssignment>, PartitionError> {
    if cores == 0 && !tasks.is_empty() {
        return Err(PartitionError::NoCores { tasks: tasks.len() });
    }
    let mut parts: Vec<CoreAssignment> = (0..cores)
        .map(|core| CoreAssignment {
            core,
            tasks: TaskSet::new(),
        })
        .collect();

    for task in tasks {
        let needed = task.utilization();
        let chosen = match strategy {
            Strategy::BestFit => best_fit(&parts, needed),
            Strategy::WorstFit => worst_fit(&parts),
        };
        let Some(idx) = chosen else {
            warn!(task = %task.name, utilization = needed, "no core fits task");
            return Err(PartitionError::NoCoreFits {
                task: task.name.clone(),
                utilization: needed,
                cores,
            });
        };
        parts[idx].tasks.add(task.clone());
        debug!(
            task = %task.name,
            core = idx,
            core_util = parts[idx].utilization(),
            ?strategy,
            "placed task"
        );
    }
    Ok(parts)
}

fn best_fit(parts: &[CoreAssignment], needed: f64) -> Option<usize> {
    parts
        .iter()
        .enumerate()
        .map(|(i, p)| (i, 1.0 - p.utilization()))
        .filter(|&(_, remaining)| remaining > needed)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
}

fn worst_fit(parts: &[CoreAssignment]) -> Option<usize> {
    parts
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.utilization().total_cmp(&b.1.utilization()))
        .map(|(i, _)| i)
}

/// Analyse every core under `policy`.  Stops at the first core that is not
/// feasible and returns its verdict.
pub fn check_cores(
    parts: &mut [CoreAssignment],
    policy: Policy,
    cancel: &CancelToken,
) -> Result<Verdict, PartitionError> {
    for part in parts.iter_mut() {
        let core = part.core;
        let verdict = match policy {
            Policy::Preemptive => max_chunks_with(&mut part.tasks, cancel),
            Policy::NonPreemptive => tpj(&mut part.tasks, cancel),
        }
        .map_err(|source| PartitionError::Analysis { core, source })?;

        debug!(core, tasks = part.tasks.len(), %verdict, "core analysed");
        if !verdict.is_feasible() {
            return Ok(verdict);
        }
    }
    Ok(Verdict::Feasible)
}

// ── System check ──────────────────────────────────────────────────────────────

/// Outcome of [`DagTaskSet::schedule`].
#[derive(Debug, Clone, PartialEq)]
pub struct SystemReport {
    pub ntasks: usize,
    /// Some DAG task's critical path exceeds its deadline.
    pub infeasible: bool,
    pub verdict: Verdict,
    /// Cores dedicated to high-utilization tasks.
    pub m_high: u64,
    /// Cores left for partitioned tasks.
    pub m_low: u64,
    /// Summed utilization of the tasks that were analysed.
    pub utilization: f64,
}

impl SystemReport {
    /// Column titles matching the [`Display`](fmt::Display) row.
    pub const HEADER: &'static str = "# tasks infeas sched m_high m_low   util";

    pub fn schedulable(&self) -> bool {
        self.verdict.is_feasible()
    }
}

impl fmt::Display for SystemReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let yes_no = |b: bool| if b { "yes" } else { "no" };
        let sched = match self.verdict {
            Verdict::Timeout => "tmo",
            _ => yes_no(self.schedulable()),
        };
        write!(
            f,
            "{:7} {:>6} {:>5} {:6} {:5} {:6.2}",
            self.ntasks,
            yes_no(self.infeasible),
            sched,
            self.m_high,
            self.m_low,
            self.utilization
        )
    }
}

impl DagTaskSet {
    /// Decide whether the set is schedulable on `cores` cores.
    ///
    /// A task with utilization above one gets `ceil(U)` dedicated cores; the
    /// others become sequential tasks ([`DagTask::to_task`]) partitioned
    /// with `strategy` onto the remaining cores and checked under `policy`.
    ///
    /// [`DagTask::to_task`]: crate::dag::DagTask::to_task
    pub fn schedule(
        &self,
        cores: u32,
        policy: Policy,
        strategy: Strategy,
        cancel: &CancelToken,
    ) -> Result<SystemReport, PartitionError> {
        let mut report = SystemReport {
            ntasks: self.len(),
            infeasible: false,
            verdict: Verdict::Infeasible,
            m_high: 0,
            m_low: 0,
            utilization: 0.0,
        };

        let mut low = Vec::new();
        for task in self.iter() {
            if task.is_infeasible() {
                info!(
                    task = %task.name,
                    cpathlen = task.critical_path_length(),
                    deadline = task.deadline,
                    "critical path exceeds deadline"
                );
                report.infeasible = true;
                continue;
            }
            let util = task.utilization();
            report.utilization += util;
            if util > 1.0 {
                report.m_high += util.ceil() as u64;
            } else {
                low.push(task.to_task());
            }
        }
        if report.infeasible {
            return Ok(report);
        }

        report.m_low = u64::from(cores).saturating_sub(report.m_high);
        if report.m_high > u64::from(cores) {
            info!(m_high = report.m_high, cores, "not enough cores for high-utilization tasks");
            return Ok(report);
        }

        let m_low = u32::try_from(report.m_low).unwrap_or(u32::MAX);
        let mut parts = match partition(m_low, &low, strategy) {
            Ok(parts) => parts,
            Err(e) => {
                info!(error = %e, "partitioning failed");
                return Ok(report);
            }
        };
        report.verdict = check_cores(&mut parts, policy, cancel)?;

        info!(
            ntasks = report.ntasks,
            m_high = report.m_high,
            m_low = report.m_low,
            verdict = %report.verdict,
            "system check done"
        );
        Ok(report)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
