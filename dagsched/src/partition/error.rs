/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Partitioning failures.
//!
//! A task that fits no core is a genuine infeasibility of the heuristic, but
//! it is reported with enough data to log which task and how much capacity
//! it needed.

use thiserror::Error;

use crate::analysis::AnalysisError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PartitionError {
    /// Tasks were given but there is no core to put them on.
    #[error("no cores available for {tasks} task(s)")]
    NoCores { tasks: usize },

    /// Best-fit found no core with more free capacity than the task needs.
    #[error("task '{task}' (utilization {utilization:.3}) fits on none of {cores} core(s)")]
    NoCoreFits {
        task: String,
        utilization: f64,
        cores: u32,
    },

    /// A per-core analysis could not run.
    #[error("core {core}: {source}")]
    Analysis {
        core: u32,
        #[source]
        source: AnalysisError,
    },
}
