/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Demand-bound chunk assignment.
//!
//! Both passes walk the absolute deadlines of a task set up to the analysis
//! horizon while tracking the smallest slack `D - demand(D)` seen so far.
//! That running slack is the largest non-preemptive chunk any task first due
//! at `D` may execute without breaking feasibility.
//!
//! * [`max_chunks`] assigns `min(slack, wcet)` and only fails when the slack
//!   turns negative.
//! * [`tpj`] insists on running whole threads non-preemptively and splits a
//!   multi-threaded task whose job does not fit.
//!
//! Both poll a [`CancelToken`] between deadline buckets; a cancelled run
//! reports [`Verdict::Timeout`] and leaves the set in whatever state the
//! last completed bucket produced.

pub mod error;
pub mod max_chunks;
pub mod tpj;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::task::{TaskError, TaskSet};

pub use error::AnalysisError;
pub use max_chunks::{max_chunks, max_chunks_nonp, max_chunks_nonp_with, max_chunks_with};
pub use tpj::tpj;

// ── Verdict ───────────────────────────────────────────────────────────────────

/// Outcome of a schedulability analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Feasible,
    Infeasible,
    /// The input was rejected before any analysis ran.
    Malformed(TaskError),
    /// The caller's budget ran out; feasibility is unknown.
    Timeout,
}

impl Verdict {
    pub fn is_feasible(&self) -> bool {
        matches!(self, Verdict::Feasible)
    }

    /// Process exit status for the CLI.
    ///
    /// | Verdict | Code |
    /// |---|---|
    /// | `Feasible` | 0 |
    /// | `Infeasible` | 1 |
    /// | `Timeout` | 2 |
    /// | `Malformed` | -1 |
    pub fn exit_code(&self) -> i32 {
        match self {
            Verdict::Feasible => 0,
            Verdict::Infeasible => 1,
            Verdict::Timeout => 2,
            Verdict::Malformed(_) => -1,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Feasible => write!(f, "FEASIBLE"),
            Verdict::Infeasible => write!(f, "INFEASIBLE"),
            Verdict::Malformed(e) => write!(f, "MALFORMED: {e}"),
            Verdict::Timeout => write!(f, "TIMEOUT"),
        }
    }
}

// ── Cancellation ──────────────────────────────────────────────────────────────

/// Cooperative cancellation: an optional wall-clock deadline plus a flag any
/// clone of the token can raise.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    deadline: Option<Instant>,
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// A token that only fires through [`cancel`](Self::cancel).
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that also fires once `budget` has elapsed from now.
    pub fn with_timeout(budget: Duration) -> Self {
        Self {
            deadline: Instant::now().checked_add(budget),
            flag: Arc::default(),
        }
    }

    /// Build from an optional budget in milliseconds, as taken on the CLI.
    pub fn from_millis(budget_ms: Option<u64>) -> Self {
        match budget_ms {
            Some(ms) => Self::with_timeout(Duration::from_millis(ms)),
            None => Self::new(),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

// ── Shared walk setup ─────────────────────────────────────────────────────────

/// How a pass proceeds after validation.
enum Start {
    /// Walk deadlines up to this horizon.
    Walk(u64),
    /// The verdict is known without walking.
    Done(Verdict),
}

/// Validate `ts`, clear stale chunks and find the horizon to walk to.
fn begin(ts: &mut TaskSet, pass: &'static str) -> Result<Start, AnalysisError> {
    if let Err(e) = ts.validate() {
        warn!(pass, error = %e, "rejecting malformed task set");
        return Ok(Start::Done(Verdict::Malformed(e)));
    }
    for task in ts.tasks_mut() {
        task.chunk = 0;
    }
    match ts.analysis_horizon()? {
        Some(horizon) => Ok(Start::Walk(horizon)),
        None => {
            info!(
                pass,
                utilization = ts.utilization(),
                "utilization exceeds one"
            );
            Ok(Start::Done(Verdict::Infeasible))
        }
    }
}

/// `D - demand(D)`, signed.
fn slack_at(ts: &TaskSet, deadline: u64) -> i128 {
    deadline as i128 - ts.demand(deadline) as i128
}

// ── Tests ─────────────────────────────────────────────────────────────────────
