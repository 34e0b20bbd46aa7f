/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Baruah's maximal non-preemptive chunks.

use tracing::{debug, info};

use super::{begin, slack_at, AnalysisError, CancelToken, Start, Verdict};
use crate::deadlines::DeadlineList;
use crate::task::TaskSet;

/// Assign every task the largest chunk that keeps `ts` EDF-feasible.
///
/// On [`Verdict::Feasible`] each task's `chunk` is set; it may be smaller
/// than the task's WCET (down to zero), in which case the job has to be
/// preempted at least once.
pub fn max_chunks(ts: &mut TaskSet) -> Result<Verdict, AnalysisError> {
    max_chunks_with(ts, &CancelToken::new())
}

/// [`max_chunks`] under a cancellation token polled between buckets.
pub fn max_chunks_with(ts: &mut TaskSet, cancel: &CancelToken) -> Result<Verdict, AnalysisError> {
    let horizon = match begin(ts, "max_chunks")? {
        Start::Walk(horizon) => horizon,
        Start::Done(verdict) => return Ok(verdict),
    };
    let deadlines = DeadlineList::fill(ts, horizon);
    debug!(horizon, buckets = deadlines.len(), "max_chunks: walking deadlines");

    let mut running = i128::MAX;
    for (deadline, ids) in deadlines.iter() {
        if cancel.is_cancelled() {
            info!(deadline, "max_chunks: budget expired");
            return Ok(Verdict::Timeout);
        }

        running = running.min(slack_at(ts, deadline));
        debug!(deadline, slack = %running, "max_chunks: bucket");
        if running < 0 {
            info!(deadline, slack = %running, "max_chunks: demand exceeds supply");
            return Ok(Verdict::Infeasible);
        }

        let available = u64::try_from(running).unwrap_or(u64::MAX);
        for &id in ids {
            let task = ts.get_mut(id).ok_or(AnalysisError::UnknownTask { id })?;
            if task.deadline == deadline {
                task.chunk = available.min(task.full_wcet());
            }
        }
    }

    info!(tasks = ts.len(), "max_chunks: feasible");
    Ok(Verdict::Feasible)
}

/// Fully non-preemptive variant: feasible only if every job fits into a
/// single chunk.
pub fn max_chunks_nonp(ts: &mut TaskSet) -> Result<Verdict, AnalysisError> {
    max_chunks_nonp_with(ts, &CancelToken::new())
}

/// [`max_chunks_nonp`] under a cancellation token.
pub fn max_chunks_nonp_with(
    ts: &mut TaskSet,
    cancel: &CancelToken,
) -> Result<Verdict, AnalysisError> {
    let verdict = max_chunks_with(ts, cancel)?;
    if !verdict.is_feasible() {
        return Ok(verdict);
    }
    match ts.tasks().find(|t| t.chunk < t.full_wcet()) {
        Some(task) => {
            info!(
                task = %task.name,
                chunk = task.chunk,
                wcet = task.full_wcet(),
                "max_chunks_nonp: job does not fit one chunk"
            );
            Ok(Verdict::Infeasible)
        }
        None => Ok(Verdict::Feasible),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
