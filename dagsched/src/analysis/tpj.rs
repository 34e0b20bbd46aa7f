/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Thread-per-job chunk assignment.
//!
//! Every job must run as one non-preemptive chunk.  When the running slack
//! at a task's first deadline cannot hold the whole job, the task is divided:
//! the largest prefix of threads that fits stays in place, the remaining
//! threads become a new task with the same period and deadline.  The bucket
//! is then evaluated again, since the new task is due at the same instant.
//!
//! ```text
//! slack 12, t.1 wcet {8, 13}       13 > 12, wcet(1) = 8 fits
//!   t.1       wcet {8}             chunk 8
//!   t.1-p[1]  wcet {8}             due at the same deadline
//! ```
//!
//! A division raises the demand, so it can also raise `T*`; the deadline list
//! is extended to the new horizon before the walk continues.

use tracing::{debug, info};

use super::{begin, slack_at, AnalysisError, CancelToken, Start, Verdict};
use crate::deadlines::DeadlineList;
use crate::task::{TaskId, TaskSet};

/// Run TPJ over `ts`, splitting tasks in place.
///
/// On [`Verdict::Feasible`] every task (including those created by splits)
/// carries `chunk == wcet(threads)`.  A [`Verdict::Timeout`] leaves the set
/// with the splits performed so far.
pub fn tpj(ts: &mut TaskSet, cancel: &CancelToken) -> Result<Verdict, AnalysisError> {
    let mut horizon = match begin(ts, "tpj")? {
        Start::Walk(horizon) => horizon,
        Start::Done(verdict) => return Ok(verdict),
    };
    let mut deadlines = DeadlineList::fill(ts, horizon);
    debug!(horizon, buckets = deadlines.len(), "tpj: walking deadlines");

    let mut running = i128::MAX;
    let mut splits = 0usize;
    let mut cursor = deadlines.first();

    while let Some(deadline) = cursor {
        if cancel.is_cancelled() {
            info!(deadline, splits, "tpj: budget expired");
            return Ok(Verdict::Timeout);
        }

        let slack = running.min(slack_at(ts, deadline));
        debug!(deadline, slack = %slack, "tpj: bucket");
        if slack < 0 {
            info!(deadline, slack = %slack, "tpj: demand exceeds supply");
            return Ok(Verdict::Infeasible);
        }
        let available = u64::try_from(slack).unwrap_or(u64::MAX);

        match admit_bucket(ts, &deadlines, deadline, available)? {
            Admission::Admitted => {
                running = slack;
                cursor = deadlines.next_after(deadline);
            }
            Admission::Rejected => return Ok(Verdict::Infeasible),
            Admission::Divide { id, keep } => {
                match divide(ts, &mut deadlines, id, keep, horizon)? {
                    Some(grown) => horizon = grown,
                    None => return Ok(Verdict::Infeasible),
                }
                splits += 1;
                // Same bucket again: the remainder is due at `deadline` too.
            }
        }
    }

    info!(tasks = ts.len(), splits, "tpj: feasible");
    Ok(Verdict::Feasible)
}

enum Admission {
    /// Every task first due in the bucket got its full chunk.
    Admitted,
    /// Not even one thread of some task fits.
    Rejected,
    /// Task `id` has to keep only `keep` threads.
    Divide { id: TaskId, keep: u64 },
}

fn admit_bucket(
    ts: &mut TaskSet,
    deadlines: &DeadlineList,
    deadline: u64,
    available: u64,
) -> Result<Admission, AnalysisError> {
    for &id in deadlines.bucket(deadline) {
        let task = ts.get_mut(id).ok_or(AnalysisError::UnknownTask { id })?;
        if task.deadline != deadline {
            continue;
        }

        let wcet = task.full_wcet();
        if available >= wcet {
            task.chunk = wcet;
            continue;
        }
        if available < task.wcet(1) {
            info!(
                task = %task.name,
                slack = available,
                wcet_one = task.wcet(1),
                "tpj: a single thread exceeds the slack"
            );
            return Ok(Admission::Rejected);
        }

        // wcet(1) <= available < wcet(threads), so 1 <= keep < threads.
        let keep = (1..task.threads())
            .rev()
            .find(|&k| task.wcet(k) <= available)
            .unwrap_or(1);
        return Ok(Admission::Divide { id, keep });
    }
    Ok(Admission::Admitted)
}

/// Split task `id` after `keep` threads and register the remainder.
///
/// Returns the (possibly grown) horizon, or `None` once the split pushes the
/// utilization above one.
fn divide(
    ts: &mut TaskSet,
    deadlines: &mut DeadlineList,
    id: TaskId,
    keep: u64,
    horizon: u64,
) -> Result<Option<u64>, AnalysisError> {
    let task = ts.get_mut(id).ok_or(AnalysisError::UnknownTask { id })?;
    let Some(remainder) = task.split_off(keep) else {
        return Err(AnalysisError::InvalidSplit {
            task: task.name.clone(),
            keep,
            threads: task.threads(),
        });
    };
    task.chunk = task.full_wcet();
    info!(
        task = %task.name,
        kept = keep,
        chunk = task.chunk,
        remainder = %remainder.name,
        threads = remainder.threads(),
        "tpj: dividing task"
    );

    let rid = ts.add(remainder);
    if let Some(task) = ts.get(rid) {
        deadlines.insert_task(rid, task, None, horizon);
    }

    let Some(star) = ts.analysis_horizon()? else {
        info!(
            utilization = ts.utilization(),
            "tpj: division overloads the task set"
        );
        return Ok(None);
    };
    if star > horizon {
        debug!(from = horizon, to = star, "tpj: extending deadline list");
        deadlines.extend(ts, horizon, star);
        return Ok(Some(star));
    }
    Ok(Some(horizon))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::max_chunks_nonp;
    use crate::task::{Task, TaskError};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn one_split() -> TaskSet {
        vec![
            Task::new("t.1", 30, 30, vec![8, 13]),
            Task::new("t.2", 30, 30, vec![5]),
        ]
        .into_iter()
        .collect()
    }

    fn names(ts: &TaskSet) -> Vec<&str> {
        ts.tasks().map(|t| t.name.as_str()).collect()
    }

    // ── splitting ─────────────────────────────────────────────────────────────

    #[test]
    fn one_split_divides_the_first_task() {
        let mut ts = one_split();
        assert_eq!(tpj(&mut ts, &CancelToken::new()).unwrap(), Verdict::Feasible);
        assert_eq!(ts.len(), 3);
        assert_eq!(names(&ts), vec!["t.1", "t.2", "t.1-p[1]"]);
        for task in ts.tasks() {
            assert_eq!(task.threads(), 1);
            assert_eq!(task.chunk, task.full_wcet());
        }
        let t2 = ts.find("t.2").and_then(|id| ts.get(id)).unwrap();
        assert_eq!(t2.wcet_table, vec![5]);
    }

    #[test]
    fn remainder_can_be_divided_again() {
        let mut ts: TaskSet = vec![
            Task::new("t.1", 30, 30, vec![4, 9, 15]),
            Task::new("t.2", 30, 10, vec![3]),
        ]
        .into_iter()
        .collect();
        assert_eq!(tpj(&mut ts, &CancelToken::new()).unwrap(), Verdict::Feasible);
        assert_eq!(names(&ts), vec!["t.1", "t.2", "t.1-p[2]", "t.1-p[1]"]);
        assert_eq!(ts.tasks().map(|t| t.chunk).collect::<Vec<_>>(), vec![4, 3, 4, 4]);
    }

    #[test]
    fn whole_jobs_fit_without_division() {
        let mut ts: TaskSet = vec![
            Task::new("t.1", 8, 8, vec![4]),
            Task::new("t.2", 16, 16, vec![4]),
        ]
        .into_iter()
        .collect();
        assert_eq!(tpj(&mut ts, &CancelToken::new()).unwrap(), Verdict::Feasible);
        assert_eq!(ts.len(), 2);
        assert_eq!(ts.tasks().map(|t| t.chunk).collect::<Vec<_>>(), vec![4, 4]);
    }

    // ── rejection ─────────────────────────────────────────────────────────────

    #[test]
    fn single_thread_larger_than_slack_is_infeasible() {
        let mut ts: TaskSet = vec![
            Task::new("t.1", 10, 4, vec![2]),
            Task::new("t.2", 10, 10, vec![5, 6]),
        ]
        .into_iter()
        .collect();
        // Running slack is 2 from t = 4 on, below wcet(1) of t.2.
        assert_eq!(tpj(&mut ts, &CancelToken::new()).unwrap(), Verdict::Infeasible);
    }

    #[test]
    fn malformed_wcet_table_is_reported() {
        let mut ts: TaskSet = vec![Task::new("t.1", 10, 10, vec![5, 4])].into_iter().collect();
        assert!(matches!(
            tpj(&mut ts, &CancelToken::new()).unwrap(),
            Verdict::Malformed(TaskError::NonMonotonicWcet { .. })
        ));
    }

    #[test]
    fn expired_budget_is_a_timeout_not_infeasible() {
        let mut ts = one_split();
        let cancel = CancelToken::new();
        cancel.cancel();
        let verdict = tpj(&mut ts, &cancel).unwrap();
        assert_eq!(verdict, Verdict::Timeout);
        assert_eq!(verdict.exit_code(), 2);
    }

    // ── growing the horizon ───────────────────────────────────────────────────

    /// T* is 14 before t.1 is divided and the hyperperiod, 20, after.
    fn horizon_grows() -> TaskSet {
        vec![
            Task::new("t.1", 10, 10, vec![3, 5]),
            Task::new("t.2", 20, 9, vec![1]),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn division_extends_the_list_to_the_grown_horizon() {
        let mut ts = horizon_grows();
        let id = ts.find("t.1").unwrap();
        let mut deadlines = DeadlineList::fill(&ts, 14);
        assert_eq!(deadlines.deadlines().collect::<Vec<_>>(), vec![9, 10]);

        assert_eq!(divide(&mut ts, &mut deadlines, id, 1, 14).unwrap(), Some(20));
        assert_eq!(deadlines, DeadlineList::fill(&ts, 20));
        assert_eq!(deadlines.deadlines().collect::<Vec<_>>(), vec![9, 10, 20]);
        assert_eq!(deadlines.bucket(20).len(), 2);
    }

    #[test]
    fn walk_continues_past_the_starting_horizon() {
        let mut ts = horizon_grows();
        assert_eq!(ts.analysis_horizon().unwrap(), Some(14));

        assert_eq!(tpj(&mut ts, &CancelToken::new()).unwrap(), Verdict::Feasible);
        assert_eq!(names(&ts), vec!["t.1", "t.2", "t.1-p[1]"]);
        assert_eq!(ts.tasks().map(|t| t.chunk).collect::<Vec<_>>(), vec![3, 1, 3]);
        assert_eq!(ts.analysis_horizon().unwrap(), Some(20));
        assert!(ts.demand(20) <= 20);

        // A fresh walk of the divided set up to the grown horizon agrees.
        let mut fresh = ts.clone();
        assert_eq!(max_chunks_nonp(&mut fresh).unwrap(), Verdict::Feasible);
        assert_eq!(
            fresh.tasks().map(|t| t.chunk).collect::<Vec<_>>(),
            ts.tasks().map(|t| t.chunk).collect::<Vec<_>>()
        );
    }

    // ── agreement with the non-preemptive chunk test ──────────────────────────

    #[test]
    fn undivided_sets_match_the_non_preemptive_refinement() {
        let mut rng = StdRng::seed_from_u64(2005);
        let mut compared = 0;
        for _ in 0..500 {
            let n = rng.gen_range(1..=4u64);
            let original: TaskSet = (0..n)
                .map(|i| {
                    let period = rng.gen_range(5..40u64);
                    let threads = rng.gen_range(1..=3);
                    let cap = (period / (2 * n)).max(1);
                    let mut wcet: Vec<u64> =
                        (0..threads).map(|_| rng.gen_range(1..=cap)).collect();
                    wcet.sort_unstable();
                    let deadline = rng.gen_range(wcet[wcet.len() - 1]..=period);
                    Task::new(format!("t.{i}"), period, deadline, wcet)
                })
                .collect();

            let mut divided = original.clone();
            let tpj_verdict = tpj(&mut divided, &CancelToken::new()).unwrap();
            if divided.len() != original.len() {
                continue;
            }
            compared += 1;
            let mut chunked = original.clone();
            let nonp = max_chunks_nonp(&mut chunked).unwrap();
            assert_eq!(tpj_verdict, nonp, "disagreement on\n{original}");
        }
        assert!(compared > 100);
    }
}
