/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Absolute deadlines of a task set up to a horizon, grouped into buckets.
//!
//! Every task contributes `deadline + k * period` for `k = 0, 1, ...` while
//! the value stays at or below the horizon.  Tasks whose jobs are due at the
//! same instant share one bucket.  Buckets hold [`TaskId`]s, not tasks: the
//! list is a view over a [`TaskSet`] that stays owned by the caller.

use std::collections::BTreeMap;
use std::ops::Bound;

use crate::task::{Task, TaskId, TaskSet};

/// Ascending map from absolute deadline to the tasks due at that instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeadlineList {
    buckets: BTreeMap<u64, Vec<TaskId>>,
}

impl DeadlineList {
    pub fn new() -> Self {
        Self::default()
    }

    /// All absolute deadlines of `ts` in `[0, horizon]`.
    pub fn fill(ts: &TaskSet, horizon: u64) -> Self {
        let mut list = Self::new();
        for (id, task) in ts.iter() {
            list.insert_task(id, task, None, horizon);
        }
        list
    }

    /// Add the deadlines of `ts` that fall in `(prev_horizon, new_horizon]`.
    ///
    /// Used after a split has grown `T*`; deadlines up to `prev_horizon` are
    /// assumed to be present already.
    pub fn extend(&mut self, ts: &TaskSet, prev_horizon: u64, new_horizon: u64) {
        if new_horizon <= prev_horizon {
            return;
        }
        for (id, task) in ts.iter() {
            self.insert_task(id, task, Some(prev_horizon), new_horizon);
        }
    }

    /// Add the deadlines of one task in `(after, upto]` (or `[0, upto]` when
    /// `after` is `None`).
    pub fn insert_task(&mut self, id: TaskId, task: &Task, after: Option<u64>, upto: u64) {
        if task.period == 0 {
            // A zero period would never advance; only the first job counts.
            if task.deadline <= upto && after.map_or(true, |a| task.deadline > a) {
                self.push(task.deadline, id);
            }
            return;
        }

        let mut deadline = task.deadline;
        if let Some(after) = after {
            if deadline <= after {
                // Jump straight to the first job due after `after`.
                let skip = (after - deadline) / task.period + 1;
                deadline = match skip
                    .checked_mul(task.period)
                    .and_then(|s| deadline.checked_add(s))
                {
                    Some(d) => d,
                    None => return,
                };
            }
        }

        while deadline <= upto {
            self.push(deadline, id);
            deadline = match deadline.checked_add(task.period) {
                Some(d) => d,
                None => break,
            };
        }
    }

    fn push(&mut self, deadline: u64, id: TaskId) {
        let bucket = self.buckets.entry(deadline).or_default();
        if !bucket.contains(&id) {
            bucket.push(id);
        }
    }

    /// Earliest deadline.
    pub fn first(&self) -> Option<u64> {
        self.buckets.keys().next().copied()
    }

    /// Smallest deadline strictly greater than `deadline`.
    pub fn next_after(&self, deadline: u64) -> Option<u64> {
        self.buckets
            .range((Bound::Excluded(deadline), Bound::Unbounded))
            .next()
            .map(|(&d, _)| d)
    }

    /// Tasks due at `deadline`; empty if there is no such bucket.
    pub fn bucket(&self, deadline: u64) -> &[TaskId] {
        self.buckets.get(&deadline).map_or(&[], Vec::as_slice)
    }

    /// Ascending deadlines.
    pub fn deadlines(&self) -> impl Iterator<Item = u64> + '_ {
        self.buckets.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &[TaskId])> {
        self.buckets.iter().map(|(&d, ids)| (d, ids.as_slice()))
    }

    /// Number of distinct deadlines.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
