/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Core task data structures: [`Task`] and the owning [`TaskSet`].
//!
//! A task releases `threads` threads with every job.  Its WCET table is
//! indexed by thread count, so `wcet(1)` is the cost of one thread and
//! `wcet(threads)` the cost of the whole job:
//!
//! ```text
//! threads = 3, wcet_table = [10, 15, 17]
//!           wcet(1) = 10   wcet(2) = 15   wcet(3) = 17 (full WCET)
//! ```
//!
//! # Ownership model
//! A [`TaskSet`] owns its tasks and hands out stable [`TaskId`]s.  Deadline
//! buckets and analysis passes refer to tasks by id, never by reference, so
//! the set can be mutated (chunks assigned, tasks split by TPJ) while a
//! [`DeadlineList`](crate::deadlines::DeadlineList) is alive.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

// ── Validation errors ─────────────────────────────────────────────────────────

/// Why a task is malformed.
///
/// Detected eagerly by [`Task::validate`] / [`TaskSet::validate`] before any
/// analysis starts, so a malformed input is never confused with an
/// infeasible one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("task '{task}' releases zero threads")]
    NoThreads { task: String },

    #[error("task '{task}' declares {threads} thread(s) but {entries} WCET value(s)")]
    WcetCount {
        task: String,
        threads: u64,
        entries: usize,
    },

    #[error("task '{task}' has a zero period")]
    ZeroPeriod { task: String },

    #[error("task '{task}' has a zero relative deadline")]
    ZeroDeadline { task: String },

    #[error("task '{task}' WCET table decreases at {threads} thread(s) ({prev} -> {next})")]
    NonMonotonicWcet {
        task: String,
        threads: u64,
        prev: u64,
        next: u64,
    },

    #[error("task '{task}' is not constrained-deadline (deadline {deadline} > period {period})")]
    Unconstrained {
        task: String,
        deadline: u64,
        period: u64,
    },
}

// ── Task ──────────────────────────────────────────────────────────────────────

/// A sporadic, constrained-deadline task whose jobs release one or more
/// threads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Task {
    /// Display name.  Split tasks derive theirs from the task they came from.
    pub name: String,

    /// Minimum inter-arrival time.
    pub period: u64,

    /// Relative deadline.
    pub deadline: u64,

    /// `wcet_table[n - 1]` is the WCET of `n` threads; its length is the
    /// thread count of the task.
    pub wcet_table: Vec<u64>,

    /// Largest non-preemptive chunk assigned by MaxChunks / TPJ.  Zero until
    /// an analysis has run.
    pub chunk: u64,
}

impl Task {
    /// Build a task from its WCET table; the thread count is the length of
    /// the table.
    pub fn new(name: impl Into<String>, period: u64, deadline: u64, wcet_table: Vec<u64>) -> Self {
        Self {
            name: name.into(),
            period,
            deadline,
            wcet_table,
            chunk: 0,
        }
    }

    /// Build a task from an explicit thread count, rejecting a WCET table
    /// that does not carry exactly `threads` entries.
    pub fn with_threads(
        name: impl Into<String>,
        period: u64,
        deadline: u64,
        threads: u64,
        wcet_table: Vec<u64>,
    ) -> Result<Self, TaskError> {
        let name = name.into();
        if threads == 0 {
            return Err(TaskError::NoThreads { task: name });
        }
        if wcet_table.len() as u64 != threads {
            return Err(TaskError::WcetCount {
                task: name,
                threads,
                entries: wcet_table.len(),
            });
        }
        Ok(Self::new(name, period, deadline, wcet_table))
    }

    /// Number of threads released with each job.
    pub fn threads(&self) -> u64 {
        self.wcet_table.len() as u64
    }

    /// WCET of `n` threads (1-based).  Returns `0` for a thread count the
    /// table does not cover; validated tasks always cover `1..=threads`.
    pub fn wcet(&self, n: u64) -> u64 {
        n.checked_sub(1)
            .and_then(|i| self.wcet_table.get(i as usize))
            .copied()
            .unwrap_or(0)
    }

    /// WCET of the whole job, `wcet(threads)`.
    pub fn full_wcet(&self) -> u64 {
        self.wcet_table.last().copied().unwrap_or(0)
    }

    /// `deadline <= period`.
    pub fn is_constrained(&self) -> bool {
        self.deadline <= self.period
    }

    /// `wcet(threads) / period`.
    pub fn utilization(&self) -> f64 {
        if self.period == 0 {
            return 0.0;
        }
        self.full_wcet() as f64 / self.period as f64
    }

    /// Demand-bound function: the maximum execution demand of jobs that are
    /// both released and due within any window of length `t`.
    ///
    /// `0` for `t < deadline`, otherwise
    /// `(floor((t - deadline) / period) + 1) * wcet(threads)`.
    pub fn dbf(&self, t: u64) -> u64 {
        if t < self.deadline {
            return 0;
        }
        let jobs = (t - self.deadline)
            .checked_div(self.period)
            .unwrap_or(0)
            .saturating_add(1);
        jobs.saturating_mul(self.full_wcet())
    }

    /// Check the task is well formed.  `require_constrained` additionally
    /// rejects `deadline > period`, which every chunk algorithm needs.
    pub fn validate(&self, require_constrained: bool) -> Result<(), TaskError> {
        if self.wcet_table.is_empty() {
            return Err(TaskError::NoThreads {
                task: self.name.clone(),
            });
        }
        if self.period == 0 {
            return Err(TaskError::ZeroPeriod {
                task: self.name.clone(),
            });
        }
        if self.deadline == 0 {
            return Err(TaskError::ZeroDeadline {
                task: self.name.clone(),
            });
        }
        for (i, pair) in self.wcet_table.windows(2).enumerate() {
            if pair[1] < pair[0] {
                return Err(TaskError::NonMonotonicWcet {
                    task: self.name.clone(),
                    threads: i as u64 + 2,
                    prev: pair[0],
                    next: pair[1],
                });
            }
        }
        if require_constrained && !self.is_constrained() {
            return Err(TaskError::Unconstrained {
                task: self.name.clone(),
                deadline: self.deadline,
                period: self.period,
            });
        }
        Ok(())
    }

    /// Collapse the task to a single thread whose WCET is the full job WCET.
    pub fn merge(&mut self) {
        let full = self.full_wcet();
        self.wcet_table = vec![full];
    }

    /// Split off the threads beyond `keep`.
    ///
    /// `self` keeps `keep` threads (and `wcet(1..=keep)`); the returned task
    /// carries the remaining `threads - keep` threads with
    /// `wcet(1..=threads - keep)` of the current table, the same period and
    /// deadline, and a derived name:
    ///
    /// * `t.1` with 4 threads split at 3 → remainder `t.1-p[1]`
    /// * `t.1-p[3]` split at 1 → remainder `t.1-p[2]`
    ///
    /// The kept part retains its name.
    /// Returns `None` if `keep` is not in `1..threads`.
    pub fn split_off(&mut self, keep: u64) -> Option<Task> {
        let threads = self.threads();
        if keep == 0 || keep >= threads {
            return None;
        }
        let rest = threads - keep;
        let needle = format!("p[{threads}]");
        let name = match self.name.rfind(&needle) {
            Some(pos) => format!("{}p[{rest}]", &self.name[..pos]),
            None => format!("{}-p[{rest}]", self.name),
        };
        let remainder = Task::new(
            name,
            self.period,
            self.deadline,
            self.wcet_table[..rest as usize].to_vec(),
        );
        self.wcet_table.truncate(keep as usize);
        Some(remainder)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(p:{:4}, d:{:4}, m:{:2}) wcet {{",
            self.period,
            self.deadline,
            self.threads()
        )?;
        for (i, w) in self.wcet_table.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{w:4}")?;
        }
        write!(
            f,
            "}} u:{:.3} q:{}, {}",
            self.utilization(),
            self.chunk,
            self.name
        )
    }
}

// ── TaskId ────────────────────────────────────────────────────────────────────

/// Stable handle of a task inside one [`TaskSet`].
///
/// Ids are never reused within a set, so an id held by a deadline bucket
/// keeps pointing at the same task (or at nothing, once removed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ── TaskSet ───────────────────────────────────────────────────────────────────

/// An owning collection of tasks.
///
/// Iteration follows insertion order (ids are allocated increasingly), which
/// keeps analysis logs and split naming reproducible.
#[derive(Debug, Clone, Default)]
pub struct TaskSet {
    tasks: BTreeMap<TaskId, Task>,
    next_id: u64,
}

impl TaskSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `task` and return its id.
    pub fn add(&mut self, task: Task) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.tasks.insert(id, task);
        id
    }

    /// Remove and return the task with `id`.
    pub fn remove(&mut self, id: TaskId) -> Option<Task> {
        self.tasks.remove(&id)
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(&id)
    }

    pub fn get_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        self.tasks.get_mut(&id)
    }

    /// First task named `name`.
    pub fn find(&self, name: &str) -> Option<TaskId> {
        self.tasks
            .iter()
            .find(|(_, t)| t.name == name)
            .map(|(&id, _)| id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.tasks.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TaskId, &Task)> {
        self.tasks.iter().map(|(&id, t)| (id, t))
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn tasks_mut(&mut self) -> impl Iterator<Item = &mut Task> {
        self.tasks.values_mut()
    }

    /// Consume the set, yielding tasks in insertion order.
    pub fn into_tasks(self) -> Vec<Task> {
        self.tasks.into_values().collect()
    }

    /// Sum of per-task utilization.
    pub fn utilization(&self) -> f64 {
        self.tasks.values().map(Task::utilization).sum()
    }

    /// Total threads released by one job of every task.
    pub fn threads(&self) -> u64 {
        self.tasks.values().map(Task::threads).sum()
    }

    /// Sum of every task's demand-bound function at `t`.
    pub fn demand(&self, t: u64) -> u64 {
        self.tasks
            .values()
            .fold(0u64, |acc, task| acc.saturating_add(task.dbf(t)))
    }

    /// Largest relative deadline, `0` for an empty set.
    pub fn dmax(&self) -> u64 {
        self.tasks.values().map(|t| t.deadline).max().unwrap_or(0)
    }

    /// Validate every task, requiring constrained deadlines.
    pub fn validate(&self) -> Result<(), TaskError> {
        self.tasks.values().try_for_each(|t| t.validate(true))
    }

    /// A copy of the set in which no task releases more than `max_threads`
    /// threads per job.
    ///
    /// Wider tasks are cut with [`Task::split_off`], `max_threads` threads at
    /// a time, and the pieces follow their origin:
    ///
    /// ```text
    /// max_threads = 3, t.1 with 7 threads
    ///   t.1       3 threads
    ///   t.1-p[4]  3 threads
    ///   t.1-p[1]  1 thread
    /// ```
    ///
    /// A limit of zero divides nothing.  Chunks are not carried over.
    pub fn divide(&self, max_threads: u64) -> TaskSet {
        let mut divided = TaskSet::new();
        for task in self.tasks.values() {
            let mut rest = task.clone();
            rest.chunk = 0;
            while max_threads > 0 {
                let Some(tail) = rest.split_off(max_threads) else {
                    break;
                };
                divided.add(std::mem::replace(&mut rest, tail));
            }
            divided.add(rest);
        }
        divided
    }

    /// One summary row per task, in insertion order.
    pub fn report(&self) -> Vec<TaskRow> {
        self.iter()
            .map(|(id, t)| TaskRow {
                id,
                name: t.name.clone(),
                period: t.period,
                deadline: t.deadline,
                threads: t.threads(),
                wcet: t.full_wcet(),
                utilization: t.utilization(),
                chunk: t.chunk,
            })
            .collect()
    }
}

/// A task summarised for tabular output; see [`TaskSet::report`].
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRow {
    pub id: TaskId,
    pub name: String,
    pub period: u64,
    pub deadline: u64,
    pub threads: u64,
    /// `wcet(threads)`.
    pub wcet: u64,
    pub utilization: f64,
    pub chunk: u64,
}

impl TaskRow {
    /// Column titles aligned with the [`Display`](fmt::Display) output.
    pub fn header() -> String {
        format!(
            "{:>5} {:<16} {:>6} {:>6} {:>3} {:>6} {:>6} {:>6}",
            "id", "name", "period", "dl", "m", "wcet", "util", "chunk"
        )
    }
}

impl fmt::Display for TaskRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>5} {:<16} {:6} {:6} {:3} {:6} {:6.3} {:6}",
            self.id.to_string(),
            self.name,
            self.period,
            self.deadline,
            self.threads,
            self.wcet,
            self.utilization,
            self.chunk
        )
    }
}

impl FromIterator<Task> for TaskSet {
    fn from_iter<I: IntoIterator<Item = Task>>(iter: I) -> Self {
        let mut set = TaskSet::new();
        for task in iter {
            set.add(task);
        }
        set
    }
}

impl fmt::Display for TaskSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, task) in self.tasks.values().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}: {}", i + 1, task)?;
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn single(period: u64, deadline: u64, wcet: u64) -> Task {
        Task::new("t", period, deadline, vec![wcet])
    }

    // ── Task ──────────────────────────────────────────────────────────────────

    #[test]
    fn wcet_is_one_based() {
        let t = Task::new("t.1", 30, 30, vec![10, 15, 17]);
        assert_eq!(t.threads(), 3);
        assert_eq!(t.wcet(1), 10);
        assert_eq!(t.wcet(3), 17);
        assert_eq!(t.wcet(0), 0);
        assert_eq!(t.wcet(4), 0);
        assert_eq!(t.full_wcet(), 17);
    }

    #[test]
    fn with_threads_rejects_missing_wcet_entries() {
        let err = Task::with_threads("t.1", 30, 30, 3, vec![8, 13]).unwrap_err();
        assert!(matches!(err, TaskError::WcetCount { threads: 3, entries: 2, .. }));
        let err = Task::with_threads("t.1", 30, 30, 0, vec![]).unwrap_err();
        assert!(matches!(err, TaskError::NoThreads { .. }));
    }

    #[test]
    fn utilization_uses_full_wcet() {
        let t = Task::new("t.1", 30, 30, vec![8, 13]);
        assert!((t.utilization() - 13.0 / 30.0).abs() < 1e-12);
    }

    #[test]
    fn dbf_equals_wcet_exactly_at_deadline() {
        let t = single(10, 4, 2);
        assert_eq!(t.dbf(3), 0);
        assert_eq!(t.dbf(4), 2);
        assert_eq!(t.dbf(13), 2);
        assert_eq!(t.dbf(14), 4);
        assert_eq!(t.dbf(24), 6);
    }

    #[test]
    fn dbf_is_non_decreasing() {
        let t = Task::new("t", 7, 5, vec![2, 3]);
        let mut prev = 0;
        for time in 0..200 {
            let d = t.dbf(time);
            assert!(d >= prev, "dbf decreased at t={time}");
            prev = d;
        }
    }

    #[test]
    fn validate_reports_each_malformation() {
        assert!(matches!(
            Task::new("a", 10, 10, vec![]).validate(true),
            Err(TaskError::NoThreads { .. })
        ));
        assert!(matches!(
            Task::new("b", 0, 10, vec![1]).validate(false),
            Err(TaskError::ZeroPeriod { .. })
        ));
        assert!(matches!(
            Task::new("c", 10, 10, vec![5, 4]).validate(true),
            Err(TaskError::NonMonotonicWcet { threads: 2, prev: 5, next: 4, .. })
        ));
        assert!(matches!(
            Task::new("d", 10, 12, vec![1]).validate(true),
            Err(TaskError::Unconstrained { .. })
        ));
        assert!(Task::new("d", 10, 12, vec![1]).validate(false).is_ok());
    }

    #[test]
    fn merge_keeps_full_wcet_on_one_thread() {
        let mut t = Task::new("t.1", 30, 30, vec![8, 13]);
        t.merge();
        assert_eq!(t.threads(), 1);
        assert_eq!(t.wcet(1), 13);
    }

    #[test]
    fn split_off_names_the_remainder() {
        let mut t = Task::new("t.1", 30, 30, vec![4, 6, 8, 10]);
        let rest = t.split_off(3).unwrap();
        assert_eq!(t.name, "t.1");
        assert_eq!(t.wcet_table, vec![4, 6, 8]);
        assert_eq!(rest.name, "t.1-p[1]");
        assert_eq!(rest.wcet_table, vec![4]);
        assert_eq!(rest.period, 30);
        assert_eq!(rest.deadline, 30);
    }

    #[test]
    fn split_off_of_a_remainder_rewrites_its_suffix() {
        let mut t = Task::new("t.1-p[3]", 30, 30, vec![4, 6, 8]);
        let rest = t.split_off(1).unwrap();
        assert_eq!(t.name, "t.1-p[3]");
        assert_eq!(t.threads(), 1);
        assert_eq!(rest.name, "t.1-p[2]");
    }

    #[test]
    fn split_off_rejects_out_of_range_keep() {
        let mut t = Task::new("t", 30, 30, vec![4, 6]);
        assert!(t.split_off(0).is_none());
        assert!(t.split_off(2).is_none());
        assert_eq!(t.threads(), 2);
    }

    // ── divide ────────────────────────────────────────────────────────────────

    #[test]
    fn divide_caps_threads_per_task() {
        let ts: TaskSet = vec![
            Task::new("t.1", 30, 30, vec![2, 4, 6, 8, 10, 12, 14]),
            Task::new("t.2", 20, 15, vec![3, 5]),
        ]
        .into_iter()
        .collect();
        let divided = ts.divide(3);

        let pieces: Vec<(&str, &[u64])> = divided
            .tasks()
            .map(|t| (t.name.as_str(), t.wcet_table.as_slice()))
            .collect();
        assert_eq!(
            pieces,
            vec![
                ("t.1", &[2, 4, 6][..]),
                ("t.1-p[4]", &[2, 4, 6][..]),
                ("t.1-p[1]", &[2][..]),
                ("t.2", &[3, 5][..]),
            ]
        );
        assert_eq!(divided.threads(), ts.threads());
        assert!(divided
            .tasks()
            .filter(|t| t.name.starts_with("t.1"))
            .all(|t| t.period == 30 && t.deadline == 30));
        assert!(divided.validate().is_ok());
        // The input is left alone.
        assert_eq!(ts.len(), 2);
    }

    #[test]
    fn zero_or_wide_limit_leaves_tasks_whole() {
        let mut ts: TaskSet = vec![Task::new("t.1", 30, 30, vec![4, 6])].into_iter().collect();
        for task in ts.tasks_mut() {
            task.chunk = 6;
        }
        for limit in [0, 2, 5] {
            let divided = ts.divide(limit);
            assert_eq!(divided.len(), 1);
            let task = divided.tasks().next().unwrap();
            assert_eq!(task.wcet_table, vec![4, 6]);
            assert_eq!(task.chunk, 0);
        }
    }

    #[test]
    fn divide_to_single_threads() {
        let ts: TaskSet = vec![Task::new("t.1", 30, 30, vec![4, 6, 8])].into_iter().collect();
        let names: Vec<String> = ts.divide(1).tasks().map(|t| t.name.clone()).collect();
        assert_eq!(names, vec!["t.1", "t.1-p[2]", "t.1-p[1]"]);
    }

    #[test]
    fn report_rows_line_up_with_header() {
        let mut ts: TaskSet = vec![
            Task::new("t.1", 30, 30, vec![8, 13]),
            Task::new("t.2", 30, 30, vec![5]),
        ]
        .into_iter()
        .collect();
        ts.tasks_mut().for_each(|t| t.chunk = t.full_wcet());

        let rows = ts.report();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "t.1");
        assert_eq!(rows[0].threads, 2);
        assert_eq!(rows[0].wcet, 13);
        assert_eq!(rows[1].chunk, 5);
        assert_eq!(
            rows[1].to_string(),
            "   #1 t.2                  30     30   1      5  0.167      5"
        );
        assert_eq!(TaskRow::header().len(), rows[0].to_string().len());
    }

    #[test]
    fn display_renders_table_row() {
        let mut t = Task::new("t.2", 30, 30, vec![5]);
        t.chunk = 5;
        assert_eq!(t.to_string(), "(p:  30, d:  30, m: 1) wcet {   5} u:0.167 q:5, t.2");
    }

    // ── TaskSet ───────────────────────────────────────────────────────────────

    #[test]
    fn add_remove_preserves_other_ids() {
        let mut ts = TaskSet::new();
        let a = ts.add(single(8, 8, 2));
        let b = ts.add(single(10, 4, 2));
        assert_eq!(ts.len(), 2);
        let removed = ts.remove(a).unwrap();
        assert_eq!(removed.period, 8);
        assert!(ts.get(a).is_none());
        assert_eq!(ts.get(b).unwrap().deadline, 4);
        let c = ts.add(single(5, 5, 1));
        assert_ne!(a, c, "ids are never reused");
    }

    #[test]
    fn aggregate_quantities() {
        let ts: TaskSet = vec![single(8, 8, 2), single(10, 4, 2)].into_iter().collect();
        assert!((ts.utilization() - 0.45).abs() < 1e-12);
        assert_eq!(ts.dmax(), 8);
        assert_eq!(ts.demand(4), 2);
        assert_eq!(ts.demand(8), 4);
        assert_eq!(ts.demand(14), 6);
        assert_eq!(ts.threads(), 2);
    }

    #[test]
    fn find_by_name() {
        let mut ts = TaskSet::new();
        ts.add(Task::new("x", 10, 10, vec![1]));
        let y = ts.add(Task::new("y", 10, 10, vec![1]));
        assert_eq!(ts.find("y"), Some(y));
        assert_eq!(ts.find("z"), None);
    }
}
