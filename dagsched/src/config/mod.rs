/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Task-set, DAG-task-set and collapse-plan files.
//!
//! The expected YAML structures are:
//! ```yaml
//! tasks:
//!   - name: t.1
//!     period: 30
//!     deadline: 30
//!     wcet: [8, 13]        # wcet(1), wcet(2); threads = length
//! ```
//! ```yaml
//! dag_tasks:
//!   - name: d.1
//!     period: 300
//!     deadline: 300
//!     nodes:
//!       - { name: n0, object: 0, threads: 2, wcet_one: 1, factor: 0.75 }
//!       - { name: n1, object: 0, threads: 4, wcet_one: 2, factor: 0.75 }
//!     edges:
//!       - [n0, n1]
//! ```
//! ```yaml
//! pairs:
//!   - [n1, n3]
//!   - [n4, n5]
//! ```
//!
//! A task may also state `threads`; it must then equal the length of its
//! WCET list.  The mismatch surfaces as a [`TaskError`] inside the returned
//! [`anyhow::Error`], so callers can report it as a malformed input.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dag::{DagNode, DagTask, DagTaskSet};
use crate::task::{Task, TaskError, TaskSet};

// ── Private YAML types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct TaskEntry {
    /// Defaults to `t.<position>`, 1-based.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    period: u64,
    deadline: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    threads: Option<u64>,
    wcet: Vec<u64>,
}

impl TaskEntry {
    fn into_task(self, position: usize) -> Result<Task, TaskError> {
        let name = self.name.unwrap_or_else(|| format!("t.{}", position + 1));
        match self.threads {
            Some(threads) => Task::with_threads(name, self.period, self.deadline, threads, self.wcet),
            None => Ok(Task::new(name, self.period, self.deadline, self.wcet)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DagTaskSetFile {
    dag_tasks: Vec<DagTaskEntry>,
}

#[derive(Debug, Deserialize)]
struct DagTaskEntry {
    name: String,
    period: u64,
    deadline: u64,
    nodes: Vec<NodeEntry>,
    #[serde(default)]
    edges: Vec<(String, String)>,
}

#[derive(Debug, Deserialize)]
struct NodeEntry {
    name: String,
    #[serde(default)]
    object: u64,
    #[serde(default = "default_threads")]
    threads: u64,
    wcet_one: u64,
    #[serde(default)]
    factor: f64,
}

fn default_threads() -> u64 {
    1
}

impl DagTaskEntry {
    fn into_dag_task(self) -> Result<DagTask> {
        let mut task = DagTask::new(self.name, self.period, self.deadline);
        for node in self.nodes {
            task.add_node(DagNode::new(
                node.name,
                node.object,
                node.threads,
                node.wcet_one,
                node.factor,
            ))?;
        }
        for (from, to) in &self.edges {
            task.add_edge_by_name(from, to)?;
        }
        Ok(task)
    }
}

#[derive(Debug, Deserialize)]
struct CollapsePlanFile {
    pairs: Vec<(String, String)>,
}

// ── Task sets ─────────────────────────────────────────────────────────────────

/// Serializable form of a [`TaskSet`].
#[derive(Debug, Serialize, Deserialize)]
pub struct TaskSetFile {
    tasks: Vec<TaskEntry>,
}

impl TaskSetFile {
    /// Snapshot `ts`, tasks in insertion order with explicit names.
    pub fn from_task_set(ts: &TaskSet) -> Self {
        let tasks = ts
            .tasks()
            .map(|t| TaskEntry {
                name: Some(t.name.clone()),
                period: t.period,
                deadline: t.deadline,
                threads: None,
                wcet: t.wcet_table.clone(),
            })
            .collect();
        Self { tasks }
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize task set")
    }

    /// Build the task set.  Stops at the first task whose thread count and
    /// WCET list disagree.
    pub fn into_task_set(self) -> Result<TaskSet, TaskError> {
        self.tasks
            .into_iter()
            .enumerate()
            .map(|(i, entry)| entry.into_task(i))
            .collect()
    }
}

/// Parse a task set from YAML text.
pub fn parse_task_set(content: &str) -> Result<TaskSet> {
    let file: TaskSetFile = serde_yaml::from_str(content).context("Failed to parse task set YAML")?;
    Ok(file.into_task_set()?)
}

/// Load a task set from `path`.
///
/// # Errors
/// Returns an error if the file cannot be read, is not a task-set YAML
/// document, or declares a thread count that does not match its WCET list
/// (a [`TaskError`] that can be recovered with `downcast_ref`).
pub fn load_task_set(path: &Path) -> Result<TaskSet> {
    info!(path = %path.display(), "loading task set");
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot open task set file: {}", path.display()))?;
    let ts = parse_task_set(&content)
        .with_context(|| format!("Invalid task set file: {}", path.display()))?;
    for task in ts.tasks() {
        debug!(
            task = %task.name,
            period = task.period,
            deadline = task.deadline,
            threads = task.threads(),
            "  loaded task"
        );
    }
    info!(tasks = ts.len(), utilization = ts.utilization(), "task set loaded");
    Ok(ts)
}

/// Write `ts` to `path` as YAML.
pub fn save_task_set(path: &Path, ts: &TaskSet) -> Result<()> {
    let yaml = TaskSetFile::from_task_set(ts).to_yaml()?;
    std::fs::write(path, yaml)
        .with_context(|| format!("Cannot write task set file: {}", path.display()))?;
    info!(path = %path.display(), tasks = ts.len(), "task set written");
    Ok(())
}

// ── DAG task sets ─────────────────────────────────────────────────────────────

pub fn parse_dag_task_set(content: &str) -> Result<DagTaskSet> {
    let file: DagTaskSetFile =
        serde_yaml::from_str(content).context("Failed to parse DAG task set YAML")?;
    file.dag_tasks
        .into_iter()
        .map(|entry| {
            let name = entry.name.clone();
            entry
                .into_dag_task()
                .with_context(|| format!("Invalid DAG task '{name}'"))
        })
        .collect()
}

/// Load a DAG task set from `path`.  Node names must be unique within a
/// task and edges must not close a cycle.
pub fn load_dag_task_set(path: &Path) -> Result<DagTaskSet> {
    info!(path = %path.display(), "loading DAG task set");
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot open DAG task set file: {}", path.display()))?;
    let set = parse_dag_task_set(&content)
        .with_context(|| format!("Invalid DAG task set file: {}", path.display()))?;
    for task in set.iter() {
        debug!(
            task = %task.name,
            nodes = task.node_count(),
            edges = task.edge_count(),
            workload = task.workload(),
            cpathlen = task.critical_path_length(),
            "  loaded DAG task"
        );
    }
    info!(tasks = set.len(), "DAG task set loaded");
    Ok(set)
}

// ── Collapse plans ────────────────────────────────────────────────────────────

/// Load the node-name pairs of a collapse plan, in file order.
pub fn load_collapse_plan(path: &Path) -> Result<Vec<(String, String)>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot open collapse plan: {}", path.display()))?;
    let file: CollapsePlanFile = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse collapse plan: {}", path.display()))?;
    debug!(pairs = file.pairs.len(), "collapse plan loaded");
    Ok(file.pairs)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{max_chunks, max_chunks_nonp, tpj, CancelToken, Verdict};
    use crate::dag::SkipReason;
    use crate::partition::{Policy, Strategy};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn yaml_tempfile(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    const ONE_SPLIT: &str = r#"
tasks:
  - name: t.1
    period: 30
    deadline: 30
    wcet: [8, 13]
  - name: t.2
    period: 30
    deadline: 30
    threads: 1
    wcet: [5]
"#;

    const DIAMOND: &str = r#"
dag_tasks:
  - name: d.1
    period: 300
    deadline: 300
    nodes:
      - { name: n0, object: 0, threads: 2, wcet_one: 1, factor: 0.75 }
      - { name: n1, object: 0, threads: 4, wcet_one: 2, factor: 0.75 }
      - { name: n2, object: 0, threads: 6, wcet_one: 3, factor: 0.75 }
      - { name: n3, object: 0, threads: 8, wcet_one: 4, factor: 0.75 }
    edges:
      - [n0, n1]
      - [n0, n2]
      - [n1, n3]
      - [n2, n3]
  - name: single
    period: 10
    deadline: 10
    nodes:
      - { name: only, wcet_one: 3 }
"#;

    // ── task sets ─────────────────────────────────────────────────────────────

    #[test]
    fn load_task_set_file() {
        let f = yaml_tempfile(ONE_SPLIT);
        let ts = load_task_set(f.path()).unwrap();
        assert_eq!(ts.len(), 2);
        let t1 = ts.get(ts.find("t.1").unwrap()).unwrap();
        assert_eq!(t1.threads(), 2);
        assert_eq!(t1.wcet_table, vec![8, 13]);
        assert!((ts.utilization() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn unnamed_tasks_are_numbered() {
        let ts = parse_task_set("tasks:\n  - { period: 8, deadline: 8, wcet: [2] }\n  - { period: 10, deadline: 4, wcet: [2] }\n").unwrap();
        let names: Vec<&str> = ts.tasks().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["t.1", "t.2"]);
    }

    #[test]
    fn thread_count_mismatch_is_a_task_error() {
        let yaml = "tasks:\n  - { name: bad, period: 10, deadline: 10, threads: 3, wcet: [1, 2] }\n";
        let f = yaml_tempfile(yaml);
        let err = load_task_set(f.path()).unwrap_err();
        assert_eq!(
            err.downcast_ref::<TaskError>(),
            Some(&TaskError::WcetCount {
                task: "bad".to_string(),
                threads: 3,
                entries: 2
            })
        );
    }

    #[test]
    fn missing_file_returns_error() {
        assert!(load_task_set(Path::new("/nonexistent/path/tasks.yaml")).is_err());
    }

    #[test]
    fn malformed_yaml_returns_error() {
        let f = yaml_tempfile("this is: not: valid: yaml: content:::");
        assert!(load_task_set(f.path()).is_err());
        assert!(load_dag_task_set(f.path()).is_err());
    }

    #[test]
    fn saved_task_set_loads_back() {
        let mut ts = parse_task_set(ONE_SPLIT).unwrap();
        let id = ts.find("t.1").unwrap();
        let rest = ts.get_mut(id).unwrap().split_off(1).unwrap();
        ts.add(rest);

        let out = NamedTempFile::new().unwrap();
        save_task_set(out.path(), &ts).unwrap();
        let back = load_task_set(out.path()).unwrap();
        let names: Vec<&str> = back.tasks().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["t.1", "t.2", "t.1-p[1]"]);
        assert_eq!(back.threads(), 3);
    }

    #[test]
    fn divided_fixture_saves_and_loads_back() {
        let ts = load_task_set(&fixture("one_split.yaml")).unwrap();
        let out = NamedTempFile::new().unwrap();
        save_task_set(out.path(), &ts.divide(1)).unwrap();

        let back = load_task_set(out.path()).unwrap();
        let names: Vec<&str> = back.tasks().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["t.1", "t.1-p[1]", "t.2"]);
        assert!(back.tasks().all(|t| t.threads() == 1));
        assert_eq!(back.threads(), ts.threads());
    }

    // ── DAG task sets ─────────────────────────────────────────────────────────

    #[test]
    fn load_dag_task_set_file() {
        let f = yaml_tempfile(DIAMOND);
        let set = load_dag_task_set(f.path()).unwrap();
        assert_eq!(set.len(), 2);

        let d1 = set.find("d.1").unwrap();
        assert_eq!(d1.node_count(), 4);
        assert_eq!(d1.edge_count(), 4);
        assert_eq!(d1.workload(), 2 + 7 + 15 + 25);
        assert_eq!(d1.critical_path_length(), 2 + 15 + 25);

        let single = set.find("single").unwrap();
        let only = single.node(single.find("only").unwrap()).unwrap();
        assert_eq!(only.threads(), 1);
        assert_eq!(only.object, 0);
        assert_eq!(only.wcet(), 3);
    }

    #[test]
    fn dag_cycle_is_rejected() {
        let yaml = r#"
dag_tasks:
  - name: loop
    period: 10
    deadline: 10
    nodes:
      - { name: a, wcet_one: 1 }
      - { name: b, wcet_one: 1 }
    edges: [[a, b], [b, a]]
"#;
        let err = parse_dag_task_set(yaml).unwrap_err();
        assert!(format!("{err:#}").contains("loop"));
    }

    #[test]
    fn dag_edge_to_unknown_node_is_rejected() {
        let yaml = r#"
dag_tasks:
  - name: d
    period: 10
    deadline: 10
    nodes:
      - { name: a, wcet_one: 1 }
    edges: [[a, ghost]]
"#;
        assert!(parse_dag_task_set(yaml).is_err());
    }

    // ── collapse plans ────────────────────────────────────────────────────────

    #[test]
    fn load_plan_pairs_in_order() {
        let f = yaml_tempfile("pairs:\n  - [n1, n3]\n  - [n4, n5]\n");
        let plan = load_collapse_plan(f.path()).unwrap();
        assert_eq!(
            plan,
            vec![
                ("n1".to_string(), "n3".to_string()),
                ("n4".to_string(), "n5".to_string())
            ]
        );
    }

    // ── fixtures ──────────────────────────────────────────────────────────────

    fn fixture(name: &str) -> std::path::PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures").join(name)
    }

    #[test]
    fn fixture_one_split_needs_one_division() {
        let mut ts = load_task_set(&fixture("one_split.yaml")).unwrap();
        let verdict = tpj(&mut ts, &CancelToken::new()).unwrap();
        assert_eq!(verdict, Verdict::Feasible);
        assert_eq!(ts.len(), 3);
        assert!(ts.find("t.1-p[1]").is_some());
    }

    #[test]
    fn fixture_baruah_2005() {
        let mut ts = load_task_set(&fixture("baruah-2005.yaml")).unwrap();
        assert_eq!(ts.star().unwrap(), Some(725));
        assert_eq!(max_chunks(&mut ts).unwrap(), Verdict::Feasible);
        assert_eq!(max_chunks_nonp(&mut ts).unwrap(), Verdict::Infeasible);
    }

    #[test]
    fn fixture_improve_runs_whole_jobs() {
        let mut ts = load_task_set(&fixture("improve.yaml")).unwrap();
        assert_eq!(max_chunks_nonp(&mut ts).unwrap(), Verdict::Feasible);
        let mut ts = load_task_set(&fixture("two_task.yaml")).unwrap();
        assert_eq!(tpj(&mut ts, &CancelToken::new()).unwrap(), Verdict::Feasible);
        let mut ts = load_task_set(&fixture("one_task.yaml")).unwrap();
        assert_eq!(max_chunks(&mut ts).unwrap(), Verdict::Feasible);
    }

    #[test]
    fn fixture_diamond_plan() {
        let mut set = load_dag_task_set(&fixture("diamond.yaml")).unwrap();
        let plan = load_collapse_plan(&fixture("diamond-plan.yaml")).unwrap();
        let d1 = set.find_mut("d.1").unwrap();
        let report = d1.apply_collapse_plan(&plan, false).unwrap();
        assert_eq!(report.applied, vec!["n1,n3", "n4,n5"]);
        assert_eq!(
            report.skipped,
            vec![("n0,n1,n3".to_string(), SkipReason::Illegal)]
        );
        assert_eq!(d1.node_count(), 4);
        assert_eq!(d1.workload(), 120);
        assert_eq!(d1.critical_path_length(), 120);
    }

    #[test]
    fn fixture_diamond_needs_preemption_on_two_cores() {
        let set = load_dag_task_set(&fixture("diamond.yaml")).unwrap();
        let cancel = CancelToken::new();
        let preemptive = set
            .schedule(2, Policy::Preemptive, Strategy::BestFit, &cancel)
            .unwrap();
        assert!(preemptive.schedulable());
        assert_eq!(preemptive.m_high, 0);
        let non_preemptive = set
            .schedule(2, Policy::NonPreemptive, Strategy::BestFit, &cancel)
            .unwrap();
        assert!(!non_preemptive.schedulable());
    }
}
