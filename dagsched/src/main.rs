/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use dagsched::analysis::{max_chunks_nonp_with, max_chunks_with, tpj, CancelToken, Verdict};
use dagsched::config::{
    load_collapse_plan, load_dag_task_set, load_task_set, save_task_set, TaskSetFile,
};
use dagsched::dag::CandidateOrder;
use dagsched::partition::{Policy, Strategy, SystemReport};
use dagsched::task::{TaskError, TaskRow, TaskSet};

// ── CLI argument definition ───────────────────────────────────────────────────

/// Schedulability analysis for multi-threaded and DAG real-time tasks.
///
/// Exit status: 0 feasible, 1 infeasible, 2 timeout, 255 (-1) malformed or
/// unreadable input.
///
/// Example:
///   dagsched tpj fixtures/one_split.yaml --timeout-ms 500 --output split.yaml
#[derive(Debug, Parser)]
#[command(name = "dagsched", version, long_about = None)]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Assign maximal non-preemptive chunks (MaxChunks).
    MaxChunks {
        /// Task set YAML file.
        file: PathBuf,
        /// Require every job to run as one chunk.
        #[arg(long)]
        nonp: bool,
        /// Give up after this many milliseconds.
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Thread-per-job analysis; may split tasks.
    Tpj {
        file: PathBuf,
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Write the resulting task set here.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Divide every task into tasks of at most `--max-threads` threads.
    Divide {
        file: PathBuf,
        #[arg(short, long)]
        max_threads: u64,
        /// Write the divided set here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print utilization, hyperperiod, largest deadline and T*.
    Star { file: PathBuf },

    /// Summarise every task of a DAG task set.
    Dag { file: PathBuf },

    /// List legal collapse candidates of one DAG task.
    Candidates {
        file: PathBuf,
        #[arg(short, long)]
        task: String,
        /// arb, maxb or minp.
        #[arg(short, long, default_value = "arb")]
        order: CandidateOrder,
    },

    /// Apply a collapse plan to one DAG task.
    Collapse {
        file: PathBuf,
        #[arg(short, long)]
        task: String,
        /// YAML file with the node pairs to collapse.
        #[arg(short, long)]
        pairs: PathBuf,
        /// Apply legal collapses even when they do not pay off.
        #[arg(long)]
        ignore_benefit: bool,
    },

    /// Federated system check of a DAG task set on `m` cores.
    Sched {
        file: PathBuf,
        #[arg(short, long)]
        m: u32,
        /// Check cores under preemptive EDF instead of TPJ.
        #[arg(long)]
        preemptive: bool,
        #[arg(long)]
        worst_fit: bool,
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    // Level comes from RUST_LOG when set; logs go to stderr so that stdout
    // carries only results.
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let code = match run(cli.command) {
        Ok(code) => code,
        Err(e) => match e.downcast_ref::<TaskError>() {
            Some(task_error) => {
                let verdict = Verdict::Malformed(task_error.clone());
                println!("{verdict}");
                verdict.exit_code()
            }
            None => {
                error!("{:#}", e);
                -1
            }
        },
    };
    process::exit(code);
}

fn run(command: Command) -> Result<i32> {
    match command {
        Command::MaxChunks {
            file,
            nonp,
            timeout_ms,
        } => {
            let mut ts = load_task_set(&file)?;
            let cancel = CancelToken::from_millis(timeout_ms);
            let verdict = if nonp {
                max_chunks_nonp_with(&mut ts, &cancel)?
            } else {
                max_chunks_with(&mut ts, &cancel)?
            };
            finish(&ts, &verdict)
        }

        Command::Tpj {
            file,
            timeout_ms,
            output,
        } => {
            let mut ts = load_task_set(&file)?;
            let verdict = tpj(&mut ts, &CancelToken::from_millis(timeout_ms))?;
            if let Some(path) = output {
                save_task_set(&path, &ts)?;
            }
            finish(&ts, &verdict)
        }

        Command::Divide {
            file,
            max_threads,
            output,
        } => {
            let ts = load_task_set(&file)?;
            if max_threads == 0 {
                warn!("--max-threads is 0, nothing is divided");
            }
            let divided = ts.divide(max_threads);
            info!(
                before = ts.len(),
                after = divided.len(),
                max_threads,
                "task set divided"
            );
            match output {
                Some(path) => save_task_set(&path, &divided)?,
                None => print!("{}", TaskSetFile::from_task_set(&divided).to_yaml()?),
            }
            Ok(0)
        }

        Command::Star { file } => {
            let ts = load_task_set(&file)?;
            let hyperperiod = ts.hyperperiod()?;
            println!("tasks        {}", ts.len());
            println!("utilization  {:.4}", ts.utilization());
            println!("hyperperiod  {hyperperiod}");
            println!("dmax         {}", ts.dmax());
            match ts.star()? {
                Some(star) => println!("T*           {star}"),
                None => println!("T*           undefined (U >= 1)"),
            }
            Ok(0)
        }

        Command::Dag { file } => {
            let set = load_dag_task_set(&file)?;
            println!(
                "{:<12} {:>6} {:>6} {:>5} {:>8} {:>6} {:>6} {:>7} infeas",
                "task", "period", "dl", "nodes", "workload", "cpath", "util", "cores"
            );
            for task in set.iter() {
                println!(
                    "{:<12} {:6} {:6} {:5} {:8} {:6} {:6.3} {:7.3} {}",
                    task.name,
                    task.period,
                    task.deadline,
                    task.node_count(),
                    task.workload(),
                    task.critical_path_length(),
                    task.utilization(),
                    task.core_demand(),
                    if task.is_infeasible() { "yes" } else { "no" }
                );
            }
            info!(utilization = set.utilization(), implicit = set.is_implicit(), "DAG task set");
            Ok(0)
        }

        Command::Candidates { file, task, order } => {
            let set = load_dag_task_set(&file)?;
            let dag = set
                .find(&task)
                .with_context(|| format!("No DAG task '{task}' in {}", file.display()))?;
            println!("{} same-object pairs", dag.count_candidates());
            for cand in dag.order_candidates(order)? {
                println!("{cand}");
            }
            Ok(0)
        }

        Command::Collapse {
            file,
            task,
            pairs,
            ignore_benefit,
        } => {
            let mut set = load_dag_task_set(&file)?;
            let plan = load_collapse_plan(&pairs)?;
            let dag = set
                .find_mut(&task)
                .with_context(|| format!("No DAG task '{task}' in {}", file.display()))?;
            let report = dag.apply_collapse_plan(&plan, ignore_benefit)?;
            for pair in &report.applied {
                println!("collapsed {pair}");
            }
            for (pair, reason) in &report.skipped {
                println!("skipped   {pair}: {reason}");
            }
            println!(
                "{}: nodes {} workload {} cpath {} cores {:.3}",
                dag.name,
                dag.node_count(),
                dag.workload(),
                dag.critical_path_length(),
                dag.core_demand()
            );
            Ok(0)
        }

        Command::Sched {
            file,
            m,
            preemptive,
            worst_fit,
            timeout_ms,
        } => {
            let set = load_dag_task_set(&file)?;
            let policy = if preemptive {
                Policy::Preemptive
            } else {
                Policy::NonPreemptive
            };
            let strategy = if worst_fit {
                Strategy::WorstFit
            } else {
                Strategy::BestFit
            };
            let report = set.schedule(m, policy, strategy, &CancelToken::from_millis(timeout_ms))?;
            println!("{}", SystemReport::HEADER);
            println!("{report}");
            Ok(report.verdict.exit_code())
        }
    }
}

/// Print the task table and the verdict; returns the exit status.
fn finish(ts: &TaskSet, verdict: &Verdict) -> Result<i32> {
    println!("{}", TaskRow::header());
    for row in ts.report() {
        println!("{row}");
    }
    println!("{verdict}");
    Ok(verdict.exit_code())
}
