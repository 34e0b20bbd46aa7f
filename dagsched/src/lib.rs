/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! dagsched – schedulability analysis for multi-threaded and DAG tasks
//!
//! Module layout:
//!
//! ```text
//! lib.rs
//! ├── task          – Task, TaskSet, demand-bound function
//! ├── hyperperiod/  – checked LCM / GCD, hyperperiod, analysis horizon T*
//! ├── deadlines     – absolute deadlines bucketed up to the horizon
//! ├── analysis/     – MaxChunks, fully non-preemptive check, TPJ
//! ├── dag/          – DAG tasks: critical path, collapse, candidates
//! ├── partition/    – best-fit / worst-fit packing, federated system check
//! └── config/       – YAML task set, DAG task set and plan files
//! ```

pub mod analysis;
pub mod config;
pub mod dag;
pub mod deadlines;
pub mod hyperperiod;
pub mod partition;
pub mod task;
