/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Errors of the chunk-assignment passes.
//!
//! An infeasible task set or an expired budget is a [`Verdict`], not an
//! error.  Only conditions that prevent the analysis from producing any
//! answer end up here.
//!
//! [`Verdict`]: super::Verdict

use thiserror::Error;

use crate::hyperperiod::HorizonError;
use crate::task::TaskId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    /// The hyperperiod or `T*` could not be represented.
    #[error("analysis horizon: {0}")]
    Horizon(#[from] HorizonError),

    /// A deadline bucket refers to a task that is no longer in the set.
    #[error("deadline list refers to unknown task {id}")]
    UnknownTask { id: TaskId },

    #[error("cannot keep {keep} of {threads} thread(s) of task '{task}'")]
    InvalidSplit { task: String, keep: u64, threads: u64 },
}
