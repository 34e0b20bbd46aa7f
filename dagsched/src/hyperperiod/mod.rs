/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Hyperperiod and the finite analysis horizon `T*`.
//!
//! The hyperperiod is the LCM of all periods; the demand pattern of a
//! synchronous task set repeats after it.  `T*` bounds the set of absolute
//! deadlines that have to be checked by the demand-bound test:
//!
//! ```text
//! T* = min(H, max(D_max, ceil( U * maxDiff / (1 - U) )))
//! maxDiff = max_i (T_i - D_i)
//! ```
//!
//! Both quantities are computed in exact integer arithmetic.  Every term is
//! scaled by `H` so that `U` becomes an integer over the common denominator
//! `H`; this avoids rounding a value such as `8866.000000001` up to the
//! wrong horizon.
//!
//! Overflow is an error, never a wrapped or zero result.

pub mod math;

use thiserror::Error;
use tracing::debug;

use crate::task::TaskSet;
use math::{div_ceil_u128, lcm_all};

// ── Error type ────────────────────────────────────────────────────────────────

/// Errors raised while computing the hyperperiod or `T*`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HorizonError {
    /// A partial LCM of the periods does not fit in `u64`.
    #[error("LCM overflow computing lcm({a}, {b})")]
    Overflow { a: u64, b: u64 },

    /// An intermediate sum of the `T*` bound left the `u128` range.
    #[error("arithmetic overflow computing {quantity}")]
    Arithmetic { quantity: &'static str },
}

// ── TaskSet horizon quantities ────────────────────────────────────────────────

impl TaskSet {
    /// LCM of all (non-zero) periods.  `Ok(0)` for an empty set.
    ///
    /// # Errors
    /// [`HorizonError::Overflow`] as soon as a partial LCM overflows.
    pub fn hyperperiod(&self) -> Result<u64, HorizonError> {
        lcm_all(self.tasks().map(|t| t.period).filter(|&p| p > 0))
    }

    /// The analysis horizon `T*`.
    ///
    /// Returns `Ok(None)` when the utilization is at least one, where the
    /// `1 / (1 - U)` factor is unbounded.
    pub fn star(&self) -> Result<Option<u64>, HorizonError> {
        if self.is_empty() {
            return Ok(Some(0));
        }
        let scaled = ScaledSet::new(self)?;
        if scaled.util_num >= scaled.hyperperiod as u128 {
            return Ok(None);
        }
        Ok(Some(scaled.star(self.dmax())?))
    }

    /// The horizon every chunk algorithm walks up to.
    ///
    /// Same as [`star`](Self::star) for `U < 1`.  A set with utilization of
    /// exactly one still has a finite horizon, the hyperperiod.  `Ok(None)`
    /// means `U > 1`: the set is overloaded and trivially infeasible.
    pub fn analysis_horizon(&self) -> Result<Option<u64>, HorizonError> {
        if self.is_empty() {
            return Ok(Some(0));
        }
        let scaled = ScaledSet::new(self)?;
        let h = scaled.hyperperiod as u128;
        if scaled.util_num > h {
            return Ok(None);
        }
        if scaled.util_num == h {
            debug!(hyperperiod = scaled.hyperperiod, "U == 1, horizon is the hyperperiod");
            return Ok(Some(scaled.hyperperiod));
        }
        Ok(Some(scaled.star(self.dmax())?))
    }
}

/// Utilization and weighted slack of a task set, scaled by the hyperperiod.
struct ScaledSet {
    hyperperiod: u64,
    /// `U * H`
    util_num: u128,
    /// `max_i (T_i - D_i)`
    max_diff: u64,
}

impl ScaledSet {
    fn new(ts: &TaskSet) -> Result<Self, HorizonError> {
        let hyperperiod = ts.hyperperiod()?;
        let mut util_num: u128 = 0;
        let mut max_diff: u64 = 0;

        for task in ts.tasks().filter(|t| t.period > 0) {
            let jobs = (hyperperiod / task.period) as u128;
            let demand = jobs
                .checked_mul(task.full_wcet() as u128)
                .ok_or(HorizonError::Arithmetic {
                    quantity: "utilization",
                })?;
            util_num = util_num
                .checked_add(demand)
                .ok_or(HorizonError::Arithmetic {
                    quantity: "utilization",
                })?;
            max_diff = max_diff.max(task.period.saturating_sub(task.deadline));
        }

        Ok(Self {
            hyperperiod,
            util_num,
            max_diff,
        })
    }

    /// Requires `util_num < hyperperiod`.
    fn star(&self, dmax: u64) -> Result<u64, HorizonError> {
        let h = self.hyperperiod as u128;
        let slack_num = self
            .util_num
            .checked_mul(self.max_diff as u128)
            .ok_or(HorizonError::Arithmetic {
                quantity: "T* bound",
            })?;
        let bound = div_ceil_u128(slack_num, h - self.util_num);
        let bound = u64::try_from(bound).unwrap_or(u64::MAX);
        let star = self.hyperperiod.min(dmax.max(bound));

        debug!(
            hyperperiod = self.hyperperiod,
            dmax,
            max_diff = self.max_diff,
            bound,
            star,
            "computed analysis horizon T*"
        );
        Ok(star)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
