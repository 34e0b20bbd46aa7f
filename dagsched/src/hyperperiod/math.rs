/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Pure arithmetic helpers: GCD, checked LCM and checked ceiling division.
//!
//! Free functions so they can be tested independently of [`TaskSet`].
//!
//! [`TaskSet`]: crate::task::TaskSet

use super::HorizonError;

/// Iterative Euclidean GCD.  `gcd(0, x) == x`.
pub fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

/// Checked LCM: returns `Err(HorizonError::Overflow { a, b })` if the result
/// would not fit in a `u64`.
///
/// Divides before multiplying, `(a / gcd(a, b)) * b`, and checks the final
/// multiplication.  Returns `Ok(0)` when either input is `0`.
pub fn lcm(a: u64, b: u64) -> Result<u64, HorizonError> {
    if a == 0 || b == 0 {
        return Ok(0);
    }

    let reduced = a / gcd(a, b);

    reduced
        .checked_mul(b)
        .ok_or(HorizonError::Overflow { a, b })
}

/// Reduce a sequence of periods to their overall LCM.
///
/// Returns `Ok(0)` for an empty sequence and `Err` on the first partial LCM
/// that overflows.
pub fn lcm_all<I>(periods: I) -> Result<u64, HorizonError>
where
    I: IntoIterator<Item = u64>,
{
    let mut iter = periods.into_iter();
    let Some(first) = iter.next() else {
        return Ok(0);
    };
    iter.try_fold(first, lcm)
}

/// `ceil(num / den)` over `u128`.  `den` must be non-zero.
pub(crate) fn div_ceil_u128(num: u128, den: u128) -> u128 {
    let q = num / den;
    if num % den == 0 {
        q
    } else {
        q + 1
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
