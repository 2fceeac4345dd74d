//! Reductions and special functions, generic over [`Scalar`].
//!
//! With `T = Var` these record through the elementary operations (or a single
//! n-ary statement where [`Scalar::sum`] / [`Scalar::dot`] allow it); with
//! `T = Fvar<_>` they propagate tangents.

use crate::error::MathError;
use crate::matrix::check::{check_matching_sizes, check_nonzero_size};
use crate::scalar::Scalar;

// ── Reductions ──

pub fn sum<T: Scalar>(xs: &[T]) -> T {
    T::sum(xs)
}

/// Product of the entries; `1` for an empty slice.
pub fn prod<T: Scalar>(xs: &[T]) -> T {
    xs.iter().fold(T::one(), |acc, &x| acc * x)
}

pub fn mean<T: Scalar>(xs: &[T]) -> Result<T, MathError> {
    check_nonzero_size("mean", "x", xs.len())?;
    Ok(T::sum(xs) / T::from_f(xs.len() as f64))
}

/// Sample variance (denominator `n - 1`); `0` for a single entry.
pub fn variance<T: Scalar>(xs: &[T]) -> Result<T, MathError> {
    check_nonzero_size("variance", "x", xs.len())?;
    if xs.len() == 1 {
        return Ok(T::zero());
    }
    let mean = T::sum(xs) / T::from_f(xs.len() as f64);
    let centered: Vec<T> = xs.iter().map(|&x| x - mean).collect();
    Ok(T::dot(&centered, &centered) / T::from_f((xs.len() - 1) as f64))
}

/// Sample standard deviation; `0` for a single entry.
pub fn sd<T: Scalar>(xs: &[T]) -> Result<T, MathError> {
    check_nonzero_size("sd", "x", xs.len())?;
    if xs.len() == 1 {
        return Ok(T::zero());
    }
    Ok(variance(xs)?.sqrt())
}

/// Smallest entry; `+inf` (a constant) for an empty slice. NaN entries lose.
pub fn min<T: Scalar>(xs: &[T]) -> T {
    xs.iter()
        .copied()
        .fold(T::from_f(f64::INFINITY), |acc, x| acc.min(x))
}

/// Largest entry; `-inf` (a constant) for an empty slice. NaN entries lose.
pub fn max<T: Scalar>(xs: &[T]) -> T {
    xs.iter()
        .copied()
        .fold(T::from_f(f64::NEG_INFINITY), |acc, x| acc.max(x))
}

pub fn dot_self<T: Scalar>(v: &[T]) -> T {
    T::dot(v, v)
}

pub fn squared_distance<T: Scalar>(a: &[T], b: &[T]) -> Result<T, MathError> {
    check_matching_sizes("squared_distance", "a", a.len(), "b", b.len())?;
    let diff: Vec<T> = a.iter().zip(b).map(|(&x, &y)| x - y).collect();
    Ok(T::dot(&diff, &diff))
}

pub fn distance<T: Scalar>(a: &[T], b: &[T]) -> Result<T, MathError> {
    check_matching_sizes("distance", "a", a.len(), "b", b.len())?;
    Ok(squared_distance(a, b)?.sqrt())
}

/// `ln Σ exp(xᵢ)`, shifted by the largest primal value for stability.
/// `-inf` for an empty slice.
pub fn log_sum_exp_slice<T: Scalar>(xs: &[T]) -> T {
    let shift = xs
        .iter()
        .map(Scalar::value)
        .fold(f64::NEG_INFINITY, f64::max);
    if shift.is_infinite() {
        return T::from_f(shift);
    }
    let shift = T::from_f(shift);
    let terms: Vec<T> = xs.iter().map(|&x| (x - shift).exp()).collect();
    shift + T::sum(&terms).ln()
}

// ── Special functions ──

#[inline]
pub fn square<T: Scalar>(x: T) -> T {
    x * x
}

/// Logistic sigmoid `1 / (1 + e⁻ˣ)`.
pub fn inv_logit<T: Scalar>(x: T) -> T {
    if x < T::zero() {
        let e = x.exp();
        e / (T::one() + e)
    } else {
        (T::one() + (-x).exp()).recip()
    }
}

/// `ln(u / (1 - u))`.
pub fn logit<T: Scalar>(u: T) -> T {
    (u / (T::one() - u)).ln()
}

/// `ln(1 + eˣ)` without overflow for large `x`.
pub fn log1p_exp<T: Scalar>(x: T) -> T {
    if x > T::zero() {
        x + (-x).exp().ln_1p()
    } else {
        x.exp().ln_1p()
    }
}

/// `ln(eᵃ + eᵇ)`.
pub fn log_sum_exp<T: Scalar>(a: T, b: T) -> T {
    if a.value() == f64::NEG_INFINITY {
        return b;
    }
    if a.value() == f64::INFINITY && b.value() == f64::INFINITY {
        return a;
    }
    if a > b {
        a + log1p_exp(b - a)
    } else {
        b + log1p_exp(a - b)
    }
}

/// `ln(eˣ - eʸ)`: `-inf` when `x == y` is finite, NaN when `x < y`.
pub fn log_diff_exp<T: Scalar>(x: T, y: T) -> T {
    if x <= y {
        let value = if x.value() < f64::INFINITY && x == y {
            f64::NEG_INFINITY
        } else {
            f64::NAN
        };
        return T::from_f(value);
    }
    x + (-(y - x).exp_m1()).ln()
}

/// `ln(θ eᵃ + (1 - θ) eᵇ)`.
pub fn log_mix<T: Scalar>(theta: T, a: T, b: T) -> T {
    log_sum_exp(theta.ln() + a, (-theta).ln_1p() + b)
}

/// `a b + c` as a single operation.
#[inline]
pub fn fma<T: Scalar>(a: T, b: T, c: T) -> T {
    a.mul_add(b, c)
}

/// Positive difference: `a - b` if `a > b`, else a constant `0`.
pub fn fdim<T: Scalar>(a: T, b: T) -> T {
    if a > b {
        a - b
    } else {
        T::zero()
    }
}

/// Heaviside step: constant `0` for `x < 0`, `1` otherwise.
pub fn step<T: Scalar>(x: T) -> T {
    if x < T::zero() {
        T::zero()
    } else {
        T::one()
    }
}
