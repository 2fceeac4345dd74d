//! Independent gradient evaluations on rayon worker threads.
//!
//! Tapes are thread-local, so every worker records into its own tape and no
//! synchronisation is needed. `f` only has to be `Sync`; the `Var`s it sees
//! never leave the worker that created them.

use rayon::prelude::*;

use crate::api;
use crate::fvar::Fvar;
use crate::var::Var;

/// `(f(x), ∇f(x))` at each input point, evaluated in parallel.
pub fn gradients_par<F>(f: F, inputs: &[&[f64]]) -> Vec<(f64, Vec<f64>)>
where
    F: Fn(&[Var]) -> Var + Sync,
{
    inputs.par_iter().map(|x| api::gradient(&f, x)).collect()
}

/// Hessian at each input point, evaluated in parallel.
///
/// Returns `(value, gradient, hessian)` for each input point.
#[allow(clippy::type_complexity)]
pub fn hessians_par<F>(f: F, inputs: &[&[f64]]) -> Vec<(f64, Vec<f64>, Vec<Vec<f64>>)>
where
    F: Fn(&[Fvar<Var>]) -> Fvar<Var> + Sync,
{
    inputs.par_iter().map(|x| api::hessian(&f, x)).collect()
}
