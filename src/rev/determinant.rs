use nalgebra::DMatrix;

use super::{accumulate, saved};
use crate::arena::{Slot, Span};
use crate::error::MathError;
use crate::matrix::check::check_square;
use crate::matrix::linalg::Lu;
use crate::matrix::{value_of, Operand};
use crate::tape::{self, Adjoints, Chainable};
use crate::var::Var;

/// `d det(A) / dA = det(A) A⁻ᵀ`; the inverse is formed during the sweep.
struct Determinant {
    m: usize,
    a: Span<f64>,
    det: f64,
    a_refs: Span<Slot>,
    out: Slot,
}

impl Chainable for Determinant {
    fn chain(&self, adj: &mut Adjoints<'_>) {
        let g = adj.adjoint(self.out);
        let a = saved(adj, self.a, self.m, self.m);
        let inv_t = Lu::factor(&a).inverse().transpose();
        accumulate(adj, self.a_refs, &(inv_t * (g * self.det)));
    }
}

/// `d ln|det A| / dA = A⁻ᵀ`, saved at construction.
struct LogDeterminant {
    inv_t: Span<f64>,
    a_refs: Span<Slot>,
    out: Slot,
}

impl Chainable for LogDeterminant {
    fn chain(&self, adj: &mut Adjoints<'_>) {
        let g = adj.adjoint(self.out);
        let inv_t = adj.values(self.inv_t);
        let refs = adj.slots(self.a_refs);
        for (&slot, &w) in refs.iter().zip(inv_t) {
            adj.accumulate(slot, g * w);
        }
    }
}

pub fn determinant<TA: Operand>(a: &DMatrix<TA>) -> Result<Var, MathError> {
    check_square("determinant", "A", a)?;
    let values = value_of(a);
    let det = Lu::factor(&values).determinant();
    if !TA::DIFFERENTIABLE {
        return Ok(Var::constant(det));
    }
    tracing::trace!(m = a.nrows(), "recording determinant");
    Ok(tape::with_active_tape(|t| {
        let a_span = t.arena_mut().alloc_values(values.as_slice());
        let a_refs = t.arena_mut().alloc_slots(a.iter().map(Operand::slot));
        let out = t.push_outputs(&[det]);
        t.push_node(Box::new(Determinant {
            m: a.nrows(),
            a: a_span,
            det,
            a_refs,
            out,
        }));
        t.handle(det, out)
    }))
}

/// `ln |det A|`.
pub fn log_determinant<TA: Operand>(a: &DMatrix<TA>) -> Result<Var, MathError> {
    check_square("log_determinant", "A", a)?;
    let lu = Lu::factor(&value_of(a));
    let value = lu.log_abs_determinant();
    if !TA::DIFFERENTIABLE {
        return Ok(Var::constant(value));
    }
    tracing::trace!(m = a.nrows(), "recording log-determinant");
    let inv_t = lu.inverse().transpose();
    Ok(tape::with_active_tape(|t| {
        let inv_t = t.arena_mut().alloc_values(inv_t.as_slice());
        let a_refs = t.arena_mut().alloc_slots(a.iter().map(Operand::slot));
        let out = t.push_outputs(&[value]);
        t.push_node(Box::new(LogDeterminant { inv_t, a_refs, out }));
        t.handle(value, out)
    }))
}
