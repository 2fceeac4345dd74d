use nalgebra::DMatrix;

use super::dot_product::columns_dot_product;
use super::ldlt::{ldlt_solve, LdltFactor};
use super::{accumulate, saved};
use crate::arena::{Slot, Span};
use crate::error::MathError;
use crate::matrix::check::{check_multiplicable, check_square};
use crate::matrix::{operand_slots, value_of, Operand};
use crate::scalar::Scalar;
use crate::tape::{self, Adjoints, Chainable};
use crate::var::Var;

/// `tr(Bᵀ A⁻¹ B)`; keeps `X = A⁻¹ B`, which is all both adjoints need.
struct TraceInvQuadForm {
    m: usize,
    n: usize,
    x: Span<f64>,
    a_refs: Option<Span<Slot>>,
    b_refs: Option<Span<Slot>>,
    out: Slot,
}

impl Chainable for TraceInvQuadForm {
    fn chain(&self, adj: &mut Adjoints<'_>) {
        let g = adj.adjoint(self.out);
        let x = saved(adj, self.x, self.m, self.n);
        if let Some(refs) = self.a_refs {
            accumulate(adj, refs, &(&x * x.transpose() * -g));
        }
        if let Some(refs) = self.b_refs {
            accumulate(adj, refs, &(&x * (2.0 * g)));
        }
    }
}

/// `tr(Bᵀ A⁻¹ B)` with `A` given by its LDLᵀ factor.
pub fn trace_inv_quad_form_ldlt<TA: Operand, TB: Operand>(
    a: &LdltFactor<TA>,
    b: &DMatrix<TB>,
) -> Result<Var, MathError> {
    check_multiplicable("trace_inv_quad_form_ldlt", "A", a.cols(), "B", b.nrows())?;
    let bv = value_of(b);
    let x = a.solve(&bv);
    let value = bv.dot(&x);
    if !TA::DIFFERENTIABLE && !TB::DIFFERENTIABLE {
        return Ok(Var::constant(value));
    }
    let (m, n) = x.shape();
    tracing::trace!(m, n, "recording trace of inverse quadratic form");
    Ok(tape::with_active_tape(|t| {
        let x_span = t.arena_mut().alloc_values(x.as_slice());
        let a_refs = operand_slots(t, a.matrix());
        let b_refs = operand_slots(t, b);
        let out = t.push_outputs(&[value]);
        t.push_node(Box::new(TraceInvQuadForm {
            m,
            n,
            x: x_span,
            a_refs,
            b_refs,
            out,
        }));
        t.handle(value, out)
    }))
}

/// `tr(D Bᵀ A⁻¹ B)` with `A` given by its LDLᵀ factor.
///
/// Composed from an LDLT solve, a product and a column-wise dot product, so
/// its adjoints come from those nodes.
pub fn trace_gen_inv_quad_form_ldlt<TD: Operand, TA: Operand, TB: Operand>(
    d: &DMatrix<TD>,
    a: &LdltFactor<TA>,
    b: &DMatrix<TB>,
) -> Result<Var, MathError> {
    const FUNCTION: &str = "trace_gen_inv_quad_form_ldlt";
    check_square(FUNCTION, "D", d)?;
    check_multiplicable(FUNCTION, "A", a.cols(), "B", b.nrows())?;
    check_multiplicable(FUNCTION, "B", b.ncols(), "D", d.nrows())?;

    // tr(D M) = sum_j (column j of Dᵀ) . (column j of M), with M = Bᵀ A⁻¹ B
    let x = ldlt_solve(a, b, FUNCTION)?;
    let m = super::multiply(&b.transpose(), &x)?;
    let diag = columns_dot_product(&d.transpose(), &m)?;
    Ok(<Var as Scalar>::sum(diag.as_slice()))
}
