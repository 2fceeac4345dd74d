use nalgebra::DMatrix;

use super::{accumulate, output_adjoints, saved};
use crate::arena::{Slot, Span};
use crate::error::MathError;
use crate::matrix::check::{check_multiplicable, check_square};
use crate::matrix::{constant_matrix, operand_slots, output_block, value_of, Operand};
use crate::tape::{self, Adjoints, Chainable};
use crate::var::Var;

/// `C = Bᵀ A B` with `A` `m x m` and `B` `m x n`.
struct QuadForm {
    m: usize,
    n: usize,
    a: Span<f64>,
    b: Span<f64>,
    a_refs: Option<Span<Slot>>,
    b_refs: Option<Span<Slot>>,
    c_first: Slot,
}

impl Chainable for QuadForm {
    fn chain(&self, adj: &mut Adjoints<'_>) {
        let adj_c = output_adjoints(adj, self.c_first, self.n, self.n);
        let a = saved(adj, self.a, self.m, self.m);
        let b = saved(adj, self.b, self.m, self.n);
        if let Some(refs) = self.a_refs {
            accumulate(adj, refs, &(&b * &adj_c * b.transpose()));
        }
        if let Some(refs) = self.b_refs {
            let adj_b = &a * &b * adj_c.transpose() + a.transpose() * &b * &adj_c;
            accumulate(adj, refs, &adj_b);
        }
    }
}

/// `tr(Bᵀ A B)`.
struct TraceQuadForm {
    m: usize,
    n: usize,
    a: Span<f64>,
    b: Span<f64>,
    a_refs: Option<Span<Slot>>,
    b_refs: Option<Span<Slot>>,
    out: Slot,
}

impl Chainable for TraceQuadForm {
    fn chain(&self, adj: &mut Adjoints<'_>) {
        let g = adj.adjoint(self.out);
        let b = saved(adj, self.b, self.m, self.n);
        if let Some(refs) = self.a_refs {
            accumulate(adj, refs, &(&b * b.transpose() * g));
        }
        if let Some(refs) = self.b_refs {
            let a = saved(adj, self.a, self.m, self.m);
            accumulate(adj, refs, &((&a + a.transpose()) * &b * g));
        }
    }
}

/// `tr(D Bᵀ A B)` with `D` `n x n`.
struct TraceGenQuadForm {
    m: usize,
    n: usize,
    d: Span<f64>,
    a: Span<f64>,
    b: Span<f64>,
    d_refs: Option<Span<Slot>>,
    a_refs: Option<Span<Slot>>,
    b_refs: Option<Span<Slot>>,
    out: Slot,
}

impl Chainable for TraceGenQuadForm {
    fn chain(&self, adj: &mut Adjoints<'_>) {
        let g = adj.adjoint(self.out);
        let d = saved(adj, self.d, self.n, self.n);
        let a = saved(adj, self.a, self.m, self.m);
        let b = saved(adj, self.b, self.m, self.n);
        if let Some(refs) = self.d_refs {
            accumulate(adj, refs, &(b.transpose() * a.transpose() * &b * g));
        }
        if let Some(refs) = self.a_refs {
            accumulate(adj, refs, &(&b * d.transpose() * b.transpose() * g));
        }
        if let Some(refs) = self.b_refs {
            let adj_b = &a * &b * &d + a.transpose() * &b * d.transpose();
            accumulate(adj, refs, &(adj_b * g));
        }
    }
}

fn check_quad_form<TA: Operand, TB: Operand>(
    function: &'static str,
    a: &DMatrix<TA>,
    b: &DMatrix<TB>,
) -> Result<(), MathError> {
    check_square(function, "A", a)?;
    check_multiplicable(function, "A", a.ncols(), "B", b.nrows())
}

/// `Bᵀ A B`.
pub fn quad_form<TA: Operand, TB: Operand>(
    a: &DMatrix<TA>,
    b: &DMatrix<TB>,
) -> Result<DMatrix<Var>, MathError> {
    check_quad_form("quad_form", a, b)?;
    let (av, bv) = (value_of(a), value_of(b));
    let c = bv.transpose() * &av * &bv;
    if !TA::DIFFERENTIABLE && !TB::DIFFERENTIABLE {
        return Ok(constant_matrix(&c));
    }
    let (m, n) = bv.shape();
    tracing::trace!(m, n, "recording quadratic form");
    Ok(tape::with_active_tape(|t| {
        let a_span = t.arena_mut().alloc_values(av.as_slice());
        let b_span = t.arena_mut().alloc_values(bv.as_slice());
        let a_refs = operand_slots(t, a);
        let b_refs = operand_slots(t, b);
        let (c_first, out) = output_block(t, &c);
        t.push_node(Box::new(QuadForm {
            m,
            n,
            a: a_span,
            b: b_span,
            a_refs,
            b_refs,
            c_first,
        }));
        out
    }))
}

/// `tr(Bᵀ A B)`.
pub fn trace_quad_form<TA: Operand, TB: Operand>(
    a: &DMatrix<TA>,
    b: &DMatrix<TB>,
) -> Result<Var, MathError> {
    check_quad_form("trace_quad_form", a, b)?;
    let (av, bv) = (value_of(a), value_of(b));
    let value = (bv.transpose() * &av * &bv).trace();
    if !TA::DIFFERENTIABLE && !TB::DIFFERENTIABLE {
        return Ok(Var::constant(value));
    }
    let (m, n) = bv.shape();
    tracing::trace!(m, n, "recording trace of quadratic form");
    Ok(tape::with_active_tape(|t| {
        let a_span = t.arena_mut().alloc_values(av.as_slice());
        let b_span = t.arena_mut().alloc_values(bv.as_slice());
        let a_refs = operand_slots(t, a);
        let b_refs = operand_slots(t, b);
        let out = t.push_outputs(&[value]);
        t.push_node(Box::new(TraceQuadForm {
            m,
            n,
            a: a_span,
            b: b_span,
            a_refs,
            b_refs,
            out,
        }));
        t.handle(value, out)
    }))
}

/// `tr(D Bᵀ A B)`.
pub fn trace_gen_quad_form<TD: Operand, TA: Operand, TB: Operand>(
    d: &DMatrix<TD>,
    a: &DMatrix<TA>,
    b: &DMatrix<TB>,
) -> Result<Var, MathError> {
    check_square("trace_gen_quad_form", "D", d)?;
    check_quad_form("trace_gen_quad_form", a, b)?;
    check_multiplicable("trace_gen_quad_form", "B", b.ncols(), "D", d.nrows())?;
    let (dv, av, bv) = (value_of(d), value_of(a), value_of(b));
    let value = (&dv * bv.transpose() * &av * &bv).trace();
    if !TD::DIFFERENTIABLE && !TA::DIFFERENTIABLE && !TB::DIFFERENTIABLE {
        return Ok(Var::constant(value));
    }
    let (m, n) = bv.shape();
    tracing::trace!(m, n, "recording generalized trace of quadratic form");
    Ok(tape::with_active_tape(|t| {
        let d_span = t.arena_mut().alloc_values(dv.as_slice());
        let a_span = t.arena_mut().alloc_values(av.as_slice());
        let b_span = t.arena_mut().alloc_values(bv.as_slice());
        let d_refs = operand_slots(t, d);
        let a_refs = operand_slots(t, a);
        let b_refs = operand_slots(t, b);
        let out = t.push_outputs(&[value]);
        t.push_node(Box::new(TraceGenQuadForm {
            m,
            n,
            d: d_span,
            a: a_span,
            b: b_span,
            d_refs,
            a_refs,
            b_refs,
            out,
        }));
        t.handle(value, out)
    }))
}
