use nalgebra::DMatrix;

use super::{accumulate, output_adjoints, saved};
use crate::arena::{Slot, Span};
use crate::error::MathError;
use crate::matrix::check::{check_multiplicable, check_pos_definite, check_square};
use crate::matrix::linalg::cholesky_solve;
use crate::matrix::{constant_matrix, operand_slots, output_block, value_of, Operand};
use crate::tape::{self, Adjoints, Chainable};
use crate::var::Var;

struct MdivideLeftSpdVv {
    m: usize,
    n: usize,
    l: Span<f64>,
    c: Span<f64>,
    a_refs: Span<Slot>,
    b_refs: Span<Slot>,
    c_first: Slot,
}

impl Chainable for MdivideLeftSpdVv {
    fn chain(&self, adj: &mut Adjoints<'_>) {
        let adj_c = output_adjoints(adj, self.c_first, self.m, self.n);
        let l = saved(adj, self.l, self.m, self.m);
        let adj_b = cholesky_solve(&l, &adj_c);
        let c = saved(adj, self.c, self.m, self.n);
        let adj_a = -(&adj_b * c.transpose());
        accumulate(adj, self.a_refs, &adj_a);
        accumulate(adj, self.b_refs, &adj_b);
    }
}

struct MdivideLeftSpdVd {
    m: usize,
    n: usize,
    l: Span<f64>,
    c: Span<f64>,
    a_refs: Span<Slot>,
    c_first: Slot,
}

impl Chainable for MdivideLeftSpdVd {
    fn chain(&self, adj: &mut Adjoints<'_>) {
        let adj_c = output_adjoints(adj, self.c_first, self.m, self.n);
        let l = saved(adj, self.l, self.m, self.m);
        let c = saved(adj, self.c, self.m, self.n);
        let adj_a = -(cholesky_solve(&l, &adj_c) * c.transpose());
        accumulate(adj, self.a_refs, &adj_a);
    }
}

struct MdivideLeftSpdDv {
    m: usize,
    n: usize,
    l: Span<f64>,
    b_refs: Span<Slot>,
    c_first: Slot,
}

impl Chainable for MdivideLeftSpdDv {
    fn chain(&self, adj: &mut Adjoints<'_>) {
        let adj_c = output_adjoints(adj, self.c_first, self.m, self.n);
        let l = saved(adj, self.l, self.m, self.m);
        accumulate(adj, self.b_refs, &cholesky_solve(&l, &adj_c));
    }
}

/// Solve `A C = B` for symmetric positive-definite `A` via Cholesky.
///
/// Fails with [`MathError::Domain`] when `A` is not symmetric (to within an
/// absolute `1e-8`) or not positive definite.
pub fn mdivide_left_spd<TA: Operand, TB: Operand>(
    a: &DMatrix<TA>,
    b: &DMatrix<TB>,
) -> Result<DMatrix<Var>, MathError> {
    spd_solve(a, b, "mdivide_left_spd")
}

pub(crate) fn spd_solve<TA: Operand, TB: Operand>(
    a: &DMatrix<TA>,
    b: &DMatrix<TB>,
    function: &'static str,
) -> Result<DMatrix<Var>, MathError> {
    check_square(function, "A", a)?;
    check_multiplicable(function, "A", a.ncols(), "B", b.nrows())?;
    let l = check_pos_definite(function, "A", &value_of(a))?;

    let c = cholesky_solve(&l, &value_of(b));
    if !TA::DIFFERENTIABLE && !TB::DIFFERENTIABLE {
        return Ok(constant_matrix(&c));
    }
    let (m, n) = c.shape();
    tracing::trace!(function, m, n, "recording SPD solve");

    Ok(tape::with_active_tape(|t| {
        let l_span = t.arena_mut().alloc_values(l.as_slice());
        let a_refs = operand_slots(t, a);
        let b_refs = operand_slots(t, b);
        let (c_first, out) = output_block(t, &c);
        let node: Box<dyn Chainable> = match (a_refs, b_refs) {
            (Some(a_refs), Some(b_refs)) => {
                let c_span = t.arena_mut().alloc_values(c.as_slice());
                Box::new(MdivideLeftSpdVv {
                    m,
                    n,
                    l: l_span,
                    c: c_span,
                    a_refs,
                    b_refs,
                    c_first,
                })
            }
            (Some(a_refs), None) => {
                let c_span = t.arena_mut().alloc_values(c.as_slice());
                Box::new(MdivideLeftSpdVd {
                    m,
                    n,
                    l: l_span,
                    c: c_span,
                    a_refs,
                    c_first,
                })
            }
            (None, Some(b_refs)) => Box::new(MdivideLeftSpdDv {
                m,
                n,
                l: l_span,
                b_refs,
                c_first,
            }),
            (None, None) => return out,
        };
        t.push_node(node);
        out
    }))
}
