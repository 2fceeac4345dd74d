use nalgebra::DMatrix;

use super::{accumulate, output_adjoints, saved};
use crate::arena::{Slot, Span};
use crate::error::MathError;
use crate::matrix::check::{check_multiplicable, check_square};
use crate::matrix::linalg::{identity, Lu};
use crate::matrix::{constant_matrix, operand_slots, output_block, value_of, Operand};
use crate::tape::{self, Adjoints, Chainable, Tape};
use crate::var::Var;

/// LU factors of `A` saved for the reverse pass.
#[derive(Clone, Copy, Debug)]
struct SavedLu {
    m: usize,
    packed: Span<f64>,
    perm: Span<Slot>,
}

impl SavedLu {
    fn save(tape: &mut Tape, lu: &Lu<f64>) -> Self {
        let packed = tape.arena_mut().alloc_values(lu.packed().as_slice());
        let perm = tape
            .arena_mut()
            .alloc_slots(lu.permutation().iter().map(|&p| p as Slot));
        SavedLu {
            m: lu.dim(),
            packed,
            perm,
        }
    }

    fn load(&self, adj: &Adjoints<'_>) -> Lu<f64> {
        let perm = adj.slots(self.perm).iter().map(|&p| p as usize).collect();
        Lu::from_parts(saved(adj, self.packed, self.m, self.m), perm)
    }
}

/// `C = A \ B` with both `A` and `B` differentiable.
struct MdivideLeftVv {
    n: usize,
    lu: SavedLu,
    c: Span<f64>,
    a_refs: Span<Slot>,
    b_refs: Span<Slot>,
    c_first: Slot,
}

impl Chainable for MdivideLeftVv {
    fn chain(&self, adj: &mut Adjoints<'_>) {
        let m = self.lu.m;
        let adj_c = output_adjoints(adj, self.c_first, m, self.n);
        let adj_b = self.lu.load(adj).solve_transpose(&adj_c);
        let c = saved(adj, self.c, m, self.n);
        let adj_a = -(&adj_b * c.transpose());
        accumulate(adj, self.a_refs, &adj_a);
        accumulate(adj, self.b_refs, &adj_b);
    }
}

/// `C = A \ B` with `A` differentiable and `B` data.
struct MdivideLeftVd {
    n: usize,
    lu: SavedLu,
    c: Span<f64>,
    a_refs: Span<Slot>,
    c_first: Slot,
}

impl Chainable for MdivideLeftVd {
    fn chain(&self, adj: &mut Adjoints<'_>) {
        let m = self.lu.m;
        let adj_c = output_adjoints(adj, self.c_first, m, self.n);
        let c = saved(adj, self.c, m, self.n);
        let adj_a = -(self.lu.load(adj).solve_transpose(&adj_c) * c.transpose());
        accumulate(adj, self.a_refs, &adj_a);
    }
}

/// `C = A \ B` with `A` data and `B` differentiable.
struct MdivideLeftDv {
    n: usize,
    lu: SavedLu,
    b_refs: Span<Slot>,
    c_first: Slot,
}

impl Chainable for MdivideLeftDv {
    fn chain(&self, adj: &mut Adjoints<'_>) {
        let adj_c = output_adjoints(adj, self.c_first, self.lu.m, self.n);
        let adj_b = self.lu.load(adj).solve_transpose(&adj_c);
        accumulate(adj, self.b_refs, &adj_b);
    }
}

pub(crate) fn solve_node<TA: Operand, TB: Operand>(
    a: &DMatrix<TA>,
    b: &DMatrix<TB>,
    function: &'static str,
) -> DMatrix<Var> {
    let lu = Lu::factor(&value_of(a));
    let c = lu.solve(&value_of(b));
    if !TA::DIFFERENTIABLE && !TB::DIFFERENTIABLE {
        return constant_matrix(&c);
    }
    let (m, n) = c.shape();
    tracing::trace!(function, m, n, "recording general solve");
    tape::with_active_tape(|t| {
        let saved_lu = SavedLu::save(t, &lu);
        let a_refs = operand_slots(t, a);
        let b_refs = operand_slots(t, b);
        let c_span = t.arena_mut().alloc_values(c.as_slice());
        let (c_first, out) = output_block(t, &c);
        let node: Box<dyn Chainable> = match (a_refs, b_refs) {
            (Some(a_refs), Some(b_refs)) => Box::new(MdivideLeftVv {
                n,
                lu: saved_lu,
                c: c_span,
                a_refs,
                b_refs,
                c_first,
            }),
            (Some(a_refs), None) => Box::new(MdivideLeftVd {
                n,
                lu: saved_lu,
                c: c_span,
                a_refs,
                c_first,
            }),
            (None, Some(b_refs)) => Box::new(MdivideLeftDv {
                n,
                lu: saved_lu,
                b_refs,
                c_first,
            }),
            (None, None) => return out,
        };
        t.push_node(node);
        out
    })
}

/// Solve `A C = B` for `C` by LU decomposition with partial pivoting.
///
/// A singular `A` is not an error: the result (and later the adjoints)
/// contain inf/nan.
pub fn mdivide_left<TA: Operand, TB: Operand>(
    a: &DMatrix<TA>,
    b: &DMatrix<TB>,
) -> Result<DMatrix<Var>, MathError> {
    check_square("mdivide_left", "A", a)?;
    check_multiplicable("mdivide_left", "A", a.ncols(), "B", b.nrows())?;
    Ok(solve_node(a, b, "mdivide_left"))
}

/// Matrix inverse, recorded as the solve `A \ I`.
pub fn inverse<TA: Operand>(a: &DMatrix<TA>) -> Result<DMatrix<Var>, MathError> {
    check_square("inverse", "A", a)?;
    Ok(solve_node(a, &identity::<f64>(a.nrows()), "inverse"))
}
