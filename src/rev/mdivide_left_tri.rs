use nalgebra::DMatrix;

use super::{accumulate, output_adjoints, saved};
use crate::arena::{Slot, Span};
use crate::error::MathError;
use crate::matrix::check::{check_multiplicable, check_square};
use crate::matrix::{constant_matrix, operand_slots, output_block, value_of, Operand};
use crate::tape::{self, Adjoints, Chainable};
use crate::var::Var;

/// Which triangle of a square matrix a triangular solve reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TriView {
    Lower,
    Upper,
}

impl TriView {
    #[inline]
    pub fn contains(self, i: usize, j: usize) -> bool {
        match self {
            TriView::Lower => i >= j,
            TriView::Upper => i <= j,
        }
    }

    /// Entries of the triangle of an `n x n` matrix in column-major order.
    pub fn entries(self, n: usize) -> impl Iterator<Item = (usize, usize)> {
        (0..n).flat_map(move |j| {
            (0..n)
                .filter(move |&i| self.contains(i, j))
                .map(move |i| (i, j))
        })
    }

    fn part(self, m: &DMatrix<f64>) -> DMatrix<f64> {
        match self {
            TriView::Lower => m.lower_triangle(),
            TriView::Upper => m.upper_triangle(),
        }
    }

    fn solve(self, t: &DMatrix<f64>, b: &DMatrix<f64>) -> DMatrix<f64> {
        match self {
            TriView::Lower => t.solve_lower_triangular_unchecked(b),
            TriView::Upper => t.solve_upper_triangular_unchecked(b),
        }
    }

    fn solve_transpose(self, t: &DMatrix<f64>, b: &DMatrix<f64>) -> DMatrix<f64> {
        match self {
            TriView::Lower => t.tr_solve_lower_triangular_unchecked(b),
            TriView::Upper => t.tr_solve_upper_triangular_unchecked(b),
        }
    }
}

/// Triangle entries of `m` in the order of [`TriView::entries`].
fn triangle_entries(view: TriView, m: &DMatrix<f64>) -> DMatrix<f64> {
    let vals: Vec<f64> = view.entries(m.nrows()).map(|(i, j)| m[(i, j)]).collect();
    DMatrix::from_vec(vals.len(), 1, vals)
}

struct MdivideLeftTriVv {
    view: TriView,
    m: usize,
    n: usize,
    a: Span<f64>,
    c: Span<f64>,
    a_refs: Span<Slot>,
    b_refs: Span<Slot>,
    c_first: Slot,
}

impl Chainable for MdivideLeftTriVv {
    fn chain(&self, adj: &mut Adjoints<'_>) {
        let adj_c = output_adjoints(adj, self.c_first, self.m, self.n);
        let a = saved(adj, self.a, self.m, self.m);
        let adj_b = self.view.solve_transpose(&a, &adj_c);
        let c = saved(adj, self.c, self.m, self.n);
        let adj_a = -(&adj_b * c.transpose());
        accumulate(adj, self.a_refs, &triangle_entries(self.view, &adj_a));
        accumulate(adj, self.b_refs, &adj_b);
    }
}

struct MdivideLeftTriVd {
    view: TriView,
    m: usize,
    n: usize,
    a: Span<f64>,
    c: Span<f64>,
    a_refs: Span<Slot>,
    c_first: Slot,
}

impl Chainable for MdivideLeftTriVd {
    fn chain(&self, adj: &mut Adjoints<'_>) {
        let adj_c = output_adjoints(adj, self.c_first, self.m, self.n);
        let a = saved(adj, self.a, self.m, self.m);
        let c = saved(adj, self.c, self.m, self.n);
        let adj_a = -(self.view.solve_transpose(&a, &adj_c) * c.transpose());
        accumulate(adj, self.a_refs, &triangle_entries(self.view, &adj_a));
    }
}

struct MdivideLeftTriDv {
    view: TriView,
    m: usize,
    n: usize,
    a: Span<f64>,
    b_refs: Span<Slot>,
    c_first: Slot,
}

impl Chainable for MdivideLeftTriDv {
    fn chain(&self, adj: &mut Adjoints<'_>) {
        let adj_c = output_adjoints(adj, self.c_first, self.m, self.n);
        let a = saved(adj, self.a, self.m, self.m);
        let adj_b = self.view.solve_transpose(&a, &adj_c);
        accumulate(adj, self.b_refs, &adj_b);
    }
}

/// Solve `T C = B` where `T` is the `view` triangle of `A`.
///
/// Entries of `A` outside the triangle are never read and never receive
/// adjoints; only the triangle's entries are recorded as operands.
pub fn mdivide_left_tri<TA: Operand, TB: Operand>(
    a: &DMatrix<TA>,
    b: &DMatrix<TB>,
    view: TriView,
) -> Result<DMatrix<Var>, MathError> {
    tri_solve(a, b, view, "mdivide_left_tri")
}

/// Lower-triangular solve, `mdivide_left_tri(a, b, TriView::Lower)`.
pub fn mdivide_left_tri_low<TA: Operand, TB: Operand>(
    a: &DMatrix<TA>,
    b: &DMatrix<TB>,
) -> Result<DMatrix<Var>, MathError> {
    tri_solve(a, b, TriView::Lower, "mdivide_left_tri_low")
}

pub(crate) fn tri_solve<TA: Operand, TB: Operand>(
    a: &DMatrix<TA>,
    b: &DMatrix<TB>,
    view: TriView,
    function: &'static str,
) -> Result<DMatrix<Var>, MathError> {
    check_square(function, "A", a)?;
    check_multiplicable(function, "A", a.ncols(), "B", b.nrows())?;

    let tri = view.part(&value_of(a));
    let c = view.solve(&tri, &value_of(b));
    if !TA::DIFFERENTIABLE && !TB::DIFFERENTIABLE {
        return Ok(constant_matrix(&c));
    }
    let (m, n) = c.shape();
    tracing::trace!(function, m, n, ?view, "recording triangular solve");

    Ok(tape::with_active_tape(|t| {
        let a_span = t.arena_mut().alloc_values(tri.as_slice());
        let a_refs = if TA::DIFFERENTIABLE {
            let slots: Vec<Slot> = view.entries(m).map(|(i, j)| a[(i, j)].slot()).collect();
            Some(t.arena_mut().alloc_slots(slots))
        } else {
            None
        };
        let b_refs = operand_slots(t, b);
        let (c_first, out) = output_block(t, &c);
        let node: Box<dyn Chainable> = match (a_refs, b_refs) {
            (Some(a_refs), Some(b_refs)) => {
                let c_span = t.arena_mut().alloc_values(c.as_slice());
                Box::new(MdivideLeftTriVv {
                    view,
                    m,
                    n,
                    a: a_span,
                    c: c_span,
                    a_refs,
                    b_refs,
                    c_first,
                })
            }
            (Some(a_refs), None) => {
                let c_span = t.arena_mut().alloc_values(c.as_slice());
                Box::new(MdivideLeftTriVd {
                    view,
                    m,
                    n,
                    a: a_span,
                    c: c_span,
                    a_refs,
                    c_first,
                })
            }
            (None, Some(b_refs)) => Box::new(MdivideLeftTriDv {
                view,
                m,
                n,
                a: a_span,
                b_refs,
                c_first,
            }),
            (None, None) => return out,
        };
        t.push_node(node);
        out
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_are_column_major() {
        let lower: Vec<_> = TriView::Lower.entries(3).collect();
        assert_eq!(lower, vec![(0, 0), (1, 0), (2, 0), (1, 1), (2, 1), (2, 2)]);
        let upper: Vec<_> = TriView::Upper.entries(3).collect();
        assert_eq!(upper, vec![(0, 0), (0, 1), (1, 1), (0, 2), (1, 2), (2, 2)]);
    }
}
