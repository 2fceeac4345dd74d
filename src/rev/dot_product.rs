use nalgebra::DMatrix;

use crate::arena::{Slot, Span};
use crate::error::MathError;
use crate::matrix::check::{check_matching_dims, check_matching_sizes};
use crate::matrix::{constant_matrix, output_block, Operand};
use crate::tape::{self, Adjoints, Chainable, Tape};
use crate::var::Var;

/// One side of a dot product: primal values plus, for differentiable
/// operands, their slots. `Copy`, so several nodes can share one buffer.
#[derive(Clone, Copy, Debug)]
pub(crate) struct DotOperand {
    values: Span<f64>,
    refs: Option<Span<Slot>>,
}

impl DotOperand {
    pub(crate) fn alloc<T: Operand>(tape: &mut Tape, xs: &[T]) -> Self {
        let values = tape
            .arena_mut()
            .alloc_values_iter(xs.iter().map(Operand::primal));
        let refs = if T::DIFFERENTIABLE {
            Some(tape.arena_mut().alloc_slots(xs.iter().map(Operand::slot)))
        } else {
            None
        };
        DotOperand { values, refs }
    }
}

pub(crate) struct DotProduct {
    pub(crate) a: DotOperand,
    pub(crate) b: DotOperand,
    pub(crate) out: Slot,
}

impl Chainable for DotProduct {
    fn chain(&self, adj: &mut Adjoints<'_>) {
        let g = adj.adjoint(self.out);
        if let Some(refs) = self.a.refs {
            let refs = adj.slots(refs);
            let other = adj.values(self.b.values);
            for (&slot, &w) in refs.iter().zip(other) {
                adj.accumulate(slot, g * w);
            }
        }
        if let Some(refs) = self.b.refs {
            let refs = adj.slots(refs);
            let other = adj.values(self.a.values);
            for (&slot, &w) in refs.iter().zip(other) {
                adj.accumulate(slot, g * w);
            }
        }
    }
}

struct DotSelf {
    v: DotOperand,
    out: Slot,
}

impl Chainable for DotSelf {
    fn chain(&self, adj: &mut Adjoints<'_>) {
        let Some(refs) = self.v.refs else { return };
        let g = adj.adjoint(self.out);
        let refs = adj.slots(refs);
        let values = adj.values(self.v.values);
        for (&slot, &x) in refs.iter().zip(values) {
            adj.accumulate(slot, 2.0 * g * x);
        }
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn primals<T: Operand>(xs: &[T]) -> Vec<f64> {
    xs.iter().map(Operand::primal).collect()
}

/// Record one dot-product node per pair of operand vectors, writing into a
/// fresh output block shaped `rows x cols`.
pub(crate) fn dot_grid<TA: Operand, TB: Operand>(
    rows: usize,
    cols: usize,
    lhs: &[Vec<TA>],
    rhs: &[Vec<TB>],
    pair: impl Fn(usize, usize) -> (usize, usize),
) -> DMatrix<Var> {
    let values = DMatrix::from_fn(rows, cols, |i, j| {
        let (l, r) = pair(i, j);
        dot(&primals(&lhs[l]), &primals(&rhs[r]))
    });
    if !TA::DIFFERENTIABLE && !TB::DIFFERENTIABLE {
        return constant_matrix(&values);
    }
    tape::with_active_tape(|t| {
        let lhs_ops: Vec<DotOperand> = lhs.iter().map(|v| DotOperand::alloc(t, v)).collect();
        let rhs_ops: Vec<DotOperand> = rhs.iter().map(|v| DotOperand::alloc(t, v)).collect();
        let (first, out) = output_block(t, &values);
        for j in 0..cols {
            for i in 0..rows {
                let (l, r) = pair(i, j);
                t.push_node(Box::new(DotProduct {
                    a: lhs_ops[l],
                    b: rhs_ops[r],
                    out: first + (i + j * rows) as Slot,
                }));
            }
        }
        out
    })
}

/// Inner product of two equal-length vectors.
pub fn dot_product<TA: Operand, TB: Operand>(a: &[TA], b: &[TB]) -> Result<Var, MathError> {
    check_matching_sizes("dot_product", "a", a.len(), "b", b.len())?;
    let value = dot(&primals(a), &primals(b));
    if !TA::DIFFERENTIABLE && !TB::DIFFERENTIABLE {
        return Ok(Var::constant(value));
    }
    tracing::trace!(n = a.len(), "recording dot product");
    Ok(tape::with_active_tape(|t| {
        let a = DotOperand::alloc(t, a);
        let b = DotOperand::alloc(t, b);
        let out = t.push_outputs(&[value]);
        t.push_node(Box::new(DotProduct { a, b, out }));
        t.handle(value, out)
    }))
}

/// `vᵀ v`.
pub fn dot_self<T: Operand>(v: &[T]) -> Var {
    let x = primals(v);
    let value = dot(&x, &x);
    if !T::DIFFERENTIABLE {
        return Var::constant(value);
    }
    tape::with_active_tape(|t| {
        let v = DotOperand::alloc(t, v);
        let out = t.push_outputs(&[value]);
        t.push_node(Box::new(DotSelf { v, out }));
        t.handle(value, out)
    })
}

pub(crate) fn columns_of<T: Operand>(m: &DMatrix<T>) -> Vec<Vec<T>> {
    m.column_iter().map(|c| c.iter().copied().collect()).collect()
}

pub(crate) fn rows_of<T: Operand>(m: &DMatrix<T>) -> Vec<Vec<T>> {
    m.row_iter().map(|r| r.iter().copied().collect()).collect()
}

/// Dot product of matching columns; a `1 x n` row vector.
pub fn columns_dot_product<TA: Operand, TB: Operand>(
    a: &DMatrix<TA>,
    b: &DMatrix<TB>,
) -> Result<DMatrix<Var>, MathError> {
    check_matching_dims("columns_dot_product", "A", a, "B", b)?;
    let n = a.ncols();
    Ok(dot_grid(1, n, &columns_of(a), &columns_of(b), |_, j| (j, j)))
}

/// Dot product of matching rows; an `m x 1` column vector.
pub fn rows_dot_product<TA: Operand, TB: Operand>(
    a: &DMatrix<TA>,
    b: &DMatrix<TB>,
) -> Result<DMatrix<Var>, MathError> {
    check_matching_dims("rows_dot_product", "A", a, "B", b)?;
    let m = a.nrows();
    Ok(dot_grid(m, 1, &rows_of(a), &rows_of(b), |i, _| (i, i)))
}
