use nalgebra::DMatrix;

use super::dot_product::{columns_of, dot_grid, rows_of};
use crate::error::MathError;
use crate::matrix::check::check_multiplicable;
use crate::matrix::Operand;
use crate::tape;
use crate::var::Var;

/// Matrix product `A B`.
///
/// Recorded as a grid of dot-product nodes: each row of `A` and each column of
/// `B` is copied into the arena once and shared by every node that reads it.
pub fn multiply<TA: Operand, TB: Operand>(
    a: &DMatrix<TA>,
    b: &DMatrix<TB>,
) -> Result<DMatrix<Var>, MathError> {
    check_multiplicable("multiply", "A", a.ncols(), "B", b.nrows())?;
    let (m, n) = (a.nrows(), b.ncols());
    tracing::trace!(m, k = a.ncols(), n, "recording matrix product");
    Ok(dot_grid(m, n, &rows_of(a), &columns_of(b), |i, j| (i, j)))
}

/// Scale every entry of `A` by `c`. One elementary statement per entry.
pub fn multiply_scalar<TA: Operand, TC: Operand>(a: &DMatrix<TA>, c: TC) -> DMatrix<Var> {
    let (cv, cs) = (c.primal(), c.slot());
    tape::with_active_tape(|t| {
        a.map(|x| {
            let value = x.primal() * cv;
            let slot = t.push_binary(value, x.slot(), cv, cs, x.primal());
            t.handle(value, slot)
        })
    })
}
