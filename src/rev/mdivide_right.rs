//! Right division `B A⁻¹`, recorded as the transposed left solve
//! `(Aᵀ \ Bᵀ)ᵀ`. Shape errors name the right-division function.

use nalgebra::DMatrix;

use super::ldlt::{ldlt_solve, LdltFactor};
use super::mdivide_left::solve_node;
use super::mdivide_left_spd::spd_solve;
use super::mdivide_left_tri::{tri_solve, TriView};
use crate::error::MathError;
use crate::matrix::check::{check_multiplicable, check_square};
use crate::matrix::Operand;
use crate::var::Var;

fn check_right<TB: Operand, TA: Operand>(
    function: &'static str,
    b: &DMatrix<TB>,
    a: &DMatrix<TA>,
) -> Result<(), MathError> {
    check_square(function, "A", a)?;
    check_multiplicable(function, "B", b.ncols(), "A", a.nrows())
}

/// `B A⁻¹` by LU decomposition.
pub fn mdivide_right<TB: Operand, TA: Operand>(
    b: &DMatrix<TB>,
    a: &DMatrix<TA>,
) -> Result<DMatrix<Var>, MathError> {
    check_right("mdivide_right", b, a)?;
    Ok(solve_node(&a.transpose(), &b.transpose(), "mdivide_right").transpose())
}

/// `B L⁻¹` where `L` is the lower triangle of `A`.
pub fn mdivide_right_tri_low<TB: Operand, TA: Operand>(
    b: &DMatrix<TB>,
    a: &DMatrix<TA>,
) -> Result<DMatrix<Var>, MathError> {
    const FUNCTION: &str = "mdivide_right_tri_low";
    check_right(FUNCTION, b, a)?;
    // the lower triangle of A is the upper triangle of Aᵀ
    let c = tri_solve(&a.transpose(), &b.transpose(), TriView::Upper, FUNCTION)?;
    Ok(c.transpose())
}

/// `B A⁻¹` for symmetric positive-definite `A`.
pub fn mdivide_right_spd<TB: Operand, TA: Operand>(
    b: &DMatrix<TB>,
    a: &DMatrix<TA>,
) -> Result<DMatrix<Var>, MathError> {
    const FUNCTION: &str = "mdivide_right_spd";
    check_right(FUNCTION, b, a)?;
    let c = spd_solve(&a.transpose(), &b.transpose(), FUNCTION)?;
    Ok(c.transpose())
}

/// `B A⁻¹` with a precomputed LDLᵀ factor of `A`.
pub fn mdivide_right_ldlt<TB: Operand, TA: Operand>(
    b: &DMatrix<TB>,
    a: &LdltFactor<TA>,
) -> Result<DMatrix<Var>, MathError> {
    const FUNCTION: &str = "mdivide_right_ldlt";
    check_multiplicable(FUNCTION, "B", b.ncols(), "A", a.rows())?;
    let c = ldlt_solve(a, &b.transpose(), FUNCTION)?;
    Ok(c.transpose())
}
