//! Matrix functions generic over [`Scalar`].
//!
//! Nothing here records composite nodes: every entry is computed with `T`'s
//! own arithmetic, so with `T = Fvar<_>` tangents flow through the dense
//! kernels directly, and with `T = Var` each scalar operation is recorded
//! individually. Shape contracts are the same as for the reverse-mode
//! versions in [`crate::rev`].

use nalgebra::DMatrix;

use crate::error::MathError;
use crate::fvar::Fvar;
use crate::matrix::check::{check_multiplicable, check_square};
use crate::matrix::linalg::{solve_lower_triangular, Lu};
use crate::scalar::Scalar;

/// Lift a matrix to `Fvar`s with zero tangent.
pub fn to_fvar<T: Scalar>(m: &DMatrix<T>) -> DMatrix<Fvar<T>> {
    m.map(Fvar::constant)
}

/// Matrix product `A B`, one [`Scalar::dot`] per entry.
pub fn multiply<T: Scalar>(a: &DMatrix<T>, b: &DMatrix<T>) -> Result<DMatrix<T>, MathError> {
    check_multiplicable("multiply", "A", a.ncols(), "B", b.nrows())?;
    let rows: Vec<Vec<T>> = a.row_iter().map(|r| r.iter().copied().collect()).collect();
    let cols: Vec<Vec<T>> = b.column_iter().map(|c| c.iter().copied().collect()).collect();
    Ok(DMatrix::from_fn(a.nrows(), b.ncols(), |i, j| {
        T::dot(&rows[i], &cols[j])
    }))
}

/// Solve `A X = B` by LU decomposition with partial pivoting.
pub fn mdivide_left<T: Scalar>(a: &DMatrix<T>, b: &DMatrix<T>) -> Result<DMatrix<T>, MathError> {
    check_square("mdivide_left", "A", a)?;
    check_multiplicable("mdivide_left", "A", a.ncols(), "B", b.nrows())?;
    Ok(Lu::factor(a).solve(b))
}

/// Solve `L X = B` where `L` is the lower triangle of `A`; entries above the
/// diagonal are never read.
pub fn mdivide_left_tri_low<T: Scalar>(
    a: &DMatrix<T>,
    b: &DMatrix<T>,
) -> Result<DMatrix<T>, MathError> {
    check_square("mdivide_left_tri_low", "A", a)?;
    check_multiplicable("mdivide_left_tri_low", "A", a.ncols(), "B", b.nrows())?;
    Ok(solve_lower_triangular(a, b))
}

/// `B A⁻¹`, computed as `(Aᵀ \ Bᵀ)ᵀ`.
pub fn mdivide_right<T: Scalar>(b: &DMatrix<T>, a: &DMatrix<T>) -> Result<DMatrix<T>, MathError> {
    check_square("mdivide_right", "A", a)?;
    check_multiplicable("mdivide_right", "B", b.ncols(), "A", a.nrows())?;
    Ok(Lu::factor(&a.transpose()).solve(&b.transpose()).transpose())
}

pub fn determinant<T: Scalar>(a: &DMatrix<T>) -> Result<T, MathError> {
    check_square("determinant", "A", a)?;
    Ok(Lu::factor(a).determinant())
}

pub fn inverse<T: Scalar>(a: &DMatrix<T>) -> Result<DMatrix<T>, MathError> {
    check_square("inverse", "A", a)?;
    Ok(Lu::factor(a).inverse())
}
