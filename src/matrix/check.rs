//! Argument validation shared by the matrix operations.
//!
//! Every check runs before an operation touches the tape. Rejections are
//! logged at `debug` level and returned as [`MathError`].

use nalgebra::DMatrix;

use crate::error::MathError;

fn reject(err: MathError) -> MathError {
    tracing::debug!(function = err.function(), error = %err, "argument check failed");
    err
}

pub fn check_square<T: nalgebra::Scalar>(
    function: &'static str,
    name: &str,
    m: &DMatrix<T>,
) -> Result<(), MathError> {
    if m.nrows() != m.ncols() {
        return Err(reject(MathError::dimension(
            function,
            format!("{name} is {}x{}, expected a square matrix", m.nrows(), m.ncols()),
        )));
    }
    Ok(())
}

/// `cols_a` (columns of the left factor) must equal `rows_b`.
pub fn check_multiplicable(
    function: &'static str,
    name_a: &str,
    cols_a: usize,
    name_b: &str,
    rows_b: usize,
) -> Result<(), MathError> {
    if cols_a != rows_b {
        return Err(reject(MathError::dimension(
            function,
            format!("{name_a} has {cols_a} columns but {name_b} has {rows_b} rows"),
        )));
    }
    Ok(())
}

pub fn check_matching_sizes(
    function: &'static str,
    name_a: &str,
    len_a: usize,
    name_b: &str,
    len_b: usize,
) -> Result<(), MathError> {
    if len_a != len_b {
        return Err(reject(MathError::dimension(
            function,
            format!("{name_a} has size {len_a} but {name_b} has size {len_b}"),
        )));
    }
    Ok(())
}

pub fn check_matching_dims<A: nalgebra::Scalar, B: nalgebra::Scalar>(
    function: &'static str,
    name_a: &str,
    a: &DMatrix<A>,
    name_b: &str,
    b: &DMatrix<B>,
) -> Result<(), MathError> {
    if a.shape() != b.shape() {
        return Err(reject(MathError::dimension(
            function,
            format!(
                "{name_a} is {}x{} but {name_b} is {}x{}",
                a.nrows(),
                a.ncols(),
                b.nrows(),
                b.ncols()
            ),
        )));
    }
    Ok(())
}

pub fn check_nonzero_size(function: &'static str, name: &str, len: usize) -> Result<(), MathError> {
    if len == 0 {
        return Err(reject(MathError::dimension(
            function,
            format!("{name} has size 0"),
        )));
    }
    Ok(())
}

/// Absolute tolerance for symmetry of constrained arguments.
pub const SYMMETRY_TOLERANCE: f64 = 1e-8;

pub fn check_symmetric(
    function: &'static str,
    name: &str,
    m: &DMatrix<f64>,
) -> Result<(), MathError> {
    let n = m.nrows();
    for j in 0..n {
        for i in (j + 1)..n {
            if (m[(i, j)] - m[(j, i)]).abs() > SYMMETRY_TOLERANCE {
                return Err(reject(MathError::domain(
                    function,
                    format!(
                        "{name} is not symmetric: {name}[{i},{j}] = {} but {name}[{j},{i}] = {}",
                        m[(i, j)],
                        m[(j, i)]
                    ),
                )));
            }
        }
    }
    Ok(())
}

/// Symmetric and Cholesky-factorable. Returns the lower factor on success.
pub fn check_pos_definite(
    function: &'static str,
    name: &str,
    m: &DMatrix<f64>,
) -> Result<DMatrix<f64>, MathError> {
    check_symmetric(function, name, m)?;
    if m.iter().any(|x| !x.is_finite()) {
        return Err(reject(MathError::domain(
            function,
            format!("{name} has non-finite entries"),
        )));
    }
    match super::linalg::cholesky(m) {
        Some(l) => Ok(l),
        None => Err(reject(MathError::domain(
            function,
            format!("{name} is not positive definite"),
        ))),
    }
}
