//! Dense kernels: LU with partial pivoting, triangular substitution, Cholesky
//! and LDLᵀ.
//!
//! LU and [`solve_lower_triangular`] are generic over [`Scalar`] so the
//! forward-mode matrix functions can run them on `Fvar`s. The `f64`-only
//! paths used by the reverse-mode nodes go through nalgebra's unchecked
//! triangular solvers. None of the kernels reject singular input: a zero pivot
//! simply divides by zero and the resulting inf/nan propagates.

use nalgebra::DMatrix;

use crate::scalar::Scalar;

/// LU factorization with partial pivoting, `P A = L U`.
///
/// Stores the combined factors in one matrix (L strictly below the diagonal
/// with an implicit unit diagonal, U on and above it) plus the row permutation.
#[derive(Clone, Debug)]
pub struct Lu<T: Scalar> {
    lu: DMatrix<T>,
    /// `perm[i]` is the original row of factored row `i`.
    perm: Vec<usize>,
    swaps: usize,
}

// Explicit indexing is clearer for pivoted LU: row/col indices drive pivot search and elimination
#[allow(clippy::needless_range_loop)]
impl<T: Scalar> Lu<T> {
    /// Factor a square matrix. Pivots are chosen by the magnitude of the
    /// primal value.
    pub fn factor(a: &DMatrix<T>) -> Self {
        let n = a.nrows();
        debug_assert_eq!(n, a.ncols());

        let mut lu = a.clone();
        let mut perm: Vec<usize> = (0..n).collect();
        let mut swaps = 0;

        for col in 0..n {
            let mut max_val = lu[(col, col)].value().abs();
            let mut max_row = col;
            for row in (col + 1)..n {
                let v = lu[(row, col)].value().abs();
                if v > max_val {
                    max_val = v;
                    max_row = row;
                }
            }

            if max_row != col {
                lu.swap_rows(col, max_row);
                perm.swap(col, max_row);
                swaps += 1;
            }

            let pivot = lu[(col, col)];
            for row in (col + 1)..n {
                let factor = lu[(row, col)] / pivot;
                lu[(row, col)] = factor;
                for j in (col + 1)..n {
                    let upper = lu[(col, j)];
                    lu[(row, j)] = lu[(row, j)] - factor * upper;
                }
            }
        }

        Lu { lu, perm, swaps }
    }

    /// Rebuild a factorization from its packed parts.
    pub fn from_parts(lu: DMatrix<T>, perm: Vec<usize>) -> Self {
        Lu {
            lu,
            perm,
            swaps: 0,
        }
    }

    pub fn packed(&self) -> &DMatrix<T> {
        &self.lu
    }

    pub fn permutation(&self) -> &[usize] {
        &self.perm
    }

    pub fn dim(&self) -> usize {
        self.lu.nrows()
    }

    /// Solve `A X = B`.
    pub fn solve(&self, b: &DMatrix<T>) -> DMatrix<T> {
        let n = self.dim();
        debug_assert_eq!(b.nrows(), n);
        let mut x = DMatrix::from_element(n, b.ncols(), T::zero());
        let mut y = vec![T::zero(); n];
        for k in 0..b.ncols() {
            for i in 0..n {
                y[i] = b[(self.perm[i], k)];
            }
            // L has a unit diagonal.
            for i in 1..n {
                for j in 0..i {
                    y[i] = y[i] - self.lu[(i, j)] * y[j];
                }
            }
            for i in (0..n).rev() {
                let mut sum = y[i];
                for j in (i + 1)..n {
                    sum = sum - self.lu[(i, j)] * x[(j, k)];
                }
                x[(i, k)] = sum / self.lu[(i, i)];
            }
        }
        x
    }

    /// Solve `Aᵀ X = B` with the same factors.
    pub fn solve_transpose(&self, b: &DMatrix<T>) -> DMatrix<T> {
        let n = self.dim();
        debug_assert_eq!(b.nrows(), n);
        let mut x = DMatrix::from_element(n, b.ncols(), T::zero());
        let mut z = vec![T::zero(); n];
        for k in 0..b.ncols() {
            // Uᵀ z = b
            for i in 0..n {
                let mut sum = b[(i, k)];
                for j in 0..i {
                    sum = sum - self.lu[(j, i)] * z[j];
                }
                z[i] = sum / self.lu[(i, i)];
            }
            // Lᵀ w = z, in place
            for i in (0..n).rev() {
                for j in (i + 1)..n {
                    z[i] = z[i] - self.lu[(j, i)] * z[j];
                }
            }
            for i in 0..n {
                x[(self.perm[i], k)] = z[i];
            }
        }
        x
    }

    pub fn determinant(&self) -> T {
        let mut det = if self.swaps % 2 == 0 {
            T::one()
        } else {
            -T::one()
        };
        for i in 0..self.dim() {
            det = det * self.lu[(i, i)];
        }
        det
    }

    /// `ln |det A|`.
    pub fn log_abs_determinant(&self) -> T {
        (0..self.dim()).fold(T::zero(), |acc, i| acc + self.lu[(i, i)].abs().ln())
    }

    pub fn inverse(&self) -> DMatrix<T> {
        self.solve(&identity(self.dim()))
    }
}

pub fn identity<T: Scalar>(n: usize) -> DMatrix<T> {
    DMatrix::from_fn(n, n, |i, j| if i == j { T::one() } else { T::zero() })
}

/// Solve `L X = B` reading only the lower triangle of `l`, for any scalar.
#[allow(clippy::needless_range_loop)]
pub fn solve_lower_triangular<T: Scalar>(l: &DMatrix<T>, b: &DMatrix<T>) -> DMatrix<T> {
    let n = l.nrows();
    let mut x = b.clone();
    for k in 0..b.ncols() {
        for i in 0..n {
            let mut sum = x[(i, k)];
            for j in 0..i {
                sum = sum - l[(i, j)] * x[(j, k)];
            }
            x[(i, k)] = sum / l[(i, i)];
        }
    }
    x
}

/// Lower Cholesky factor, or `None` if `a` is not positive definite.
pub fn cholesky(a: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    a.clone().cholesky().map(|c| c.l())
}

/// Solve `A X = B` given the lower Cholesky factor of `A`.
pub fn cholesky_solve(l: &DMatrix<f64>, b: &DMatrix<f64>) -> DMatrix<f64> {
    l.tr_solve_lower_triangular_unchecked(&l.solve_lower_triangular_unchecked(b))
}

/// Unpivoted `A = L D Lᵀ` with unit lower-triangular `L`.
#[derive(Clone, Debug, PartialEq)]
pub struct Ldlt {
    pub l: DMatrix<f64>,
    pub d: Vec<f64>,
}

impl Ldlt {
    /// Factor the symmetric matrix `a`, reading its lower triangle.
    pub fn factor(a: &DMatrix<f64>) -> Self {
        let n = a.nrows();
        let mut l = identity::<f64>(n);
        let mut d = vec![0.0; n];
        for j in 0..n {
            let mut dj = a[(j, j)];
            for k in 0..j {
                dj -= l[(j, k)] * l[(j, k)] * d[k];
            }
            d[j] = dj;
            for i in (j + 1)..n {
                let mut v = a[(i, j)];
                for k in 0..j {
                    v -= l[(i, k)] * l[(j, k)] * d[k];
                }
                l[(i, j)] = v / dj;
            }
        }
        Ldlt { l, d }
    }

    pub fn dim(&self) -> usize {
        self.d.len()
    }

    /// Every pivot finite and strictly positive.
    pub fn is_positive(&self) -> bool {
        self.d.iter().all(|&x| x > 0.0 && x.is_finite())
    }

    pub fn solve(&self, b: &DMatrix<f64>) -> DMatrix<f64> {
        let mut y = self.l.solve_lower_triangular_unchecked(b);
        for (i, &di) in self.d.iter().enumerate() {
            for k in 0..y.ncols() {
                y[(i, k)] /= di;
            }
        }
        self.l.tr_solve_lower_triangular_unchecked(&y)
    }

    pub fn log_abs_determinant(&self) -> f64 {
        self.d.iter().map(|x| x.abs().ln()).sum()
    }

    pub fn inverse(&self) -> DMatrix<f64> {
        self.solve(&identity(self.dim()))
    }
}
