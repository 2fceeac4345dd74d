use nalgebra::DMatrix;

use super::{accumulate, output_adjoints, saved};
use crate::arena::{Slot, Span};
use crate::error::MathError;
use crate::matrix::check::{check_multiplicable, check_square, check_symmetric};
use crate::matrix::linalg::Ldlt;
use crate::matrix::{constant_matrix, operand_slots, output_block, value_of, Operand};
use crate::tape::{self, Adjoints, Chainable, Tape};
use crate::var::Var;

/// `L D Lᵀ` factorization of a symmetric positive-definite matrix, reusable
/// across several solves and log-determinants.
///
/// The factor is computed once, in `f64`. For `T = Var` it also remembers the
/// operand matrix so the nodes built from it can send adjoints back to `A`.
#[derive(Clone, Debug)]
pub struct LdltFactor<T: Operand> {
    a: DMatrix<T>,
    factor: Ldlt,
}

impl<T: Operand> LdltFactor<T> {
    /// Factor `a`. Fails with [`MathError::Domain`] when `a` is not
    /// symmetric or any pivot is not strictly positive.
    pub fn new(a: &DMatrix<T>) -> Result<Self, MathError> {
        check_square("LdltFactor::new", "A", a)?;
        let values = value_of(a);
        check_symmetric("LdltFactor::new", "A", &values)?;
        let factor = Ldlt::factor(&values);
        if !factor.is_positive() {
            tracing::debug!(pivots = ?factor.d, "LDLT factor rejected");
            return Err(MathError::domain(
                "LdltFactor::new",
                "A is not positive definite",
            ));
        }
        Ok(LdltFactor {
            a: a.clone(),
            factor,
        })
    }

    pub fn rows(&self) -> usize {
        self.a.nrows()
    }

    pub fn cols(&self) -> usize {
        self.a.ncols()
    }

    /// The factored matrix.
    pub fn matrix(&self) -> &DMatrix<T> {
        &self.a
    }

    /// `ln |det A|` as a plain value.
    pub fn log_abs_det(&self) -> f64 {
        self.factor.log_abs_determinant()
    }

    /// `A⁻¹ B` in `f64`.
    pub fn solve(&self, b: &DMatrix<f64>) -> DMatrix<f64> {
        self.factor.solve(b)
    }

    pub(crate) fn save(&self, tape: &mut Tape) -> SavedLdlt {
        SavedLdlt {
            m: self.factor.dim(),
            l: tape.arena_mut().alloc_values(self.factor.l.as_slice()),
            d: tape.arena_mut().alloc_values(&self.factor.d),
        }
    }
}

/// LDLᵀ factors saved in the arena for the reverse pass.
#[derive(Clone, Copy, Debug)]
pub(crate) struct SavedLdlt {
    m: usize,
    l: Span<f64>,
    d: Span<f64>,
}

impl SavedLdlt {
    pub(crate) fn load(&self, adj: &Adjoints<'_>) -> Ldlt {
        Ldlt {
            l: saved(adj, self.l, self.m, self.m),
            d: adj.values(self.d).to_vec(),
        }
    }
}

struct MdivideLeftLdltVv {
    n: usize,
    ldlt: SavedLdlt,
    c: Span<f64>,
    a_refs: Span<Slot>,
    b_refs: Span<Slot>,
    c_first: Slot,
}

impl Chainable for MdivideLeftLdltVv {
    fn chain(&self, adj: &mut Adjoints<'_>) {
        let m = self.ldlt.m;
        let adj_c = output_adjoints(adj, self.c_first, m, self.n);
        let adj_b = self.ldlt.load(adj).solve(&adj_c);
        let c = saved(adj, self.c, m, self.n);
        let adj_a = -(&adj_b * c.transpose());
        accumulate(adj, self.a_refs, &adj_a);
        accumulate(adj, self.b_refs, &adj_b);
    }
}

struct MdivideLeftLdltVd {
    n: usize,
    ldlt: SavedLdlt,
    c: Span<f64>,
    a_refs: Span<Slot>,
    c_first: Slot,
}

impl Chainable for MdivideLeftLdltVd {
    fn chain(&self, adj: &mut Adjoints<'_>) {
        let m = self.ldlt.m;
        let adj_c = output_adjoints(adj, self.c_first, m, self.n);
        let c = saved(adj, self.c, m, self.n);
        let adj_a = -(self.ldlt.load(adj).solve(&adj_c) * c.transpose());
        accumulate(adj, self.a_refs, &adj_a);
    }
}

struct MdivideLeftLdltDv {
    n: usize,
    ldlt: SavedLdlt,
    b_refs: Span<Slot>,
    c_first: Slot,
}

impl Chainable for MdivideLeftLdltDv {
    fn chain(&self, adj: &mut Adjoints<'_>) {
        let adj_c = output_adjoints(adj, self.c_first, self.ldlt.m, self.n);
        let adj_b = self.ldlt.load(adj).solve(&adj_c);
        accumulate(adj, self.b_refs, &adj_b);
    }
}

/// Solve `A C = B` with a precomputed LDLᵀ factor of `A`.
pub fn mdivide_left_ldlt<TA: Operand, TB: Operand>(
    a: &LdltFactor<TA>,
    b: &DMatrix<TB>,
) -> Result<DMatrix<Var>, MathError> {
    ldlt_solve(a, b, "mdivide_left_ldlt")
}

pub(crate) fn ldlt_solve<TA: Operand, TB: Operand>(
    a: &LdltFactor<TA>,
    b: &DMatrix<TB>,
    function: &'static str,
) -> Result<DMatrix<Var>, MathError> {
    check_multiplicable(function, "A", a.cols(), "B", b.nrows())?;

    let c = a.solve(&value_of(b));
    if !TA::DIFFERENTIABLE && !TB::DIFFERENTIABLE {
        return Ok(constant_matrix(&c));
    }
    let (m, n) = c.shape();
    tracing::trace!(function, m, n, "recording LDLT solve");

    Ok(tape::with_active_tape(|t| {
        let ldlt = a.save(t);
        let a_refs = operand_slots(t, a.matrix());
        let b_refs = operand_slots(t, b);
        let (c_first, out) = output_block(t, &c);
        let node: Box<dyn Chainable> = match (a_refs, b_refs) {
            (Some(a_refs), Some(b_refs)) => {
                let c_span = t.arena_mut().alloc_values(c.as_slice());
                Box::new(MdivideLeftLdltVv {
                    n,
                    ldlt,
                    c: c_span,
                    a_refs,
                    b_refs,
                    c_first,
                })
            }
            (Some(a_refs), None) => {
                let c_span = t.arena_mut().alloc_values(c.as_slice());
                Box::new(MdivideLeftLdltVd {
                    n,
                    ldlt,
                    c: c_span,
                    a_refs,
                    c_first,
                })
            }
            (None, Some(b_refs)) => Box::new(MdivideLeftLdltDv {
                n,
                ldlt,
                b_refs,
                c_first,
            }),
            (None, None) => return out,
        };
        t.push_node(node);
        out
    }))
}

struct LogDeterminantLdlt {
    ldlt: SavedLdlt,
    a_refs: Span<Slot>,
    out: Slot,
}

impl Chainable for LogDeterminantLdlt {
    fn chain(&self, adj: &mut Adjoints<'_>) {
        let g = adj.adjoint(self.out);
        let inv = self.ldlt.load(adj).inverse();
        accumulate(adj, self.a_refs, &(inv * g));
    }
}

/// `ln |det A|` from an LDLᵀ factor. The gradient with respect to `A` is
/// `A⁻¹` (`A` is symmetric).
pub fn log_determinant_ldlt<TA: Operand>(a: &LdltFactor<TA>) -> Var {
    let value = a.log_abs_det();
    if !TA::DIFFERENTIABLE {
        return Var::constant(value);
    }
    tracing::trace!(m = a.rows(), "recording LDLT log-determinant");
    tape::with_active_tape(|t| {
        let ldlt = a.save(t);
        let a_refs = t
            .arena_mut()
            .alloc_slots(a.matrix().iter().map(Operand::slot));
        let out = t.push_outputs(&[value]);
        t.push_node(Box::new(LogDeterminantLdlt { ldlt, a_refs, out }));
        t.handle(value, out)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_indefinite() {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 3.0, 3.0, 1.0]);
        let err = LdltFactor::new(&a).unwrap_err();
        assert!(matches!(err, MathError::Domain { .. }));
    }

    #[test]
    fn rejects_non_square() {
        let a = DMatrix::<f64>::zeros(2, 3);
        assert!(LdltFactor::new(&a).unwrap_err().is_dimension_mismatch());
    }

    #[test]
    fn data_log_determinant_is_constant() {
        let a = DMatrix::from_row_slice(2, 2, &[2.0, 0.0, 0.0, 3.0]);
        let f = LdltFactor::new(&a).unwrap();
        let v = log_determinant_ldlt(&f);
        assert!(v.is_constant());
        assert!((v.value() - 6.0_f64.ln()).abs() < 1e-12);
    }
}
