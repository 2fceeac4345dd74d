//! Reverse-mode matrix operations recorded as composite graph nodes.
//!
//! Each operation validates its arguments, computes the result in `f64`,
//! copies whatever its adjoint rule needs into the tape arena and records a
//! single [`Chainable`](crate::tape::Chainable) node (or, for `multiply` and
//! the per-column/per-row dot products, one node per output entry).
//! Operands may be `f64` or `Var` independently; data operands contribute no
//! slots and receive no adjoints. When every operand is data the result is a
//! matrix of constants and nothing is recorded.

mod determinant;
mod dot_product;
mod ldlt;
mod mdivide_left;
mod mdivide_left_spd;
mod mdivide_left_tri;
mod mdivide_right;
mod multiply;
mod quad_form;
mod trace_inv_quad_form;

pub use determinant::{determinant, log_determinant};
pub use dot_product::{columns_dot_product, dot_product, dot_self, rows_dot_product};
pub use ldlt::{log_determinant_ldlt, mdivide_left_ldlt, LdltFactor};
pub use mdivide_left::{inverse, mdivide_left};
pub use mdivide_left_spd::mdivide_left_spd;
pub use mdivide_left_tri::{mdivide_left_tri, mdivide_left_tri_low, TriView};
pub use mdivide_right::{mdivide_right, mdivide_right_ldlt, mdivide_right_spd, mdivide_right_tri_low};
pub use multiply::{multiply, multiply_scalar};
pub use quad_form::{quad_form, trace_gen_quad_form, trace_quad_form};
pub use trace_inv_quad_form::{trace_gen_inv_quad_form_ldlt, trace_inv_quad_form_ldlt};

use nalgebra::DMatrix;

use crate::arena::{Slot, Span};
use crate::tape::Adjoints;

/// Adjoints of a node's output block as a `rows x cols` matrix.
pub(crate) fn output_adjoints(adj: &Adjoints<'_>, first: Slot, rows: usize, cols: usize) -> DMatrix<f64> {
    DMatrix::from_column_slice(rows, cols, adj.block(first, rows * cols))
}

/// A primal buffer saved in the arena, as a `rows x cols` matrix.
pub(crate) fn saved(adj: &Adjoints<'_>, span: Span<f64>, rows: usize, cols: usize) -> DMatrix<f64> {
    DMatrix::from_column_slice(rows, cols, adj.values(span))
}

/// Add `delta` (column-major) into the operand slots `refs`.
pub(crate) fn accumulate(adj: &mut Adjoints<'_>, refs: Span<Slot>, delta: &DMatrix<f64>) {
    let slots = adj.slots(refs);
    debug_assert_eq!(slots.len(), delta.len());
    for (&slot, &d) in slots.iter().zip(delta.iter()) {
        adj.accumulate(slot, d);
    }
}
