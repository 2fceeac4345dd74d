//! Matrix plumbing shared by the reverse- and forward-mode matrix functions.
//!
//! Matrices are `nalgebra::DMatrix`, stored column-major; every buffer a
//! composite node keeps (primal values, operand slots, output block) uses the
//! same column-major flattening.

pub mod check;
pub mod linalg;

use nalgebra::DMatrix;

use crate::arena::{Slot, Span};
use crate::tape::{self, Tape, CONSTANT};
use crate::var::Var;

/// Element type accepted by the reverse-mode matrix operations: `f64` for
/// data, `Var` for parameters.
pub trait Operand: nalgebra::Scalar + Copy {
    /// `true` when elements of this type can carry gradients.
    const DIFFERENTIABLE: bool;

    fn primal(&self) -> f64;

    /// Tape slot of the element, [`CONSTANT`] for data.
    fn slot(&self) -> Slot;
}

impl Operand for f64 {
    const DIFFERENTIABLE: bool = false;

    #[inline]
    fn primal(&self) -> f64 {
        *self
    }

    #[inline]
    fn slot(&self) -> Slot {
        CONSTANT
    }
}

impl Operand for Var {
    const DIFFERENTIABLE: bool = true;

    #[inline]
    fn primal(&self) -> f64 {
        self.value
    }

    #[inline]
    fn slot(&self) -> Slot {
        self.index
    }
}

/// Register every entry of `m` as an independent variable on the active tape.
pub fn to_var(m: &DMatrix<f64>) -> DMatrix<Var> {
    tape::with_active_tape(|t| m.map(|x| t.new_variable(x)))
}

/// Primal values of a matrix of operands.
pub fn value_of<T: Operand>(m: &DMatrix<T>) -> DMatrix<f64> {
    m.map(|x| x.primal())
}

/// Adjoints of a matrix of variables on the active tape.
pub fn adjoint_of(m: &DMatrix<Var>) -> DMatrix<f64> {
    tape::with_active_tape(|t| m.map(|x| t.adjoint(&x)))
}

/// Copy the operand slots of `m` into the arena, or `None` for data.
pub(crate) fn operand_slots<T: Operand>(tape: &mut Tape, m: &DMatrix<T>) -> Option<Span<Slot>> {
    if T::DIFFERENTIABLE {
        Some(tape.arena_mut().alloc_slots(m.iter().map(Operand::slot)))
    } else {
        None
    }
}

/// Allocate the output block for `values` and wrap it as a matrix of `Var`s.
pub(crate) fn output_block(tape: &mut Tape, values: &DMatrix<f64>) -> (Slot, DMatrix<Var>) {
    let first = tape.push_outputs(values.as_slice());
    let rows = values.nrows();
    let epoch = tape.epoch();
    let out = DMatrix::from_fn(rows, values.ncols(), |i, j| {
        Var::from_tape(values[(i, j)], first + (i + j * rows) as Slot, epoch)
    });
    (first, out)
}

/// A matrix of constants, for operations whose operands are all data.
pub(crate) fn constant_matrix(values: &DMatrix<f64>) -> DMatrix<Var> {
    values.map(Var::constant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tape::TapeGuard;

    #[test]
    fn output_block_is_column_major() {
        let mut tape = Tape::new();
        let values = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let (first, out) = output_block(&mut tape, &values);
        assert_eq!(out[(1, 0)].index(), first + 1);
        assert_eq!(out[(0, 1)].index(), first + 2);
        assert_eq!(out[(0, 1)].value(), 2.0);
        assert_eq!(tape.len(), 0);
    }

    #[test]
    fn to_var_registers_leaves() {
        let mut tape = Tape::new();
        let m = {
            let _guard = TapeGuard::new(&mut tape);
            to_var(&DMatrix::from_row_slice(1, 3, &[1.0, 2.0, 3.0]))
        };
        assert_eq!(tape.num_variables(), 3);
        assert_eq!(value_of(&m), DMatrix::from_row_slice(1, 3, &[1.0, 2.0, 3.0]));
        assert!(operand_slots(&mut tape, &m).is_some());
        assert!(operand_slots(&mut tape, &value_of(&m)).is_none());
    }
}
