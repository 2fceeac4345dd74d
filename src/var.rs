use std::fmt::{self, Display};

use crate::arena::Slot;
use crate::tape::{self, CONSTANT};

/// Reverse-mode AD variable.
///
/// A value plus the slot of its node on the active tape. `Copy` because the
/// tape lives in a thread-local, not inside this struct; copying a `Var`
/// copies the handle, never the node.
///
/// The handle also records the epoch of the tape it was created on. A tape
/// reset starts a new epoch and invalidates every older handle; debug builds
/// assert on misuse.
#[derive(Clone, Copy, Debug)]
pub struct Var {
    pub(crate) value: f64,
    pub(crate) index: Slot,
    pub(crate) epoch: u32,
}

impl Var {
    /// Register a new independent variable on the active tape.
    #[inline]
    pub fn new(value: f64) -> Self {
        tape::with_active_tape(|t| t.new_variable(value))
    }

    /// Create a constant (not tracked on tape).
    #[inline]
    pub fn constant(value: f64) -> Self {
        Var {
            value,
            index: CONSTANT,
            epoch: 0,
        }
    }

    /// Create a variable from a tape allocation.
    /// Typically only used internally by the tape and the matrix layer.
    #[inline]
    pub fn from_tape(value: f64, index: Slot, epoch: u32) -> Self {
        Var {
            value,
            index,
            epoch,
        }
    }

    #[inline]
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Get the tape slot (for advanced usage / testing).
    #[inline]
    pub fn index(&self) -> Slot {
        self.index
    }

    #[inline]
    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    #[inline]
    pub fn is_constant(&self) -> bool {
        self.index == CONSTANT
    }

    /// Adjoint accumulated at this variable on the active tape.
    pub fn adjoint(&self) -> f64 {
        tape::with_active_tape(|t| t.adjoint(self))
    }

    /// Run the reverse sweep from `self` on the active tape and return the
    /// adjoints of `inputs`.
    pub fn grad(&self, inputs: &[Var]) -> Vec<f64> {
        tape::with_active_tape(|t| t.gradient(*self, inputs))
    }
}

impl Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl Default for Var {
    fn default() -> Self {
        Var::constant(0.0)
    }
}

impl From<f64> for Var {
    fn from(value: f64) -> Self {
        Var::constant(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tape::{Tape, TapeGuard};

    #[test]
    fn constants_are_off_tape() {
        let c = Var::constant(2.5);
        assert!(c.is_constant());
        assert_eq!(c.value(), 2.5);
        assert_eq!(c.adjoint(), 0.0);
    }

    #[test]
    fn new_records_a_leaf() {
        let mut tape = Tape::new();
        let x = {
            let _guard = TapeGuard::new(&mut tape);
            Var::new(4.0)
        };
        assert!(!x.is_constant());
        assert_eq!(x.epoch(), tape.epoch());
        assert_eq!(tape.value(&x), 4.0);
    }
}
