//! Error type for the checked (shape and domain) contracts of the matrix layer.
//!
//! Numeric degeneracy (division by zero, `ln` of a negative number, a singular
//! factor) is never an error: it shows up as `inf`/`nan` in values and
//! adjoints, exactly as IEEE arithmetic would produce it.

use thiserror::Error;

/// Errors raised by composite matrix operations.
///
/// Every variant is raised synchronously, before the operation touches the
/// tape, so a caller that handles the error can keep using the tape.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum MathError {
    /// Operand shapes violate the operation's contract (non-square factor,
    /// disagreeing row/column counts, mismatched vector lengths).
    #[error("{function}: dimension mismatch: {message}")]
    DimensionMismatch {
        /// Name of the operation that rejected its arguments.
        function: &'static str,
        /// Human-readable description of the offending shapes.
        message: String,
    },
    /// A structurally valid argument lies outside the operation's domain,
    /// e.g. a matrix passed to an SPD solve that is not symmetric.
    #[error("{function}: domain error: {message}")]
    Domain {
        function: &'static str,
        message: String,
    },
}

impl MathError {
    pub(crate) fn dimension(function: &'static str, message: impl Into<String>) -> Self {
        MathError::DimensionMismatch {
            function,
            message: message.into(),
        }
    }

    pub(crate) fn domain(function: &'static str, message: impl Into<String>) -> Self {
        MathError::Domain {
            function,
            message: message.into(),
        }
    }

    /// Name of the operation that raised the error.
    pub fn function(&self) -> &'static str {
        match self {
            MathError::DimensionMismatch { function, .. } | MathError::Domain { function, .. } => {
                function
            }
        }
    }

    /// `true` for [`MathError::DimensionMismatch`].
    pub fn is_dimension_mismatch(&self) -> bool {
        matches!(self, MathError::DimensionMismatch { .. })
    }
}
