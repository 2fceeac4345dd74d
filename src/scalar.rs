//! The [`Scalar`] trait for writing AD-generic numeric code.
//!
//! Functions written as `fn f<T: Scalar>(x: T) -> T` work transparently with plain
//! `f64`, `Var`, `Fvar<f64>`, `Fvar<Var>` and deeper nestings.

use std::fmt::{Debug, Display};

use num_traits::FromPrimitive;

use crate::fvar::Fvar;
use crate::tape;
use crate::var::Var;

/// The central trait for AD-generic numeric code.
///
/// Every implementor is ultimately built on `f64`, so lifting and extracting
/// the primal value always goes through `f64`.
pub trait Scalar:
    num_traits::Float
    + num_traits::FloatConst
    + FromPrimitive
    + Copy
    + Default
    + Debug
    + Display
    + Send
    + 'static
{
    /// Lift a plain float to this scalar (constant, zero derivative).
    fn from_f(val: f64) -> Self;

    /// Extract the innermost primal value.
    fn value(&self) -> f64;

    /// Sum of a slice. Implementors may record it as a single operation.
    fn sum(xs: &[Self]) -> Self {
        xs.iter().fold(Self::zero(), |acc, &x| acc + x)
    }

    /// Inner product of two equal-length slices.
    fn dot(a: &[Self], b: &[Self]) -> Self {
        debug_assert_eq!(a.len(), b.len());
        a.iter()
            .zip(b)
            .fold(Self::zero(), |acc, (&x, &y)| acc + x * y)
    }
}

impl Scalar for f64 {
    #[inline]
    fn from_f(val: f64) -> Self {
        val
    }

    #[inline]
    fn value(&self) -> f64 {
        *self
    }
}

impl Scalar for Var {
    #[inline]
    fn from_f(val: f64) -> Self {
        Var::constant(val)
    }

    #[inline]
    fn value(&self) -> f64 {
        self.value
    }

    fn sum(xs: &[Self]) -> Self {
        let value: f64 = xs.iter().map(|x| x.value).sum();
        tape::with_active_tape(|t| {
            let index = t.push_nary(value, xs.iter().map(|x| (x.index, 1.0)));
            t.handle(value, index)
        })
    }

    fn dot(a: &[Self], b: &[Self]) -> Self {
        debug_assert_eq!(a.len(), b.len());
        let value: f64 = a.iter().zip(b).map(|(x, y)| x.value * y.value).sum();
        tape::with_active_tape(|t| {
            let partials = a
                .iter()
                .zip(b)
                .flat_map(|(x, y)| [(x.index, y.value), (y.index, x.value)]);
            let index = t.push_nary(value, partials);
            t.handle(value, index)
        })
    }
}

impl<T: Scalar> Scalar for Fvar<T> {
    #[inline]
    fn from_f(val: f64) -> Self {
        Fvar::constant(T::from_f(val))
    }

    #[inline]
    fn value(&self) -> f64 {
        self.val.value()
    }
}
