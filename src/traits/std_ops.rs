use std::ops::{
    Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Rem, RemAssign, Sub, SubAssign,
};

use crate::fvar::Fvar;
use crate::scalar::Scalar;
use crate::tape;
use crate::var::Var;

// ──────────────────────────────────────────────
//  Fvar<T> operators
// ──────────────────────────────────────────────

impl<T: Scalar> Add for Fvar<T> {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Fvar {
            val: self.val + rhs.val,
            d: self.d + rhs.d,
        }
    }
}

impl<T: Scalar> Sub for Fvar<T> {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Fvar {
            val: self.val - rhs.val,
            d: self.d - rhs.d,
        }
    }
}

impl<T: Scalar> Mul for Fvar<T> {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        Fvar {
            val: self.val * rhs.val,
            d: self.val * rhs.d + self.d * rhs.val,
        }
    }
}

impl<T: Scalar> Div for Fvar<T> {
    type Output = Self;
    #[inline]
    fn div(self, rhs: Self) -> Self {
        let inv = rhs.val.recip();
        let val = self.val * inv;
        Fvar {
            val,
            d: (self.d - val * rhs.d) * inv,
        }
    }
}

impl<T: Scalar> Neg for Fvar<T> {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Fvar {
            val: -self.val,
            d: -self.d,
        }
    }
}

impl<T: Scalar> Rem for Fvar<T> {
    type Output = Self;
    #[inline]
    fn rem(self, rhs: Self) -> Self {
        // a % b = a - trunc(a / b) * b
        let q = (self.val / rhs.val).trunc();
        Fvar {
            val: self.val % rhs.val,
            d: self.d - q * rhs.d,
        }
    }
}

impl<T: Scalar> AddAssign for Fvar<T> {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl<T: Scalar> SubAssign for Fvar<T> {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl<T: Scalar> MulAssign for Fvar<T> {
    #[inline]
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl<T: Scalar> DivAssign for Fvar<T> {
    #[inline]
    fn div_assign(&mut self, rhs: Self) {
        *self = *self / rhs;
    }
}

impl<T: Scalar> RemAssign for Fvar<T> {
    #[inline]
    fn rem_assign(&mut self, rhs: Self) {
        *self = *self % rhs;
    }
}

// Mixed ops: Fvar<T> with f64. The constant is lifted into T, so the tangent
// arithmetic stays in T (and records on the tape when T involves Var).
impl<T: Scalar> Add<f64> for Fvar<T> {
    type Output = Fvar<T>;
    #[inline]
    fn add(self, rhs: f64) -> Fvar<T> {
        Fvar {
            val: self.val + T::from_f(rhs),
            d: self.d,
        }
    }
}

impl<T: Scalar> Add<Fvar<T>> for f64 {
    type Output = Fvar<T>;
    #[inline]
    fn add(self, rhs: Fvar<T>) -> Fvar<T> {
        rhs + self
    }
}

impl<T: Scalar> Sub<f64> for Fvar<T> {
    type Output = Fvar<T>;
    #[inline]
    fn sub(self, rhs: f64) -> Fvar<T> {
        Fvar {
            val: self.val - T::from_f(rhs),
            d: self.d,
        }
    }
}

impl<T: Scalar> Sub<Fvar<T>> for f64 {
    type Output = Fvar<T>;
    #[inline]
    fn sub(self, rhs: Fvar<T>) -> Fvar<T> {
        Fvar {
            val: T::from_f(self) - rhs.val,
            d: -rhs.d,
        }
    }
}

impl<T: Scalar> Mul<f64> for Fvar<T> {
    type Output = Fvar<T>;
    #[inline]
    fn mul(self, rhs: f64) -> Fvar<T> {
        let c = T::from_f(rhs);
        Fvar {
            val: self.val * c,
            d: self.d * c,
        }
    }
}

impl<T: Scalar> Mul<Fvar<T>> for f64 {
    type Output = Fvar<T>;
    #[inline]
    fn mul(self, rhs: Fvar<T>) -> Fvar<T> {
        rhs * self
    }
}

impl<T: Scalar> Div<f64> for Fvar<T> {
    type Output = Fvar<T>;
    #[inline]
    fn div(self, rhs: f64) -> Fvar<T> {
        let c = T::from_f(rhs);
        Fvar {
            val: self.val / c,
            d: self.d / c,
        }
    }
}

impl<T: Scalar> Div<Fvar<T>> for f64 {
    type Output = Fvar<T>;
    #[inline]
    fn div(self, rhs: Fvar<T>) -> Fvar<T> {
        let inv = rhs.val.recip();
        let val = T::from_f(self) * inv;
        Fvar {
            val,
            d: -(val * rhs.d * inv),
        }
    }
}

impl<T: Scalar> Rem<f64> for Fvar<T> {
    type Output = Fvar<T>;
    #[inline]
    fn rem(self, rhs: f64) -> Fvar<T> {
        Fvar {
            val: self.val % T::from_f(rhs),
            d: self.d,
        }
    }
}

impl<T: Scalar> Rem<Fvar<T>> for f64 {
    type Output = Fvar<T>;
    #[inline]
    fn rem(self, rhs: Fvar<T>) -> Fvar<T> {
        Fvar::constant(T::from_f(self)) % rhs
    }
}

impl<T: Scalar> PartialEq for Fvar<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.val == other.val
    }
}

impl<T: Scalar> PartialOrd for Fvar<T> {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.val.partial_cmp(&other.val)
    }
}

// ──────────────────────────────────────────────
//  Var operators
// ──────────────────────────────────────────────

#[inline]
fn record_binary(value: f64, lhs: Var, dl: f64, rhs: Var, dr: f64) -> Var {
    tape::with_active_tape(|t| {
        let index = t.push_binary(value, lhs.index, dl, rhs.index, dr);
        t.handle(value, index)
    })
}

#[inline]
fn record_unary(value: f64, x: Var, dx: f64) -> Var {
    tape::with_active_tape(|t| {
        let index = t.push_unary(value, x.index, dx);
        t.handle(value, index)
    })
}

impl Add for Var {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        record_binary(self.value + rhs.value, self, 1.0, rhs, 1.0)
    }
}

impl Sub for Var {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        record_binary(self.value - rhs.value, self, 1.0, rhs, -1.0)
    }
}

impl Mul for Var {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        record_binary(self.value * rhs.value, self, rhs.value, rhs, self.value)
    }
}

impl Div for Var {
    type Output = Self;
    #[inline]
    fn div(self, rhs: Self) -> Self {
        let inv = 1.0 / rhs.value;
        let value = self.value * inv;
        record_binary(value, self, inv, rhs, -value * inv)
    }
}

impl Neg for Var {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        record_unary(-self.value, self, -1.0)
    }
}

impl Rem for Var {
    type Output = Self;
    #[inline]
    fn rem(self, rhs: Self) -> Self {
        let q = (self.value / rhs.value).trunc();
        record_binary(self.value % rhs.value, self, 1.0, rhs, -q)
    }
}

impl AddAssign for Var {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for Var {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl MulAssign for Var {
    #[inline]
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl DivAssign for Var {
    #[inline]
    fn div_assign(&mut self, rhs: Self) {
        *self = *self / rhs;
    }
}

impl RemAssign for Var {
    #[inline]
    fn rem_assign(&mut self, rhs: Self) {
        *self = *self % rhs;
    }
}

impl Add<f64> for Var {
    type Output = Var;
    #[inline]
    fn add(self, rhs: f64) -> Var {
        record_unary(self.value + rhs, self, 1.0)
    }
}

impl Add<Var> for f64 {
    type Output = Var;
    #[inline]
    fn add(self, rhs: Var) -> Var {
        record_unary(self + rhs.value, rhs, 1.0)
    }
}

impl Sub<f64> for Var {
    type Output = Var;
    #[inline]
    fn sub(self, rhs: f64) -> Var {
        record_unary(self.value - rhs, self, 1.0)
    }
}

impl Sub<Var> for f64 {
    type Output = Var;
    #[inline]
    fn sub(self, rhs: Var) -> Var {
        record_unary(self - rhs.value, rhs, -1.0)
    }
}

impl Mul<f64> for Var {
    type Output = Var;
    #[inline]
    fn mul(self, rhs: f64) -> Var {
        record_unary(self.value * rhs, self, rhs)
    }
}

impl Mul<Var> for f64 {
    type Output = Var;
    #[inline]
    fn mul(self, rhs: Var) -> Var {
        record_unary(self * rhs.value, rhs, self)
    }
}

impl Div<f64> for Var {
    type Output = Var;
    #[inline]
    fn div(self, rhs: f64) -> Var {
        let inv = 1.0 / rhs;
        record_unary(self.value * inv, self, inv)
    }
}

impl Div<Var> for f64 {
    type Output = Var;
    #[inline]
    fn div(self, rhs: Var) -> Var {
        let inv = 1.0 / rhs.value;
        let value = self * inv;
        record_unary(value, rhs, -value * inv)
    }
}

impl Rem<f64> for Var {
    type Output = Var;
    #[inline]
    fn rem(self, rhs: f64) -> Var {
        record_unary(self.value % rhs, self, 1.0)
    }
}

impl Rem<Var> for f64 {
    type Output = Var;
    #[inline]
    fn rem(self, rhs: Var) -> Var {
        let q = (self / rhs.value).trunc();
        record_unary(self % rhs.value, rhs, -q)
    }
}

impl PartialEq for Var {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl PartialOrd for Var {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.value.partial_cmp(&other.value)
    }
}

impl PartialEq<f64> for Var {
    #[inline]
    fn eq(&self, other: &f64) -> bool {
        self.value == *other
    }
}

impl PartialOrd<f64> for Var {
    #[inline]
    fn partial_cmp(&self, other: &f64) -> Option<std::cmp::Ordering> {
        self.value.partial_cmp(other)
    }
}

impl std::iter::Sum for Var {
    fn sum<I: Iterator<Item = Var>>(iter: I) -> Var {
        let xs: Vec<Var> = iter.collect();
        <Var as Scalar>::sum(&xs)
    }
}
