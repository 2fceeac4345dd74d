use std::num::FpCategory;

use num_traits::{
    Float as NumFloat, FloatConst, FromPrimitive, Num, NumCast, One, Signed, ToPrimitive, Zero,
};

use crate::fvar::{sign, Fvar};
use crate::scalar::Scalar;
use crate::tape;
use crate::var::Var;

// ══════════════════════════════════════════════
//  Fvar<T>
// ══════════════════════════════════════════════

impl<T: Scalar> Zero for Fvar<T> {
    #[inline]
    fn zero() -> Self {
        Fvar::constant(T::zero())
    }
    #[inline]
    fn is_zero(&self) -> bool {
        self.val.is_zero()
    }
}

impl<T: Scalar> One for Fvar<T> {
    #[inline]
    fn one() -> Self {
        Fvar::constant(T::one())
    }
}

impl<T: Scalar> Num for Fvar<T> {
    type FromStrRadixErr = T::FromStrRadixErr;
    fn from_str_radix(str: &str, radix: u32) -> Result<Self, Self::FromStrRadixErr> {
        T::from_str_radix(str, radix).map(Fvar::constant)
    }
}

impl<T: Scalar> FromPrimitive for Fvar<T> {
    #[inline]
    fn from_i64(n: i64) -> Option<Self> {
        T::from_i64(n).map(Fvar::constant)
    }
    #[inline]
    fn from_u64(n: u64) -> Option<Self> {
        T::from_u64(n).map(Fvar::constant)
    }
    #[inline]
    fn from_f64(n: f64) -> Option<Self> {
        Some(Fvar::constant(T::from_f(n)))
    }
}

impl<T: Scalar> ToPrimitive for Fvar<T> {
    #[inline]
    fn to_i64(&self) -> Option<i64> {
        self.val.to_i64()
    }
    #[inline]
    fn to_u64(&self) -> Option<u64> {
        self.val.to_u64()
    }
    #[inline]
    fn to_f64(&self) -> Option<f64> {
        Some(self.value())
    }
}

impl<T: Scalar> NumCast for Fvar<T> {
    #[inline]
    fn from<N: ToPrimitive>(n: N) -> Option<Self> {
        n.to_f64().map(|v| Fvar::constant(T::from_f(v)))
    }
}

impl<T: Scalar> Signed for Fvar<T> {
    #[inline]
    fn abs(&self) -> Self {
        Fvar::abs(*self)
    }
    #[inline]
    fn abs_sub(&self, other: &Self) -> Self {
        if self.val > other.val {
            *self - *other
        } else {
            Self::zero()
        }
    }
    #[inline]
    fn signum(&self) -> Self {
        Fvar::signum(*self)
    }
    #[inline]
    fn is_positive(&self) -> bool {
        self.val.is_sign_positive()
    }
    #[inline]
    fn is_negative(&self) -> bool {
        self.val.is_sign_negative()
    }
}

#[rustfmt::skip]
impl<T: Scalar> FloatConst for Fvar<T> {
    fn E() -> Self { Fvar::constant(T::E()) }
    fn FRAC_1_PI() -> Self { Fvar::constant(T::FRAC_1_PI()) }
    fn FRAC_1_SQRT_2() -> Self { Fvar::constant(T::FRAC_1_SQRT_2()) }
    fn FRAC_2_PI() -> Self { Fvar::constant(T::FRAC_2_PI()) }
    fn FRAC_2_SQRT_PI() -> Self { Fvar::constant(T::FRAC_2_SQRT_PI()) }
    fn FRAC_PI_2() -> Self { Fvar::constant(T::FRAC_PI_2()) }
    fn FRAC_PI_3() -> Self { Fvar::constant(T::FRAC_PI_3()) }
    fn FRAC_PI_4() -> Self { Fvar::constant(T::FRAC_PI_4()) }
    fn FRAC_PI_6() -> Self { Fvar::constant(T::FRAC_PI_6()) }
    fn FRAC_PI_8() -> Self { Fvar::constant(T::FRAC_PI_8()) }
    fn LN_10() -> Self { Fvar::constant(T::LN_10()) }
    fn LN_2() -> Self { Fvar::constant(T::LN_2()) }
    fn LOG10_E() -> Self { Fvar::constant(T::LOG10_E()) }
    fn LOG2_E() -> Self { Fvar::constant(T::LOG2_E()) }
    fn PI() -> Self { Fvar::constant(T::PI()) }
    fn SQRT_2() -> Self { Fvar::constant(T::SQRT_2()) }
    fn TAU() -> Self { Fvar::constant(T::TAU()) }
    fn LOG10_2() -> Self { Fvar::constant(T::LOG10_2()) }
    fn LOG2_10() -> Self { Fvar::constant(T::LOG2_10()) }
}

#[rustfmt::skip]
impl<T: Scalar> NumFloat for Fvar<T> {
    fn nan() -> Self { Fvar::constant(T::nan()) }
    fn infinity() -> Self { Fvar::constant(T::infinity()) }
    fn neg_infinity() -> Self { Fvar::constant(T::neg_infinity()) }
    fn neg_zero() -> Self { Fvar::constant(T::neg_zero()) }

    fn min_value() -> Self { Fvar::constant(T::min_value()) }
    fn min_positive_value() -> Self { Fvar::constant(T::min_positive_value()) }
    fn max_value() -> Self { Fvar::constant(T::max_value()) }
    fn epsilon() -> Self { Fvar::constant(T::epsilon()) }

    fn is_nan(self) -> bool { self.val.is_nan() }
    fn is_infinite(self) -> bool { self.val.is_infinite() }
    fn is_finite(self) -> bool { self.val.is_finite() }
    fn is_normal(self) -> bool { self.val.is_normal() }
    fn is_sign_positive(self) -> bool { self.val.is_sign_positive() }
    fn is_sign_negative(self) -> bool { self.val.is_sign_negative() }
    fn classify(self) -> FpCategory { self.val.classify() }

    fn floor(self) -> Self { Fvar::floor(self) }
    fn ceil(self) -> Self { Fvar::ceil(self) }
    fn round(self) -> Self { Fvar::round(self) }
    fn trunc(self) -> Self { Fvar::trunc(self) }
    fn fract(self) -> Self { Fvar::fract(self) }
    fn abs(self) -> Self { Fvar::abs(self) }
    fn signum(self) -> Self { Fvar::signum(self) }

    fn mul_add(self, a: Self, b: Self) -> Self { Fvar::mul_add(self, a, b) }

    fn recip(self) -> Self { Fvar::recip(self) }
    fn powi(self, n: i32) -> Self { Fvar::powi(self, n) }
    fn powf(self, n: Self) -> Self { Fvar::powf(self, n) }
    fn sqrt(self) -> Self { Fvar::sqrt(self) }
    fn cbrt(self) -> Self { Fvar::cbrt(self) }

    fn exp(self) -> Self { Fvar::exp(self) }
    fn exp2(self) -> Self { Fvar::exp2(self) }
    fn exp_m1(self) -> Self { Fvar::exp_m1(self) }
    fn ln(self) -> Self { Fvar::ln(self) }
    fn log2(self) -> Self { Fvar::log2(self) }
    fn log10(self) -> Self { Fvar::log10(self) }
    fn ln_1p(self) -> Self { Fvar::ln_1p(self) }
    fn log(self, base: Self) -> Self { Fvar::log(self, base) }

    fn sin(self) -> Self { Fvar::sin(self) }
    fn cos(self) -> Self { Fvar::cos(self) }
    fn tan(self) -> Self { Fvar::tan(self) }
    fn sin_cos(self) -> (Self, Self) { Fvar::sin_cos(self) }
    fn asin(self) -> Self { Fvar::asin(self) }
    fn acos(self) -> Self { Fvar::acos(self) }
    fn atan(self) -> Self { Fvar::atan(self) }
    fn atan2(self, other: Self) -> Self { Fvar::atan2(self, other) }

    fn sinh(self) -> Self { Fvar::sinh(self) }
    fn cosh(self) -> Self { Fvar::cosh(self) }
    fn tanh(self) -> Self { Fvar::tanh(self) }
    fn asinh(self) -> Self { Fvar::asinh(self) }
    fn acosh(self) -> Self { Fvar::acosh(self) }
    fn atanh(self) -> Self { Fvar::atanh(self) }

    fn hypot(self, other: Self) -> Self { Fvar::hypot(self, other) }

    fn max(self, other: Self) -> Self { Fvar::max(self, other) }
    fn min(self, other: Self) -> Self { Fvar::min(self, other) }

    fn abs_sub(self, other: Self) -> Self {
        if self.val > other.val { self - other } else { Self::zero() }
    }

    fn integer_decode(self) -> (u64, i16, i8) { self.val.integer_decode() }

    fn to_degrees(self) -> Self {
        self * (180.0 / std::f64::consts::PI)
    }

    fn to_radians(self) -> Self {
        self * (std::f64::consts::PI / 180.0)
    }
}

// ══════════════════════════════════════════════
//  Var
// ══════════════════════════════════════════════

impl Zero for Var {
    #[inline]
    fn zero() -> Self {
        Var::constant(0.0)
    }
    #[inline]
    fn is_zero(&self) -> bool {
        self.value == 0.0
    }
}

impl One for Var {
    #[inline]
    fn one() -> Self {
        Var::constant(1.0)
    }
}

impl Num for Var {
    type FromStrRadixErr = <f64 as Num>::FromStrRadixErr;
    fn from_str_radix(str: &str, radix: u32) -> Result<Self, Self::FromStrRadixErr> {
        f64::from_str_radix(str, radix).map(Var::constant)
    }
}

impl FromPrimitive for Var {
    #[inline]
    fn from_i64(n: i64) -> Option<Self> {
        Some(Var::constant(n as f64))
    }
    #[inline]
    fn from_u64(n: u64) -> Option<Self> {
        Some(Var::constant(n as f64))
    }
    #[inline]
    fn from_f64(n: f64) -> Option<Self> {
        Some(Var::constant(n))
    }
}

impl ToPrimitive for Var {
    #[inline]
    fn to_i64(&self) -> Option<i64> {
        self.value.to_i64()
    }
    #[inline]
    fn to_u64(&self) -> Option<u64> {
        self.value.to_u64()
    }
    #[inline]
    fn to_f64(&self) -> Option<f64> {
        Some(self.value)
    }
}

impl NumCast for Var {
    #[inline]
    fn from<N: ToPrimitive>(n: N) -> Option<Self> {
        n.to_f64().map(Var::constant)
    }
}

impl Signed for Var {
    #[inline]
    fn abs(&self) -> Self {
        NumFloat::abs(*self)
    }
    #[inline]
    fn abs_sub(&self, other: &Self) -> Self {
        if self.value > other.value {
            *self - *other
        } else {
            Self::zero()
        }
    }
    #[inline]
    fn signum(&self) -> Self {
        Var::constant(self.value.signum())
    }
    #[inline]
    fn is_positive(&self) -> bool {
        self.value.is_sign_positive()
    }
    #[inline]
    fn is_negative(&self) -> bool {
        self.value.is_sign_negative()
    }
}

#[rustfmt::skip]
impl FloatConst for Var {
    fn E() -> Self { Var::constant(f64::E()) }
    fn FRAC_1_PI() -> Self { Var::constant(f64::FRAC_1_PI()) }
    fn FRAC_1_SQRT_2() -> Self { Var::constant(f64::FRAC_1_SQRT_2()) }
    fn FRAC_2_PI() -> Self { Var::constant(f64::FRAC_2_PI()) }
    fn FRAC_2_SQRT_PI() -> Self { Var::constant(f64::FRAC_2_SQRT_PI()) }
    fn FRAC_PI_2() -> Self { Var::constant(f64::FRAC_PI_2()) }
    fn FRAC_PI_3() -> Self { Var::constant(f64::FRAC_PI_3()) }
    fn FRAC_PI_4() -> Self { Var::constant(f64::FRAC_PI_4()) }
    fn FRAC_PI_6() -> Self { Var::constant(f64::FRAC_PI_6()) }
    fn FRAC_PI_8() -> Self { Var::constant(f64::FRAC_PI_8()) }
    fn LN_10() -> Self { Var::constant(f64::LN_10()) }
    fn LN_2() -> Self { Var::constant(f64::LN_2()) }
    fn LOG10_E() -> Self { Var::constant(f64::LOG10_E()) }
    fn LOG2_E() -> Self { Var::constant(f64::LOG2_E()) }
    fn PI() -> Self { Var::constant(f64::PI()) }
    fn SQRT_2() -> Self { Var::constant(f64::SQRT_2()) }
    fn TAU() -> Self { Var::constant(f64::TAU()) }
    fn LOG10_2() -> Self { Var::constant(f64::LOG10_2()) }
    fn LOG2_10() -> Self { Var::constant(f64::LOG2_10()) }
}

/// Helper: record a unary elemental on the active tape.
#[inline]
fn rev_unary(x: Var, f_val: f64, f_deriv: f64) -> Var {
    tape::with_active_tape(|t| {
        let index = t.push_unary(f_val, x.index, f_deriv);
        t.handle(f_val, index)
    })
}

/// Helper: record a binary elemental on the active tape.
#[inline]
fn rev_binary(x: Var, y: Var, f_val: f64, dx: f64, dy: f64) -> Var {
    tape::with_active_tape(|t| {
        let index = t.push_binary(f_val, x.index, dx, y.index, dy);
        t.handle(f_val, index)
    })
}

#[rustfmt::skip]
impl NumFloat for Var {
    fn nan() -> Self { Var::constant(f64::NAN) }
    fn infinity() -> Self { Var::constant(f64::INFINITY) }
    fn neg_infinity() -> Self { Var::constant(f64::NEG_INFINITY) }
    fn neg_zero() -> Self { Var::constant(-0.0) }

    fn min_value() -> Self { Var::constant(f64::MIN) }
    fn min_positive_value() -> Self { Var::constant(f64::MIN_POSITIVE) }
    fn max_value() -> Self { Var::constant(f64::MAX) }
    fn epsilon() -> Self { Var::constant(f64::EPSILON) }

    fn is_nan(self) -> bool { self.value.is_nan() }
    fn is_infinite(self) -> bool { self.value.is_infinite() }
    fn is_finite(self) -> bool { self.value.is_finite() }
    fn is_normal(self) -> bool { self.value.is_normal() }
    fn is_sign_positive(self) -> bool { self.value.is_sign_positive() }
    fn is_sign_negative(self) -> bool { self.value.is_sign_negative() }
    fn classify(self) -> FpCategory { self.value.classify() }

    fn floor(self) -> Self { Var::constant(self.value.floor()) }
    fn ceil(self) -> Self { Var::constant(self.value.ceil()) }
    fn round(self) -> Self { Var::constant(self.value.round()) }
    fn trunc(self) -> Self { Var::constant(self.value.trunc()) }
    fn fract(self) -> Self {
        rev_unary(self, self.value.fract(), 1.0)
    }
    fn abs(self) -> Self {
        rev_unary(self, self.value.abs(), sign(self.value))
    }
    fn signum(self) -> Self {
        Var::constant(self.value.signum())
    }

    fn mul_add(self, a: Self, b: Self) -> Self {
        // d(x*a + b)/dx = a, d/da = x, d/db = 1
        let value = self.value.mul_add(a.value, b.value);
        tape::with_active_tape(|t| {
            let index = t.push_nary(
                value,
                [(self.index, a.value), (a.index, self.value), (b.index, 1.0)],
            );
            t.handle(value, index)
        })
    }

    fn recip(self) -> Self {
        let inv = 1.0 / self.value;
        rev_unary(self, inv, -inv * inv)
    }

    fn powi(self, n: i32) -> Self {
        let val = self.value.powi(n);
        let deriv = if n == 0 { 0.0 } else { n as f64 * self.value.powi(n - 1) };
        rev_unary(self, val, deriv)
    }

    fn powf(self, n: Self) -> Self {
        let val = self.value.powf(n.value);
        let dx = n.value * self.value.powf(n.value - 1.0);
        // 0^y: the exponent partial would be 0 * ln(0)
        let dy = if self.value == 0.0 { 0.0 } else { val * self.value.ln() };
        rev_binary(self, n, val, dx, dy)
    }

    fn sqrt(self) -> Self {
        let s = self.value.sqrt();
        rev_unary(self, s, 0.5 / s)
    }

    fn cbrt(self) -> Self {
        let c = self.value.cbrt();
        rev_unary(self, c, 1.0 / (3.0 * c * c))
    }

    fn exp(self) -> Self {
        let e = self.value.exp();
        rev_unary(self, e, e)
    }

    fn exp2(self) -> Self {
        let e = self.value.exp2();
        rev_unary(self, e, e * std::f64::consts::LN_2)
    }

    fn exp_m1(self) -> Self {
        rev_unary(self, self.value.exp_m1(), self.value.exp())
    }

    fn ln(self) -> Self {
        rev_unary(self, self.value.ln(), 1.0 / self.value)
    }

    fn log2(self) -> Self {
        rev_unary(self, self.value.log2(), 1.0 / (self.value * std::f64::consts::LN_2))
    }

    fn log10(self) -> Self {
        rev_unary(self, self.value.log10(), 1.0 / (self.value * std::f64::consts::LN_10))
    }

    fn ln_1p(self) -> Self {
        rev_unary(self, self.value.ln_1p(), 1.0 / (1.0 + self.value))
    }

    fn log(self, base: Self) -> Self {
        self.ln() / base.ln()
    }

    fn sin(self) -> Self {
        rev_unary(self, self.value.sin(), self.value.cos())
    }

    fn cos(self) -> Self {
        rev_unary(self, self.value.cos(), -self.value.sin())
    }

    fn tan(self) -> Self {
        let c = self.value.cos();
        rev_unary(self, self.value.tan(), 1.0 / (c * c))
    }

    fn sin_cos(self) -> (Self, Self) {
        let (s, c) = self.value.sin_cos();
        (rev_unary(self, s, c), rev_unary(self, c, -s))
    }

    fn asin(self) -> Self {
        rev_unary(self, self.value.asin(), 1.0 / (1.0 - self.value * self.value).sqrt())
    }

    fn acos(self) -> Self {
        rev_unary(self, self.value.acos(), -1.0 / (1.0 - self.value * self.value).sqrt())
    }

    fn atan(self) -> Self {
        rev_unary(self, self.value.atan(), 1.0 / (1.0 + self.value * self.value))
    }

    fn atan2(self, other: Self) -> Self {
        let denom = self.value * self.value + other.value * other.value;
        let dx = other.value / denom;
        let dy = -self.value / denom;
        rev_binary(self, other, self.value.atan2(other.value), dx, dy)
    }

    fn sinh(self) -> Self {
        rev_unary(self, self.value.sinh(), self.value.cosh())
    }

    fn cosh(self) -> Self {
        rev_unary(self, self.value.cosh(), self.value.sinh())
    }

    fn tanh(self) -> Self {
        let t = self.value.tanh();
        rev_unary(self, t, 1.0 - t * t)
    }

    fn asinh(self) -> Self {
        rev_unary(self, self.value.asinh(), 1.0 / (self.value * self.value + 1.0).sqrt())
    }

    fn acosh(self) -> Self {
        rev_unary(self, self.value.acosh(), 1.0 / (self.value * self.value - 1.0).sqrt())
    }

    fn atanh(self) -> Self {
        rev_unary(self, self.value.atanh(), 1.0 / (1.0 - self.value * self.value))
    }

    fn hypot(self, other: Self) -> Self {
        let h = self.value.hypot(other.value);
        rev_binary(self, other, h, self.value / h, other.value / h)
    }

    fn max(self, other: Self) -> Self {
        // NaN loses, as in f64::max; ties go to `self`.
        if self.value.is_nan() || other.value > self.value {
            other
        } else {
            self
        }
    }

    fn min(self, other: Self) -> Self {
        if self.value.is_nan() || other.value < self.value {
            other
        } else {
            self
        }
    }

    fn abs_sub(self, other: Self) -> Self {
        if self.value > other.value { self - other } else { Self::zero() }
    }

    fn integer_decode(self) -> (u64, i16, i8) {
        self.value.integer_decode()
    }

    fn to_degrees(self) -> Self {
        rev_unary(self, self.value.to_degrees(), 180.0 / std::f64::consts::PI)
    }

    fn to_radians(self) -> Self {
        rev_unary(self, self.value.to_radians(), std::f64::consts::PI / 180.0)
    }
}
