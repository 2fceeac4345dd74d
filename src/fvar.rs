use std::fmt::{self, Display};

use num_traits::Float;

use crate::scalar::Scalar;

/// Forward-mode dual number: a value paired with its tangent.
///
/// `Fvar { val, d }` represents `val + d·ε` where `ε² = 0`. The component type
/// is any [`Scalar`], so `Fvar<Var>` gives forward-over-reverse and
/// `Fvar<Fvar<T>>` gives higher forward derivatives.
#[derive(Clone, Copy, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Fvar<T: Scalar> {
    /// Primal value.
    pub val: T,
    /// Tangent (directional derivative).
    pub d: T,
}

impl<T: Scalar> Display for Fvar<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} + {}ε", self.val, self.d)
    }
}

/// `1`, `-1`, `0` or NaN; zero maps to zero so `|x|` has slope 0 at the kink.
#[inline]
pub(crate) fn sign<T: Scalar>(x: T) -> T {
    if x > T::zero() {
        T::one()
    } else if x < T::zero() {
        -T::one()
    } else if x == T::zero() {
        T::zero()
    } else {
        T::nan()
    }
}

impl<T: Scalar> Fvar<T> {
    #[inline]
    pub fn new(val: T, d: T) -> Self {
        Fvar { val, d }
    }

    /// Create a constant (zero tangent).
    #[inline]
    pub fn constant(val: T) -> Self {
        Fvar { val, d: T::zero() }
    }

    /// Create a variable (unit tangent) for differentiation.
    #[inline]
    pub fn variable(val: T) -> Self {
        Fvar { val, d: T::one() }
    }

    #[inline]
    pub fn val(&self) -> T {
        self.val
    }

    #[inline]
    pub fn tangent(&self) -> T {
        self.d
    }

    /// Apply the chain rule: given `f(self.val)` and `f'(self.val)`, produce the dual result.
    #[inline]
    fn chain(self, f_val: T, f_deriv: T) -> Self {
        Fvar {
            val: f_val,
            d: self.d * f_deriv,
        }
    }

    #[inline]
    fn zero_tangent(val: T) -> Self {
        Fvar::constant(val)
    }

    // ── Powers ──

    #[inline]
    pub fn recip(self) -> Self {
        let inv = self.val.recip();
        self.chain(inv, -(inv * inv))
    }

    #[inline]
    pub fn sqrt(self) -> Self {
        let s = self.val.sqrt();
        self.chain(s, (T::from_f(2.0) * s).recip())
    }

    #[inline]
    pub fn cbrt(self) -> Self {
        let c = self.val.cbrt();
        self.chain(c, (T::from_f(3.0) * c * c).recip())
    }

    #[inline]
    pub fn powi(self, n: i32) -> Self {
        let val = self.val.powi(n);
        if n == 0 {
            return Fvar::zero_tangent(val);
        }
        let deriv = T::from_f(n as f64) * self.val.powi(n - 1);
        self.chain(val, deriv)
    }

    #[inline]
    pub fn powf(self, n: Self) -> Self {
        // d(x^y) = y x^(y-1) dx + x^y ln(x) dy
        let val = self.val.powf(n.val);
        let dx = n.val * self.val.powf(n.val - T::one());
        let mut d = self.d * dx;
        // the ln(x) term only exists for a varying exponent and a nonzero base
        if n.d != T::zero() && self.val != T::zero() {
            d = d + n.d * (val * self.val.ln());
        }
        Fvar { val, d }
    }

    /// `x^n` for a plain exponent; negative bases are fine.
    #[inline]
    pub fn powf_const(self, n: f64) -> Self {
        let val = self.val.powf(T::from_f(n));
        let deriv = T::from_f(n) * self.val.powf(T::from_f(n - 1.0));
        self.chain(val, deriv)
    }

    // ── Exp/Log ──

    #[inline]
    pub fn exp(self) -> Self {
        let e = self.val.exp();
        self.chain(e, e)
    }

    #[inline]
    pub fn exp2(self) -> Self {
        let e = self.val.exp2();
        self.chain(e, e * T::LN_2())
    }

    #[inline]
    pub fn exp_m1(self) -> Self {
        self.chain(self.val.exp_m1(), self.val.exp())
    }

    #[inline]
    pub fn ln(self) -> Self {
        self.chain(self.val.ln(), self.val.recip())
    }

    #[inline]
    pub fn log2(self) -> Self {
        self.chain(self.val.log2(), (self.val * T::LN_2()).recip())
    }

    #[inline]
    pub fn log10(self) -> Self {
        self.chain(self.val.log10(), (self.val * T::LN_10()).recip())
    }

    #[inline]
    pub fn ln_1p(self) -> Self {
        self.chain(self.val.ln_1p(), (T::one() + self.val).recip())
    }

    #[inline]
    pub fn log(self, base: Self) -> Self {
        self.ln() / base.ln()
    }

    // ── Trig ──

    #[inline]
    pub fn sin(self) -> Self {
        self.chain(self.val.sin(), self.val.cos())
    }

    #[inline]
    pub fn cos(self) -> Self {
        self.chain(self.val.cos(), -self.val.sin())
    }

    #[inline]
    pub fn tan(self) -> Self {
        let c = self.val.cos();
        self.chain(self.val.tan(), (c * c).recip())
    }

    #[inline]
    pub fn sin_cos(self) -> (Self, Self) {
        let (s, c) = self.val.sin_cos();
        (self.chain(s, c), self.chain(c, -s))
    }

    #[inline]
    pub fn asin(self) -> Self {
        self.chain(
            self.val.asin(),
            (T::one() - self.val * self.val).sqrt().recip(),
        )
    }

    #[inline]
    pub fn acos(self) -> Self {
        self.chain(
            self.val.acos(),
            -(T::one() - self.val * self.val).sqrt().recip(),
        )
    }

    #[inline]
    pub fn atan(self) -> Self {
        self.chain(self.val.atan(), (T::one() + self.val * self.val).recip())
    }

    #[inline]
    pub fn atan2(self, other: Self) -> Self {
        let denom = self.val * self.val + other.val * other.val;
        Fvar {
            val: self.val.atan2(other.val),
            d: (other.val * self.d - self.val * other.d) / denom,
        }
    }

    // ── Hyperbolic ──

    #[inline]
    pub fn sinh(self) -> Self {
        self.chain(self.val.sinh(), self.val.cosh())
    }

    #[inline]
    pub fn cosh(self) -> Self {
        self.chain(self.val.cosh(), self.val.sinh())
    }

    #[inline]
    pub fn tanh(self) -> Self {
        let t = self.val.tanh();
        self.chain(t, T::one() - t * t)
    }

    #[inline]
    pub fn asinh(self) -> Self {
        self.chain(
            self.val.asinh(),
            (self.val * self.val + T::one()).sqrt().recip(),
        )
    }

    #[inline]
    pub fn acosh(self) -> Self {
        self.chain(
            self.val.acosh(),
            (self.val * self.val - T::one()).sqrt().recip(),
        )
    }

    #[inline]
    pub fn atanh(self) -> Self {
        self.chain(self.val.atanh(), (T::one() - self.val * self.val).recip())
    }

    // ── Misc ──

    #[inline]
    pub fn abs(self) -> Self {
        self.chain(self.val.abs(), sign(self.val))
    }

    #[inline]
    pub fn signum(self) -> Self {
        Fvar::zero_tangent(self.val.signum())
    }

    #[inline]
    pub fn floor(self) -> Self {
        Fvar::zero_tangent(self.val.floor())
    }

    #[inline]
    pub fn ceil(self) -> Self {
        Fvar::zero_tangent(self.val.ceil())
    }

    #[inline]
    pub fn round(self) -> Self {
        Fvar::zero_tangent(self.val.round())
    }

    #[inline]
    pub fn trunc(self) -> Self {
        Fvar::zero_tangent(self.val.trunc())
    }

    #[inline]
    pub fn fract(self) -> Self {
        Fvar {
            val: self.val.fract(),
            d: self.d,
        }
    }

    #[inline]
    pub fn mul_add(self, a: Self, b: Self) -> Self {
        // d(x*a + b) = a*dx + x*da + db
        Fvar {
            val: self.val.mul_add(a.val, b.val),
            d: self.d * a.val + self.val * a.d + b.d,
        }
    }

    #[inline]
    pub fn hypot(self, other: Self) -> Self {
        let h = self.val.hypot(other.val);
        Fvar {
            val: h,
            d: (self.val * self.d + other.val * other.d) / h,
        }
    }

    #[inline]
    pub fn max(self, other: Self) -> Self {
        if self.val.is_nan() {
            return other;
        }
        if self.val >= other.val || other.val.is_nan() {
            self
        } else {
            other
        }
    }

    #[inline]
    pub fn min(self, other: Self) -> Self {
        if self.val.is_nan() {
            return other;
        }
        if self.val <= other.val || other.val.is_nan() {
            self
        } else {
            other
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn chain_rule_on_exp() {
        let x = Fvar::variable(0.5_f64);
        let y = x.exp();
        assert_relative_eq!(y.val, 0.5_f64.exp());
        assert_relative_eq!(y.d, 0.5_f64.exp());
    }

    #[test]
    fn abs_has_zero_slope_at_zero() {
        let y = Fvar::variable(0.0_f64).abs();
        assert_eq!(y.d, 0.0);
        let y = Fvar::variable(-2.0_f64).abs();
        assert_eq!(y.d, -1.0);
    }

    #[test]
    fn nested_second_derivative() {
        // f(x) = x^3, f''(x) = 6x
        let x = Fvar::new(Fvar::variable(2.0_f64), Fvar::constant(1.0));
        let y = x.powi(3);
        assert_relative_eq!(y.val.val, 8.0);
        assert_relative_eq!(y.d.val, 12.0);
        assert_relative_eq!(y.d.d, 12.0);
    }

    #[test]
    fn max_skips_nan() {
        let a = Fvar::new(f64::NAN, 1.0);
        let b = Fvar::new(3.0, 2.0);
        assert_eq!(a.max(b).d, 2.0);
        assert_eq!(b.min(a).d, 2.0);
    }
}
