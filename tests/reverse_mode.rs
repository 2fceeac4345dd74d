use agrad::tape::{Tape, TapeGuard};
use agrad::Var;
use approx::assert_relative_eq;
use num_traits::Float;

/// Run a single-variable reverse-mode differentiation on a private tape.
fn reverse_grad(f: impl FnOnce(Var) -> Var, x_val: f64) -> f64 {
    let mut tape = Tape::new();
    let x = tape.new_variable(x_val);
    let y = {
        let _guard = TapeGuard::new(&mut tape);
        f(x)
    };
    tape.gradient(y, &[x])[0]
}

/// Two-variable version, returning both partials.
fn reverse_grad2(f: impl FnOnce(Var, Var) -> Var, x_val: f64, y_val: f64) -> [f64; 2] {
    let mut tape = Tape::new();
    let x = tape.new_variable(x_val);
    let y = tape.new_variable(y_val);
    let z = {
        let _guard = TapeGuard::new(&mut tape);
        f(x, y)
    };
    let g = tape.gradient(z, &[x, y]);
    [g[0], g[1]]
}

/// Central finite difference for comparison.
fn finite_diff(f: impl Fn(f64) -> f64, x: f64) -> f64 {
    let h = 1e-6;
    (f(x + h) - f(x - h)) / (2.0 * h)
}

fn check_elemental(f_rev: impl FnOnce(Var) -> Var, f_f64: impl Fn(f64) -> f64, x: f64) {
    let grad = reverse_grad(f_rev, x);
    let expected = finite_diff(&f_f64, x);
    assert_relative_eq!(grad, expected, epsilon = 1e-6, max_relative = 1e-5);
}

// ── Arithmetic ──

#[test]
fn x_squared() {
    assert_relative_eq!(reverse_grad(|x| x * x, 3.0), 6.0, max_relative = 1e-12);
}

#[test]
fn x_times_y() {
    let g = reverse_grad2(|x, y| x * y, 3.0, 4.0);
    assert_relative_eq!(g[0], 4.0); // dz/dx = y
    assert_relative_eq!(g[1], 3.0); // dz/dy = x
}

#[test]
fn quotient() {
    let g = reverse_grad2(|x, y| x / y, 3.0, 4.0);
    assert_relative_eq!(g[0], 0.25);
    assert_relative_eq!(g[1], -3.0 / 16.0);
}

#[test]
fn remainder() {
    // 7.5 % 2 = 1.5; d/dx = 1, d/dy = -trunc(7.5 / 2) = -3
    let g = reverse_grad2(|x, y| x % y, 7.5, 2.0);
    assert_relative_eq!(g[0], 1.0);
    assert_relative_eq!(g[1], -3.0);
}

#[test]
fn mixed_with_f64() {
    check_elemental(|x| 2.0 * x + 1.0, |x| 2.0 * x + 1.0, 0.7);
    check_elemental(|x| 3.0 - x, |x| 3.0 - x, 0.7);
    check_elemental(|x| 2.0 / x, |x| 2.0 / x, 0.7);
    check_elemental(|x| x / 4.0 - 1.0, |x| x / 4.0 - 1.0, 0.7);
}

#[test]
fn diamond_pattern() {
    // z = x² + x³, dz/dx = 2x + 3x²
    let grad = reverse_grad(|x| x * x + x * x * x, 2.0);
    assert_relative_eq!(grad, 4.0 + 12.0, max_relative = 1e-12);
}

#[test]
fn fan_out() {
    let grad = reverse_grad(|x| x + x + x, 5.0);
    assert_relative_eq!(grad, 3.0, max_relative = 1e-12);
}

#[test]
fn chain_depth() {
    // y = ((x²)²)² = x^8
    let grad = reverse_grad(
        |x| {
            let a = x * x;
            let b = a * a;
            b * b
        },
        2.0,
    );
    assert_relative_eq!(grad, 8.0 * 2.0_f64.powi(7), max_relative = 1e-10);
}

#[test]
fn compound_assignment() {
    let grad = reverse_grad(
        |x| {
            let mut y = x;
            y *= x;
            y += 3.0;
            y -= x;
            y /= 2.0;
            y
        },
        3.0,
    );
    // (x² + 3 - x) / 2 → (2x - 1) / 2
    assert_relative_eq!(grad, 2.5);
}

// ── Elementary functions against finite differences ──

#[test]
fn exp_and_log_family() {
    check_elemental(|x| x.exp(), f64::exp, 0.8);
    check_elemental(|x| x.exp2(), f64::exp2, 0.8);
    check_elemental(|x| x.exp_m1(), f64::exp_m1, 0.8);
    check_elemental(|x| x.ln(), f64::ln, 0.8);
    check_elemental(|x| x.log2(), f64::log2, 0.8);
    check_elemental(|x| x.log10(), f64::log10, 0.8);
    check_elemental(|x| x.ln_1p(), f64::ln_1p, 0.8);
    check_elemental(|x| x.log(Var::constant(3.0)), |x| x.log(3.0), 0.8);
}

#[test]
fn powers() {
    check_elemental(|x| x.sqrt(), f64::sqrt, 1.7);
    check_elemental(|x| x.cbrt(), f64::cbrt, 1.7);
    check_elemental(|x| x.recip(), f64::recip, 1.7);
    check_elemental(|x| x.powi(3), |x| x.powi(3), 1.7);
    check_elemental(|x| x.powi(-2), |x| x.powi(-2), 1.7);
    check_elemental(|x| x.powf(Var::constant(2.5)), |x| x.powf(2.5), 1.7);
    check_elemental(|x| Var::constant(2.5).powf(x), |x| 2.5f64.powf(x), 1.7);
}

#[test]
fn powf_at_zero_or_negative_base() {
    // 0^y: no ln(0) in the exponent partial
    assert_eq!(reverse_grad2(|x, y| x.powf(y), 0.0, 2.0), [0.0, 0.0]);
    assert_eq!(agrad::grad(|v| v[0].powf(v[1]), &[0.0, 2.0]), vec![0.0, 0.0]);
    check_elemental(|x| x.powf(Var::constant(2.0)), |x| x.powf(2.0), -1.3);
    check_elemental(|x| x.powf(Var::constant(3.0)), |x| x.powf(3.0), -0.8);
}

#[test]
fn powi_zero_has_zero_derivative() {
    assert_eq!(reverse_grad(|x| x.powi(0), 0.0), 0.0);
}

#[test]
fn trig() {
    for &x in &[-0.9, 0.3, 0.6] {
        check_elemental(|x| x.sin(), f64::sin, x);
        check_elemental(|x| x.cos(), f64::cos, x);
        check_elemental(|x| x.tan(), f64::tan, x);
        check_elemental(|x| x.asin(), f64::asin, x);
        check_elemental(|x| x.acos(), f64::acos, x);
        check_elemental(|x| x.atan(), f64::atan, x);
    }
}

#[test]
fn hyperbolic() {
    for &x in &[-0.9, 0.3, 0.6] {
        check_elemental(|x| x.sinh(), f64::sinh, x);
        check_elemental(|x| x.cosh(), f64::cosh, x);
        check_elemental(|x| x.tanh(), f64::tanh, x);
        check_elemental(|x| x.asinh(), f64::asinh, x);
        check_elemental(|x| x.atanh(), f64::atanh, x);
    }
    check_elemental(|x| x.acosh(), f64::acosh, 1.8);
}

#[test]
fn binary_functions() {
    let g = reverse_grad2(|y, x| y.atan2(x), 0.4, -1.3);
    let r2 = 0.4f64 * 0.4 + 1.3 * 1.3;
    assert_relative_eq!(g[0], -1.3 / r2, max_relative = 1e-12);
    assert_relative_eq!(g[1], -0.4 / r2, max_relative = 1e-12);

    let g = reverse_grad2(|x, y| x.hypot(y), 3.0, 4.0);
    assert_relative_eq!(g[0], 0.6);
    assert_relative_eq!(g[1], 0.8);
}

#[test]
fn fused_multiply_add_is_one_statement() {
    let mut tape = Tape::new();
    let a = tape.new_variable(2.0);
    let b = tape.new_variable(3.0);
    let c = tape.new_variable(4.0);
    let y = {
        let _guard = TapeGuard::new(&mut tape);
        a.mul_add(b, c)
    };
    assert_eq!(tape.len(), 1);
    assert_eq!(y.value(), 10.0);
    assert_eq!(tape.gradient(y, &[a, b, c]), vec![3.0, 2.0, 1.0]);
}

// ── Non-smooth points ──

#[test]
fn abs_at_kink_is_zero() {
    assert_eq!(reverse_grad(|x| x.abs(), 0.0), 0.0);
    assert_eq!(reverse_grad(|x| x.abs(), -2.0), -1.0);
}

#[test]
fn rounding_has_no_gradient() {
    assert_eq!(reverse_grad(|x| x.floor() + x.ceil() + x.round() + x.trunc(), 1.3), 0.0);
    assert_relative_eq!(reverse_grad(|x| x.fract(), 1.3), 1.0);
}

#[test]
fn max_min_pick_an_operand() {
    let g = reverse_grad2(|x, y| x.max(y), 1.0, 2.0);
    assert_eq!(g, [0.0, 1.0]);
    let g = reverse_grad2(|x, y| x.min(y), 1.0, 2.0);
    assert_eq!(g, [1.0, 0.0]);
    // NaN loses
    let g = reverse_grad2(|x, y| x.max(y), f64::NAN, 2.0);
    assert_eq!(g, [0.0, 1.0]);
}

#[test]
fn nan_propagates_without_panic() {
    let mut tape = Tape::new();
    let x = tape.new_variable(-1.0);
    let y = {
        let _guard = TapeGuard::new(&mut tape);
        x.sqrt()
    };
    assert!(y.value().is_nan());
    assert!(tape.gradient(y, &[x])[0].is_nan());
}

// ── Constants ──

#[test]
fn constants_are_not_recorded() {
    let mut tape = Tape::new();
    let x = tape.new_variable(2.0);
    let y = {
        let _guard = TapeGuard::new(&mut tape);
        let c = Var::constant(3.0);
        let k = (c * c).exp();
        assert!(k.is_constant());
        x * k
    };
    assert_eq!(tape.len(), 1);
    assert_relative_eq!(tape.gradient(y, &[x])[0], 9f64.exp());
}

#[test]
fn comparisons_use_values() {
    let a = Var::constant(1.0);
    let b = Var::constant(2.0);
    assert!(a < b);
    assert!(a == 1.0);
    assert!(b > 1.5);
}

#[test]
fn sum_records_one_statement() {
    let mut tape = Tape::new();
    let xs: Vec<Var> = (1..=5).map(|i| tape.new_variable(i as f64)).collect();
    let s = {
        let _guard = TapeGuard::new(&mut tape);
        xs.iter().copied().sum::<Var>()
    };
    assert_eq!(tape.len(), 1);
    assert_eq!(s.value(), 15.0);
    assert_eq!(tape.gradient(s, &xs), vec![1.0; 5]);
}
