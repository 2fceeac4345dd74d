use agrad::functions;
use agrad::fwd;
use agrad::{derivative, fvar_gradient, gradient_dot_vector, partial_derivative, Fvar, Scalar};
use approx::assert_relative_eq;
use nalgebra::DMatrix;

type F = Fvar<f64>;
type FF = Fvar<Fvar<f64>>;

fn finite_diff(f: impl Fn(f64) -> f64, x: f64) -> f64 {
    let h = 1e-6;
    (f(x + h) - f(x - h)) / (2.0 * h)
}

fn check_tangent(f_fwd: impl Fn(F) -> F, f_f64: impl Fn(f64) -> f64, x: f64) {
    let y = f_fwd(F::variable(x));
    assert_relative_eq!(y.val, f_f64(x), max_relative = 1e-12);
    assert_relative_eq!(y.d, finite_diff(&f_f64, x), epsilon = 1e-6, max_relative = 1e-5);
}

#[test]
fn elementary_tangents() {
    for &x in &[0.2, 0.7] {
        check_tangent(|x| x.exp(), f64::exp, x);
        check_tangent(|x| x.ln(), f64::ln, x);
        check_tangent(|x| x.sqrt(), f64::sqrt, x);
        check_tangent(|x| x.cbrt(), f64::cbrt, x);
        check_tangent(|x| x.sin(), f64::sin, x);
        check_tangent(|x| x.cos(), f64::cos, x);
        check_tangent(|x| x.tan(), f64::tan, x);
        check_tangent(|x| x.asin(), f64::asin, x);
        check_tangent(|x| x.acos(), f64::acos, x);
        check_tangent(|x| x.atan(), f64::atan, x);
        check_tangent(|x| x.tanh(), f64::tanh, x);
        check_tangent(|x| x.atanh(), f64::atanh, x);
        check_tangent(|x| x.ln_1p(), f64::ln_1p, x);
        check_tangent(|x| x.exp_m1(), f64::exp_m1, x);
        check_tangent(|x| x.powi(4), |x| x.powi(4), x);
        check_tangent(|x| x.powf(F::constant(1.5)), |x| x.powf(1.5), x);
        check_tangent(|x| 1.0 / (x * x + 2.0), |x| 1.0 / (x * x + 2.0), x);
    }
}

#[test]
fn powf_with_constant_exponent_at_non_positive_base() {
    let y = F::variable(-2.0).powf(F::constant(2.0));
    assert_relative_eq!(y.val, 4.0);
    assert_relative_eq!(y.d, -4.0);

    let y = F::variable(0.0).powf(F::constant(2.0));
    assert_eq!(y.val, 0.0);
    assert_eq!(y.d, 0.0);

    let y = F::variable(-2.0).powf_const(3.0);
    assert_relative_eq!(y.val, -8.0);
    assert_relative_eq!(y.d, 12.0);

    // a varying exponent still picks up the ln(x) term
    let y = F::constant(2.0).powf(F::variable(3.0));
    assert_relative_eq!(y.d, 8.0 * 2f64.ln(), max_relative = 1e-12);
}

#[test]
fn quotient_and_remainder() {
    let x = F::variable(7.5);
    let y = F::constant(2.0);
    let q = x / y;
    assert_relative_eq!(q.d, 0.5);
    let r = x % y;
    assert_relative_eq!(r.val, 1.5);
    assert_relative_eq!(r.d, 1.0);
    let r = F::constant(7.5) % F::variable(2.0);
    assert_relative_eq!(r.d, -3.0);
}

#[test]
fn second_derivative_by_nesting() {
    // d²/dx² sin(x) = -sin(x)
    let x = FF::new(F::variable(0.4), F::constant(1.0));
    let y = x.sin();
    assert_relative_eq!(y.val.val, 0.4f64.sin());
    assert_relative_eq!(y.d.val, 0.4f64.cos());
    assert_relative_eq!(y.d.d, -0.4f64.sin(), max_relative = 1e-12);
}

#[test]
fn forward_solve_example() {
    let a_val = DMatrix::from_row_slice(2, 2, &[3.0, 0.0, 0.0, 4.0]);
    let b_val = DMatrix::from_row_slice(2, 2, &[2.0, 3.0, 5.0, 7.0]);

    // tangent through B only: dC = A⁻¹ dB
    let a = fwd::to_fvar(&a_val);
    let b = b_val.map(F::variable);
    let c = fwd::mdivide_left(&a, &b).unwrap();
    let expected = [[2.0 / 3.0, 1.0], [5.0 / 4.0, 7.0 / 4.0]];
    let expected_d = [[1.0 / 3.0, 1.0 / 3.0], [0.25, 0.25]];
    for i in 0..2 {
        for j in 0..2 {
            assert_relative_eq!(c[(i, j)].val, expected[i][j], max_relative = 1e-12);
            assert_relative_eq!(c[(i, j)].d, expected_d[i][j], max_relative = 1e-12);
        }
    }

    // tangent through A's diagonal: dC = -A⁻¹ dA C
    let a = DMatrix::from_fn(2, 2, |i, j| {
        if i == j {
            F::variable(a_val[(i, j)])
        } else {
            F::constant(a_val[(i, j)])
        }
    });
    let c = fwd::mdivide_left(&a, &fwd::to_fvar(&b_val)).unwrap();
    let expected_d = [[-2.0 / 9.0, -1.0 / 3.0], [-5.0 / 16.0, -7.0 / 16.0]];
    for i in 0..2 {
        for j in 0..2 {
            assert_relative_eq!(c[(i, j)].d, expected_d[i][j], max_relative = 1e-12);
        }
    }
}

#[test]
fn forward_inverse_tangent() {
    // d(A⁻¹) = -A⁻¹ dA A⁻¹
    let a_val = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 3.0]);
    let da = DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 0.0, 0.0]);
    let a = DMatrix::from_fn(2, 2, |i, j| F::new(a_val[(i, j)], da[(i, j)]));
    let inv = fwd::inverse(&a).unwrap();

    let inv_ref = a_val.clone().try_inverse().unwrap();
    let d_ref = -&inv_ref * &da * &inv_ref;
    for i in 0..2 {
        for j in 0..2 {
            assert_relative_eq!(inv[(i, j)].val, inv_ref[(i, j)], epsilon = 1e-12);
            assert_relative_eq!(inv[(i, j)].d, d_ref[(i, j)], epsilon = 1e-12);
        }
    }
}

// ── Functionals ──

#[test]
fn derivative_of_univariate() {
    let (v, d) = derivative(|x| x * x.exp(), 1.0);
    assert_relative_eq!(v, 1f64.exp());
    assert_relative_eq!(d, 2.0 * 1f64.exp());
}

#[test]
fn partials_and_gradient() {
    let f = |x: &[F]| x[0] * x[1] * x[1] + x[2].sin();
    let x = [2.0, 3.0, 0.5];
    let (v, d1) = partial_derivative(f, &x, 1);
    assert_relative_eq!(v, 18.0 + 0.5f64.sin());
    assert_relative_eq!(d1, 12.0);

    let (v, g) = fvar_gradient(f, &x);
    assert_relative_eq!(v, 18.0 + 0.5f64.sin());
    assert_relative_eq!(g[0], 9.0);
    assert_relative_eq!(g[1], 12.0);
    assert_relative_eq!(g[2], 0.5f64.cos());

    let (_, dv) = gradient_dot_vector(f, &x, &[1.0, -1.0, 2.0]);
    assert_relative_eq!(dv, 9.0 - 12.0 + 2.0 * 0.5f64.cos(), max_relative = 1e-12);
}

// ── Reductions ──

#[test]
fn product_tangents() {
    let (_, g) = fvar_gradient(|x| functions::prod(x), &[2.0, 3.0]);
    assert_eq!(g, vec![3.0, 2.0]);
}

#[test]
fn empty_min_max_are_constant_infinities() {
    let m: F = functions::min(&[]);
    assert_eq!(m.val, f64::INFINITY);
    assert_eq!(m.d, 0.0);

    let m: FF = functions::min(&[]);
    assert_eq!(m.val.val, f64::INFINITY);
    assert_eq!(m.val.d, 0.0);
    assert_eq!(m.d.val, 0.0);
    assert_eq!(m.d.d, 0.0);

    let m: F = functions::max(&[]);
    assert_eq!(m.val, f64::NEG_INFINITY);
    assert_eq!(m.d, 0.0);
}

#[test]
fn min_selects_the_smallest_tangent() {
    let xs = [F::new(3.0, 1.0), F::new(-1.0, 5.0), F::new(2.0, 7.0)];
    let m = functions::min(&xs);
    assert_eq!(m.val, -1.0);
    assert_eq!(m.d, 5.0);
}

#[test]
fn generic_code_runs_on_plain_floats() {
    fn rosenbrock<T: Scalar>(x: &[T]) -> T {
        let dx = x[0] - T::from_f(1.0);
        let t = x[1] - x[0] * x[0];
        dx * dx + T::from_f(100.0) * t * t
    }
    assert_eq!(rosenbrock(&[1.0, 1.0]), 0.0);
    let (_, g) = fvar_gradient(|x| rosenbrock(x), &[1.0, 1.0]);
    assert_relative_eq!(g[0], 0.0);
    assert_relative_eq!(g[1], 0.0);
}
