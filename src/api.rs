use crate::fvar::Fvar;
use crate::scalar::Scalar;
use crate::tape::{Tape, TapeGuard};
use crate::var::Var;

/// Register `x` as leaves on `tape`.
fn leaves(tape: &mut Tape, x: &[f64]) -> Vec<Var> {
    x.iter().map(|&v| tape.new_variable(v)).collect()
}

/// Run `f` with `tape` installed as the thread's active tape.
fn record<R>(tape: &mut Tape, f: impl FnOnce() -> R) -> R {
    let _guard = TapeGuard::new(tape);
    f()
}

#[inline]
fn indicator(hit: bool) -> f64 {
    if hit {
        1.0
    } else {
        0.0
    }
}

// ── Reverse mode ──

/// Compute the gradient of a scalar function `f : R^n → R` using reverse mode.
///
/// `f` runs on a private tape, so an enclosing computation on the thread's
/// active tape is left untouched.
///
/// ```
/// let g = agrad::grad(|x: &[agrad::Var]| x[0] * x[0] + x[1] * x[1], &[3.0, 4.0]);
/// assert!((g[0] - 6.0).abs() < 1e-10);
/// assert!((g[1] - 8.0).abs() < 1e-10);
/// ```
pub fn grad(f: impl FnOnce(&[Var]) -> Var, x: &[f64]) -> Vec<f64> {
    gradient(f, x).1
}

/// Value and gradient of a scalar function: `(f(x), ∇f(x))`.
pub fn gradient(f: impl FnOnce(&[Var]) -> Var, x: &[f64]) -> (f64, Vec<f64>) {
    let mut tape = Tape::with_capacity(x.len() * 10);
    let inputs = leaves(&mut tape, x);
    let output = record(&mut tape, || f(&inputs));
    (output.value(), tape.gradient(output, &inputs))
}

/// Vector-Jacobian product (reverse mode): `(f(x), wᵀ·J)`.
pub fn vjp(f: impl FnOnce(&[Var]) -> Vec<Var>, x: &[f64], w: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let mut tape = Tape::with_capacity(x.len() * 10);
    let inputs = leaves(&mut tape, x);
    let outputs = record(&mut tape, || f(&inputs));
    assert_eq!(
        outputs.len(),
        w.len(),
        "output length must match weight vector length"
    );

    let values = outputs.iter().map(Var::value).collect();
    let seeds: Vec<(Var, f64)> = outputs.iter().copied().zip(w.iter().copied()).collect();
    tape.reverse_seeded(&seeds);
    let grad = inputs.iter().map(|x| tape.adjoint(x)).collect();
    (values, grad)
}

/// Jacobian of `f : R^n → R^m` by reverse mode: one recording, one sweep per
/// output. Returns `(f(x), J)` where `J[i][j] = ∂f_i/∂x_j`.
pub fn jacobian(f: impl FnOnce(&[Var]) -> Vec<Var>, x: &[f64]) -> (Vec<f64>, Vec<Vec<f64>>) {
    let mut tape = Tape::with_capacity(x.len() * 10);
    let inputs = leaves(&mut tape, x);
    let outputs = record(&mut tape, || f(&inputs));

    let values = outputs.iter().map(Var::value).collect();
    let jac = outputs
        .iter()
        .map(|&out| tape.gradient(out, &inputs))
        .collect();
    (values, jac)
}

// ── Forward mode ──

/// `(f(x), f'(x))` for a univariate function.
pub fn derivative<T: Scalar>(f: impl FnOnce(Fvar<T>) -> Fvar<T>, x: T) -> (T, T) {
    let fx = f(Fvar::variable(x));
    (fx.val, fx.d)
}

/// `(f(x), ∂f/∂x_n)` with one forward pass.
pub fn partial_derivative<T: Scalar>(
    f: impl FnOnce(&[Fvar<T>]) -> Fvar<T>,
    x: &[T],
    n: usize,
) -> (T, T) {
    let inputs: Vec<Fvar<T>> = x
        .iter()
        .enumerate()
        .map(|(k, &xk)| {
            if k == n {
                Fvar::variable(xk)
            } else {
                Fvar::constant(xk)
            }
        })
        .collect();
    let fx = f(&inputs);
    (fx.val, fx.d)
}

/// Gradient by forward mode, one pass per input: `(f(x), ∇f(x))`.
pub fn fvar_gradient<T: Scalar>(f: impl Fn(&[Fvar<T>]) -> Fvar<T>, x: &[T]) -> (T, Vec<T>) {
    if x.is_empty() {
        return (f(&[]).val, Vec::new());
    }
    let mut value = T::zero();
    let grad = (0..x.len())
        .map(|n| {
            let (fx, d) = partial_derivative(&f, x, n);
            value = fx;
            d
        })
        .collect();
    (value, grad)
}

/// Directional derivative `(f(x), ∇f(x)·v)` with one forward pass.
pub fn gradient_dot_vector<T: Scalar>(
    f: impl FnOnce(&[Fvar<T>]) -> Fvar<T>,
    x: &[T],
    v: &[T],
) -> (T, T) {
    assert_eq!(x.len(), v.len(), "x and v must have the same length");
    let inputs: Vec<Fvar<T>> = x.iter().zip(v).map(|(&xi, &vi)| Fvar::new(xi, vi)).collect();
    let fx = f(&inputs);
    (fx.val, fx.d)
}

// ── Mixed mode ──

/// Value, gradient and Hessian by forward-over-reverse.
///
/// Pass `i` seeds the tangent of `x_i` and sweeps from the tangent of the
/// output, giving row `i` of the Hessian as the adjoints of the inputs.
/// Each pass runs on a freshly reset private tape.
pub fn hessian(
    f: impl Fn(&[Fvar<Var>]) -> Fvar<Var>,
    x: &[f64],
) -> (f64, Vec<f64>, Vec<Vec<f64>>) {
    let n = x.len();
    let mut tape = Tape::with_capacity(n * 20);
    if n == 0 {
        let fx = record(&mut tape, || f(&[]));
        return (fx.val.value(), Vec::new(), Vec::new());
    }

    let mut value = 0.0;
    let mut grad = vec![0.0; n];
    let mut hess = vec![vec![0.0; n]; n];
    for i in 0..n {
        tape.reset();
        let vars = leaves(&mut tape, x);
        let inputs: Vec<Fvar<Var>> = vars
            .iter()
            .enumerate()
            .map(|(j, &v)| Fvar::new(v, Var::constant(indicator(i == j))))
            .collect();
        let fx = record(&mut tape, || f(&inputs));
        value = fx.val.value();
        grad[i] = fx.d.value();
        hess[i] = tape.gradient(fx.d, &vars);
    }
    (value, grad, hess)
}

/// Hessian-vector product `(f(x), H·v)` with a single forward-over-reverse
/// pass.
pub fn hessian_times_vector(
    f: impl FnOnce(&[Fvar<Var>]) -> Fvar<Var>,
    x: &[f64],
    v: &[f64],
) -> (f64, Vec<f64>) {
    assert_eq!(x.len(), v.len(), "x and v must have the same length");
    let mut tape = Tape::with_capacity(x.len() * 20);
    let vars = leaves(&mut tape, x);
    let inputs: Vec<Fvar<Var>> = vars
        .iter()
        .zip(v)
        .map(|(&xi, &vi)| Fvar::new(xi, Var::constant(vi)))
        .collect();
    let fx = record(&mut tape, || f(&inputs));
    (fx.val.value(), tape.gradient(fx.d, &vars))
}

/// Value, Hessian and the gradient of every Hessian entry, using
/// `Fvar<Fvar<Var>>` (two forward directions over reverse).
///
/// Returns `(f(x), H, ∇H)` with `∇H[k][i][j] = ∂H_ij/∂x_k`. Only the upper
/// triangle is evaluated; the lower one is filled by symmetry.
#[allow(clippy::type_complexity)]
pub fn grad_hessian(
    f: impl Fn(&[Fvar<Fvar<Var>>]) -> Fvar<Fvar<Var>>,
    x: &[f64],
) -> (f64, Vec<Vec<f64>>, Vec<Vec<Vec<f64>>>) {
    let n = x.len();
    let mut tape = Tape::with_capacity(n * 40);
    if n == 0 {
        let fx = record(&mut tape, || f(&[]));
        return (fx.val.val.value(), Vec::new(), Vec::new());
    }

    let mut value = 0.0;
    let mut hess = vec![vec![0.0; n]; n];
    let mut grad_hess = vec![vec![vec![0.0; n]; n]; n];
    for i in 0..n {
        for j in i..n {
            tape.reset();
            let vars = leaves(&mut tape, x);
            let inputs: Vec<Fvar<Fvar<Var>>> = vars
                .iter()
                .enumerate()
                .map(|(k, &v)| {
                    Fvar::new(
                        Fvar::new(v, Var::constant(indicator(i == k))),
                        Fvar::new(Var::constant(indicator(j == k)), Var::constant(0.0)),
                    )
                })
                .collect();
            let fx = record(&mut tape, || f(&inputs));
            value = fx.val.val.value();
            let h = fx.d.d;
            hess[i][j] = h.value();
            hess[j][i] = h.value();
            for (k, dk) in tape.gradient(h, &vars).into_iter().enumerate() {
                grad_hess[k][i][j] = dk;
                grad_hess[k][j][i] = dk;
            }
        }
    }
    (value, hess, grad_hess)
}

/// Gradient of `tr(M H(x))` where `H` is the Hessian of `f`.
///
/// All passes share one set of leaves; the traces of the individual passes
/// are summed on the tape and swept once.
pub fn grad_tr_mat_times_hessian(
    f: impl Fn(&[Fvar<Fvar<Var>>]) -> Fvar<Fvar<Var>>,
    x: &[f64],
    m: &[Vec<f64>],
) -> Vec<f64> {
    let n = x.len();
    assert_eq!(m.len(), n, "M must be n x n");
    let mut tape = Tape::with_capacity(n * n * 40);
    let vars = leaves(&mut tape, x);
    let total = record(&mut tape, || {
        let terms: Vec<Var> = (0..n)
            .map(|row| {
                assert_eq!(m[row].len(), n, "M must be n x n");
                let inputs: Vec<Fvar<Fvar<Var>>> = vars
                    .iter()
                    .enumerate()
                    .map(|(k, &v)| {
                        Fvar::new(
                            Fvar::new(v, Var::constant(indicator(k == row))),
                            Fvar::constant(Var::constant(m[row][k])),
                        )
                    })
                    .collect();
                f(&inputs).d.d
            })
            .collect();
        <Var as Scalar>::sum(&terms)
    });
    tape.gradient(total, &vars)
}
