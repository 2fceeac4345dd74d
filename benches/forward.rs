use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use agrad::{fvar_gradient, gradient_dot_vector, hessian, hessian_times_vector, Fvar};

#[path = "common/mod.rs"]
#[allow(dead_code)]
mod common;
use common::*;

fn bench_forward_gradient(c: &mut Criterion) {
    let mut group = c.benchmark_group("forward_gradient");
    for n in [2, 10, 100] {
        let x = make_input(n);
        group.bench_with_input(BenchmarkId::new("rosenbrock_fvar", n), &x, |b, x| {
            b.iter(|| black_box(fvar_gradient(|v| rosenbrock(v), black_box(x))))
        });
    }
    group.finish();
}

fn bench_directional(c: &mut Criterion) {
    let mut group = c.benchmark_group("directional");
    for n in [10, 100, 1000] {
        let x = make_input(n);
        let v = make_direction(n);
        group.bench_with_input(BenchmarkId::new("gradient_dot_vector", n), &x, |b, x| {
            b.iter(|| black_box(gradient_dot_vector(|u| rosenbrock(u), black_box(x), &v)))
        });
        group.bench_with_input(BenchmarkId::new("hessian_times_vector", n), &x, |b, x| {
            b.iter(|| black_box(hessian_times_vector(|u| rosenbrock(u), black_box(x), &v)))
        });
    }
    group.finish();
}

fn bench_second_order(c: &mut Criterion) {
    let mut group = c.benchmark_group("second_order");
    for n in [2, 10, 50] {
        let x = make_input(n);

        group.bench_with_input(BenchmarkId::new("hessian_fvar_var", n), &x, |b, x| {
            b.iter(|| black_box(hessian(|v| rosenbrock(v), black_box(x))))
        });

        // all n² second derivatives by nested forward mode
        group.bench_with_input(BenchmarkId::new("hessian_fvar_fvar", n), &x, |b, x| {
            b.iter(|| {
                let n = x.len();
                let mut h = vec![vec![0.0; n]; n];
                for i in 0..n {
                    for j in i..n {
                        let inputs: Vec<Fvar<Fvar<f64>>> = x
                            .iter()
                            .enumerate()
                            .map(|(k, &xk)| {
                                let di = if k == i { 1.0 } else { 0.0 };
                                let dj = if k == j { 1.0 } else { 0.0 };
                                Fvar::new(Fvar::new(xk, di), Fvar::new(dj, 0.0))
                            })
                            .collect();
                        let hij = rosenbrock(&inputs).d.d;
                        h[i][j] = hij;
                        h[j][i] = hij;
                    }
                }
                black_box(h)
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_forward_gradient,
    bench_directional,
    bench_second_order
);
criterion_main!(benches);
