//! Malformed shapes and out-of-domain arguments are rejected before anything
//! is recorded.

use agrad::rev::{self, LdltFactor, TriView};
use agrad::{fwd, functions, tape, to_var, MathError, Var};
use nalgebra::DMatrix;

/// Snapshot of everything an operation could have touched.
fn tape_state() -> (usize, usize, usize) {
    tape::with_active_tape(|t| (t.len(), t.num_variables(), t.arena().bytes_used()))
}

fn assert_dimension_error<T: std::fmt::Debug>(result: Result<T, MathError>, function: &str) {
    match result {
        Err(e) => {
            assert!(e.is_dimension_mismatch(), "{function}: expected a dimension error, got {e}");
            assert_eq!(e.function(), function);
        }
        Ok(v) => panic!("{function}: expected a dimension error, got {v:?}"),
    }
}

fn assert_domain_error<T: std::fmt::Debug>(result: Result<T, MathError>) {
    match result {
        Err(MathError::Domain { .. }) => {}
        other => panic!("expected a domain error, got {other:?}"),
    }
}

fn ones(rows: usize, cols: usize) -> DMatrix<Var> {
    to_var(&DMatrix::from_element(rows, cols, 1.0))
}

#[test]
fn solves_reject_malformed_shapes() {
    let non_square = ones(2, 3);
    let square = ones(3, 3);
    let b_short = ones(2, 1);
    let b = ones(3, 1);
    let before = tape_state();

    assert_dimension_error(rev::mdivide_left(&non_square, &b), "mdivide_left");
    assert_dimension_error(rev::mdivide_left(&square, &b_short), "mdivide_left");
    assert_dimension_error(rev::inverse(&non_square), "inverse");
    assert_dimension_error(rev::mdivide_left_tri_low(&non_square, &b), "mdivide_left_tri_low");
    assert_dimension_error(
        rev::mdivide_left_tri(&square, &b_short, TriView::Upper),
        "mdivide_left_tri",
    );
    assert_dimension_error(rev::mdivide_left_spd(&square, &b_short), "mdivide_left_spd");
    assert_dimension_error(rev::mdivide_right(&b, &square), "mdivide_right");
    assert_dimension_error(rev::mdivide_right(&b.transpose(), &non_square), "mdivide_right");
    assert_dimension_error(
        rev::mdivide_right_tri_low(&b, &square),
        "mdivide_right_tri_low",
    );
    assert_dimension_error(rev::mdivide_right_spd(&b, &square), "mdivide_right_spd");

    assert_eq!(tape_state(), before);
}

#[test]
fn products_reject_malformed_shapes() {
    let a = ones(2, 3);
    let b = ones(2, 2);
    let before = tape_state();

    assert_dimension_error(rev::multiply(&a, &b), "multiply");
    assert_dimension_error(rev::dot_product(&[Var::constant(1.0)], &[1.0, 2.0]), "dot_product");
    assert_dimension_error(rev::columns_dot_product(&a, &b), "columns_dot_product");
    assert_dimension_error(rev::rows_dot_product(&a, &b), "rows_dot_product");
    assert_dimension_error(rev::determinant(&a), "determinant");
    assert_dimension_error(rev::log_determinant(&a), "log_determinant");

    assert_eq!(tape_state(), before);
}

#[test]
fn quadratic_forms_reject_malformed_shapes() {
    let a = ones(3, 3);
    let b = ones(3, 2);
    let tall = ones(3, 2);
    let small = ones(2, 2);
    let wide = ones(2, 3);
    let before = tape_state();

    assert_dimension_error(rev::quad_form(&tall, &b), "quad_form");
    assert_dimension_error(rev::quad_form(&a, &small), "quad_form");
    assert_dimension_error(rev::trace_quad_form(&a, &small), "trace_quad_form");
    assert_dimension_error(rev::trace_gen_quad_form(&a, &a, &b), "trace_gen_quad_form");
    assert_dimension_error(rev::trace_gen_quad_form(&wide, &a, &b), "trace_gen_quad_form");

    assert_eq!(tape_state(), before);
}

#[test]
fn ldlt_family_rejects_malformed_shapes() {
    let spd = to_var(&DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 2.0]));
    let factor = LdltFactor::new(&spd).unwrap();
    let b = ones(3, 1);
    let d = ones(2, 2);
    let wide = ones(2, 3);
    let before = tape_state();

    assert_dimension_error(rev::mdivide_left_ldlt(&factor, &b), "mdivide_left_ldlt");
    assert_dimension_error(rev::mdivide_right_ldlt(&b, &factor), "mdivide_right_ldlt");
    assert_dimension_error(
        rev::trace_inv_quad_form_ldlt(&factor, &b),
        "trace_inv_quad_form_ldlt",
    );
    assert_dimension_error(
        rev::trace_gen_inv_quad_form_ldlt(&d, &factor, &b),
        "trace_gen_inv_quad_form_ldlt",
    );
    assert_dimension_error(LdltFactor::new(&wide), "LdltFactor::new");

    assert_eq!(tape_state(), before);
}

#[test]
fn non_symmetric_or_indefinite_arguments_are_domain_errors() {
    let non_symmetric = to_var(&DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 0.0, 2.0]));
    let indefinite = to_var(&DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 1.0]));
    let b = ones(2, 1);
    let before = tape_state();

    assert_domain_error(rev::mdivide_left_spd(&non_symmetric, &b));
    assert_domain_error(rev::mdivide_left_spd(&indefinite, &b));
    assert_domain_error(rev::mdivide_right_spd(&b.transpose(), &indefinite));
    assert_domain_error(LdltFactor::new(&non_symmetric));
    assert_domain_error(LdltFactor::new(&indefinite));

    assert_eq!(tape_state(), before);
}

#[test]
fn symmetry_tolerance_is_absolute() {
    let nearly = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0 + 1e-10, 2.0]);
    assert!(rev::mdivide_left_spd(&to_var(&nearly), &ones(2, 1)).is_ok());
    let off = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0 + 1e-6, 2.0]);
    assert_domain_error(rev::mdivide_left_spd(&to_var(&off), &ones(2, 1)));
}

#[test]
fn generic_functions_reject_malformed_shapes() {
    let a = DMatrix::<f64>::zeros(2, 3);
    let b = DMatrix::<f64>::zeros(2, 2);
    assert_dimension_error(fwd::multiply(&a, &b), "multiply");
    assert_dimension_error(fwd::mdivide_left(&a, &b), "mdivide_left");
    assert_dimension_error(fwd::mdivide_left_tri_low(&b, &a.transpose()), "mdivide_left_tri_low");
    assert_dimension_error(fwd::mdivide_right(&a, &b), "mdivide_right");
    assert_dimension_error(fwd::determinant(&a), "determinant");
    assert_dimension_error(fwd::inverse(&a), "inverse");

    assert_dimension_error(functions::mean::<f64>(&[]), "mean");
    assert_dimension_error(functions::variance::<f64>(&[]), "variance");
    assert_dimension_error(functions::sd::<f64>(&[]), "sd");
    assert_dimension_error(functions::squared_distance(&[1.0], &[1.0, 2.0]), "squared_distance");
    assert_dimension_error(functions::distance(&[1.0], &[1.0, 2.0]), "distance");
}
