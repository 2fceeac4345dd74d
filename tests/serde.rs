#![cfg(feature = "serde")]

use agrad::{Fvar, TapeConfig};

#[test]
fn fvar_json_shape() {
    let x = Fvar::new(1.5, -2.0);
    let json = serde_json::to_string(&x).unwrap();
    assert_eq!(json, r#"{"val":1.5,"d":-2.0}"#);

    let back: Fvar<f64> = serde_json::from_str(&json).unwrap();
    assert_eq!((back.val, back.d), (1.5, -2.0));
}

#[test]
fn nested_fvar_from_json() {
    let json = r#"{"val":{"val":2.0,"d":1.0},"d":{"val":1.0,"d":0.0}}"#;
    let x: Fvar<Fvar<f64>> = serde_json::from_str(json).unwrap();
    // second derivative of x^3 at 2
    let y = x * x * x;
    assert_eq!(y.d.d, 12.0);
}

#[test]
fn tape_config_missing_fields_take_defaults() {
    let config: TapeConfig = serde_json::from_str(r#"{"initial_statements":16}"#).unwrap();
    assert_eq!(config.initial_statements, 16);
    assert_eq!(config.initial_arena_values, TapeConfig::default().initial_arena_values);

    let empty: TapeConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(empty, TapeConfig::default());
}
