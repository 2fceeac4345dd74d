pub mod api;
pub mod arena;
pub mod error;
pub mod functions;
pub mod fvar;
pub mod fwd;
pub mod matrix;
#[cfg(feature = "parallel")]
pub mod parallel;
pub mod rev;
pub mod scalar;
pub mod tape;
mod traits;
pub mod var;

pub use api::{
    derivative, fvar_gradient, grad, grad_hessian, grad_tr_mat_times_hessian, gradient,
    gradient_dot_vector, hessian, hessian_times_vector, jacobian, partial_derivative, vjp,
};
pub use error::MathError;
pub use fvar::Fvar;
pub use matrix::{adjoint_of, to_var, value_of};
pub use scalar::Scalar;
pub use tape::{recover_memory, set_zero_all_adjoints, Tape, TapeConfig, TapeGuard};
pub use var::Var;

/// Forward-mode dual over `f64`.
pub type Fvar64 = Fvar<f64>;
/// Forward-over-reverse dual, as used for Hessians.
pub type FvarVar = Fvar<Var>;
