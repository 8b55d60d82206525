//! rowode: Rosenbrock–Wanner solvers for stiff initial value problems.
//!
//! This crate solves y' = f(t, y) with linearly-implicit Rosenbrock–Wanner
//! (ROW) methods — one LU factorization and s triangular solves per step, no
//! Newton iteration — with embedded error estimation and adaptive step size
//! control. A second subsystem compiles a declarative, block-structured model
//! text into a runnable problem, including multi-stage pipelines where state
//! is carried across stages and selected inputs are mutated in between.
//!
//! Highlights
//! - Methods: MRT (modified Rosenbrock triple), ROS3PRw, ROS34PRw (W-methods)
//! - Numerical Jacobian with staleness control; dense LU with pivoting
//! - Output on an exact uniform grid, independent of the internal step
//! - Model compiler: `parse`, `emit`, `build_pipeline`, `apply_pipeline`
//!
//! Quick start
//! ```rust,no_run
//! use rowode::prelude::*;
//!
//! struct Decay;
//! impl OdeSystem for Decay {
//!     fn rhs(&self, _t: f64, y: &[f64], dydt: &mut [f64]) {
//!         dydt[0] = -1000.0 * y[0];
//!     }
//! }
//!
//! fn main() -> Result<(), rowode::Error> {
//!     let ivp = Ivp::builder()
//!         .name("decay")
//!         .arg(ArgRange::new("t", 0.0, 0.1, 0.01))
//!         .initial(vec![1.0])
//!         .names(vec!["y".into()])
//!         .tolerance(1e-8)
//!         .build();
//!     let sol = solve(&ivp, &Decay, Method::Ros34PRw)?;
//!     for k in 0..sol.len() {
//!         println!("t = {:.3}, y = {:e}", sol.t[k], sol.y[0][k]);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! See the demos folder for complete model-text examples.

mod error;
mod matrix;
mod methods;

pub mod model;
pub mod prelude;
pub mod solve;

pub use error::{Error, ModelError, SolveError};
pub use methods::tableau::{Method, RowTableau};
pub use solve::{solve, ArgRange, CancelToken, Ivp, OdeSystem, Solution, SolveOptions, Stats};

/// Scalar type used throughout the crate.
pub type Float = f64;
