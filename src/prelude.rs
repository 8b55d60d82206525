//! Convenient prelude: the most commonly used types and functions.
//!
//! ```rust
//! use rowode::prelude::*;
//! ```

pub use crate::error::{Error, ModelError, SolveError};
pub use crate::methods::tableau::Method;
pub use crate::model::{apply_pipeline, build_pipeline, emit, input_vector, parse, Pipeline};
pub use crate::solve::{
    solve, solve_with, ArgRange, CancelToken, Ivp, OdeSystem, Solution, SolveOptions, Stats,
};
pub use crate::Float;
