//! The declarative model subsystem: parser, expression compiler, pipeline
//! builder, and emitter.
//!
//! ```text
//! source text --parse--> Model --compile--> CompiledModel (func(t, y, out))
//!                          |                       |
//!                        emit                 build_pipeline --apply--> Solution
//! ```

pub mod compile;
pub mod emit;
pub mod expr;
pub mod parse;
pub mod pipeline;

pub use compile::{input_order, input_vector, Binding, CompiledModel};
pub use emit::{emit, Descriptor};
pub use expr::Expr;
pub use parse::{parse, Model};
pub use pipeline::{build_pipeline, Pipeline};

use crate::error::SolveError;
use crate::methods::tableau::Method;
use crate::solve::Solution;
use crate::Float;

/// Run a pipeline against a positional input vector (see [`input_vector`]).
pub fn apply_pipeline(
    pipeline: &Pipeline,
    inputs: &[Float],
    method: Method,
) -> Result<Solution, SolveError> {
    pipeline.apply_with(inputs, method)
}
