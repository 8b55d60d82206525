//! Errors for the solver core and the model compiler.

use thiserror::Error;

use crate::Float;

/// Top-level error: anything the crate can fail with.
#[derive(Error, Debug)]
pub enum Error {
    #[error("model error: {0}")]
    Model(#[from] ModelError),
    #[error("solve error: {0}")]
    Solve(#[from] SolveError),
}

/// Errors raised while parsing, binding, or lowering a declarative model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Malformed model source. Carries the 1-based line number and the
    /// section the line belongs to.
    #[error("{section} (line {line}): {message}")]
    Parse {
        line: usize,
        section: String,
        message: String,
    },
    /// An expression refers to an identifier with no binding.
    #[error("unknown identifier `{name}` in {context}")]
    UnknownName { name: String, context: String },
}

impl ModelError {
    pub(crate) fn parse(line: usize, section: &str, message: impl Into<String>) -> Self {
        ModelError::Parse {
            line,
            section: section.to_string(),
            message: message.into(),
        }
    }
}

/// Errors raised by the integrator. Integration errors carry the abscissa
/// that was active when the failure was detected; pipeline runs additionally
/// wrap them with the failing stage's name. A failed stage returns no
/// samples at all.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolveError {
    /// The problem descriptor violates an invariant (bad bounds, zero output
    /// step, size mismatch, tolerance out of range).
    #[error("invalid configuration: {reason}")]
    Config { reason: String },
    /// A non-finite value appeared in y, f, J, or W and survived one
    /// automatic Jacobian refresh plus step bisection.
    #[error("non-finite {what} at t = {t}")]
    Numeric { what: &'static str, t: Float },
    /// W stayed singular after a forced Jacobian refresh.
    #[error("singular iteration matrix at t = {t} after Jacobian refresh")]
    Singular { t: Float },
    /// More than the allowed consecutive rejections at one t, or the step
    /// size collapsed below the floor.
    #[error("cannot advance past t = {t}: {reason}")]
    Convergence { t: Float, reason: String },
    /// The caller's cancellation token was observed set.
    #[error("cancelled at t = {t}")]
    Cancelled { t: Float },
    /// A stage of a pipeline failed; wraps the underlying failure.
    #[error("stage `{stage}`: {source}")]
    Stage {
        stage: String,
        #[source]
        source: Box<SolveError>,
    },
}

impl SolveError {
    pub(crate) fn config(reason: impl Into<String>) -> Self {
        SolveError::Config {
            reason: reason.into(),
        }
    }

    pub(crate) fn in_stage(self, stage: &str) -> Self {
        SolveError::Stage {
            stage: stage.to_string(),
            source: Box::new(self),
        }
    }
}
