//! The problem descriptor the integrator consumes.

use bon::Builder;

use crate::error::SolveError;
use crate::Float;

/// User-supplied ODE system.
///
/// Implement this trait to provide the right-hand side y' = f(t, y). The
/// integrator repeatedly calls `rhs` with the current argument `t` and state
/// `y` and expects `dydt` to be filled in place, without allocating. Aside
/// from writing `dydt` the call must not mutate observable state.
///
/// # Example
///
/// ```ignore
/// struct VanDerPol { mu: f64 }
/// impl OdeSystem for VanDerPol {
///     fn rhs(&self, _t: f64, y: &[f64], dydt: &mut [f64]) {
///         dydt[0] = y[1];
///         dydt[1] = ((1.0 - y[0] * y[0]) * y[1] - y[0]) / self.mu;
///     }
/// }
/// ```
pub trait OdeSystem {
    /// Write f(t, y) into `dydt`.
    fn rhs(&self, t: Float, y: &[Float], dydt: &mut [Float]);
}

impl<F> OdeSystem for F
where
    F: Fn(Float, &[Float], &mut [Float]),
{
    fn rhs(&self, t: Float, y: &[Float], dydt: &mut [Float]) {
        self(t, y, dydt)
    }
}

/// Independent variable range and output grid step.
///
/// `step` is the spacing of the returned samples, not the internal
/// integration step; the integrator adapts its own step below it.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgRange {
    pub name: String,
    pub start: Float,
    pub finish: Float,
    pub step: Float,
}

impl ArgRange {
    pub fn new(name: &str, start: Float, finish: Float, step: Float) -> Self {
        Self {
            name: name.to_string(),
            start,
            finish,
            step,
        }
    }

    /// Number of output samples, including both endpoints.
    pub fn samples(&self) -> usize {
        ((self.finish - self.start) / self.step + 0.5).floor() as usize + 1
    }
}

/// An initial value problem descriptor.
///
/// The callable right-hand side is passed separately to [`crate::solve`];
/// this record carries everything else and is validated before integration.
#[derive(Debug, Clone, Builder)]
pub struct Ivp {
    /// Identifier, carried through to logs and errors. Opaque.
    #[builder(into)]
    pub name: String,
    /// Argument range and output grid step.
    pub arg: ArgRange,
    /// Initial state y0.
    pub initial: Vec<Float>,
    /// One name per state component. Opaque to the integrator.
    pub names: Vec<String>,
    /// Combined absolute and relative tolerance, in (0, 1).
    #[builder(default = 1e-7)]
    pub tolerance: Float,
}

impl Ivp {
    /// Check the descriptor invariants, reporting the first violation.
    pub fn validate(&self) -> Result<(), SolveError> {
        let arg = &self.arg;
        if !(arg.start < arg.finish) {
            return Err(SolveError::config(format!(
                "{} range is empty: start = {}, finish = {}",
                arg.name, arg.start, arg.finish
            )));
        }
        if !(arg.step > 0.0) {
            return Err(SolveError::config(format!(
                "output step must be positive, got {}",
                arg.step
            )));
        }
        if arg.step > arg.finish - arg.start {
            return Err(SolveError::config(format!(
                "output step {} exceeds the {} range {}",
                arg.step,
                arg.name,
                arg.finish - arg.start
            )));
        }
        if self.initial.is_empty() {
            return Err(SolveError::config("empty initial state"));
        }
        if self.initial.len() != self.names.len() {
            return Err(SolveError::config(format!(
                "{} initial values but {} component names",
                self.initial.len(),
                self.names.len()
            )));
        }
        if !(self.tolerance > 0.0 && self.tolerance < 1.0) {
            return Err(SolveError::config(format!(
                "tolerance must lie in (0, 1), got {}",
                self.tolerance
            )));
        }
        if self.initial.iter().any(|v| !v.is_finite()) {
            return Err(SolveError::config("non-finite initial state"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Ivp {
        Ivp::builder()
            .name("p")
            .arg(ArgRange::new("t", 0.0, 1.0, 0.1))
            .initial(vec![1.0])
            .names(vec!["x".into()])
            .tolerance(1e-6)
            .build()
    }

    #[test]
    fn valid_descriptor_passes() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn bad_bounds_are_config_errors() {
        let mut ivp = base();
        ivp.arg.finish = -1.0;
        assert!(matches!(
            ivp.validate(),
            Err(SolveError::Config { .. })
        ));

        let mut ivp = base();
        ivp.arg.step = 0.0;
        assert!(ivp.validate().is_err());

        let mut ivp = base();
        ivp.arg.step = 2.0;
        assert!(ivp.validate().is_err());

        let mut ivp = base();
        ivp.tolerance = 1.5;
        assert!(ivp.validate().is_err());

        let mut ivp = base();
        ivp.names.push("extra".into());
        assert!(ivp.validate().is_err());
    }

    #[test]
    fn sample_count_rounds_to_grid() {
        assert_eq!(ArgRange::new("t", 0.0, 1.0, 0.1).samples(), 11);
        assert_eq!(ArgRange::new("t", 0.0, 1.0, 0.3).samples(), 4);
        assert_eq!(ArgRange::new("t", 0.0, 1e11, 1e10).samples(), 11);
    }
}
