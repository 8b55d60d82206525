//! High-level solver API: problem descriptor, options, driver, solution.

pub(crate) mod driver;
pub mod options;
pub mod problem;
pub mod solution;

pub use options::{CancelToken, SolveOptions};
pub use problem::{ArgRange, Ivp, OdeSystem};
pub use solution::{Solution, Stats};

use crate::error::SolveError;
use crate::methods::row::RowWorkspace;
use crate::methods::tableau::Method;

/// Integrate an initial value problem from `ivp.arg.start` to
/// `ivp.arg.finish`, sampling on the uniform output grid with spacing
/// `ivp.arg.step`, using default options.
pub fn solve<F: OdeSystem + ?Sized>(
    ivp: &Ivp,
    f: &F,
    method: Method,
) -> Result<Solution, SolveError> {
    solve_with(ivp, f, method, &SolveOptions::builder().build())
}

/// [`solve`] with explicit [`SolveOptions`].
pub fn solve_with<F: OdeSystem + ?Sized>(
    ivp: &Ivp,
    f: &F,
    method: Method,
    options: &SolveOptions,
) -> Result<Solution, SolveError> {
    ivp.validate()?;
    let tab = method.tableau();
    let mut ws = RowWorkspace::new(ivp.initial.len(), tab.stages);
    let mut stats = Stats::default();
    let (t, y) = driver::integrate(
        f,
        tab,
        ivp.arg.start,
        ivp.arg.finish,
        ivp.arg.step,
        ivp.tolerance,
        &ivp.initial,
        options,
        &mut ws,
        &mut stats,
    )?;
    log::debug!(
        "{}: {} solved with {} ({} steps, {} accepted, {} rejected, {} fevals)",
        ivp.name,
        ivp.arg.name,
        tab.name,
        stats.nstep,
        stats.naccpt,
        stats.nrejct,
        stats.nfev
    );
    Ok(Solution {
        names: ivp.names.clone(),
        t,
        y,
        stats,
    })
}
