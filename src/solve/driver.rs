//! The integration driver: step loop, Jacobian staleness control, and
//! output-grid emission.

use crate::error::SolveError;
use crate::methods::jacobian::fd_jacobian;
use crate::methods::row::{row_step, RowWorkspace, StepFailure};
use crate::methods::tableau::RowTableau;
use crate::solve::options::SolveOptions;
use crate::solve::problem::OdeSystem;
use crate::solve::solution::Stats;
use crate::Float;

/// Shrink factor while searching for a workable first step; the output grid
/// step the driver starts from can be many orders of magnitude too large.
const FIRST_STEP_SHRINK: Float = 0.01;

fn refresh_jacobian<F: OdeSystem + ?Sized>(
    f: &F,
    t: Float,
    ws: &mut RowWorkspace,
    stats: &mut Stats,
) -> Result<(), SolveError> {
    stats.nfev += fd_jacobian(f, t, &mut ws.y, &ws.f0, &mut ws.jac, &mut ws.fp);
    stats.njev += 1;
    log::trace!("Jacobian refreshed at t = {t}");
    if ws.jac.has_non_finite() {
        return Err(SolveError::Numeric { what: "J", t });
    }
    Ok(())
}

/// Integrate from `t0` to `t1`, emitting samples at `t0 + k*h_out` (the last
/// sample is exactly `t1`) by linear interpolation between accepted steps.
/// Returns the argument grid and one column per component; on failure the
/// partial output is dropped.
#[allow(clippy::too_many_arguments)]
pub(crate) fn integrate<F: OdeSystem + ?Sized>(
    f: &F,
    tab: &RowTableau,
    t0: Float,
    t1: Float,
    h_out: Float,
    tol: Float,
    y0: &[Float],
    opts: &SolveOptions,
    ws: &mut RowWorkspace,
    stats: &mut Stats,
) -> Result<(Vec<Float>, Vec<Vec<Float>>), SolveError> {
    let n = y0.len();
    let m = ((t1 - t0) / h_out + 0.5).floor() as usize + 1;
    let p = (tab.embedded_order + 1) as Float;

    let mut grid = Vec::with_capacity(m);
    let mut cols: Vec<Vec<Float>> = (0..n).map(|_| Vec::with_capacity(m)).collect();
    grid.push(t0);
    for i in 0..n {
        cols[i].push(y0[i]);
    }

    ws.y.copy_from_slice(y0);
    f.rhs(t0, &ws.y, &mut ws.f0);
    stats.nfev += 1;
    if ws.f0.iter().any(|v| !v.is_finite()) {
        return Err(SolveError::Numeric { what: "f", t: t0 });
    }
    refresh_jacobian(f, t0, ws, stats)?;

    let mut t = t0;
    let mut h = h_out.min(t1 - t0);
    let mut next_k = 1usize;
    let mut accepted_since_jac = 0usize;
    let mut rejections_here = 0usize;
    let mut nonfinite_strikes = 0usize;
    let mut last_rejected = false;

    while t < t1 {
        if stats.nstep >= opts.max_steps {
            return Err(SolveError::Convergence {
                t,
                reason: format!("step limit of {} reached", opts.max_steps),
            });
        }
        if h < Float::EPSILON * t.abs().max(1.0) {
            return Err(SolveError::Convergence {
                t,
                reason: "step size collapsed below the roundoff floor".into(),
            });
        }
        // Do not overshoot the end of the range
        let last_step = t + 1.01 * h >= t1;
        if last_step {
            h = t1 - t;
        }
        stats.nstep += 1;

        match row_step(f, tab, t, h, tol, ws, stats) {
            Err(StepFailure::Singular) => {
                // Jacobian stale or step too large: reject, refresh, shrink
                stats.nrejct += 1;
                rejections_here += 1;
                if rejections_here > opts.max_rejections {
                    return Err(SolveError::Singular { t });
                }
                h *= if stats.naccpt == 0 {
                    FIRST_STEP_SHRINK
                } else {
                    0.5
                };
                last_rejected = true;
                refresh_jacobian(f, t, ws, stats)?;
                accepted_since_jac = 0;
            }
            Err(StepFailure::NonFinite(what)) => {
                nonfinite_strikes += 1;
                if nonfinite_strikes >= 2 {
                    return Err(SolveError::Numeric { what, t });
                }
                stats.nrejct += 1;
                rejections_here += 1;
                if rejections_here > opts.max_rejections {
                    return Err(SolveError::Convergence {
                        t,
                        reason: format!("{} consecutive rejections", rejections_here),
                    });
                }
                // One free retry: refresh the Jacobian and bisect the step
                h *= 0.5;
                last_rejected = true;
                refresh_jacobian(f, t, ws, stats)?;
                accepted_since_jac = 0;
            }
            Ok(err_norm) => {
                nonfinite_strikes = 0;
                if err_norm <= 1.0 {
                    stats.naccpt += 1;
                    let t_new = if last_step { t1 } else { t + h };

                    // Emit grid samples in (t, t_new]. The boundary sample is
                    // the accepted state itself, bit for bit.
                    while next_k < m {
                        let tg = if next_k == m - 1 {
                            t1
                        } else {
                            t0 + next_k as Float * h_out
                        };
                        if tg > t_new {
                            break;
                        }
                        if tg == t_new {
                            for i in 0..n {
                                cols[i].push(ws.y_new[i]);
                            }
                        } else {
                            let theta = (tg - t) / (t_new - t);
                            for i in 0..n {
                                cols[i].push(ws.y[i] + theta * (ws.y_new[i] - ws.y[i]));
                            }
                        }
                        grid.push(tg);
                        next_k += 1;
                    }

                    for i in 0..n {
                        ws.y[i] = ws.y_new[i];
                    }
                    t = t_new;
                    rejections_here = 0;
                    if t >= t1 {
                        break;
                    }

                    if let Some(cancel) = &opts.cancel {
                        if cancel.is_cancelled() {
                            return Err(SolveError::Cancelled { t });
                        }
                    }

                    f.rhs(t, &ws.y, &mut ws.f0);
                    stats.nfev += 1;
                    if ws.f0.iter().any(|v| !v.is_finite()) {
                        return Err(SolveError::Numeric { what: "f", t });
                    }

                    accepted_since_jac += 1;
                    if accepted_since_jac > opts.jac_refresh_interval {
                        refresh_jacobian(f, t, ws, stats)?;
                        accepted_since_jac = 0;
                    }

                    let growth = if last_rejected { 1.0 } else { opts.growth_limit };
                    let fac = (opts.safety * err_norm.max(1e-10).powf(-1.0 / p))
                        .clamp(opts.shrink_limit, growth);
                    h = (h * fac).min(h_out);
                    last_rejected = false;
                } else {
                    stats.nrejct += 1;
                    rejections_here += 1;
                    if rejections_here > opts.max_rejections {
                        return Err(SolveError::Convergence {
                            t,
                            reason: format!("{} consecutive rejections", rejections_here),
                        });
                    }
                    let shrink = if stats.naccpt == 0 {
                        FIRST_STEP_SHRINK
                    } else {
                        opts.shrink_limit
                    };
                    let fac = (opts.safety * err_norm.powf(-1.0 / p)).clamp(shrink, 1.0);
                    h *= fac;
                    last_rejected = true;
                    refresh_jacobian(f, t, ws, stats)?;
                    accepted_since_jac = 0;
                }
            }
        }
    }

    // The loop always lands on t1 exactly; any grid point still pending can
    // only be the final one after a roundoff-short landing.
    while next_k < m {
        let tg = if next_k == m - 1 {
            t1
        } else {
            t0 + next_k as Float * h_out
        };
        grid.push(tg);
        for i in 0..n {
            cols[i].push(ws.y[i]);
        }
        next_k += 1;
    }

    Ok((grid, cols))
}
