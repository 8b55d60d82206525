//! The shared Rosenbrock–Wanner step kernel.
//!
//! One step costs a single LU factorization of `W = I - h*gamma*J` plus one
//! triangular solve and (for stages past the first) one f evaluation per
//! stage. The Gamma coupling is folded into the right-hand side through the
//! substitution `u_i = k_i + g_i/gamma`, so no Jacobian-vector products are
//! formed.

use crate::matrix::{lu_factor, lu_solve, Matrix};
use crate::methods::tableau::{RowTableau, MAX_STAGES};
use crate::solve::{OdeSystem, Stats};
use crate::Float;

/// Why a step attempt could not be completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StepFailure {
    /// W hit the pivot floor; Jacobian stale or step too large.
    Singular,
    /// A non-finite value appeared in the named quantity.
    NonFinite(&'static str),
}

/// Every buffer one stage of integration needs, allocated once from `n` and
/// the stage count. Nothing here is resized afterwards.
pub(crate) struct RowWorkspace {
    pub n: usize,
    pub y: Vec<Float>,
    pub y_new: Vec<Float>,
    pub err: Vec<Float>,
    pub f0: Vec<Float>,
    f_stage: Vec<Float>,
    dfdt: Vec<Float>,
    sum_y: Vec<Float>,
    g: Vec<Float>,
    rhs: Vec<Float>,
    k: [Vec<Float>; MAX_STAGES],
    pub jac: Matrix,
    w: Matrix,
    piv: Vec<usize>,
    /// Scratch for Jacobian columns.
    pub fp: Vec<Float>,
}

impl RowWorkspace {
    pub fn new(n: usize, stages: usize) -> Self {
        let k = std::array::from_fn(|i| if i < stages { vec![0.0; n] } else { Vec::new() });
        Self {
            n,
            y: vec![0.0; n],
            y_new: vec![0.0; n],
            err: vec![0.0; n],
            f0: vec![0.0; n],
            f_stage: vec![0.0; n],
            dfdt: vec![0.0; n],
            sum_y: vec![0.0; n],
            g: vec![0.0; n],
            rhs: vec![0.0; n],
            k,
            jac: Matrix::zeros(n),
            w: Matrix::zeros(n),
            piv: vec![0; n],
            fp: vec![0.0; n],
        }
    }
}

fn all_finite(v: &[Float]) -> bool {
    v.iter().all(|x| x.is_finite())
}

/// Attempt one ROW step of size `h` from `(t, ws.y)`.
///
/// Preconditions: `ws.f0` holds `f(t, ws.y)` and `ws.jac` holds the current
/// (possibly stale) Jacobian. On success `ws.y_new` holds the candidate
/// solution and the weighted RMS error norm is returned; acceptance is the
/// caller's decision.
pub(crate) fn row_step<F: OdeSystem + ?Sized>(
    f: &F,
    tab: &RowTableau,
    t: Float,
    h: Float,
    tol: Float,
    ws: &mut RowWorkspace,
    stats: &mut Stats,
) -> Result<Float, StepFailure> {
    let n = ws.n;
    let s = tab.stages;
    let gamma = tab.gamma;
    let inv_gamma = 1.0 / gamma;

    // W = I - h*gamma*J, factored once per step
    for r in 0..n {
        for c in 0..n {
            ws.w[(r, c)] = -h * gamma * ws.jac[(r, c)];
        }
        ws.w[(r, r)] += 1.0;
    }
    if ws.w.has_non_finite() {
        return Err(StepFailure::NonFinite("W"));
    }
    if lu_factor(&mut ws.w, &mut ws.piv).is_err() {
        return Err(StepFailure::Singular);
    }
    stats.ndec += 1;

    // Non-autonomous correction: df/dt by forward difference
    let dt = Float::EPSILON.sqrt() * t.abs().max(h.abs());
    f.rhs(t + dt, &ws.y, &mut ws.f_stage);
    stats.nfev += 1;
    for m in 0..n {
        ws.dfdt[m] = (ws.f_stage[m] - ws.f0[m]) / dt;
    }
    if !all_finite(&ws.dfdt) {
        return Err(StepFailure::NonFinite("f"));
    }

    for i in 0..s {
        // Gamma-coupling accumulator g_i = sum_{j<i} c_ij k_j
        ws.g.fill(0.0);
        for j in 0..i {
            let cij = tab.c[i][j];
            if cij != 0.0 {
                for m in 0..n {
                    ws.g[m] += cij * ws.k[j][m];
                }
            }
        }

        // f at the stage abscissa; the first stage reuses the baseline
        if i == 0 {
            ws.f_stage.copy_from_slice(&ws.f0);
        } else {
            ws.sum_y.copy_from_slice(&ws.y);
            for j in 0..i {
                let aij = tab.a[i][j];
                if aij != 0.0 {
                    for m in 0..n {
                        ws.sum_y[m] += h * aij * ws.k[j][m];
                    }
                }
            }
            f.rhs(t + tab.alpha(i) * h, &ws.sum_y, &mut ws.f_stage);
            stats.nfev += 1;
            if !all_finite(&ws.f_stage) {
                return Err(StepFailure::NonFinite("f"));
            }
        }

        // Solve W u = f_i + g_i/gamma + h*d_i*df/dt, then k_i = u - g_i/gamma
        let di = tab.d(i);
        for m in 0..n {
            ws.rhs[m] = ws.f_stage[m] + ws.g[m] * inv_gamma + h * di * ws.dfdt[m];
        }
        lu_solve(&ws.w, &ws.piv, &mut ws.rhs);
        stats.nsol += 1;
        for m in 0..n {
            ws.k[i][m] = ws.rhs[m] - ws.g[m] * inv_gamma;
        }
        if !all_finite(&ws.k[i]) {
            return Err(StepFailure::NonFinite("stage value"));
        }
    }

    // Candidate solution and embedded error estimate
    ws.y_new.copy_from_slice(&ws.y);
    ws.err.fill(0.0);
    for i in 0..s {
        let bi = tab.b[i];
        let ei = bi - tab.b_hat[i];
        for m in 0..n {
            ws.y_new[m] += h * bi * ws.k[i][m];
            ws.err[m] += h * ei * ws.k[i][m];
        }
    }
    if !all_finite(&ws.y_new) {
        return Err(StepFailure::NonFinite("y"));
    }

    // Weighted RMS norm with atol = rtol = tol
    let mut norm = 0.0;
    for m in 0..n {
        let scale = tol * (1.0 + ws.y[m].abs().max(ws.y_new[m].abs()));
        let e = ws.err[m] / scale;
        norm += e * e;
    }
    let norm = (norm / n as Float).sqrt();
    if !norm.is_finite() {
        return Err(StepFailure::NonFinite("error norm"));
    }
    Ok(norm)
}
