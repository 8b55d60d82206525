//! Stiff benchmark scenarios and solver-level properties.

use rowode::prelude::*;

mod common;
use common::*;

#[test]
fn linear_system_tracks_the_matrix_exponential() {
    // Constant-coefficient system against exp(At) y0, every method, every
    // sample point. Accepted local errors accumulate over the run, so the
    // global bound is a generous multiple of the tolerance.
    let tol = 1e-6;
    let problem = ivp("linear", 0.0, 5.0, 0.25, &[1.0, 0.5], tol);
    for method in METHODS {
        let sol = solve(&problem, &LinearPair, method).unwrap();
        for (k, &t) in sol.t.iter().enumerate() {
            let exact = linear_pair_exact(t);
            for i in 0..2 {
                let err = (sol.y[i][k] - exact[i]).abs();
                let scale = exact[i].abs().max(1.0);
                assert!(
                    err <= 1e3 * tol * scale,
                    "{}: err {err:e} at t = {t}",
                    method.name()
                );
            }
        }
    }
}

#[test]
fn output_grid_is_exact() {
    let problem = ivp("grid", 0.0, 5.0, 0.25, &[1.0, 0.5], 1e-8);
    for method in METHODS {
        let sol = solve(&problem, &LinearPair, method).unwrap();
        assert_eq!(sol.len(), 21);
        for (k, &t) in sol.t.iter().enumerate() {
            assert_eq!(t, 0.0 + k as f64 * 0.25, "{}", method.name());
        }
        assert_eq!(sol.t[0], 0.0);
        assert_eq!(*sol.t.last().unwrap(), 5.0);
    }
    // A grid step that does not divide the range still ends exactly at t1
    let problem = ivp("ragged", 0.0, 1.0, 0.3, &[1.0, 0.5], 1e-8);
    let sol = solve(&problem, &LinearPair, Method::Mrt).unwrap();
    assert_eq!(sol.len(), 4);
    assert_eq!(sol.t, vec![0.0, 0.3, 0.6, 1.0]);
}

#[test]
fn tolerance_drives_accuracy() {
    // y' = -2 t y^2, y(0) = 1 has the exact solution 1/(1 + t^2).
    let f = |_t: f64, y: &[f64], dydt: &mut [f64]| {
        dydt[0] = -2.0 * _t * y[0] * y[0];
    };
    let exact = 0.2;
    for method in METHODS {
        let mut previous = f64::INFINITY;
        for tol in [1e-4, 1e-6, 1e-8] {
            let problem = ivp("smooth", 0.0, 2.0, 0.1, &[1.0], tol);
            let sol = solve(&problem, &f, method).unwrap();
            let err = (sol.y[0].last().unwrap() - exact).abs();
            assert!(
                err < 10.0 * previous,
                "{}: error did not drop at tol {tol:e}",
                method.name()
            );
            previous = err;
        }
        assert!(previous < 2e-5, "{}: final error {previous:e}", method.name());
    }
}

#[test]
fn robertson_reaches_equilibrium() {
    // The classic Rober horizon: eleven decades. The slow component drains
    // into y2 with total mass exactly conserved (the system has a linear
    // invariant the method preserves up to roundoff).
    let problem = ivp("rober", 0.0, 1e11, 1e10, &[1.0, 0.0, 0.0], 1e-7);
    for method in METHODS {
        let sol = solve(&problem, &Robertson, method).unwrap();
        let y = sol.last();
        assert!(y[0] > 0.0 && y[0] < 1e-4, "{}: y0 = {:e}", method.name(), y[0]);
        assert!(y[1] > 0.0 && y[1] < 1e-9, "{}: y1 = {:e}", method.name(), y[1]);
        assert!((y[2] - 1.0).abs() < 1e-3, "{}: y2 = {}", method.name(), y[2]);
        for k in 0..sol.len() {
            let mass = sol.y[0][k] + sol.y[1][k] + sol.y[2][k];
            assert!((mass - 1.0).abs() < 1e-9, "{}: mass drift", method.name());
        }
        // y2 grows monotonically on the sample grid
        for pair in sol.y[2].windows(2) {
            assert!(pair[1] >= pair[0] - 1e-12);
        }
    }
}

#[test]
fn hires_matches_the_reference_state() {
    let y0 = [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0057];
    let problem = ivp("hires", 0.0, 321.8122, 32.18122, &y0, 1e-10);
    for method in METHODS {
        let sol = solve(&problem, &Hires, method).unwrap();
        let y = sol.last();
        for i in 0..8 {
            let rel = (y[i] - HIRES_REF[i]).abs() / HIRES_REF[i].abs();
            assert!(
                rel < 1e-5,
                "{}: component {i} off by {rel:e}",
                method.name()
            );
        }
    }
}

#[test]
fn orego_agrees_across_methods() {
    let problem = ivp("orego", 0.0, 360.0, 36.0, &[1.0, 2.0, 3.0], 1e-8);
    let finals: Vec<Vec<f64>> = METHODS
        .iter()
        .map(|&m| solve(&problem, &Orego, m).unwrap().last())
        .collect();
    for f in &finals {
        assert!((f[0] - 1.000815).abs() < 1e-3, "y0 = {}", f[0]);
        assert!((f[1] - 1228.18).abs() / 1228.18 < 1e-3, "y1 = {}", f[1]);
        assert!((f[2] - 132.055).abs() / 132.055 < 2e-3, "y2 = {}", f[2]);
    }
    for pair in finals.windows(2) {
        for i in 0..3 {
            let rel = (pair[0][i] - pair[1][i]).abs() / pair[0][i].abs();
            assert!(rel < 1e-3, "methods disagree on component {i}: {rel:e}");
        }
    }
}

#[test]
fn stiff_van_der_pol_crosses_the_relaxation() {
    let problem = ivp("vdpol", 0.0, 2.0, 0.2, &[2.0, 0.0], 1e-8);
    let finals: Vec<Vec<f64>> = METHODS
        .iter()
        .map(|&m| solve(&problem, &VanDerPol { mu: 1e-6 }, m).unwrap().last())
        .collect();
    for f in &finals {
        assert!((f[0] - 1.7061).abs() < 1e-3, "y0 = {}", f[0]);
        assert!((f[1] + 0.8928).abs() < 1e-3, "y1 = {}", f[1]);
    }
    for pair in finals.windows(2) {
        assert!((pair[0][0] - pair[1][0]).abs() < 1e-4);
    }
}

#[test]
fn configuration_errors_are_reported_before_integration() {
    let mut problem = ivp("bad", 0.0, 1.0, 0.1, &[1.0, 0.5], 1e-6);
    problem.tolerance = 2.0;
    match solve(&problem, &LinearPair, Method::Mrt) {
        Err(SolveError::Config { reason }) => assert!(reason.contains("tolerance")),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn blow_up_is_surfaced_with_the_abscissa() {
    // y' = y^2, y(0) = 1 escapes to infinity at t = 1
    let f = |_t: f64, y: &[f64], dydt: &mut [f64]| {
        dydt[0] = y[0] * y[0];
    };
    let problem = ivp("blowup", 0.0, 2.0, 0.1, &[1.0], 1e-8);
    for method in METHODS {
        let err = solve(&problem, &f, method).unwrap_err();
        match err {
            SolveError::Convergence { t, .. } | SolveError::Numeric { t, .. } => {
                assert!((0.9..=1.1).contains(&t), "{}: t = {t}", method.name());
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}

#[test]
fn cancellation_is_observed_between_steps() {
    let token = CancelToken::new();
    token.cancel();
    let options = SolveOptions::builder().cancel(token).build();
    let problem = ivp("cancelled", 0.0, 5.0, 0.25, &[1.0, 0.5], 1e-8);
    match solve_with(&problem, &LinearPair, Method::Ros34PRw, &options) {
        Err(SolveError::Cancelled { .. }) => {}
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn work_counters_are_populated() {
    let problem = ivp("stats", 0.0, 5.0, 0.25, &[1.0, 0.5], 1e-8);
    let sol = solve(&problem, &LinearPair, Method::Ros34PRw).unwrap();
    let s = sol.stats;
    assert!(s.naccpt > 0);
    assert_eq!(s.nstep, s.naccpt + s.nrejct);
    assert!(s.ndec >= s.naccpt);
    assert!(s.njev >= 1);
    // n + 1 evaluations per Jacobian, stages and df/dt on top
    assert!(s.nfev > s.naccpt);
}
