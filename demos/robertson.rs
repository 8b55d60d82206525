//! # Demo: Robertson chemical kinetics
//!
//! The classic severely stiff three-species system, integrated over eleven
//! decades of time:
//!
//! y0' = -0.04 y0 + 1e4 y1 y2
//! y1' =  0.04 y0 - 1e4 y1 y2 - 3e7 y1^2
//! y2' =  3e7 y1^2

use rowode::prelude::*;

struct Robertson;

impl OdeSystem for Robertson {
    fn rhs(&self, _t: f64, y: &[f64], dydt: &mut [f64]) {
        dydt[0] = -0.04 * y[0] + 1.0e4 * y[1] * y[2];
        dydt[1] = 0.04 * y[0] - 1.0e4 * y[1] * y[2] - 3.0e7 * y[1] * y[1];
        dydt[2] = 3.0e7 * y[1] * y[1];
    }
}

fn main() {
    let ivp = Ivp::builder()
        .name("rober")
        .arg(ArgRange::new("t", 0.0, 1e11, 1e10))
        .initial(vec![1.0, 0.0, 0.0])
        .names(vec!["A".into(), "B".into(), "C".into()])
        .tolerance(1e-7)
        .build();

    for method in [Method::Mrt, Method::Ros3PRw, Method::Ros34PRw] {
        match solve(&ivp, &Robertson, method) {
            Ok(sol) => {
                println!("{}:", method.name());
                for k in 0..sol.len() {
                    println!(
                        "  t = {:>8.1e}  A = {:.6e}  B = {:.6e}  C = {:.8}",
                        sol.t[k], sol.y[0][k], sol.y[1][k], sol.y[2][k]
                    );
                }
                let s = sol.stats;
                println!(
                    "  {} steps ({} accepted, {} rejected), {} f evals, {} Jacobians, {} LU\n",
                    s.nstep, s.naccpt, s.nrejct, s.nfev, s.njev, s.ndec
                );
            }
            Err(e) => eprintln!("{}: {e}", method.name()),
        }
    }
}
