//! Shared stiff test problems and helpers.

use rowode::prelude::*;

pub struct Robertson;

impl OdeSystem for Robertson {
    fn rhs(&self, _t: f64, y: &[f64], dydt: &mut [f64]) {
        dydt[0] = -0.04 * y[0] + 1.0e4 * y[1] * y[2];
        dydt[1] = 0.04 * y[0] - 1.0e4 * y[1] * y[2] - 3.0e7 * y[1] * y[1];
        dydt[2] = 3.0e7 * y[1] * y[1];
    }
}

pub struct Hires;

impl OdeSystem for Hires {
    fn rhs(&self, _t: f64, y: &[f64], dydt: &mut [f64]) {
        dydt[0] = -1.71 * y[0] + 0.43 * y[1] + 8.32 * y[2] + 0.0007;
        dydt[1] = 1.71 * y[0] - 8.75 * y[1];
        dydt[2] = -10.03 * y[2] + 0.43 * y[3] + 0.035 * y[4];
        dydt[3] = 8.32 * y[1] + 1.71 * y[2] - 1.12 * y[3];
        dydt[4] = -1.745 * y[4] + 0.43 * y[5] + 0.43 * y[6];
        dydt[5] =
            -280.0 * y[5] * y[7] + 0.69 * y[3] + 1.71 * y[4] - 0.43 * y[5] + 0.69 * y[6];
        dydt[6] = 280.0 * y[5] * y[7] - 1.81 * y[6];
        dydt[7] = -280.0 * y[5] * y[7] + 1.81 * y[6];
    }
}

/// Reference final state of HIRES at t = 321.8122 (IVP test set).
pub const HIRES_REF: [f64; 8] = [
    0.7371312573325668e-3,
    0.1442485726316185e-3,
    0.5888729740967575e-4,
    0.1175651343283149e-2,
    0.2386356198831331e-2,
    0.6238968252742796e-2,
    0.2849998395185769e-2,
    0.2850001604814231e-2,
];

pub struct VanDerPol {
    pub mu: f64,
}

impl OdeSystem for VanDerPol {
    fn rhs(&self, _t: f64, y: &[f64], dydt: &mut [f64]) {
        dydt[0] = y[1];
        dydt[1] = ((1.0 - y[0] * y[0]) * y[1] - y[0]) / self.mu;
    }
}

pub struct Orego;

impl OdeSystem for Orego {
    fn rhs(&self, _t: f64, y: &[f64], dydt: &mut [f64]) {
        dydt[0] = 77.27 * (y[1] + y[0] * (1.0 - 8.375e-6 * y[0] - y[1]));
        dydt[1] = (y[2] - (1.0 + y[0]) * y[1]) / 77.27;
        dydt[2] = 0.161 * (y[0] - y[2]);
    }
}

/// y' = A y with A = [[-2, 1], [1, -2]]; eigenvalues -1 and -3.
pub struct LinearPair;

impl OdeSystem for LinearPair {
    fn rhs(&self, _t: f64, y: &[f64], dydt: &mut [f64]) {
        dydt[0] = -2.0 * y[0] + y[1];
        dydt[1] = y[0] - 2.0 * y[1];
    }
}

/// Exact solution of [`LinearPair`] for y(0) = (1, 0.5).
pub fn linear_pair_exact(t: f64) -> [f64; 2] {
    let a = 0.75 * (-t).exp();
    let b = 0.25 * (-3.0 * t).exp();
    [a + b, a - b]
}

pub fn ivp(name: &str, t0: f64, t1: f64, step: f64, y0: &[f64], tol: f64) -> Ivp {
    Ivp::builder()
        .name(name)
        .arg(ArgRange::new("t", t0, t1, step))
        .initial(y0.to_vec())
        .names((0..y0.len()).map(|i| format!("y{i}")).collect())
        .tolerance(tol)
        .build()
}

pub const METHODS: [Method; 3] = [Method::Mrt, Method::Ros3PRw, Method::Ros34PRw];
