//! Sampled solution and integration statistics.

use serde::Serialize;

use crate::Float;

/// Work counters for one integration, in the classic stiff-solver layout.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Stats {
    /// Right-hand side evaluations.
    pub nfev: usize,
    /// Jacobian evaluations.
    pub njev: usize,
    /// LU decompositions.
    pub ndec: usize,
    /// Linear system solves.
    pub nsol: usize,
    /// Steps attempted.
    pub nstep: usize,
    /// Steps accepted.
    pub naccpt: usize,
    /// Steps rejected.
    pub nrejct: usize,
}

impl Stats {
    pub(crate) fn absorb(&mut self, other: Stats) {
        self.nfev += other.nfev;
        self.njev += other.njev;
        self.ndec += other.ndec;
        self.nsol += other.nsol;
        self.nstep += other.nstep;
        self.naccpt += other.naccpt;
        self.nrejct += other.nrejct;
    }
}

/// The sampled solution on the uniform output grid.
///
/// `t[k]` is exactly `start + k * step` (the final sample is exactly the end
/// of the range), and `y[i][k]` is component i at `t[k]`: one dense column
/// per component, all of equal length.
#[derive(Debug, Clone)]
pub struct Solution {
    /// Component names, parallel to the columns of `y`.
    pub names: Vec<String>,
    /// The argument grid.
    pub t: Vec<Float>,
    /// One column per component.
    pub y: Vec<Vec<Float>>,
    /// Work counters.
    pub stats: Stats,
}

impl Solution {
    /// Number of samples.
    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    /// Column for the component called `name`, if present.
    pub fn column(&self, name: &str) -> Option<&[Float]> {
        let i = self.names.iter().position(|n| n == name)?;
        Some(&self.y[i])
    }

    /// The final state, one scalar per component.
    pub fn last(&self) -> Vec<Float> {
        self.y.iter().map(|col| *col.last().unwrap()).collect()
    }

    /// Append another solution's samples (used across pipeline stages; the
    /// boundary sample of each stage is kept verbatim).
    pub(crate) fn extend(&mut self, other: Solution) {
        self.t.extend_from_slice(&other.t);
        for (col, ocol) in self.y.iter_mut().zip(other.y.iter()) {
            col.extend_from_slice(ocol);
        }
        self.stats.absorb(other.stats);
    }
}
