//! Dense matrix storage and the LU kernel used by the step computation.

mod lu;

use std::ops::{Index, IndexMut};

use crate::Float;

pub(crate) use lu::{lu_factor, lu_solve};

/// Dense row-major n x n matrix of scalars.
#[derive(Debug, Clone)]
pub(crate) struct Matrix {
    n: usize,
    data: Vec<Float>,
}

impl Matrix {
    /// Zero-filled n x n matrix.
    pub fn zeros(n: usize) -> Self {
        Self {
            n,
            data: vec![0.0; n * n],
        }
    }

    pub fn n(&self) -> usize {
        self.n
    }

    /// Row `i` as a slice.
    pub fn row(&self, i: usize) -> &[Float] {
        &self.data[i * self.n..(i + 1) * self.n]
    }

    /// Max-absolute-row-sum norm, `||A||_inf`.
    pub fn norm_inf(&self) -> Float {
        (0..self.n)
            .map(|i| self.row(i).iter().map(|v| v.abs()).sum())
            .fold(0.0, Float::max)
    }

    /// True if any entry is NaN or infinite.
    pub fn has_non_finite(&self) -> bool {
        self.data.iter().any(|v| !v.is_finite())
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = Float;

    fn index(&self, (i, j): (usize, usize)) -> &Float {
        &self.data[i * self.n + j]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut Float {
        &mut self.data[i * self.n + j]
    }
}
