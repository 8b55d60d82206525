//! LU factorization with partial pivoting and the paired triangular solve.

use crate::Float;

use super::Matrix;

/// Signal that a pivot fell below the singularity threshold. The step kernel
/// treats this as "Jacobian stale or step too large" and forces a rejection
/// plus a Jacobian refresh rather than an immediate failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LuSingular;

/// Factor `a` in place into L\U with partial pivoting, writing the row
/// permutation into `piv`. A pivot whose magnitude falls below the roundoff
/// floor of `||A||_inf` reports [`LuSingular`]. On stiff iteration matrices
/// the largest row can sit many orders of magnitude above the slow rows, so
/// the floor must stay near machine precision or valid systems get flagged.
pub(crate) fn lu_factor(a: &mut Matrix, piv: &mut [usize]) -> Result<(), LuSingular> {
    let n = a.n();
    debug_assert_eq!(piv.len(), n);
    let pivot_floor = Float::EPSILON * a.norm_inf();

    for k in 0..n {
        // Pivot search down column k
        let mut pivot_row = k;
        let mut pivot_val = a[(k, k)].abs();
        for i in (k + 1)..n {
            let val = a[(i, k)].abs();
            if val > pivot_val {
                pivot_val = val;
                pivot_row = i;
            }
        }
        if pivot_val <= pivot_floor {
            return Err(LuSingular);
        }
        piv[k] = pivot_row;
        if pivot_row != k {
            for j in 0..n {
                let tmp = a[(k, j)];
                a[(k, j)] = a[(pivot_row, j)];
                a[(pivot_row, j)] = tmp;
            }
        }
        // Eliminate below the pivot, storing multipliers in place
        let akk = a[(k, k)];
        for i in (k + 1)..n {
            let factor = a[(i, k)] / akk;
            a[(i, k)] = factor;
            for j in (k + 1)..n {
                a[(i, j)] -= factor * a[(k, j)];
            }
        }
    }
    Ok(())
}

/// Solve `A x = b` in place using factors and permutation from [`lu_factor`];
/// `b` is overwritten with `x`. Allocation-free.
pub(crate) fn lu_solve(a: &Matrix, piv: &[usize], b: &mut [Float]) {
    let n = a.n();
    debug_assert_eq!(b.len(), n);

    // Apply the row permutation to b
    for k in 0..n {
        let p = piv[k];
        if p != k {
            b.swap(k, p);
        }
    }
    // Forward solve L y = P b (unit diagonal)
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= a[(i, k)] * b[k];
        }
        b[i] = sum;
    }
    // Backward solve U x = y
    for i in (0..n).rev() {
        let mut sum = b[i];
        for k in (i + 1)..n {
            sum -= a[(i, k)] * b[k];
        }
        b[i] = sum / a[(i, i)];
    }
}
