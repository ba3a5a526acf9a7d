//! Dense LU linear solver adapter.
//!
//! Scatters the bound sparse nonzeros into a dense matrix and factorizes
//! with partial pivoting. Intended for small systems (Newton steps, KKT
//! systems); use [`SparseLu`](crate::SparseLu) for large sparse ones.

use num_traits::Float;
use pangolin::Sparsity;

use crate::adapter::{require, LinearSolver, Phase, SolverError};

/// Result of LU factorization with partial pivoting.
///
/// Stores the combined L/U factors in a single matrix (L below diagonal,
/// unit diagonal implicit; U on and above the diagonal) plus the row
/// permutation.
pub struct LuFactors<F> {
    lu: Vec<Vec<F>>,
    /// `perm[i]` is the original row index for factored row `i`.
    perm: Vec<usize>,
    n: usize,
}

impl<F: Float> LuFactors<F> {
    /// Dimension of the factored matrix.
    pub fn n(&self) -> usize {
        self.n
    }

    /// Row permutation applied during pivoting.
    pub fn permutation(&self) -> &[usize] {
        &self.perm
    }

    /// Entry `(i, j)` of the packed L/U storage.
    pub fn entry(&self, i: usize, j: usize) -> F {
        self.lu[i][j]
    }
}

/// Factorize an `n x n` matrix via LU decomposition with partial pivoting.
///
/// Returns `None` if the matrix is singular (zero or near-zero pivot).
// Explicit indexing is clearer for pivoted LU: row/col indices drive pivot search and elimination
#[allow(clippy::needless_range_loop)]
pub fn lu_factor<F: Float>(a: &[Vec<F>]) -> Option<LuFactors<F>> {
    let n = a.len();
    debug_assert!(a.iter().all(|row| row.len() == n));

    let mut lu: Vec<Vec<F>> = a.to_vec();
    let mut perm: Vec<usize> = (0..n).collect();

    let eps = F::from(1e-12).unwrap_or_else(F::epsilon);

    for col in 0..n {
        // Find pivot
        let mut max_val = lu[col][col].abs();
        let mut max_row = col;
        for row in (col + 1)..n {
            let v = lu[row][col].abs();
            if v > max_val {
                max_val = v;
                max_row = row;
            }
        }

        if max_val < eps {
            return None; // Singular
        }

        if max_row != col {
            lu.swap(col, max_row);
            perm.swap(col, max_row);
        }

        let pivot = lu[col][col];

        // Eliminate below, storing L factors in-place
        for row in (col + 1)..n {
            let factor = lu[row][col] / pivot;
            lu[row][col] = factor;
            for j in (col + 1)..n {
                let val = lu[col][j];
                lu[row][j] = lu[row][j] - factor * val;
            }
        }
    }

    Some(LuFactors { lu, perm, n })
}

/// Solve `A * x = b` using a pre-computed LU factorization.
// Explicit indexing is clearer for forward/back substitution with permuted indices
#[allow(clippy::needless_range_loop)]
pub fn lu_back_solve<F: Float>(factors: &LuFactors<F>, b: &[F]) -> Vec<F> {
    let n = factors.n;
    debug_assert_eq!(b.len(), n);

    // Apply permutation to b
    let mut y = vec![F::zero(); n];
    for i in 0..n {
        y[i] = b[factors.perm[i]];
    }

    // Forward substitution (L has unit diagonal)
    for i in 1..n {
        for j in 0..i {
            let l_ij = factors.lu[i][j];
            let y_j = y[j];
            y[i] = y[i] - l_ij * y_j;
        }
    }

    // Back substitution
    for i in (0..n).rev() {
        for j in (i + 1)..n {
            let u_ij = factors.lu[i][j];
            let y_j = y[j];
            y[i] = y[i] - u_ij * y_j;
        }
        y[i] = y[i] / factors.lu[i][i];
    }

    y
}

/// Solve `A^T * x = b` using a factorization of `A`.
///
/// With `P A = L U`, the transposed system is `U^T L^T (P x) = b`: forward
/// substitution on `U^T`, back substitution on `L^T`, then the permutation
/// is applied on the way out.
#[allow(clippy::needless_range_loop)]
pub fn lu_transpose_solve<F: Float>(factors: &LuFactors<F>, b: &[F]) -> Vec<F> {
    let n = factors.n;
    debug_assert_eq!(b.len(), n);

    // Forward substitution on U^T (diagonal of U is the pivot row).
    let mut y = b.to_vec();
    for i in 0..n {
        for j in 0..i {
            let u_ji = factors.lu[j][i];
            let y_j = y[j];
            y[i] = y[i] - u_ji * y_j;
        }
        y[i] = y[i] / factors.lu[i][i];
    }

    // Back substitution on L^T (unit diagonal).
    for i in (0..n).rev() {
        for j in (i + 1)..n {
            let l_ji = factors.lu[j][i];
            let y_j = y[j];
            y[i] = y[i] - l_ji * y_j;
        }
    }

    // Undo the pivoting: y solves for P x, so x[perm[i]] = y[i].
    let mut x = vec![F::zero(); n];
    for i in 0..n {
        x[factors.perm[i]] = y[i];
    }
    x
}

/// Dense LU behind the three-phase [`LinearSolver`] contract.
pub struct DenseLu {
    phase: Phase,
    sp: Option<Sparsity>,
    nrhs: usize,
    factors: Option<LuFactors<f64>>,
    factor_sp: Option<Sparsity>,
}

impl DenseLu {
    pub fn new() -> Self {
        DenseLu {
            phase: Phase::Created,
            sp: None,
            nrhs: 0,
            factors: None,
            factor_sp: None,
        }
    }

    /// The numeric factorization, for diagnostic reuse.
    pub fn factorization(&self) -> Option<&LuFactors<f64>> {
        self.factors.as_ref()
    }
}

impl Default for DenseLu {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearSolver for DenseLu {
    fn init(&mut self, sp: &Sparsity, nrhs: usize) -> Result<(), SolverError> {
        if sp.nrow() != sp.ncol() {
            return Err(SolverError::Numeric {
                reason: format!("linear system must be square, got {}x{}", sp.nrow(), sp.ncol()),
            });
        }
        self.sp = Some(sp.clone());
        self.nrhs = nrhs;
        self.factors = None;
        self.factor_sp = None;
        self.phase = Phase::Initialized;
        Ok(())
    }

    fn prepare(&mut self, nonzeros: &[f64]) -> Result<(), SolverError> {
        require(self.phase, Phase::Initialized, "prepare")?;
        let sp = self.sp.as_ref().unwrap_or_else(|| unreachable!());
        assert_eq!(
            nonzeros.len(),
            sp.nnz(),
            "wrong number of nonzeros for bound sparsity"
        );

        let n = sp.nrow();
        let mut dense = vec![vec![0.0; n]; n];
        for c in 0..sp.ncol() {
            for k in sp.col_range(c) {
                dense[sp.row()[k]][c] = nonzeros[k];
            }
        }

        match lu_factor(&dense) {
            Some(f) => {
                self.factors = Some(f);
                // The packed factors are stored dense.
                self.factor_sp = Some(Sparsity::dense(n, n));
                self.phase = Phase::Prepared;
                Ok(())
            }
            None => Err(SolverError::Numeric {
                reason: "singular matrix in LU factorization".to_string(),
            }),
        }
    }

    fn solve(&mut self, x: &mut [f64], nrhs: usize, transpose: bool) -> Result<(), SolverError> {
        require(self.phase, Phase::Prepared, "solve")?;
        let factors = self.factors.as_ref().unwrap_or_else(|| unreachable!());
        let n = factors.n();
        assert_eq!(x.len(), n * nrhs, "right-hand side has wrong length");
        assert!(nrhs <= self.nrhs, "more right-hand sides than bound at init");

        for r in 0..nrhs {
            let col = &x[r * n..(r + 1) * n];
            let sol = if transpose {
                lu_transpose_solve(factors, col)
            } else {
                lu_back_solve(factors, col)
            };
            x[r * n..(r + 1) * n].copy_from_slice(&sol);
        }
        Ok(())
    }

    fn factorization_sparsity(&self) -> Option<&Sparsity> {
        self.factor_sp.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transpose_solve_matches_forward() {
        // A = [[2, 1], [0, 3]]
        let a = vec![vec![2.0, 1.0], vec![0.0, 3.0]];
        let f = lu_factor(&a).unwrap();
        // A^T x = [2, 7] -> x = [1, 2]
        let x = lu_transpose_solve(&f, &[2.0, 7.0]);
        assert!((x[0] - 1.0).abs() < 1e-12);
        assert!((x[1] - 2.0).abs() < 1e-12);
    }
}
