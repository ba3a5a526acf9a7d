//! Sparse LU linear solver adapter backed by faer.

use faer::linalg::solvers::SpSolver;
use faer::sparse::SparseColMat;
use faer::Col;
use pangolin::Sparsity;

use crate::adapter::{require, LinearSolver, Phase, SolverError};

/// faer sparse LU behind the three-phase [`LinearSolver`] contract.
pub struct SparseLu {
    phase: Phase,
    sp: Option<Sparsity>,
    nrhs: usize,
    lu: Option<faer::sparse::linalg::solvers::Lu<usize, f64>>,
}

impl SparseLu {
    pub fn new() -> Self {
        SparseLu {
            phase: Phase::Created,
            sp: None,
            nrhs: 0,
            lu: None,
        }
    }
}

impl Default for SparseLu {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the sparse matrix and factorize.
///
/// Returns `None` if the matrix is singular or construction fails. Uses
/// `catch_unwind` because faer's sparse LU panics on singular matrices
/// rather than returning an error.
fn factorize(
    sp: &Sparsity,
    nonzeros: &[f64],
) -> Option<faer::sparse::linalg::solvers::Lu<usize, f64>> {
    let n = sp.nrow();
    let mut triplets = Vec::with_capacity(sp.nnz());
    for c in 0..sp.ncol() {
        for k in sp.col_range(c) {
            triplets.push((sp.row()[k], c, nonzeros[k]));
        }
    }
    let mat = SparseColMat::<usize, f64>::try_new_from_triplets(n, n, &triplets).ok()?;
    std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| mat.sp_lu().ok()))
        .ok()
        .flatten()
}

impl LinearSolver for SparseLu {
    fn init(&mut self, sp: &Sparsity, nrhs: usize) -> Result<(), SolverError> {
        if sp.nrow() != sp.ncol() {
            return Err(SolverError::Numeric {
                reason: format!("linear system must be square, got {}x{}", sp.nrow(), sp.ncol()),
            });
        }
        self.sp = Some(sp.clone());
        self.nrhs = nrhs;
        self.lu = None;
        self.phase = Phase::Initialized;
        Ok(())
    }

    fn prepare(&mut self, nonzeros: &[f64]) -> Result<(), SolverError> {
        require(self.phase, Phase::Initialized, "prepare")?;
        let Some(sp) = self.sp.as_ref() else {
            unreachable!()
        };
        assert_eq!(
            nonzeros.len(),
            sp.nnz(),
            "wrong number of nonzeros for bound sparsity"
        );

        match factorize(sp, nonzeros) {
            Some(lu) => {
                self.lu = Some(lu);
                self.phase = Phase::Prepared;
                Ok(())
            }
            None => Err(SolverError::Numeric {
                reason: "singular matrix in sparse LU factorization".to_string(),
            }),
        }
    }

    fn solve(&mut self, x: &mut [f64], nrhs: usize, transpose: bool) -> Result<(), SolverError> {
        require(self.phase, Phase::Prepared, "solve")?;
        let Some(lu) = self.lu.as_ref() else {
            unreachable!()
        };
        let Some(sp) = self.sp.as_ref() else {
            unreachable!()
        };
        let n = sp.nrow();
        assert_eq!(x.len(), n * nrhs, "right-hand side has wrong length");
        assert!(nrhs <= self.nrhs, "more right-hand sides than bound at init");

        for r in 0..nrhs {
            let rhs = Col::<f64>::from_fn(n, |i| x[r * n + i]);
            let sol = if transpose {
                lu.solve_transpose(&rhs)
            } else {
                lu.solve(&rhs)
            };
            for i in 0..n {
                x[r * n + i] = sol[i];
            }
        }
        Ok(())
    }
}
