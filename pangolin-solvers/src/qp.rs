//! Equality-constrained QP via a single KKT solve.
//!
//! Solves
//! ```text
//!   minimize    1/2 x' H x + g' x
//!   subject to  A x = b
//! ```
//! by assembling the KKT system
//! ```text
//!   [ H  A' ] [ x      ]   [ -g ]
//!   [ A  0  ] [ lambda ] = [  b ]
//! ```
//! and handing it to a pluggable [`LinearSolver`].

use pangolin::Sparsity;

use crate::adapter::{require, LinearSolver, Phase, SolverError};

/// Primal/dual solution of an equality-constrained QP.
#[derive(Debug, Clone)]
pub struct QpSolution {
    /// Primal point `x`.
    pub x: Vec<f64>,
    /// Lagrange multipliers of the equality constraints.
    pub multipliers: Vec<f64>,
}

/// KKT-based QP solver behind the three-phase adapter contract.
pub struct KktQp {
    n: usize,
    m: usize,
    linear: Box<dyn LinearSolver>,
    phase: Phase,
}

impl KktQp {
    pub fn new(linear: Box<dyn LinearSolver>) -> Self {
        KktQp {
            n: 0,
            m: 0,
            linear,
            phase: Phase::Created,
        }
    }

    /// Bind problem dimensions: `n` variables, `m` equality constraints.
    pub fn init(&mut self, n: usize, m: usize) -> Result<(), SolverError> {
        self.n = n;
        self.m = m;
        self.linear.init(&Sparsity::dense(n + m, n + m), 1)?;
        self.phase = Phase::Initialized;
        Ok(())
    }

    /// Bind the numeric Hessian and constraint matrix and factorize the
    /// KKT system.
    ///
    /// `h` is the `n x n` Hessian and `a` the `m x n` constraint matrix,
    /// both dense column-major.
    ///
    /// # Panics
    ///
    /// Panics if `h` or `a` has the wrong length for the bound dimensions.
    pub fn prepare(&mut self, h: &[f64], a: &[f64]) -> Result<(), SolverError> {
        require(self.phase, Phase::Initialized, "prepare")?;
        let (n, m) = (self.n, self.m);
        assert_eq!(h.len(), n * n, "Hessian has wrong length");
        assert_eq!(a.len(), m * n, "constraint matrix has wrong length");

        // KKT matrix, dense column-major over n + m rows.
        let dim = n + m;
        let mut kkt = vec![0.0; dim * dim];
        for c in 0..n {
            for r in 0..n {
                kkt[c * dim + r] = h[c * n + r];
            }
            for r in 0..m {
                kkt[c * dim + n + r] = a[c * m + r];
            }
        }
        for c in 0..m {
            // A' block: column n + c holds row c of A.
            for r in 0..n {
                kkt[(n + c) * dim + r] = a[r * m + c];
            }
        }

        self.linear.prepare(&kkt)?;
        self.phase = Phase::Prepared;
        Ok(())
    }

    /// Solve for the bound KKT system with gradient `g` and constraint
    /// right-hand side `b`.
    pub fn solve(&mut self, g: &[f64], b: &[f64]) -> Result<QpSolution, SolverError> {
        require(self.phase, Phase::Prepared, "solve")?;
        let (n, m) = (self.n, self.m);
        assert_eq!(g.len(), n, "gradient has wrong length");
        assert_eq!(b.len(), m, "constraint right-hand side has wrong length");

        let mut rhs = vec![0.0; n + m];
        for i in 0..n {
            rhs[i] = -g[i];
        }
        rhs[n..].copy_from_slice(b);

        self.linear.solve(&mut rhs, 1, false)?;

        Ok(QpSolution {
            x: rhs[..n].to_vec(),
            multipliers: rhs[n..].to_vec(),
        })
    }
}
