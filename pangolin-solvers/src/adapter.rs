//! The uniform adapter contract shared by all solver wrappers.

use std::fmt;

use pangolin::Sparsity;

/// Lifecycle phase of an adapter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    /// Constructed, no structure bound.
    Created,
    /// Structure (sparsity, dimensions) bound via `init`.
    Initialized,
    /// Numeric data bound and pre-processed via `prepare`.
    Prepared,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Created => f.write_str("created"),
            Phase::Initialized => f.write_str("initialized"),
            Phase::Prepared => f.write_str("prepared"),
        }
    }
}

/// Errors reported by solver adapters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SolverError {
    /// A phase was invoked before its prerequisites: a programming-contract
    /// violation, not a numeric condition. No numeric output is produced.
    OutOfOrder {
        operation: &'static str,
        phase: Phase,
    },
    /// The underlying method failed numerically: singular matrix,
    /// non-convergence, infeasible problem.
    Numeric { reason: String },
}

impl fmt::Display for SolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverError::OutOfOrder { operation, phase } => {
                write!(f, "'{}' called while solver is only {}", operation, phase)
            }
            SolverError::Numeric { reason } => write!(f, "numeric failure: {}", reason),
        }
    }
}

impl std::error::Error for SolverError {}

/// Require that an adapter has reached `needed` before running `operation`.
pub(crate) fn require(
    current: Phase,
    needed: Phase,
    operation: &'static str,
) -> Result<(), SolverError> {
    if current >= needed {
        Ok(())
    } else {
        Err(SolverError::OutOfOrder {
            operation,
            phase: current,
        })
    }
}

/// A direct linear solver behind the three-phase contract.
///
/// `init` binds the system's sparsity and the expected right-hand-side
/// count; `prepare` binds nonzero values and factorizes; `solve` overwrites
/// `x` (holding `nrhs` stacked columns) with the solution, optionally for
/// the transposed system.
pub trait LinearSolver {
    /// Bind problem structure. The pattern must be square.
    fn init(&mut self, sp: &Sparsity, nrhs: usize) -> Result<(), SolverError>;

    /// Bind nonzero values (ordered like the pattern) and factorize.
    ///
    /// Must be called again whenever the numeric values change; calling it
    /// twice with the same values is allowed and re-factorizes.
    fn prepare(&mut self, nonzeros: &[f64]) -> Result<(), SolverError>;

    /// Solve in place for `nrhs` stacked right-hand-side columns.
    fn solve(&mut self, x: &mut [f64], nrhs: usize, transpose: bool) -> Result<(), SolverError>;

    /// Sparsity of the numeric factorization, for diagnostic reuse.
    fn factorization_sparsity(&self) -> Option<&Sparsity> {
        None
    }
}
