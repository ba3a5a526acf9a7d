//! Solver adapters for pangolin expression graphs.
//!
//! Every adapter follows the same three-phase contract:
//!
//! 1. `init` — bind problem structure (sparsity, dimensions, rhs count);
//! 2. `prepare` / `factorize` — bind numeric data and pre-process it
//!    (idempotent for unchanged data, re-invoked after data changes);
//! 3. `solve` / `evaluate` — consume bound inputs, produce numeric outputs.
//!
//! Calling a phase out of order is a contract violation reported as
//! [`SolverError::OutOfOrder`]; singular factorizations and non-convergence
//! are [`SolverError::Numeric`] results, never NaN-filled output. The graph
//! engine treats every adapter as a synchronous opaque collaborator.

pub mod adapter;
pub mod convergence;
pub mod dense_lu;
pub mod newton;
pub mod qp;
pub mod registry;
pub mod sparse_lu;

pub use adapter::{LinearSolver, Phase, SolverError};
pub use convergence::{norm, ConvergenceParams};
pub use dense_lu::DenseLu;
pub use newton::{ImplicitFunction, Newton, NewtonResult};
pub use qp::{KktQp, QpSolution};
pub use registry::SolverRegistry;
pub use sparse_lu::SparseLu;
