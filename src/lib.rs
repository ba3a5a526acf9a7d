//! Sparse matrix expression graphs with algorithmic differentiation.
//!
//! pangolin builds directed acyclic graphs of matrix-valued expressions over
//! compressed-column [`Sparsity`] patterns, then evaluates them numerically,
//! propagates structural dependency masks, and computes exact forward- and
//! reverse-mode derivatives over the same graph structure.
//!
//! # Overview
//!
//! - [`Sparsity`] — immutable compressed column-major nonzero pattern, shared
//!   across the graph via `Arc`.
//! - [`Graph`] — an arena owning all expression nodes; [`Expr`] is a cheap
//!   `Copy` handle to one output of one node. Children always precede their
//!   parents in the arena, so cycles are impossible by construction.
//! - The split family ([`Graph::horzsplit`], [`Graph::vertsplit`],
//!   [`Graph::diagsplit`]) partitions a value's nonzeros into consecutive
//!   blocks; the concat constructors are their exact inverses.
//! - [`Engine`] — binds a graph to designated inputs/outputs and runs
//!   numeric evaluation, batched forward/reverse seed propagation, and
//!   forward/backward sparsity propagation on 64-bit dependency masks.
//!
//! # Example
//!
//! ```
//! use pangolin::{Engine, Graph};
//!
//! let mut g = Graph::<f64>::new();
//! let x = g.sym_dense("x", 2, 5);
//! let parts = g.horzsplit(x, &[0, 2, 5]).unwrap();
//!
//! let mut engine = Engine::new(&g, &[x], &parts).unwrap();
//! // Column-major nonzeros of [[1,2,3,4,5],[6,7,8,9,10]].
//! let nz = [1.0, 6.0, 2.0, 7.0, 3.0, 8.0, 4.0, 9.0, 5.0, 10.0];
//! let out = engine.eval(&[&nz]).unwrap();
//! assert_eq!(out[0], vec![1.0, 6.0, 2.0, 7.0]);
//! assert_eq!(out[1], vec![3.0, 8.0, 4.0, 9.0, 5.0, 10.0]);
//! ```

pub mod engine;
pub mod error;
pub mod float;
pub mod graph;
pub mod node;
pub mod sparsity;

pub(crate) mod split;

#[cfg(feature = "nalgebra")]
pub mod nalgebra_support;

pub use engine::Engine;
pub use error::{ConstructionError, CycleError, EvalError};
pub use float::Float;
pub use graph::{Expr, Graph};
pub use node::{BinOp, ExternalFunction, Node, Op, UnOp};
pub use sparsity::Sparsity;
