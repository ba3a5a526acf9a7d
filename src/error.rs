//! Error types for graph and pattern construction and for evaluation.
//!
//! Construction errors are always raised synchronously while the graph is
//! being built; by the time an [`Engine`](crate::Engine) traverses a graph,
//! the structure is known to be valid and only numeric failures from
//! external function calls can occur.

use std::fmt;

/// A child reference that is not (yet) part of the arena.
///
/// Since nodes can only reference already-inserted nodes, any edge to an
/// index at or past the end of the arena would be dangling or close a cycle.
/// The arena is left unchanged when this is raised.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CycleError {
    /// The offending node index.
    pub node: usize,
    /// Number of nodes currently in the arena.
    pub arena_len: usize,
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "child reference to node {} would be dangling or cyclic (arena has {} nodes)",
            self.node, self.arena_len
        )
    }
}

impl std::error::Error for CycleError {}

/// Errors raised while constructing sparsity patterns or graph nodes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConstructionError {
    /// Two operands have incompatible shapes.
    ShapeMismatch {
        /// Operation being constructed.
        what: &'static str,
        left: (usize, usize),
        right: (usize, usize),
    },
    /// An index or range exceeds the valid bound.
    OutOfBounds {
        what: &'static str,
        index: usize,
        bound: usize,
    },
    /// A coordinate appears more than once in a triplet list.
    DuplicateEntry { row: usize, col: usize },
    /// A split offset list is not strictly increasing or does not span
    /// exactly `[0, dim]`.
    InvalidOffsets {
        what: &'static str,
        offsets: Vec<usize>,
        dim: usize,
    },
    /// The number of nonzero values does not match the pattern.
    ValueCount { expected: usize, got: usize },
    /// A vertical split was requested on a value that is not a single column.
    NotAVector { nrow: usize, ncol: usize },
    /// A symbol reachable from the requested outputs was not bound as an
    /// engine input.
    UnboundSymbol { name: String },
    /// A child reference would be dangling or close a cycle.
    Cycle(CycleError),
}

impl fmt::Display for ConstructionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstructionError::ShapeMismatch { what, left, right } => write!(
                f,
                "{}: shape mismatch between {}x{} and {}x{}",
                what, left.0, left.1, right.0, right.1
            ),
            ConstructionError::OutOfBounds { what, index, bound } => {
                write!(f, "{}: index {} out of bounds (limit {})", what, index, bound)
            }
            ConstructionError::DuplicateEntry { row, col } => {
                write!(f, "duplicate entry at ({}, {})", row, col)
            }
            ConstructionError::InvalidOffsets { what, offsets, dim } => write!(
                f,
                "{}: offsets {:?} must be strictly increasing from 0 to {}",
                what, offsets, dim
            ),
            ConstructionError::ValueCount { expected, got } => {
                write!(f, "expected {} nonzero values, got {}", expected, got)
            }
            ConstructionError::NotAVector { nrow, ncol } => {
                write!(f, "vertical split requires a column vector, got {}x{}", nrow, ncol)
            }
            ConstructionError::UnboundSymbol { name } => {
                write!(f, "symbol '{}' is reachable from the outputs but not bound as an input", name)
            }
            ConstructionError::Cycle(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for ConstructionError {}

impl From<CycleError> for ConstructionError {
    fn from(e: CycleError) -> Self {
        ConstructionError::Cycle(e)
    }
}

/// Errors surfaced during a traversal of a structurally valid graph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EvalError {
    /// An external function call failed numerically (singular factorization,
    /// non-convergence). Evaluation stops before any dependent node runs.
    Numeric { reason: String },
    /// Derivative propagation was requested through an opaque external
    /// function call.
    NotDifferentiable { what: String },
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::Numeric { reason } => write!(f, "numeric failure: {}", reason),
            EvalError::NotDifferentiable { what } => {
                write!(f, "cannot differentiate through external function '{}'", what)
            }
        }
    }
}

impl std::error::Error for EvalError {}
