//! Expression nodes: one operation each, with shared child handles.

use std::fmt;
use std::sync::Arc;

use crate::error::EvalError;
use crate::float::Float;
use crate::graph::Expr;
use crate::sparsity::Sparsity;

/// Unary elementwise operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnOp {
    Neg,
}

/// Binary elementwise operations.
///
/// `Add`/`Sub` produce the union of the operand sparsities, `Mul` the
/// intersection (a structural zero annihilates the product).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
}

/// An opaque multi-input multi-output function embedded in the graph.
///
/// This is the boundary through which solver results re-enter the graph:
/// an adapter wraps its solve in an `ExternalFunction` and the solution
/// becomes a call node's output. The graph engine treats the call as a
/// synchronous black box; numeric failure inside it aborts the traversal.
pub trait ExternalFunction<F: Float>: Send + Sync {
    /// Human-readable name, used in error reports.
    fn name(&self) -> &str;

    /// Number of inputs.
    fn n_in(&self) -> usize;

    /// Number of outputs.
    fn n_out(&self) -> usize;

    /// Sparsity of input `i`.
    fn sparsity_in(&self, i: usize) -> Arc<Sparsity>;

    /// Sparsity of output `i`.
    fn sparsity_out(&self, i: usize) -> Arc<Sparsity>;

    /// Evaluate numerically. `inputs[i]` / `outputs[i]` hold the nonzeros of
    /// the corresponding pattern; output buffers are pre-sized.
    fn eval(&self, inputs: &[&[F]], outputs: &mut [Vec<F>]) -> Result<(), EvalError>;
}

/// Operation kind plus operation-specific parameters.
///
/// A closed sum type dispatched by the engine; adding a node kind means
/// adding a variant here and handling it in each propagation pass.
pub enum Op<F: Float> {
    /// Named symbolic input.
    Sym(String),
    /// Constant nonzero values, ordered like the node's sparsity.
    Const(Vec<F>),
    Unary(UnOp),
    Binary(BinOp),
    /// Partition columns at the given boundary offsets.
    HorzSplit { offsets: Vec<usize> },
    /// Partition the rows of a column vector at the given boundary offsets.
    VertSplit { offsets: Vec<usize> },
    /// Carve out successive diagonal blocks; off-diagonal nonzeros are
    /// dropped, not distributed to any output.
    DiagSplit {
        row_offsets: Vec<usize>,
        col_offsets: Vec<usize>,
    },
    /// Inverse of `HorzSplit`.
    HorzCat,
    /// Inverse of `VertSplit`.
    VertCat,
    /// Inverse of `DiagSplit`.
    DiagCat,
    /// Call into an opaque external function.
    Call(Arc<dyn ExternalFunction<F>>),
}

impl<F: Float> Op<F> {
    /// Short name of the operation kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Op::Sym(_) => "sym",
            Op::Const(_) => "const",
            Op::Unary(UnOp::Neg) => "neg",
            Op::Binary(BinOp::Add) => "add",
            Op::Binary(BinOp::Sub) => "sub",
            Op::Binary(BinOp::Mul) => "mul",
            Op::HorzSplit { .. } => "horzsplit",
            Op::VertSplit { .. } => "vertsplit",
            Op::DiagSplit { .. } => "diagsplit",
            Op::HorzCat => "horzcat",
            Op::VertCat => "vertcat",
            Op::DiagCat => "diagcat",
            Op::Call(_) => "call",
        }
    }

    /// Structural equality of the operation and its parameters.
    ///
    /// Call nodes compare by function identity: two calls are equal only if
    /// they invoke the same function object.
    pub fn same_op(&self, other: &Op<F>) -> bool {
        match (self, other) {
            (Op::Sym(a), Op::Sym(b)) => a == b,
            (Op::Const(a), Op::Const(b)) => a == b,
            (Op::Unary(a), Op::Unary(b)) => a == b,
            (Op::Binary(a), Op::Binary(b)) => a == b,
            (Op::HorzSplit { offsets: a }, Op::HorzSplit { offsets: b }) => a == b,
            (Op::VertSplit { offsets: a }, Op::VertSplit { offsets: b }) => a == b,
            (
                Op::DiagSplit { row_offsets: ra, col_offsets: ca },
                Op::DiagSplit { row_offsets: rb, col_offsets: cb },
            ) => ra == rb && ca == cb,
            (Op::HorzCat, Op::HorzCat) => true,
            (Op::VertCat, Op::VertCat) => true,
            (Op::DiagCat, Op::DiagCat) => true,
            (Op::Call(a), Op::Call(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl<F: Float> fmt::Debug for Op<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Call(func) => write!(f, "call({})", func.name()),
            other => f.write_str(other.kind()),
        }
    }
}

/// One node of the expression DAG.
///
/// Immutable after insertion into the arena: transformations always create
/// new nodes. `sparsity` holds one pattern per output; single-output nodes
/// store exactly one.
pub struct Node<F: Float> {
    pub(crate) op: Op<F>,
    pub(crate) children: Vec<Expr>,
    pub(crate) sparsity: Vec<Arc<Sparsity>>,
}

impl<F: Float> Node<F> {
    /// The operation this node performs.
    pub fn op(&self) -> &Op<F> {
        &self.op
    }

    /// Number of outputs (1 for all but the split family and calls).
    pub fn n_outputs(&self) -> usize {
        self.sparsity.len()
    }

    /// Number of child dependencies.
    pub fn n_deps(&self) -> usize {
        self.children.len()
    }

    /// The `i`-th child handle.
    pub fn dep(&self, i: usize) -> Expr {
        self.children[i]
    }

    /// Sparsity of output `oind`.
    pub fn sparsity(&self, oind: usize) -> &Arc<Sparsity> {
        &self.sparsity[oind]
    }
}
