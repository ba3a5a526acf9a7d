//! The expression arena and its construction interface.
//!
//! A [`Graph`] owns every node; an [`Expr`] is a `Copy` handle naming one
//! output of one node. Nodes can only reference nodes already in the arena,
//! so edges always point backwards and the graph is acyclic by construction.
//! All constructors validate shapes and child handles synchronously and
//! leave the arena untouched on failure.

use std::sync::Arc;

use crate::error::{ConstructionError, CycleError};
use crate::float::Float;
use crate::node::{BinOp, ExternalFunction, Node, Op, UnOp};
use crate::split;
use crate::sparsity::Sparsity;

/// Handle to one output of one node.
///
/// Equality is identity: two handles are equal iff they name the same
/// output of the same arena slot. For equality by structure, see
/// [`Graph::structurally_equal`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Expr {
    pub(crate) node: usize,
    pub(crate) output: usize,
}

impl Expr {
    /// Arena index of the referenced node.
    pub fn node_id(&self) -> usize {
        self.node
    }

    /// Which output of the node this handle names.
    pub fn output(&self) -> usize {
        self.output
    }
}

/// Arena of expression nodes.
pub struct Graph<F: Float> {
    nodes: Vec<Node<F>>,
}

impl<F: Float> Default for Graph<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Float> Graph<F> {
    /// Empty graph.
    pub fn new() -> Self {
        Graph { nodes: Vec::new() }
    }

    /// Number of nodes in the arena.
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// The node at arena index `id`.
    pub fn node(&self, id: usize) -> &Node<F> {
        &self.nodes[id]
    }

    /// Sparsity of the value `e` refers to.
    pub fn sparsity(&self, e: Expr) -> &Arc<Sparsity> {
        self.nodes[e.node].sparsity(e.output)
    }

    // ── Leaf constructors ──

    /// New symbolic input with the given sparsity.
    pub fn sym(&mut self, name: &str, sp: Arc<Sparsity>) -> Expr {
        self.push(Node {
            op: Op::Sym(name.to_string()),
            children: Vec::new(),
            sparsity: vec![sp],
        })
    }

    /// New dense symbolic input.
    pub fn sym_dense(&mut self, name: &str, nrow: usize, ncol: usize) -> Expr {
        self.sym(name, Arc::new(Sparsity::dense(nrow, ncol)))
    }

    /// New constant with the given sparsity and nonzero values.
    pub fn constant(&mut self, sp: Arc<Sparsity>, nz: Vec<F>) -> Result<Expr, ConstructionError> {
        if nz.len() != sp.nnz() {
            return Err(ConstructionError::ValueCount {
                expected: sp.nnz(),
                got: nz.len(),
            });
        }
        Ok(self.push(Node {
            op: Op::Const(nz),
            children: Vec::new(),
            sparsity: vec![sp],
        }))
    }

    // ── Elementwise operations ──

    /// Elementwise negation.
    pub fn neg(&mut self, x: Expr) -> Result<Expr, ConstructionError> {
        self.check_child(x)?;
        let sp = self.sparsity(x).clone();
        Ok(self.push(Node {
            op: Op::Unary(UnOp::Neg),
            children: vec![x],
            sparsity: vec![sp],
        }))
    }

    /// Elementwise sum; result sparsity is the union of the operands'.
    pub fn add(&mut self, a: Expr, b: Expr) -> Result<Expr, ConstructionError> {
        self.binary(BinOp::Add, a, b)
    }

    /// Elementwise difference; result sparsity is the union of the operands'.
    pub fn sub(&mut self, a: Expr, b: Expr) -> Result<Expr, ConstructionError> {
        self.binary(BinOp::Sub, a, b)
    }

    /// Elementwise product; result sparsity is the intersection of the
    /// operands' (a structural zero annihilates the product).
    pub fn mul(&mut self, a: Expr, b: Expr) -> Result<Expr, ConstructionError> {
        self.binary(BinOp::Mul, a, b)
    }

    fn binary(&mut self, op: BinOp, a: Expr, b: Expr) -> Result<Expr, ConstructionError> {
        self.check_child(a)?;
        self.check_child(b)?;
        let sp_a = self.sparsity(a);
        let sp_b = self.sparsity(b);
        let sp = match op {
            BinOp::Add | BinOp::Sub => sp_a.union_with(sp_b)?.0,
            BinOp::Mul => sp_a.intersect_with(sp_b)?.0,
        };
        Ok(self.push(Node {
            op: Op::Binary(op),
            children: vec![a, b],
            sparsity: vec![Arc::new(sp)],
        }))
    }

    // ── Split family ──

    /// Partition the columns of `x` at boundary `offsets`.
    ///
    /// Output `k` holds columns `[offsets[k], offsets[k+1])`; there are
    /// `offsets.len() - 1` outputs.
    pub fn horzsplit(&mut self, x: Expr, offsets: &[usize]) -> Result<Vec<Expr>, ConstructionError> {
        self.check_child(x)?;
        split::check_offsets("horzsplit", offsets, self.sparsity(x).ncol())?;
        self.push_split(
            x,
            Op::HorzSplit {
                offsets: offsets.to_vec(),
            },
        )
    }

    /// Partition the rows of a column vector `x` at boundary `offsets`.
    pub fn vertsplit(&mut self, x: Expr, offsets: &[usize]) -> Result<Vec<Expr>, ConstructionError> {
        self.check_child(x)?;
        let sp = self.sparsity(x);
        if sp.ncol() != 1 {
            return Err(ConstructionError::NotAVector {
                nrow: sp.nrow(),
                ncol: sp.ncol(),
            });
        }
        split::check_offsets("vertsplit", offsets, sp.nrow())?;
        self.push_split(
            x,
            Op::VertSplit {
                offsets: offsets.to_vec(),
            },
        )
    }

    /// Carve `x` into successive diagonal blocks.
    ///
    /// Block `k` covers rows `[row_offsets[k], row_offsets[k+1])` and columns
    /// `[col_offsets[k], col_offsets[k+1])`. Nonzeros outside every block are
    /// dropped: they appear in no output.
    pub fn diagsplit(
        &mut self,
        x: Expr,
        row_offsets: &[usize],
        col_offsets: &[usize],
    ) -> Result<Vec<Expr>, ConstructionError> {
        self.check_child(x)?;
        let sp = self.sparsity(x);
        split::check_offsets("diagsplit rows", row_offsets, sp.nrow())?;
        split::check_offsets("diagsplit columns", col_offsets, sp.ncol())?;
        if row_offsets.len() != col_offsets.len() {
            return Err(ConstructionError::InvalidOffsets {
                what: "diagsplit",
                offsets: col_offsets.to_vec(),
                dim: row_offsets.len() - 1,
            });
        }
        self.push_split(
            x,
            Op::DiagSplit {
                row_offsets: row_offsets.to_vec(),
                col_offsets: col_offsets.to_vec(),
            },
        )
    }

    fn push_split(&mut self, x: Expr, op: Op<F>) -> Result<Vec<Expr>, ConstructionError> {
        let patterns = split::output_patterns(&op, self.sparsity(x))?;
        let n_out = patterns.len();
        let id = self.nodes.len();
        self.nodes.push(Node {
            op,
            children: vec![x],
            sparsity: patterns.into_iter().map(Arc::new).collect(),
        });
        Ok((0..n_out).map(|output| Expr { node: id, output }).collect())
    }

    // ── Concatenation family ──

    /// Concatenate values horizontally; all parts must share a row count.
    pub fn horzcat(&mut self, parts: &[Expr]) -> Result<Expr, ConstructionError> {
        self.concat(Op::HorzCat, parts)
    }

    /// Stack column vectors vertically.
    pub fn vertcat(&mut self, parts: &[Expr]) -> Result<Expr, ConstructionError> {
        self.concat(Op::VertCat, parts)
    }

    /// Assemble values as successive diagonal blocks.
    pub fn diagcat(&mut self, parts: &[Expr]) -> Result<Expr, ConstructionError> {
        self.concat(Op::DiagCat, parts)
    }

    fn concat(&mut self, op: Op<F>, parts: &[Expr]) -> Result<Expr, ConstructionError> {
        for &p in parts {
            self.check_child(p)?;
        }
        let patterns: Vec<&Sparsity> = parts.iter().map(|&p| self.sparsity(p).as_ref()).collect();
        let sp = match op {
            Op::HorzCat => Sparsity::horzcat(&patterns)?,
            Op::VertCat => Sparsity::vertcat(&patterns)?,
            Op::DiagCat => Sparsity::diagcat(&patterns),
            _ => unreachable!(),
        };
        Ok(self.push(Node {
            op,
            children: parts.to_vec(),
            sparsity: vec![Arc::new(sp)],
        }))
    }

    /// Build the concatenation that inverts the split `outputs` came from.
    ///
    /// `outputs` must be all outputs of one split node, in order. The index
    /// arithmetic is not re-derived: the matching concat variant is chosen
    /// from the split's own operation kind.
    pub fn split_inverse(&mut self, outputs: &[Expr]) -> Result<Expr, ConstructionError> {
        let first = outputs.first().copied().ok_or(ConstructionError::ValueCount {
            expected: 1,
            got: 0,
        })?;
        self.check_child(first)?;
        let id = first.node;
        let n_out = self.nodes[id].n_outputs();
        let in_order = outputs.len() == n_out
            && outputs
                .iter()
                .enumerate()
                .all(|(i, e)| e.node == id && e.output == i);
        if !in_order {
            return Err(ConstructionError::ValueCount {
                expected: n_out,
                got: outputs.len(),
            });
        }
        if matches!(self.nodes[id].op, Op::HorzSplit { .. }) {
            self.horzcat(outputs)
        } else if matches!(self.nodes[id].op, Op::VertSplit { .. }) {
            self.vertcat(outputs)
        } else if matches!(self.nodes[id].op, Op::DiagSplit { .. }) {
            self.diagcat(outputs)
        } else {
            Err(ConstructionError::OutOfBounds {
                what: "split_inverse: not a split node",
                index: id,
                bound: self.nodes.len(),
            })
        }
    }

    // ── External functions ──

    /// Embed a call to an opaque external function.
    ///
    /// Argument sparsities must structurally equal the function's declared
    /// input sparsities; the call's outputs carry the declared output
    /// sparsities.
    pub fn call(
        &mut self,
        f: Arc<dyn ExternalFunction<F>>,
        args: &[Expr],
    ) -> Result<Vec<Expr>, ConstructionError> {
        if args.len() != f.n_in() {
            return Err(ConstructionError::ValueCount {
                expected: f.n_in(),
                got: args.len(),
            });
        }
        for (i, &a) in args.iter().enumerate() {
            self.check_child(a)?;
            let expected = f.sparsity_in(i);
            let got = self.sparsity(a);
            if expected.as_ref() != got.as_ref() {
                return Err(ConstructionError::ShapeMismatch {
                    what: "external function argument",
                    left: (expected.nrow(), expected.ncol()),
                    right: (got.nrow(), got.ncol()),
                });
            }
        }
        let sparsity: Vec<Arc<Sparsity>> = (0..f.n_out()).map(|i| f.sparsity_out(i)).collect();
        let n_out = sparsity.len();
        let id = self.nodes.len();
        self.nodes.push(Node {
            op: Op::Call(f),
            children: args.to_vec(),
            sparsity,
        });
        Ok((0..n_out).map(|output| Expr { node: id, output }).collect())
    }

    // ── Structure queries ──

    /// Equality by structural value: same operation, parameters, sparsity,
    /// and recursively equal children.
    pub fn structurally_equal(&self, a: Expr, b: Expr) -> bool {
        if a == b {
            return true;
        }
        if a.output != b.output {
            return false;
        }
        let (na, nb) = (&self.nodes[a.node], &self.nodes[b.node]);
        na.op.same_op(&nb.op)
            && na.sparsity == nb.sparsity
            && na.children.len() == nb.children.len()
            && na
                .children
                .iter()
                .zip(&nb.children)
                .all(|(&ca, &cb)| ca.output == cb.output && self.structurally_equal(ca, cb))
    }

    pub(crate) fn check_child(&self, e: Expr) -> Result<(), ConstructionError> {
        if e.node >= self.nodes.len() {
            return Err(CycleError {
                node: e.node,
                arena_len: self.nodes.len(),
            }
            .into());
        }
        let n_out = self.nodes[e.node].n_outputs();
        if e.output >= n_out {
            return Err(ConstructionError::OutOfBounds {
                what: "output index",
                index: e.output,
                bound: n_out,
            });
        }
        Ok(())
    }

    fn push(&mut self, node: Node<F>) -> Expr {
        let id = self.nodes.len();
        self.nodes.push(node);
        Expr { node: id, output: 0 }
    }
}
