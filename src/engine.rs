//! Graph traversal: numeric evaluation, forward/reverse AD, and
//! forward/backward sparsity propagation.
//!
//! An [`Engine`] binds a finished graph to designated symbol inputs and
//! output expressions. Construction computes the topological visitation
//! order once (children before parents, one visit per shared node), sizes a
//! flat nonzero workspace covering every reachable node output, and
//! precomputes the nonzero index maps each structural node needs. The four
//! sweeps then share those maps:
//!
//! - [`eval`](Engine::eval) — numeric values
//! - [`eval_fwd`](Engine::eval_fwd) — batched forward directional derivatives
//! - [`eval_adj`](Engine::eval_adj) — batched reverse adjoints
//! - [`sp_fwd`](Engine::sp_fwd) / [`sp_adj`](Engine::sp_adj) — 64 dependency
//!   directions at a time as bits of a `u64` mask per nonzero
//!
//! Structural errors are impossible here: the graph was validated during
//! construction. The only runtime failure is a numeric one surfaced by an
//! external function call, which aborts the traversal before any dependent
//! node is visited.

use std::collections::HashMap;
use std::ops::Range;

use crate::error::{ConstructionError, EvalError};
use crate::float::Float;
use crate::graph::{Expr, Graph};
use crate::node::{BinOp, Op, UnOp};
use crate::split;

/// Per-node precomputed nonzero index maps.
enum NodeAux {
    /// Split: input nonzero -> (output index, nonzero within output), or
    /// `None` for dropped off-diagonal entries.
    Split(Vec<Option<(usize, usize)>>),
    /// Concat: workspace-relative prefix offset of each part's nonzeros.
    Concat(Vec<usize>),
    /// Add/Sub: operand nonzero -> result nonzero (scatter into the union).
    Union { map_a: Vec<usize>, map_b: Vec<usize> },
    /// Mul: result nonzero -> operand nonzero (gather from the intersection).
    Intersect { map_a: Vec<usize>, map_b: Vec<usize> },
}

/// Bound traversal context over one graph.
///
/// Scratch buffers are owned by the engine and reused across calls; one
/// engine serves one traversal at a time.
pub struct Engine<'g, F: Float> {
    graph: &'g Graph<F>,
    inputs: Vec<Expr>,
    outputs: Vec<Expr>,
    /// Reachable node ids in topological order. Children always carry
    /// smaller arena indices than their parents, so ascending id order is
    /// topological.
    order: Vec<usize>,
    /// Node id -> offset of its first output's nonzeros in the workspace.
    base: Vec<usize>,
    /// Total workspace length (nonzeros over all reachable node outputs).
    total: usize,
    /// Sym node id -> position in `inputs`.
    input_pos: HashMap<usize, usize>,
    aux: HashMap<usize, NodeAux>,
    values: Vec<F>,
}

impl<'g, F: Float> Engine<'g, F> {
    /// Bind `graph` to the given symbol inputs and output expressions.
    ///
    /// Every symbol reachable from `outputs` must appear in `inputs`.
    ///
    /// # Panics
    ///
    /// Panics if an entry of `inputs` is not a symbol node or appears twice.
    pub fn new(
        graph: &'g Graph<F>,
        inputs: &[Expr],
        outputs: &[Expr],
    ) -> Result<Self, ConstructionError> {
        for &e in inputs.iter().chain(outputs) {
            graph.check_child(e)?;
        }

        let mut input_pos = HashMap::with_capacity(inputs.len());
        for (pos, &e) in inputs.iter().enumerate() {
            assert!(
                matches!(graph.node(e.node).op(), Op::Sym(_)),
                "engine input {} is not a symbol",
                pos
            );
            let prev = input_pos.insert(e.node, pos);
            assert!(prev.is_none(), "engine input {} bound twice", pos);
        }

        // Reachable set from the outputs.
        let mut reachable = vec![false; graph.n_nodes()];
        let mut work: Vec<usize> = outputs.iter().map(|e| e.node).collect();
        while let Some(id) = work.pop() {
            if reachable[id] {
                continue;
            }
            reachable[id] = true;
            for i in 0..graph.node(id).n_deps() {
                work.push(graph.node(id).dep(i).node_id());
            }
        }

        let order: Vec<usize> = (0..graph.n_nodes()).filter(|&id| reachable[id]).collect();

        // Every reachable symbol must be bound.
        for &id in &order {
            if let Op::Sym(name) = graph.node(id).op() {
                if !input_pos.contains_key(&id) {
                    return Err(ConstructionError::UnboundSymbol { name: name.clone() });
                }
            }
        }

        // Workspace layout: one contiguous block per node, outputs in order.
        let mut base = vec![usize::MAX; graph.n_nodes()];
        let mut total = 0usize;
        for &id in &order {
            base[id] = total;
            let node = graph.node(id);
            for o in 0..node.n_outputs() {
                total += node.sparsity(o).nnz();
            }
        }

        // Precompute the index maps structural nodes share across sweeps.
        let mut aux = HashMap::new();
        for &id in &order {
            let node = graph.node(id);
            let entry = match node.op() {
                Op::HorzSplit { .. } | Op::VertSplit { .. } | Op::DiagSplit { .. } => {
                    let input_sp = graph.sparsity(node.dep(0));
                    Some(NodeAux::Split(split::nz_assignment(node.op(), input_sp)?))
                }
                Op::HorzCat | Op::VertCat | Op::DiagCat => {
                    let mut offsets = Vec::with_capacity(node.n_deps());
                    let mut off = 0;
                    for i in 0..node.n_deps() {
                        offsets.push(off);
                        off += graph.sparsity(node.dep(i)).nnz();
                    }
                    Some(NodeAux::Concat(offsets))
                }
                Op::Binary(BinOp::Add) | Op::Binary(BinOp::Sub) => {
                    let sp_a = graph.sparsity(node.dep(0));
                    let sp_b = graph.sparsity(node.dep(1));
                    let (_, map_a, map_b) = sp_a.union_with(sp_b)?;
                    Some(NodeAux::Union { map_a, map_b })
                }
                Op::Binary(BinOp::Mul) => {
                    let sp_a = graph.sparsity(node.dep(0));
                    let sp_b = graph.sparsity(node.dep(1));
                    let (_, map_a, map_b) = sp_a.intersect_with(sp_b)?;
                    Some(NodeAux::Intersect { map_a, map_b })
                }
                _ => None,
            };
            if let Some(a) = entry {
                aux.insert(id, a);
            }
        }

        Ok(Engine {
            graph,
            inputs: inputs.to_vec(),
            outputs: outputs.to_vec(),
            order,
            base,
            total,
            input_pos,
            aux,
            values: vec![F::zero(); total],
        })
    }

    /// The bound input expressions.
    pub fn inputs(&self) -> &[Expr] {
        &self.inputs
    }

    /// The bound output expressions.
    pub fn outputs(&self) -> &[Expr] {
        &self.outputs
    }

    /// Sparsity of bound input `i`.
    pub fn input_sparsity(&self, i: usize) -> &std::sync::Arc<crate::sparsity::Sparsity> {
        self.graph.sparsity(self.inputs[i])
    }

    /// Sparsity of bound output `o`.
    pub fn output_sparsity(&self, o: usize) -> &std::sync::Arc<crate::sparsity::Sparsity> {
        self.graph.sparsity(self.outputs[o])
    }

    /// Workspace range of one node output.
    fn range_of(&self, e: Expr) -> Range<usize> {
        let node = self.graph.node(e.node);
        let mut start = self.base[e.node];
        for o in 0..e.output {
            start += node.sparsity(o).nnz();
        }
        start..start + node.sparsity(e.output).nnz()
    }

    /// Prefix offsets of each output within the node's workspace block.
    fn out_offsets(&self, id: usize) -> Vec<usize> {
        let node = self.graph.node(id);
        let mut offs = Vec::with_capacity(node.n_outputs());
        let mut off = 0;
        for o in 0..node.n_outputs() {
            offs.push(off);
            off += node.sparsity(o).nnz();
        }
        offs
    }

    /// Nonzero count of all outputs of a node combined.
    fn node_nnz(&self, id: usize) -> usize {
        let node = self.graph.node(id);
        (0..node.n_outputs()).map(|o| node.sparsity(o).nnz()).sum()
    }

    fn check_input_values(&self, inputs: &[&[F]]) {
        assert_eq!(
            inputs.len(),
            self.inputs.len(),
            "wrong number of inputs"
        );
        for (i, (&e, nz)) in self.inputs.iter().zip(inputs).enumerate() {
            assert_eq!(
                nz.len(),
                self.graph.sparsity(e).nnz(),
                "input {} has wrong nonzero count",
                i
            );
        }
    }

    // ── Numeric evaluation ──

    /// Evaluate the outputs at the given input nonzeros.
    ///
    /// # Panics
    ///
    /// Panics if the input count or a nonzero length does not match the
    /// bound inputs.
    pub fn eval(&mut self, inputs: &[&[F]]) -> Result<Vec<Vec<F>>, EvalError> {
        self.check_input_values(inputs);
        self.primal_sweep(inputs)?;
        Ok(self
            .outputs
            .iter()
            .map(|&e| self.values[self.range_of(e)].to_vec())
            .collect())
    }

    fn primal_sweep(&mut self, inputs: &[&[F]]) -> Result<(), EvalError> {
        for idx in 0..self.order.len() {
            let id = self.order[idx];
            let node = self.graph.node(id);
            let start = self.base[id];
            let nnz = self.node_nnz(id);
            let offs = self.out_offsets(id);
            let deps: Vec<Range<usize>> = (0..node.n_deps())
                .map(|i| self.range_of(node.dep(i)))
                .collect();
            let (lo, hi) = self.values.split_at_mut(start);
            let dst = &mut hi[..nnz];

            match node.op() {
                Op::Sym(_) => {
                    dst.copy_from_slice(inputs[self.input_pos[&id]]);
                }
                Op::Const(nz) => {
                    dst.copy_from_slice(nz);
                }
                Op::Unary(UnOp::Neg) => {
                    let src = &lo[deps[0].clone()];
                    for (d, &s) in dst.iter_mut().zip(src) {
                        *d = -s;
                    }
                }
                Op::Binary(op) => {
                    let a = &lo[deps[0].clone()];
                    let b = &lo[deps[1].clone()];
                    match (&self.aux[&id], op) {
                        (NodeAux::Union { map_a, map_b }, BinOp::Add | BinOp::Sub) => {
                            dst.fill(F::zero());
                            for (i, &k) in map_a.iter().enumerate() {
                                dst[k] = dst[k] + a[i];
                            }
                            let negate = matches!(op, BinOp::Sub);
                            for (i, &k) in map_b.iter().enumerate() {
                                dst[k] = if negate { dst[k] - b[i] } else { dst[k] + b[i] };
                            }
                        }
                        (NodeAux::Intersect { map_a, map_b }, BinOp::Mul) => {
                            for (k, d) in dst.iter_mut().enumerate() {
                                *d = a[map_a[k]] * b[map_b[k]];
                            }
                        }
                        _ => unreachable!("binary aux mismatch"),
                    }
                }
                Op::HorzSplit { .. } | Op::VertSplit { .. } | Op::DiagSplit { .. } => {
                    let src = &lo[deps[0].clone()];
                    let NodeAux::Split(assign) = &self.aux[&id] else {
                        unreachable!()
                    };
                    // Pure gather: each output nonzero receives exactly one
                    // input nonzero; dropped entries never reach any output.
                    for (i, slot) in assign.iter().enumerate() {
                        if let Some((oind, j)) = *slot {
                            dst[offs[oind] + j] = src[i];
                        }
                    }
                }
                Op::HorzCat | Op::VertCat | Op::DiagCat => {
                    let NodeAux::Concat(part_offs) = &self.aux[&id] else {
                        unreachable!()
                    };
                    for (p, &off) in part_offs.iter().enumerate() {
                        let src = &lo[deps[p].clone()];
                        dst[off..off + src.len()].copy_from_slice(src);
                    }
                }
                Op::Call(f) => {
                    let args: Vec<&[F]> = deps.iter().map(|r| &lo[r.clone()]).collect();
                    let mut outs: Vec<Vec<F>> = (0..node.n_outputs())
                        .map(|o| vec![F::zero(); node.sparsity(o).nnz()])
                        .collect();
                    f.eval(&args, &mut outs)?;
                    for (o, out) in outs.iter().enumerate() {
                        dst[offs[o]..offs[o] + out.len()].copy_from_slice(out);
                    }
                }
            }
        }
        Ok(())
    }

    // ── Forward-mode AD ──

    /// Evaluate and propagate forward seed directions in one batched pass.
    ///
    /// `seeds[d][i]` holds direction `d`'s seed on input `i`; the result is
    /// `(output values, sens)` with `sens[d][o]` the directional derivative
    /// of output `o`.
    pub fn eval_fwd(
        &mut self,
        inputs: &[&[F]],
        seeds: &[Vec<Vec<F>>],
    ) -> Result<(Vec<Vec<F>>, Vec<Vec<Vec<F>>>), EvalError> {
        self.check_input_values(inputs);
        for (d, dir) in seeds.iter().enumerate() {
            assert_eq!(dir.len(), self.inputs.len(), "seed direction {} has wrong arity", d);
            for (i, (&e, s)) in self.inputs.iter().zip(dir).enumerate() {
                assert_eq!(
                    s.len(),
                    self.graph.sparsity(e).nnz(),
                    "seed direction {} input {} has wrong nonzero count",
                    d,
                    i
                );
            }
        }
        self.primal_sweep(inputs)?;

        let mut tangents: Vec<Vec<F>> = vec![vec![F::zero(); self.total]; seeds.len()];
        for idx in 0..self.order.len() {
            let id = self.order[idx];
            let node = self.graph.node(id);
            let start = self.base[id];
            let nnz = self.node_nnz(id);

            for (d, tan) in tangents.iter_mut().enumerate() {
                let (lo, hi) = tan.split_at_mut(start);
                let dst = &mut hi[..nnz];

                match node.op() {
                    Op::Sym(_) => {
                        dst.copy_from_slice(&seeds[d][self.input_pos[&id]]);
                    }
                    Op::Const(_) => {
                        for t in dst.iter_mut() {
                            *t = F::zero();
                        }
                    }
                    Op::Unary(UnOp::Neg) => {
                        let src = &lo[self.range_of(node.dep(0))];
                        for (t, &s) in dst.iter_mut().zip(src) {
                            *t = -s;
                        }
                    }
                    Op::Binary(op) => {
                        let ra = self.range_of(node.dep(0));
                        let rb = self.range_of(node.dep(1));
                        match (&self.aux[&id], op) {
                            (NodeAux::Union { map_a, map_b }, BinOp::Add | BinOp::Sub) => {
                                for t in dst.iter_mut() {
                                    *t = F::zero();
                                }
                                for (i, &k) in map_a.iter().enumerate() {
                                    dst[k] = dst[k] + lo[ra.start + i];
                                }
                                let negate = matches!(op, BinOp::Sub);
                                for (i, &k) in map_b.iter().enumerate() {
                                    let tb = lo[rb.start + i];
                                    dst[k] = if negate { dst[k] - tb } else { dst[k] + tb };
                                }
                            }
                            (NodeAux::Intersect { map_a, map_b }, BinOp::Mul) => {
                                // Product rule against the primal values.
                                for (k, t) in dst.iter_mut().enumerate() {
                                    let av = self.values[ra.start + map_a[k]];
                                    let bv = self.values[rb.start + map_b[k]];
                                    let ta = lo[ra.start + map_a[k]];
                                    let tb = lo[rb.start + map_b[k]];
                                    *t = av * tb + bv * ta;
                                }
                            }
                            _ => unreachable!("binary aux mismatch"),
                        }
                    }
                    Op::HorzSplit { .. } | Op::VertSplit { .. } | Op::DiagSplit { .. } => {
                        // Linear index selection: derivative propagation
                        // mirrors value propagation exactly.
                        let src = &lo[self.range_of(node.dep(0))];
                        let offs = self.out_offsets(id);
                        let NodeAux::Split(assign) = &self.aux[&id] else {
                            unreachable!()
                        };
                        for (i, slot) in assign.iter().enumerate() {
                            if let Some((oind, j)) = *slot {
                                dst[offs[oind] + j] = src[i];
                            }
                        }
                    }
                    Op::HorzCat | Op::VertCat | Op::DiagCat => {
                        let NodeAux::Concat(offs) = &self.aux[&id] else {
                            unreachable!()
                        };
                        for (p, &off) in offs.iter().enumerate() {
                            let src = &lo[self.range_of(node.dep(p))];
                            dst[off..off + src.len()].copy_from_slice(src);
                        }
                    }
                    Op::Call(f) => {
                        return Err(EvalError::NotDifferentiable {
                            what: f.name().to_string(),
                        });
                    }
                }
            }
        }

        let values = self
            .outputs
            .iter()
            .map(|&e| self.values[self.range_of(e)].to_vec())
            .collect();
        let sens = tangents
            .iter()
            .map(|tan| {
                self.outputs
                    .iter()
                    .map(|&e| tan[self.range_of(e)].to_vec())
                    .collect()
            })
            .collect();
        Ok((values, sens))
    }

    // ── Reverse-mode AD ──

    /// Evaluate and propagate reverse adjoint seeds in one batched pass.
    ///
    /// `seeds[d][o]` holds direction `d`'s adjoint seed on output `o`; the
    /// result is `(output values, sens)` with `sens[d][i]` the accumulated
    /// adjoint of input `i`. Contributions from all edges into a node are
    /// accumulated before the node is visited (each node is visited exactly
    /// once, in reverse topological order); a node's seed slots are zeroed
    /// once consumed.
    pub fn eval_adj(
        &mut self,
        inputs: &[&[F]],
        seeds: &[Vec<Vec<F>>],
    ) -> Result<(Vec<Vec<F>>, Vec<Vec<Vec<F>>>), EvalError> {
        self.check_input_values(inputs);
        for (d, dir) in seeds.iter().enumerate() {
            assert_eq!(dir.len(), self.outputs.len(), "seed direction {} has wrong arity", d);
            for (o, (&e, s)) in self.outputs.iter().zip(dir).enumerate() {
                assert_eq!(
                    s.len(),
                    self.graph.sparsity(e).nnz(),
                    "seed direction {} output {} has wrong nonzero count",
                    d,
                    o
                );
            }
        }
        self.primal_sweep(inputs)?;

        let mut adjoints: Vec<Vec<F>> = vec![vec![F::zero(); self.total]; seeds.len()];
        for (dir, adj) in adjoints.iter_mut().enumerate() {
            for (o, &e) in self.outputs.iter().enumerate() {
                let range = self.range_of(e);
                for (slot, &s) in adj[range].iter_mut().zip(&seeds[dir][o]) {
                    *slot = *slot + s;
                }
            }
        }

        for idx in (0..self.order.len()).rev() {
            let id = self.order[idx];
            let node = self.graph.node(id);
            if matches!(node.op(), Op::Sym(_) | Op::Const(_)) {
                continue;
            }
            let start = self.base[id];
            let nnz = self.node_nnz(id);

            for adj in adjoints.iter_mut() {
                let (lo, hi) = adj.split_at_mut(start);
                let own = &mut hi[..nnz];
                if own.iter().all(|&a| a == F::zero()) {
                    continue;
                }

                match node.op() {
                    Op::Sym(_) | Op::Const(_) => unreachable!(),
                    Op::Unary(UnOp::Neg) => {
                        let child = self.range_of(node.dep(0));
                        for (i, a) in own.iter().enumerate() {
                            lo[child.start + i] = lo[child.start + i] - *a;
                        }
                    }
                    Op::Binary(op) => {
                        let ra = self.range_of(node.dep(0));
                        let rb = self.range_of(node.dep(1));
                        match (&self.aux[&id], op) {
                            (NodeAux::Union { map_a, map_b }, BinOp::Add | BinOp::Sub) => {
                                for (i, &k) in map_a.iter().enumerate() {
                                    lo[ra.start + i] = lo[ra.start + i] + own[k];
                                }
                                let negate = matches!(op, BinOp::Sub);
                                for (i, &k) in map_b.iter().enumerate() {
                                    let contrib = if negate { -own[k] } else { own[k] };
                                    lo[rb.start + i] = lo[rb.start + i] + contrib;
                                }
                            }
                            (NodeAux::Intersect { map_a, map_b }, BinOp::Mul) => {
                                for (k, &a) in own.iter().enumerate() {
                                    let av = self.values[ra.start + map_a[k]];
                                    let bv = self.values[rb.start + map_b[k]];
                                    lo[ra.start + map_a[k]] = lo[ra.start + map_a[k]] + bv * a;
                                    lo[rb.start + map_b[k]] = lo[rb.start + map_b[k]] + av * a;
                                }
                            }
                            _ => unreachable!("binary aux mismatch"),
                        }
                    }
                    Op::HorzSplit { .. } | Op::VertSplit { .. } | Op::DiagSplit { .. } => {
                        // Reverse of the forward scatter: gather each output
                        // adjoint back onto the input nonzero it came from.
                        let child = self.range_of(node.dep(0));
                        let offs = self.out_offsets(id);
                        let NodeAux::Split(assign) = &self.aux[&id] else {
                            unreachable!()
                        };
                        for (i, slot) in assign.iter().enumerate() {
                            if let Some((oind, j)) = *slot {
                                lo[child.start + i] =
                                    lo[child.start + i] + own[offs[oind] + j];
                            }
                        }
                    }
                    Op::HorzCat | Op::VertCat | Op::DiagCat => {
                        // Concatenation fans shared inputs into one output;
                        // the adjoint accumulates by addition so a part used
                        // twice receives both contributions.
                        let NodeAux::Concat(offs) = &self.aux[&id] else {
                            unreachable!()
                        };
                        for (p, &off) in offs.iter().enumerate() {
                            let child = self.range_of(node.dep(p));
                            for i in 0..child.len() {
                                lo[child.start + i] = lo[child.start + i] + own[off + i];
                            }
                        }
                    }
                    Op::Call(f) => {
                        return Err(EvalError::NotDifferentiable {
                            what: f.name().to_string(),
                        });
                    }
                }

                // Consumed: prevent double counting on any repeated use.
                for a in own.iter_mut() {
                    *a = F::zero();
                }
            }
        }

        let values = self
            .outputs
            .iter()
            .map(|&e| self.values[self.range_of(e)].to_vec())
            .collect();
        let sens = adjoints
            .iter()
            .map(|adj| {
                self.inputs
                    .iter()
                    .map(|&e| adj[self.range_of(e)].to_vec())
                    .collect()
            })
            .collect();
        Ok((values, sens))
    }

    // ── Sparsity propagation ──

    /// Propagate "possibly nonzero" dependency masks forward.
    ///
    /// Each bit of a `u64` is one independent perturbation direction, so up
    /// to 64 directions propagate in one pass. The result is a sound
    /// superset: a set output bit means the output nonzero may depend on a
    /// perturbed input, never the reverse.
    pub fn sp_fwd(&mut self, masks: &[&[u64]]) -> Vec<Vec<u64>> {
        assert_eq!(masks.len(), self.inputs.len(), "wrong number of input masks");
        for (i, (&e, m)) in self.inputs.iter().zip(masks).enumerate() {
            assert_eq!(
                m.len(),
                self.graph.sparsity(e).nnz(),
                "input mask {} has wrong nonzero count",
                i
            );
        }
        let mut ws = vec![0u64; self.total];

        for idx in 0..self.order.len() {
            let id = self.order[idx];
            let node = self.graph.node(id);
            let start = self.base[id];
            let nnz = self.node_nnz(id);
            let (lo, hi) = ws.split_at_mut(start);
            let dst = &mut hi[..nnz];

            match node.op() {
                Op::Sym(_) => dst.copy_from_slice(masks[self.input_pos[&id]]),
                Op::Const(_) => dst.fill(0),
                Op::Unary(UnOp::Neg) => {
                    dst.copy_from_slice(&lo[self.range_of(node.dep(0))]);
                }
                Op::Binary(_) => {
                    let ra = self.range_of(node.dep(0));
                    let rb = self.range_of(node.dep(1));
                    match &self.aux[&id] {
                        NodeAux::Union { map_a, map_b } => {
                            dst.fill(0);
                            for (i, &k) in map_a.iter().enumerate() {
                                dst[k] |= lo[ra.start + i];
                            }
                            for (i, &k) in map_b.iter().enumerate() {
                                dst[k] |= lo[rb.start + i];
                            }
                        }
                        NodeAux::Intersect { map_a, map_b } => {
                            for (k, d) in dst.iter_mut().enumerate() {
                                *d = lo[ra.start + map_a[k]] | lo[rb.start + map_b[k]];
                            }
                        }
                        _ => unreachable!(),
                    }
                }
                Op::HorzSplit { .. } | Op::VertSplit { .. } | Op::DiagSplit { .. } => {
                    let src_range = self.range_of(node.dep(0));
                    let offs = self.out_offsets(id);
                    let NodeAux::Split(assign) = &self.aux[&id] else {
                        unreachable!()
                    };
                    dst.fill(0);
                    for (i, slot) in assign.iter().enumerate() {
                        if let Some((oind, j)) = *slot {
                            dst[offs[oind] + j] |= lo[src_range.start + i];
                        }
                    }
                }
                Op::HorzCat | Op::VertCat | Op::DiagCat => {
                    let NodeAux::Concat(offs) = &self.aux[&id] else {
                        unreachable!()
                    };
                    for (p, &off) in offs.iter().enumerate() {
                        let src = &lo[self.range_of(node.dep(p))];
                        dst[off..off + src.len()].copy_from_slice(src);
                    }
                }
                Op::Call(_) => {
                    // Opaque: conservatively, every output depends on every
                    // input direction.
                    let mut all = 0u64;
                    for i in 0..node.n_deps() {
                        for &m in &lo[self.range_of(node.dep(i))] {
                            all |= m;
                        }
                    }
                    dst.fill(all);
                }
            }
        }

        self.outputs
            .iter()
            .map(|&e| ws[self.range_of(e)].to_vec())
            .collect()
    }

    /// Propagate output dependency masks backward onto the inputs.
    ///
    /// The reverse of [`sp_fwd`](Engine::sp_fwd): output masks are gathered
    /// by bitwise OR back into the masks of the inputs that could have
    /// contributed to them. Consumed node masks are cleared.
    pub fn sp_adj(&mut self, masks: &[&[u64]]) -> Vec<Vec<u64>> {
        assert_eq!(masks.len(), self.outputs.len(), "wrong number of output masks");
        for (o, (&e, m)) in self.outputs.iter().zip(masks).enumerate() {
            assert_eq!(
                m.len(),
                self.graph.sparsity(e).nnz(),
                "output mask {} has wrong nonzero count",
                o
            );
        }
        let mut ws = vec![0u64; self.total];
        for (o, &e) in self.outputs.iter().enumerate() {
            let range = self.range_of(e);
            for (slot, &m) in ws[range].iter_mut().zip(masks[o]) {
                *slot |= m;
            }
        }

        for idx in (0..self.order.len()).rev() {
            let id = self.order[idx];
            let node = self.graph.node(id);
            if matches!(node.op(), Op::Sym(_) | Op::Const(_)) {
                continue;
            }
            let start = self.base[id];
            let nnz = self.node_nnz(id);
            let (lo, hi) = ws.split_at_mut(start);
            let own = &mut hi[..nnz];

            match node.op() {
                Op::Sym(_) | Op::Const(_) => unreachable!(),
                Op::Unary(UnOp::Neg) => {
                    let child = self.range_of(node.dep(0));
                    for (i, &m) in own.iter().enumerate() {
                        lo[child.start + i] |= m;
                    }
                }
                Op::Binary(_) => {
                    let ra = self.range_of(node.dep(0));
                    let rb = self.range_of(node.dep(1));
                    match &self.aux[&id] {
                        NodeAux::Union { map_a, map_b } => {
                            for (i, &k) in map_a.iter().enumerate() {
                                lo[ra.start + i] |= own[k];
                            }
                            for (i, &k) in map_b.iter().enumerate() {
                                lo[rb.start + i] |= own[k];
                            }
                        }
                        NodeAux::Intersect { map_a, map_b } => {
                            for (k, &m) in own.iter().enumerate() {
                                lo[ra.start + map_a[k]] |= m;
                                lo[rb.start + map_b[k]] |= m;
                            }
                        }
                        _ => unreachable!(),
                    }
                }
                Op::HorzSplit { .. } | Op::VertSplit { .. } | Op::DiagSplit { .. } => {
                    let child = self.range_of(node.dep(0));
                    let offs = self.out_offsets(id);
                    let NodeAux::Split(assign) = &self.aux[&id] else {
                        unreachable!()
                    };
                    for (i, slot) in assign.iter().enumerate() {
                        if let Some((oind, j)) = *slot {
                            lo[child.start + i] |= own[offs[oind] + j];
                        }
                    }
                }
                Op::HorzCat | Op::VertCat | Op::DiagCat => {
                    let NodeAux::Concat(offs) = &self.aux[&id] else {
                        unreachable!()
                    };
                    for (p, &off) in offs.iter().enumerate() {
                        let child = self.range_of(node.dep(p));
                        for i in 0..child.len() {
                            lo[child.start + i] |= own[off + i];
                        }
                    }
                }
                Op::Call(_) => {
                    let mut all = 0u64;
                    for &m in own.iter() {
                        all |= m;
                    }
                    for i in 0..node.n_deps() {
                        let child = self.range_of(node.dep(i));
                        for slot in lo[child].iter_mut() {
                            *slot |= all;
                        }
                    }
                }
            }

            own.fill(0);
        }

        self.inputs
            .iter()
            .map(|&e| ws[self.range_of(e)].to_vec())
            .collect()
    }
}
