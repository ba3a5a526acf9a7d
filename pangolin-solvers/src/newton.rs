//! Newton root-finding adapter over a graph-defined residual.
//!
//! The residual is an [`Engine`] whose first input is the state being
//! solved for and whose first output is the residual `F(x, p)`, with any
//! further inputs treated as fixed parameters. Each iteration evaluates the
//! residual, assembles the dense Jacobian from batched forward directions,
//! and takes a step through a pluggable [`LinearSolver`].
//!
//! [`ImplicitFunction`] re-exposes the solve as a
//! [`pangolin::ExternalFunction`], so the solution `x*(p)` can re-enter an
//! outer expression graph as a call node.

use std::sync::Arc;

use pangolin::{Engine, EvalError, Expr, ExternalFunction, Graph, Sparsity};

use crate::adapter::{require, LinearSolver, Phase, SolverError};
use crate::convergence::{norm, ConvergenceParams};
use crate::dense_lu::DenseLu;

/// Diagnostics of a converged Newton solve.
#[derive(Debug, Clone)]
pub struct NewtonResult {
    /// Iterations taken until convergence.
    pub iterations: usize,
    /// Residual norm at the solution.
    pub residual_norm: f64,
}

fn numeric(e: EvalError) -> SolverError {
    SolverError::Numeric {
        reason: e.to_string(),
    }
}

/// Core Newton iteration shared by the adapter and [`ImplicitFunction`].
///
/// `linear` must already be initialized for a dense `n x n` system.
fn newton_iterate(
    engine: &mut Engine<'_, f64>,
    linear: &mut dyn LinearSolver,
    x: &mut [f64],
    params: &[&[f64]],
    conv: &ConvergenceParams<f64>,
) -> Result<NewtonResult, SolverError> {
    let n = x.len();
    let mut taken = conv.max_iter;

    for iter in 0..conv.max_iter {
        let mut inputs: Vec<&[f64]> = Vec::with_capacity(1 + params.len());
        inputs.push(&*x);
        inputs.extend_from_slice(params);

        let residual = engine.eval(&inputs).map_err(numeric)?;
        let r = &residual[0];
        let rn = norm(r);
        if rn < conv.residual_tol {
            return Ok(NewtonResult {
                iterations: iter,
                residual_norm: rn,
            });
        }

        // Jacobian wrt the state, one forward direction per column.
        let seeds: Vec<Vec<Vec<f64>>> = (0..n)
            .map(|d| {
                let mut dir: Vec<Vec<f64>> = Vec::with_capacity(inputs.len());
                let mut e_d = vec![0.0; n];
                e_d[d] = 1.0;
                dir.push(e_d);
                for p in params {
                    dir.push(vec![0.0; p.len()]);
                }
                dir
            })
            .collect();
        let (_, sens) = engine.eval_fwd(&inputs, &seeds).map_err(numeric)?;

        // Column-major dense Jacobian nonzeros.
        let mut jac = vec![0.0; n * n];
        for (d, dir_sens) in sens.iter().enumerate() {
            jac[d * n..(d + 1) * n].copy_from_slice(&dir_sens[0]);
        }

        linear.prepare(&jac)?;
        let mut step = r.clone();
        linear.solve(&mut step, 1, false)?;

        for i in 0..n {
            x[i] -= step[i];
        }
        if norm(&step) < conv.step_tol {
            // Stalled before reaching the residual tolerance.
            taken = iter + 1;
            break;
        }
    }

    let mut inputs: Vec<&[f64]> = Vec::with_capacity(1 + params.len());
    inputs.push(&*x);
    inputs.extend_from_slice(params);
    let residual = engine.eval(&inputs).map_err(numeric)?;
    let rn = norm(&residual[0]);
    if rn < conv.residual_tol {
        Ok(NewtonResult {
            iterations: taken,
            residual_norm: rn,
        })
    } else {
        Err(SolverError::Numeric {
            reason: format!(
                "Newton did not converge in {} iterations (residual {:.3e})",
                taken, rn
            ),
        })
    }
}

/// Newton root-finder behind the three-phase adapter contract.
pub struct Newton<'g> {
    engine: Engine<'g, f64>,
    linear: Box<dyn LinearSolver>,
    conv: ConvergenceParams<f64>,
    bound_params: Vec<Vec<f64>>,
    n: usize,
    phase: Phase,
}

impl<'g> Newton<'g> {
    /// Wrap a residual engine and a linear solver for the Newton steps.
    ///
    /// # Panics
    ///
    /// Panics if the engine has no inputs or outputs, or if the residual
    /// nonzero count differs from the state's.
    pub fn new(
        engine: Engine<'g, f64>,
        linear: Box<dyn LinearSolver>,
        conv: ConvergenceParams<f64>,
    ) -> Self {
        assert!(!engine.inputs().is_empty(), "residual engine has no inputs");
        assert!(!engine.outputs().is_empty(), "residual engine has no outputs");
        let n = engine.input_sparsity(0).nnz();
        assert_eq!(
            engine.output_sparsity(0).nnz(),
            n,
            "residual must have as many nonzeros as the state"
        );
        Newton {
            engine,
            linear,
            conv,
            bound_params: Vec::new(),
            n,
            phase: Phase::Created,
        }
    }

    /// Bind problem structure: the Jacobian system solved each step.
    pub fn init(&mut self) -> Result<(), SolverError> {
        self.linear.init(&Sparsity::dense(self.n, self.n), 1)?;
        self.phase = Phase::Initialized;
        Ok(())
    }

    /// Bind the fixed parameter values (the residual inputs past the state).
    pub fn prepare(&mut self, params: &[&[f64]]) -> Result<(), SolverError> {
        require(self.phase, Phase::Initialized, "prepare")?;
        assert_eq!(
            params.len(),
            self.engine.inputs().len() - 1,
            "wrong number of parameter bindings"
        );
        self.bound_params = params.iter().map(|p| p.to_vec()).collect();
        self.phase = Phase::Prepared;
        Ok(())
    }

    /// Solve `F(x, p) = 0` starting from the guess in `x`, in place.
    pub fn solve(&mut self, x: &mut [f64]) -> Result<NewtonResult, SolverError> {
        require(self.phase, Phase::Prepared, "solve")?;
        assert_eq!(x.len(), self.n, "state has wrong length");
        let params: Vec<&[f64]> = self.bound_params.iter().map(|p| p.as_slice()).collect();
        newton_iterate(&mut self.engine, self.linear.as_mut(), x, &params, &self.conv)
    }
}

/// A Newton solve wrapped as an opaque graph function: `p -> x*(p)` with
/// `F(x*(p), p) = 0`.
///
/// The owned residual graph is re-bound on every evaluation; the solve uses
/// a dense LU internally.
pub struct ImplicitFunction {
    graph: Graph<f64>,
    state: Expr,
    params: Vec<Expr>,
    residual: Expr,
    conv: ConvergenceParams<f64>,
    guess: Vec<f64>,
    name: String,
}

impl ImplicitFunction {
    /// Wrap `residual` (an expression over `state` and `params` in `graph`)
    /// as an implicit function of the parameters.
    ///
    /// Fails if the residual/state shapes are inconsistent or a reachable
    /// symbol is left unbound.
    pub fn new(
        name: &str,
        graph: Graph<f64>,
        state: Expr,
        params: Vec<Expr>,
        residual: Expr,
        conv: ConvergenceParams<f64>,
        guess: Vec<f64>,
    ) -> Result<Self, pangolin::ConstructionError> {
        // Validate bindings once so evaluation cannot fail structurally.
        let mut inputs = vec![state];
        inputs.extend_from_slice(&params);
        let engine = Engine::new(&graph, &inputs, &[residual])?;
        let n = engine.input_sparsity(0).nnz();
        if engine.output_sparsity(0).nnz() != n || guess.len() != n {
            return Err(pangolin::ConstructionError::ValueCount {
                expected: n,
                got: guess.len(),
            });
        }
        drop(engine);
        Ok(ImplicitFunction {
            graph,
            state,
            params,
            residual,
            conv,
            guess,
            name: name.to_string(),
        })
    }
}

impl ExternalFunction<f64> for ImplicitFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn n_in(&self) -> usize {
        self.params.len()
    }

    fn n_out(&self) -> usize {
        1
    }

    fn sparsity_in(&self, i: usize) -> Arc<Sparsity> {
        self.graph.sparsity(self.params[i]).clone()
    }

    fn sparsity_out(&self, _i: usize) -> Arc<Sparsity> {
        self.graph.sparsity(self.state).clone()
    }

    fn eval(&self, inputs: &[&[f64]], outputs: &mut [Vec<f64>]) -> Result<(), EvalError> {
        let mut engine_inputs = vec![self.state];
        engine_inputs.extend_from_slice(&self.params);
        // Cannot fail: bindings were validated at construction.
        let mut engine = Engine::new(&self.graph, &engine_inputs, &[self.residual])
            .map_err(|e| EvalError::Numeric {
                reason: e.to_string(),
            })?;

        let n = self.guess.len();
        let mut linear = DenseLu::new();
        linear
            .init(&Sparsity::dense(n, n), 1)
            .map_err(|e| EvalError::Numeric {
                reason: e.to_string(),
            })?;

        let mut x = self.guess.clone();
        newton_iterate(&mut engine, &mut linear, &mut x, inputs, &self.conv).map_err(|e| {
            EvalError::Numeric {
                reason: e.to_string(),
            }
        })?;
        outputs[0].copy_from_slice(&x);
        Ok(())
    }
}
