use num_traits::Float;

/// Parameters controlling convergence checks.
#[derive(Debug, Clone)]
pub struct ConvergenceParams<F> {
    /// Maximum number of iterations (default: 50).
    pub max_iter: usize,
    /// Residual norm tolerance: stop when `||r|| < residual_tol` (default: 1e-10).
    pub residual_tol: F,
    /// Step size tolerance: stop when `||dx|| < step_tol` (default: 1e-14).
    pub step_tol: F,
}

impl Default for ConvergenceParams<f64> {
    fn default() -> Self {
        ConvergenceParams {
            max_iter: 50,
            residual_tol: 1e-10,
            step_tol: 1e-14,
        }
    }
}

/// Compute the L2 norm of a vector.
pub fn norm<F: Float>(v: &[F]) -> F {
    let mut s = F::zero();
    for &x in v {
        s = s + x * x;
    }
    s.sqrt()
}
