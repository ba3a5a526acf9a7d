//! nalgebra adapters for dense interop.
//!
//! Thin converters between `(Sparsity, nonzeros)` pairs and `DMatrix<f64>`,
//! handy for assembling dense views of evaluation results.

use nalgebra::DMatrix;

use crate::sparsity::Sparsity;

/// Expand a pattern and its nonzeros into a dense matrix.
///
/// # Panics
///
/// Panics if `nz.len() != sp.nnz()`.
pub fn to_dmatrix(sp: &Sparsity, nz: &[f64]) -> DMatrix<f64> {
    assert_eq!(nz.len(), sp.nnz(), "nonzero count does not match pattern");
    let mut m = DMatrix::zeros(sp.nrow(), sp.ncol());
    for c in 0..sp.ncol() {
        for k in sp.col_range(c) {
            m[(sp.row()[k], c)] = nz[k];
        }
    }
    m
}

/// Extract the pattern and nonzeros of a dense matrix, dropping exact zeros.
pub fn from_dmatrix(m: &DMatrix<f64>) -> (Sparsity, Vec<f64>) {
    let mut triplets = Vec::new();
    let mut nz = Vec::new();
    for c in 0..m.ncols() {
        for r in 0..m.nrows() {
            if m[(r, c)] != 0.0 {
                triplets.push((r, c));
                nz.push(m[(r, c)]);
            }
        }
    }
    // Triplets are generated column-major and duplicate-free.
    let sp = Sparsity::from_triplets(m.nrows(), m.ncols(), &triplets)
        .unwrap_or_else(|_| Sparsity::empty(m.nrows(), m.ncols()));
    (sp, nz)
}
