#![cfg(feature = "nalgebra")]

use nalgebra::DMatrix;
use pangolin::nalgebra_support::{from_dmatrix, to_dmatrix};
use pangolin::Sparsity;

#[test]
fn dense_matrix_round_trip() {
    let m = DMatrix::from_row_slice(2, 3, &[1.0, 0.0, 2.0, 0.0, 3.0, 0.0]);
    let (sp, nz) = from_dmatrix(&m);
    assert_eq!(sp.nnz(), 3);
    assert_eq!(sp.to_triplets(), vec![(0, 0), (1, 1), (0, 2)]);

    let back = to_dmatrix(&sp, &nz);
    assert_eq!(back, m);
}

#[test]
fn sparse_pattern_expands_with_zeros() {
    let sp = Sparsity::diag(3);
    let m = to_dmatrix(&sp, &[1.0, 2.0, 3.0]);
    assert_eq!(m[(0, 0)], 1.0);
    assert_eq!(m[(1, 1)], 2.0);
    assert_eq!(m[(2, 2)], 3.0);
    assert_eq!(m[(0, 1)], 0.0);
}
