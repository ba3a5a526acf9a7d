use pangolin::Sparsity;
use pangolin_solvers::{DenseLu, LinearSolver, Phase, SolverError, SparseLu};

fn assert_close(a: &[f64], b: &[f64], tol: f64) {
    assert_eq!(a.len(), b.len());
    for (i, (x, y)) in a.iter().zip(b).enumerate() {
        assert!((x - y).abs() < tol, "entry {}: {} vs {}", i, x, y);
    }
}

#[test]
fn solve_before_init_is_out_of_order() {
    let mut s = DenseLu::new();
    let mut x = [1.0, 2.0];
    let original = x;
    let err = s.solve(&mut x, 1, false).unwrap_err();
    assert_eq!(
        err,
        SolverError::OutOfOrder {
            operation: "solve",
            phase: Phase::Created,
        }
    );
    // A contract violation produces no numeric output.
    assert_eq!(x, original);
}

#[test]
fn prepare_before_init_is_out_of_order() {
    let mut s = SparseLu::new();
    let err = s.prepare(&[1.0]).unwrap_err();
    assert!(matches!(err, SolverError::OutOfOrder { .. }));
}

#[test]
fn dense_lu_requires_pivoting() {
    // Zero in the (0,0) position forces a row swap.
    // A = [[0, 1], [2, 3]], A x = [5, 8] -> x = [1, 5].
    let sp = Sparsity::from_triplets(2, 2, &[(1, 0), (0, 1), (1, 1)]).unwrap();
    let mut s = DenseLu::new();
    s.init(&sp, 1).unwrap();
    s.prepare(&[2.0, 1.0, 3.0]).unwrap();
    let mut x = [5.0, 8.0];
    s.solve(&mut x, 1, false).unwrap();
    assert_close(&x, &[1.0, 5.0], 1e-12);
}

#[test]
fn dense_lu_transpose_solve() {
    // A = [[2, 1], [0, 3]], A' x = [2, 7] -> x = [1, 2].
    let sp = Sparsity::from_triplets(2, 2, &[(0, 0), (0, 1), (1, 1)]).unwrap();
    let mut s = DenseLu::new();
    s.init(&sp, 1).unwrap();
    s.prepare(&[2.0, 1.0, 3.0]).unwrap();
    let mut x = [2.0, 7.0];
    s.solve(&mut x, 1, true).unwrap();
    assert_close(&x, &[1.0, 2.0], 1e-12);
}

#[test]
fn dense_lu_multiple_right_hand_sides() {
    let sp = Sparsity::diag(3);
    let mut s = DenseLu::new();
    s.init(&sp, 2).unwrap();
    s.prepare(&[2.0, 4.0, 8.0]).unwrap();
    let mut x = [2.0, 4.0, 8.0, 4.0, 8.0, 16.0];
    s.solve(&mut x, 2, false).unwrap();
    assert_close(&x, &[1.0, 1.0, 1.0, 2.0, 2.0, 2.0], 1e-12);
}

#[test]
fn dense_lu_reports_singular() {
    let sp = Sparsity::dense(2, 2);
    let mut s = DenseLu::new();
    s.init(&sp, 1).unwrap();
    let err = s.prepare(&[1.0, 2.0, 2.0, 4.0]).unwrap_err();
    assert!(matches!(err, SolverError::Numeric { .. }));
    // A failed prepare keeps the solver out of the prepared phase.
    let mut x = [1.0, 1.0];
    assert!(matches!(
        s.solve(&mut x, 1, false),
        Err(SolverError::OutOfOrder { .. })
    ));
}

#[test]
fn dense_lu_rejects_rectangular() {
    let mut s = DenseLu::new();
    let err = s.init(&Sparsity::dense(2, 3), 1).unwrap_err();
    assert!(matches!(err, SolverError::Numeric { .. }));
}

#[test]
fn dense_lu_exposes_factorization_pattern() {
    let mut s = DenseLu::new();
    assert!(s.factorization_sparsity().is_none());
    s.init(&Sparsity::diag(2), 1).unwrap();
    s.prepare(&[3.0, 5.0]).unwrap();
    let fsp = s.factorization_sparsity().unwrap();
    assert_eq!((fsp.nrow(), fsp.ncol()), (2, 2));
}

#[test]
fn sparse_lu_solves_tridiagonal() {
    // 4x4 tridiagonal with 2 on the diagonal and -1 off it.
    let n = 4;
    let mut entries = Vec::new();
    let mut vals = Vec::new();
    for c in 0..n {
        if c > 0 {
            entries.push((c - 1, c));
            vals.push(-1.0);
        }
        entries.push((c, c));
        vals.push(2.0);
        if c + 1 < n {
            entries.push((c + 1, c));
            vals.push(-1.0);
        }
    }
    let sp = Sparsity::from_triplets(n, n, &entries).unwrap();
    // from_triplets sorts column-major; reorder values to match.
    let mut nz = vec![0.0; sp.nnz()];
    for (&(r, c), &v) in entries.iter().zip(&vals) {
        nz[sp.index_of(r, c).unwrap()] = v;
    }

    let mut s = SparseLu::new();
    s.init(&sp, 1).unwrap();
    s.prepare(&nz).unwrap();

    // Solution x = [1, 1, 1, 1] gives b = A x = [1, 0, 0, 1].
    let mut x = [1.0, 0.0, 0.0, 1.0];
    s.solve(&mut x, 1, false).unwrap();
    assert_close(&x, &[1.0, 1.0, 1.0, 1.0], 1e-10);
}

#[test]
fn sparse_lu_transpose_matches_dense() {
    // Unsymmetric matrix so the transpose solve is distinguishable.
    // A = [[1, 2], [0, 1]] column-major nonzeros.
    let sp = Sparsity::from_triplets(2, 2, &[(0, 0), (0, 1), (1, 1)]).unwrap();
    let nz = [1.0, 2.0, 1.0];
    let b = [3.0, 5.0];

    let mut sparse = SparseLu::new();
    sparse.init(&sp, 1).unwrap();
    sparse.prepare(&nz).unwrap();
    let mut xs = b;
    sparse.solve(&mut xs, 1, true).unwrap();

    let mut dense = DenseLu::new();
    dense.init(&sp, 1).unwrap();
    dense.prepare(&nz).unwrap();
    let mut xd = b;
    dense.solve(&mut xd, 1, true).unwrap();

    assert_close(&xs, &xd, 1e-10);
}

#[test]
fn sparse_lu_reports_singular() {
    let sp = Sparsity::from_triplets(2, 2, &[(0, 0), (0, 1)]).unwrap();
    let mut s = SparseLu::new();
    s.init(&sp, 1).unwrap();
    let err = s.prepare(&[1.0, 1.0]).unwrap_err();
    assert!(matches!(err, SolverError::Numeric { .. }));
}
