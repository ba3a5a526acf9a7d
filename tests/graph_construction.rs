use pangolin::{ConstructionError, Graph, Sparsity};
use std::sync::Arc;

#[test]
fn binary_ops_check_shapes() {
    let mut g = Graph::<f64>::new();
    let a = g.sym_dense("a", 2, 3);
    let b = g.sym_dense("b", 3, 2);
    let before = g.n_nodes();
    let err = g.add(a, b).unwrap_err();
    assert!(matches!(err, ConstructionError::ShapeMismatch { .. }));
    // A failed constructor leaves the arena unchanged.
    assert_eq!(g.n_nodes(), before);
}

#[test]
fn constant_checks_value_count() {
    let mut g = Graph::<f64>::new();
    let err = g
        .constant(Arc::new(Sparsity::diag(3)), vec![1.0, 2.0])
        .unwrap_err();
    assert_eq!(err, ConstructionError::ValueCount { expected: 3, got: 2 });
}

#[test]
fn foreign_handle_is_rejected() {
    // A handle from a bigger arena points past the end of a fresh one; the
    // bound check refuses it, so no edge to a later node can ever form.
    let mut big = Graph::<f64>::new();
    let _ = big.sym_dense("a", 1, 1);
    let _ = big.sym_dense("b", 1, 1);
    let dangling = big.sym_dense("c", 1, 1);

    let mut fresh = Graph::<f64>::new();
    let x = fresh.sym_dense("x", 1, 1);
    let before = fresh.n_nodes();
    let err = fresh.add(x, dangling).unwrap_err();
    assert!(matches!(err, ConstructionError::Cycle(_)));
    assert_eq!(fresh.n_nodes(), before);
}

#[test]
fn add_takes_union_mul_takes_intersection() {
    let mut g = Graph::<f64>::new();
    let sa = Sparsity::from_triplets(3, 1, &[(0, 0), (1, 0)]).unwrap();
    let sb = Sparsity::from_triplets(3, 1, &[(1, 0), (2, 0)]).unwrap();
    let a = g.sym("a", Arc::new(sa));
    let b = g.sym("b", Arc::new(sb));

    let s = g.add(a, b).unwrap();
    assert_eq!(g.sparsity(s).to_triplets(), vec![(0, 0), (1, 0), (2, 0)]);

    let p = g.mul(a, b).unwrap();
    assert_eq!(g.sparsity(p).to_triplets(), vec![(1, 0)]);
}

#[test]
fn structural_equality_ignores_node_identity() {
    let mut g = Graph::<f64>::new();
    let x = g.sym_dense("x", 2, 2);
    let y = g.sym_dense("y", 2, 2);
    let s1 = g.add(x, y).unwrap();
    let s2 = g.add(x, y).unwrap();
    // Distinct nodes, same structure.
    assert_ne!(s1, s2);
    assert!(g.structurally_equal(s1, s2));

    let s3 = g.add(y, x).unwrap();
    assert!(!g.structurally_equal(s1, s3));

    // Symbols are equal only to themselves.
    assert!(!g.structurally_equal(x, y));
}

#[test]
fn neg_keeps_sparsity() {
    let mut g = Graph::<f64>::new();
    let sp = Sparsity::from_triplets(3, 2, &[(0, 0), (2, 1)]).unwrap();
    let x = g.sym("x", Arc::new(sp.clone()));
    let n = g.neg(x).unwrap();
    assert_eq!(**g.sparsity(n), sp);
}
