use approx::assert_abs_diff_eq;
use pangolin::{Engine, Graph, Sparsity};
use std::sync::Arc;

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

// Deterministic pseudo-random values in [-0.5, 0.5).
struct XorShift(u64);

impl XorShift {
    fn next(&mut self) -> f64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        (self.0 % 1_000_000) as f64 / 1_000_000.0 - 0.5
    }

    fn vec(&mut self, n: usize) -> Vec<f64> {
        (0..n).map(|_| self.next()).collect()
    }
}

#[test]
fn forward_matches_analytic_jacobian() {
    // f(x, y) = x * y + (-x) over dense 2-vectors:
    // df/dx = diag(y) - I, df/dy = diag(x).
    let mut g = Graph::<f64>::new();
    let x = g.sym_dense("x", 2, 1);
    let y = g.sym_dense("y", 2, 1);
    let p = g.mul(x, y).unwrap();
    let nx = g.neg(x).unwrap();
    let f = g.add(p, nx).unwrap();

    let mut engine = Engine::new(&g, &[x, y], &[f]).unwrap();
    let xv = [2.0, 3.0];
    let yv = [5.0, 7.0];

    // One direction per x component, then per y component.
    let seeds = vec![
        vec![vec![1.0, 0.0], vec![0.0, 0.0]],
        vec![vec![0.0, 1.0], vec![0.0, 0.0]],
        vec![vec![0.0, 0.0], vec![1.0, 0.0]],
        vec![vec![0.0, 0.0], vec![0.0, 1.0]],
    ];
    let (values, sens) = engine.eval_fwd(&[&xv, &yv], &seeds).unwrap();
    assert_eq!(values[0], vec![2.0 * 5.0 - 2.0, 3.0 * 7.0 - 3.0]);

    // df/dx columns.
    assert_eq!(sens[0][0], vec![5.0 - 1.0, 0.0]);
    assert_eq!(sens[1][0], vec![0.0, 7.0 - 1.0]);
    // df/dy columns.
    assert_eq!(sens[2][0], vec![2.0, 0.0]);
    assert_eq!(sens[3][0], vec![0.0, 3.0]);
}

#[test]
fn reverse_matches_forward_by_duality() {
    // <w, J u> must equal <J' w, u> for any tangent u and adjoint w.
    let mut g = Graph::<f64>::new();
    let x = g.sym_dense("x", 6, 1);
    let parts = g.vertsplit(x, &[0, 2, 4, 6]).unwrap();
    let p = g.mul(parts[0], parts[1]).unwrap();
    let s = g.add(p, parts[2]).unwrap();
    let n = g.neg(parts[1]).unwrap();
    let out = g.vertcat(&[s, n]).unwrap();

    let mut engine = Engine::new(&g, &[x], &[out]).unwrap();
    let mut rng = XorShift(0x5eed);
    let xv = rng.vec(6);
    let u = rng.vec(6);
    let w = rng.vec(4);

    let (_, fwd) = engine.eval_fwd(&[&xv], &[vec![u.clone()]]).unwrap();
    let (_, adj) = engine.eval_adj(&[&xv], &[vec![w.clone()]]).unwrap();

    assert_abs_diff_eq!(dot(&w, &fwd[0][0]), dot(&adj[0][0], &u), epsilon = 1e-12);
}

#[test]
fn duality_through_diagsplit() {
    let mut g = Graph::<f64>::new();
    let x = g.sym("x", Arc::new(Sparsity::diag(4)));
    let parts = g.diagsplit(x, &[0, 2, 4], &[0, 2, 4]).unwrap();
    let out = g.add(parts[0], parts[1]).unwrap();

    let mut engine = Engine::new(&g, &[x], &[out]).unwrap();
    let mut rng = XorShift(0xfeed);
    let xv = rng.vec(4);
    let u = rng.vec(4);
    let w = rng.vec(2);

    let (_, fwd) = engine.eval_fwd(&[&xv], &[vec![u.clone()]]).unwrap();
    let (_, adj) = engine.eval_adj(&[&xv], &[vec![w.clone()]]).unwrap();

    assert_abs_diff_eq!(dot(&w, &fwd[0][0]), dot(&adj[0][0], &u), epsilon = 1e-12);
}

#[test]
fn fan_in_adjoints_accumulate() {
    // y = horzcat(x, x): both columns read the same value, so the adjoint
    // of x is the sum of both output adjoints.
    let mut g = Graph::<f64>::new();
    let x = g.sym_dense("x", 2, 1);
    let y = g.horzcat(&[x, x]).unwrap();

    let mut engine = Engine::new(&g, &[x], &[y]).unwrap();
    let (_, adj) = engine
        .eval_adj(&[&[1.0, 2.0]], &[vec![vec![1.0, 2.0, 10.0, 20.0]]])
        .unwrap();
    assert_eq!(adj[0][0], vec![11.0, 22.0]);
}

#[test]
fn reused_operand_gets_both_contributions() {
    // f = x * x: df/dx = 2x from the two product-rule terms.
    let mut g = Graph::<f64>::new();
    let x = g.sym_dense("x", 3, 1);
    let f = g.mul(x, x).unwrap();

    let mut engine = Engine::new(&g, &[x], &[f]).unwrap();
    let xv = [1.0, -2.0, 3.0];

    let (_, fwd) = engine
        .eval_fwd(&[&xv], &[vec![vec![1.0, 1.0, 1.0]]])
        .unwrap();
    assert_eq!(fwd[0][0], vec![2.0, -4.0, 6.0]);

    let (_, adj) = engine
        .eval_adj(&[&xv], &[vec![vec![1.0, 1.0, 1.0]]])
        .unwrap();
    assert_eq!(adj[0][0], vec![2.0, -4.0, 6.0]);
}

#[test]
fn truncated_adjoint_seed_is_rejected() {
    // y = -x over three nonzeros: a two-element output seed must fail
    // loudly, not silently drop the third adjoint component.
    let mut g = Graph::<f64>::new();
    let x = g.sym_dense("x", 3, 1);
    let y = g.neg(x).unwrap();
    let mut engine = Engine::new(&g, &[x], &[y]).unwrap();

    let (_, adj) = engine
        .eval_adj(&[&[1.0, 2.0, 3.0]], &[vec![vec![1.0, 1.0, 1.0]]])
        .unwrap();
    assert_eq!(adj[0][0], vec![-1.0, -1.0, -1.0]);

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _ = engine.eval_adj(&[&[1.0, 2.0, 3.0]], &[vec![vec![1.0, 1.0]]]);
    }));
    assert!(result.is_err(), "short adjoint seed was accepted");
}

#[test]
#[should_panic(expected = "wrong nonzero count")]
fn truncated_forward_seed_is_rejected() {
    let mut g = Graph::<f64>::new();
    let x = g.sym_dense("x", 3, 1);
    let y = g.neg(x).unwrap();
    let mut engine = Engine::new(&g, &[x], &[y]).unwrap();
    let _ = engine.eval_fwd(&[&[1.0, 2.0, 3.0]], &[vec![vec![1.0]]]);
}

#[test]
fn batched_directions_match_single() {
    let mut g = Graph::<f64>::new();
    let x = g.sym_dense("x", 3, 1);
    let y = g.sym_dense("y", 3, 1);
    let f = g.mul(x, y).unwrap();

    let mut engine = Engine::new(&g, &[x, y], &[f]).unwrap();
    let xv = [1.0, 2.0, 3.0];
    let yv = [4.0, 5.0, 6.0];

    let mut rng = XorShift(0xabcd);
    let dirs: Vec<Vec<Vec<f64>>> = (0..3).map(|_| vec![rng.vec(3), rng.vec(3)]).collect();

    let (_, batched) = engine.eval_fwd(&[&xv, &yv], &dirs).unwrap();
    for (d, dir) in dirs.iter().enumerate() {
        let (_, single) = engine.eval_fwd(&[&xv, &yv], &[dir.clone()]).unwrap();
        assert_eq!(batched[d], single[0], "direction {} differs", d);
    }
}
