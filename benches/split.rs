use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pangolin::{Engine, Expr, Graph};

// Split a 4 x ncol dense matrix into `blocks` column blocks and
// re-assemble it, returning the input/output handles and the input values.
fn build_split_chain(ncol: usize, blocks: usize) -> (Graph<f64>, Expr, Expr, Vec<f64>) {
    let mut g = Graph::<f64>::new();
    let x = g.sym_dense("x", 4, ncol);
    let step = ncol / blocks;
    let offsets: Vec<usize> = (0..blocks).map(|b| b * step).chain([ncol]).collect();
    let parts = g.horzsplit(x, &offsets).unwrap();
    let back = g.horzcat(&parts).unwrap();
    let nz = vec![1.0; 4 * ncol];
    (g, x, back, nz)
}

fn bench_split_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("split_roundtrip");
    for ncol in [16, 256, 4096] {
        let (g, x, back, nz) = build_split_chain(ncol, 8);
        let mut engine = Engine::new(&g, &[x], &[back]).unwrap();

        group.bench_with_input(BenchmarkId::new("eval", ncol), &nz, |b, nz| {
            b.iter(|| black_box(engine.eval(&[black_box(nz)]).unwrap()))
        });
    }
    group.finish();
}

fn bench_forward_directions(c: &mut Criterion) {
    let mut group = c.benchmark_group("forward_directions");
    for ndir in [1, 8, 64] {
        let (g, x, back, nz) = build_split_chain(256, 8);
        let mut engine = Engine::new(&g, &[x], &[back]).unwrap();

        let seeds: Vec<Vec<Vec<f64>>> = (0..ndir).map(|_| vec![vec![1.0; nz.len()]]).collect();
        group.bench_with_input(BenchmarkId::new("eval_fwd", ndir), &seeds, |b, seeds| {
            b.iter(|| black_box(engine.eval_fwd(&[&nz], black_box(seeds)).unwrap()))
        });
    }
    group.finish();
}

fn bench_sparsity_masks(c: &mut Criterion) {
    let mut group = c.benchmark_group("sparsity_masks");
    for ncol in [256, 4096] {
        let (g, x, back, nz) = build_split_chain(ncol, 8);
        let mut engine = Engine::new(&g, &[x], &[back]).unwrap();

        let masks: Vec<u64> = (0..nz.len()).map(|k| 1u64 << (k % 64)).collect();
        group.bench_with_input(BenchmarkId::new("sp_fwd", ncol), &masks, |b, masks| {
            b.iter(|| black_box(engine.sp_fwd(&[black_box(masks)])))
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_split_roundtrip,
    bench_forward_directions,
    bench_sparsity_masks
);
criterion_main!(benches);
