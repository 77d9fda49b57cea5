//! Flattening, planning and full-run benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rolemerge_reconcile::{
    flatten_composites, flatten_declared, CompositePlan, Declaration, MemberRef,
    MemoryBackend, ReconcileOptions, RoleNode, RunOrchestrator, ScopeDeclaration,
};
use std::sync::Arc;
use tokio::runtime::Runtime;

/// `width` composites per level, `depth` levels, each level referencing the one below
fn layered_tree(width: usize, depth: usize) -> Vec<MemberRef> {
    let mut level: Vec<MemberRef> = (0..width)
        .map(|i| MemberRef::leaf(format!("leaf-{}", i)))
        .collect();

    for d in 0..depth {
        level = (0..width)
            .map(|i| RoleNode::new(format!("role-{}-{}", d, i), level.clone()).into())
            .collect();
    }
    level
}

fn bench_flatten(c: &mut Criterion) {
    let mut group = c.benchmark_group("flatten");

    for depth in [2, 4, 6].iter() {
        let tree = layered_tree(4, *depth);
        group.bench_with_input(BenchmarkId::new("declared", depth), &tree, |b, tree| {
            b.iter(|| flatten_declared(black_box(tree)))
        });
        group.bench_with_input(BenchmarkId::new("plan", depth), &tree, |b, tree| {
            b.iter(|| CompositePlan::build(flatten_composites(black_box(tree))).unwrap())
        });
    }

    group.finish();
}

fn bench_full_run(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let declaration = Declaration::new(vec![ScopeDeclaration::new("realm", layered_tree(4, 3))]);

    c.bench_function("run_fresh_realm", |b| {
        b.iter(|| {
            rt.block_on(async {
                let backend = Arc::new(MemoryBackend::new());
                RunOrchestrator::new(backend)
                    .run(black_box(&declaration), ReconcileOptions::default())
                    .await
                    .unwrap()
            })
        })
    });
}

criterion_group!(benches, bench_flatten, bench_full_run);
criterion_main!(benches);
