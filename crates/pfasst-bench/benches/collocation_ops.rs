//! Criterion micro-benchmarks for collocation rule and QΔ construction.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use pfasst_collocation::{interpolation_matrix, CollocationRule, NodeType, QDelta};

fn bench_rule_construction(c: &mut Criterion) {
    let mut group = c.benchmark_group("collocation_rule");
    for (name, node_type) in [
        ("radau_right", NodeType::GaussRadauRight),
        ("lobatto", NodeType::GaussLobatto),
        ("legendre", NodeType::GaussLegendre),
    ] {
        for m in [3usize, 5, 8] {
            group.bench_function(format!("{name}_{m}"), |b| {
                b.iter(|| {
                    let rule = CollocationRule::new(node_type, black_box(m)).unwrap();
                    black_box(&rule);
                });
            });
        }
    }
    group.finish();
}

fn bench_qdelta(c: &mut Criterion) {
    let rule = CollocationRule::new(NodeType::GaussRadauRight, 8).unwrap();
    c.bench_function("qdelta_lu_8", |b| {
        b.iter(|| {
            let q = QDelta::Lu.matrix(black_box(&rule)).unwrap();
            black_box(&q);
        });
    });
    c.bench_function("qdelta_implicit_euler_8", |b| {
        b.iter(|| {
            let q = QDelta::ImplicitEuler.matrix(black_box(&rule)).unwrap();
            black_box(&q);
        });
    });
}

fn bench_node_interpolation(c: &mut Criterion) {
    let fine = CollocationRule::new(NodeType::GaussRadauRight, 5).unwrap();
    let coarse = CollocationRule::new(NodeType::GaussRadauRight, 3).unwrap();
    c.bench_function("interpolation_5_to_3", |b| {
        b.iter(|| {
            let m = interpolation_matrix(black_box(fine.nodes()), black_box(coarse.nodes()));
            black_box(&m);
        });
    });
}

criterion_group!(
    benches,
    bench_rule_construction,
    bench_qdelta,
    bench_node_interpolation
);
criterion_main!(benches);
