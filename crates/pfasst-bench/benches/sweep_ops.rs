//! Criterion micro-benchmarks for single-level sweeps and FAS transfer.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use pfasst_collocation::{CollocationRule, NodeType, QDelta};
use pfasst_core::{Problem, SpaceTransfer};
use pfasst_engine::{Level, LevelParams, LevelTransfer, Sweeper};
use pfasst_problems::{Heat1D, MeshTransfer, Restriction};

const FINE: usize = 127;
const COARSE: usize = 63;

fn heat_level(index: usize, nvars: usize, nodes: usize) -> Level<Heat1D> {
    let rule = Arc::new(CollocationRule::new(NodeType::GaussRadauRight, nodes).unwrap());
    let sweeper = Sweeper::new(rule, QDelta::Lu).unwrap();
    Level::new(
        index,
        Heat1D::new(nvars, 0.1, 4.0).unwrap(),
        sweeper,
        LevelParams::default(),
    )
}

fn bench_heat_sweep(c: &mut Criterion) {
    let mut level = heat_level(0, FINE, 5);
    let u0 = level.problem().u_exact(0.0).unwrap();
    level.init(u0, 0.0, 0.01).unwrap();

    c.bench_function("heat_sweep_127x5", |b| {
        b.iter(|| {
            level.sweep().unwrap();
            black_box(level.u());
        });
    });
    c.bench_function("heat_residual_127x5", |b| {
        b.iter(|| {
            let r = level.compute_residual().unwrap();
            black_box(r);
        });
    });
}

fn bench_fas_cycle(c: &mut Criterion) {
    let mut fine = heat_level(0, FINE, 5);
    let mut coarse = heat_level(1, COARSE, 3);
    let space = MeshTransfer::new(FINE, COARSE, Restriction::FullWeighting).unwrap();
    let u0 = fine.problem().u_exact(0.0).unwrap();
    coarse.init(space.restrict(&u0).unwrap(), 0.0, 0.01).unwrap();
    fine.init(u0, 0.0, 0.01).unwrap();
    fine.sweep().unwrap();
    let transfer = LevelTransfer::new(
        Box::new(space),
        fine.sweeper().rule(),
        coarse.sweeper().rule(),
    );

    c.bench_function("fas_restrict_sweep_prolong_127_63", |b| {
        b.iter(|| {
            transfer.restrict(&fine, &mut coarse).unwrap();
            coarse.sweep().unwrap();
            transfer.prolong(&mut fine, &coarse).unwrap();
            black_box(fine.u());
        });
    });
}

criterion_group!(benches, bench_heat_sweep, bench_fas_cycle);
criterion_main!(benches);
