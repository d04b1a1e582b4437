//! Benchmarks for the equal-chord arc solver.
//!
//! The solver runs once per viewport resize, so a full solve for a typical
//! bucket count should stay well under a frame.
//!
//! Run with: cargo bench -p allot-layout --bench arc_bench

use allot_layout::{ArcRequest, Size};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

fn bench_viewport_solve(c: &mut Criterion) {
    let mut group = c.benchmark_group("arc/viewport");

    for count in [2usize, 5, 12, 32] {
        let req = ArcRequest::for_viewport(Size::new(1920.0, 1080.0), count);
        group.bench_with_input(BenchmarkId::new("solve", count), &req, |b, req| {
            b.iter(|| black_box(req.solve()))
        });
    }

    group.finish();
}

fn bench_eccentric(c: &mut Criterion) {
    let mut group = c.benchmark_group("arc/eccentric");

    for (h, v) in [(400.0, 300.0), (1000.0, 50.0), (50.0, 1000.0)] {
        let req = ArcRequest::new(9, h, v).with_tolerance(0.05);
        group.bench_with_input(
            BenchmarkId::new("solve", format!("{h}x{v}")),
            &req,
            |b, req| b.iter(|| black_box(req.solve())),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_viewport_solve, bench_eccentric);
criterion_main!(benches);
