// This file contains benchmarks for the purpose of guarding against
// performance regressions. To run them, use `cargo bench`.

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use glam::Vec3;
use vcmtrace::config::{NextEventEstimation, TracingConfig, Variant};
use vcmtrace::demo_scenes;
use vcmtrace::driver;
use vcmtrace::hash_grid::HashGrid;

fn bench_config(seconds: f32) -> TracingConfig {
    TracingConfig {
        max_bounces: 8,
        integration_seconds: seconds,
        vcm_radius_factor: 0.01,
        vcm_radius_alpha: 0.75,
        rays_per_pixel: 16,
        worker_count: 4,
        nee: NextEventEstimation::WithMis,
        min_bounces: 3,
    }
}

fn random_points(n: usize) -> Vec<Vec3> {
    (0..n)
        .map(|i| {
            let f = i as f32;
            Vec3::new((f * 0.37).sin() * 5.0, (f * 0.71).cos() * 5.0, (f * 0.13).sin() * 5.0)
        })
        .collect()
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("Performance regression tests");
    group.sample_size(10);

    group.bench_function("Cornell box, VCM, 0.2s budget", |b| {
        b.iter(|| {
            let scene = Arc::new(demo_scenes::cornell_box(256, 256).unwrap());
            driver::render(scene, bench_config(0.2), Variant::Vcm, None)
        })
    });

    group.bench_function("Cornell box, PT, 0.2s budget", |b| {
        b.iter(|| {
            let scene = Arc::new(demo_scenes::cornell_box(256, 256).unwrap());
            driver::render(scene, bench_config(0.2), Variant::Pt, None)
        })
    });

    group.bench_function("Hash grid build + full-scan query, 50k points", |b| {
        let points = random_points(50_000);
        b.iter(|| {
            let grid = HashGrid::build(&points, 0.1);
            let mut count = 0usize;
            for p in &points {
                grid.range(*p, |_| count += 1);
            }
            count
        })
    });

    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
