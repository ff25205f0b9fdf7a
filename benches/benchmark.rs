//! # benchmark
//!
//! Benchmarking suite.

use av2_detection_eval::{
    evaluation::detection::{
        cfg::DetectionCfg,
        eval::evaluate,
        utils::{accumulate, compute_average_precision},
    },
    structures::cuboid::{Cuboid, Detection, GroundTruth},
};
use criterion::{criterion_group, criterion_main, Criterion};
use once_cell::sync::Lazy;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

const NUM_SWEEPS: u64 = 50;
const NUM_OBJECTS_PER_SWEEP: usize = 80;
const CATEGORIES: [&str; 4] = ["REGULAR_VEHICLE", "PEDESTRIAN", "BOLLARD", "BUS"];

/// Synthetic annotations with jittered, partially dropped detections.
static SWEEPS: Lazy<(Vec<Detection>, Vec<GroundTruth>)> = Lazy::new(|| {
    let mut rng = StdRng::seed_from_u64(0);
    let jitter = Normal::new(0.0_f32, 0.5).unwrap();
    let mut dts = Vec::new();
    let mut gts = Vec::new();
    for timestamp_ns in 0..NUM_SWEEPS {
        let sweep_uuid = ("synthetic".to_string(), timestamp_ns);
        for i in 0..NUM_OBJECTS_PER_SWEEP {
            let category = CATEGORIES[i % CATEGORIES.len()];
            let xyz_m = [rng.gen_range(-80.0..80.0), rng.gen_range(-80.0..80.0), 0.0];
            let yaw_rad = rng.gen_range(-3.1..3.1);
            let cuboid = Cuboid::from_yaw(xyz_m, [4.0, 2.0, 1.5], yaw_rad);
            gts.push(GroundTruth::new(&sweep_uuid, category, cuboid));

            if rng.gen_bool(0.8) {
                let xyz_m = [
                    xyz_m[0] + jitter.sample(&mut rng),
                    xyz_m[1] + jitter.sample(&mut rng),
                    0.0,
                ];
                let yaw_rad = yaw_rad + jitter.sample(&mut rng);
                let cuboid = Cuboid::from_yaw(xyz_m, [4.2, 1.9, 1.6], yaw_rad);
                dts.push(Detection::new(&sweep_uuid, category, cuboid, rng.gen()));
            }
        }
    }
    (dts, gts)
});

fn accumulate_benchmark(c: &mut Criterion) {
    let (dts, gts) = &*SWEEPS;
    let cfg = DetectionCfg::default();
    let sweep_dts = dts.iter().filter(|dt| dt.timestamp_ns == 0).cloned().collect::<Vec<_>>();
    let sweep_gts = gts.iter().filter(|gt| gt.timestamp_ns == 0).cloned().collect::<Vec<_>>();
    c.bench_function("accumulate", |b| {
        b.iter(|| accumulate(&sweep_dts, &sweep_gts, &cfg))
    });
}

fn average_precision_benchmark(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(1);
    let tps = (0..10_000).map(|_| rng.gen_bool(0.6)).collect::<Vec<_>>();
    let recall_interpolated = DetectionCfg::default().recall_interpolated();
    c.bench_function("compute_average_precision", |b| {
        b.iter(|| compute_average_precision(&tps, &recall_interpolated.view(), 8_000))
    });
}

fn evaluate_benchmark(c: &mut Criterion) {
    let (dts, gts) = &*SWEEPS;
    let cfg = DetectionCfg::default();
    c.bench_function("evaluate", |b| b.iter(|| evaluate(dts, gts, &cfg)));
}

criterion_group!(
    benches,
    accumulate_benchmark,
    average_precision_benchmark,
    evaluate_benchmark
);
criterion_main!(benches);
