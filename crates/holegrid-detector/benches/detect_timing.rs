use criterion::{black_box, criterion_group, criterion_main, Criterion};
use holegrid_detector::{
    noise::double_pass, Bound, GridDetector, GridDetectorParams, GridShape, Keypoint,
    ReferenceBoard,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// 6x7 board with sub-pixel jitter plus scattered clutter points.
fn synthetic_board(seed: u64, clutter: usize) -> Vec<Keypoint> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut kps = Vec::new();
    for j in 0..6 {
        for i in 0..7 {
            kps.push(Keypoint::new(
                kps.len(),
                120.0 + i as f32 * 64.0 + rng.random_range(-0.6..0.6),
                90.0 + j as f32 * 58.0 + rng.random_range(-0.6..0.6),
            ));
        }
    }
    for _ in 0..clutter {
        kps.push(Keypoint::new(
            kps.len(),
            rng.random_range(0.0..1280.0),
            rng.random_range(0.0..720.0),
        ));
    }
    kps
}

fn bench_noise_filter(c: &mut Criterion) {
    let kps = synthetic_board(1, 40);
    let bound = Bound::from_image_size(1280, 720);
    c.bench_function("double_pass_42+40", |b| {
        b.iter(|| double_pass(black_box(&kps), &bound, 2.0, 4))
    });
}

fn bench_detect(c: &mut Criterion) {
    let clean = synthetic_board(2, 0);
    let bound = Some(Bound::from_image_size(1280, 720));
    let reference = ReferenceBoard::uniform(GridShape::new(6, 7), [64.0, 58.0], [32.0, 29.0]);
    let Ok(detector) = GridDetector::new(GridDetectorParams::default(), Some(reference)) else {
        return;
    };

    c.bench_function("detect_6x7_clean", |b| {
        b.iter(|| detector.detect(black_box(&clean), bound, None))
    });

    let cluttered = synthetic_board(3, 25);
    c.bench_function("detect_6x7_clutter25", |b| {
        b.iter(|| detector.detect(black_box(&cluttered), bound, None))
    });
}

criterion_group!(benches, bench_noise_filter, bench_detect);
criterion_main!(benches);
