//! Benchmarks for prediction stabilization and whole rounds
//!
//! Run with: cargo bench --bench stabilizer

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rps_referee::{
    Classification, DetachedCamera, PredictionSample, PredictionStabilizer, SessionBuilder,
    StabilizerConfig,
};
use std::hint::black_box;
use web_time::Duration;

/// A steady hand with an occasional misread
fn steady_labels(frames: usize) -> Vec<PredictionSample> {
    (0..frames)
        .map(|i| {
            let label = if i % 7 == 0 { "Paper" } else { "Rock" };
            PredictionSample::new(label, 0.55 + (i % 40) as f32 / 100.0)
        })
        .collect()
}

/// A hand moving between gestures, half the frames low confidence
fn jittery_labels(frames: usize) -> Vec<PredictionSample> {
    const LABELS: [&str; 4] = ["Rock", "Paper", "Scissors", "background"];
    (0..frames)
        .map(|i| PredictionSample::new(LABELS[(i * 7) % 4], if i % 2 == 0 { 0.9 } else { 0.3 }))
        .collect()
}

fn bench_observe(c: &mut Criterion) {
    let mut group = c.benchmark_group("stabilizer_observe");

    for frames in [30usize, 90, 300] {
        group.throughput(Throughput::Elements(frames as u64));
        for (name, samples) in [("steady", steady_labels(frames)), ("jittery", jittery_labels(frames))] {
            group.bench_with_input(BenchmarkId::new(name, frames), &samples, |b, samples| {
                b.iter(|| {
                    let mut stabilizer = PredictionStabilizer::new(StabilizerConfig::default());
                    for sample in samples {
                        stabilizer.observe(black_box(sample.clone()));
                    }
                    stabilizer.current_stable()
                });
            });
        }
    }

    group.finish();
}

fn bench_current_stable(c: &mut Criterion) {
    let mut group = c.benchmark_group("stabilizer_current_stable");

    for config in [StabilizerConfig::standard(), StabilizerConfig::strict()] {
        let mut stabilizer = PredictionStabilizer::new(config);
        for sample in steady_labels(config.window_capacity) {
            stabilizer.observe(sample);
        }
        group.bench_function(BenchmarkId::from_parameter(config.window_capacity), |b| {
            b.iter(|| black_box(&stabilizer).current_stable());
        });
    }

    group.finish();
}

fn bench_full_round(c: &mut Criterion) {
    c.bench_function("full_round_30fps", |b| {
        b.iter(|| {
            let mut session = SessionBuilder::new()
                .with_seed(7)
                .start_session(DetachedCamera)
                .unwrap();
            session.start_round().unwrap();
            for frame in 0..90u32 {
                let label = if frame % 5 == 0 { "Paper" } else { "Scissors" };
                session.submit_classification(Classification::new(label, 0.8));
                session.advance(Duration::from_millis(34)).unwrap();
            }
            let _ = black_box(session.events().count());
            session.match_state()
        });
    });
}

criterion_group!(benches, bench_observe, bench_current_stable, bench_full_round);
criterion_main!(benches);
