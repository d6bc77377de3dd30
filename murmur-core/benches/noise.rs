//! Throughput of the noise generators over a 4 s buffer at 44.1 kHz.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use murmur_core::filters::{FilterSpec, FilterStage};
use murmur_core::noise::{self, ImpulseEvent, Sparse};
use rand::rngs::StdRng;
use rand::SeedableRng;

const SR: f32 = 44_100.0;
const LEN: usize = 4 * 44_100;

fn bench_colors(c: &mut Criterion) {
    let mut buf = vec![0.0f32; LEN];
    let mut rng = StdRng::seed_from_u64(7);

    c.bench_function("white_4s", |b| b.iter(|| noise::white(black_box(&mut buf), &mut rng)));
    c.bench_function("brown_4s", |b| b.iter(|| noise::brown(black_box(&mut buf), &mut rng)));
    c.bench_function("pink_4s", |b| b.iter(|| noise::pink(black_box(&mut buf), &mut rng)));

    let crackle = Sparse {
        floor: 0.1,
        probability: 0.002,
        event: ImpulseEvent::Burst { amplitude: 0.8, length_ms: 4.0 },
    };
    c.bench_function("sparse_4s", |b| {
        b.iter(|| noise::sparse(black_box(&mut buf), &mut rng, SR, &crackle))
    });
}

fn bench_filter(c: &mut Criterion) {
    let mut buf = vec![0.0f32; LEN];
    let mut rng = StdRng::seed_from_u64(7);
    noise::white(&mut buf, &mut rng);

    c.bench_function("bandpass_looped_4s", |b| {
        b.iter(|| {
            let mut stage = FilterStage::new(FilterSpec::bandpass(800.0, 0.5), SR);
            stage.apply_looped(black_box(&mut buf));
        })
    });
}

criterion_group!(benches, bench_colors, bench_filter);
criterion_main!(benches);
