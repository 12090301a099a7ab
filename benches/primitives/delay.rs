//! Benchmarks for the arena-backed delay line.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use voxpool::{dsp::DelayLine, Arena};

use crate::BLOCK_SIZES;

pub fn bench_delay(c: &mut Criterion) {
    let mut group = c.benchmark_group("primitives/delay");

    // 1 second at 48kHz.
    let mut memory = vec![0u8; 48_000 * 4 + 1024];
    let mut arena = Arena::new(&mut memory).unwrap();
    let mut delay = DelayLine::construct(48_000, &mut arena).unwrap();

    let delay_times: &[usize] = &[
        480,   // 10ms at 48kHz
        4800,  // 100ms at 48kHz
        47999, // just under 1 second
    ];

    for &size in BLOCK_SIZES {
        let input: Vec<f32> = (0..size).map(|i| (i as f32 * 0.1).sin()).collect();
        let mut buffer = input.clone();

        for &delay_samples in delay_times {
            let delay_ms = delay_samples as f32 / 48.0;
            group.bench_with_input(
                BenchmarkId::new(format!("render_{}ms", delay_ms as u32), size),
                &size,
                |b, _| {
                    b.iter(|| {
                        buffer.copy_from_slice(&input);
                        delay.render(black_box(&mut buffer), black_box(delay_samples));
                    })
                },
            );
        }
    }

    group.finish();
}
