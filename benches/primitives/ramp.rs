//! Benchmarks for glide ramps.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use voxpool::Ramp;

use crate::BLOCK_SIZES;

pub fn bench_ramp(c: &mut Criterion) {
    let mut group = c.benchmark_group("primitives/ramp");

    for &size in BLOCK_SIZES {
        let mut ramp = Ramp::new(50.0, 1, 48_000.0);
        let mut target = 0.0f32;

        group.bench_with_input(BenchmarkId::new("tick", size), &size, |b, &size| {
            b.iter(|| {
                // Keep it moving so we never time the settled fast path only.
                target = if target > 60.0 { 0.0 } else { target + 12.0 };
                ramp.set_dest(target);
                let mut acc = 0.0f32;
                for _ in 0..size {
                    acc += ramp.tick();
                }
                black_box(acc)
            })
        });
    }

    group.finish();
}
