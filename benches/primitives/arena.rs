//! Benchmarks for arena allocation and coalescing.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use voxpool::{Arena, Lease};

pub fn bench_arena(c: &mut Criterion) {
    let mut group = c.benchmark_group("primitives/arena");

    for &size in &[16usize, 256, 4096] {
        let mut memory = vec![0u8; 1 << 20];
        let mut arena = Arena::new(&mut memory).unwrap();

        group.bench_with_input(BenchmarkId::new("alloc_free", size), &size, |b, &size| {
            b.iter(|| {
                let lease = arena.alloc(black_box(size)).unwrap();
                arena.free(lease).unwrap();
            })
        });
    }

    // Fragmented free list: every other block free, so first fit has to walk.
    for &blocks in &[16usize, 128, 1024] {
        let mut memory = vec![0u8; 1 << 20];
        let mut arena = Arena::new(&mut memory).unwrap();

        let mut leases: Vec<Option<Lease>> = (0..blocks)
            .map(|_| arena.alloc(64).ok())
            .collect();
        for slot in leases.iter_mut().step_by(2) {
            if let Some(lease) = slot.take() {
                arena.free(lease).unwrap();
            }
        }

        group.bench_with_input(
            BenchmarkId::new("alloc_free_fragmented", blocks),
            &blocks,
            |b, _| {
                b.iter(|| {
                    let lease = arena.alloc(black_box(256)).unwrap();
                    arena.free(lease).unwrap();
                })
            },
        );
    }

    group.bench_function("calloc_4k", |b| {
        let mut memory = vec![0u8; 1 << 16];
        let mut arena = Arena::new(&mut memory).unwrap();
        b.iter(|| {
            let lease = arena.calloc(black_box(4096)).unwrap();
            arena.free(lease).unwrap();
        })
    });

    group.finish();
}
