//! Voice allocator work per audio block.
//!
//! `poly_tick` is the steady-state cost: every voice gliding, ticked once per
//! sample. `note_storm` hammers note-on/off with more notes than voices so
//! every other event steals or re-adopts.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use voxpool::{Arena, Poly};

use crate::BLOCK_SIZES;

pub fn bench_poly_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/poly_tick");

    for &voices in &[4usize, 16, 64] {
        for &size in BLOCK_SIZES {
            let mut memory = vec![0u8; 1 << 16];
            let mut arena = Arena::new(&mut memory).unwrap();
            let mut poly = Poly::construct(voices, 48_000.0, &mut arena).unwrap();
            poly.set_pitch_glide_active(true);
            poly.set_pitch_glide_time(200.0);

            for v in 0..voices {
                poly.note_on(36 + v as u8, 100);
            }

            group.bench_with_input(
                BenchmarkId::new(format!("{voices}_voices"), size),
                &size,
                |b, &size| {
                    b.iter(|| {
                        let mut acc = 0.0f32;
                        for _ in 0..size {
                            poly.tick();
                            acc += poly.pitch(0);
                        }
                        black_box(acc)
                    })
                },
            );
        }
    }

    group.finish();
}

pub fn bench_note_storm(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/note_storm");

    for &voices in &[2usize, 8, 32] {
        let mut memory = vec![0u8; 1 << 16];
        let mut arena = Arena::new(&mut memory).unwrap();
        let mut poly = Poly::construct(voices, 48_000.0, &mut arena).unwrap();

        // Three times as many notes as voices.
        let notes: Vec<u8> = (0..(voices * 3).min(128)).map(|n| n as u8).collect();

        group.bench_with_input(BenchmarkId::new("voices", voices), &voices, |b, _| {
            b.iter(|| {
                for &note in &notes {
                    black_box(poly.note_on(note, 100));
                }
                for &note in notes.iter().rev() {
                    black_box(poly.note_off(note));
                }
            })
        });
    }

    group.finish();
}
