//! Benchmarks for audio-thread voice allocator workloads.

mod notes;

pub use notes::{bench_note_storm, bench_poly_tick};
