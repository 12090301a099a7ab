//! Benchmarks for low-level building blocks.

mod arena;
mod delay;
mod ramp;

pub use arena::bench_arena;
pub use delay::bench_delay;
pub use ramp::bench_ramp;
