//! Low-level DSP primitives.
//!
//! Each unit takes its buffers from an [`Arena`](crate::mem::Arena) when it is
//! built and never allocates afterwards, so they're safe to tick from the
//! audio callback.

/// Integer-sample delay line.
pub mod delay;
/// Linear glide ramp.
pub mod ramp;

pub use delay::DelayLine;
pub use ramp::Ramp;
