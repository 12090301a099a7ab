pub mod context; // Sample rate, block size, default arena
pub mod dsp;
pub mod error;
pub mod io;
pub mod mem; // Fixed-capacity arenas
pub mod synth; // Voice allocation and note tracking

pub use context::{ProcessConfig, ProcessContext, RandomSource};
pub use dsp::Ramp;
pub use error::{ArenaError, ErrorKind};
pub use mem::{Arena, ArenaBuf, ArenaStats, Lease};
pub use synth::{NoteStack, Poly};
