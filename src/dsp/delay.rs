//! Integer-sample delay line with an arena-backed buffer.
//!
//! This is the shape every unit follows: `construct` takes its memory from an
//! arena, `destroy` gives it back, and nothing in between allocates.

use crate::{
    context::{ProcessContext, RandomSource},
    error::ArenaError,
    mem::{Arena, ArenaBuf},
};

pub struct DelayLine<'buf> {
    buffer: ArenaBuf<'buf, f32>,
    write_pos: usize,
}

impl<'buf> DelayLine<'buf> {
    /// Build a delay line holding up to `max_samples - 1` samples of delay.
    pub fn construct(max_samples: usize, arena: &mut Arena<'buf>) -> Result<Self, ArenaError> {
        let buffer = arena.calloc_buf::<f32>(max_samples.max(1))?;
        Ok(Self {
            buffer,
            write_pos: 0,
        })
    }

    /// [`construct`](Self::construct) from the context's default arena.
    pub fn new<R: RandomSource>(
        max_samples: usize,
        ctx: &mut ProcessContext<'buf, R>,
    ) -> Result<Self, ArenaError> {
        let result = Self::construct(max_samples, ctx.arena_mut());
        if let Err(err) = &result {
            ctx.report(err);
        }
        result
    }

    pub fn destroy(self, arena: &mut Arena<'buf>) -> Result<(), ArenaError> {
        arena.free_buf(self.buffer)
    }

    pub fn max_delay(&self) -> usize {
        self.buffer.len() - 1
    }

    pub fn next_sample(&mut self, sample: f32, delay_samples: usize) -> f32 {
        let len = self.buffer.len();
        let delay_samples = delay_samples.min(len - 1);

        self.buffer[self.write_pos] = sample;

        let read_pos = (self.write_pos + len - delay_samples) % len;
        let delayed = self.buffer[read_pos];

        self.write_pos = (self.write_pos + 1) % len;

        delayed
    }

    pub fn render(&mut self, buffer: &mut [f32], delay_samples: usize) {
        for sample in buffer.iter_mut() {
            *sample = self.next_sample(*sample, delay_samples);
        }
    }

    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}
