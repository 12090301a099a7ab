//! Process-wide settings and the default arena.
//!
//! A host builds one [`ProcessContext`] at startup and passes it by reference
//! to every constructor that needs a sample rate or memory. There is no global
//! instance.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    error::{ArenaError, ErrorKind},
    mem::{Arena, ArenaBuf, Lease, Pod},
};

/// Source of uniform random numbers in `[0, 1)`.
pub trait RandomSource: Send {
    fn next_f32(&mut self) -> f32;
}

impl<F> RandomSource for F
where
    F: FnMut() -> f32 + Send,
{
    fn next_f32(&mut self) -> f32 {
        self()
    }
}

/// Static configuration for a processing session.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessConfig {
    pub sample_rate: f32,
    pub block_size: usize,
    /// Zero every block handed out by `alloc`, not just by `calloc`.
    pub clear_on_allocation: bool,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000.0,
            block_size: 128,
            clear_on_allocation: false,
        }
    }
}

/// Sample rate, block size, randomness and the default arena for one session.
pub struct ProcessContext<'buf, R: RandomSource = fn() -> f32> {
    config: ProcessConfig,
    inv_sample_rate: f32,
    two_pi_inv_sample_rate: f32,
    random: R,
    arena: Arena<'buf>,
    errors: ErrorKind,
    on_error: Option<fn(ErrorKind)>,
}

impl<'buf, R: RandomSource> ProcessContext<'buf, R> {
    /// Build a context whose default arena spans `memory`.
    pub fn new(config: ProcessConfig, memory: &'buf mut [u8], random: R) -> Result<Self, ArenaError> {
        let mut arena = Arena::new(memory)?;
        arena.set_clear_on_allocation(config.clear_on_allocation);

        log::debug!(
            "process context: {} Hz, block {}, {} byte arena",
            config.sample_rate,
            config.block_size,
            arena.capacity()
        );

        let mut ctx = Self {
            config,
            inv_sample_rate: 0.0,
            two_pi_inv_sample_rate: 0.0,
            random,
            arena,
            errors: ErrorKind::NONE,
            on_error: None,
        };
        ctx.set_sample_rate(config.sample_rate);
        Ok(ctx)
    }

    pub fn config(&self) -> &ProcessConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> f32 {
        self.config.sample_rate
    }

    pub fn inv_sample_rate(&self) -> f32 {
        self.inv_sample_rate
    }

    pub fn two_pi_inv_sample_rate(&self) -> f32 {
        self.two_pi_inv_sample_rate
    }

    pub fn block_size(&self) -> usize {
        self.config.block_size
    }

    /// Change the session sample rate. Units built earlier keep their cached
    /// rate until their own `set_sample_rate` is called.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        let sample_rate = sample_rate.max(1.0);
        self.config.sample_rate = sample_rate;
        self.inv_sample_rate = 1.0 / sample_rate;
        self.two_pi_inv_sample_rate = std::f32::consts::TAU * self.inv_sample_rate;
    }

    pub fn set_block_size(&mut self, block_size: usize) {
        self.config.block_size = block_size;
    }

    pub fn set_clear_on_allocation(&mut self, clear: bool) {
        self.config.clear_on_allocation = clear;
        self.arena.set_clear_on_allocation(clear);
    }

    /// Next value from the host-supplied random source.
    pub fn random(&mut self) -> f32 {
        self.random.next_f32()
    }

    pub fn arena(&self) -> &Arena<'buf> {
        &self.arena
    }

    pub fn arena_mut(&mut self) -> &mut Arena<'buf> {
        &mut self.arena
    }

    /// Install a hook that runs on every reported error.
    pub fn set_error_handler(&mut self, handler: fn(ErrorKind)) {
        self.on_error = Some(handler);
    }

    /// Every error kind reported since the last [`clear_errors`](Self::clear_errors).
    pub fn errors(&self) -> ErrorKind {
        self.errors
    }

    pub fn clear_errors(&mut self) {
        self.errors = ErrorKind::NONE;
    }

    /// Record an error: sticky flag, log line, then the user hook if any.
    pub fn report(&mut self, err: &ArenaError) {
        let kind = err.kind();
        self.errors.insert(kind);
        log::error!("{err}");
        if let Some(handler) = self.on_error {
            handler(kind);
        }
    }

    /// Allocate from the default arena, reporting failures.
    pub fn alloc(&mut self, size: usize) -> Result<Lease<'buf>, ArenaError> {
        let result = self.arena.alloc(size);
        self.track(result)
    }

    /// Allocate zeroed bytes from the default arena, reporting failures.
    pub fn calloc(&mut self, size: usize) -> Result<Lease<'buf>, ArenaError> {
        let result = self.arena.calloc(size);
        self.track(result)
    }

    pub fn free(&mut self, lease: Lease<'buf>) -> Result<(), ArenaError> {
        let result = self.arena.free(lease);
        self.track(result)
    }

    pub fn alloc_buf<T: Pod>(&mut self, len: usize) -> Result<ArenaBuf<'buf, T>, ArenaError> {
        let result = self.arena.alloc_buf(len);
        self.track(result)
    }

    pub fn calloc_buf<T: Pod>(&mut self, len: usize) -> Result<ArenaBuf<'buf, T>, ArenaError> {
        let result = self.arena.calloc_buf(len);
        self.track(result)
    }

    pub fn free_buf<T: Pod>(&mut self, buf: ArenaBuf<'buf, T>) -> Result<(), ArenaError> {
        let result = self.arena.free_buf(buf);
        self.track(result)
    }

    fn track<T>(&mut self, result: Result<T, ArenaError>) -> Result<T, ArenaError> {
        if let Err(err) = &result {
            self.report(err);
        }
        result
    }
}
