//! Linear glide ramp for pitch and other control values.

/*
Glide Ramp
==========

A ramp moves a control value toward a target in a straight line over a
fixed time, instead of jumping. The voice allocator keeps one per voice for
portamento and one more for pitch bend.

Vocabulary
----------

  curr              The value the ramp is outputting right now.

  dest              Where it's heading.

  time              How long (in milliseconds) a move from curr to dest
                    takes. Retargeting mid-glide restarts the clock from the
                    current value, so every move takes `time`, not the rest
                    of the old one.

  samples_per_tick  How many samples one tick stands for. A ramp ticked once
                    per 64-sample block uses 64 so the glide still lasts
                    `time` milliseconds.

  inc               Per-tick step, derived from the above.


The Math
--------

    samples for the move   = time_ms * sample_rate / 1000
    inc (per tick)         = (dest - curr) / samples * samples_per_tick

Written with the cached inverse:

    inv_sr_ms = 1 / (sample_rate * 0.001)
    inc       = (dest - curr) / time * inv_sr_ms * samples_per_tick

Once curr reaches or passes dest it snaps to dest and inc drops to zero, so
a ramp at rest is exact and costs one add per tick.


Minimum Time
------------

A time shorter than one tick can't be represented. It's clamped to

    minimum_time = inv_sr_ms * samples_per_tick

which makes the ramp arrive in exactly one tick.
*/

use crate::mem::Pod;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ramp {
    inv_sr_ms: f32,
    minimum_time: f32,
    curr: f32,
    dest: f32,
    time: f32,
    inc: f32,
    samples_per_tick: f32,
}

// SAFETY: seven f32 fields, repr(C), no padding; any bit pattern is a valid f32.
unsafe impl Pod for Ramp {}

impl Ramp {
    pub fn new(time_ms: f32, samples_per_tick: usize, sample_rate: f32) -> Self {
        let inv_sr_ms = 1.0 / (sample_rate.max(1.0) * 0.001);
        let samples_per_tick = samples_per_tick.max(1) as f32;
        let minimum_time = inv_sr_ms * samples_per_tick;

        Self {
            inv_sr_ms,
            minimum_time,
            curr: 0.0,
            dest: 0.0,
            time: time_ms.max(minimum_time),
            inc: 0.0,
            samples_per_tick,
        }
    }

    pub fn set_time(&mut self, time_ms: f32) {
        self.time = time_ms.max(self.minimum_time);
        self.update_inc();
    }

    /// Start gliding toward `dest` from wherever the ramp is now.
    pub fn set_dest(&mut self, dest: f32) {
        self.dest = dest;
        self.update_inc();
    }

    /// Jump to `value` immediately. The ramp keeps heading for its old dest.
    pub fn set_val(&mut self, value: f32) {
        self.curr = value;
        self.update_inc();
    }

    pub fn set_samples_per_tick(&mut self, samples_per_tick: usize) {
        self.samples_per_tick = samples_per_tick.max(1) as f32;
        self.minimum_time = self.inv_sr_ms * self.samples_per_tick;
        self.time = self.time.max(self.minimum_time);
        self.update_inc();
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.inv_sr_ms = 1.0 / (sample_rate.max(1.0) * 0.001);
        self.minimum_time = self.inv_sr_ms * self.samples_per_tick;
        self.time = self.time.max(self.minimum_time);
        self.update_inc();
    }

    /// Advance one tick and return the new value.
    #[inline]
    pub fn tick(&mut self) -> f32 {
        self.curr += self.inc;

        if (self.inc > 0.0 && self.curr >= self.dest) || (self.inc < 0.0 && self.curr <= self.dest) {
            self.curr = self.dest;
            self.inc = 0.0;
        }

        self.curr
    }

    /// Current value without advancing.
    #[inline]
    pub fn sample(&self) -> f32 {
        self.curr
    }

    pub fn dest(&self) -> f32 {
        self.dest
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn is_settled(&self) -> bool {
        self.inc == 0.0
    }

    fn update_inc(&mut self) {
        self.inc = (self.dest - self.curr) / self.time * self.inv_sr_ms * self.samples_per_tick;
    }
}
