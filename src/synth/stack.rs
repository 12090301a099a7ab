//! Capacity-bounded note stack.

/*
Note Stack
==========

A short list of MIDI note numbers held in a fixed arena buffer. The voice
allocator keeps two of them:

  recency stack   Most recent note at index 0. Stealing walks it front to
                  back to find the latest note that still has a voice, and
                  re-adoption walks it the same way to find the latest note
                  that lost one.

  ordered stack   Kept in ascending pitch regardless of arrival order, for
                  arpeggiators and "lowest/highest note" queries.

Ordered insertion puts a note at the first slot whose left neighbour is
lower and whose right neighbour is higher (or missing). If no slot
qualifies, the note is lower than everything and goes to the front:

    [60, 64, 67]  add 62  →  [60, 62, 64, 67]
    [60, 64, 67]  add 72  →  [60, 64, 67, 72]
    [60, 64, 67]  add 48  →  [48, 60, 64, 67]

The arpeggiator cursor (`next`) walks from the oldest entry toward index 0
and wraps.
*/

use crate::{
    context::{ProcessContext, RandomSource},
    error::ArenaError,
    mem::{Arena, ArenaBuf, Lease},
};

pub struct NoteStack<'buf> {
    data: ArenaBuf<'buf, u8>,
    len: usize,
    capacity: usize,
    pos: usize,
    ordered: bool,
}

impl<'buf> NoteStack<'buf> {
    pub fn construct(capacity: usize, arena: &mut Arena<'buf>) -> Result<Self, ArenaError> {
        let capacity = capacity.max(1);
        let data = arena.calloc_buf::<u8>(capacity)?;
        Ok(Self {
            data,
            len: 0,
            capacity,
            pos: 0,
            ordered: false,
        })
    }

    pub fn new<R: RandomSource>(
        capacity: usize,
        ctx: &mut ProcessContext<'buf, R>,
    ) -> Result<Self, ArenaError> {
        let result = Self::construct(capacity, ctx.arena_mut());
        if let Err(err) = &result {
            ctx.report(err);
        }
        result
    }

    pub fn destroy(self, arena: &mut Arena<'buf>) -> Result<(), ArenaError> {
        arena.free(self.into_lease())
    }

    pub(crate) fn into_lease(self) -> Lease<'buf> {
        self.data.into_lease()
    }

    /// Keep entries in ascending order instead of most-recent-first.
    pub fn set_ordered(&mut self, ordered: bool) {
        self.ordered = ordered;
    }

    pub fn is_ordered(&self) -> bool {
        self.ordered
    }

    /// Insert `note`. Returns false if the stack is full.
    pub fn add(&mut self, note: u8) -> bool {
        if self.len >= self.capacity {
            return false;
        }

        let at = if self.ordered { self.ordered_slot(note) } else { 0 };

        self.data.copy_within(at..self.len, at + 1);
        self.data[at] = note;
        self.len += 1;
        true
    }

    /// Insert `note` unless it's already present. Returns whether it was added.
    pub fn add_if_absent(&mut self, note: u8) -> bool {
        self.contains(note).is_none() && self.add(note)
    }

    /// Remove `note`. Returns whether it was present.
    pub fn remove(&mut self, note: u8) -> bool {
        match self.contains(note) {
            Some(index) => {
                self.data.copy_within(index + 1..self.len, index);
                self.len -= 1;
                if self.pos >= self.len {
                    self.pos = 0;
                }
                true
            }
            None => false,
        }
    }

    /// Index of `note`, if present.
    pub fn contains(&self, note: u8) -> Option<usize> {
        self.iter().position(|n| n == note)
    }

    pub fn get(&self, index: usize) -> Option<u8> {
        (index < self.len).then(|| self.data[index])
    }

    /// Most recent note (or lowest, when ordered).
    pub fn first(&self) -> Option<u8> {
        self.get(0)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Shrink or grow the usable capacity within the allocated size.
    /// Entries past the new capacity are dropped.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.clamp(1, self.data.len());
        self.len = self.len.min(self.capacity);
        if self.pos >= self.capacity {
            self.pos = 0;
        }
    }

    pub fn clear(&mut self) {
        self.len = 0;
        self.pos = 0;
    }

    /// Step the arpeggiator cursor and return the note under it.
    pub fn next(&mut self) -> Option<u8> {
        if self.len == 0 {
            return None;
        }
        if self.pos > 0 && self.pos < self.len {
            self.pos -= 1;
        } else {
            self.pos = self.len - 1;
        }
        Some(self.data[self.pos])
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.data[..self.len].iter().copied()
    }

    fn ordered_slot(&self, note: u8) -> usize {
        (0..self.len)
            .find(|&j| {
                let right = self.get(j + 1);
                note > self.data[j] && right.map_or(true, |r| note < r)
            })
            .map_or(0, |j| j + 1)
    }
}

impl std::fmt::Debug for NoteStack<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
