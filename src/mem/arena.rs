use std::{
    marker::PhantomData,
    ptr::NonNull,
    sync::atomic::{AtomicU32, Ordering},
};

use super::lease::{ArenaBuf, Lease, Pod};
use crate::error::ArenaError;

/// Every block payload starts on this boundary and every size is a multiple of it.
pub const ALIGN: usize = 8;

/// In-buffer block header: size, next, prev, tag.
pub const HEADER_SIZE: usize = 32;

const NIL: u64 = u64::MAX;
const TAG_FREE: u64 = 0x6672_6565_626c_6b00;
const TAG_LIVE: u64 = 0x6c69_7665_626c_6b00;

static NEXT_ARENA_ID: AtomicU32 = AtomicU32::new(1);

#[inline]
fn align_up(size: usize) -> Option<usize> {
    Some(size.checked_add(ALIGN - 1)? & !(ALIGN - 1))
}

#[derive(Debug, Clone, Copy)]
struct Header {
    size: usize,
    next: Option<usize>,
    prev: Option<usize>,
    tag: u64,
}

fn link(raw: u64) -> Option<usize> {
    (raw != NIL).then_some(raw as usize)
}

fn unlink_raw(offset: Option<usize>) -> u64 {
    offset.map_or(NIL, |o| o as u64)
}

/// Snapshot of an arena's accounting, for diagnostics and tests.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaStats {
    /// Length of the backing buffer.
    pub capacity: usize,
    /// Bytes held by live blocks, headers included.
    pub used: usize,
    /// Payload bytes sitting on the free list.
    pub free: usize,
    /// Free-block headers plus alignment slack at both ends of the buffer.
    pub overhead: usize,
    pub free_blocks: usize,
    pub largest_free: usize,
}

/// Fixed-capacity first-fit allocator over a caller-supplied byte buffer.
pub struct Arena<'buf> {
    base: NonNull<u8>,
    /// Bytes from `base` covered by blocks; a multiple of `ALIGN`.
    span: usize,
    capacity: usize,
    id: u32,
    used: usize,
    head: Option<usize>,
    clear_on_allocation: bool,
    origin: Option<Lease<'buf>>,
    _marker: PhantomData<&'buf mut [u8]>,
}

// The arena is the sole owner of its headers; payloads belong to leases.
unsafe impl Send for Arena<'_> {}

impl<'buf> Arena<'buf> {
    /// Smallest buffer guaranteed to hold one header and one aligned word.
    pub const MIN_CAPACITY: usize = HEADER_SIZE + 2 * ALIGN - 1;

    /// Wrap `buffer` as an arena with a single free block spanning it.
    pub fn new(buffer: &'buf mut [u8]) -> Result<Self, ArenaError> {
        let capacity = buffer.len();
        let start = buffer.as_mut_ptr();
        let pad = start.align_offset(ALIGN);
        let too_small = ArenaError::TooSmall {
            capacity,
            minimum: Self::MIN_CAPACITY,
        };

        if pad > capacity || capacity - pad < HEADER_SIZE + ALIGN {
            return Err(too_small);
        }

        let span = (capacity - pad) & !(ALIGN - 1);
        // SAFETY: pad < capacity, so the aligned start is inside the buffer.
        let base = unsafe { NonNull::new_unchecked(start.add(pad)) };

        Ok(Self::init(base, span, capacity, None))
    }

    /// Carve a child arena of `size` bytes out of `parent`.
    ///
    /// The child's buffer is one ordinary allocation of the parent. Hand it
    /// back with [`free_nested`](Self::free_nested) once the child is empty.
    pub fn nested(parent: &mut Arena<'buf>, size: usize) -> Result<Self, ArenaError> {
        if size < HEADER_SIZE + ALIGN {
            return Err(ArenaError::TooSmall {
                capacity: size,
                minimum: HEADER_SIZE + ALIGN,
            });
        }

        let lease = parent.calloc(size)?;
        let base = lease.as_ptr();
        let span = size & !(ALIGN - 1);

        log::debug!(
            "nested arena of {size} bytes carved from arena {} at offset {}",
            parent.id,
            lease.offset()
        );

        Ok(Self::init(base, span, size, Some(lease)))
    }

    fn init(base: NonNull<u8>, span: usize, capacity: usize, origin: Option<Lease<'buf>>) -> Self {
        // SAFETY: `base..base+span` is inside memory exclusively borrowed for 'buf.
        unsafe { std::ptr::write_bytes(base.as_ptr(), 0, span) };

        let mut arena = Self {
            base,
            span,
            capacity,
            id: NEXT_ARENA_ID.fetch_add(1, Ordering::Relaxed),
            used: 0,
            head: Some(0),
            clear_on_allocation: false,
            origin,
            _marker: PhantomData,
        };

        arena.store(
            0,
            Header {
                size: span - HEADER_SIZE,
                next: None,
                prev: None,
                tag: TAG_FREE,
            },
        );

        log::debug!(
            "arena {} created: {capacity} bytes, {} usable",
            arena.id,
            span - HEADER_SIZE
        );

        arena
    }

    /// Give back the parent lease of a nested arena.
    ///
    /// Fails (returning the arena unchanged) while allocations are still
    /// live in it, or if this arena was built directly over a buffer.
    pub fn into_lease(mut self) -> Result<Lease<'buf>, Self> {
        if self.used > 0 {
            return Err(self);
        }
        match self.origin.take() {
            Some(lease) => Ok(lease),
            None => Err(self),
        }
    }

    /// Return an empty nested arena's memory to this arena.
    ///
    /// A child that still has live allocations is refused with `InUse` and
    /// its region stays allocated here, so outstanding leases stay valid.
    pub fn free_nested(&mut self, child: Arena<'buf>) -> Result<(), ArenaError> {
        match child.into_lease() {
            Ok(lease) => self.free(lease),
            Err(child) => {
                log::warn!(
                    "refusing to free nested arena {} with {} bytes live",
                    child.id,
                    child.used
                );
                Err(ArenaError::InUse { used: child.used })
            }
        }
    }

    pub fn set_clear_on_allocation(&mut self, clear: bool) {
        self.clear_on_allocation = clear;
    }

    pub fn clear_on_allocation(&self) -> bool {
        self.clear_on_allocation
    }

    /// Allocate `size` bytes. Contents are whatever the block last held
    /// unless clear-on-allocation is enabled.
    pub fn alloc(&mut self, size: usize) -> Result<Lease<'buf>, ArenaError> {
        let mut lease = self.take_block(size)?;
        if self.clear_on_allocation {
            lease.fill(0);
        }
        Ok(lease)
    }

    /// Allocate `size` zeroed bytes.
    pub fn calloc(&mut self, size: usize) -> Result<Lease<'buf>, ArenaError> {
        let mut lease = self.take_block(size)?;
        lease.fill(0);
        Ok(lease)
    }

    /// Return a lease to the free list, merging it with adjacent free blocks.
    pub fn free(&mut self, lease: Lease<'buf>) -> Result<(), ArenaError> {
        let header_offset = self.validate(&lease).map_err(|err| {
            log::warn!("arena {}: {err}", self.id);
            err
        })?;

        let header = self.load(header_offset);
        self.used -= HEADER_SIZE + header.size;

        let mut freed = header_offset;
        let mut freed_size = header.size;
        let mut cursor = self.head;

        while let Some(other) = cursor {
            let other_header = self.load(other);
            cursor = other_header.next;

            if freed + HEADER_SIZE + freed_size == other {
                // Free neighbour directly after: absorb it.
                self.unlink(&other_header);
                self.set_tag(other, 0);
                freed_size += HEADER_SIZE + other_header.size;
            } else if other + HEADER_SIZE + other_header.size == freed {
                // Free neighbour directly before: it absorbs us.
                self.unlink(&other_header);
                self.set_tag(freed, 0);
                freed_size += HEADER_SIZE + other_header.size;
                freed = other;
            }
        }

        self.push_front(freed, freed_size);
        Ok(())
    }

    /// Allocate a typed buffer of `len` elements.
    pub fn alloc_buf<T: Pod>(&mut self, len: usize) -> Result<ArenaBuf<'buf, T>, ArenaError> {
        let bytes = Self::buf_bytes::<T>(len)?;
        Ok(ArenaBuf::from_lease(self.alloc(bytes)?, len))
    }

    /// Allocate a typed buffer of `len` zeroed elements.
    pub fn calloc_buf<T: Pod>(&mut self, len: usize) -> Result<ArenaBuf<'buf, T>, ArenaError> {
        let bytes = Self::buf_bytes::<T>(len)?;
        Ok(ArenaBuf::from_lease(self.calloc(bytes)?, len))
    }

    pub fn free_buf<T: Pod>(&mut self, buf: ArenaBuf<'buf, T>) -> Result<(), ArenaError> {
        self.free(buf.into_lease())
    }

    /// Give back what a half-built unit already took, then hand `err` on.
    pub(crate) fn unwind<const N: usize>(
        &mut self,
        err: ArenaError,
        leases: [Lease<'buf>; N],
    ) -> ArenaError {
        for lease in leases {
            if let Err(free_err) = self.free(lease) {
                log::warn!("arena {}: unwind failed: {free_err}", self.id);
            }
        }
        err
    }

    fn buf_bytes<T: Pod>(len: usize) -> Result<usize, ArenaError> {
        let align = std::mem::align_of::<T>();
        if align > ALIGN {
            return Err(ArenaError::Unaligned { align, max: ALIGN });
        }
        len.checked_mul(std::mem::size_of::<T>())
            .ok_or(ArenaError::Overrun {
                requested: usize::MAX,
                largest_free: 0,
            })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes held by live blocks, including their headers.
    pub fn used_bytes(&self) -> usize {
        self.used
    }

    /// Payload bytes on the free list.
    pub fn free_bytes(&self) -> usize {
        self.free_list().map(|(_, h)| h.size).sum()
    }

    pub fn stats(&self) -> ArenaStats {
        let mut free = 0;
        let mut free_blocks = 0;
        let mut largest_free = 0;
        for (_, header) in self.free_list() {
            free += header.size;
            free_blocks += 1;
            largest_free = largest_free.max(header.size);
        }

        ArenaStats {
            capacity: self.capacity,
            used: self.used,
            free,
            overhead: (self.capacity - self.span) + free_blocks * HEADER_SIZE,
            free_blocks,
            largest_free,
        }
    }

    /// Walk every block in address order and check the bookkeeping.
    ///
    /// Blocks must tile the arena exactly, carry a valid tag, never sit next
    /// to another free block, and match the free list one to one.
    pub fn is_consistent(&self) -> bool {
        let mut offset = 0;
        let mut live = 0;
        let mut free_in_walk = 0;
        let mut previous_free = false;

        while offset < self.span {
            if offset + HEADER_SIZE > self.span {
                return false;
            }
            let header = self.load(offset);
            match header.tag {
                TAG_LIVE => {
                    live += HEADER_SIZE + header.size;
                    previous_free = false;
                }
                TAG_FREE => {
                    if previous_free {
                        return false;
                    }
                    free_in_walk += 1;
                    previous_free = true;
                }
                _ => return false,
            }
            offset += HEADER_SIZE + header.size;
        }

        offset == self.span && live == self.used && free_in_walk == self.free_list().count()
    }

    fn take_block(&mut self, requested: usize) -> Result<Lease<'buf>, ArenaError> {
        let Some(size) = align_up(requested.max(1)) else {
            let err = ArenaError::Overrun {
                requested,
                largest_free: self.stats().largest_free,
            };
            log::warn!("arena {}: {err}", self.id);
            return Err(err);
        };

        let mut cursor = self.head;
        let (offset, mut header) = loop {
            match cursor {
                Some(offset) => {
                    let header = self.load(offset);
                    if header.size >= size {
                        break (offset, header);
                    }
                    cursor = header.next;
                }
                None => {
                    let err = self.fit_error(size);
                    log::warn!("arena {}: {err}", self.id);
                    return Err(err);
                }
            }
        };

        let leftover = header.size - size;
        if leftover > HEADER_SIZE {
            // Split: the tail stays on the free list in our place.
            let tail = offset + HEADER_SIZE + size;
            self.store(
                tail,
                Header {
                    size: leftover - HEADER_SIZE,
                    next: header.next,
                    prev: header.prev,
                    tag: TAG_FREE,
                },
            );
            match header.prev {
                Some(prev) => self.set_next(prev, Some(tail)),
                None => self.head = Some(tail),
            }
            if let Some(next) = header.next {
                self.set_prev(next, Some(tail));
            }
            header.size = size;
        } else {
            // Too small to hold another header: hand out the whole block.
            self.unlink(&header);
        }

        header.next = None;
        header.prev = None;
        header.tag = TAG_LIVE;
        self.store(offset, header);
        self.used += HEADER_SIZE + header.size;

        let payload = offset + HEADER_SIZE;
        // SAFETY: the payload lies inside the span and was just removed from
        // the free list, so no other lease covers it.
        Ok(unsafe {
            Lease::from_raw(
                NonNull::new_unchecked(self.base.as_ptr().add(payload)),
                payload,
                requested,
                self.id,
            )
        })
    }

    fn fit_error(&self, size: usize) -> ArenaError {
        let stats = self.stats();
        if stats.free >= size {
            ArenaError::Fragmentation {
                requested: size,
                total_free: stats.free,
                largest_free: stats.largest_free,
            }
        } else {
            ArenaError::Overrun {
                requested: size,
                largest_free: stats.largest_free,
            }
        }
    }

    /// Header offset for a lease this arena really handed out, else `InvalidFree`.
    fn validate(&self, lease: &Lease<'buf>) -> Result<usize, ArenaError> {
        let payload = lease.offset();
        let invalid = ArenaError::InvalidFree { offset: payload };

        if lease.arena_id() != self.id
            || payload < HEADER_SIZE
            || payload > self.span
            || payload % ALIGN != 0
            || lease.as_ptr().as_ptr() as usize != self.base.as_ptr() as usize + payload
        {
            return Err(invalid);
        }

        let header_offset = payload - HEADER_SIZE;
        let header = self.load(header_offset);
        if header.tag != TAG_LIVE || header.size < lease.len() {
            return Err(invalid);
        }

        Ok(header_offset)
    }

    fn free_list(&self) -> impl Iterator<Item = (usize, Header)> + '_ {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            let offset = cursor?;
            let header = self.load(offset);
            cursor = header.next;
            Some((offset, header))
        })
    }

    fn push_front(&mut self, offset: usize, size: usize) {
        self.store(
            offset,
            Header {
                size,
                next: self.head,
                prev: None,
                tag: TAG_FREE,
            },
        );
        if let Some(head) = self.head {
            self.set_prev(head, Some(offset));
        }
        self.head = Some(offset);
    }

    fn unlink(&mut self, header: &Header) {
        match header.prev {
            Some(prev) => self.set_next(prev, header.next),
            None => self.head = header.next,
        }
        if let Some(next) = header.next {
            self.set_prev(next, header.prev);
        }
    }

    fn word(&self, offset: usize, field: usize) -> *mut u64 {
        debug_assert!(offset + HEADER_SIZE <= self.span);
        // SAFETY: offset + field * 8 stays within the header, inside the span.
        unsafe { self.base.as_ptr().add(offset + field * 8).cast::<u64>() }
    }

    fn read_word(&self, offset: usize, field: usize) -> u64 {
        // SAFETY: header words are never covered by a lease.
        unsafe { self.word(offset, field).read_unaligned() }
    }

    fn write_word(&mut self, offset: usize, field: usize, value: u64) {
        // SAFETY: as in read_word; `&mut self` serialises header writes.
        unsafe { self.word(offset, field).write_unaligned(value) }
    }

    fn load(&self, offset: usize) -> Header {
        Header {
            size: self.read_word(offset, 0) as usize,
            next: link(self.read_word(offset, 1)),
            prev: link(self.read_word(offset, 2)),
            tag: self.read_word(offset, 3),
        }
    }

    fn store(&mut self, offset: usize, header: Header) {
        self.write_word(offset, 0, header.size as u64);
        self.write_word(offset, 1, unlink_raw(header.next));
        self.write_word(offset, 2, unlink_raw(header.prev));
        self.write_word(offset, 3, header.tag);
    }

    fn set_next(&mut self, offset: usize, next: Option<usize>) {
        self.write_word(offset, 1, unlink_raw(next));
    }

    fn set_prev(&mut self, offset: usize, prev: Option<usize>) {
        self.write_word(offset, 2, unlink_raw(prev));
    }

    fn set_tag(&mut self, offset: usize, tag: u64) {
        self.write_word(offset, 3, tag);
    }
}

impl std::fmt::Debug for Arena<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("id", &self.id)
            .field("capacity", &self.capacity)
            .field("used", &self.used)
            .field("nested", &self.origin.is_some())
            .finish()
    }
}
