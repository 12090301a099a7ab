//! Fixed-capacity memory arenas.
//!
//! Everything that needs storage beyond a handful of scalars draws it from an
//! [`Arena`] at construction time, so nothing allocates once audio is running.

/*
Arena Allocation
================

An arena wraps one byte buffer handed over by the host. It never grows,
never moves, and never gives memory back to the system allocator. Units
take their buffers from it when they are built and return them when they
are destroyed.

Vocabulary
----------

  block       A header followed by a payload. Blocks tile the arena exactly,
              back to back, from the first aligned byte to the last.

  header      32 bytes at the start of every block: payload size, free-list
              next, free-list prev, and a tag saying "free" or "live".

  free list   Doubly linked list of free blocks. Links are byte offsets into
              the arena, not addresses, and the list is NOT kept in address
              order: freed blocks go to the front.

  lease       The owned handle returned by alloc. Passing it back to free
              consumes it, so the same lease can't be freed twice.

  coalescing  Merging a freed block with the free blocks directly before and
              after it in memory.


Layout
------

    offset 0                                                        span
    ┌────────┬──────────┬────────┬──────────────┬────────┬──────────┐
    │ header │ payload  │ header │   payload    │ header │ payload  │
    │  live  │ (lease)  │  free  │   (unused)   │  live  │ (lease)  │
    └────────┴──────────┴────────┴──────────────┴────────┴──────────┘

Every payload offset and every size is a multiple of 8.


Allocation: First Fit
---------------------

alloc(n) rounds n up to 8 and walks the free list from the head, taking the
first block that is big enough:

    free block (size S)
    ┌────────┬──────────────────────────────────────┐
    │ header │                                      │
    └────────┴──────────────────────────────────────┘

    after alloc(n), when S - n > header size:
    ┌────────┬─────────┬────────┬───────────────────┐
    │ header │ n bytes │ header │  S - n - 32 bytes │
    │  live  │         │  free  │                   │
    └────────┴─────────┴────────┴───────────────────┘

If the remainder couldn't hold a header of its own, the whole block is
handed out instead. First fit keeps the search short; best fit would pack
tighter but scans the whole list every time.


Free and Coalescing
-------------------

free(lease) scans the free list once. A free block that ends where the freed
block starts swallows it; a free block that starts where the freed block
ends is swallowed by it. Since coalescing runs on every free, two free
blocks are never adjacent, so at most one of each can match.


Accounting
----------

    used + free + overhead == capacity

    used      headers and payloads of live blocks
    free      payloads of free blocks
    overhead  headers of free blocks, plus the bytes skipped to align the
              start and the odd tail bytes after the last 8-byte boundary

Allocation failures come back as Overrun (not enough free bytes in total)
or Fragmentation (enough in total, but not in one block). Blocks are never
moved, since units hold on to their leases for the whole session.
*/

pub mod arena;
pub mod lease;

pub use arena::{Arena, ArenaStats, ALIGN, HEADER_SIZE};
pub use lease::{ArenaBuf, Lease, Pod};
