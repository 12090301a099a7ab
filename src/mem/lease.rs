//! Owned handles to arena allocations.

use std::{
    fmt,
    marker::PhantomData,
    ops::{Deref, DerefMut},
    ptr::NonNull,
};

/// Plain-old-data element types that can live in an [`ArenaBuf`].
///
/// # Safety
///
/// Implementors must be valid for every bit pattern (arena memory is handed
/// out without clearing unless asked to), contain no padding bytes, hold no
/// pointers or references, need no `Drop`, and have an alignment of at most
/// [`ALIGN`](super::arena::ALIGN).
pub unsafe trait Pod: Copy + Send + Sync + 'static {}

unsafe impl Pod for u8 {}
unsafe impl Pod for i8 {}
unsafe impl Pod for u16 {}
unsafe impl Pod for i16 {}
unsafe impl Pod for u32 {}
unsafe impl Pod for i32 {}
unsafe impl Pod for u64 {}
unsafe impl Pod for i64 {}
unsafe impl Pod for f32 {}
unsafe impl Pod for f64 {}

/// An allocation handed out by an [`Arena`](super::Arena).
///
/// A lease owns its bytes exclusively until it is passed back to
/// [`Arena::free`](super::Arena::free). Dropping a lease without freeing it
/// leaks the block for the rest of the arena's life.
pub struct Lease<'buf> {
    ptr: NonNull<u8>,
    offset: usize,
    len: usize,
    arena: u32,
    _marker: PhantomData<&'buf mut [u8]>,
}

// A lease is a unique handle to a disjoint byte range, like a `Box<[u8]>`.
unsafe impl Send for Lease<'_> {}
unsafe impl Sync for Lease<'_> {}

impl<'buf> Lease<'buf> {
    /// # Safety
    ///
    /// `ptr` must point at `len` initialised bytes that nothing else
    /// references for `'buf`, aligned to the arena alignment.
    pub(crate) unsafe fn from_raw(ptr: NonNull<u8>, offset: usize, len: usize, arena: u32) -> Self {
        Self {
            ptr,
            offset,
            len,
            arena,
            _marker: PhantomData,
        }
    }

    /// Byte offset of the payload from the start of the owning arena.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Requested size in bytes. The block behind it may be slightly larger.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn arena_id(&self) -> u32 {
        self.arena
    }

    pub(crate) fn as_ptr(&self) -> NonNull<u8> {
        self.ptr
    }
}

impl Deref for Lease<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        // SAFETY: the lease owns `len` initialised bytes at `ptr` for 'buf.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl DerefMut for Lease<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        // SAFETY: as above, and `&mut self` guarantees exclusivity.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl fmt::Debug for Lease<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("offset", &self.offset)
            .field("len", &self.len)
            .field("arena", &self.arena)
            .finish()
    }
}

/// A typed, fixed-length buffer drawn from an arena.
///
/// This is what DSP units hold instead of a `Vec`: the length is fixed at
/// construction and the memory goes back through
/// [`Arena::free_buf`](super::Arena::free_buf).
pub struct ArenaBuf<'buf, T: Pod> {
    lease: Lease<'buf>,
    len: usize,
    _elem: PhantomData<T>,
}

impl<'buf, T: Pod> ArenaBuf<'buf, T> {
    /// Caller guarantees the lease is at least `len * size_of::<T>()` bytes
    /// and aligned for `T`.
    pub(crate) fn from_lease(lease: Lease<'buf>, len: usize) -> Self {
        debug_assert!(lease.len() >= len * std::mem::size_of::<T>());
        debug_assert_eq!(lease.as_ptr().as_ptr() as usize % std::mem::align_of::<T>(), 0);
        Self {
            lease,
            len,
            _elem: PhantomData,
        }
    }

    pub fn into_lease(self) -> Lease<'buf> {
        self.lease
    }

    pub fn lease(&self) -> &Lease<'buf> {
        &self.lease
    }
}

impl<T: Pod> Deref for ArenaBuf<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        // SAFETY: the lease covers `len` elements, is aligned for T, and every
        // bit pattern is a valid T (Pod contract).
        unsafe { std::slice::from_raw_parts(self.lease.as_ptr().as_ptr().cast::<T>(), self.len) }
    }
}

impl<T: Pod> DerefMut for ArenaBuf<'_, T> {
    fn deref_mut(&mut self) -> &mut [T] {
        // SAFETY: as above; T has no padding so writes keep the bytes initialised.
        unsafe {
            std::slice::from_raw_parts_mut(self.lease.as_ptr().as_ptr().cast::<T>(), self.len)
        }
    }
}

impl<T: Pod + fmt::Debug> fmt::Debug for ArenaBuf<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArenaBuf")
            .field("offset", &self.lease.offset())
            .field("items", &&self[..])
            .finish()
    }
}
