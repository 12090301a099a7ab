//! Error types shared by the arena and the process context.

use thiserror::Error;

/// Failures reported by [`Arena`](crate::mem::Arena) operations.
///
/// `Overrun` and `Fragmentation` both mean "this allocation did not fit";
/// they differ only in whether compaction could have helped. Arenas never
/// move blocks, so callers treat them the same way (see [`is_overrun`]).
///
/// [`is_overrun`]: ArenaError::is_overrun
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ArenaError {
    #[error("arena overrun: requested {requested} bytes, largest free block is {largest_free}")]
    Overrun { requested: usize, largest_free: usize },

    #[error(
        "arena fragmented: requested {requested} bytes, {total_free} free in total \
         but largest block is {largest_free}"
    )]
    Fragmentation {
        requested: usize,
        total_free: usize,
        largest_free: usize,
    },

    #[error("invalid free: block at offset {offset} is not a live allocation of this arena")]
    InvalidFree { offset: usize },

    #[error("arena buffer of {capacity} bytes is below the minimum of {minimum}")]
    TooSmall { capacity: usize, minimum: usize },

    #[error("element alignment {align} exceeds the arena alignment of {max}")]
    Unaligned { align: usize, max: usize },

    #[error("nested arena still holds {used} bytes of live allocations")]
    InUse { used: usize },
}

impl ArenaError {
    /// True for both ways an allocation can fail to fit.
    pub fn is_overrun(&self) -> bool {
        matches!(self, Self::Overrun { .. } | Self::Fragmentation { .. })
    }

    /// The flag this error raises on a [`ProcessContext`](crate::ProcessContext).
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Overrun { .. } | Self::TooSmall { .. } | Self::Unaligned { .. } => {
                ErrorKind::OVERRUN
            }
            Self::Fragmentation { .. } => ErrorKind::FRAGMENTATION,
            Self::InvalidFree { .. } => ErrorKind::INVALID_FREE,
            Self::InUse { .. } => ErrorKind::INVALID_FREE,
        }
    }
}

/// Sticky set of error conditions seen by a process context.
///
/// Realtime hosts usually can't act on an error at the moment it happens,
/// so every reported error also leaves a flag behind that can be polled
/// from a non-audio thread later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct ErrorKind(u8);

impl ErrorKind {
    pub const NONE: Self = Self(0);
    pub const OVERRUN: Self = Self(1 << 0);
    pub const FRAGMENTATION: Self = Self(1 << 1);
    pub const INVALID_FREE: Self = Self(1 << 2);

    pub fn contains(self, other: Self) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

impl std::ops::BitOr for ErrorKind {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}
