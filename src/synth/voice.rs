use crate::mem::Pod;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    Free,   // No note assigned
    Active, // Sounding a held note
}

/// What one voice is playing. Stored in an arena buffer, so it stays plain data.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceSlot {
    key: i16,
    velocity: u8,
    first_received: u8,
}

// SAFETY: i16 + u8 + u8, repr(C), 4 bytes with no padding; every bit pattern
// is a valid value (a negative key reads as "no note").
unsafe impl Pod for VoiceSlot {}

impl VoiceSlot {
    pub const FREE: Self = Self {
        key: -1,
        velocity: 0,
        first_received: 0,
    };

    pub fn assign(&mut self, note: u8, velocity: u8) {
        self.key = note as i16;
        self.velocity = velocity;
    }

    /// Drop the note but remember that this voice has sounded before.
    pub fn release(&mut self) {
        self.key = -1;
        self.velocity = 0;
    }

    pub fn key(&self) -> Option<u8> {
        u8::try_from(self.key).ok().filter(|&k| k < 128)
    }

    pub fn velocity(&self) -> u8 {
        self.velocity
    }

    pub fn is_free(&self) -> bool {
        self.key().is_none()
    }

    pub fn state(&self) -> VoiceState {
        if self.is_free() {
            VoiceState::Free
        } else {
            VoiceState::Active
        }
    }

    /// Whether the voice has ever been given a note since construction.
    pub fn has_sounded(&self) -> bool {
        self.first_received != 0
    }

    pub(crate) fn mark_sounded(&mut self) {
        self.first_received = 1;
    }
}

/// Per-note bookkeeping: the velocity it was struck with and the voice
/// sounding it, if any.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NoteEntry {
    voice: i16,
    velocity: u8,
    _reserved: u8,
}

// SAFETY: same layout argument as VoiceSlot.
unsafe impl Pod for NoteEntry {}

impl NoteEntry {
    pub(crate) const RELEASED: Self = Self {
        voice: -1,
        velocity: 0,
        _reserved: 0,
    };

    pub(crate) fn held(velocity: u8) -> Self {
        Self {
            velocity,
            ..Self::RELEASED
        }
    }

    pub(crate) fn voice(&self) -> Option<usize> {
        usize::try_from(self.voice).ok()
    }

    pub(crate) fn set_voice(&mut self, voice: Option<usize>) {
        self.voice = voice.map_or(-1, |v| v as i16);
    }

    pub(crate) fn velocity(&self) -> u8 {
        self.velocity
    }
}
