/// Channel voice messages, channel numbers 0-15.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEvent {
    NoteOn { channel: u8, key: u8, velocity: u8 },
    NoteOff { channel: u8, key: u8, velocity: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    /// -8192 (full down) to +8191 (full up), 0 = center.
    PitchBend { channel: u8, value: i16 },
    ProgramChange { channel: u8, program: u8 },
}

/// Controller number for "all notes off".
pub const CC_ALL_NOTES_OFF: u8 = 123;

impl MidiEvent {
    /// Decode one raw message. Running status and system messages aren't handled.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let (&status, data) = data.split_first()?;
        let channel = status & 0x0F;

        match (status & 0xF0, data) {
            (0x80, &[key, velocity, ..]) => Some(Self::NoteOff {
                channel,
                key,
                velocity,
            }),
            // Note-on with velocity 0 is a note-off.
            (0x90, &[key, 0, ..]) => Some(Self::NoteOff {
                channel,
                key,
                velocity: 0,
            }),
            (0x90, &[key, velocity, ..]) => Some(Self::NoteOn {
                channel,
                key,
                velocity,
            }),
            (0xB0, &[controller, value, ..]) => Some(Self::ControlChange {
                channel,
                controller,
                value,
            }),
            (0xC0, &[program, ..]) => Some(Self::ProgramChange { channel, program }),
            (0xE0, &[lsb, msb, ..]) => {
                let raw = (i16::from(msb & 0x7F) << 7) | i16::from(lsb & 0x7F);
                Some(Self::PitchBend {
                    channel,
                    value: raw - 8192,
                })
            }
            _ => None,
        }
    }

    pub fn channel(&self) -> u8 {
        match *self {
            Self::NoteOn { channel, .. }
            | Self::NoteOff { channel, .. }
            | Self::ControlChange { channel, .. }
            | Self::PitchBend { channel, .. }
            | Self::ProgramChange { channel, .. } => channel,
        }
    }
}
