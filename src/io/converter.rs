use crate::{
    io::midi::{MidiEvent, CC_ALL_NOTES_OFF},
    synth::message::SynthMessage,
};

/// Translate a MIDI event on `channel_filter` into an allocator message.
/// Pitch bend is scaled so full deflection equals `bend_range` semitones.
pub fn midi_to_synth(midi: MidiEvent, channel_filter: u8, bend_range: f32) -> Option<SynthMessage> {
    if midi.channel() != channel_filter {
        return None;
    }

    match midi {
        MidiEvent::NoteOn { key, velocity, .. } => Some(SynthMessage::NoteOn {
            note: key,
            velocity,
        }),
        MidiEvent::NoteOff { key, velocity, .. } => Some(SynthMessage::NoteOff {
            note: key,
            velocity,
        }),
        MidiEvent::PitchBend { value, .. } => {
            let full_scale = if value < 0 { 8192.0 } else { 8191.0 };
            Some(SynthMessage::PitchBend {
                semitones: f32::from(value) / full_scale * bend_range,
            })
        }
        MidiEvent::ControlChange { controller, .. } if controller == CC_ALL_NOTES_OFF => {
            Some(SynthMessage::AllNotesOff)
        }
        _ => None,
    }
}

/// Equal-tempered frequency of a (possibly fractional) MIDI note, A4 = 440 Hz.
pub fn midi_note_to_freq(note: f32) -> f32 {
    440.0 * 2.0_f32.powf((note - 69.0) / 12.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn other_channels_are_filtered() {
        let on = MidiEvent::NoteOn {
            channel: 3,
            key: 60,
            velocity: 100,
        };
        assert_eq!(midi_to_synth(on, 0, 2.0), None);
        assert_eq!(
            midi_to_synth(on, 3, 2.0),
            Some(SynthMessage::NoteOn {
                note: 60,
                velocity: 100
            })
        );
    }

    #[test]
    fn bend_scales_to_range() {
        let up = MidiEvent::PitchBend {
            channel: 0,
            value: 8191,
        };
        let down = MidiEvent::PitchBend {
            channel: 0,
            value: -8192,
        };
        assert_eq!(
            midi_to_synth(up, 0, 2.0),
            Some(SynthMessage::PitchBend { semitones: 2.0 })
        );
        assert_eq!(
            midi_to_synth(down, 0, 12.0),
            Some(SynthMessage::PitchBend { semitones: -12.0 })
        );
    }

    #[test]
    fn all_notes_off_controller() {
        let cc = MidiEvent::ControlChange {
            channel: 0,
            controller: CC_ALL_NOTES_OFF,
            value: 0,
        };
        assert_eq!(midi_to_synth(cc, 0, 2.0), Some(SynthMessage::AllNotesOff));
    }

    #[test]
    fn a4_is_440() {
        assert_eq!(midi_note_to_freq(69.0), 440.0);
        assert!((midi_note_to_freq(81.0) - 880.0).abs() < 1e-3);
    }
}
