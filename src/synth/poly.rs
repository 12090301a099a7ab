//! Polyphonic voice allocation with stealing and pending-note recovery.
//!
//! [`Poly`] doesn't make sound. It decides which voice plays which note and
//! produces a smoothed pitch per voice; the host feeds `pitch(v)` and
//! `velocity(v)` into whatever oscillators it runs.
//!
//! ```text
//!   note_on ──► free voice? ──yes──► Active
//!                   │
//!                   no
//!                   ▼
//!      steal voice of most recent other held note
//!      (that note becomes pending: held, no voice)
//!
//!   note_off ──► voice freed ──► most recent pending note? ──► adopted
//! ```

use crate::{
    context::{ProcessContext, RandomSource},
    dsp::ramp::Ramp,
    error::ArenaError,
    mem::{Arena, ArenaBuf},
    synth::{
        message::{MessageReceiver, SynthMessage},
        stack::NoteStack,
        voice::{NoteEntry, VoiceSlot, VoiceState},
    },
};

pub const NUM_NOTES: usize = 128;
pub const DEFAULT_GLIDE_MS: f32 = 5.0;
pub const DEFAULT_BEND_GLIDE_MS: f32 = 1.0;

pub struct Poly<'buf> {
    voices: ArenaBuf<'buf, VoiceSlot>,
    ramps: ArenaBuf<'buf, Ramp>,
    notes: ArenaBuf<'buf, NoteEntry>,
    stack: NoteStack<'buf>,
    order_stack: NoteStack<'buf>,
    bend: Ramp,
    num_voices: usize,
    glide_time: f32,
    glide_active: bool,
}

impl<'buf> Poly<'buf> {
    /// Build an allocator with `max_voices` voices, all free, all enabled.
    pub fn construct(
        max_voices: usize,
        sample_rate: f32,
        arena: &mut Arena<'buf>,
    ) -> Result<Self, ArenaError> {
        let mut voices = arena.alloc_buf::<VoiceSlot>(max_voices)?;
        let mut ramps = match arena.alloc_buf::<Ramp>(max_voices) {
            Ok(ramps) => ramps,
            Err(err) => return Err(arena.unwind(err, [voices.into_lease()])),
        };
        let mut notes = match arena.alloc_buf::<NoteEntry>(NUM_NOTES) {
            Ok(notes) => notes,
            Err(err) => {
                return Err(arena.unwind(err, [voices.into_lease(), ramps.into_lease()]));
            }
        };
        let stack = match NoteStack::construct(NUM_NOTES, arena) {
            Ok(stack) => stack,
            Err(err) => {
                let leases = [voices.into_lease(), ramps.into_lease(), notes.into_lease()];
                return Err(arena.unwind(err, leases));
            }
        };
        let mut order_stack = match NoteStack::construct(NUM_NOTES, arena) {
            Ok(stack) => stack,
            Err(err) => {
                let leases = [
                    voices.into_lease(),
                    ramps.into_lease(),
                    notes.into_lease(),
                    stack.into_lease(),
                ];
                return Err(arena.unwind(err, leases));
            }
        };
        order_stack.set_ordered(true);

        voices.fill(VoiceSlot::FREE);
        ramps.fill(Ramp::new(DEFAULT_GLIDE_MS, 1, sample_rate));
        notes.fill(NoteEntry::RELEASED);

        log::debug!("poly: {max_voices} voices at {sample_rate} Hz");

        Ok(Self {
            voices,
            ramps,
            notes,
            stack,
            order_stack,
            bend: Ramp::new(DEFAULT_BEND_GLIDE_MS, 1, sample_rate),
            num_voices: max_voices,
            glide_time: DEFAULT_GLIDE_MS,
            glide_active: false,
        })
    }

    /// [`construct`](Self::construct) from the context's default arena at its sample rate.
    pub fn new<R: RandomSource>(
        max_voices: usize,
        ctx: &mut ProcessContext<'buf, R>,
    ) -> Result<Self, ArenaError> {
        let sample_rate = ctx.sample_rate();
        let result = Self::construct(max_voices, sample_rate, ctx.arena_mut());
        if let Err(err) = &result {
            ctx.report(err);
        }
        result
    }

    pub fn destroy(self, arena: &mut Arena<'buf>) -> Result<(), ArenaError> {
        log::debug!("poly: releasing {} voices", self.voices.len());
        arena.free_buf(self.voices)?;
        arena.free_buf(self.ramps)?;
        arena.free_buf(self.notes)?;
        self.stack.destroy(arena)?;
        self.order_stack.destroy(arena)
    }

    /// Strike `note`. Returns the voice now playing it, or `None` if the note
    /// was already held, is out of range, or had to wait for a voice.
    pub fn note_on(&mut self, note: u8, velocity: u8) -> Option<usize> {
        if usize::from(note) >= NUM_NOTES || self.stack.contains(note).is_some() {
            return None;
        }

        // Both stacks hold every MIDI note, so a new note always fits.
        let recent = self.stack.add(note);
        let ordered = self.order_stack.add(note);
        debug_assert!(recent && ordered, "note stacks out of room for note {note}");
        self.notes[usize::from(note)] = NoteEntry::held(velocity);

        if let Some(voice) = self.voices[..self.num_voices].iter().position(VoiceSlot::is_free) {
            let jump = !self.glide_active || !self.voices[voice].has_sounded();
            self.assign(voice, note, velocity, jump);
            return Some(voice);
        }

        // Steal from the most recent other note that still has a voice.
        let (victim, voice) = self
            .stack
            .iter()
            .skip(1)
            .find_map(|held| {
                let voice = self.notes[usize::from(held)].voice()?;
                (voice < self.num_voices).then_some((held, voice))
            })?;

        self.notes[usize::from(victim)].set_voice(None);
        self.assign(voice, note, velocity, false);
        Some(voice)
    }

    /// Release `note`. Returns the voice that was holding it, which may
    /// already be playing a pending note that was waiting for a voice.
    pub fn note_off(&mut self, note: u8) -> Option<usize> {
        if usize::from(note) >= NUM_NOTES || !self.stack.remove(note) {
            return None;
        }
        self.order_stack.remove(note);

        let voice = self.notes[usize::from(note)].voice();
        self.notes[usize::from(note)] = NoteEntry::RELEASED;

        let voice = voice?;
        self.voices[voice].release();

        if voice < self.num_voices {
            let pending = self
                .stack
                .iter()
                .find(|&held| self.notes[usize::from(held)].voice().is_none());

            if let Some(pending) = pending {
                let velocity = self.notes[usize::from(pending)].velocity();
                self.assign(voice, pending, velocity, !self.glide_active);
            }
        }

        Some(voice)
    }

    /// Release every voice and forget every held note.
    pub fn all_notes_off(&mut self) {
        for slot in self.voices.iter_mut() {
            slot.release();
        }
        self.notes.fill(NoteEntry::RELEASED);
        self.stack.clear();
        self.order_stack.clear();
    }

    pub fn apply(&mut self, msg: SynthMessage) {
        match msg {
            SynthMessage::NoteOn { note, velocity } => {
                self.note_on(note, velocity);
            }
            SynthMessage::NoteOff { note, .. } => {
                self.note_off(note);
            }
            SynthMessage::PitchBend { semitones } => self.set_pitch_bend(semitones),
            SynthMessage::AllNotesOff => self.all_notes_off(),
        }
    }

    /// Apply every queued message.
    pub fn drain<Rx: MessageReceiver + ?Sized>(&mut self, rx: &mut Rx) {
        while let Some(msg) = rx.pop() {
            self.apply(msg);
        }
    }

    /// Advance every glide ramp and the bend ramp by one tick.
    #[inline]
    pub fn tick(&mut self) {
        self.tick_pitch_glide();
        self.tick_pitch_bend();
    }

    pub fn tick_pitch_glide(&mut self) {
        for ramp in self.ramps.iter_mut() {
            ramp.tick();
        }
    }

    pub fn tick_pitch_bend(&mut self) {
        self.bend.tick();
    }

    pub fn set_pitch_bend(&mut self, semitones: f32) {
        self.bend.set_dest(semitones);
    }

    pub fn set_bend_glide_time(&mut self, time_ms: f32) {
        self.bend.set_time(time_ms);
    }

    pub fn set_bend_samples_per_tick(&mut self, samples_per_tick: usize) {
        self.bend.set_samples_per_tick(samples_per_tick);
    }

    pub fn set_pitch_glide_time(&mut self, time_ms: f32) {
        self.glide_time = time_ms;
        for ramp in self.ramps.iter_mut() {
            ramp.set_time(time_ms);
        }
    }

    pub fn pitch_glide_time(&self) -> f32 {
        self.glide_time
    }

    pub fn set_pitch_glide_active(&mut self, active: bool) {
        self.glide_active = active;
    }

    pub fn is_pitch_glide_active(&self) -> bool {
        self.glide_active
    }

    /// Limit how many voices new notes may use. Voices above the limit keep
    /// their current note until it is released.
    pub fn set_num_voices(&mut self, num_voices: usize) {
        self.num_voices = num_voices.min(self.voices.len());
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        for ramp in self.ramps.iter_mut() {
            ramp.set_sample_rate(sample_rate);
        }
        self.bend.set_sample_rate(sample_rate);
    }

    pub fn num_voices(&self) -> usize {
        self.num_voices
    }

    pub fn max_voices(&self) -> usize {
        self.voices.len()
    }

    /// Voices currently sounding a note, including any above the enabled
    /// count that are still ringing after `set_num_voices` shrank it.
    pub fn num_active_voices(&self) -> usize {
        self.voices.iter().filter(|slot| !slot.is_free()).count()
    }

    /// Glide plus bend, in fractional MIDI notes. A voice index past
    /// `max_voices()` reads as bend only.
    #[inline]
    pub fn pitch(&self, voice: usize) -> f32 {
        self.ramps.get(voice).map_or(0.0, Ramp::sample) + self.bend.sample()
    }

    pub fn key(&self, voice: usize) -> Option<u8> {
        self.voices.get(voice).and_then(VoiceSlot::key)
    }

    pub fn velocity(&self, voice: usize) -> u8 {
        self.voices.get(voice).map_or(0, VoiceSlot::velocity)
    }

    pub fn is_on(&self, voice: usize) -> bool {
        self.state(voice) == VoiceState::Active
    }

    pub fn state(&self, voice: usize) -> VoiceState {
        self.voices.get(voice).map_or(VoiceState::Free, VoiceSlot::state)
    }

    /// Held notes in recency order, most recent first.
    pub fn held_notes(&self) -> &NoteStack<'buf> {
        &self.stack
    }

    /// Held notes in ascending pitch.
    pub fn ordered_notes(&self) -> &NoteStack<'buf> {
        &self.order_stack
    }

    /// Step the arpeggiator cursor over the pitch-ordered notes.
    pub fn arp_next(&mut self) -> Option<u8> {
        self.order_stack.next()
    }

    /// Whether `note` is held but currently has no voice.
    pub fn is_pending(&self, note: u8) -> bool {
        self.stack.contains(note).is_some() && self.notes[usize::from(note)].voice().is_none()
    }

    fn assign(&mut self, voice: usize, note: u8, velocity: u8, jump: bool) {
        let slot = &mut self.voices[voice];
        slot.assign(note, velocity);
        slot.mark_sounded();
        self.notes[usize::from(note)].set_voice(Some(voice));

        let ramp = &mut self.ramps[voice];
        if jump {
            ramp.set_val(f32::from(note));
        }
        ramp.set_dest(f32::from(note));
    }
}

impl std::fmt::Debug for Poly<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poly")
            .field("voices", &&self.voices[..])
            .field("held", &self.stack)
            .field("num_voices", &self.num_voices)
            .field("glide_active", &self.glide_active)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 1_000.0;

    fn settle(poly: &mut Poly) {
        for _ in 0..1_000 {
            poly.tick();
        }
    }

    #[test]
    fn fresh_allocator_is_idle() {
        let mut memory = vec![0u8; 4096];
        let mut arena = Arena::new(&mut memory).unwrap();
        let poly = Poly::construct(4, SAMPLE_RATE, &mut arena).unwrap();

        assert_eq!(poly.num_voices(), 4);
        assert_eq!(poly.max_voices(), 4);
        assert_eq!(poly.num_active_voices(), 0);
        assert!((0..4).all(|v| poly.state(v) == VoiceState::Free));
    }

    #[test]
    fn notes_take_the_lowest_free_voice() {
        let mut memory = vec![0u8; 4096];
        let mut arena = Arena::new(&mut memory).unwrap();
        let mut poly = Poly::construct(4, SAMPLE_RATE, &mut arena).unwrap();

        assert_eq!(poly.note_on(60, 100), Some(0));
        assert_eq!(poly.note_on(64, 90), Some(1));
        assert_eq!(poly.note_off(60), Some(0));
        assert_eq!(poly.note_on(67, 80), Some(0));

        assert_eq!(poly.key(0), Some(67));
        assert_eq!(poly.velocity(0), 80);
        assert_eq!(poly.key(1), Some(64));
    }

    #[test]
    fn out_of_range_note_is_rejected() {
        let mut memory = vec![0u8; 4096];
        let mut arena = Arena::new(&mut memory).unwrap();
        let mut poly = Poly::construct(2, SAMPLE_RATE, &mut arena).unwrap();

        assert_eq!(poly.note_on(128, 100), None);
        assert_eq!(poly.note_off(200), None);
        assert!(poly.held_notes().is_empty());
    }

    #[test]
    fn zero_voices_leaves_notes_pending() {
        let mut memory = vec![0u8; 4096];
        let mut arena = Arena::new(&mut memory).unwrap();
        let mut poly = Poly::construct(2, SAMPLE_RATE, &mut arena).unwrap();
        poly.set_num_voices(0);

        assert_eq!(poly.note_on(60, 100), None);
        assert!(poly.is_pending(60));
        assert_eq!(poly.num_active_voices(), 0);
        assert_eq!(poly.note_off(60), None);
        assert!(!poly.is_pending(60));
    }

    #[test]
    fn first_note_jumps_even_with_glide() {
        let mut memory = vec![0u8; 4096];
        let mut arena = Arena::new(&mut memory).unwrap();
        let mut poly = Poly::construct(1, SAMPLE_RATE, &mut arena).unwrap();
        poly.set_pitch_glide_active(true);
        poly.set_pitch_glide_time(100.0);

        poly.note_on(60, 100);
        assert_eq!(poly.pitch(0), 60.0);

        // Second note on the same voice glides from 60.
        poly.note_off(60);
        poly.note_on(72, 100);
        poly.tick();
        let p = poly.pitch(0);
        assert!(p > 60.0 && p < 72.0, "pitch {p}");

        settle(&mut poly);
        assert_eq!(poly.pitch(0), 72.0);
    }

    #[test]
    fn glide_off_jumps_on_free_voice() {
        let mut memory = vec![0u8; 4096];
        let mut arena = Arena::new(&mut memory).unwrap();
        let mut poly = Poly::construct(1, SAMPLE_RATE, &mut arena).unwrap();
        poly.set_pitch_glide_time(100.0);

        poly.note_on(60, 100);
        poly.note_off(60);
        poly.note_on(72, 100);
        assert_eq!(poly.pitch(0), 72.0);
    }

    #[test]
    fn stolen_voice_glides_even_with_glide_off() {
        let mut memory = vec![0u8; 4096];
        let mut arena = Arena::new(&mut memory).unwrap();
        let mut poly = Poly::construct(1, SAMPLE_RATE, &mut arena).unwrap();
        poly.set_pitch_glide_time(100.0);

        poly.note_on(60, 100);
        assert_eq!(poly.note_on(72, 100), Some(0));
        assert!(poly.is_pending(60));

        poly.tick();
        let p = poly.pitch(0);
        assert!(p > 60.0 && p < 72.0, "pitch {p}");
    }

    #[test]
    fn destroy_returns_all_memory() {
        let mut memory = vec![0u8; 4096];
        let mut arena = Arena::new(&mut memory).unwrap();
        let poly = Poly::construct(8, SAMPLE_RATE, &mut arena).unwrap();
        assert!(arena.used_bytes() > 0);

        poly.destroy(&mut arena).unwrap();
        assert_eq!(arena.used_bytes(), 0);
        assert!(arena.is_consistent());
    }

    #[test]
    fn failed_construct_gives_memory_back() {
        // Room for the voice tables but not the note table and stacks.
        let mut memory = vec![0u8; 400];
        let mut arena = Arena::new(&mut memory).unwrap();

        let err = Poly::construct(4, SAMPLE_RATE, &mut arena).err().unwrap();
        assert!(matches!(
            err,
            ArenaError::Overrun { .. } | ArenaError::Fragmentation { .. }
        ));
        assert_eq!(arena.used_bytes(), 0);
        assert!(arena.is_consistent());
    }

    #[test]
    fn out_of_range_voice_reads_bend_only() {
        let mut memory = vec![0u8; 4096];
        let mut arena = Arena::new(&mut memory).unwrap();
        let mut poly = Poly::construct(2, SAMPLE_RATE, &mut arena).unwrap();

        poly.set_pitch_bend(3.0);
        settle(&mut poly);

        assert_eq!(poly.pitch(2), 3.0);
        assert_eq!(poly.pitch(usize::MAX), 3.0);
        assert_eq!(poly.key(2), None);
        assert_eq!(poly.velocity(2), 0);
        assert_eq!(poly.state(2), VoiceState::Free);
    }

    #[test]
    fn arpeggiator_sees_every_held_note() {
        let mut memory = vec![0u8; 4096];
        let mut arena = Arena::new(&mut memory).unwrap();
        let mut poly = Poly::construct(4, SAMPLE_RATE, &mut arena).unwrap();

        poly.note_on(60, 100);
        assert_eq!(poly.arp_next(), Some(60));
        poly.note_on(64, 100);
        poly.note_on(67, 100);

        let held: Vec<u8> = poly.held_notes().iter().collect();
        let ordered: Vec<u8> = poly.ordered_notes().iter().collect();
        assert_eq!(held, [67, 64, 60]);
        assert_eq!(ordered, [60, 64, 67]);
    }

    #[test]
    fn all_notes_off_clears_everything() {
        let mut memory = vec![0u8; 4096];
        let mut arena = Arena::new(&mut memory).unwrap();
        let mut poly = Poly::construct(2, SAMPLE_RATE, &mut arena).unwrap();

        for note in [60, 64, 67] {
            poly.note_on(note, 100);
        }
        poly.all_notes_off();

        assert!(poly.held_notes().is_empty());
        assert!(poly.ordered_notes().is_empty());
        assert!(!poly.is_on(0) && !poly.is_on(1));
        assert_eq!(poly.note_off(67), None);
    }
}
