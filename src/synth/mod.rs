// Purpose: Voice management, polyphony, MIDI handling
// Sits between the host's control input and whatever renders the voices

pub mod message;
pub mod poly;
pub mod stack;
pub mod voice;

pub use message::{MessageReceiver, SynthMessage};
pub use poly::Poly;
pub use stack::NoteStack;
pub use voice::{VoiceSlot, VoiceState};
