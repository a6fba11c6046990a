//! ddsp-piano-kit - MIDI construction and conditioning helpers for a
//! DDSP-style piano synthesis model.
//!
//! The pipeline runs in one direction:
//!
//! 1. [`midi::encode`] turns a [`midi::PerformanceDescriptor`] into a timed
//!    [`midi::EventStream`]
//! 2. [`midi::export_to_midi`] writes it as a Standard MIDI File
//! 3. [`conditioning::load_midi_as_conditioning`] renders the file on a frame
//!    grid as model inputs
//! 4. [`synthesis::synthesize`] perturbs the inputs and calls a
//!    [`synthesis::Synthesizer`]

pub mod conditioning;
pub mod error;
pub mod midi;
pub mod synthesis;

pub use conditioning::{load_midi_as_conditioning, Conditioning, ConditioningConfig};
pub use error::{ConditioningError, EncodeError, SynthesisError};
pub use midi::{EventStream, NoteRef, PerformanceDescriptor, TICKS_PER_BEAT};
pub use synthesis::{
    synthesize, synthesize_glissando, SineBank, SynthesisOptions, SynthesisOutput, Synthesizer,
};
