//! Synthesis invocation.
//!
//! The neural model is reached only through the [`Synthesizer`] trait, so the
//! adapter can drive a pretrained model binding, the bundled [`SineBank`], or
//! a test double interchangeably.

mod adapter;
mod output;
mod sine;

pub use adapter::{
    apply_glissando, apply_vibrato, scale_velocity, synthesize, synthesize_glissando,
    SynthesisOptions, GLISSANDO_TURN_NOTE,
};
pub use output::{SynthesisOutput, AUDIO_SIGNAL, SAMPLE_RATE};
pub use sine::SineBank;

use crate::conditioning::Conditioning;
use anyhow::Result;

/// A model that renders conditioning tensors into named output signals.
pub trait Synthesizer {
    /// Runs the model once.
    fn synthesize(&mut self, inputs: &Conditioning) -> Result<SynthesisOutput>;

    /// Replaces the model's call configuration.
    ///
    /// Models without a call configuration ignore it.
    fn set_call_args(&mut self, _call_args: &serde_json::Value) {}
}

impl<F> Synthesizer for F
where
    F: FnMut(&Conditioning) -> Result<SynthesisOutput>,
{
    fn synthesize(&mut self, inputs: &Conditioning) -> Result<SynthesisOutput> {
        self(inputs)
    }
}
