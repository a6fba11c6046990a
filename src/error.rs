//! Error types shared across the crate.
//!
//! Encoding and conditioning failures are typed so callers can match on
//! them. Orchestration code (the synthesis adapter, file persistence, the
//! binary) wraps these in `anyhow::Error` with context.

use thiserror::Error;

/// Errors raised while turning a performance descriptor into MIDI events.
#[derive(Debug, Error, PartialEq)]
pub enum EncodeError {
    /// The note name is malformed: bad letter, accidental, octave or length.
    #[error("invalid note name '{name}': {reason}")]
    InvalidNoteName { name: String, reason: String },

    /// The note resolved to a number outside the MIDI range 0..=127.
    #[error("note {name} resolves to {value}, outside the MIDI range 0..=127")]
    NoteOutOfRange { name: String, value: i64 },

    /// The descriptor's fields are inconsistent or out of range.
    #[error("invalid performance descriptor: {0}")]
    InvalidDescriptor(String),
}

/// Errors raised while loading a MIDI file as conditioning tensors.
#[derive(Debug, Error)]
pub enum ConditioningError {
    /// File could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// MIDI parsing failed.
    #[error("MIDI parse error: {0}")]
    Parse(String),

    /// Unsupported MIDI format or timing.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Requested duration is negative or not finite.
    #[error("invalid conditioning duration: {0}")]
    InvalidDuration(f64),
}

/// Errors raised by the conditioning perturbations and output handling.
#[derive(Debug, Error, PartialEq)]
pub enum SynthesisError {
    #[error("glissando step size must be at least 1")]
    InvalidStepSize,

    /// Voice 0 never carries a pitch, so there is nothing to slide from.
    #[error("conditioning has no pitched frame in voice 0")]
    NoPitchedFrame,

    #[error("output bundle has no signal named '{0}'")]
    MissingSignal(String),

    #[error("signal '{name}' has shape {found:?}, expected {expected}")]
    ShapeMismatch {
        name: String,
        found: Vec<usize>,
        expected: String,
    },
}
