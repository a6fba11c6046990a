//! Descriptor-to-synthesis adapter.
//!
//! Drives the whole pipeline for one call: encode the descriptor, write it
//! as a MIDI file, load that file back as conditioning, perturb the
//! conditioning, pick the instrument and invoke the model.

use super::{SynthesisOutput, Synthesizer};
use crate::conditioning::{
    load_midi_as_conditioning, Conditioning, ConditioningConfig, PITCH, VELOCITY,
};
use crate::error::SynthesisError;
use crate::midi::{encode, export_to_midi, NoteMode, PerformanceDescriptor};
use anyhow::{Context, Result};
use ndarray::{s, Axis};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Once a glissando ramp rises past this MIDI note it turns downwards.
pub const GLISSANDO_TURN_NOTE: f64 = 108.0;

/// Vibrato phase advances by `pi * frequency / VIBRATO_PHASE_DIVISOR` per
/// frame, i.e. `frequency` Hz on the default 250 Hz frame grid.
const VIBRATO_PHASE_DIVISOR: f64 = 125.0;

/// Performance modifiers and persistence settings for [`synthesize`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisOptions {
    /// Treat notes as raw MIDI numbers instead of names.
    pub note_number_mode: bool,

    /// Vibrato rate in Hz (on the default frame grid).
    pub vibrato_frequency: f64,

    /// Vibrato depth in semitones.
    pub vibrato_amplitude: f64,

    /// Apply vibrato only to slots holding a note. Off by default, in
    /// which case silent slots pick up the vibrato offset too.
    pub vibrato_active_voices_only: bool,

    /// Multiplier for every velocity value.
    pub velocity_factor: f64,

    /// Model call configuration, forwarded before invocation.
    pub call_args: Option<serde_json::Value>,

    /// Persist the full output bundle after synthesis.
    pub save_output: bool,

    /// Where the output bundle is written when `save_output` is set.
    pub output_path: PathBuf,

    /// Where to keep the intermediate MIDI file. A temporary file is used
    /// and removed when unset.
    pub midi_path: Option<PathBuf>,

    pub conditioning: ConditioningConfig,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            note_number_mode: false,
            vibrato_frequency: 0.0,
            vibrato_amplitude: 0.0,
            vibrato_active_voices_only: false,
            velocity_factor: 1.0,
            call_args: None,
            save_output: false,
            output_path: PathBuf::from("out.bin"),
            midi_path: None,
            conditioning: ConditioningConfig::default(),
        }
    }
}

impl SynthesisOptions {
    /// Loads options from a JSON file. Missing fields take their defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read options: {}", path.as_ref().display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse options: {}", path.as_ref().display()))
    }

    fn note_mode(&self) -> NoteMode {
        if self.note_number_mode {
            NoteMode::Number
        } else {
            NoteMode::Name
        }
    }
}

/// Intermediate MIDI file, removed on drop unless the caller chose the path.
struct MidiFile {
    path: PathBuf,
    temporary: bool,
}

impl MidiFile {
    fn new(requested: Option<&Path>) -> Self {
        match requested {
            Some(path) => Self {
                path: path.to_path_buf(),
                temporary: false,
            },
            None => Self {
                path: std::env::temp_dir().join(format!("piano-kit-{}.mid", Uuid::new_v4())),
                temporary: true,
            },
        }
    }
}

impl Drop for MidiFile {
    fn drop(&mut self) {
        if self.temporary && self.path.exists() {
            if let Err(e) = fs::remove_file(&self.path) {
                warn!("Failed to remove temporary MIDI file {:?}: {}", self.path, e);
            }
        }
    }
}

/// Encodes the descriptor, writes it as MIDI and loads it back as conditioning.
fn load_conditioning(
    descriptor: &PerformanceDescriptor,
    duration: f64,
    mode: NoteMode,
    midi_path: Option<&Path>,
    config: &ConditioningConfig,
) -> Result<Conditioning> {
    let stream = encode(descriptor, mode).context("Failed to encode performance")?;

    let midi = MidiFile::new(midi_path);
    export_to_midi(&stream, &midi.path)
        .with_context(|| format!("Failed to write MIDI file: {}", midi.path.display()))?;

    let inputs = load_midi_as_conditioning(&midi.path, duration, config)
        .with_context(|| format!("Failed to load conditioning from {}", midi.path.display()))?;
    Ok(inputs)
}

fn invoke<S: Synthesizer + ?Sized>(model: &mut S, inputs: &Conditioning) -> Result<SynthesisOutput> {
    info!(
        frames = inputs.frames(),
        piano_model = inputs.piano_model,
        "invoking synthesis model"
    );
    model.synthesize(inputs).context("Synthesis model failed")
}

/// Synthesizes a performance.
///
/// # Arguments
///
/// * `descriptor` - The notes to play
/// * `model` - The synthesis model
/// * `duration` - Length of the conditioning timeline in seconds
/// * `piano_type` - Instrument variant id passed to the model
/// * `options` - Perturbations and persistence settings
///
/// # Errors
///
/// Returns error if encoding, MIDI I/O, the model call or persistence fails.
/// Nothing is retried.
pub fn synthesize<S: Synthesizer + ?Sized>(
    descriptor: &PerformanceDescriptor,
    model: &mut S,
    duration: f64,
    piano_type: i32,
    options: &SynthesisOptions,
) -> Result<SynthesisOutput> {
    let mut inputs = load_conditioning(
        descriptor,
        duration,
        options.note_mode(),
        options.midi_path.as_deref(),
        &options.conditioning,
    )?;

    apply_vibrato(
        &mut inputs,
        options.vibrato_frequency,
        options.vibrato_amplitude,
        options.vibrato_active_voices_only,
    );
    scale_velocity(&mut inputs, options.velocity_factor);
    inputs.piano_model = piano_type;

    if let Some(call_args) = &options.call_args {
        model.set_call_args(call_args);
    }
    let output = invoke(model, &inputs)?;

    if options.save_output {
        output.save_to_binary(&options.output_path).with_context(|| {
            format!(
                "Failed to save synthesis output: {}",
                options.output_path.display()
            )
        })?;
        info!("Output saved at {}", options.output_path.display());
    }

    Ok(output)
}

/// Synthesizes a performance with a rising glissando over voice 0.
///
/// The descriptor must use note names. See [`apply_glissando`] for the
/// shape of the ramp.
pub fn synthesize_glissando<S: Synthesizer + ?Sized>(
    descriptor: &PerformanceDescriptor,
    model: &mut S,
    duration: f64,
    piano_type: i32,
    step_size: usize,
) -> Result<SynthesisOutput> {
    let mut inputs = load_conditioning(
        descriptor,
        duration,
        NoteMode::Name,
        None,
        &ConditioningConfig::default(),
    )?;

    apply_glissando(&mut inputs, step_size)?;
    inputs.piano_model = piano_type;

    invoke(model, &inputs)
}

/// Adds a sinusoidal pitch offset to every frame.
///
/// Frame `i` is offset by `amplitude * sin(i * pi * frequency / 125)`. By
/// default every voice slot is shifted, silent ones included; with
/// `active_only` slots whose pitch is zero are left alone. A zero amplitude
/// leaves the pitches untouched.
pub fn apply_vibrato(inputs: &mut Conditioning, frequency: f64, amplitude: f64, active_only: bool) {
    if amplitude == 0.0 {
        return;
    }
    let mut pitch = inputs.conditioning.slice_mut(s![.., .., .., PITCH]);
    for ((_, frame, _), value) in pitch.indexed_iter_mut() {
        if active_only && *value == 0.0 {
            continue;
        }
        let offset = amplitude * (frame as f64 * PI * frequency / VIBRATO_PHASE_DIVISOR).sin();
        *value += offset as f32;
    }
    debug!(frequency, amplitude, active_only, "applied vibrato");
}

/// Multiplies every velocity value by `factor`.
pub fn scale_velocity(inputs: &mut Conditioning, factor: f64) {
    if factor == 1.0 {
        return;
    }
    inputs
        .conditioning
        .slice_mut(s![.., .., .., VELOCITY])
        .mapv_inplace(|v| (v as f64 * factor) as f32);
}

/// Replaces the pitch of voice 0 with a stepwise glissando.
///
/// Starting at the first pitched frame of voice 0, the timeline is cut into
/// chunks of `step_size` frames. Each chunk ramps linearly from `start` to
/// `start + 1` (both inclusive), after which `start` moves by one semitone:
/// upwards until it passes [`GLISSANDO_TURN_NOTE`], downwards from then on.
/// A final partial chunk gets the leading part of its ramp.
///
/// # Errors
///
/// [`SynthesisError::InvalidStepSize`] for a zero step and
/// [`SynthesisError::NoPitchedFrame`] if voice 0 is silent throughout or
/// the conditioning has no voice slots.
pub fn apply_glissando(inputs: &mut Conditioning, step_size: usize) -> Result<(), SynthesisError> {
    if step_size == 0 {
        return Err(SynthesisError::InvalidStepSize);
    }
    let (_, _, voices, features) = inputs.conditioning.dim();
    if voices == 0 || features <= PITCH {
        return Err(SynthesisError::NoPitchedFrame);
    }

    for mut batch in inputs.conditioning.axis_iter_mut(Axis(0)) {
        let mut voice = batch.slice_mut(s![.., 0, PITCH]);
        let start_idx = voice
            .iter()
            .position(|pitch| *pitch > 0.0)
            .ok_or(SynthesisError::NoPitchedFrame)?;

        let frames = voice.len();
        let increment = if step_size > 1 {
            1.0 / (step_size - 1) as f64
        } else {
            0.0
        };
        let mut start_note = voice[start_idx] as f64;
        let mut ascending = true;

        for chunk_start in (start_idx..frames).step_by(step_size) {
            let chunk_end = (chunk_start + step_size).min(frames);
            for (k, frame) in (chunk_start..chunk_end).enumerate() {
                voice[frame] = (start_note + k as f64 * increment) as f32;
            }

            if ascending {
                start_note += 1.0;
            } else {
                start_note -= 1.0;
            }
            if start_note > GLISSANDO_TURN_NOTE {
                ascending = false;
            }
        }
    }

    debug!(step_size, "applied glissando");
    Ok(())
}
