//! Conditioning tensors for the synthesis model.
//!
//! A MIDI file is rendered on a fixed frame grid (250 frames per second by
//! default) into a `[batch, time, voice, feature]` array, where feature 0 is
//! the MIDI pitch and feature 1 the MIDI velocity of the note occupying that
//! voice slot. Empty slots hold zeros.

mod voices;

use crate::error::ConditioningError;
use crate::midi::{import_from_midi, ImportedPerformance, CC_SOFT, CC_SOSTENUTO, CC_SUSTAIN};
use ndarray::{s, Array3, Array4};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Default conditioning frame rate in frames per second.
pub const DEFAULT_FRAME_RATE: f64 = 250.0;

/// Default number of polyphonic voice slots.
pub const DEFAULT_VOICES: usize = 16;

/// Feature index of the pitch in the last conditioning axis.
pub const PITCH: usize = 0;

/// Feature index of the velocity in the last conditioning axis.
pub const VELOCITY: usize = 1;

/// Controllers rendered into the pedal tensor, in column order.
pub const PEDAL_CONTROLLERS: [u8; 3] = [CC_SUSTAIN, CC_SOSTENUTO, CC_SOFT];

/// Frame grid and polyphony used when rendering conditioning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditioningConfig {
    pub frame_rate: f64,
    pub voices: usize,
}

impl Default for ConditioningConfig {
    fn default() -> Self {
        Self {
            frame_rate: DEFAULT_FRAME_RATE,
            voices: DEFAULT_VOICES,
        }
    }
}

/// Model-ready inputs rendered from a MIDI file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conditioning {
    /// `[batch, time, voice, feature]` pitch and velocity per voice slot.
    pub conditioning: Array4<f32>,

    /// `[batch, time, pedal]` held values of [`PEDAL_CONTROLLERS`] in [0, 1].
    pub pedal: Array3<f32>,

    /// Instrument variant the model should render.
    pub piano_model: i32,
}

impl Conditioning {
    /// Renders an imported performance over `duration` seconds.
    ///
    /// # Errors
    ///
    /// Returns [`ConditioningError::InvalidDuration`] if `duration` is
    /// negative or not finite.
    pub fn from_performance(
        performance: &ImportedPerformance,
        duration: f64,
        config: &ConditioningConfig,
    ) -> Result<Self, ConditioningError> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(ConditioningError::InvalidDuration(duration));
        }
        let n_frames = (duration * config.frame_rate).round() as usize;

        let mut conditioning = Array4::<f32>::zeros((1, n_frames, config.voices, 2));
        voices::render_voices(
            &performance.notes,
            config.frame_rate,
            conditioning.slice_mut(s![0, .., .., ..]),
        );

        let mut pedal = Array3::<f32>::zeros((1, n_frames, PEDAL_CONTROLLERS.len()));
        voices::render_pedals(
            &performance.controls,
            &PEDAL_CONTROLLERS,
            config.frame_rate,
            pedal.slice_mut(s![0, .., ..]),
        );

        Ok(Self {
            conditioning,
            pedal,
            piano_model: 0,
        })
    }

    /// Number of time steps.
    pub fn frames(&self) -> usize {
        self.conditioning.dim().1
    }

    /// Number of voice slots.
    pub fn voices(&self) -> usize {
        self.conditioning.dim().2
    }

    /// First frame of `batch` whose pitch in `voice` is non-zero.
    ///
    /// `None` also when `batch` or `voice` is out of range.
    pub fn first_pitched_frame(&self, batch: usize, voice: usize) -> Option<usize> {
        let (batches, _, voices, features) = self.conditioning.dim();
        if batch >= batches || voice >= voices || features <= PITCH {
            return None;
        }
        self.conditioning
            .slice(s![batch, .., voice, PITCH])
            .iter()
            .position(|pitch| *pitch > 0.0)
    }
}

/// Loads a MIDI file as conditioning tensors.
///
/// # Arguments
///
/// * `path` - MIDI file to read
/// * `duration` - Length of the rendered timeline in seconds; notes past
///   it are cut, and the timeline is zero-padded if the file is shorter
/// * `config` - Frame rate and number of voices
pub fn load_midi_as_conditioning<P: AsRef<Path>>(
    path: P,
    duration: f64,
    config: &ConditioningConfig,
) -> Result<Conditioning, ConditioningError> {
    let performance = import_from_midi(path)?;
    let conditioning = Conditioning::from_performance(&performance, duration, config)?;
    debug!(
        frames = conditioning.frames(),
        voices = conditioning.voices(),
        "loaded MIDI as conditioning"
    );
    Ok(conditioning)
}
