//! Synthesis output bundle.
//!
//! The model returns named signals whose shapes it alone defines. This type
//! stores them as dynamic-dimension arrays and only interprets the
//! `audio_synth` signal, for WAV export.

use crate::error::SynthesisError;
use anyhow::{Context, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use ndarray::{ArrayD, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::info;

/// Name of the synthesized audio signal, shaped `[batch, samples]`.
pub const AUDIO_SIGNAL: &str = "audio_synth";

/// Sample rate of the synthesized audio.
pub const SAMPLE_RATE: u32 = 16_000;

/// Named tensors produced by one synthesis call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SynthesisOutput {
    signals: BTreeMap<String, ArrayD<f32>>,
}

impl SynthesisOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a signal.
    pub fn insert(&mut self, name: impl Into<String>, signal: ArrayD<f32>) {
        self.signals.insert(name.into(), signal);
    }

    pub fn get(&self, name: &str) -> Option<&ArrayD<f32>> {
        self.signals.get(name)
    }

    /// Looks up a signal, failing with [`SynthesisError::MissingSignal`].
    pub fn require(&self, name: &str) -> Result<&ArrayD<f32>, SynthesisError> {
        self.get(name)
            .ok_or_else(|| SynthesisError::MissingSignal(name.to_string()))
    }

    /// Signal names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.signals.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Audio of the first batch entry, peak-normalized to 1.0.
    ///
    /// Silent audio is returned unscaled.
    pub fn normalized_audio(&self) -> Result<Vec<f32>, SynthesisError> {
        let audio = self.require(AUDIO_SIGNAL)?;
        if audio.ndim() != 2 || audio.shape()[0] == 0 {
            return Err(SynthesisError::ShapeMismatch {
                name: AUDIO_SIGNAL.to_string(),
                found: audio.shape().to_vec(),
                expected: "[batch, samples]".to_string(),
            });
        }

        let mut samples: Vec<f32> = audio.index_axis(Axis(0), 0).iter().copied().collect();
        let peak = samples.iter().fold(0.0f32, |peak, s| peak.max(s.abs()));
        if peak > 0.0 {
            samples.iter_mut().for_each(|s| *s /= peak);
        }
        Ok(samples)
    }

    /// Writes the normalized audio as a 16 kHz mono 16-bit WAV file.
    ///
    /// # Errors
    ///
    /// Returns error if the bundle has no usable audio signal or the file
    /// cannot be written.
    pub fn save_as_wav<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let samples = self.normalized_audio()?;

        let spec = WavSpec {
            channels: 1,
            sample_rate: SAMPLE_RATE,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path.as_ref(), spec).with_context(|| {
            format!("Failed to create output WAV file: {}", path.as_ref().display())
        })?;

        for sample in samples {
            writer.write_sample((sample * 32767.0).clamp(-32768.0, 32767.0) as i16)?;
        }
        writer.finalize().context("Failed to finalize WAV file")?;

        info!("Audio saved at {}", path.as_ref().display());
        Ok(())
    }

    /// Saves the whole bundle in binary form.
    ///
    /// Uses bincode; the format is only meant to be read back by
    /// [`SynthesisOutput::load_from_binary`].
    pub fn save_to_binary<P: AsRef<Path>>(&self, path: P) -> Result<(), std::io::Error> {
        let data = bincode::serialize(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(path, data)
    }

    /// Loads a bundle saved with [`SynthesisOutput::save_to_binary`].
    pub fn load_from_binary<P: AsRef<Path>>(path: P) -> Result<Self, std::io::Error> {
        let data = fs::read(path)?;
        bincode::deserialize(&data)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}
