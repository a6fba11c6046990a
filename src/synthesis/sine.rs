//! Additive sine-bank synthesizer.
//!
//! A small deterministic stand-in for the neural piano model: each voice
//! slot drives a harmonic oscillator whose pitch and level follow the
//! conditioning frame by frame. It produces the same signal names the
//! plotting side expects from the real model (`f0_hz_{voice}`,
//! `amplitudes_{voice}`, `audio_synth`, `conditioning`).

use super::{SynthesisOutput, Synthesizer, AUDIO_SIGNAL, SAMPLE_RATE};
use crate::conditioning::{Conditioning, PITCH, VELOCITY};
use anyhow::{ensure, Result};
use ndarray::Array2;
use std::f64::consts::TAU;
use tracing::{debug, warn};

/// Audio samples rendered per conditioning frame (16 kHz over 250 Hz).
pub const SAMPLES_PER_FRAME: usize = 64;

/// Upper bound on harmonics per voice.
const MAX_HARMONICS: usize = 8;

const DEFAULT_GAIN: f64 = 0.25;

/// Converts a (possibly fractional) MIDI pitch to Hz.
fn midi_to_hz(pitch: f64) -> f64 {
    440.0 * 2f64.powf((pitch - 69.0) / 12.0)
}

/// Harmonic oscillator bank driven by conditioning tensors.
#[derive(Debug, Clone)]
pub struct SineBank {
    /// Peak level of a voice at velocity 127.
    pub gain: f64,
}

impl SineBank {
    pub fn new() -> Self {
        Self { gain: DEFAULT_GAIN }
    }

    /// Number of harmonics rendered for an instrument variant.
    pub fn harmonics_for(piano_model: i32) -> usize {
        (1 + piano_model.max(0) as usize).min(MAX_HARMONICS)
    }
}

impl Default for SineBank {
    fn default() -> Self {
        Self::new()
    }
}

impl Synthesizer for SineBank {
    fn synthesize(&mut self, inputs: &Conditioning) -> Result<SynthesisOutput> {
        let (batch, frames, voices, features) = inputs.conditioning.dim();
        ensure!(batch > 0, "conditioning has an empty batch axis");
        ensure!(
            features >= 2,
            "conditioning needs pitch and velocity features, found {}",
            features
        );

        let harmonics = Self::harmonics_for(inputs.piano_model);
        let nyquist = SAMPLE_RATE as f64 / 2.0;

        let mut f0_hz = Array2::<f32>::zeros((voices, frames));
        let mut amplitudes = Array2::<f32>::zeros((voices, frames));
        for frame in 0..frames {
            for voice in 0..voices {
                let pitch = inputs.conditioning[[0, frame, voice, PITCH]] as f64;
                let velocity = inputs.conditioning[[0, frame, voice, VELOCITY]] as f64;
                if pitch > 0.0 && velocity > 0.0 {
                    f0_hz[[voice, frame]] = midi_to_hz(pitch) as f32;
                    amplitudes[[voice, frame]] = (self.gain * velocity / 127.0) as f32;
                }
            }
        }

        let mut audio = Array2::<f32>::zeros((1, frames * SAMPLES_PER_FRAME));
        let mut phases = vec![0.0f64; voices];
        for frame in 0..frames {
            for voice in 0..voices {
                let f0 = f0_hz[[voice, frame]] as f64;
                let amplitude = amplitudes[[voice, frame]] as f64;
                if amplitude == 0.0 {
                    phases[voice] = 0.0;
                    continue;
                }

                let step = TAU * f0 / SAMPLE_RATE as f64;
                for n in 0..SAMPLES_PER_FRAME {
                    let phase = phases[voice];
                    let mut sample = 0.0;
                    for h in 1..=harmonics {
                        if f0 * h as f64 >= nyquist {
                            break;
                        }
                        sample += (h as f64 * phase).sin() / h as f64;
                    }
                    audio[[0, frame * SAMPLES_PER_FRAME + n]] += (amplitude * sample) as f32;
                    phases[voice] = (phase + step) % TAU;
                }
            }
        }

        let mut output = SynthesisOutput::new();
        for voice in 0..voices {
            let f0 = f0_hz.row(voice).to_owned().into_shape_with_order((1, frames, 1))?;
            let amp = amplitudes
                .row(voice)
                .to_owned()
                .into_shape_with_order((1, frames, 1))?;
            output.insert(format!("f0_hz_{}", voice), f0.into_dyn());
            output.insert(format!("amplitudes_{}", voice), amp.into_dyn());
        }
        output.insert(AUDIO_SIGNAL, audio.into_dyn());
        output.insert("conditioning", inputs.conditioning.clone().into_dyn());
        output.insert("pedal", inputs.pedal.clone().into_dyn());

        debug!(frames, voices, harmonics, "rendered sine bank");
        Ok(output)
    }

    /// Accepts `{"gain": <number>}`.
    fn set_call_args(&mut self, call_args: &serde_json::Value) {
        match call_args.get("gain").and_then(serde_json::Value::as_f64) {
            Some(gain) => self.gain = gain,
            None => warn!("Ignoring call arguments without a numeric 'gain': {}", call_args),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array3, Array4};

    fn blank(frames: usize, voices: usize) -> Conditioning {
        Conditioning {
            conditioning: Array4::zeros((1, frames, voices, 2)),
            pedal: Array3::zeros((1, frames, 3)),
            piano_model: 0,
        }
    }

    #[test]
    fn test_midi_to_hz() {
        assert!((midi_to_hz(69.0) - 440.0).abs() < 1e-9);
        assert!((midi_to_hz(81.0) - 880.0).abs() < 1e-9);
    }

    #[test]
    fn test_harmonics_for_piano_model() {
        assert_eq!(SineBank::harmonics_for(0), 1);
        assert_eq!(SineBank::harmonics_for(3), 4);
        assert_eq!(SineBank::harmonics_for(-2), 1);
        assert_eq!(SineBank::harmonics_for(40), 8);
    }

    #[test]
    fn test_renders_expected_signals() {
        let mut inputs = blank(10, 2);
        for frame in 2..6 {
            inputs.conditioning[[0, frame, 0, PITCH]] = 69.0;
            inputs.conditioning[[0, frame, 0, VELOCITY]] = 127.0;
        }

        let output = SineBank::new().synthesize(&inputs).unwrap();
        assert_eq!(output.require("f0_hz_0").unwrap().shape(), &[1, 10, 1]);
        assert_eq!(output.require("amplitudes_1").unwrap().shape(), &[1, 10, 1]);

        let f0 = output.require("f0_hz_0").unwrap();
        assert!((f0[[0, 3, 0]] - 440.0).abs() < 1e-3);
        assert_eq!(f0[[0, 0, 0]], 0.0);

        let audio = output.require(AUDIO_SIGNAL).unwrap();
        assert_eq!(audio.shape(), &[1, 10 * SAMPLES_PER_FRAME]);
        // Silent before frame 2, sounding inside the note
        assert!(audio
            .iter()
            .take(2 * SAMPLES_PER_FRAME)
            .all(|s| *s == 0.0));
        assert!(audio.iter().any(|s| s.abs() > 0.1));
        assert!(audio.iter().all(|s| s.abs() <= 0.25 + 1e-6));
    }

    #[test]
    fn test_call_args_set_gain() {
        let mut bank = SineBank::new();
        bank.set_call_args(&serde_json::json!({"gain": 0.5}));
        assert_eq!(bank.gain, 0.5);
        bank.set_call_args(&serde_json::json!({"other": true}));
        assert_eq!(bank.gain, 0.5);
    }
}
