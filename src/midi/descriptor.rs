//! Performance descriptor: the structured input to the encoder.

use super::note::NoteRef;
use crate::error::EncodeError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Describes a simple performance as a list of beats.
///
/// Every beat is a chord of notes struck together, held for `duration`
/// seconds, and followed by `pause` seconds before the next beat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceDescriptor {
    /// Notes struck on each beat, in order.
    pub beats: Vec<Vec<NoteRef>>,

    /// Velocities (0-127) aligned positionally with `beats`.
    pub velocities: Vec<Vec<u8>>,

    /// Sustain pedal value (0-127) applied once at the start.
    pub pedal: u8,

    /// Seconds between a beat's note-off and the next beat's note-on.
    /// Also precedes the first beat.
    pub pause: f64,

    /// Seconds each note is held.
    pub duration: f64,

    /// Trailing silence in seconds after the last beat.
    pub silence: f64,
}

impl PerformanceDescriptor {
    /// Checks that the descriptor can be encoded.
    ///
    /// Verifies that `velocities` mirrors the shape of `beats`, that every
    /// velocity and the pedal value are valid MIDI data bytes, and that the
    /// timing fields are finite and non-negative. Note names are checked
    /// later, during resolution.
    pub fn validate(&self) -> Result<(), EncodeError> {
        if self.velocities.len() != self.beats.len() {
            return Err(EncodeError::InvalidDescriptor(format!(
                "{} beats but {} velocity lists",
                self.beats.len(),
                self.velocities.len()
            )));
        }

        for (index, (beat, velocities)) in self.beats.iter().zip(&self.velocities).enumerate() {
            if beat.len() != velocities.len() {
                return Err(EncodeError::InvalidDescriptor(format!(
                    "beat {} has {} notes but {} velocities",
                    index,
                    beat.len(),
                    velocities.len()
                )));
            }
            if let Some(v) = velocities.iter().find(|v| **v > 127) {
                return Err(EncodeError::InvalidDescriptor(format!(
                    "beat {} has velocity {} outside 0..=127",
                    index, v
                )));
            }
        }

        if self.pedal > 127 {
            return Err(EncodeError::InvalidDescriptor(format!(
                "pedal value {} outside 0..=127",
                self.pedal
            )));
        }

        for (field, value) in [
            ("pause", self.pause),
            ("duration", self.duration),
            ("silence", self.silence),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(EncodeError::InvalidDescriptor(format!(
                    "{} must be a finite, non-negative number of seconds, got {}",
                    field, value
                )));
            }
        }

        Ok(())
    }

    /// Total number of notes over all beats.
    pub fn note_count(&self) -> usize {
        self.beats.iter().map(Vec::len).sum()
    }

    /// The last note of the last non-empty beat, reused for the silence pad.
    pub fn last_note(&self) -> Option<&NoteRef> {
        self.beats.iter().rev().find_map(|beat| beat.last())
    }

    /// Parses a descriptor from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Loads a descriptor from a JSON file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, std::io::Error> {
        let json = fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chord() -> PerformanceDescriptor {
        PerformanceDescriptor {
            beats: vec![vec!["C4".into(), "E4".into()]],
            velocities: vec![vec![80, 80]],
            pedal: 64,
            pause: 0.5,
            duration: 1.0,
            silence: 0.2,
        }
    }

    #[test]
    fn test_valid_descriptor() {
        assert_eq!(chord().validate(), Ok(()));
        assert_eq!(chord().note_count(), 2);
        assert_eq!(chord().last_note(), Some(&NoteRef::from("E4")));
    }

    #[test]
    fn test_mismatched_beat_count() {
        let mut descriptor = chord();
        descriptor.velocities.push(vec![90]);
        assert!(matches!(
            descriptor.validate(),
            Err(EncodeError::InvalidDescriptor(_))
        ));
    }

    #[test]
    fn test_mismatched_chord_size() {
        let mut descriptor = chord();
        descriptor.velocities[0].pop();
        assert!(matches!(
            descriptor.validate(),
            Err(EncodeError::InvalidDescriptor(_))
        ));
    }

    #[test]
    fn test_out_of_range_values() {
        let mut descriptor = chord();
        descriptor.velocities[0][1] = 200;
        assert!(descriptor.validate().is_err());

        let mut descriptor = chord();
        descriptor.pedal = 128;
        assert!(descriptor.validate().is_err());

        let mut descriptor = chord();
        descriptor.pause = -0.1;
        assert!(descriptor.validate().is_err());

        let mut descriptor = chord();
        descriptor.silence = f64::NAN;
        assert!(descriptor.validate().is_err());
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "beats": [["C4", "E4"], ["G4"]],
            "velocities": [[80, 80], [100]],
            "pedal": 0,
            "pause": 0.25,
            "duration": 0.5,
            "silence": 1.0
        }"#;
        let descriptor = PerformanceDescriptor::from_json(json).unwrap();
        assert_eq!(descriptor.beats.len(), 2);
        assert_eq!(descriptor.last_note(), Some(&NoteRef::from("G4")));
        assert_eq!(descriptor.validate(), Ok(()));
    }
}
