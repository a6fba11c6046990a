//! Note identifiers and note-name resolution.
//!
//! A performance can name its notes symbolically (`"C#4"`) or by raw MIDI
//! number (`61`). [`NoteRef`] holds either form; [`NoteMode`] says which form
//! the encoder expects.

use crate::error::EncodeError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Semitone offset of each letter A..=G, added to `12 * octave + 21`.
///
/// The base of 21 puts A0 on MIDI note 21, so C sits nine semitones below
/// the A of the same octave number.
const LETTER_OFFSETS: [i64; 7] = [0, 2, -9, -7, -5, -4, -2];

/// Which representation the encoder should accept for notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteMode {
    /// Letter-octave names such as `"C4"` or `"Bb3"`.
    #[default]
    Name,
    /// Raw MIDI note numbers.
    Number,
}

/// A single note in a beat, either a name or a MIDI number.
///
/// Deserializes from a JSON string or integer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NoteRef {
    Number(i64),
    Name(String),
}

impl NoteRef {
    /// Resolves this note to a MIDI number under the given mode.
    ///
    /// A name in number mode, or a number in name mode, is rejected rather
    /// than coerced.
    pub fn midi_number(&self, mode: NoteMode) -> Result<u8, EncodeError> {
        match (self, mode) {
            (NoteRef::Name(name), NoteMode::Name) => note_name_to_midi_number(name),
            (NoteRef::Number(n), NoteMode::Number) => {
                u8::try_from(*n)
                    .ok()
                    .filter(|n| *n <= 127)
                    .ok_or_else(|| EncodeError::NoteOutOfRange {
                        name: n.to_string(),
                        value: *n,
                    })
            }
            (NoteRef::Name(name), NoteMode::Number) => Err(EncodeError::InvalidDescriptor(
                format!("expected a note number, found name '{}'", name),
            )),
            (NoteRef::Number(n), NoteMode::Name) => Err(EncodeError::InvalidDescriptor(
                format!("expected a note name, found number {}", n),
            )),
        }
    }
}

impl From<&str> for NoteRef {
    fn from(name: &str) -> Self {
        NoteRef::Name(name.to_string())
    }
}

impl From<u8> for NoteRef {
    fn from(number: u8) -> Self {
        NoteRef::Number(number as i64)
    }
}

impl fmt::Display for NoteRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoteRef::Number(n) => write!(f, "{}", n),
            NoteRef::Name(name) => f.write_str(name),
        }
    }
}

/// Converts a note name of the form `<Letter>[#|b]<Octave>` to a MIDI number.
///
/// The letter is an uppercase `A`..=`G`, the optional accidental is `#`
/// (+1) or `b` (-1), and the octave is a single digit.
///
/// # Errors
///
/// [`EncodeError::InvalidNoteName`] for malformed names and
/// [`EncodeError::NoteOutOfRange`] when the result leaves 0..=127.
///
/// # Examples
///
/// ```
/// use ddsp_piano_kit::midi::note_name_to_midi_number;
///
/// assert_eq!(note_name_to_midi_number("A0"), Ok(21));
/// assert_eq!(note_name_to_midi_number("C4"), Ok(60));
/// assert_eq!(note_name_to_midi_number("C#4"), Ok(61));
/// ```
pub fn note_name_to_midi_number(name: &str) -> Result<u8, EncodeError> {
    let invalid = |reason: &str| EncodeError::InvalidNoteName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    let chars: Vec<char> = name.chars().collect();
    if !(2..=3).contains(&chars.len()) {
        return Err(invalid("expected 2 or 3 characters"));
    }

    let shift = if chars.len() == 3 {
        match chars[1] {
            '#' => 1,
            'b' => -1,
            other => return Err(invalid(&format!("accidental '{}' must be b or #", other))),
        }
    } else {
        0
    };

    let letter = chars[0];
    if !('A'..='G').contains(&letter) {
        return Err(invalid("letter must be one of A, B, C, D, E, F, G"));
    }
    let offset = LETTER_OFFSETS[(letter as u8 - b'A') as usize];

    let octave = chars[chars.len() - 1]
        .to_digit(10)
        .ok_or_else(|| invalid("octave must be a single digit"))? as i64;

    let value = offset + 12 * octave + 21 + shift;
    u8::try_from(value)
        .ok()
        .filter(|n| *n <= 127)
        .ok_or_else(|| EncodeError::NoteOutOfRange {
            name: name.to_string(),
            value,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_notes() {
        assert_eq!(note_name_to_midi_number("A0"), Ok(21));
        assert_eq!(note_name_to_midi_number("C4"), Ok(60));
        assert_eq!(note_name_to_midi_number("E4"), Ok(64));
        assert_eq!(note_name_to_midi_number("A4"), Ok(69));
        assert_eq!(note_name_to_midi_number("C8"), Ok(108));
    }

    #[test]
    fn test_accidentals() {
        assert_eq!(note_name_to_midi_number("C#4"), Ok(61));
        assert_eq!(note_name_to_midi_number("Db4"), Ok(61));
        assert_eq!(note_name_to_midi_number("Bb3"), Ok(58));
    }

    #[test]
    fn test_invalid_letter() {
        assert!(matches!(
            note_name_to_midi_number("H4"),
            Err(EncodeError::InvalidNoteName { .. })
        ));
        // Lowercase letters are rejected
        assert!(matches!(
            note_name_to_midi_number("c4"),
            Err(EncodeError::InvalidNoteName { .. })
        ));
    }

    #[test]
    fn test_invalid_accidental() {
        assert!(matches!(
            note_name_to_midi_number("Cx4"),
            Err(EncodeError::InvalidNoteName { .. })
        ));
    }

    #[test]
    fn test_invalid_length_and_octave() {
        for name in ["C", "C#10", "", "CC"] {
            assert!(matches!(
                note_name_to_midi_number(name),
                Err(EncodeError::InvalidNoteName { .. })
            ));
        }
    }

    #[test]
    fn test_out_of_range() {
        assert_eq!(note_name_to_midi_number("G9"), Ok(127));
        assert!(matches!(
            note_name_to_midi_number("G#9"),
            Err(EncodeError::NoteOutOfRange { value: 128, .. })
        ));
    }

    #[test]
    fn test_every_valid_name_is_in_range_and_deterministic() {
        for letter in ['A', 'B', 'C', 'D', 'E', 'F', 'G'] {
            for accidental in ["", "#", "b"] {
                for octave in 0..=9 {
                    let name = format!("{}{}{}", letter, accidental, octave);
                    if let Ok(n) = note_name_to_midi_number(&name) {
                        assert!(n <= 127);
                        assert_eq!(note_name_to_midi_number(&name), Ok(n));
                    }
                }
            }
        }
    }

    #[test]
    fn test_note_ref_modes() {
        assert_eq!(NoteRef::from("C4").midi_number(NoteMode::Name), Ok(60));
        assert_eq!(NoteRef::from(60u8).midi_number(NoteMode::Number), Ok(60));
        assert!(NoteRef::from("C4").midi_number(NoteMode::Number).is_err());
        assert!(NoteRef::from(60u8).midi_number(NoteMode::Name).is_err());
        assert!(matches!(
            NoteRef::Number(200).midi_number(NoteMode::Number),
            Err(EncodeError::NoteOutOfRange { value: 200, .. })
        ));
    }

    #[test]
    fn test_note_ref_deserializes_both_forms() {
        let notes: Vec<NoteRef> = serde_json::from_str(r#"["C#4", 61]"#).unwrap();
        assert_eq!(notes, vec![NoteRef::from("C#4"), NoteRef::from(61u8)]);
    }
}
