//! MIDI side of the pipeline.
//!
//! This module turns a [`PerformanceDescriptor`] into a timed [`EventStream`],
//! writes that stream as a Standard MIDI File, and reads Standard MIDI Files
//! back into second-based note spans for the conditioning loader.

mod descriptor;
mod encoder;
mod event;
mod midi_export;
mod midi_import;
mod note;

pub use descriptor::PerformanceDescriptor;
pub use encoder::{encode, encode_note_names, encode_note_numbers};
pub use event::{EventStream, MidiEvent, TimedEvent};
pub use midi_export::{export_to_midi, to_smf_bytes};
pub use midi_import::{import_from_midi, parse_smf, ControlPoint, ImportedPerformance, NoteSpan};
pub use note::{note_name_to_midi_number, NoteMode, NoteRef};

/// Ticks per beat (quarter note) used for every encoded file.
pub const TICKS_PER_BEAT: u16 = 100;

/// Fixed tempo in beats per minute.
pub const TEMPO_BPM: u32 = 120;

/// Fixed tempo as microseconds per beat, the unit of the MIDI tempo meta event.
pub const MICROSECONDS_PER_BEAT: u32 = 60_000_000 / TEMPO_BPM;

/// Sustain pedal controller.
pub const CC_SUSTAIN: u8 = 64;

/// Sostenuto pedal controller.
pub const CC_SOSTENUTO: u8 = 66;

/// Soft pedal controller. Always set to 127 at the start of an encoded file.
pub const CC_SOFT: u8 = 67;

/// Converts seconds to ticks at the fixed tempo and resolution.
///
/// Rounds half to even.
///
/// # Examples
///
/// ```
/// use ddsp_piano_kit::midi::seconds_to_ticks;
///
/// assert_eq!(seconds_to_ticks(0.5), 100); // one beat at 120 BPM
/// ```
pub fn seconds_to_ticks(seconds: f64) -> u32 {
    (seconds / seconds_per_tick()).round_ties_even().max(0.0) as u32
}

/// Converts ticks back to seconds at the fixed tempo and resolution.
pub fn ticks_to_seconds(ticks: u64) -> f64 {
    ticks as f64 * seconds_per_tick()
}

/// Length of one tick. Divided into, not multiplied by its inverse, so
/// half-tick inputs round the same way as the usual MIDI tooling.
fn seconds_per_tick() -> f64 {
    MICROSECONDS_PER_BEAT as f64 * 1e-6 / TICKS_PER_BEAT as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_conversions() {
        // At 120 BPM with 100 ticks per beat, one tick is 5 ms
        assert_eq!(seconds_to_ticks(0.5), 100);
        assert_eq!(seconds_to_ticks(1.0), 200);
        assert_eq!(seconds_to_ticks(0.1), 20);
        assert_eq!(seconds_to_ticks(0.0), 0);
        assert!((ticks_to_seconds(200) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_fractional_ticks_round_to_nearest() {
        assert_eq!(seconds_to_ticks(0.0126), 3);
        assert_eq!(seconds_to_ticks(0.0124), 2);
    }

    #[test]
    fn test_half_tick_inputs_divide_by_tick_length() {
        assert_eq!(seconds_to_ticks(0.1175), 23);
        assert_eq!(seconds_to_ticks(0.2975), 59);
    }

    #[test]
    fn test_tempo_constant() {
        assert_eq!(MICROSECONDS_PER_BEAT, 500_000);
    }
}
