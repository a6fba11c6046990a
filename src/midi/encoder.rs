//! Performance descriptor to MIDI event stream encoding.
//!
//! The stream layout is fixed:
//!
//! 1. Tempo (120 BPM), sustain pedal (CC 64) and soft pedal (CC 67, 127),
//!    all at delay 0.
//! 2. Per beat: note-ons (the first delayed by `pause`), then note-offs
//!    (the first delayed by `duration`).
//! 3. A silence pad: the last note of the last beat is struck again at
//!    velocity 1 after `silence`, and released 0.1 s later.

use super::descriptor::PerformanceDescriptor;
use super::event::{EventStream, MidiEvent, TimedEvent};
use super::note::NoteMode;
use super::{seconds_to_ticks, CC_SOFT, CC_SUSTAIN, MICROSECONDS_PER_BEAT};
use crate::error::EncodeError;
use tracing::debug;

/// All encoded events go to the first channel.
const CHANNEL: u8 = 0;

/// Velocity of the silence-pad note-on.
const SILENCE_PAD_VELOCITY: u8 = 1;

/// How long the silence-pad note is held.
const SILENCE_PAD_HOLD_SECONDS: f64 = 0.1;

/// Encodes a descriptor whose notes are letter-octave names.
pub fn encode_note_names(descriptor: &PerformanceDescriptor) -> Result<EventStream, EncodeError> {
    encode(descriptor, NoteMode::Name)
}

/// Encodes a descriptor whose notes are raw MIDI numbers.
pub fn encode_note_numbers(descriptor: &PerformanceDescriptor) -> Result<EventStream, EncodeError> {
    encode(descriptor, NoteMode::Number)
}

/// Encodes a descriptor into a delta-timed event stream.
///
/// # Errors
///
/// - [`EncodeError::InvalidDescriptor`] if `beats` and `velocities` disagree
///   in shape, a value is out of range, or there are no notes at all
/// - [`EncodeError::InvalidNoteName`] / [`EncodeError::NoteOutOfRange`] if a
///   note cannot be resolved under `mode`
pub fn encode(descriptor: &PerformanceDescriptor, mode: NoteMode) -> Result<EventStream, EncodeError> {
    descriptor.validate()?;

    // Resolve everything up front so a bad note fails before any event is built.
    let beats = descriptor
        .beats
        .iter()
        .map(|beat| {
            beat.iter()
                .map(|note| note.midi_number(mode))
                .collect::<Result<Vec<u8>, _>>()
        })
        .collect::<Result<Vec<_>, _>>()?;

    let pad_pitch = descriptor
        .last_note()
        .ok_or_else(|| {
            EncodeError::InvalidDescriptor("no notes to carry the trailing silence".to_string())
        })?
        .midi_number(mode)?;

    let pause_ticks = seconds_to_ticks(descriptor.pause);
    let duration_ticks = seconds_to_ticks(descriptor.duration);

    let mut events = Vec::with_capacity(5 + 2 * descriptor.note_count());
    events.push(TimedEvent::new(
        0,
        MidiEvent::SetTempo {
            microseconds_per_beat: MICROSECONDS_PER_BEAT,
        },
    ));
    events.push(TimedEvent::new(
        0,
        MidiEvent::ControlChange {
            channel: CHANNEL,
            controller: CC_SUSTAIN,
            value: descriptor.pedal,
        },
    ));
    events.push(TimedEvent::new(
        0,
        MidiEvent::ControlChange {
            channel: CHANNEL,
            controller: CC_SOFT,
            value: 127,
        },
    ));

    for (pitches, velocities) in beats.iter().zip(&descriptor.velocities) {
        for (j, (&pitch, &velocity)) in pitches.iter().zip(velocities).enumerate() {
            let delta = if j == 0 { pause_ticks } else { 0 };
            events.push(TimedEvent::new(
                delta,
                MidiEvent::NoteOn {
                    channel: CHANNEL,
                    pitch,
                    velocity,
                },
            ));
        }
        for (j, (&pitch, &velocity)) in pitches.iter().zip(velocities).enumerate() {
            let delta = if j == 0 { duration_ticks } else { 0 };
            events.push(TimedEvent::new(
                delta,
                MidiEvent::NoteOff {
                    channel: CHANNEL,
                    pitch,
                    velocity,
                },
            ));
        }
    }

    events.push(TimedEvent::new(
        seconds_to_ticks(descriptor.silence),
        MidiEvent::NoteOn {
            channel: CHANNEL,
            pitch: pad_pitch,
            velocity: SILENCE_PAD_VELOCITY,
        },
    ));
    events.push(TimedEvent::new(
        seconds_to_ticks(SILENCE_PAD_HOLD_SECONDS),
        MidiEvent::NoteOff {
            channel: CHANNEL,
            pitch: pad_pitch,
            velocity: 0,
        },
    ));

    debug!(
        beats = beats.len(),
        events = events.len(),
        "encoded performance descriptor"
    );

    Ok(EventStream::new(events))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::{ticks_to_seconds, NoteRef};

    fn descriptor(beats: Vec<Vec<NoteRef>>, velocities: Vec<Vec<u8>>) -> PerformanceDescriptor {
        PerformanceDescriptor {
            beats,
            velocities,
            pedal: 64,
            pause: 0.5,
            duration: 1.0,
            silence: 0.2,
        }
    }

    fn chord() -> PerformanceDescriptor {
        descriptor(vec![vec!["C4".into(), "E4".into()]], vec![vec![80, 80]])
    }

    #[test]
    fn test_chord_layout() {
        let stream = encode_note_names(&chord()).unwrap();
        let events: Vec<_> = stream.events().to_vec();

        assert_eq!(
            events[0],
            TimedEvent::new(
                0,
                MidiEvent::SetTempo {
                    microseconds_per_beat: 500_000
                }
            )
        );
        assert_eq!(
            events[1].event,
            MidiEvent::ControlChange {
                channel: 0,
                controller: 64,
                value: 64
            }
        );
        assert_eq!(
            events[2].event,
            MidiEvent::ControlChange {
                channel: 0,
                controller: 67,
                value: 127
            }
        );
        assert_eq!(events[1].delta, 0);
        assert_eq!(events[2].delta, 0);

        // C4 carries the pause, E4 follows immediately
        assert_eq!(
            events[3],
            TimedEvent::new(
                100,
                MidiEvent::NoteOn {
                    channel: 0,
                    pitch: 60,
                    velocity: 80
                }
            )
        );
        assert_eq!(
            events[4],
            TimedEvent::new(
                0,
                MidiEvent::NoteOn {
                    channel: 0,
                    pitch: 64,
                    velocity: 80
                }
            )
        );
        assert_eq!(
            events[5],
            TimedEvent::new(
                200,
                MidiEvent::NoteOff {
                    channel: 0,
                    pitch: 60,
                    velocity: 80
                }
            )
        );
        assert_eq!(events[6].delta, 0);
        assert_eq!(events[6].event.pitch(), Some(64));

        // Silence pad reuses E4
        assert_eq!(
            events[7],
            TimedEvent::new(
                40,
                MidiEvent::NoteOn {
                    channel: 0,
                    pitch: 64,
                    velocity: 1
                }
            )
        );
        assert_eq!(
            events[8],
            TimedEvent::new(
                20,
                MidiEvent::NoteOff {
                    channel: 0,
                    pitch: 64,
                    velocity: 0
                }
            )
        );
        assert_eq!(events.len(), 9);
    }

    #[test]
    fn test_event_counts() {
        let d = descriptor(
            vec![
                vec!["C4".into(), "E4".into(), "G4".into()],
                vec!["D4".into()],
                vec!["F4".into(), "A4".into()],
            ],
            vec![vec![60, 70, 80], vec![90], vec![100, 110]],
        );
        let stream = encode_note_names(&d).unwrap();
        let notes = d.note_count();
        assert_eq!(stream.note_event_count(), 2 * notes + 2);
        assert_eq!(stream.len(), 2 * notes + 2 + 3);
    }

    #[test]
    fn test_timing_round_trip() {
        let mut d = chord();
        d.pause = 0.35;
        d.duration = 0.8;
        d.silence = 1.25;
        let stream = encode_note_names(&d).unwrap();
        let delays: Vec<f64> = stream.delays_seconds().collect();

        assert!((delays[3] - d.pause).abs() < 1e-9);
        assert!((delays[5] - d.duration).abs() < 1e-9);
        assert!((delays[7] - d.silence).abs() < 1e-9);
        assert!((ticks_to_seconds(stream.events()[8].delta.into()) - 0.1).abs() < 1e-9);

        let expected = d.pause + d.duration + d.silence + 0.1;
        assert!((stream.duration_seconds() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_silence_pad_uses_last_note_of_last_beat() {
        let d = descriptor(
            vec![vec!["G4".into()], vec!["A4".into(), "C5".into()]],
            vec![vec![90], vec![90, 90]],
        );
        let stream = encode_note_names(&d).unwrap();
        let events = stream.events();
        let n = events.len();
        assert_eq!(events[n - 2].event.pitch(), Some(72));
        assert_eq!(events[n - 1].event.pitch(), Some(72));
    }

    #[test]
    fn test_note_number_variant_matches_names() {
        let names = chord();
        let numbers = descriptor(vec![vec![60u8.into(), 64u8.into()]], vec![vec![80, 80]]);
        assert_eq!(
            encode_note_names(&names).unwrap(),
            encode_note_numbers(&numbers).unwrap()
        );
    }

    #[test]
    fn test_invalid_note_name_fails() {
        let d = descriptor(vec![vec!["H4".into()]], vec![vec![80]]);
        assert!(matches!(
            encode_note_names(&d),
            Err(EncodeError::InvalidNoteName { .. })
        ));
    }

    #[test]
    fn test_mismatched_velocities_fail_upfront() {
        let d = descriptor(vec![vec!["C4".into(), "E4".into()]], vec![vec![80]]);
        assert!(matches!(
            encode_note_names(&d),
            Err(EncodeError::InvalidDescriptor(_))
        ));
    }

    #[test]
    fn test_empty_performance_fails() {
        let d = descriptor(vec![], vec![]);
        assert!(matches!(
            encode_note_names(&d),
            Err(EncodeError::InvalidDescriptor(_))
        ));
    }
}
