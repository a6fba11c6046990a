//! Timed MIDI events produced by the encoder.

use super::ticks_to_seconds;
use serde::{Deserialize, Serialize};

/// A single MIDI message, independent of its timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MidiEvent {
    /// Set tempo: microseconds per quarter note
    SetTempo { microseconds_per_beat: u32 },
    /// Control change: channel, controller, value
    ControlChange {
        channel: u8,
        controller: u8,
        value: u8,
    },
    /// Note on: channel, pitch, velocity
    NoteOn { channel: u8, pitch: u8, velocity: u8 },
    /// Note off: channel, pitch, release velocity
    NoteOff { channel: u8, pitch: u8, velocity: u8 },
}

impl MidiEvent {
    /// Returns true for note-on and note-off messages.
    pub fn is_note(&self) -> bool {
        matches!(self, MidiEvent::NoteOn { .. } | MidiEvent::NoteOff { .. })
    }

    /// Returns the pitch of a note message.
    pub fn pitch(&self) -> Option<u8> {
        match self {
            MidiEvent::NoteOn { pitch, .. } | MidiEvent::NoteOff { pitch, .. } => Some(*pitch),
            _ => None,
        }
    }
}

/// A MIDI event with its delay, in ticks, since the previous event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedEvent {
    pub delta: u32,
    pub event: MidiEvent,
}

impl TimedEvent {
    pub fn new(delta: u32, event: MidiEvent) -> Self {
        Self { delta, event }
    }
}

/// Ordered, delta-timed events for a single track.
///
/// Built once by the encoder and not modified afterwards; the only way to
/// obtain one outside this module is through [`super::encode`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventStream {
    events: Vec<TimedEvent>,
}

impl EventStream {
    pub(super) fn new(events: Vec<TimedEvent>) -> Self {
        Self { events }
    }

    /// All events in order.
    pub fn events(&self) -> &[TimedEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of note-on and note-off events.
    ///
    /// For an encoded descriptor this is `2 * notes + 2`: one on/off pair per
    /// note plus the trailing silence pair.
    pub fn note_event_count(&self) -> usize {
        self.events.iter().filter(|e| e.event.is_note()).count()
    }

    /// Sum of all delta times in ticks.
    pub fn total_ticks(&self) -> u64 {
        self.events.iter().map(|e| u64::from(e.delta)).sum()
    }

    /// Total length of the stream in seconds at the fixed tempo.
    pub fn duration_seconds(&self) -> f64 {
        ticks_to_seconds(self.total_ticks())
    }

    /// Each event's delay since the previous event, in seconds.
    pub fn delays_seconds(&self) -> impl Iterator<Item = f64> + '_ {
        self.events.iter().map(|e| ticks_to_seconds(u64::from(e.delta)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_accessors() {
        let stream = EventStream::new(vec![
            TimedEvent::new(
                0,
                MidiEvent::SetTempo {
                    microseconds_per_beat: 500_000,
                },
            ),
            TimedEvent::new(
                100,
                MidiEvent::NoteOn {
                    channel: 0,
                    pitch: 60,
                    velocity: 90,
                },
            ),
            TimedEvent::new(
                200,
                MidiEvent::NoteOff {
                    channel: 0,
                    pitch: 60,
                    velocity: 90,
                },
            ),
        ]);

        assert_eq!(stream.len(), 3);
        assert_eq!(stream.note_event_count(), 2);
        assert_eq!(stream.total_ticks(), 300);
        assert!((stream.duration_seconds() - 1.5).abs() < 1e-9);
        assert_eq!(stream.events()[1].event.pitch(), Some(60));
    }

    #[test]
    fn test_total_ticks_past_u32() {
        let note_on = MidiEvent::NoteOn {
            channel: 0,
            pitch: 60,
            velocity: 90,
        };
        let stream = EventStream::new(vec![
            TimedEvent::new(u32::MAX, note_on),
            TimedEvent::new(u32::MAX, note_on),
        ]);

        assert_eq!(stream.total_ticks(), 2 * u32::MAX as u64);
        assert!(stream.duration_seconds() > u32::MAX as f64 * 0.005);
    }
}
