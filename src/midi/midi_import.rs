//! Standard MIDI File (SMF) import for conditioning.
//!
//! Reads .mid files into second-based note spans and controller points.
//! Supports SMF Format 0 (single track) and Format 1 (multi-track) files.
//!
//! # Limitations
//!
//! - Only note on/off events and control changes are imported
//! - Tempo meta events from any track form one global tempo map
//! - SMPTE timecode timing and Format 2 files are rejected

use crate::error::ConditioningError;
use midly::{Format, MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Tempo assumed until the first tempo meta event (120 BPM).
const DEFAULT_MPQN: u32 = 500_000;

/// A sounding note, with times in seconds from the start of the file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteSpan {
    pub channel: u8,
    pub pitch: u8,
    pub velocity: u8,
    pub start: f64,
    pub end: f64,
}

impl NoteSpan {
    /// Returns true if the note sounds at `time` (start inclusive, end exclusive).
    pub fn is_active_at(&self, time: f64) -> bool {
        self.start <= time && time < self.end
    }
}

/// A control change at a point in time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlPoint {
    pub time: f64,
    pub channel: u8,
    pub controller: u8,
    pub value: u8,
}

/// Everything the conditioning loader needs from a MIDI file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportedPerformance {
    /// Notes sorted by start time.
    pub notes: Vec<NoteSpan>,
    /// Control changes sorted by time.
    pub controls: Vec<ControlPoint>,
    /// Time of the last event in the file.
    pub end_time: f64,
}

#[derive(Debug, Clone, Copy)]
struct TempoSegment {
    start_tick: u64,
    mpqn: u32,
    seconds_at_start: f64,
}

/// Piecewise-constant tempo map over absolute ticks.
struct TempoMap {
    segments: Vec<TempoSegment>,
    ticks_per_beat: f64,
}

impl TempoMap {
    fn new(mut changes: Vec<(u64, u32)>, ticks_per_beat: u16) -> Self {
        changes.sort_by_key(|(tick, _)| *tick);
        let ticks_per_beat = ticks_per_beat as f64;

        let mut segments: Vec<TempoSegment> = Vec::with_capacity(changes.len() + 1);
        segments.push(TempoSegment {
            start_tick: 0,
            mpqn: DEFAULT_MPQN,
            seconds_at_start: 0.0,
        });

        for (tick, mpqn) in changes {
            let Some(last) = segments.last().copied() else {
                continue;
            };
            let elapsed = (tick - last.start_tick) as f64 * last.mpqn as f64
                / 1_000_000.0
                / ticks_per_beat;
            let segment = TempoSegment {
                start_tick: tick,
                mpqn,
                seconds_at_start: last.seconds_at_start + elapsed,
            };
            // A change at the same tick replaces the previous tempo.
            if last.start_tick == tick {
                segments.pop();
                segments.push(TempoSegment {
                    seconds_at_start: last.seconds_at_start,
                    ..segment
                });
            } else {
                segments.push(segment);
            }
        }

        Self {
            segments,
            ticks_per_beat,
        }
    }

    fn seconds_at(&self, tick: u64) -> f64 {
        let index = self.segments.partition_point(|s| s.start_tick <= tick);
        let segment = self.segments[index.saturating_sub(1)];
        segment.seconds_at_start
            + (tick - segment.start_tick) as f64 * segment.mpqn as f64
                / 1_000_000.0
                / self.ticks_per_beat
    }
}

struct RawNote {
    channel: u8,
    pitch: u8,
    velocity: u8,
    start_tick: u64,
    end_tick: u64,
}

/// Imports a MIDI file for conditioning.
///
/// # Errors
///
/// Returns error if the file cannot be read or parsed, or uses an
/// unsupported format or timing.
pub fn import_from_midi<P: AsRef<Path>>(path: P) -> Result<ImportedPerformance, ConditioningError> {
    let data = fs::read(path.as_ref())?;
    let performance = parse_smf(&data)?;
    debug!(
        path = %path.as_ref().display(),
        notes = performance.notes.len(),
        controls = performance.controls.len(),
        "imported MIDI file"
    );
    Ok(performance)
}

/// Parses Standard MIDI File bytes.
pub fn parse_smf(bytes: &[u8]) -> Result<ImportedPerformance, ConditioningError> {
    let smf = Smf::parse(bytes).map_err(|e| ConditioningError::Parse(e.to_string()))?;

    let ticks_per_beat = match smf.header.timing {
        Timing::Metrical(tpb) => tpb.as_int(),
        Timing::Timecode(_, _) => {
            return Err(ConditioningError::UnsupportedFormat(
                "SMPTE timecode timing not supported".to_string(),
            ))
        }
    };
    if ticks_per_beat == 0 {
        return Err(ConditioningError::Parse(
            "header declares zero ticks per beat".to_string(),
        ));
    }
    if smf.header.format == Format::Sequential {
        return Err(ConditioningError::UnsupportedFormat(
            "Format 2 (sequential) MIDI files not supported".to_string(),
        ));
    }

    let mut tempo_changes: Vec<(u64, u32)> = Vec::new();
    let mut raw_notes: Vec<RawNote> = Vec::new();
    let mut raw_controls: Vec<(u64, u8, u8, u8)> = Vec::new();
    let mut last_tick: u64 = 0;

    for track in &smf.tracks {
        // Key is (channel, pitch), value is (start_tick, velocity).
        let mut active: HashMap<(u8, u8), (u64, u8)> = HashMap::new();
        let mut tick: u64 = 0;

        for event in track {
            tick += event.delta.as_int() as u64;

            match event.kind {
                TrackEventKind::Meta(MetaMessage::Tempo(mpqn)) => {
                    if mpqn.as_int() > 0 {
                        tempo_changes.push((tick, mpqn.as_int()));
                    }
                }
                TrackEventKind::Midi { channel, message } => {
                    let ch = channel.as_int();
                    match message {
                        MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                            let pitch = key.as_int();
                            // Re-striking a sounding key ends the previous note.
                            if let Some((start_tick, velocity)) = active.remove(&(ch, pitch)) {
                                raw_notes.push(RawNote {
                                    channel: ch,
                                    pitch,
                                    velocity,
                                    start_tick,
                                    end_tick: tick,
                                });
                            }
                            active.insert((ch, pitch), (tick, vel.as_int()));
                        }
                        MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                            let pitch = key.as_int();
                            if let Some((start_tick, velocity)) = active.remove(&(ch, pitch)) {
                                raw_notes.push(RawNote {
                                    channel: ch,
                                    pitch,
                                    velocity,
                                    start_tick,
                                    end_tick: tick,
                                });
                            }
                        }
                        MidiMessage::Controller { controller, value } => {
                            raw_controls.push((tick, ch, controller.as_int(), value.as_int()));
                        }
                        _ => {}
                    }
                }
                _ => {}
            }
        }

        // Close any notes the track left hanging at its last event.
        if !active.is_empty() {
            warn!(count = active.len(), "closing unterminated notes at end of track");
        }
        for ((channel, pitch), (start_tick, velocity)) in active {
            raw_notes.push(RawNote {
                channel,
                pitch,
                velocity,
                start_tick,
                end_tick: tick,
            });
        }
        last_tick = last_tick.max(tick);
    }

    let tempo_map = TempoMap::new(tempo_changes, ticks_per_beat);

    let mut notes: Vec<NoteSpan> = raw_notes
        .into_iter()
        .map(|n| NoteSpan {
            channel: n.channel,
            pitch: n.pitch,
            velocity: n.velocity,
            start: tempo_map.seconds_at(n.start_tick),
            end: tempo_map.seconds_at(n.end_tick),
        })
        .collect();
    notes.sort_by(|a, b| a.start.total_cmp(&b.start).then(a.pitch.cmp(&b.pitch)));

    let mut controls: Vec<ControlPoint> = raw_controls
        .into_iter()
        .map(|(tick, channel, controller, value)| ControlPoint {
            time: tempo_map.seconds_at(tick),
            channel,
            controller,
            value,
        })
        .collect();
    controls.sort_by(|a, b| a.time.total_cmp(&b.time));

    Ok(ImportedPerformance {
        notes,
        controls,
        end_time: tempo_map.seconds_at(last_tick),
    })
}
