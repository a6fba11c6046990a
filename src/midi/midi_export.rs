//! Standard MIDI File (SMF) export of an encoded event stream.
//!
//! # Format Details
//!
//! Writes SMF Format 1 with a single track:
//! - Header division: [`TICKS_PER_BEAT`] ticks per quarter note
//! - Track 0: the stream's events in order, closed by End-of-Track
//!
//! Delta times are taken from the stream unchanged; no sorting happens here.

use super::event::{EventStream, MidiEvent};
use super::TICKS_PER_BEAT;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// Writes a variable-length quantity (VLQ) used for delta times in MIDI.
///
/// VLQ encodes values using 7 bits per byte, with the MSB indicating
/// whether more bytes follow (1 = more bytes, 0 = last byte).
fn write_vlq(value: u32, buffer: &mut Vec<u8>) {
    if value == 0 {
        buffer.push(0);
        return;
    }

    let mut temp = value;
    let mut bytes = Vec::with_capacity(4);

    while temp > 0 {
        bytes.push((temp & 0x7F) as u8);
        temp >>= 7;
    }

    for (i, &byte) in bytes.iter().rev().enumerate() {
        if i < bytes.len() - 1 {
            buffer.push(byte | 0x80);
        } else {
            buffer.push(byte);
        }
    }
}

/// Writes a single MIDI event to the buffer (without delta time).
fn write_event(event: &MidiEvent, buffer: &mut Vec<u8>) {
    match event {
        MidiEvent::NoteOn {
            channel,
            pitch,
            velocity,
        } => {
            buffer.push(0x90 | (channel & 0x0F));
            buffer.push(pitch & 0x7F);
            buffer.push(velocity & 0x7F);
        }
        MidiEvent::NoteOff {
            channel,
            pitch,
            velocity,
        } => {
            buffer.push(0x80 | (channel & 0x0F));
            buffer.push(pitch & 0x7F);
            buffer.push(velocity & 0x7F);
        }
        MidiEvent::ControlChange {
            channel,
            controller,
            value,
        } => {
            buffer.push(0xB0 | (channel & 0x0F));
            buffer.push(controller & 0x7F);
            buffer.push(value & 0x7F);
        }
        MidiEvent::SetTempo {
            microseconds_per_beat,
        } => {
            // Meta event: FF 51 03 tt tt tt
            buffer.push(0xFF);
            buffer.push(0x51);
            buffer.push(0x03);
            buffer.push((microseconds_per_beat >> 16) as u8);
            buffer.push((microseconds_per_beat >> 8) as u8);
            buffer.push(*microseconds_per_beat as u8);
        }
    }
}

/// Builds the track chunk body, appending End-of-Track.
fn build_track_data(stream: &EventStream) -> Vec<u8> {
    let mut buffer = Vec::new();
    for timed_event in stream.events() {
        write_vlq(timed_event.delta, &mut buffer);
        write_event(&timed_event.event, &mut buffer);
    }

    // End of track: 00 FF 2F 00
    write_vlq(0, &mut buffer);
    buffer.extend_from_slice(&[0xFF, 0x2F, 0x00]);
    buffer
}

/// Writes a track chunk to the output.
fn write_track_chunk<W: Write>(writer: &mut W, track_data: &[u8]) -> std::io::Result<()> {
    writer.write_all(b"MTrk")?;
    let length = track_data.len() as u32;
    writer.write_all(&length.to_be_bytes())?;
    writer.write_all(track_data)?;
    Ok(())
}

fn write_smf<W: Write>(stream: &EventStream, writer: &mut W) -> std::io::Result<()> {
    writer.write_all(b"MThd")?;
    writer.write_all(&6u32.to_be_bytes())?; // Header length (always 6)
    writer.write_all(&1u16.to_be_bytes())?; // Format 1
    writer.write_all(&1u16.to_be_bytes())?; // One track
    writer.write_all(&TICKS_PER_BEAT.to_be_bytes())?;

    let track_data = build_track_data(stream);
    write_track_chunk(writer, &track_data)
}

/// Serializes an event stream to Standard MIDI File bytes.
pub fn to_smf_bytes(stream: &EventStream) -> Vec<u8> {
    let mut bytes = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = write_smf(stream, &mut bytes);
    bytes
}

/// Writes an event stream to a Standard MIDI File.
///
/// # Errors
///
/// Returns error if file creation or writing fails
pub fn export_to_midi<P: AsRef<Path>>(stream: &EventStream, path: P) -> std::io::Result<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    write_smf(stream, &mut writer)?;
    writer.flush()?;

    debug!(
        path = %path.as_ref().display(),
        events = stream.len(),
        "wrote MIDI file"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::{encode_note_names, PerformanceDescriptor};
    use midly::num::{u15, u24, u4, u7};
    use midly::{Format, MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};

    #[test]
    fn test_vlq_encoding() {
        let mut buffer = Vec::new();

        write_vlq(0, &mut buffer);
        assert_eq!(buffer, vec![0x00]);
        buffer.clear();

        write_vlq(127, &mut buffer);
        assert_eq!(buffer, vec![0x7F]);
        buffer.clear();

        write_vlq(128, &mut buffer);
        assert_eq!(buffer, vec![0x81, 0x00]);
        buffer.clear();

        write_vlq(0x3FFF, &mut buffer);
        assert_eq!(buffer, vec![0xFF, 0x7F]);
        buffer.clear();

        write_vlq(0x4000, &mut buffer);
        assert_eq!(buffer, vec![0x81, 0x80, 0x00]);
    }

    #[test]
    fn test_smf_parses_back() {
        let descriptor = PerformanceDescriptor {
            beats: vec![vec!["C4".into(), "E4".into()]],
            velocities: vec![vec![80, 80]],
            pedal: 64,
            pause: 0.5,
            duration: 1.0,
            silence: 0.2,
        };
        let stream = encode_note_names(&descriptor).unwrap();
        let bytes = to_smf_bytes(&stream);
        let smf = Smf::parse(&bytes).unwrap();

        assert_eq!(smf.header.format, Format::Parallel);
        assert_eq!(smf.header.timing, Timing::Metrical(u15::new(100)));
        assert_eq!(smf.tracks.len(), 1);

        let track = &smf.tracks[0];
        // Stream events plus End-of-Track
        assert_eq!(track.len(), stream.len() + 1);
        assert_eq!(
            track[0].kind,
            TrackEventKind::Meta(MetaMessage::Tempo(u24::new(500_000)))
        );
        assert_eq!(track[3].delta.as_int(), 100);
        assert_eq!(
            track[3].kind,
            TrackEventKind::Midi {
                channel: u4::new(0),
                message: MidiMessage::NoteOn {
                    key: u7::new(60),
                    vel: u7::new(80),
                },
            }
        );
        assert_eq!(
            track[track.len() - 1].kind,
            TrackEventKind::Meta(MetaMessage::EndOfTrack)
        );
    }
}
