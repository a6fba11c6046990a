//! piano-kit - encode note sequences as MIDI and render them through a
//! synthesizer.
//!
//! # Usage
//!
//! ```bash
//! piano-kit encode chord.json -o chord.mid
//! piano-kit synthesize chord.json --duration 3 --piano-type 2 --wav chord.wav
//! piano-kit glissando scale.json --duration 8 --step-size 25 --wav gliss.wav
//! ```
//!
//! Set `RUST_LOG=debug` for pipeline details.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use ddsp_piano_kit::conditioning::{load_midi_as_conditioning, ConditioningConfig};
use ddsp_piano_kit::midi::{encode, export_to_midi, NoteMode, PerformanceDescriptor};
use ddsp_piano_kit::synthesis::{
    synthesize, synthesize_glissando, SineBank, SynthesisOptions, SynthesisOutput,
};
use std::fs;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "piano-kit",
    about = "Encode note sequences as MIDI and render them through a synthesizer"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a performance descriptor as a MIDI file.
    Encode {
        /// Performance descriptor (JSON).
        descriptor: PathBuf,

        /// Output MIDI file.
        #[arg(short, long, default_value = "out.mid")]
        output: PathBuf,

        /// Notes are MIDI numbers instead of names.
        #[arg(long, default_value_t = false)]
        note_numbers: bool,
    },

    /// Render a MIDI file as conditioning tensors and dump them as JSON.
    Conditioning {
        /// Input MIDI file.
        midi: PathBuf,

        /// Length of the timeline in seconds.
        #[arg(short, long)]
        duration: f64,

        /// Output JSON file.
        #[arg(short, long, default_value = "conditioning.json")]
        output: PathBuf,
    },

    /// Synthesize a performance with optional vibrato and velocity scaling.
    Synthesize {
        #[command(flatten)]
        render: RenderArgs,

        /// JSON file with synthesis options; flags below override it.
        #[arg(long)]
        options: Option<PathBuf>,

        /// Notes are MIDI numbers instead of names.
        #[arg(long)]
        note_numbers: bool,

        /// Vibrato rate in Hz.
        #[arg(long)]
        vibrato_frequency: Option<f64>,

        /// Vibrato depth in semitones.
        #[arg(long)]
        vibrato_amplitude: Option<f64>,

        /// Only apply vibrato to voice slots holding a note.
        #[arg(long)]
        vibrato_active_only: bool,

        /// Velocity multiplier.
        #[arg(long)]
        velocity_factor: Option<f64>,

        /// Save the full output bundle to this file.
        #[arg(long)]
        save_output: Option<PathBuf>,

        /// Keep the intermediate MIDI file at this path.
        #[arg(long)]
        midi: Option<PathBuf>,
    },

    /// Synthesize a performance with a stepwise glissando on the first voice.
    Glissando {
        #[command(flatten)]
        render: RenderArgs,

        /// Frames per semitone step.
        #[arg(long, default_value_t = 25)]
        step_size: usize,
    },
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// Performance descriptor (JSON).
    descriptor: PathBuf,

    /// Length of the conditioning timeline in seconds.
    #[arg(short, long)]
    duration: f64,

    /// Instrument variant id.
    #[arg(short, long, default_value_t = 0)]
    piano_type: i32,

    /// Write the synthesized audio as a 16 kHz WAV file.
    #[arg(short, long, default_value = "out.wav")]
    wav: PathBuf,
}

impl RenderArgs {
    fn load_descriptor(&self) -> Result<PerformanceDescriptor> {
        PerformanceDescriptor::load_from_file(&self.descriptor)
            .with_context(|| format!("Failed to load descriptor: {}", self.descriptor.display()))
    }

    fn finish(&self, output: &SynthesisOutput) -> Result<()> {
        info!(
            "Synthesized {} signals: {}",
            output.len(),
            output.names().collect::<Vec<_>>().join(", ")
        );
        output.save_as_wav(&self.wav)
    }
}

/// Main entry point.
fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Encode {
            descriptor,
            output,
            note_numbers,
        } => {
            let performance = PerformanceDescriptor::load_from_file(&descriptor)
                .with_context(|| format!("Failed to load descriptor: {}", descriptor.display()))?;
            let mode = if note_numbers {
                NoteMode::Number
            } else {
                NoteMode::Name
            };
            let stream = encode(&performance, mode)?;
            export_to_midi(&stream, &output)
                .with_context(|| format!("Failed to write MIDI file: {}", output.display()))?;
            info!(
                "Wrote {} events ({:.2} s) to {}",
                stream.len(),
                stream.duration_seconds(),
                output.display()
            );
        }

        Command::Conditioning {
            midi,
            duration,
            output,
        } => {
            let inputs = load_midi_as_conditioning(&midi, duration, &ConditioningConfig::default())
                .with_context(|| format!("Failed to load conditioning from {}", midi.display()))?;
            let json = serde_json::to_string(&inputs)?;
            fs::write(&output, json)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            info!(
                "Wrote {} frames x {} voices to {}",
                inputs.frames(),
                inputs.voices(),
                output.display()
            );
        }

        Command::Synthesize {
            render,
            options,
            note_numbers,
            vibrato_frequency,
            vibrato_amplitude,
            vibrato_active_only,
            velocity_factor,
            save_output,
            midi,
        } => {
            let mut synthesis_options = match options {
                Some(path) => SynthesisOptions::load_from_file(path)?,
                None => SynthesisOptions::default(),
            };
            synthesis_options.note_number_mode |= note_numbers;
            synthesis_options.vibrato_active_voices_only |= vibrato_active_only;
            if let Some(f) = vibrato_frequency {
                synthesis_options.vibrato_frequency = f;
            }
            if let Some(a) = vibrato_amplitude {
                synthesis_options.vibrato_amplitude = a;
            }
            if let Some(v) = velocity_factor {
                synthesis_options.velocity_factor = v;
            }
            if let Some(path) = save_output {
                synthesis_options.save_output = true;
                synthesis_options.output_path = path;
            }
            if midi.is_some() {
                synthesis_options.midi_path = midi;
            }

            let descriptor = render.load_descriptor()?;
            let mut model = SineBank::new();
            let output = synthesize(
                &descriptor,
                &mut model,
                render.duration,
                render.piano_type,
                &synthesis_options,
            )?;
            render.finish(&output)?;
        }

        Command::Glissando { render, step_size } => {
            let descriptor = render.load_descriptor()?;
            let mut model = SineBank::new();
            let output = synthesize_glissando(
                &descriptor,
                &mut model,
                render.duration,
                render.piano_type,
                step_size,
            )?;
            render.finish(&output)?;
        }
    }

    Ok(())
}
