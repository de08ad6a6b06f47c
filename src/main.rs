// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::path::{Path, PathBuf};

use clap::{crate_version, Parser, Subcommand};
use drumkit::audio::context::{DEFAULT_MAX_BLOCK_SIZE, DEFAULT_SAMPLE_RATE};
use drumkit::audio::cpal::OutputDevice;
use drumkit::audio::{AudioContext, MixParameters};
use drumkit::bounce::bounce_to_file;
use drumkit::config::{self, KitConfig};
use drumkit::midi::Timeline;
use drumkit::samples::table::VELOCITY_BRACKETS;
use drumkit::samples::{DrumEngine, FileLoader, Kit, KitLayout};
use drumkit::util::{filename_display, frames_minutes_seconds};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A velocity-layered, multi-microphone drum sample player."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validates a kit and reports any sample files that are missing.
    Kit {
        /// The path to the kit file. The built-in kit is used if omitted.
        path: Option<PathBuf>,
        /// Prints the kit as YAML instead of validating it.
        #[arg(short, long)]
        dump: bool,
    },
    /// Lists the mixer parameters of a kit.
    Params {
        /// The path to the kit file. The built-in kit is used if omitted.
        path: Option<PathBuf>,
    },
    /// Renders a MIDI file to a stereo WAV file.
    Bounce {
        /// The MIDI file to render.
        midi: PathBuf,
        /// The WAV file to write.
        output: PathBuf,
        /// The path to the kit file.
        #[arg(short, long)]
        kit: Option<PathBuf>,
        /// The output sample rate.
        #[arg(short = 'r', long, default_value_t = DEFAULT_SAMPLE_RATE)]
        sample_rate: u32,
        /// The number of frames rendered per block.
        #[arg(short, long, default_value_t = DEFAULT_MAX_BLOCK_SIZE)]
        block_size: usize,
        /// Seeds velocity layer selection for reproducible renders.
        #[arg(short, long)]
        seed: Option<u64>,
    },
    /// Plays a MIDI file through an audio interface.
    Play {
        /// The MIDI file to play.
        midi: PathBuf,
        /// The path to the kit file.
        #[arg(short, long)]
        kit: Option<PathBuf>,
        /// The device name to play through. The default output is used if omitted.
        #[arg(short, long)]
        device: Option<String>,
    },
    /// Lists the available audio output devices.
    Devices {},
}

/// Reads the kit file, or falls back to the built-in kit.
fn kit_config(path: Option<&Path>) -> Result<KitConfig, Box<dyn Error>> {
    Ok(match path {
        Some(path) => config::load_kit(path)?,
        None => KitConfig::builtin(),
    })
}

/// Loads every sample of a kit from disk and builds an engine around it.
fn load_engine(
    kit_path: Option<&Path>,
    context: AudioContext,
    seed: Option<u64>,
) -> Result<DrumEngine, Box<dyn Error>> {
    let kit_config = kit_config(kit_path)?;
    let root = config::sample_root(kit_path, &kit_config);
    let mut loader = FileLoader::new(&root, &context, kit_config.normalize());
    let kit = Kit::load(&kit_config, &mut loader)?;

    if !kit.missing().is_empty() {
        warn!(
            missing = kit.missing().len(),
            root = %root.display(),
            "Some samples could not be loaded and will be silent"
        );
    }
    info!(
        instruments = kit.layout().instruments().len(),
        memory_bytes = loader.total_memory_usage(),
        "Kit loaded"
    );

    Ok(match seed {
        Some(seed) => DrumEngine::with_seed(kit, context, seed),
        None => DrumEngine::new(kit, context),
    })
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Kit { path, dump } => {
            let kit_config = kit_config(path.as_deref())?;
            if dump {
                print!("{}", config::dump_kit(&kit_config)?);
                return Ok(());
            }

            let layout = KitLayout::from_config(&kit_config)?;
            println!(
                "Kit (strips: {}, buses: {}, components: {}, voices: {}):",
                layout.strips().len(),
                layout.buses().len(),
                layout.components().len(),
                layout.max_voices()
            );
            for instrument in layout.instruments() {
                println!(
                    "- {} (note {}, {} channels)",
                    instrument.name(),
                    instrument.note(),
                    instrument.channels().len()
                );
            }

            let root = config::sample_root(path.as_deref(), &kit_config);
            let mut missing = Vec::new();
            for component in kit_config.components() {
                for bracket in 1..=VELOCITY_BRACKETS {
                    for layer in 1..=usize::from(kit_config.layers_per_bracket()) {
                        let file = root.join(component.file_for(bracket, layer));
                        if !file.is_file() {
                            missing.push(file);
                        }
                    }
                }
            }

            if missing.is_empty() {
                println!("\nAll samples found in {}.", root.display());
            } else {
                println!("\nMissing samples (count: {}):", missing.len());
                for file in missing.iter() {
                    println!("- {}", filename_display(file));
                }
            }
        }
        Commands::Params { path } => {
            let layout = KitLayout::from_config(&kit_config(path.as_deref())?)?;
            let params = MixParameters::from_layout(&layout);

            println!("Parameters (count: {}):", params.parameter_count());
            for index in 0..params.parameter_count() {
                if let Some(info) = params.parameter_info(index) {
                    println!(
                        "{:>3} {:<28} {:<5} [{:.2}, {:.2}] default {}",
                        index,
                        info.name,
                        info.kind.to_string(),
                        info.min,
                        info.max,
                        params.parameter_text(index)
                    );
                }
            }
        }
        Commands::Bounce {
            midi,
            output,
            kit,
            sample_rate,
            block_size,
            seed,
        } => {
            let context = AudioContext::new(sample_rate, block_size)?;
            let timeline = Timeline::from_file(&midi, sample_rate)?;
            let mut engine = load_engine(kit.as_deref(), context, seed)?;

            let summary = bounce_to_file(&mut engine, &timeline, &output)?;
            println!(
                "Bounced {} ({}) to {}, peak {:.3}.",
                filename_display(&midi),
                frames_minutes_seconds(summary.frames, sample_rate),
                output.display(),
                summary.peak
            );
        }
        Commands::Play { midi, kit, device } => {
            let device = OutputDevice::get(device.as_deref())?;
            let sample_rate = device.default_sample_rate()?;
            let context = AudioContext::new(sample_rate, DEFAULT_MAX_BLOCK_SIZE)?;
            let timeline = Timeline::from_file(&midi, sample_rate)?;
            let engine = load_engine(kit.as_deref(), context, None)?;

            info!(
                device = device.name(),
                duration = frames_minutes_seconds(timeline.end_frame(), sample_rate),
                "Starting playback"
            );
            device.play(engine, timeline)?;
        }
        Commands::Devices {} => {
            let devices = OutputDevice::list()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
    }

    Ok(())
}
