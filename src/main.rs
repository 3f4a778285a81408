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
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use clap::{crate_version, Args, Parser, Subcommand};

use reslicer::config::ProjectConfig;
use reslicer::decode;
use reslicer::detect::EnergyDetector;
use reslicer::engine::Engine;
use reslicer::playback::device;
use reslicer::regions::note_name;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A marker-grid recording slicer."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

/// Project settings shared by the analysis commands. Command line flags win
/// over the project file, which wins over the stock defaults.
#[derive(Args)]
struct ProjectArgs {
    /// The path to a project YAML file.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Tempo override in beats per minute.
    #[arg(long)]
    bpm: Option<f64>,
    /// Rows-per-bar override.
    #[arg(long)]
    subdivisions_per_bar: Option<u32>,
    /// MIDI key assigned to the first region.
    #[arg(long)]
    base_pitch: Option<u8>,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Detects onsets in a recording and prints the quantized markers.
    Analyze {
        /// The path to the WAV recording.
        file: PathBuf,
        #[clap(flatten)]
        project: ProjectArgs,
    },
    /// Detects onsets and prints the derived sampler regions.
    Regions {
        /// The path to the WAV recording.
        file: PathBuf,
        #[clap(flatten)]
        project: ProjectArgs,
    },
    /// Plays a recording (or a time range of it) through the audio interface.
    Play {
        /// The path to the WAV recording.
        file: PathBuf,
        /// The device name to play through.
        #[arg(short, long)]
        device: Option<String>,
        /// Preview start time in seconds.
        #[arg(long)]
        start: Option<f64>,
        /// Preview end time in seconds.
        #[arg(long)]
        end: Option<f64>,
        /// Preview volume, 0.0 through 1.0.
        #[arg(short, long)]
        volume: Option<f32>,
        #[clap(flatten)]
        project: ProjectArgs,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices {} => {
            let devices = device::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Analyze { file, project } => {
            let engine = load(&file, &project, None)?;
            let analysis = engine.detect(&EnergyDetector::default());

            match analysis.bpm {
                Some(bpm) => println!("Estimated tempo: {:.1} bpm", bpm),
                None => println!("No tempo estimate; using {:.1} bpm", engine.grid().bpm()),
            }

            let markers = engine.markers();
            if markers.is_empty() {
                println!("No onsets detected.");
                return Ok(());
            }

            let grid = engine.grid();
            let sample_rate = engine.buffer().sample_rate();
            println!("Markers (count: {}):", markers.len());
            for marker in markers {
                let sample = (marker * f64::from(sample_rate)).round() as usize;
                println!(
                    "- {:.3}s (row {})",
                    marker,
                    grid.row_of_sample(sample, sample_rate)
                );
            }
        }
        Commands::Regions { file, project } => {
            let engine = load(&file, &project, None)?;
            engine.detect(&EnergyDetector::default());

            let sample_name = reslicer::util::filename_display(&file).to_string();
            println!("Regions:");
            for region in engine.export_regions() {
                println!(
                    "{}  # {}, {} frames",
                    region.export_line(&sample_name),
                    note_name(region.pitch),
                    region.len()
                );
            }
        }
        Commands::Play {
            file,
            device,
            start,
            end,
            volume,
            project,
        } => {
            let engine = load(&file, &project, volume)?;
            let device_name = match &device {
                Some(device) => device.clone(),
                None => {
                    let config = project_config(&project)?;
                    config.device().to_string()
                }
            };
            engine.attach_output(&device_name)?;

            match (start, end) {
                (None, None) => engine.play_all(),
                (start, end) => engine.play_range(
                    start.unwrap_or(0.0),
                    end.unwrap_or_else(|| engine.duration_seconds()),
                ),
            }

            // The playing flag is published by the audio thread once it
            // picks the command up, so give it a moment before polling.
            thread::sleep(Duration::from_millis(200));
            while engine.is_playing() {
                thread::sleep(Duration::from_millis(50));
            }
        }
    }

    Ok(())
}

/// Reads the project configuration, falling back to defaults when no file
/// was given.
fn project_config(project: &ProjectArgs) -> Result<ProjectConfig, Box<dyn Error>> {
    Ok(match &project.config {
        Some(path) => ProjectConfig::load(path)?,
        None => ProjectConfig::default(),
    })
}

/// Builds an engine from the project settings and loads the recording.
fn load(
    file: &PathBuf,
    project: &ProjectArgs,
    volume: Option<f32>,
) -> Result<Engine, Box<dyn Error>> {
    let config = project_config(project)?;
    let engine = Engine::new(&config);

    if let Some(bpm) = project.bpm {
        if !engine.set_bpm(bpm) {
            return Err(format!("invalid tempo: {}", bpm).into());
        }
    }
    if let Some(subdivisions) = project.subdivisions_per_bar {
        if !engine.set_subdivisions_per_bar(subdivisions) {
            return Err(format!("invalid rows per bar: {}", subdivisions).into());
        }
    }
    if let Some(base_pitch) = project.base_pitch {
        engine.set_base_pitch(base_pitch);
    }
    if let Some(volume) = volume {
        engine.set_volume(volume);
    }

    if !engine.load_buffer(decode::decode_wav_mono(file)?) {
        return Err("buffer load was not confirmed by the playback side".into());
    }
    Ok(engine)
}
