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
use std::time::Duration;

use clap::{crate_version, Parser, Subcommand};
use duration_string::DurationString;
use tracing_subscriber::EnvFilter;

use tracklab::audio;
use tracklab::config::catalog::{load_catalog, SampleCatalog};
use tracklab::config::EngineConfig;
use tracklab::samples::Catalog;
use tracklab::tracks::Track;
use tracklab::util::{duration_display, filename_display};
use tracklab::Engine;

/// Extra time to wait after a sample so the device can drain.
const PLAYBACK_TAIL: Duration = Duration::from_millis(100);

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A multi-track sample pad, recorder and mixdown engine."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the sample packs and their samples.
    Samples {
        /// A sample catalog file. The built-in packs are listed otherwise.
        #[arg(short, long)]
        catalog: Option<PathBuf>,
        /// Prints the catalog as YAML, suitable as a starting point for a catalog file.
        #[arg(long)]
        yaml: bool,
    },
    /// Lists the available audio devices.
    Devices {},
    /// Plays samples through the output device, one after the other.
    Play {
        /// The path to the engine config.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// The ids of the samples to play.
        #[arg(required = true)]
        sample_ids: Vec<String>,
    },
    /// Records each track in turn from the input device and exports the mixdown.
    Record {
        /// The path to the engine config.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// The tracks to record, in order.
        #[arg(short, long = "track", required = true)]
        tracks: Vec<u32>,
        /// How long to record each track (e.g. 5s).
        #[arg(short, long)]
        duration: String,
        /// Where to write the mixdown. Defaults to the configured file name.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Mixes audio files down to one stereo WAV. The files become tracks 1..N.
    Mixdown {
        /// The path to the engine config.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Where to write the mixdown.
        output: PathBuf,
        /// The audio files to mix.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Samples { catalog, yaml } => {
            let catalog = match catalog {
                Some(path) => load_catalog(&path)?,
                None => Catalog::builtin(),
            };

            if yaml {
                print!("{}", SampleCatalog::from_catalog(&catalog).serialize()?);
                return Ok(());
            }

            for pack in catalog.packs() {
                println!("{} ({}): {}", pack.name(), pack.id(), pack.description());
                for sample in pack.samples() {
                    match sample.file() {
                        Some(file) => println!(
                            "- {}: {} [{}] ({})",
                            sample.id(),
                            sample.name(),
                            sample.category(),
                            filename_display(file)
                        ),
                        None => println!(
                            "- {}: {} [{}]",
                            sample.id(),
                            sample.name(),
                            sample.category()
                        ),
                    }
                }
            }
        }
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Play { config, sample_ids } => {
            let engine = Engine::new(EngineConfig::load(config.as_deref())?)?;

            for sample_id in sample_ids.iter() {
                let Some(audio) = engine.bank().get(sample_id) else {
                    println!("Unknown sample {}.", sample_id);
                    continue;
                };
                engine.play(sample_id);
                tokio::time::sleep(audio.duration() + PLAYBACK_TAIL).await;
            }

            engine.shutdown().await;
        }
        Commands::Record {
            config,
            tracks,
            duration,
            output,
        } => {
            let duration: Duration = DurationString::from_string(duration)?.into();
            let engine = Engine::new(EngineConfig::load(config.as_deref())?)?;

            for track_id in tracks.iter() {
                if !engine.start_recording(*track_id).await {
                    engine.shutdown().await;
                    return Err(format!("unable to start recording track {}", track_id).into());
                }
                println!("Recording track {} for {}...", track_id, duration_display(duration));
                tokio::time::sleep(duration).await;

                match engine.stop_recording(*track_id).await {
                    Ok(handle) => println!(
                        "Recorded track {} ({})",
                        track_id,
                        duration_display(handle.duration())
                    ),
                    Err(e) => println!("Track {} was not recorded: {}", track_id, e),
                }
            }

            let tracks: Vec<Track> = tracks
                .iter()
                .map(|id| Track::new(*id, &format!("Track {}", id)))
                .collect();
            let exported = engine.export(&tracks, output.as_deref()).await;
            engine.shutdown().await;

            match exported? {
                Some(path) => println!("Wrote mixdown to {}.", path.display()),
                None => println!("Nothing to export."),
            }
        }
        Commands::Mixdown {
            config,
            output,
            files,
        } => {
            let engine = Engine::new(EngineConfig::load(config.as_deref())?)?;

            let mut tracks = Vec::with_capacity(files.len());
            for (index, file) in files.iter().enumerate() {
                let track_id = index as u32 + 1;
                engine.import(track_id, file)?;
                tracks.push(Track::new(track_id, filename_display(file)));
            }

            let mixed = engine.mixdown(&tracks).await;
            engine.shutdown().await;

            match mixed? {
                Some(mixdown) => {
                    mixdown.write(&output)?;
                    println!(
                        "Wrote {} ({}, {} Hz).",
                        output.display(),
                        duration_display(mixdown.duration()),
                        mixdown.sample_rate()
                    );
                }
                None => println!("Nothing to export."),
            }
        }
    }

    Ok(())
}
