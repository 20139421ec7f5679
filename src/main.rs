//! Paper Piano - play a printed keyboard through a camera
//!
//! Replays a recorded session (a directory of frames plus an optional
//! fingertip track) through the engine and plays the keys that get pressed.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use paper_piano::capture::DirectoryFrameSource;
use paper_piano::config::{self, AppConfig};
use paper_piano::overlay::{self, OverlayStyle};
use paper_piano::playback::PlaybackDispatcher;
use paper_piano::storage;
use paper_piano::tracking::{FingertipSource, NoFingertips, ScriptedFingertips};
use paper_piano::PianoEngine;

/// Paper Piano - a printed keyboard played through a camera
#[derive(Parser, Debug)]
#[command(name = "paper-piano")]
#[command(about = "Turn a printed paper keyboard seen by a camera into an instrument")]
struct Args {
    /// Config file (defaults to the per-user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process a recorded session
    Run {
        /// Directory of frame images, processed in file-name order
        #[arg(long)]
        frames: PathBuf,

        /// JSON fingertip track for the frames
        #[arg(long)]
        fingertips: Option<PathBuf>,

        /// Sound clip directory (overrides the config)
        #[arg(long)]
        sounds: Option<PathBuf>,

        /// Do not open an audio device
        #[arg(long)]
        no_sound: bool,

        /// Write the diagnostic views of every frame here
        #[arg(long)]
        dump: Option<PathBuf>,

        /// Freeze detection once this many frames have been processed
        #[arg(long)]
        freeze_after: Option<u64>,
    },
    /// Write the default config file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    ShowConfig,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = match args.config {
        Some(path) => path,
        None => storage::default_config_path()?,
    };

    match args.command {
        Command::Run {
            frames,
            fingertips,
            sounds,
            no_sound,
            dump,
            freeze_after,
        } => {
            let config = load_or_default_config(&config_path)?;
            let options = RunOptions {
                frames,
                fingertips,
                sounds,
                no_sound,
                dump,
                freeze_after,
            };
            run_session(config, options)
        }
        Command::InitConfig { force } => init_config(&config_path, force),
        Command::ShowConfig => {
            let config = load_or_default_config(&config_path)?;
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

struct RunOptions {
    frames: PathBuf,
    fingertips: Option<PathBuf>,
    sounds: Option<PathBuf>,
    no_sound: bool,
    dump: Option<PathBuf>,
    freeze_after: Option<u64>,
}

/// Load configuration from file, or use defaults when there is none
fn load_or_default_config(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        let config = config::load_config(path)
            .with_context(|| format!("Invalid configuration in {:?}", path))?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    } else {
        info!("Using default configuration");
        Ok(AppConfig::default())
    }
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{:?} already exists (use --force to overwrite)", path);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    config::save_config(&AppConfig::default(), path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

fn run_session(config: AppConfig, options: RunOptions) -> Result<()> {
    info!("Paper Piano starting...");

    let mut frames = DirectoryFrameSource::open(&options.frames, config.detection.mirror)
        .with_context(|| format!("Cannot open frames in {:?}", options.frames))?;
    if frames.is_empty() {
        warn!("No frames found in {:?}", options.frames);
    }

    let mut fingertips: Box<dyn FingertipSource> = match &options.fingertips {
        Some(path) => Box::new(
            ScriptedFingertips::from_file(path)
                .with_context(|| format!("Cannot load fingertip track {:?}", path))?,
        ),
        None => Box::new(NoFingertips),
    };

    let mut engine = PianoEngine::new(&config);
    if let Some(dispatcher) = build_dispatcher(&config, &options) {
        engine = engine.with_dispatcher(dispatcher);
    }

    if let Some(dir) = &options.dump {
        std::fs::create_dir_all(dir).with_context(|| format!("Cannot create {:?}", dir))?;
    }

    let style = OverlayStyle::default();
    let controls = engine.controls().clone();
    let summary = engine.run(&mut frames, fingertips.as_mut(), |frame, report, engine| {
        if let Some(dir) = &options.dump {
            let views = overlay::render(engine, frame, report, &style);
            let main_path = dir.join(format!("main_{:05}.png", frame.index));
            if let Err(e) = views.main.save(&main_path) {
                warn!("Failed to write {:?}: {}", main_path, e);
            }
            if let Some(warped) = views.warped {
                let warped_path = dir.join(format!("warped_{:05}.png", frame.index));
                if let Err(e) = warped.save(&warped_path) {
                    warn!("Failed to write {:?}: {}", warped_path, e);
                }
            }
        }

        if options.freeze_after == Some(frame.index + 1) {
            info!("Freezing detection after frame {}", frame.index);
            controls.set_freeze(true);
        }
    });

    println!(
        "{} frames, {} accepted, {} failed, {} skipped, {} notes played",
        summary.frames, summary.accepted, summary.failed, summary.skipped_frames, summary.triggers
    );
    Ok(())
}

/// Playback dispatcher for the session, or `None` when playback is disabled
fn build_dispatcher(config: &AppConfig, options: &RunOptions) -> Option<PlaybackDispatcher> {
    let sounds_dir = match options.sounds.clone().or_else(|| config.playback.sounds_dir.clone()) {
        Some(dir) => dir,
        None => storage::default_sounds_dir().unwrap_or_else(|e| {
            warn!("No data directory for sound clips: {}", e);
            PathBuf::from("sounds")
        }),
    };
    PlaybackDispatcher::for_session(&config.playback, &sounds_dir, options.no_sound)
}
