use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use morph_core::{geometry, AppConfig, AudioPlayer, NullDevice, OutputDevice, Session, WavDecoder};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "cpal")]
mod cpal_device;
mod terminal;

fn main() -> morph_core::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            audio,
            config,
            log_file,
        } => {
            // The terminal owns stdout, so logs go to a file or nowhere.
            let target = match log_file {
                Some(path) => LogTarget::File(path),
                None => LogTarget::Discard,
            };
            init_tracing(target)?;
            run_session(config.as_deref(), audio)
        }
        Commands::Mesh {
            subdivisions,
            size,
            radius,
            output,
        } => {
            init_tracing(LogTarget::Stderr)?;
            run_mesh_export(subdivisions, size, radius, &output)
        }
    }
}

fn run_session(config_path: Option<&Path>, audio: Option<PathBuf>) -> morph_core::Result<()> {
    let mut config = match config_path {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if audio.is_some() {
        config.audio.track = audio;
    }
    tracing::info!(?config_path, track = ?config.audio.track, "starting interactive session");

    let player = AudioPlayer::new(Box::new(WavDecoder), output_device());
    let mut session = Session::new(config, Box::new(player))?;
    terminal::run(&mut session)
}

fn run_mesh_export(
    subdivisions: u32,
    size: f64,
    radius: f64,
    output: &Path,
) -> morph_core::Result<()> {
    let geometry = geometry::build(size, subdivisions, radius)?;
    std::fs::write(output, geometry.to_json()?)?;
    tracing::info!(
        ?output,
        vertices = geometry.vertex_count(),
        edges = geometry.edges.len(),
        "mesh written"
    );
    Ok(())
}

#[cfg(feature = "cpal")]
fn output_device() -> Box<dyn OutputDevice> {
    match cpal_device::CpalDevice::open_default() {
        Ok(device) => Box::new(device),
        Err(err) => {
            tracing::warn!(error = %err, "no audio output, playing silently");
            Box::new(NullDevice::new())
        }
    }
}

#[cfg(not(feature = "cpal"))]
fn output_device() -> Box<dyn OutputDevice> {
    Box::new(NullDevice::new())
}

enum LogTarget {
    Stderr,
    File(PathBuf),
    Discard,
}

fn init_tracing(target: LogTarget) -> morph_core::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let _ = match target {
        LogTarget::Stderr => builder.with_writer(std::io::stderr).try_init(),
        LogTarget::File(path) => {
            let file = std::fs::File::create(path)?;
            builder
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .try_init()
        }
        LogTarget::Discard => builder.with_writer(std::io::sink).try_init(),
    };
    Ok(())
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Cube to sphere morph animation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Open the interactive morph in the terminal.
    Run {
        /// WAV track to play alongside the animation.
        #[arg(short, long)]
        audio: Option<PathBuf>,
        /// JSON configuration file; defaults are used for missing fields.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Write logs to this file.
        #[arg(long)]
        log_file: Option<PathBuf>,
    },
    /// Build the cube and sphere meshes and write them as JSON.
    Mesh {
        /// Grid cells along every cube face edge.
        #[arg(short = 'n', long, default_value_t = 5)]
        subdivisions: u32,
        /// Half the cube edge length.
        #[arg(short, long, default_value_t = 1.0)]
        size: f64,
        /// Radius of the target sphere.
        #[arg(short, long, default_value_t = 1.0)]
        radius: f64,
        /// Output path for the JSON mesh.
        output: PathBuf,
    },
}
