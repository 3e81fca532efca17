mod registry;

use anyhow::{Context, bail};
use carlink::config::CarlinkConfig;
use carlink::link::{LinkEvent, VbcLinkOptions, VlcLinkOptions, spawn_vbc_link, spawn_vlc_link};
use carlink::source::{
    CHANNEL_CAPACITY, DEFAULT_FRAME_CADENCE, SourceError, list_frames, load_signal_log, spawn_frame_replay,
    spawn_sample_replay,
};
use carlink::{VbcDecoder, VlcDecoder};
use clap::{Parser, Subcommand};
use registry::Registry;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "carlink_replay")]
#[command(about = "Replay recorded VLC frames and VBC signal logs through the carlink decoders", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Force debug logging
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a directory of recorded camera frames
    Vlc {
        #[arg(long)]
        frames: PathBuf,

        /// Write every frame with ROI outlines to this directory
        #[arg(long)]
        overlay_out: Option<PathBuf>,

        /// Delay between frames; 0 replays as fast as possible
        #[arg(long, default_value = "20")]
        cadence_ms: u64,

        /// Bits per assembled value (8 = vehicle id, 16 = vehicle info)
        #[arg(long)]
        value_bits: Option<u32>,
    },

    /// Decode a recorded vibration signal log
    Vbc {
        #[arg(long)]
        signal_log: PathBuf,
    },

    /// Decode both recordings concurrently
    Both {
        #[arg(long)]
        frames: PathBuf,

        #[arg(long)]
        signal_log: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Argument Parsing & Setup ---
    let cli = Cli::parse();
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match &cli.config {
        Some(path) => CarlinkConfig::load(path)
            .await
            .with_context(|| format!("loading config {}", path.display()))?,
        None => CarlinkConfig::default(),
    };
    let registry = Registry::from_entries(&config.registry);
    debug!(entries = registry.len(), "registry ready");

    // --- 2. Replay ---
    match cli.command {
        Commands::Vlc {
            frames,
            overlay_out,
            cadence_ms,
            value_bits,
        } => {
            let options = VlcLinkOptions {
                value_bits: value_bits.unwrap_or(config.vlc.value_bits),
                emit_preview: overlay_out.is_some(),
            };
            let cadence = Duration::from_millis(cadence_ms);
            run_vlc(&config, &registry, &frames, overlay_out.as_deref(), cadence, options).await
        }
        Commands::Vbc { signal_log } => run_vbc(&config, &registry, &signal_log).await,
        Commands::Both { frames, signal_log } => {
            let options = VlcLinkOptions {
                value_bits: config.vlc.value_bits,
                emit_preview: false,
            };
            futures::try_join!(
                run_vlc(&config, &registry, &frames, None, DEFAULT_FRAME_CADENCE, options),
                run_vbc(&config, &registry, &signal_log),
            )?;
            Ok(())
        }
    }
}

async fn run_vlc(
    config: &CarlinkConfig,
    registry: &Registry,
    frames_dir: &Path,
    overlay_out: Option<&Path>,
    cadence: Duration,
    options: VlcLinkOptions,
) -> anyhow::Result<()> {
    let paths = list_frames(frames_dir)
        .await
        .with_context(|| format!("listing frames in {}", frames_dir.display()))?;
    if paths.is_empty() {
        bail!("no frames found in {}", frames_dir.display());
    }
    if let Some(dir) = overlay_out {
        tokio::fs::create_dir_all(dir).await?;
    }
    info!(frames = paths.len(), "vlc replay start");

    let decoder = VlcDecoder::from_config(&config.vlc)?;
    let (frames_tx, frames_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let source = spawn_frame_replay(paths, cadence, frames_tx);
    let (mut events, link) = spawn_vlc_link(decoder, frames_rx, options)?;

    let mut preview_index = 0u32;
    while let Some(event) = events.recv().await {
        match event {
            LinkEvent::Value(value) => report("vlc", value, registry),
            LinkEvent::Preview(frame) => {
                if let Some(dir) = overlay_out {
                    frame.save(dir.join(format!("{preview_index:05}.png")))?;
                    preview_index += 1;
                }
            }
            LinkEvent::Bits(bits) => debug!(?bits, "vlc bits"),
        }
    }

    let decoder = link.await??;
    finish_source(source.await?)?;
    info!(state = ?decoder.state(), "vlc replay done");
    Ok(())
}

async fn run_vbc(config: &CarlinkConfig, registry: &Registry, signal_log: &Path) -> anyhow::Result<()> {
    let samples = load_signal_log(signal_log, config.vbc.sample_mask)
        .await
        .with_context(|| format!("reading signal log {}", signal_log.display()))?;
    info!(samples = samples.len(), "vbc replay start");

    let decoder = VbcDecoder::from_config(&config.vbc)?;
    let options = VbcLinkOptions {
        value_bits: config.vbc.value_bits,
        stop_after_value: config.vbc.stop_after_value,
    };
    let (samples_tx, samples_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let source = spawn_sample_replay(samples, samples_tx);
    let (mut events, link) = spawn_vbc_link(decoder, samples_rx, options)?;

    while let Some(event) = events.recv().await {
        if let LinkEvent::Value(value) = event {
            report("vbc", value, registry);
        }
    }

    let decoder = link.await??;
    finish_source(source.await?)?;
    info!(state = ?decoder.state(), "vbc replay done");
    Ok(())
}

/// A source cut off by its link (value found, link stopped) is a normal end.
fn finish_source(result: Result<usize, SourceError>) -> anyhow::Result<()> {
    match result {
        Ok(sent) => {
            debug!(sent, "source drained");
            Ok(())
        }
        Err(SourceError::ChannelClosed) => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn report(channel: &str, value: u32, registry: &Registry) {
    println!("[{channel}] 0x{value:02X} -> {}", registry.lookup(value));
}
