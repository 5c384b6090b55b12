/// Object sighting tracker service binary
///
/// Replays frames from a directory through a detector, tracks sightings and
/// announces them. Control commands are read line by line from stdin.

use anyhow::Context;
use clap::Parser;
use sighting_tracker::{
    render_ledger_text, Collaborators, CommandNarrator, Detection, DirectoryDisplay, DisplaySink,
    EnrichmentLookup, ImageDirectorySource, LogDisplay, LogNarrator, Narrator, ScriptedDetector,
    SightingTracker, StaticLookup, TrackerConfig, WikidataLookup,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "sighting-service")]
#[command(about = "Track and announce objects seen by a video detector", long_about = None)]
struct Cli {
    /// Directory of frames to replay
    #[arg(long)]
    frames: PathBuf,

    /// JSON file with per-frame detections for the scripted detector
    #[arg(long)]
    script: Option<PathBuf>,

    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the latest frame and ledger here instead of only logging
    #[arg(long)]
    output: Option<PathBuf>,

    /// Speech program to run for announcements (e.g. espeak)
    #[arg(long)]
    speech_command: Option<String>,

    /// Skip the remote description lookup
    #[arg(long)]
    offline: bool,

    /// Start detecting immediately
    #[arg(long)]
    autostart: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let cli = Cli::parse();
    info!("Starting AetherOS Sighting Tracker");

    let config = load_config(cli.config.as_deref())?;
    let tracker = build_tracker(&cli, config)?;

    if cli.autostart {
        tracker.start().await;
    }

    println!("Commands: start | pause | resume | toggle | clear | status | quit");
    run_control_loop(&tracker).await?;

    tracker.shutdown().await;
    info!("Sighting tracker service stopped");
    Ok(())
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sighting_tracker=info,sighting_service=info".into()),
        )
        .init();
}

/// Defaults, then the config file, then `SIGHTING_*` environment overrides
fn load_config(path: Option<&Path>) -> anyhow::Result<TrackerConfig> {
    let config = match path {
        Some(path) => TrackerConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => TrackerConfig::default(),
    };

    Ok(config.with_env_overrides()?)
}

fn load_script(path: &Path) -> anyhow::Result<Vec<Vec<Detection>>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading detection script {}", path.display()))?;
    Ok(serde_json::from_str(&raw)?)
}

fn build_tracker(cli: &Cli, config: TrackerConfig) -> anyhow::Result<SightingTracker> {
    let source = ImageDirectorySource::open(&cli.frames)
        .with_context(|| format!("opening frame directory {}", cli.frames.display()))?;
    if source.is_empty() {
        warn!("No images found in {}", cli.frames.display());
    }

    let script = match &cli.script {
        Some(path) => load_script(path)?,
        None => Vec::new(),
    };

    let lookup: Arc<dyn EnrichmentLookup> = if cli.offline {
        Arc::new(StaticLookup::new())
    } else {
        Arc::new(WikidataLookup::new(config.lookup.clone())?)
    };

    let narrator: Arc<dyn Narrator> = match &cli.speech_command {
        Some(program) if program == "espeak" => Arc::new(CommandNarrator::espeak()),
        Some(program) => Arc::new(CommandNarrator::new(program.clone())),
        None => Arc::new(LogNarrator),
    };

    let display: Arc<dyn DisplaySink> = match &cli.output {
        Some(dir) => Arc::new(DirectoryDisplay::new(dir)?),
        None => Arc::new(LogDisplay),
    };

    let tracker = SightingTracker::new(
        config,
        Collaborators {
            source: Box::new(source),
            detector: Box::new(ScriptedDetector::new(script)),
            lookup,
            narrator,
            display,
        },
    )?;

    Ok(tracker)
}

/// Read commands until `quit`, end of input, or Ctrl-C, echoing sightings
async fn run_control_loop(tracker: &SightingTracker) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("Input closed");
                    break;
                };

                match line.trim() {
                    "" => {}
                    "start" => tracker.start().await,
                    "pause" => {
                        tracker.set_paused(true).await;
                        println!("[{}]", tracker.pause_label().await);
                    }
                    "resume" => {
                        tracker.set_paused(false).await;
                        println!("[{}]", tracker.pause_label().await);
                    }
                    "toggle" => {
                        tracker.toggle_pause().await;
                        println!("[{}]", tracker.pause_label().await);
                    }
                    "clear" => tracker.clear().await,
                    "status" => {
                        let stats = tracker.stats().await;
                        println!("{}", render_ledger_text(&tracker.snapshot().await));
                        println!(
                            "state={} frames={} skipped={} accepted={} debounced={}",
                            stats.state,
                            stats.frames_processed,
                            stats.frames_skipped,
                            stats.sightings_accepted,
                            stats.sightings_debounced
                        );
                    }
                    "quit" | "q" => break,
                    other => warn!("Unknown command: {}", other),
                }
            }
            event = tracker.recv_event() => {
                match event {
                    Some(event) => println!(
                        "{} {} (total {})",
                        if event.is_new { "NEW" } else { "AGAIN" },
                        event.label,
                        event.count
                    ),
                    None => {
                        error!("Sighting event channel closed");
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    Ok(())
}
