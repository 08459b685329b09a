use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};
use loopscape_core::{
    AnimationEngine, AppConfig, CaptionTrack, FrameCadence, JsonLinesSink, LogListener,
    OutlineFileLoader, Recorder, RecorderStatus, RecordingSettings, RenderGraph, Viewport,
};
use tracing_subscriber::EnvFilter;

fn main() -> loopscape_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            common,
            frames,
            fps,
            realtime,
        } => run_headless(&common, frames, fps, realtime),
        Commands::Record {
            common,
            output,
            fps,
        } => run_record(&common, output, fps),
        Commands::Check { common } => run_check(&common),
    }
}

fn load_config(path: Option<&Path>) -> loopscape_core::Result<AppConfig> {
    match path {
        Some(path) => AppConfig::from_path(path),
        None => {
            let config = AppConfig::default();
            config.validate()?;
            Ok(config)
        }
    }
}

/// Builds the engine, applies the viewport and requests the configured
/// outline files.
fn prepare(
    common: &CommonArgs,
    config: &AppConfig,
    graph: &mut RenderGraph,
) -> loopscape_core::Result<AnimationEngine> {
    let mut engine = AnimationEngine::new(config)?;
    engine.resize(Viewport::new(common.width, common.height), graph);
    for asset in &config.assets {
        engine.request_asset(&OutlineFileLoader, asset.clone());
    }
    Ok(engine)
}

fn run_headless(
    common: &CommonArgs,
    frames: Option<u64>,
    fps: u32,
    realtime: bool,
) -> loopscape_core::Result<()> {
    let config = load_config(common.config.as_deref())?;
    let cadence = FrameCadence::new(fps)?;
    let frames = frames.unwrap_or_else(|| cadence.frames_for(config.loop_duration));
    tracing::info!(frames, fps = cadence.fps(), realtime, "starting headless run");

    let mut graph = RenderGraph::new();
    let mut engine = prepare(common, &config, &mut graph)?;
    let mut listeners = (CaptionTrack::new(&config.overlay), LogListener);
    let started = Instant::now();

    for index in 0..frames {
        let elapsed = cadence.elapsed_at(index);
        if realtime {
            let due = Duration::from_secs_f32(elapsed);
            if let Some(wait) = due.checked_sub(started.elapsed()) {
                std::thread::sleep(wait);
            }
        }
        let frame = engine.tick(elapsed, &mut listeners, &mut graph);
        listeners.0.advance(frame.elapsed);
        tracing::debug!(
            frame = frame.frame,
            progress = frame.progress,
            draw_calls = frame.draw_calls(),
            captions = listeners.0.on_screen().count(),
            "tick"
        );
    }

    if let Some(last) = graph.last_frame() {
        tracing::info!(
            frames = graph.frames_submitted(),
            loops = engine.clock().loop_index(),
            sequence = last.sequence,
            progress = last.progress,
            draw_calls = last.draw_calls(),
            "headless run complete"
        );
    }
    Ok(())
}

fn run_record(common: &CommonArgs, output: PathBuf, fps: u32) -> loopscape_core::Result<()> {
    let config = load_config(common.config.as_deref())?;
    let cadence = FrameCadence::new(fps)?;
    let settings = RecordingSettings {
        output_path: output.display().to_string(),
        fps,
        duration: None,
    };

    let mut graph = RenderGraph::new();
    let mut engine = prepare(common, &config, &mut graph)?;
    let mut recorder = Recorder::new(settings, JsonLinesSink::create(&output)?)?;
    recorder.start(0.0, config.loop_duration)?;

    let mut index = 0;
    loop {
        let frame = engine.tick(cadence.elapsed_at(index), &mut LogListener, &mut graph);
        if recorder.capture(&frame)? == RecorderStatus::Finished {
            break;
        }
        index += 1;
    }

    tracing::info!(?output, frames = recorder.captured(), "recording written");
    Ok(())
}

fn run_check(common: &CommonArgs) -> loopscape_core::Result<()> {
    let config = load_config(common.config.as_deref())?;
    let table = config.sequence_table()?;

    println!("loop duration: {}s", table.loop_duration());
    for interval in table.intervals() {
        println!(
            "  sequence {:>3}: [{:>6.2}, {:>6.2})",
            interval.id, interval.start, interval.end
        );
    }
    println!(
        "network: {} nodes, {} connection records",
        config.network.node_count,
        config.network.node_count * config.network.node_count.saturating_sub(1) / 2
    );
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Looping presentation background animation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// JSON configuration file. Built-in defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Output width in pixels.
    #[arg(long, default_value_t = 1920)]
    width: u32,
    /// Output height in pixels.
    #[arg(long, default_value_t = 1080)]
    height: u32,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Drive the animation headlessly, logging sequence changes.
    Run {
        #[command(flatten)]
        common: CommonArgs,
        /// Number of frames to run. Defaults to one loop.
        #[arg(short, long)]
        frames: Option<u64>,
        #[arg(long, default_value_t = 60)]
        fps: u32,
        /// Pace frames against the wall clock instead of running flat out.
        #[arg(long)]
        realtime: bool,
    },
    /// Render exactly one loop into a JSON-lines frame recording.
    Record {
        #[command(flatten)]
        common: CommonArgs,
        /// Destination file.
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long, default_value_t = 60)]
        fps: u32,
    },
    /// Validate the configuration and print the sequence table.
    Check {
        #[command(flatten)]
        common: CommonArgs,
    },
}
