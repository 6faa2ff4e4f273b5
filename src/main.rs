//! Trylens - Face-Tracked Eyewear Overlay
//!
//! Headless entry point: plays a recorded frame sequence and landmark
//! recording through the overlay pipeline, optionally writing composited
//! snapshots.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use trylens::{
    capture::{CaptureConstraints, CaptureSession, ImageSequenceDevice},
    config::Config,
    controls,
    render::{Compositor, SoftwareBackend},
    scene::GltfLoader,
    scheduler::{FrameScheduler, RunOptions, SnapshotOptions},
    stage::AssetStage,
    tracking::{ProviderOptions, ReplayFactory, Tracker, TrackerStatus},
    PoseResolver,
};

/// Trylens - face-tracked eyewear overlay
#[derive(Parser, Debug)]
#[command(name = "trylens", version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory of video frames (overrides config)
    #[arg(short, long)]
    frames: Option<PathBuf>,

    /// JSON-lines landmark recording (overrides config)
    #[arg(short, long)]
    landmarks: Option<PathBuf>,

    /// Overlay model file (overrides config)
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Stop after this many ticks
    #[arg(short, long)]
    ticks: Option<u64>,

    /// Display refresh rate in Hz (overrides config)
    #[arg(long)]
    refresh_hz: Option<f32>,

    /// Write composited PNG snapshots to this directory
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,

    /// Snapshot every N ticks
    #[arg(long, default_value_t = 30)]
    snapshot_every: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(log_level.into())
                .from_env_lossy(),
        )
        .init();

    info!("Starting {} v{}", trylens::NAME, trylens::VERSION);

    let config = load_config(&args)?;

    let runtime = tokio::runtime::Runtime::new()?;
    let ticks = runtime.block_on(run(config))?;

    info!("Trylens stopped after {} ticks", ticks);
    Ok(())
}

/// Load configuration and apply CLI overrides.
fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = if let Some(ref path) = args.config {
        Config::from_file(path)?
    } else {
        Config::load()?
    };

    if let Some(ref frames) = args.frames {
        config.capture.frames_dir = frames.clone();
    }
    if let Some(ref landmarks) = args.landmarks {
        config.tracking.recording = landmarks.clone();
    }
    if let Some(ref model) = args.model {
        // Absolute so that it replaces assets_dir when joined
        let model = if model.is_absolute() {
            model.clone()
        } else {
            std::env::current_dir()?.join(model)
        };
        config.asset.model = model.display().to_string();
    }
    if let Some(ticks) = args.ticks {
        config.scheduler.max_ticks = Some(ticks);
    }
    if let Some(hz) = args.refresh_hz {
        config.scheduler.refresh_hz = hz;
    }
    if let Some(ref dir) = args.snapshot_dir {
        config.render.snapshot_dir = Some(dir.clone());
        config.render.snapshot_every = args.snapshot_every;
    }

    config.validate()?;

    info!("Frames: {}", config.capture.frames_dir.display());
    info!("Landmarks: {}", config.tracking.recording.display());
    info!("Model: {}", config.asset.model_path().display());

    Ok(config)
}

async fn run(config: Config) -> anyhow::Result<u64> {
    let (shutdown_tx, _) = broadcast::channel(1);

    let session = CaptureSession::new();
    let tracker = Tracker::spawn(
        ReplayFactory::new(&config.tracking.recording),
        ProviderOptions::from_config(&config.tracking),
    );

    let mut stage = AssetStage::new();
    stage.load_final(Arc::new(GltfLoader), config.asset.model_path());

    // Enable the camera as soon as the provider is ready
    let controls_task = {
        let session = session.clone();
        let mut handle = tracker.handle();
        let device = ImageSequenceDevice::from_config(&config.capture);
        let constraints = CaptureConstraints::from_config(&config.capture);
        let shutdown_tx = shutdown_tx.clone();

        tokio::spawn(async move {
            if handle.wait().await != TrackerStatus::Ready {
                error!("Landmark provider failed to warm up; the overlay will not track");
                return;
            }
            if let Err(e) =
                controls::enable_camera(&session, &handle, &device, &constraints).await
            {
                error!("Failed to enable camera: {}", e);
                let _ = shutdown_tx.send(());
                return;
            }
            let first_frame = session.on_first_frame();
            match first_frame.await {
                Ok(dims) => info!("Video running at {}x{}", dims.width, dims.height),
                Err(_) => warn!("Capture session ended before its first frame"),
            }
        })
    };

    // Translate Ctrl+C / SIGTERM into the scheduler's shutdown channel
    let signal_task = {
        let shutdown_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(());
        })
    };

    let snapshot = match &config.render.snapshot_dir {
        Some(dir) if config.render.snapshot_every > 0 => {
            tokio::fs::create_dir_all(dir).await?;
            Some(SnapshotOptions {
                dir: dir.clone(),
                every: config.render.snapshot_every,
            })
        }
        _ => None,
    };

    let compositor = Compositor::new(
        SoftwareBackend::new(config.capture.width, config.capture.height),
        &config.render,
    );
    let mut scheduler = FrameScheduler::new(
        session.clone(),
        tracker,
        stage,
        compositor,
        PoseResolver::new(config.calibration.clone()),
    );

    let options = RunOptions {
        refresh_hz: config.scheduler.refresh_hz,
        max_ticks: config.scheduler.max_ticks,
        snapshot,
    };
    let ticks = scheduler.run(options, shutdown_tx.subscribe()).await;

    controls::close_camera(&session);
    controls_task.abort();
    signal_task.abort();

    Ok(ticks)
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
