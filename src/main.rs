//! Hand Joints - live hand skeleton visualizer
//!
//! Main entry point for the viewer and headless runner.

use anyhow::Context;
use clap::Parser;
use eframe::egui;
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hand_joints::{
    app::HandJointsApp,
    config::{AxisScaleMode, Config, SourceKind},
    markers::JointRegistry,
    pose::PosePipeline,
    scene::SceneGraph,
    session::{monitor_session_events, provider_from_config, SessionChannels, TrackingSession},
    skeleton::HandSide,
    HandJointsError,
};

/// Hand Joints - draws every tracked hand joint with its axis gizmo
#[derive(Parser, Debug)]
#[command(name = "hand_joints", version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run without the viewer window
    #[arg(long)]
    headless: bool,

    /// Replay a JSON-lines recording instead of the simulated hands
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Simulated update rate per hand (overrides config)
    #[arg(long)]
    rate: Option<f64>,

    /// Rescale only the updated joint's axes
    #[arg(long)]
    per_joint_axes: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(log_level.into())
                .from_env_lossy(),
        )
        .init();

    info!("Starting {} v{}", hand_joints::NAME, hand_joints::VERSION);

    let config = load_config(&args)?;
    let headless = args.headless || !config.viewer.enabled;

    info!("Tracking source: {:?}", config.source.kind);
    info!("Axis scaling: {:?}", config.markers.axis_scale);

    // Build tokio runtime manually so the main thread stays free for the UI event loop
    let runtime = tokio::runtime::Runtime::new().context("failed to build async runtime")?;
    let _guard = runtime.enter();

    let mut scene = SceneGraph::new();
    let registry = JointRegistry::populate(&mut scene, &config.markers);
    info!("Registered joint markers ({} scene entities)", scene.len());

    let (pipeline, snapshots) = PosePipeline::new(registry, &config);
    let (authorization_tx, authorization) = watch::channel(None);

    let session = provider_from_config(&config)
        .and_then(|provider| TrackingSession::start(provider, config.source.channel_capacity));

    let pipeline_task = match session {
        Ok(SessionChannels { updates, events, task }) => {
            runtime.spawn(monitor_session_events(events, authorization_tx));
            runtime.spawn(async move {
                if let Err(e) = task.await {
                    error!("Tracking provider task failed: {}", e);
                }
            });
            Ok(runtime.spawn(pipeline.run(updates)))
        }
        Err(e) => {
            error!("Tracking session unavailable: {}", e);
            Err(e)
        }
    };

    if !headless {
        let options = eframe::NativeOptions {
            viewport: egui::ViewportBuilder::default()
                .with_inner_size([config.viewer.width, config.viewer.height])
                .with_min_inner_size([800.0, 600.0]),
            centered: true,
            ..Default::default()
        };

        let session_active = pipeline_task.is_ok();
        let expected_rate = config.source.rate_hz;

        // eframe::run_native blocks the main thread (winit requirement)
        let result = eframe::run_native(
            "Hand Joints",
            options,
            Box::new(move |cc| {
                cc.egui_ctx.set_visuals(egui::Visuals::dark());
                Box::new(HandJointsApp::new(
                    cc,
                    snapshots,
                    authorization,
                    scene,
                    session_active,
                    expected_rate,
                ))
            }),
        );

        if let Err(e) = result {
            error!("UI error: {}", e);
        }

        info!("Viewer closed, shutting down");
        drop(_guard);
        runtime.shutdown_timeout(std::time::Duration::from_secs(1));
        return Ok(());
    }

    // Headless mode without a session has nothing to run
    let pipeline_task = pipeline_task.map_err(HandJointsError::from)?;

    runtime.block_on(async {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    error!("Failed to listen for shutdown signal: {}", e);
                }
                info!("Shutdown signal received");
            }
            result = pipeline_task => match result {
                Ok(pipeline) => {
                    for side in HandSide::BOTH {
                        let status = pipeline.status(side);
                        info!("{} hand: {} updates, tracked {}", side, status.updates, status.tracked);
                    }
                }
                Err(e) => error!("Pose pipeline task failed: {}", e),
            },
        }
    });

    info!("Hand Joints stopped");
    Ok(())
}

/// Config file (or defaults) with CLI overrides applied, validated.
fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = if let Some(ref path) = args.config {
        Config::from_file(path).with_context(|| format!("loading {}", path.display()))?
    } else {
        Config::load()?
    };

    // Apply CLI overrides
    if let Some(ref path) = args.replay {
        config.source.kind = SourceKind::Replay;
        config.source.replay_path = Some(path.clone());
    }
    if let Some(rate) = args.rate {
        config.source.rate_hz = rate;
    }
    if args.per_joint_axes {
        config.markers.axis_scale = AxisScaleMode::PerJoint;
    }

    // Validate configuration
    config.validate()?;
    Ok(config)
}
