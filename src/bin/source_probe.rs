use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use hand_joints::config::{Config, SourceKind};
use hand_joints::markers::JointRegistry;
use hand_joints::pose::PosePipeline;
use hand_joints::scene::SceneGraph;
use hand_joints::session::{provider_from_config, TrackingSession};
use hand_joints::skeleton::HandSide;

/// Runs a tracking source without the viewer and reports what arrived
#[derive(Parser, Debug)]
#[command(name = "source_probe", version, about)]
struct Args {
    /// Replay a JSON-lines recording instead of the simulated hands
    #[arg(long)]
    replay: Option<PathBuf>,

    /// How long to listen
    #[arg(long, default_value_t = 3.0)]
    seconds: f64,
}

fn main() {
    let args = Args::parse();
    println!("Testing hand tracking source...\n");

    let mut config = Config::default();
    if let Some(path) = args.replay {
        config.source.kind = SourceKind::Replay;
        config.source.replay_path = Some(path);
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            println!("✗ Failed to start async runtime: {}", e);
            return;
        }
    };

    runtime.block_on(async {
        let session = provider_from_config(&config)
            .and_then(|provider| TrackingSession::start(provider, config.source.channel_capacity));

        let session = match session {
            Ok(session) => {
                println!("✓ Tracking session started ({:?})", config.source.kind);
                session
            }
            Err(e) => {
                println!("✗ Failed to start tracking session: {}", e);
                println!("\nPossible causes:");
                println!("1. Recording path does not exist");
                println!("2. Update rate is not positive");
                return;
            }
        };

        let registry = JointRegistry::populate(&mut SceneGraph::new(), &config.markers);
        let (pipeline, _snapshots) = PosePipeline::new(registry, &config);
        let mut consumer = tokio::spawn(pipeline.run(session.updates));

        let pipeline = tokio::select! {
            result = &mut consumer => result,
            _ = tokio::time::sleep(Duration::from_secs_f64(args.seconds.max(0.0))) => {
                session.task.abort();
                consumer.await
            }
        };

        let pipeline = match pipeline {
            Ok(pipeline) => pipeline,
            Err(e) => {
                println!("✗ Pose pipeline failed: {}", e);
                return;
            }
        };

        for side in HandSide::BOTH {
            let status = pipeline.status(side);
            if status.updates == 0 {
                println!("✗ No {} hand updates received", side);
                continue;
            }
            match status.rate {
                Some(rate) => println!("✓ {} hand: {} updates, {:.1} per second", side, status.updates, rate),
                None => println!("✓ {} hand: {} update", side, status.updates),
            }
        }
    });
}
