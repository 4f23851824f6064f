//! Hand Joints - live hand skeleton visualizer
//!
//! Every joint of both tracked hands gets a small sphere and an RGB axis
//! gizmo, re-posed on each anchor update coming from the tracking session.

pub mod app;
pub mod config;
pub mod error;
pub mod markers;
pub mod pose;
pub mod provider;
pub mod scene;
pub mod session;
pub mod skeleton;
pub mod throughput;
pub mod tracking;
pub mod ui;

pub use config::Config;
pub use error::HandJointsError;

/// Application name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
