// src/config.rs - Runtime configuration loaded from TOML
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, HandJointsError};

const CONFIG_FILE_NAME: &str = "hand_joints.toml";

/// Highest accepted `source.rate_hz`.
pub const MAX_RATE_HZ: f64 = 10_000.0;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub markers: MarkerConfig,
    pub source: SourceConfig,
    pub diagnostics: DiagnosticsConfig,
    pub viewer: ViewerConfig,
}

/// How the axis gizmos are rescaled on a pose update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisScaleMode {
    /// Every joint update rescales the gizmos of all joints on that hand.
    FanOut,
    /// Each joint only rescales its own gizmo.
    PerJoint,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    pub sphere_radius: f32,
    pub axis_length: f32,
    pub axis_radius: f32,
    pub axis_scale: AxisScaleMode,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            sphere_radius: 0.003,
            axis_length: 0.01,
            axis_radius: 0.001,
            axis_scale: AxisScaleMode::FanOut,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Simulated,
    Replay,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    /// Anchor updates per second, per hand.
    pub rate_hz: f64,
    pub replay_path: Option<PathBuf>,
    /// Playback speed multiplier; 0 replays as fast as the consumer drains.
    pub replay_speed: f64,
    pub channel_capacity: usize,
    /// Every Nth simulated anchor is reported untracked. 0 disables dropouts.
    pub dropout_every: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Simulated,
            rate_hz: 90.0,
            replay_path: None,
            replay_speed: 1.0,
            channel_capacity: 64,
            dropout_every: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Log the average update rate every N events per hand.
    pub rate_log_every: u64,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self { rate_log_every: 90 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub enabled: bool,
    pub width: f32,
    pub height: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            width: 1280.0,
            height: 800.0,
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, HandJointsError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::ReadFile(format!("{}: {}", path.as_ref().display(), e)))?;

        Self::from_toml(&contents)
    }

    pub fn from_toml(s: &str) -> Result<Self, HandJointsError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()).into())
    }

    /// Working directory first, then the per-user config directory.
    pub fn load() -> Result<Self, HandJointsError> {
        let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
        if let Some(dir) = user_config_dir() {
            paths.push(dir.join(CONFIG_FILE_NAME));
        }

        for path in &paths {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn validate(&self) -> Result<(), HandJointsError> {
        let positive = [
            ("markers.sphere_radius", self.markers.sphere_radius as f64),
            ("markers.axis_length", self.markers.axis_length as f64),
            ("markers.axis_radius", self.markers.axis_radius as f64),
            ("source.rate_hz", self.source.rate_hz),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(invalid(field, "must be greater than 0"));
            }
        }

        if self.source.rate_hz > MAX_RATE_HZ {
            return Err(invalid("source.rate_hz", "must be at most 10000"));
        }

        if !(self.source.replay_speed.is_finite() && self.source.replay_speed >= 0.0) {
            return Err(invalid("source.replay_speed", "must be 0 or greater"));
        }

        if self.source.channel_capacity == 0 {
            return Err(invalid("source.channel_capacity", "must be at least 1"));
        }

        if self.source.kind == SourceKind::Replay && self.source.replay_path.is_none() {
            return Err(ConfigError::MissingField("source.replay_path".to_string()).into());
        }

        if self.diagnostics.rate_log_every == 0 {
            return Err(invalid("diagnostics.rate_log_every", "must be at least 1"));
        }

        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> HandJointsError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
    .into()
}

fn user_config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("com", "handjoints", "hand_joints").map(|dirs| dirs.config_dir().to_path_buf())
}
