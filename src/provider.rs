// src/provider.rs - Tracking provider boundary and JSON-lines replay source
use nalgebra::Matrix4;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::{ReplayError, SessionError};
use crate::skeleton::{HandSide, JointName};
use crate::tracking::{
    AnchorEvent, AnchorUpdate, AuthorizationStatus, Capability, HandAnchor, HandSkeleton, ProviderState,
    SessionEvent,
};

/// Something that can run a hand tracking session.
///
/// `start` either fails up front or returns the task that feeds `updates` and
/// `events`. The session ends when that task returns and the senders drop.
pub trait HandTrackingProvider: Send + 'static {
    fn name(&self) -> &str;

    fn is_supported(&self) -> bool {
        true
    }

    fn start(
        self: Box<Self>,
        updates: mpsc::Sender<AnchorUpdate>,
        events: mpsc::Sender<SessionEvent>,
    ) -> Result<JoinHandle<()>, SessionError>;
}

fn default_event() -> AnchorEvent {
    AnchorEvent::Updated
}

fn default_tracked() -> bool {
    true
}

/// One line of a recording. Matrices are 16 floats, column major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayRecord {
    pub t: f64,
    #[serde(default = "default_event")]
    pub event: AnchorEvent,
    pub chirality: HandSide,
    #[serde(default = "default_tracked")]
    pub is_tracked: bool,
    pub origin_from_anchor: [f32; 16],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joints: Option<BTreeMap<JointName, [f32; 16]>>,
}

fn to_columns(m: &Matrix4<f32>) -> [f32; 16] {
    let mut out = [0.0; 16];
    out.copy_from_slice(m.as_slice());
    out
}

impl ReplayRecord {
    pub fn parse(line: &str, line_number: usize) -> Result<Self, ReplayError> {
        serde_json::from_str(line).map_err(|e| ReplayError::Parse {
            line: line_number,
            message: e.to_string(),
        })
    }

    pub fn into_update(self) -> AnchorUpdate {
        let skeleton = self.joints.map(|joints| {
            let mut skeleton = HandSkeleton::default();
            for (joint, columns) in joints {
                skeleton.set(joint, Matrix4::from_column_slice(&columns));
            }
            skeleton
        });

        AnchorUpdate {
            event: self.event,
            anchor: HandAnchor {
                chirality: self.chirality,
                is_tracked: self.is_tracked,
                origin_from_anchor: Matrix4::from_column_slice(&self.origin_from_anchor),
                skeleton,
            },
            timestamp: self.t,
        }
    }
}

impl From<&AnchorUpdate> for ReplayRecord {
    fn from(update: &AnchorUpdate) -> Self {
        Self {
            t: update.timestamp,
            event: update.event,
            chirality: update.anchor.chirality,
            is_tracked: update.anchor.is_tracked,
            origin_from_anchor: to_columns(&update.anchor.origin_from_anchor),
            joints: update.anchor.skeleton.as_ref().map(|skeleton| {
                skeleton
                    .iter()
                    .map(|(joint, m)| (joint, to_columns(m)))
                    .collect()
            }),
        }
    }
}

/// Replays a JSON-lines recording of anchor updates.
#[derive(Debug, Clone)]
pub struct ReplayProvider {
    pub path: PathBuf,
    /// 1.0 is real time; 0 sends as fast as the consumer accepts.
    pub speed: f64,
}

impl ReplayProvider {
    pub fn new(path: impl Into<PathBuf>, speed: f64) -> Self {
        Self {
            path: path.into(),
            speed,
        }
    }
}

impl HandTrackingProvider for ReplayProvider {
    fn name(&self) -> &str {
        "replay"
    }

    fn start(
        self: Box<Self>,
        updates: mpsc::Sender<AnchorUpdate>,
        events: mpsc::Sender<SessionEvent>,
    ) -> Result<JoinHandle<()>, SessionError> {
        let file = std::fs::File::open(&self.path).map_err(|e| SessionError::Start {
            provider: self.name().to_string(),
            reason: ReplayError::Open {
                path: self.path.display().to_string(),
                source: e,
            }
            .to_string(),
        })?;

        tracing::info!("Replaying {} at {}x", self.path.display(), self.speed);

        Ok(tokio::spawn(async move {
            let _ = events
                .send(SessionEvent::AuthorizationChanged {
                    capability: Capability::HandTracking,
                    status: AuthorizationStatus::Allowed,
                })
                .await;

            let mut lines = BufReader::new(tokio::fs::File::from_std(file)).lines();
            let started = Instant::now();
            let mut first_t: Option<f64> = None;
            let mut line_number = 0usize;
            let mut sent = 0u64;
            let mut skipped = 0u64;

            loop {
                let line = match lines.next_line().await {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::error!("Recording read failed after line {}: {}", line_number, e);
                        break;
                    }
                };
                line_number += 1;

                if line.trim().is_empty() {
                    continue;
                }

                let record = match ReplayRecord::parse(&line, line_number) {
                    Ok(record) => record,
                    Err(e) => {
                        tracing::warn!("Skipping malformed recording entry: {}", e);
                        skipped += 1;
                        continue;
                    }
                };

                if self.speed > 0.0 {
                    let t0 = *first_t.get_or_insert(record.t);
                    let offset = ((record.t - t0) / self.speed).max(0.0);
                    let deadline = Duration::try_from_secs_f64(offset)
                        .ok()
                        .and_then(|offset| started.checked_add(offset));
                    let Some(deadline) = deadline else {
                        tracing::warn!(
                            "Skipping recording entry on line {}: timestamp {} is out of range",
                            line_number,
                            record.t
                        );
                        skipped += 1;
                        continue;
                    };
                    tokio::time::sleep_until(deadline).await;
                }

                if updates.send(record.into_update()).await.is_err() {
                    tracing::debug!("Anchor consumer dropped, stopping replay");
                    break;
                }
                sent += 1;
            }

            tracing::info!("Replay finished: {} updates sent, {} lines skipped", sent, skipped);
            let _ = events
                .send(SessionEvent::ProviderStateChanged {
                    state: ProviderState::Stopped,
                })
                .await;
        }))
    }
}
