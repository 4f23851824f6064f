// src/session.rs - Tracking session lifecycle and session event monitoring
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::{Config, SourceKind};
use crate::error::SessionError;
use crate::provider::{HandTrackingProvider, ReplayProvider};
use crate::tracking::{AnchorUpdate, AuthorizationStatus, Capability, SessionEvent, SimulatedHands};

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Receiving ends of a running session.
pub struct SessionChannels {
    pub updates: mpsc::Receiver<AnchorUpdate>,
    pub events: mpsc::Receiver<SessionEvent>,
    pub task: JoinHandle<()>,
}

pub struct TrackingSession;

impl TrackingSession {
    /// Starts `provider` once. Failures are logged here and returned; the
    /// caller keeps running without fresh poses.
    pub fn start(
        provider: Box<dyn HandTrackingProvider>,
        channel_capacity: usize,
    ) -> Result<SessionChannels, SessionError> {
        let name = provider.name().to_string();

        if !provider.is_supported() {
            let err = SessionError::Unsupported(name);
            tracing::error!("{}", err);
            return Err(err);
        }

        tracing::info!("Tracking session starting ({})", name);

        let (update_tx, updates) = mpsc::channel(channel_capacity);
        let (event_tx, events) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        match provider.start(update_tx, event_tx) {
            Ok(task) => Ok(SessionChannels { updates, events, task }),
            Err(e) => {
                tracing::error!("Tracking session error: {}", e);
                Err(e)
            }
        }
    }
}

/// Builds the provider selected by `config.source`.
pub fn provider_from_config(config: &Config) -> Result<Box<dyn HandTrackingProvider>, SessionError> {
    let source = &config.source;
    match source.kind {
        SourceKind::Simulated => Ok(Box::new(
            SimulatedHands::new(source.rate_hz).with_dropouts(source.dropout_every),
        )),
        SourceKind::Replay => {
            let path = source.replay_path.clone().ok_or_else(|| SessionError::Start {
                provider: "replay".to_string(),
                reason: "no recording path configured".to_string(),
            })?;
            Ok(Box::new(ReplayProvider::new(path, source.replay_speed)))
        }
    }
}

/// Consumes session events until the session goes away. Loss of hand
/// tracking authorization is reported and published, nothing more.
pub async fn monitor_session_events(
    mut events: mpsc::Receiver<SessionEvent>,
    authorization: watch::Sender<Option<AuthorizationStatus>>,
) {
    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::AuthorizationChanged {
                capability: Capability::HandTracking,
                status,
            } => {
                if status == AuthorizationStatus::Allowed {
                    tracing::info!("Hand tracking authorized");
                } else {
                    tracing::warn!(
                        "Hand tracking authorization is {:?}; grant it again in system settings",
                        status
                    );
                }
                authorization.send_replace(Some(status));
            }
            other => tracing::info!("Session event {:?}", other),
        }
    }
    tracing::debug!("Session event stream closed");
}
