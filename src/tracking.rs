// src/tracking.rs - Hand anchor updates and the simulated hand source
use nalgebra::{Isometry3, Matrix4, Translation3, UnitQuaternion, Vector3};
use std::f32::consts::FRAC_PI_2;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::SessionError;
use crate::provider::HandTrackingProvider;
use crate::skeleton::{HandSide, JointMap, JointName};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorEvent {
    Added,
    Updated,
    Removed,
}

/// Joint-local transforms of one hand, relative to the hand anchor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandSkeleton {
    joints: JointMap<Option<Matrix4<f32>>>,
}

impl HandSkeleton {
    pub fn from_fn(f: impl FnMut(JointName) -> Option<Matrix4<f32>>) -> Self {
        Self {
            joints: JointMap::from_fn(f),
        }
    }

    pub fn joint(&self, joint: JointName) -> Option<&Matrix4<f32>> {
        self.joints[joint].as_ref()
    }

    pub fn set(&mut self, joint: JointName, anchor_from_joint: Matrix4<f32>) {
        self.joints[joint] = Some(anchor_from_joint);
    }

    pub fn remove(&mut self, joint: JointName) -> Option<Matrix4<f32>> {
        self.joints[joint].take()
    }

    pub fn iter(&self) -> impl Iterator<Item = (JointName, &Matrix4<f32>)> {
        self.joints
            .iter()
            .filter_map(|(joint, transform)| transform.as_ref().map(|t| (joint, t)))
    }
}

/// Pose of one hand for one tracking frame.
#[derive(Debug, Clone, PartialEq)]
pub struct HandPose {
    pub origin_from_anchor: Matrix4<f32>,
    pub skeleton: Option<HandSkeleton>,
}

impl HandPose {
    pub fn joint_transform(&self, joint: JointName) -> Option<&Matrix4<f32>> {
        self.skeleton.as_ref().and_then(|skeleton| skeleton.joint(joint))
    }
}

/// Most recent knowledge about a hand.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum HandSample {
    Tracked(HandPose),
    #[default]
    Untracked,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HandAnchor {
    pub chirality: HandSide,
    pub is_tracked: bool,
    pub origin_from_anchor: Matrix4<f32>,
    pub skeleton: Option<HandSkeleton>,
}

impl HandAnchor {
    pub fn pose(self) -> HandPose {
        HandPose {
            origin_from_anchor: self.origin_from_anchor,
            skeleton: self.skeleton,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnchorUpdate {
    pub event: AnchorEvent,
    pub anchor: HandAnchor,
    /// Seconds since the source started.
    pub timestamp: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    HandTracking,
    WorldSensing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationStatus {
    NotDetermined,
    Allowed,
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderState {
    Running,
    Stopped,
}

/// Status events emitted by a session next to the anchor stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    AuthorizationChanged {
        capability: Capability,
        status: AuthorizationStatus,
    },
    ProviderStateChanged {
        state: ProviderState,
    },
}

// Anchor-space layout of the simulated hand. Fingers extend along -Z and are
// spread along X; the left hand is mirrored.
const FINGER_SEGMENTS: [f32; 4] = [0.045, 0.04, 0.025, 0.02];
const THUMB_SEGMENTS: [f32; 3] = [0.035, 0.03, 0.025];
const FOREARM_LENGTH: f32 = 0.25;

// `tokio::time::interval` rejects a zero period.
const MIN_TICK_PERIOD: Duration = Duration::from_nanos(1);

struct FingerLayout {
    joints: [JointName; 5],
    spread: f32,
    phase: f32,
}

const FINGERS: [FingerLayout; 4] = [
    FingerLayout {
        joints: [
            JointName::IndexFingerMetacarpal,
            JointName::IndexFingerKnuckle,
            JointName::IndexFingerIntermediateBase,
            JointName::IndexFingerIntermediateTip,
            JointName::IndexFingerTip,
        ],
        spread: 0.025,
        phase: 0.0,
    },
    FingerLayout {
        joints: [
            JointName::MiddleFingerMetacarpal,
            JointName::MiddleFingerKnuckle,
            JointName::MiddleFingerIntermediateBase,
            JointName::MiddleFingerIntermediateTip,
            JointName::MiddleFingerTip,
        ],
        spread: 0.005,
        phase: 0.6,
    },
    FingerLayout {
        joints: [
            JointName::RingFingerMetacarpal,
            JointName::RingFingerKnuckle,
            JointName::RingFingerIntermediateBase,
            JointName::RingFingerIntermediateTip,
            JointName::RingFingerTip,
        ],
        spread: -0.015,
        phase: 1.2,
    },
    FingerLayout {
        joints: [
            JointName::LittleFingerMetacarpal,
            JointName::LittleFingerKnuckle,
            JointName::LittleFingerIntermediateBase,
            JointName::LittleFingerIntermediateTip,
            JointName::LittleFingerTip,
        ],
        spread: -0.033,
        phase: 1.8,
    },
];

fn isometry(position: Vector3<f32>, rotation: UnitQuaternion<f32>) -> Matrix4<f32> {
    Isometry3::from_parts(Translation3::from(position), rotation).to_homogeneous()
}

/// Walks a chain of segments along -Z, bending about X by `curl` at each joint.
fn place_chain(
    skeleton: &mut HandSkeleton,
    joints: &[JointName],
    segments: &[f32],
    base: Vector3<f32>,
    base_rotation: UnitQuaternion<f32>,
    curl: f32,
) {
    let mut position = base;
    let mut rotation = base_rotation;
    skeleton.set(joints[0], isometry(position, rotation));

    for (joint, length) in joints[1..].iter().zip(segments) {
        position += rotation * Vector3::new(0.0, 0.0, -length);
        rotation *= UnitQuaternion::from_axis_angle(&Vector3::x_axis(), -curl);
        skeleton.set(*joint, isometry(position, rotation));
    }
}

/// Synthetic pose for `side` at `t` seconds: the wrist sways gently and each
/// finger curls on its own phase.
pub fn simulated_pose(side: HandSide, t: f64) -> HandPose {
    let t = t as f32;
    let mirror = match side {
        HandSide::Left => -1.0,
        HandSide::Right => 1.0,
    };

    let root_position = Vector3::new(
        mirror * (0.15 + 0.03 * (t * 0.5).sin()),
        1.1 + 0.02 * (t * 0.8).cos(),
        -0.35 + 0.02 * (t * 0.3).sin(),
    );
    let root_rotation = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), mirror * 0.2 * (t * 0.4).sin());

    let mut skeleton = HandSkeleton::default();
    skeleton.set(JointName::Wrist, Matrix4::identity());
    skeleton.set(JointName::ForearmWrist, Matrix4::identity());
    skeleton.set(
        JointName::ForearmArm,
        isometry(Vector3::new(0.0, 0.0, FOREARM_LENGTH), UnitQuaternion::identity()),
    );

    for finger in &FINGERS {
        let curl = 0.3 * (1.0 + (t * 1.5 + finger.phase).sin());
        let base = Vector3::new(mirror * finger.spread, 0.0, -0.01);
        place_chain(
            &mut skeleton,
            &finger.joints,
            &FINGER_SEGMENTS,
            base,
            UnitQuaternion::identity(),
            curl,
        );
    }

    let thumb_curl = 0.25 * (1.0 + (t * 1.1).sin());
    let thumb_rotation = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), mirror * -FRAC_PI_2 * 0.5);
    place_chain(
        &mut skeleton,
        &[
            JointName::ThumbKnuckle,
            JointName::ThumbIntermediateBase,
            JointName::ThumbIntermediateTip,
            JointName::ThumbTip,
        ],
        &THUMB_SEGMENTS,
        Vector3::new(mirror * 0.03, -0.01, 0.0),
        thumb_rotation,
        thumb_curl,
    );

    HandPose {
        origin_from_anchor: isometry(root_position, root_rotation),
        skeleton: Some(skeleton),
    }
}

/// Stand-in tracking source that animates both hands.
#[derive(Debug, Clone)]
pub struct SimulatedHands {
    /// Anchor updates per second, per hand.
    pub rate_hz: f64,
    /// Every Nth anchor is reported untracked; 0 never.
    pub dropout_every: u64,
    /// Stop after this many anchors; `None` runs until the consumer goes away.
    pub max_updates: Option<u64>,
}

impl SimulatedHands {
    pub fn new(rate_hz: f64) -> Self {
        Self {
            rate_hz,
            dropout_every: 0,
            max_updates: None,
        }
    }

    pub fn with_dropouts(mut self, every: u64) -> Self {
        self.dropout_every = every;
        self
    }

    pub fn with_max_updates(mut self, max: u64) -> Self {
        self.max_updates = Some(max);
        self
    }

    /// The `n`th anchor update: sides alternate, both hands share the clock.
    pub fn update_at(&self, n: u64) -> AnchorUpdate {
        let side = if n % 2 == 0 { HandSide::Left } else { HandSide::Right };
        let timestamp = (n / 2) as f64 / self.rate_hz;
        let is_tracked = self.dropout_every == 0 || (n + 1) % self.dropout_every != 0;
        let pose = simulated_pose(side, timestamp);

        AnchorUpdate {
            event: AnchorEvent::Updated,
            anchor: HandAnchor {
                chirality: side,
                is_tracked,
                origin_from_anchor: pose.origin_from_anchor,
                skeleton: pose.skeleton,
            },
            timestamp,
        }
    }
}

impl HandTrackingProvider for SimulatedHands {
    fn name(&self) -> &str {
        "simulated"
    }

    fn is_supported(&self) -> bool {
        self.rate_hz.is_finite() && self.rate_hz > 0.0
    }

    fn start(
        self: Box<Self>,
        updates: mpsc::Sender<AnchorUpdate>,
        events: mpsc::Sender<SessionEvent>,
    ) -> Result<JoinHandle<()>, SessionError> {
        let period = Duration::try_from_secs_f64(1.0 / (self.rate_hz * 2.0))
            .map_err(|e| SessionError::Start {
                provider: self.name().to_string(),
                reason: format!("rate {} Hz has no usable tick period: {}", self.rate_hz, e),
            })?
            .max(MIN_TICK_PERIOD);

        Ok(tokio::spawn(async move {
            let _ = events
                .send(SessionEvent::AuthorizationChanged {
                    capability: Capability::HandTracking,
                    status: AuthorizationStatus::Allowed,
                })
                .await;
            let _ = events
                .send(SessionEvent::ProviderStateChanged {
                    state: ProviderState::Running,
                })
                .await;

            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            let mut n = 0u64;
            while self.max_updates.map_or(true, |max| n < max) {
                ticker.tick().await;
                if updates.send(self.update_at(n)).await.is_err() {
                    tracing::debug!("Anchor consumer dropped, stopping simulation");
                    break;
                }
                n += 1;
            }

            tracing::info!("Simulated hands stopped after {} anchor updates", n);
            let _ = events
                .send(SessionEvent::ProviderStateChanged {
                    state: ProviderState::Stopped,
                })
                .await;
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_pose_covers_every_joint() {
        for side in HandSide::BOTH {
            let pose = simulated_pose(side, 1.25);
            let skeleton = pose.skeleton.as_ref().unwrap();
            for joint in JointName::ALL {
                let m = skeleton
                    .joint(joint)
                    .unwrap_or_else(|| panic!("{} {} missing", side, joint));
                assert!(m.iter().all(|v| v.is_finite()));
            }
        }
    }

    #[test]
    fn test_simulated_hands_are_mirrored() {
        let left = simulated_pose(HandSide::Left, 0.0);
        let right = simulated_pose(HandSide::Right, 0.0);

        assert!(left.origin_from_anchor[(0, 3)] < 0.0);
        assert!(right.origin_from_anchor[(0, 3)] > 0.0);
        assert!((left.origin_from_anchor[(0, 3)] + right.origin_from_anchor[(0, 3)]).abs() < 1e-6);
    }

    #[test]
    fn test_updates_alternate_sides_and_drop_out() {
        let source = SimulatedHands::new(90.0).with_dropouts(3);

        let sides: Vec<HandSide> = (0..4).map(|n| source.update_at(n).anchor.chirality).collect();
        assert_eq!(
            sides,
            vec![HandSide::Left, HandSide::Right, HandSide::Left, HandSide::Right]
        );

        let tracked: Vec<bool> = (0..6).map(|n| source.update_at(n).anchor.is_tracked).collect();
        assert_eq!(tracked, vec![true, true, false, true, true, false]);
        assert_eq!(source.update_at(3).timestamp, 1.0 / 90.0);
    }

    #[test]
    fn test_skeleton_remove_and_iter() {
        let mut skeleton = simulated_pose(HandSide::Right, 0.5).skeleton.unwrap();
        assert_eq!(skeleton.iter().count(), JointName::COUNT);

        assert!(skeleton.remove(JointName::RingFingerTip).is_some());
        assert!(skeleton.joint(JointName::RingFingerTip).is_none());
        assert_eq!(skeleton.iter().count(), JointName::COUNT - 1);
    }

    #[tokio::test]
    async fn test_simulated_provider_streams_updates() {
        let (tx, mut rx) = mpsc::channel(8);
        let (etx, mut erx) = mpsc::channel(8);
        let provider = Box::new(SimulatedHands::new(1000.0).with_max_updates(4));

        let task = provider.start(tx, etx).unwrap();
        let mut received = Vec::new();
        while let Some(update) = rx.recv().await {
            received.push(update.anchor.chirality);
        }
        task.await.unwrap();

        assert_eq!(received.len(), 4);
        assert_eq!(
            erx.recv().await,
            Some(SessionEvent::AuthorizationChanged {
                capability: Capability::HandTracking,
                status: AuthorizationStatus::Allowed,
            })
        );
    }

    #[tokio::test]
    async fn test_extreme_rate_still_streams() {
        let (tx, mut rx) = mpsc::channel(8);
        let (etx, _erx) = mpsc::channel(8);
        let provider = Box::new(SimulatedHands::new(1e10).with_max_updates(4));

        let task = provider.start(tx, etx).unwrap();
        let mut count = 0;
        while rx.recv().await.is_some() {
            count += 1;
        }

        assert!(task.await.is_ok());
        assert_eq!(count, 4);
    }

    #[tokio::test]
    async fn test_vanishing_rate_fails_to_start() {
        let (tx, _rx) = mpsc::channel(1);
        let (etx, _erx) = mpsc::channel(1);
        let provider = Box::new(SimulatedHands::new(1e-300));

        match provider.start(tx, etx) {
            Err(SessionError::Start { provider, .. }) => assert_eq!(provider, "simulated"),
            other => panic!("expected start failure, got {:?}", other.map(|_| ())),
        }
    }
}
