// src/pose.rs - Joint pose updates and the single-writer pose consumer
use std::time::Instant;
use tokio::sync::{mpsc, watch};

use crate::config::{AxisScaleMode, Config};
use crate::markers::JointRegistry;
use crate::skeleton::{HandSide, JointName, PerSide};
use crate::throughput::ThroughputMonitor;
use crate::tracking::{AnchorEvent, AnchorUpdate, HandSample};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// No pose for this hand; markers kept their previous transforms.
    Untracked,
    Updated { updated: usize, missing: usize },
}

/// Writes hand poses into the marker registry.
#[derive(Debug, Clone, Copy)]
pub struct PoseUpdater {
    axis_scale: AxisScaleMode,
}

impl PoseUpdater {
    pub fn new(axis_scale: AxisScaleMode) -> Self {
        Self { axis_scale }
    }

    /// Applies one sample to the markers of `side`.
    ///
    /// Each joint's world transform is `origin_from_anchor * anchor_from_joint`.
    /// Joints absent from the sample are skipped individually. With
    /// `AxisScaleMode::FanOut` every joint update restretches the axis gizmos
    /// of all joints on the hand, so after a full pass they reflect the last
    /// joint that was present.
    pub fn apply(&self, sample: &HandSample, side: HandSide, registry: &mut JointRegistry) -> ApplyOutcome {
        let pose = match sample {
            HandSample::Tracked(pose) => pose,
            HandSample::Untracked => return ApplyOutcome::Untracked,
        };

        let hand = registry.hand_mut(side);
        let mut updated = 0;
        let mut missing = 0;

        for joint in JointName::ALL {
            let Some(anchor_from_joint) = pose.joint_transform(joint) else {
                missing += 1;
                continue;
            };

            let marker = hand.get_mut(joint);
            marker.transform = pose.origin_from_anchor * anchor_from_joint;
            let position = marker.position();

            match self.axis_scale {
                AxisScaleMode::FanOut => {
                    for triad in hand.triads_mut() {
                        triad.stretch_to(&position);
                    }
                }
                AxisScaleMode::PerJoint => hand.get_mut(joint).axes.stretch_to(&position),
            }
            updated += 1;
        }

        ApplyOutcome::Updated { updated, missing }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HandStatus {
    pub tracked: bool,
    pub updates: u64,
    pub rate: Option<f64>,
    pub last_outcome: Option<ApplyOutcome>,
}

/// What the renderer sees: the marker registry after the latest event.
#[derive(Debug, Clone)]
pub struct PoseSnapshot {
    pub registry: JointRegistry,
    pub hands: PerSide<HandStatus>,
    pub events_seen: u64,
}

/// Sole owner of the marker registry. Anchor updates are processed one at a
/// time in arrival order; other tasks only see published snapshots.
pub struct PosePipeline {
    registry: JointRegistry,
    updater: PoseUpdater,
    monitor: ThroughputMonitor,
    latest: PerSide<HandSample>,
    status: PerSide<HandStatus>,
    untracked_reported: PerSide<bool>,
    rate_log_every: u64,
    events_seen: u64,
    snapshots: watch::Sender<PoseSnapshot>,
}

impl PosePipeline {
    pub fn new(registry: JointRegistry, config: &Config) -> (Self, watch::Receiver<PoseSnapshot>) {
        let (snapshots, receiver) = watch::channel(PoseSnapshot {
            registry: registry.clone(),
            hands: PerSide::default(),
            events_seen: 0,
        });

        let pipeline = Self {
            registry,
            updater: PoseUpdater::new(config.markers.axis_scale),
            monitor: ThroughputMonitor::new(),
            latest: PerSide::default(),
            status: PerSide::default(),
            untracked_reported: PerSide::default(),
            rate_log_every: config.diagnostics.rate_log_every.max(1),
            events_seen: 0,
            snapshots,
        };
        (pipeline, receiver)
    }

    pub fn registry(&self) -> &JointRegistry {
        &self.registry
    }

    pub fn status(&self, side: HandSide) -> HandStatus {
        self.status[side]
    }

    /// Returns the per-hand outcome, or `None` when the update was ignored
    /// (not an `updated` event, or the anchor is not tracked).
    pub fn handle_update(&mut self, update: AnchorUpdate) -> Option<PerSide<ApplyOutcome>> {
        self.consume(update, |monitor, side| monitor.on_event(side))
    }

    /// Like `handle_update`, with the throughput clock pinned to `now`.
    pub fn handle_update_at(&mut self, update: AnchorUpdate, now: Instant) -> Option<PerSide<ApplyOutcome>> {
        self.consume(update, |monitor, side| monitor.on_event_at(side, now))
    }

    fn consume(
        &mut self,
        update: AnchorUpdate,
        count_event: impl FnOnce(&mut ThroughputMonitor, HandSide) -> Option<f64>,
    ) -> Option<PerSide<ApplyOutcome>> {
        self.events_seen += 1;

        if update.event != AnchorEvent::Updated {
            tracing::trace!("Ignoring {:?} anchor event", update.event);
            return None;
        }
        if !update.anchor.is_tracked {
            tracing::trace!("Ignoring untracked {} anchor", update.anchor.chirality);
            return None;
        }

        let side = update.anchor.chirality;
        self.latest[side] = HandSample::Tracked(update.anchor.pose());

        let rate = count_event(&mut self.monitor, side);
        let count = self.monitor.count(side);
        if count % self.rate_log_every == 0 {
            if let Some(rate) = rate {
                tracing::info!("Average updates per second {}: {:.1}", side, rate);
            }
        }

        // Both hands are refreshed from their latest pose on every update.
        let outcomes = PerSide::from_fn(|side| {
            let outcome = self.updater.apply(&self.latest[side], side, &mut self.registry);
            self.report(side, outcome);
            outcome
        });

        let status = &mut self.status[side];
        status.updates = count;
        status.rate = rate;

        self.publish();
        Some(outcomes)
    }

    fn report(&mut self, side: HandSide, outcome: ApplyOutcome) {
        match outcome {
            ApplyOutcome::Untracked => {
                if !self.untracked_reported[side] {
                    tracing::warn!("No {} hand pose yet, keeping its markers where they are", side);
                    self.untracked_reported[side] = true;
                } else {
                    tracing::trace!("{} hand still untracked", side);
                }
            }
            ApplyOutcome::Updated { missing, .. } => {
                self.untracked_reported[side] = false;
                if missing > 0 {
                    tracing::trace!("{} hand sample missing {} joints", side, missing);
                }
            }
        }

        let status = &mut self.status[side];
        status.tracked = outcome != ApplyOutcome::Untracked;
        status.last_outcome = Some(outcome);
    }

    fn publish(&self) {
        self.snapshots.send_replace(PoseSnapshot {
            registry: self.registry.clone(),
            hands: self.status,
            events_seen: self.events_seen,
        });
    }

    /// Drains `updates` until the session closes the stream.
    pub async fn run(mut self, mut updates: mpsc::Receiver<AnchorUpdate>) -> Self {
        while let Some(update) = updates.recv().await {
            self.handle_update(update);
        }

        tracing::info!(
            "Anchor update stream ended after {} events (left {}, right {})",
            self.events_seen,
            self.monitor.count(HandSide::Left),
            self.monitor.count(HandSide::Right)
        );
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markers::JointRegistry;
    use crate::scene::SceneGraph;
    use crate::tracking::{simulated_pose, HandAnchor, HandPose, HandSkeleton, SimulatedHands};
    use nalgebra::{Matrix4, UnitQuaternion, Vector3};
    use std::f32::consts::FRAC_PI_2;
    use std::time::Duration;

    const EPS: f32 = 1e-5;

    fn registry() -> JointRegistry {
        JointRegistry::populate(&mut SceneGraph::new(), &Default::default())
    }

    fn uniform_pose(origin_from_anchor: Matrix4<f32>, anchor_from_joint: Matrix4<f32>) -> HandPose {
        HandPose {
            origin_from_anchor,
            skeleton: Some(HandSkeleton::from_fn(|_| Some(anchor_from_joint))),
        }
    }

    fn anchor_update(side: HandSide, pose: HandPose) -> AnchorUpdate {
        AnchorUpdate {
            event: AnchorEvent::Updated,
            anchor: HandAnchor {
                chirality: side,
                is_tracked: true,
                origin_from_anchor: pose.origin_from_anchor,
                skeleton: pose.skeleton,
            },
            timestamp: 0.0,
        }
    }

    fn assert_matrix_eq(actual: &Matrix4<f32>, expected: &Matrix4<f32>) {
        assert!(
            (actual - expected).norm() < EPS,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_identity_pose_gives_identity_markers() {
        let mut registry = registry();
        let sample = HandSample::Tracked(uniform_pose(Matrix4::identity(), Matrix4::identity()));

        let outcome = PoseUpdater::new(AxisScaleMode::FanOut).apply(&sample, HandSide::Left, &mut registry);

        assert_eq!(
            outcome,
            ApplyOutcome::Updated {
                updated: JointName::COUNT,
                missing: 0
            }
        );
        for (_, marker) in registry.hand(HandSide::Left).iter() {
            assert_eq!(marker.transform, Matrix4::identity());
        }
    }

    #[test]
    fn test_hand_transform_is_applied_after_joint_transform() {
        let mut registry = registry();
        let t = Matrix4::new_translation(&Vector3::new(1.0, 2.0, 3.0));
        let r = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2).to_homogeneous();
        let joint_local = Matrix4::new_translation(&Vector3::new(0.5, 0.0, 0.0)) * r;

        let sample = HandSample::Tracked(uniform_pose(t, joint_local));
        PoseUpdater::new(AxisScaleMode::FanOut).apply(&sample, HandSide::Right, &mut registry);

        let marker = registry.marker(HandSide::Right, JointName::IndexFingerTip);
        assert_matrix_eq(&marker.transform, &(t * joint_local));
        assert!((marker.transform - joint_local * t).norm() > 0.1);
        assert!((marker.position() - Vector3::new(1.5, 2.0, 3.0)).norm() < EPS);

        // pure T and pure R
        let mut registry = self::registry();
        let sample = HandSample::Tracked(uniform_pose(t, r));
        PoseUpdater::new(AxisScaleMode::FanOut).apply(&sample, HandSide::Right, &mut registry);
        let marker = registry.marker(HandSide::Right, JointName::Wrist);
        assert_matrix_eq(&marker.transform, &(t * r));
        assert!((marker.position() - Vector3::new(1.0, 2.0, 3.0)).norm() < EPS);
    }

    #[test]
    fn test_untracked_leaves_markers_untouched() {
        let mut registry = registry();
        let updater = PoseUpdater::new(AxisScaleMode::FanOut);
        for side in HandSide::BOTH {
            updater.apply(&HandSample::Tracked(simulated_pose(side, 0.7)), side, &mut registry);
        }
        let before = registry.clone();

        let outcome = updater.apply(&HandSample::Untracked, HandSide::Left, &mut registry);

        assert_eq!(outcome, ApplyOutcome::Untracked);
        assert_eq!(registry, before);
    }

    #[test]
    fn test_missing_joint_is_skipped_alone() {
        let mut registry = registry();
        let updater = PoseUpdater::new(AxisScaleMode::PerJoint);
        let offset = Matrix4::new_translation(&Vector3::new(0.0, 0.1, 0.0));

        let mut pose = uniform_pose(offset, Matrix4::identity());
        if let Some(skeleton) = pose.skeleton.as_mut() {
            skeleton.remove(JointName::MiddleFingerTip);
        }

        let outcome = updater.apply(&HandSample::Tracked(pose), HandSide::Right, &mut registry);

        assert_eq!(
            outcome,
            ApplyOutcome::Updated {
                updated: JointName::COUNT - 1,
                missing: 1
            }
        );
        for (joint, marker) in registry.hand(HandSide::Right).iter() {
            if joint == JointName::MiddleFingerTip {
                assert_eq!(marker.transform, Matrix4::identity());
                assert_eq!(marker.axes.y.transform.scale, Vector3::new(1.0, 1.0, 1.0));
            } else {
                assert_eq!(marker.transform, offset);
                assert_eq!(marker.axes.y.transform.scale.y, 0.1);
            }
        }
    }

    #[test]
    fn test_missing_joint_keeps_pose_under_fan_out() {
        let mut registry = registry();
        let updater = PoseUpdater::new(AxisScaleMode::FanOut);
        let offset = Matrix4::new_translation(&Vector3::new(0.0, 0.1, 0.0));

        let mut pose = uniform_pose(offset, Matrix4::identity());
        if let Some(skeleton) = pose.skeleton.as_mut() {
            skeleton.remove(JointName::MiddleFingerTip);
        }

        let outcome = updater.apply(&HandSample::Tracked(pose), HandSide::Left, &mut registry);

        assert_eq!(
            outcome,
            ApplyOutcome::Updated {
                updated: JointName::COUNT - 1,
                missing: 1
            }
        );
        for (joint, marker) in registry.hand(HandSide::Left).iter() {
            if joint == JointName::MiddleFingerTip {
                assert_eq!(marker.transform, Matrix4::identity());
            } else {
                assert_eq!(marker.transform, offset);
            }
            // every gizmo, the skipped joint's included, carries the last present joint
            assert_eq!(marker.axes.x.transform.scale, Vector3::new(0.0, 1.0, 1.0));
            assert_eq!(marker.axes.y.transform.scale, Vector3::new(1.0, 0.1, 1.0));
            assert_eq!(marker.axes.z.transform.scale, Vector3::new(1.0, 1.0, 0.0));
        }
    }

    #[test]
    fn test_missing_skeleton_skips_every_joint() {
        let mut registry = registry();
        let before = registry.clone();
        let sample = HandSample::Tracked(HandPose {
            origin_from_anchor: Matrix4::new_translation(&Vector3::new(1.0, 1.0, 1.0)),
            skeleton: None,
        });

        let outcome = PoseUpdater::new(AxisScaleMode::FanOut).apply(&sample, HandSide::Left, &mut registry);

        assert_eq!(
            outcome,
            ApplyOutcome::Updated {
                updated: 0,
                missing: JointName::COUNT
            }
        );
        assert_eq!(registry, before);
    }

    #[test]
    fn test_fan_out_leaves_last_joint_position_on_every_axis() {
        let mut registry = registry();
        let pose = simulated_pose(HandSide::Left, 2.0);
        let last = JointName::ALL[JointName::COUNT - 1];
        let last_world = pose.origin_from_anchor * pose.joint_transform(last).unwrap();

        PoseUpdater::new(AxisScaleMode::FanOut).apply(&HandSample::Tracked(pose), HandSide::Left, &mut registry);

        let p = last_world.fixed_view::<3, 1>(0, 3).into_owned();
        for (_, marker) in registry.hand(HandSide::Left).iter() {
            assert_eq!(marker.axes.x.transform.scale, Vector3::new(p.x, 1.0, 1.0));
            assert_eq!(marker.axes.y.transform.scale, Vector3::new(1.0, p.y, 1.0));
            assert_eq!(marker.axes.z.transform.scale, Vector3::new(1.0, 1.0, p.z));
        }
        // the other hand is untouched
        for (_, marker) in registry.hand(HandSide::Right).iter() {
            assert_eq!(marker.axes.x.transform.scale, Vector3::new(1.0, 1.0, 1.0));
        }
    }

    #[test]
    fn test_per_joint_axes_follow_their_own_joint() {
        let mut registry = registry();
        let pose = simulated_pose(HandSide::Right, 2.0);

        PoseUpdater::new(AxisScaleMode::PerJoint).apply(&HandSample::Tracked(pose), HandSide::Right, &mut registry);

        for (_, marker) in registry.hand(HandSide::Right).iter() {
            let p = marker.position();
            assert_eq!(marker.axes.x.transform.scale.x, p.x);
            assert_eq!(marker.axes.y.transform.scale.y, p.y);
            assert_eq!(marker.axes.z.transform.scale.z, p.z);
        }
    }

    #[test]
    fn test_pipeline_ignores_untracked_and_non_update_events() {
        let config = Config::default();
        let (mut pipeline, _rx) = PosePipeline::new(registry(), &config);
        let before = pipeline.registry().clone();

        let mut update = anchor_update(HandSide::Left, simulated_pose(HandSide::Left, 0.0));
        update.anchor.is_tracked = false;
        assert_eq!(pipeline.handle_update(update.clone()), None);

        update.anchor.is_tracked = true;
        update.event = AnchorEvent::Added;
        assert_eq!(pipeline.handle_update(update), None);

        assert_eq!(pipeline.registry(), &before);
        assert_eq!(pipeline.status(HandSide::Left).updates, 0);
    }

    #[test]
    fn test_pipeline_refreshes_both_hands() {
        let config = Config::default();
        let (mut pipeline, rx) = PosePipeline::new(registry(), &config);
        let t0 = Instant::now();

        let outcomes = pipeline
            .handle_update_at(anchor_update(HandSide::Left, simulated_pose(HandSide::Left, 0.0)), t0)
            .unwrap();
        assert_eq!(outcomes.right, ApplyOutcome::Untracked);
        assert!(matches!(outcomes.left, ApplyOutcome::Updated { updated: JointName::COUNT, .. }));
        assert!(pipeline.status(HandSide::Left).tracked);
        assert!(!pipeline.status(HandSide::Right).tracked);

        let right_before = pipeline.registry().hand(HandSide::Right).clone();
        assert_eq!(right_before, registry().hand(HandSide::Right).clone());

        let outcomes = pipeline
            .handle_update_at(
                anchor_update(HandSide::Right, simulated_pose(HandSide::Right, 0.0)),
                t0 + Duration::from_millis(11),
            )
            .unwrap();
        assert!(matches!(outcomes.left, ApplyOutcome::Updated { .. }));
        assert!(matches!(outcomes.right, ApplyOutcome::Updated { .. }));

        let snapshot = rx.borrow();
        assert_eq!(snapshot.events_seen, 2);
        assert_eq!(snapshot.hands.left.updates, 1);
        assert_eq!(snapshot.hands.right.updates, 1);
        assert_eq!(&snapshot.registry, pipeline.registry());
    }

    #[tokio::test]
    async fn test_pipeline_task_consumes_stream_in_order() {
        let config = Config::default();
        let (pipeline, rx) = PosePipeline::new(registry(), &config);
        let source = SimulatedHands::new(90.0);
        let (tx, updates) = mpsc::channel(4);

        let consumer = tokio::spawn(pipeline.run(updates));
        for n in 0..20 {
            tx.send(source.update_at(n)).await.unwrap();
        }
        drop(tx);
        let pipeline = consumer.await.unwrap();

        assert_eq!(pipeline.status(HandSide::Left).updates, 10);
        assert_eq!(pipeline.status(HandSide::Right).updates, 10);

        // the last update processed was the right hand at n = 19
        let last = source.update_at(19).anchor;
        let expected = last.origin_from_anchor * last.skeleton.unwrap().joint(JointName::Wrist).copied().unwrap();
        assert_eq!(
            pipeline.registry().marker(HandSide::Right, JointName::Wrist).transform,
            expected
        );
        assert_eq!(rx.borrow().events_seen, 20);
    }
}
