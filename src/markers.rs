// src/markers.rs - Joint markers and the per-hand marker registry
use nalgebra::{Matrix4, Point3, Unit, UnitQuaternion, Vector3};
use std::f32::consts::PI;

use crate::config::MarkerConfig;
use crate::scene::{AxisColor, EntityId, EntityKind, Scene};
use crate::skeleton::{HandSide, JointMap, JointName, PerSide};

pub const DEFAULT_AXIS_RADIUS: f32 = 0.001;

// Below this the cross product with "up" has no usable direction.
const PARALLEL_EPSILON: f32 = 1e-6;

/// Local placement of an axis segment relative to its joint anchor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentTransform {
    pub translation: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
    pub scale: Vector3<f32>,
}

impl Default for SegmentTransform {
    fn default() -> Self {
        Self {
            translation: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }
}

impl SegmentTransform {
    /// Translation * rotation * scale.
    pub fn to_matrix(&self) -> Matrix4<f32> {
        Matrix4::new_translation(&self.translation)
            * self.rotation.to_homogeneous()
            * Matrix4::new_nonuniform_scaling(&self.scale)
    }
}

/// A thin cylinder running between two points in anchor space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisSegment {
    pub color: AxisColor,
    pub length: f32,
    pub radius: f32,
    pub transform: SegmentTransform,
}

impl AxisSegment {
    pub fn with_radius(mut self, radius: f32) -> Self {
        self.radius = radius;
        self
    }

    /// The segment's two end points in anchor space, after scale and rotation.
    pub fn endpoints(&self) -> (Point3<f32>, Point3<f32>) {
        let m = self.transform.to_matrix();
        let half = self.length / 2.0;
        let a = m.transform_point(&Point3::new(0.0, -half, 0.0));
        let b = m.transform_point(&Point3::new(0.0, half, 0.0));
        (a, b)
    }
}

/// Builds a cylinder along `endpoint - origin`, centered on the midpoint.
///
/// The cylinder mesh is modelled along +Y, so the rotation is the shortest arc
/// taking +Y onto the segment direction. Directions parallel to +Y have no
/// rotation axis and are handled separately.
pub fn build_axis_segment(origin: Point3<f32>, endpoint: Point3<f32>, color: AxisColor) -> AxisSegment {
    let diff = endpoint - origin;
    let length = diff.norm();
    let midpoint = origin + diff / 2.0;

    let rotation = if length > PARALLEL_EPSILON {
        rotation_from_up(&(diff / length))
    } else {
        UnitQuaternion::identity()
    };

    AxisSegment {
        color,
        length,
        radius: DEFAULT_AXIS_RADIUS,
        transform: SegmentTransform {
            translation: midpoint.coords,
            rotation,
            scale: Vector3::new(1.0, 1.0, 1.0),
        },
    }
}

fn rotation_from_up(direction: &Vector3<f32>) -> UnitQuaternion<f32> {
    let up = Vector3::y();
    let cos_angle = up.dot(direction).clamp(-1.0, 1.0);

    match Unit::try_new(up.cross(direction), PARALLEL_EPSILON) {
        Some(axis) => UnitQuaternion::from_axis_angle(&axis, cos_angle.acos()),
        None if cos_angle > 0.0 => UnitQuaternion::identity(),
        None => UnitQuaternion::from_axis_angle(&Vector3::x_axis(), PI),
    }
}

/// X/Y/Z gizmo attached to one joint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisTriad {
    pub x: AxisSegment,
    pub y: AxisSegment,
    pub z: AxisSegment,
}

impl AxisTriad {
    pub fn new(length: f32, radius: f32) -> Self {
        let origin = Point3::origin();
        Self {
            x: build_axis_segment(origin, Point3::new(length, 0.0, 0.0), AxisColor::Red).with_radius(radius),
            y: build_axis_segment(origin, Point3::new(0.0, length, 0.0), AxisColor::Green).with_radius(radius),
            z: build_axis_segment(origin, Point3::new(0.0, 0.0, length), AxisColor::Blue).with_radius(radius),
        }
    }

    pub fn segments(&self) -> [&AxisSegment; 3] {
        [&self.x, &self.y, &self.z]
    }

    /// Each segment takes one coordinate of `position` as the scale along its
    /// own axis; the other two scale components are left alone.
    pub fn stretch_to(&mut self, position: &Vector3<f32>) {
        self.x.transform.scale.x = position.x;
        self.y.transform.scale.y = position.y;
        self.z.transform.scale.z = position.z;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerEntities {
    pub anchor: EntityId,
    pub sphere: EntityId,
    pub axes: [EntityId; 3],
}

/// Sphere plus axis gizmo following one joint.
#[derive(Debug, Clone, PartialEq)]
pub struct JointMarker {
    pub joint: JointName,
    /// Origin-from-joint transform of the anchor that carries the sphere.
    pub transform: Matrix4<f32>,
    pub sphere_radius: f32,
    pub axes: AxisTriad,
    pub entities: MarkerEntities,
}

impl JointMarker {
    /// Creates the marker at the world origin and attaches its anchor, sphere
    /// and axis segments to `scene`.
    pub fn attach(side: HandSide, joint: JointName, style: &MarkerConfig, scene: &mut impl Scene) -> Self {
        let axes = AxisTriad::new(style.axis_length, style.axis_radius);

        let anchor = scene.add_entity(
            None,
            EntityKind::Anchor {
                label: format!("{}.{}", side, joint),
            },
        );
        let sphere = scene.add_entity(Some(anchor), EntityKind::Sphere { radius: style.sphere_radius });
        let axis_ids = axes.segments().map(|segment| {
            scene.add_entity(
                Some(anchor),
                EntityKind::Cylinder {
                    height: segment.length,
                    radius: segment.radius,
                    color: segment.color,
                },
            )
        });

        Self {
            joint,
            transform: Matrix4::identity(),
            sphere_radius: style.sphere_radius,
            axes,
            entities: MarkerEntities {
                anchor,
                sphere,
                axes: axis_ids,
            },
        }
    }

    /// World-space position of the joint.
    pub fn position(&self) -> Vector3<f32> {
        self.transform.fixed_view::<3, 1>(0, 3).into_owned()
    }
}

/// All markers of one hand.
#[derive(Debug, Clone, PartialEq)]
pub struct HandMarkers {
    pub side: HandSide,
    markers: JointMap<JointMarker>,
}

impl HandMarkers {
    /// Creates one marker per catalog joint. Must run once per side; a second
    /// call attaches a second set of entities to the scene.
    pub fn populate(side: HandSide, scene: &mut impl Scene, style: &MarkerConfig) -> Self {
        let markers = JointMap::from_fn(|joint| JointMarker::attach(side, joint, style, scene));
        tracing::debug!("Attached {} {} hand joint markers", markers.len(), side);
        Self { side, markers }
    }

    pub fn get(&self, joint: JointName) -> &JointMarker {
        &self.markers[joint]
    }

    pub fn get_mut(&mut self, joint: JointName) -> &mut JointMarker {
        &mut self.markers[joint]
    }

    pub fn iter(&self) -> impl Iterator<Item = (JointName, &JointMarker)> {
        self.markers.iter()
    }

    pub fn triads_mut(&mut self) -> impl Iterator<Item = &mut AxisTriad> {
        self.markers.values_mut().map(|marker| &mut marker.axes)
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }
}

/// Markers for both hands, fully populated at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct JointRegistry {
    hands: PerSide<HandMarkers>,
}

impl JointRegistry {
    pub fn populate(scene: &mut impl Scene, style: &MarkerConfig) -> Self {
        let left = HandMarkers::populate(HandSide::Left, scene, style);
        let right = HandMarkers::populate(HandSide::Right, scene, style);
        Self {
            hands: PerSide::new(left, right),
        }
    }

    pub fn hand(&self, side: HandSide) -> &HandMarkers {
        &self.hands[side]
    }

    pub fn hand_mut(&mut self, side: HandSide) -> &mut HandMarkers {
        &mut self.hands[side]
    }

    pub fn marker(&self, side: HandSide, joint: JointName) -> &JointMarker {
        self.hands[side].get(joint)
    }

    pub fn hands(&self) -> impl Iterator<Item = (HandSide, &HandMarkers)> {
        self.hands.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SceneGraph;

    const EPS: f32 = 1e-5;

    fn assert_vec_eq(actual: Vector3<f32>, expected: Vector3<f32>) {
        assert!(
            (actual - expected).norm() < EPS,
            "expected {:?}, got {:?}",
            expected,
            actual
        );
    }

    #[test]
    fn test_unit_x_segment_is_centered() {
        let segment = build_axis_segment(Point3::origin(), Point3::new(1.0, 0.0, 0.0), AxisColor::Red);

        assert!((segment.length - 1.0).abs() < EPS);
        assert_vec_eq(segment.transform.translation, Vector3::new(0.5, 0.0, 0.0));
        assert_vec_eq(segment.transform.rotation * Vector3::y(), Vector3::x());

        let (a, b) = segment.endpoints();
        assert_vec_eq(a.coords, Vector3::zeros());
        assert_vec_eq(b.coords, Vector3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_segment_along_up_has_identity_rotation() {
        let segment = build_axis_segment(Point3::origin(), Point3::new(0.0, 0.02, 0.0), AxisColor::Green);

        assert!(segment.transform.rotation.angle() < EPS);
        assert!(segment.transform.rotation.coords.iter().all(|c| c.is_finite()));
        assert_vec_eq(segment.transform.translation, Vector3::new(0.0, 0.01, 0.0));
    }

    #[test]
    fn test_segment_against_up_flips_without_nan() {
        let segment = build_axis_segment(Point3::origin(), Point3::new(0.0, -1.0, 0.0), AxisColor::Green);

        assert!(segment.transform.rotation.coords.iter().all(|c| c.is_finite()));
        assert_vec_eq(segment.transform.rotation * Vector3::y(), -Vector3::y());
    }

    #[test]
    fn test_zero_length_segment_is_finite() {
        let p = Point3::new(0.3, 0.3, 0.3);
        let segment = build_axis_segment(p, p, AxisColor::Blue);

        assert_eq!(segment.length, 0.0);
        assert_eq!(segment.transform.rotation, UnitQuaternion::identity());
        assert_vec_eq(segment.transform.translation, p.coords);
    }

    #[test]
    fn test_oblique_segment_points_at_endpoint() {
        let origin = Point3::new(1.0, 2.0, 3.0);
        let endpoint = Point3::new(2.0, 1.0, 5.0);
        let segment = build_axis_segment(origin, endpoint, AxisColor::Blue);

        let (a, b) = segment.endpoints();
        assert_vec_eq(a.coords, origin.coords);
        assert_vec_eq(b.coords, endpoint.coords);
    }

    #[test]
    fn test_registry_has_marker_for_every_joint() {
        let mut scene = SceneGraph::new();
        let registry = JointRegistry::populate(&mut scene, &MarkerConfig::default());

        for side in HandSide::BOTH {
            assert_eq!(registry.hand(side).side, side);
            assert_eq!(registry.hand(side).len(), JointName::COUNT);
            for joint in JointName::ALL {
                let marker = registry.marker(side, joint);
                assert_eq!(marker.joint, joint);
                assert_eq!(marker.transform, Matrix4::identity());
            }
        }

        // anchor + sphere + three axes per marker
        assert_eq!(scene.len(), 2 * JointName::COUNT * 5);
        assert_eq!(scene.roots().count(), 2 * JointName::COUNT);
    }

    #[test]
    fn test_marker_entities_hang_off_their_anchor() {
        let mut scene = SceneGraph::new();
        let registry = JointRegistry::populate(&mut scene, &MarkerConfig::default());
        let marker = registry.marker(HandSide::Right, JointName::IndexFingerTip);

        let children: Vec<EntityId> = scene.children(marker.entities.anchor).map(|n| n.id).collect();
        assert_eq!(children.len(), 4);
        assert!(children.contains(&marker.entities.sphere));
        for axis in marker.entities.axes {
            assert!(children.contains(&axis));
        }

        match &scene.get(marker.entities.anchor).unwrap().kind {
            EntityKind::Anchor { label } => assert_eq!(label, "right.indexFingerTip"),
            other => panic!("expected anchor, got {:?}", other),
        }
    }

    #[test]
    fn test_stretch_only_touches_own_axis() {
        let mut triad = AxisTriad::new(0.01, 0.001);
        triad.stretch_to(&Vector3::new(2.0, 3.0, 4.0));

        assert_eq!(triad.x.transform.scale, Vector3::new(2.0, 1.0, 1.0));
        assert_eq!(triad.y.transform.scale, Vector3::new(1.0, 3.0, 1.0));
        assert_eq!(triad.z.transform.scale, Vector3::new(1.0, 1.0, 4.0));
    }
}
