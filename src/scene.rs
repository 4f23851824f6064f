// src/scene.rs - Scene attachment boundary for joint markers
use serde::{Deserialize, Serialize};

/// Handle to an entity attached to the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId(pub u32);

/// Color of an axis segment. X is red, Y green, Z blue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AxisColor {
    Red,
    Green,
    Blue,
}

impl AxisColor {
    pub fn rgb(self) -> [u8; 3] {
        match self {
            AxisColor::Red => [230, 60, 60],
            AxisColor::Green => [70, 200, 90],
            AxisColor::Blue => [70, 120, 240],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntityKind {
    /// World-placed parent that carries a joint's transform.
    Anchor { label: String },
    Sphere { radius: f32 },
    Cylinder { height: f32, radius: f32, color: AxisColor },
}

#[derive(Debug, Clone)]
pub struct SceneNode {
    pub id: EntityId,
    pub parent: Option<EntityId>,
    pub kind: EntityKind,
}

/// The renderer side of marker setup. Markers are added once; after that the
/// renderer only reads their transforms.
pub trait Scene {
    fn add_entity(&mut self, parent: Option<EntityId>, kind: EntityKind) -> EntityId;
}

/// Flat in-memory scene graph.
#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: Vec<SceneNode>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: EntityId) -> Option<&SceneNode> {
        self.nodes.get(id.0 as usize)
    }

    pub fn children(&self, parent: EntityId) -> impl Iterator<Item = &SceneNode> {
        self.nodes
            .iter()
            .filter(move |node| node.parent == Some(parent))
    }

    pub fn roots(&self) -> impl Iterator<Item = &SceneNode> {
        self.nodes.iter().filter(|node| node.parent.is_none())
    }
}

impl Scene for SceneGraph {
    fn add_entity(&mut self, parent: Option<EntityId>, kind: EntityKind) -> EntityId {
        let id = EntityId(self.nodes.len() as u32);
        self.nodes.push(SceneNode { id, parent, kind });
        id
    }
}
