// src/skeleton.rs - Joint catalog and per-hand containers
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};

/// Which hand a tracked anchor belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandSide {
    Left,
    Right,
}

impl HandSide {
    pub const BOTH: [HandSide; 2] = [HandSide::Left, HandSide::Right];

    pub fn as_str(self) -> &'static str {
        match self {
            HandSide::Left => "left",
            HandSide::Right => "right",
        }
    }

    pub fn other(self) -> HandSide {
        match self {
            HandSide::Left => HandSide::Right,
            HandSide::Right => HandSide::Left,
        }
    }
}

impl fmt::Display for HandSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One value per hand, kept strictly apart.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PerSide<T> {
    pub left: T,
    pub right: T,
}

impl<T> PerSide<T> {
    pub fn new(left: T, right: T) -> Self {
        Self { left, right }
    }

    pub fn from_fn(mut f: impl FnMut(HandSide) -> T) -> Self {
        Self {
            left: f(HandSide::Left),
            right: f(HandSide::Right),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (HandSide, &T)> {
        [(HandSide::Left, &self.left), (HandSide::Right, &self.right)].into_iter()
    }
}

impl<T> Index<HandSide> for PerSide<T> {
    type Output = T;

    fn index(&self, side: HandSide) -> &T {
        match side {
            HandSide::Left => &self.left,
            HandSide::Right => &self.right,
        }
    }
}

impl<T> IndexMut<HandSide> for PerSide<T> {
    fn index_mut(&mut self, side: HandSide) -> &mut T {
        match side {
            HandSide::Left => &mut self.left,
            HandSide::Right => &mut self.right,
        }
    }
}

/// Every joint of a tracked hand skeleton. The same set is used for both hands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JointName {
    Wrist,
    ThumbKnuckle,
    ThumbIntermediateBase,
    ThumbIntermediateTip,
    ThumbTip,
    IndexFingerMetacarpal,
    IndexFingerKnuckle,
    IndexFingerIntermediateBase,
    IndexFingerIntermediateTip,
    IndexFingerTip,
    MiddleFingerMetacarpal,
    MiddleFingerKnuckle,
    MiddleFingerIntermediateBase,
    MiddleFingerIntermediateTip,
    MiddleFingerTip,
    RingFingerMetacarpal,
    RingFingerKnuckle,
    RingFingerIntermediateBase,
    RingFingerIntermediateTip,
    RingFingerTip,
    LittleFingerMetacarpal,
    LittleFingerKnuckle,
    LittleFingerIntermediateBase,
    LittleFingerIntermediateTip,
    LittleFingerTip,
    ForearmWrist,
    ForearmArm,
}

impl JointName {
    pub const COUNT: usize = 27;

    /// Catalog order. Marker creation and pose updates both walk this list.
    pub const ALL: [JointName; JointName::COUNT] = [
        JointName::Wrist,
        JointName::ThumbKnuckle,
        JointName::ThumbIntermediateBase,
        JointName::ThumbIntermediateTip,
        JointName::ThumbTip,
        JointName::IndexFingerMetacarpal,
        JointName::IndexFingerKnuckle,
        JointName::IndexFingerIntermediateBase,
        JointName::IndexFingerIntermediateTip,
        JointName::IndexFingerTip,
        JointName::MiddleFingerMetacarpal,
        JointName::MiddleFingerKnuckle,
        JointName::MiddleFingerIntermediateBase,
        JointName::MiddleFingerIntermediateTip,
        JointName::MiddleFingerTip,
        JointName::RingFingerMetacarpal,
        JointName::RingFingerKnuckle,
        JointName::RingFingerIntermediateBase,
        JointName::RingFingerIntermediateTip,
        JointName::RingFingerTip,
        JointName::LittleFingerMetacarpal,
        JointName::LittleFingerKnuckle,
        JointName::LittleFingerIntermediateBase,
        JointName::LittleFingerIntermediateTip,
        JointName::LittleFingerTip,
        JointName::ForearmWrist,
        JointName::ForearmArm,
    ];

    /// Position of this joint in `ALL`.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JointName::Wrist => "wrist",
            JointName::ThumbKnuckle => "thumbKnuckle",
            JointName::ThumbIntermediateBase => "thumbIntermediateBase",
            JointName::ThumbIntermediateTip => "thumbIntermediateTip",
            JointName::ThumbTip => "thumbTip",
            JointName::IndexFingerMetacarpal => "indexFingerMetacarpal",
            JointName::IndexFingerKnuckle => "indexFingerKnuckle",
            JointName::IndexFingerIntermediateBase => "indexFingerIntermediateBase",
            JointName::IndexFingerIntermediateTip => "indexFingerIntermediateTip",
            JointName::IndexFingerTip => "indexFingerTip",
            JointName::MiddleFingerMetacarpal => "middleFingerMetacarpal",
            JointName::MiddleFingerKnuckle => "middleFingerKnuckle",
            JointName::MiddleFingerIntermediateBase => "middleFingerIntermediateBase",
            JointName::MiddleFingerIntermediateTip => "middleFingerIntermediateTip",
            JointName::MiddleFingerTip => "middleFingerTip",
            JointName::RingFingerMetacarpal => "ringFingerMetacarpal",
            JointName::RingFingerKnuckle => "ringFingerKnuckle",
            JointName::RingFingerIntermediateBase => "ringFingerIntermediateBase",
            JointName::RingFingerIntermediateTip => "ringFingerIntermediateTip",
            JointName::RingFingerTip => "ringFingerTip",
            JointName::LittleFingerMetacarpal => "littleFingerMetacarpal",
            JointName::LittleFingerKnuckle => "littleFingerKnuckle",
            JointName::LittleFingerIntermediateBase => "littleFingerIntermediateBase",
            JointName::LittleFingerIntermediateTip => "littleFingerIntermediateTip",
            JointName::LittleFingerTip => "littleFingerTip",
            JointName::ForearmWrist => "forearmWrist",
            JointName::ForearmArm => "forearmArm",
        }
    }
}

impl fmt::Display for JointName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dense map with exactly one slot per joint.
#[derive(Debug, Clone, PartialEq)]
pub struct JointMap<T> {
    slots: [T; JointName::COUNT],
}

impl<T> JointMap<T> {
    pub fn from_fn(mut f: impl FnMut(JointName) -> T) -> Self {
        Self {
            slots: std::array::from_fn(|i| f(JointName::ALL[i])),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (JointName, &T)> {
        JointName::ALL.iter().copied().zip(self.slots.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (JointName, &mut T)> {
        JointName::ALL.iter().copied().zip(self.slots.iter_mut())
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.slots.iter()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.slots.iter_mut()
    }

    pub fn len(&self) -> usize {
        JointName::COUNT
    }
}

impl<T: Default> Default for JointMap<T> {
    fn default() -> Self {
        Self::from_fn(|_| T::default())
    }
}

impl<T> Index<JointName> for JointMap<T> {
    type Output = T;

    fn index(&self, joint: JointName) -> &T {
        &self.slots[joint.index()]
    }
}

impl<T> IndexMut<JointName> for JointMap<T> {
    fn index_mut(&mut self, joint: JointName) -> &mut T {
        &mut self.slots[joint.index()]
    }
}
