//! Hand sides, bone ids and skeleton lookups.

use nalgebra::Vector3;

use crate::error::PoseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hand {
    Left,
    Right,
}

impl Hand {
    pub const BOTH: [Hand; 2] = [Hand::Left, Hand::Right];

    pub fn index(self) -> usize {
        match self {
            Hand::Left => 0,
            Hand::Right => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Hand::Left => "left",
            Hand::Right => "right",
        }
    }
}

/// Bone ids of a tracked hand, in the order the sensor reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Joint {
    WristRoot,
    ForearmStub,
    Thumb0,
    Thumb1,
    Thumb2,
    Thumb3,
    Index1,
    Index2,
    Index3,
    Middle1,
    Middle2,
    Middle3,
    Ring1,
    Ring2,
    Ring3,
    Pinky0,
    Pinky1,
    Pinky2,
    Pinky3,
    ThumbTip,
    IndexTip,
    MiddleTip,
    RingTip,
    PinkyTip,
}

/// Number of bones in a full skeleton.
pub const JOINT_COUNT: usize = 24;

/// Joints buffered in full tracking mode. Position 0 is the primary joint.
pub const BUFFERED_JOINTS: [Joint; 19] = [
    Joint::WristRoot,
    Joint::ForearmStub,
    Joint::Thumb0,
    Joint::Thumb1,
    Joint::Thumb2,
    Joint::Thumb3,
    Joint::Index1,
    Joint::Index2,
    Joint::Index3,
    Joint::Middle1,
    Joint::Middle2,
    Joint::Middle3,
    Joint::Ring1,
    Joint::Ring2,
    Joint::Ring3,
    Joint::Pinky0,
    Joint::Pinky1,
    Joint::Pinky2,
    Joint::Pinky3,
];

/// The joint whose trajectory drives gesture recognition.
pub const PRIMARY_JOINT: Joint = Joint::WristRoot;

impl Joint {
    /// Every bone, in sensor order.
    pub const ALL: [Joint; JOINT_COUNT] = [
        Joint::WristRoot,
        Joint::ForearmStub,
        Joint::Thumb0,
        Joint::Thumb1,
        Joint::Thumb2,
        Joint::Thumb3,
        Joint::Index1,
        Joint::Index2,
        Joint::Index3,
        Joint::Middle1,
        Joint::Middle2,
        Joint::Middle3,
        Joint::Ring1,
        Joint::Ring2,
        Joint::Ring3,
        Joint::Pinky0,
        Joint::Pinky1,
        Joint::Pinky2,
        Joint::Pinky3,
        Joint::ThumbTip,
        Joint::IndexTip,
        Joint::MiddleTip,
        Joint::RingTip,
        Joint::PinkyTip,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// One frame of bone positions for a single hand, indexed by `Joint::index`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandSkeleton {
    positions: Vec<Vector3<f32>>,
}

impl HandSkeleton {
    pub fn new(positions: Vec<Vector3<f32>>) -> Self {
        Self { positions }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Position of `joint`, or an error when the sensor reported fewer bones.
    pub fn position(&self, joint: Joint) -> Result<Vector3<f32>, PoseError> {
        self.positions
            .get(joint.index())
            .copied()
            .ok_or(PoseError::JointUnavailable {
                index: joint.index(),
                len: self.positions.len(),
            })
    }
}
