//! Hand-tracking sensor boundary.

use nalgebra::{UnitQuaternion, Vector3};

use crate::buffer::UNTRACKED_SENTINEL;
use crate::skeleton::{Hand, HandSkeleton, Joint, PRIMARY_JOINT};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointSample {
    pub position: Vector3<f32>,
    pub tracked: bool,
}

impl JointSample {
    pub fn tracked(position: Vector3<f32>) -> Self {
        Self {
            position,
            tracked: true,
        }
    }

    pub fn untracked() -> Self {
        Self {
            position: UNTRACKED_SENTINEL,
            tracked: false,
        }
    }
}

/// Source of joint positions and the head orientation, polled once per tick.
pub trait HandSensor {
    /// Current position of `joint`. Untracked hands still report a sample,
    /// flagged untracked, so buffer lengths stay constant.
    fn sample(&self, hand: Hand, joint: Joint) -> JointSample;

    /// Orientation trajectories are normalized against, usually the head.
    fn reference_rotation(&self) -> UnitQuaternion<f32>;

    fn is_tracked(&self, hand: Hand) -> bool {
        self.sample(hand, PRIMARY_JOINT).tracked
    }

    /// Positions of `joints`, or `None` if the hand is not tracked.
    fn positions(&self, hand: Hand, joints: &[Joint]) -> Option<Vec<Vector3<f32>>> {
        if !self.is_tracked(hand) {
            return None;
        }
        joints
            .iter()
            .map(|j| {
                let s = self.sample(hand, *j);
                s.tracked.then_some(s.position)
            })
            .collect()
    }

    /// Every bone of the hand, or `None` if the hand is not tracked.
    fn skeleton(&self, hand: Hand) -> Option<HandSkeleton> {
        if !self.is_tracked(hand) {
            return None;
        }
        let positions = Joint::ALL
            .iter()
            .map(|j| self.sample(hand, *j).position)
            .collect();
        Some(HandSkeleton::new(positions))
    }
}
