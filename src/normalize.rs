//! Feature extraction: trajectory normalization for gestures and joint
//! angle/distance features for static poses.
//!
//! A gesture trajectory is anchored at its first point, rotated into the
//! reference (head) frame, scaled so its widest axis spans
//! `bounding_cube_size`, and flattened to `[x0, y0, z0, x1, ...]`.

use nalgebra::{UnitQuaternion, Vector3};

use crate::error::{NormalizeError, PoseError};
use crate::skeleton::{HandSkeleton, Joint};

/// Length of the static pose feature vector: 10 finger angles, 5 knuckle
/// angles, 7 distances.
pub const POSE_FEATURE_COUNT: usize = 22;

/// Length of a gesture feature vector for a trajectory of `samples` points.
pub fn gesture_feature_len(samples: usize) -> usize {
    samples * 3
}

pub fn normalize(
    trajectory: &[Vector3<f32>],
    reference: &UnitQuaternion<f32>,
    bounding_cube_size: f32,
) -> Result<Vec<f32>, NormalizeError> {
    let translated = translate(trajectory)?;
    let width = bounding_width(&translated);
    if width <= f32::EPSILON {
        return Err(NormalizeError::DegenerateBounds);
    }
    let rotated = rotate(&translated, reference);
    let scale = bounding_cube_size / width;
    Ok(flatten(rotated.into_iter().map(|p| p * scale)))
}

/// Shifts every point so the trajectory starts at the origin.
pub fn translate(trajectory: &[Vector3<f32>]) -> Result<Vec<Vector3<f32>>, NormalizeError> {
    let origin = *trajectory.first().ok_or(NormalizeError::Empty)?;
    Ok(trajectory.iter().map(|p| p - origin).collect())
}

/// Applies the inverse of `reference` to every point.
pub fn rotate(points: &[Vector3<f32>], reference: &UnitQuaternion<f32>) -> Vec<Vector3<f32>> {
    let inverse = reference.inverse();
    points.iter().map(|p| inverse.transform_vector(p)).collect()
}

/// Largest per-axis extent of the points.
pub fn bounding_width(points: &[Vector3<f32>]) -> f32 {
    let Some(first) = points.first() else {
        return 0.0;
    };
    let (min, max) = points
        .iter()
        .fold((*first, *first), |(lo, hi), p| (lo.inf(p), hi.sup(p)));
    (max - min).max()
}

pub fn flatten(points: impl IntoIterator<Item = Vector3<f32>>) -> Vec<f32> {
    points.into_iter().flat_map(|p| [p.x, p.y, p.z]).collect()
}

// ---------- static poses ----------

const FINGER_ANGLES: [(Joint, Joint, Joint); 10] = [
    (Joint::Thumb1, Joint::Thumb2, Joint::Thumb3),
    (Joint::Thumb2, Joint::Thumb3, Joint::ThumbTip),
    (Joint::Index1, Joint::Index2, Joint::Index3),
    (Joint::Index2, Joint::Index3, Joint::IndexTip),
    (Joint::Middle1, Joint::Middle2, Joint::Middle3),
    (Joint::Middle2, Joint::Middle3, Joint::MiddleTip),
    (Joint::Ring1, Joint::Ring2, Joint::Ring3),
    (Joint::Ring2, Joint::Ring3, Joint::RingTip),
    (Joint::Pinky1, Joint::Pinky2, Joint::Pinky3),
    (Joint::Pinky2, Joint::Pinky3, Joint::PinkyTip),
];

const KNUCKLE_ANGLES: [(Joint, Joint, Joint); 5] = [
    (Joint::WristRoot, Joint::Thumb1, Joint::Thumb2),
    (Joint::WristRoot, Joint::Index1, Joint::Index2),
    (Joint::WristRoot, Joint::Middle1, Joint::Middle2),
    (Joint::WristRoot, Joint::Ring1, Joint::Ring2),
    (Joint::WristRoot, Joint::Pinky1, Joint::Pinky2),
];

const DISTANCES: [(Joint, Joint); 7] = [
    (Joint::ThumbTip, Joint::IndexTip),
    (Joint::ThumbTip, Joint::PinkyTip),
    (Joint::WristRoot, Joint::IndexTip),
    (Joint::IndexTip, Joint::MiddleTip),
    (Joint::MiddleTip, Joint::RingTip),
    (Joint::RingTip, Joint::PinkyTip),
    (Joint::WristRoot, Joint::PinkyTip),
];

/// Computes the 22 static pose features of a skeleton frame.
pub fn pose_features(skeleton: &HandSkeleton) -> Result<Vec<f32>, PoseError> {
    let mut out = Vec::with_capacity(POSE_FEATURE_COUNT);
    for &(a, b, c) in FINGER_ANGLES.iter().chain(KNUCKLE_ANGLES.iter()) {
        out.push(joint_angle(skeleton, a, b, c)?);
    }
    for &(a, b) in &DISTANCES {
        out.push((skeleton.position(b)? - skeleton.position(a)?).norm());
    }
    Ok(out)
}

/// Bend at `b`: angle between `a -> b` and `b -> c`, in degrees.
fn joint_angle(skeleton: &HandSkeleton, a: Joint, b: Joint, c: Joint) -> Result<f32, PoseError> {
    let pa = skeleton.position(a)?;
    let pb = skeleton.position(b)?;
    let pc = skeleton.position(c)?;
    Ok(angle_between(&(pb - pa), &(pc - pb)))
}

/// Unsigned angle in degrees; zero when either vector has no length.
pub fn angle_between(u: &Vector3<f32>, v: &Vector3<f32>) -> f32 {
    let denom = u.norm() * v.norm();
    if denom < 1e-15 {
        return 0.0;
    }
    (u.dot(v) / denom).clamp(-1.0, 1.0).acos().to_degrees()
}
