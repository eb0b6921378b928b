//! Rolling per-joint trajectory buffers sampled at a fixed rate.

use std::collections::VecDeque;

use log::{debug, warn};
use nalgebra::Vector3;

use crate::skeleton::BUFFERED_JOINTS;

/// Position recorded in place of a real sample while the hand is untracked.
pub const UNTRACKED_SENTINEL: Vector3<f32> = Vector3::new(0.0, 0.0, 0.0);

// host clocks jitter; a tick landing a hair early still counts
const TIMING_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct BufferConfig {
    /// Samples recorded per second, independent of the host tick rate.
    pub sample_rate_hz: f32,
    /// Length of the trajectory kept, in seconds.
    pub buffer_secs: f32,
    /// Minimum path length for a trajectory to count as intentional motion.
    pub deadzone: f32,
    /// Buffer all 19 hand joints instead of the primary joint only.
    pub full_tracking: bool,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 10.0,
            buffer_secs: 3.0,
            deadzone: 0.1,
            full_tracking: false,
        }
    }
}

impl BufferConfig {
    /// Maximum number of samples a buffer holds.
    pub fn capacity(&self) -> usize {
        ((self.buffer_secs * self.sample_rate_hz) as f64 + 1e-6).floor().max(1.0) as usize
    }

    pub fn joint_count(&self) -> usize {
        if self.full_tracking {
            BUFFERED_JOINTS.len()
        } else {
            1
        }
    }
}

/// What the sensor reported for one hand on a sampling tick.
#[derive(Debug, Clone, Copy)]
pub enum HandFrame<'a> {
    /// One position per buffered joint, in `BUFFERED_JOINTS` order.
    Tracked(&'a [Vector3<f32>]),
    Untracked,
}

#[derive(Debug, Clone)]
pub struct TemporalBuffer {
    config: BufferConfig,
    capacity: usize,
    joints: Vec<VecDeque<Vector3<f32>>>,
    last_sample_at: Option<f64>,
    last_untracked_at: Option<f64>,
}

impl TemporalBuffer {
    pub fn new(config: BufferConfig) -> Self {
        let capacity = config.capacity();
        let joints = (0..config.joint_count())
            .map(|_| VecDeque::with_capacity(capacity + 1))
            .collect();
        Self {
            config,
            capacity,
            joints,
            last_sample_at: None,
            last_untracked_at: None,
        }
    }

    pub fn config(&self) -> &BufferConfig {
        &self.config
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.joints[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    /// Records `frame` if at least one sample period has passed since the last
    /// recorded sample. Returns whether a sample was recorded.
    pub fn push(&mut self, now: f64, frame: HandFrame<'_>) -> bool {
        let period = 1.0 / self.config.sample_rate_hz as f64;
        if let Some(last) = self.last_sample_at {
            if now - last < period - TIMING_EPSILON {
                return false;
            }
        }
        self.last_sample_at = Some(now);

        match frame {
            HandFrame::Tracked(positions) if positions.len() >= self.joints.len() => {
                for (queue, p) in self.joints.iter_mut().zip(positions) {
                    queue.push_back(*p);
                }
            }
            HandFrame::Tracked(positions) => {
                warn!(
                    "frame carries {} joints, buffer expects {}; recording as untracked",
                    positions.len(),
                    self.joints.len()
                );
                self.push_untracked(now);
            }
            HandFrame::Untracked => self.push_untracked(now),
        }

        // evict in lockstep so joint indices stay aligned
        while self.joints[0].len() > self.capacity {
            for queue in self.joints.iter_mut() {
                queue.pop_front();
            }
        }
        true
    }

    fn push_untracked(&mut self, now: f64) {
        for queue in self.joints.iter_mut() {
            queue.push_back(UNTRACKED_SENTINEL);
        }
        if !self.is_recovering(now) {
            debug!(
                "hand untracked at {now:.3}s; buffer invalid for {}s",
                self.config.buffer_secs
            );
        }
        self.last_untracked_at = Some(now);
    }

    /// True while an untracked sample is still inside the buffered time span.
    pub fn is_recovering(&self, now: f64) -> bool {
        self.last_untracked_at
            .is_some_and(|t| now - t < self.config.buffer_secs as f64)
    }

    /// Primary joint trajectory, oldest first, or `None` while recovering.
    pub fn snapshot(&self, now: f64) -> Option<Vec<Vector3<f32>>> {
        if self.is_recovering(now) {
            return None;
        }
        Some(self.joints[0].iter().copied().collect())
    }

    /// Like `snapshot`, but also rejects trajectories shorter than the deadzone.
    pub fn snapshot_with_deadzone(&self, now: f64) -> Option<Vec<Vector3<f32>>> {
        self.snapshot(now)
            .filter(|points| passes_deadzone(points, self.config.deadzone))
    }

    /// Every buffered joint trajectory, oldest first, or `None` while recovering.
    pub fn snapshot_all(&self, now: f64) -> Option<Vec<Vec<Vector3<f32>>>> {
        if self.is_recovering(now) {
            return None;
        }
        Some(
            self.joints
                .iter()
                .map(|q| q.iter().copied().collect())
                .collect(),
        )
    }

    pub fn clear(&mut self) {
        for queue in self.joints.iter_mut() {
            queue.clear();
        }
        self.last_sample_at = None;
        self.last_untracked_at = None;
    }
}

/// Sum of Euclidean distances between consecutive points.
pub fn path_length(points: &[Vector3<f32>]) -> f32 {
    points.windows(2).map(|w| (w[1] - w[0]).norm()).sum()
}

pub fn passes_deadzone(points: &[Vector3<f32>], deadzone: f32) -> bool {
    path_length(points) >= deadzone
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f64 = 0.1;

    fn line(total: f32, n: usize) -> Vec<Vector3<f32>> {
        (0..n)
            .map(|i| Vector3::new(total * i as f32 / (n - 1) as f32, 0.0, 0.0))
            .collect()
    }

    fn fill(buf: &mut TemporalBuffer, points: &[Vector3<f32>], start: f64) -> f64 {
        for (i, p) in points.iter().enumerate() {
            let t = start + i as f64 * DT;
            assert!(buf.push(t, HandFrame::Tracked(std::slice::from_ref(p))));
        }
        start + points.len() as f64 * DT
    }

    #[test]
    fn length_never_exceeds_capacity() {
        let mut buf = TemporalBuffer::new(BufferConfig::default());
        assert_eq!(buf.capacity(), 30);
        for i in 0..100 {
            let p = Vector3::new(i as f32, 0.0, 0.0);
            assert!(buf.push(i as f64 * DT, HandFrame::Tracked(&[p])));
            assert!(buf.len() <= buf.capacity());
        }
        let snap = buf.snapshot(10.0).unwrap();
        assert_eq!(snap.len(), 30);
        // oldest were evicted
        assert_eq!(snap[0].x, 70.0);
        assert_eq!(snap[29].x, 99.0);
    }

    #[test]
    fn pushes_are_gated_by_sample_rate() {
        let mut buf = TemporalBuffer::new(BufferConfig::default());
        let p = [Vector3::new(1.0, 2.0, 3.0)];
        assert!(buf.push(0.0, HandFrame::Tracked(&p)));
        assert!(!buf.push(0.05, HandFrame::Tracked(&p)));
        assert!(!buf.push(0.099, HandFrame::Tracked(&p)));
        assert!(buf.push(0.1, HandFrame::Tracked(&p)));
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn untracked_sample_invalidates_for_buffer_duration() {
        let mut buf = TemporalBuffer::new(BufferConfig::default());
        let untracked_at = fill(&mut buf, &line(0.5, 10), 0.0);
        assert_eq!(untracked_at, 1.0);
        assert!(buf.push(untracked_at, HandFrame::Untracked));
        assert_eq!(buf.len(), 11);

        let mut q = untracked_at;
        while q < untracked_at + 3.0 - 1e-9 {
            assert!(buf.snapshot(q).is_none(), "ready too early at {q}");
            assert!(buf.snapshot_all(q).is_none());
            q += 0.25;
        }
        assert!(buf.snapshot(untracked_at + 3.0).is_some());
    }

    #[test]
    fn untracked_sample_is_the_zero_sentinel() {
        let mut buf = TemporalBuffer::new(BufferConfig::default());
        buf.push(0.0, HandFrame::Untracked);
        let snap = buf.snapshot(10.0).unwrap();
        assert_eq!(snap, vec![UNTRACKED_SENTINEL]);
    }

    #[test]
    fn deadzone_accepts_long_line_and_rejects_short_one() {
        let mut buf = TemporalBuffer::new(BufferConfig::default());
        let t = fill(&mut buf, &line(0.5, 30), 0.0);
        let snap = buf.snapshot_with_deadzone(t).unwrap();
        assert_eq!(snap.len(), 30);

        let mut short = TemporalBuffer::new(BufferConfig::default());
        let t = fill(&mut short, &line(0.05, 30), 0.0);
        assert!(short.snapshot_with_deadzone(t).is_none());
        assert!(short.snapshot(t).is_some());
    }

    #[test]
    fn full_tracking_evicts_in_lockstep() {
        let cfg = BufferConfig {
            full_tracking: true,
            buffer_secs: 1.0,
            ..BufferConfig::default()
        };
        let mut buf = TemporalBuffer::new(cfg);
        assert_eq!(buf.joint_count(), 19);
        for i in 0..25 {
            let frame: Vec<_> = (0..19)
                .map(|j| Vector3::new(i as f32, j as f32, 0.0))
                .collect();
            assert!(buf.push(i as f64 * DT, HandFrame::Tracked(&frame)));
        }
        let all = buf.snapshot_all(2.5).unwrap();
        assert_eq!(all.len(), 19);
        for (j, traj) in all.iter().enumerate() {
            assert_eq!(traj.len(), 10);
            assert_eq!(traj[0], Vector3::new(15.0, j as f32, 0.0));
        }
    }

    #[test]
    fn short_frame_is_recorded_as_untracked() {
        let cfg = BufferConfig {
            full_tracking: true,
            ..BufferConfig::default()
        };
        let mut buf = TemporalBuffer::new(cfg);
        buf.push(0.0, HandFrame::Tracked(&[Vector3::new(1.0, 1.0, 1.0)]));
        assert_eq!(buf.len(), 1);
        assert!(buf.is_recovering(1.0));
    }

    #[test]
    fn path_length_sums_segments() {
        let pts = [
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(3.0, 4.0, 0.0),
            Vector3::new(3.0, 4.0, 1.0),
        ];
        assert!((path_length(&pts) - 6.0).abs() < 1e-6);
        assert_eq!(path_length(&pts[..1]), 0.0);
    }
}
