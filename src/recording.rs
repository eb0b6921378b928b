//! Capture of new training samples into the store.
//!
//! A gesture capture waits one buffer length after it starts, then stores the
//! normalized trajectory of every buffered joint. A pose capture samples pose
//! features at a fixed interval for a fixed duration and stores them all.

use log::{info, warn};
use nalgebra::UnitQuaternion;

use crate::buffer::TemporalBuffer;
use crate::error::StoreError;
use crate::normalize::{normalize, pose_features};
use crate::skeleton::HandSkeleton;
use crate::store::{SampleKind, SampleStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordingMode {
    /// Add a new label, or append if the name already exists.
    #[default]
    New,
    /// Replace the samples of an existing label.
    Retrain,
    /// Append to an existing label.
    Enhance,
}

/// Pose capture cadence.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingConfig {
    pub pose_interval_secs: f64,
    pub pose_duration_secs: f64,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            pose_interval_secs: 1.0,
            pose_duration_secs: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderStatus {
    Idle,
    Recording,
    /// The deadline passed but the buffer is still recovering from tracking loss.
    BufferNotReady,
    Committed { name: String, vectors: usize },
    /// The capture ended without a single usable sample; no label was created.
    Discarded { name: String },
}

fn commit(
    store: &mut SampleStore,
    kind: SampleKind,
    mode: RecordingMode,
    name: String,
    vectors: Vec<Vec<f32>>,
) -> Result<RecorderStatus, StoreError> {
    let count = vectors.len();
    match mode {
        RecordingMode::New if vectors.is_empty() => {
            warn!("{kind} '{name}' captured no samples; nothing stored");
            return Ok(RecorderStatus::Discarded { name });
        }
        RecordingMode::New => {
            store.add(kind, &name, vectors)?;
        }
        RecordingMode::Retrain => store.retrain(kind, &name, vectors)?,
        RecordingMode::Enhance => store.enhance(kind, &name, vectors)?,
    }
    Ok(RecorderStatus::Committed {
        name,
        vectors: count,
    })
}

#[derive(Debug, Clone)]
struct Capture {
    name: String,
    mode: RecordingMode,
    started_at: f64,
}

#[derive(Debug, Clone)]
pub struct GestureRecorder {
    bounding_cube_size: f32,
    capture: Option<Capture>,
}

impl GestureRecorder {
    pub fn new(bounding_cube_size: f32) -> Self {
        Self {
            bounding_cube_size,
            capture: None,
        }
    }

    pub fn start(&mut self, now: f64, name: &str, mode: RecordingMode) {
        info!("recording gesture '{name}' ({mode:?})");
        self.capture = Some(Capture {
            name: name.to_string(),
            mode,
            started_at: now,
        });
    }

    pub fn stop(&mut self) {
        self.capture = None;
    }

    pub fn is_recording(&self) -> bool {
        self.capture.is_some()
    }

    pub fn tick(
        &mut self,
        now: f64,
        buffer: &TemporalBuffer,
        reference: &UnitQuaternion<f32>,
        store: &mut SampleStore,
    ) -> Result<RecorderStatus, StoreError> {
        let Some(capture) = &self.capture else {
            return Ok(RecorderStatus::Idle);
        };
        // the buffer must have been refilled entirely since the start
        if now - capture.started_at <= buffer.config().buffer_secs as f64 {
            return Ok(RecorderStatus::Recording);
        }
        let Some(trajectories) = buffer.snapshot_all(now) else {
            return Ok(RecorderStatus::BufferNotReady);
        };

        let mut vectors = Vec::with_capacity(trajectories.len());
        for (joint, traj) in trajectories.iter().enumerate() {
            match normalize(traj, reference, self.bounding_cube_size) {
                Ok(v) => vectors.push(v),
                Err(e) => warn!("joint {joint} skipped in gesture '{}': {e}", capture.name),
            }
        }

        let name = capture.name.clone();
        let mode = capture.mode;
        self.capture = None;
        commit(store, SampleKind::Gesture, mode, name, vectors)
    }
}

#[derive(Debug, Clone)]
pub struct PoseRecorder {
    interval_secs: f64,
    duration_secs: f64,
    capture: Option<Capture>,
    next_at: f64,
    captured: Vec<Vec<f32>>,
}

impl PoseRecorder {
    pub fn new(config: &RecordingConfig) -> Self {
        Self {
            interval_secs: config.pose_interval_secs,
            duration_secs: config.pose_duration_secs,
            capture: None,
            next_at: 0.0,
            captured: Vec::new(),
        }
    }

    pub fn start(&mut self, now: f64, name: &str, mode: RecordingMode) {
        info!("recording pose '{name}' ({mode:?})");
        self.capture = Some(Capture {
            name: name.to_string(),
            mode,
            started_at: now,
        });
        self.next_at = now;
        self.captured.clear();
    }

    pub fn stop(&mut self) {
        self.capture = None;
        self.captured.clear();
    }

    pub fn is_recording(&self) -> bool {
        self.capture.is_some()
    }

    pub fn captured(&self) -> usize {
        self.captured.len()
    }

    pub fn tick(
        &mut self,
        now: f64,
        skeleton: Option<&HandSkeleton>,
        store: &mut SampleStore,
    ) -> Result<RecorderStatus, StoreError> {
        let Some(capture) = &self.capture else {
            return Ok(RecorderStatus::Idle);
        };

        if now - capture.started_at >= self.duration_secs {
            let name = capture.name.clone();
            let mode = capture.mode;
            let vectors = std::mem::take(&mut self.captured);
            self.capture = None;
            return commit(store, SampleKind::Pose, mode, name, vectors);
        }

        if now >= self.next_at {
            self.next_at = now + self.interval_secs;
            match skeleton.map(pose_features) {
                Some(Ok(features)) => self.captured.push(features),
                Some(Err(e)) => warn!("pose sample skipped: {e}"),
                None => warn!("pose sample skipped: hand not tracked"),
            }
        }
        Ok(RecorderStatus::Recording)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{BufferConfig, HandFrame};
    use crate::skeleton::JOINT_COUNT;
    use nalgebra::Vector3;

    fn moving(t: f64) -> Vector3<f32> {
        Vector3::new(t as f32 * 0.2, (t as f32).sin() * 0.1, 0.0)
    }

    #[test]
    fn gesture_capture_commits_every_joint_after_one_buffer_length() {
        let cfg = BufferConfig {
            full_tracking: true,
            ..BufferConfig::default()
        };
        let mut buf = TemporalBuffer::new(cfg);
        let mut store = SampleStore::in_memory();
        let mut rec = GestureRecorder::new(1.0);
        let q = UnitQuaternion::identity();
        rec.start(0.0, "wave", RecordingMode::New);

        let mut committed = None;
        for i in 0..40 {
            let t = i as f64 * 0.1;
            let frame: Vec<_> = (0..19).map(|j| moving(t) + Vector3::new(j as f32, 0.0, 0.0)).collect();
            buf.push(t, HandFrame::Tracked(&frame));
            match rec.tick(t, &buf, &q, &mut store).unwrap() {
                RecorderStatus::Recording => assert!(t <= 3.0 + 1e-9),
                RecorderStatus::Committed { name, vectors } => {
                    committed = Some((name, vectors));
                    break;
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(committed, Some(("wave".to_string(), 19)));
        assert!(!rec.is_recording());
        let sample = store.get(SampleKind::Gesture, "wave").unwrap();
        assert_eq!(sample.index, 0);
        assert!(sample.data.iter().all(|v| v.len() == 90));
    }

    #[test]
    fn gesture_capture_waits_for_tracking_recovery() {
        let mut buf = TemporalBuffer::new(BufferConfig::default());
        let mut store = SampleStore::in_memory();
        let mut rec = GestureRecorder::new(1.0);
        rec.start(0.0, "wave", RecordingMode::New);
        buf.push(3.0, HandFrame::Untracked);
        let status = rec
            .tick(3.5, &buf, &UnitQuaternion::identity(), &mut store)
            .unwrap();
        assert_eq!(status, RecorderStatus::BufferNotReady);
        assert!(rec.is_recording());
    }

    #[test]
    fn retrain_of_unknown_gesture_is_reported() {
        let mut buf = TemporalBuffer::new(BufferConfig::default());
        for i in 0..30 {
            let t = i as f64 * 0.1;
            buf.push(t, HandFrame::Tracked(&[moving(t)]));
        }
        let mut store = SampleStore::in_memory();
        let mut rec = GestureRecorder::new(1.0);
        rec.start(-1.0, "circle", RecordingMode::Retrain);
        assert!(matches!(
            rec.tick(3.0, &buf, &UnitQuaternion::identity(), &mut store),
            Err(StoreError::UnknownLabel { .. })
        ));
    }

    #[test]
    fn pose_capture_samples_on_interval() {
        let sk = HandSkeleton::new(
            (0..JOINT_COUNT)
                .map(|i| Vector3::new(i as f32, (i % 2) as f32, 0.0))
                .collect(),
        );
        let mut store = SampleStore::in_memory();
        store.add(SampleKind::Pose, "fist", vec![vec![0.0; 22]]).unwrap();

        let mut rec = PoseRecorder::new(&RecordingConfig {
            pose_interval_secs: 1.0,
            pose_duration_secs: 5.0,
        });
        rec.start(0.0, "fist", RecordingMode::Enhance);
        let mut t = 0.0;
        let status = loop {
            // untracked frames in the middle are skipped
            let frame = if (2.0..3.0).contains(&t) { None } else { Some(&sk) };
            let s = rec.tick(t, frame, &mut store).unwrap();
            if s != RecorderStatus::Recording {
                break s;
            }
            t += 0.25;
        };
        assert_eq!(
            status,
            RecorderStatus::Committed {
                name: "fist".to_string(),
                vectors: 4
            }
        );
        assert_eq!(store.get(SampleKind::Pose, "fist").unwrap().data.len(), 5);
    }

    #[test]
    fn empty_pose_capture_stores_no_label() {
        let mut store = SampleStore::in_memory();
        let mut rec = PoseRecorder::new(&RecordingConfig {
            pose_interval_secs: 1.0,
            pose_duration_secs: 3.0,
        });
        rec.start(0.0, "point", RecordingMode::New);
        for t in [0.0, 1.0, 2.0] {
            assert_eq!(rec.tick(t, None, &mut store).unwrap(), RecorderStatus::Recording);
        }
        assert_eq!(
            rec.tick(3.0, None, &mut store).unwrap(),
            RecorderStatus::Discarded {
                name: "point".to_string()
            }
        );
        assert!(!rec.is_recording());
        assert_eq!(store.len(SampleKind::Pose), 0);
        assert_eq!(store.name_to_index(SampleKind::Pose, "point"), None);
    }

    #[test]
    fn idle_recorders_do_nothing() {
        let mut store = SampleStore::in_memory();
        let mut pose = PoseRecorder::new(&RecordingConfig {
            pose_interval_secs: 1.0,
            pose_duration_secs: 5.0,
        });
        assert_eq!(pose.tick(0.0, None, &mut store).unwrap(), RecorderStatus::Idle);
        let mut gesture = GestureRecorder::new(1.0);
        let buf = TemporalBuffer::new(BufferConfig::default());
        assert_eq!(
            gesture
                .tick(0.0, &buf, &UnitQuaternion::identity(), &mut store)
                .unwrap(),
            RecorderStatus::Idle
        );
    }
}
