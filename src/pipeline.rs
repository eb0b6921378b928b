//! Per-tick driver joining the sensor, the per-hand buffers, both
//! recognition engines and the recorders.

use log::debug;

use crate::buffer::{BufferConfig, HandFrame, TemporalBuffer};
use crate::classifier::Classifier;
use crate::engine::{GestureConfig, GestureEngine, GestureOutcome, PoseConfig, PoseEngine, PoseOutcome};
use crate::error::StoreError;
use crate::recording::{GestureRecorder, PoseRecorder, RecorderStatus, RecordingConfig, RecordingMode};
use crate::sensor::HandSensor;
use crate::skeleton::{BUFFERED_JOINTS, Hand, Joint, PRIMARY_JOINT};
use crate::store::{SharedStore, lock};

static PRIMARY_ONLY: [Joint; 1] = [PRIMARY_JOINT];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecognizerConfig {
    pub buffer: BufferConfig,
    pub gesture: GestureConfig,
    pub pose: PoseConfig,
    pub recording: RecordingConfig,
}

/// What happened to each hand during one tick. Indexed by `Hand::index`.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub gestures: [GestureOutcome; 2],
    pub poses: [PoseOutcome; 2],
    /// Status of the running capture, if one is armed.
    pub recording: Option<RecorderStatus>,
}

impl TickReport {
    pub fn gesture(&self, hand: Hand) -> &GestureOutcome {
        &self.gestures[hand.index()]
    }

    pub fn pose(&self, hand: Hand) -> &PoseOutcome {
        &self.poses[hand.index()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Capture {
    Gesture(Hand),
    Pose(Hand),
}

pub struct Recognizer<S> {
    sensor: S,
    joints: &'static [Joint],
    buffers: [TemporalBuffer; 2],
    gestures: GestureEngine,
    poses: PoseEngine,
    gesture_model: Box<dyn Classifier>,
    pose_model: Box<dyn Classifier>,
    store: SharedStore,
    gesture_recorder: GestureRecorder,
    pose_recorder: PoseRecorder,
    capture: Option<Capture>,
}

impl<S: HandSensor> Recognizer<S> {
    pub fn new(
        config: RecognizerConfig,
        sensor: S,
        gesture_model: Box<dyn Classifier>,
        pose_model: Box<dyn Classifier>,
        store: SharedStore,
    ) -> Self {
        let joints: &'static [Joint] = if config.buffer.full_tracking {
            &BUFFERED_JOINTS
        } else {
            &PRIMARY_ONLY
        };
        Self {
            sensor,
            joints,
            buffers: [
                TemporalBuffer::new(config.buffer.clone()),
                TemporalBuffer::new(config.buffer.clone()),
            ],
            gesture_recorder: GestureRecorder::new(config.gesture.bounding_cube_size),
            pose_recorder: PoseRecorder::new(&config.recording),
            gestures: GestureEngine::new(config.gesture, &config.buffer),
            poses: PoseEngine::new(config.pose),
            gesture_model,
            pose_model,
            store,
            capture: None,
        }
    }

    /// Samples the sensor and runs one recognition attempt per hand.
    ///
    /// Only a failed store write from a finishing capture is an error; every
    /// recognition fault is reported in the returned outcomes.
    pub fn tick(&mut self, now: f64) -> Result<TickReport, StoreError> {
        let reference = self.sensor.reference_rotation();
        for hand in Hand::BOTH {
            let buffer = &mut self.buffers[hand.index()];
            match self.sensor.positions(hand, self.joints) {
                Some(frame) => buffer.push(now, HandFrame::Tracked(&frame)),
                None => buffer.push(now, HandFrame::Untracked),
            };
        }
        let skeletons = Hand::BOTH.map(|hand| self.sensor.skeleton(hand));

        let mut store = lock(&self.store);
        let gestures = Hand::BOTH.map(|hand| {
            self.gestures.tick(
                now,
                hand,
                &self.buffers[hand.index()],
                &reference,
                self.gesture_model.as_mut(),
                &store,
            )
        });
        let poses = Hand::BOTH.map(|hand| {
            self.poses.tick(
                hand,
                skeletons[hand.index()].as_ref(),
                self.pose_model.as_mut(),
                &store,
            )
        });

        let status = match self.capture {
            Some(Capture::Gesture(hand)) => Some(self.gesture_recorder.tick(
                now,
                &self.buffers[hand.index()],
                &reference,
                &mut store,
            )),
            Some(Capture::Pose(hand)) => Some(self.pose_recorder.tick(
                now,
                skeletons[hand.index()].as_ref(),
                &mut store,
            )),
            None => None,
        };
        let recording = match status {
            Some(Ok(status)) => {
                if matches!(
                    status,
                    RecorderStatus::Committed { .. } | RecorderStatus::Discarded { .. }
                ) {
                    self.capture = None;
                }
                Some(status)
            }
            Some(Err(e)) => {
                self.capture = None;
                return Err(e);
            }
            None => None,
        };

        Ok(TickReport {
            gestures,
            poses,
            recording,
        })
    }

    /// Arms a gesture capture of `hand`, replacing any running capture.
    pub fn record_gesture(&mut self, now: f64, hand: Hand, name: &str, mode: RecordingMode) {
        self.cancel_recording();
        self.gesture_recorder.start(now, name, mode);
        self.capture = Some(Capture::Gesture(hand));
    }

    /// Arms a pose capture of `hand`, replacing any running capture.
    pub fn record_pose(&mut self, now: f64, hand: Hand, name: &str, mode: RecordingMode) {
        self.cancel_recording();
        self.pose_recorder.start(now, name, mode);
        self.capture = Some(Capture::Pose(hand));
    }

    pub fn cancel_recording(&mut self) {
        if self.capture.take().is_some() {
            debug!("recording cancelled");
        }
        self.gesture_recorder.stop();
        self.pose_recorder.stop();
    }

    pub fn is_recording(&self) -> bool {
        self.capture.is_some()
    }

    pub fn buffer(&self, hand: Hand) -> &TemporalBuffer {
        &self.buffers[hand.index()]
    }

    pub fn gestures(&self) -> &GestureEngine {
        &self.gestures
    }

    pub fn gestures_mut(&mut self) -> &mut GestureEngine {
        &mut self.gestures
    }

    pub fn poses(&self) -> &PoseEngine {
        &self.poses
    }

    pub fn poses_mut(&mut self) -> &mut PoseEngine {
        &mut self.poses
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }
}
