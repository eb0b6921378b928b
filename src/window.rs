//! Multi-window temporal resampling.
//!
//! A window takes the most recent part of the primary joint trajectory and
//! stretches it back to the full buffer length, so gestures performed faster
//! than the buffer span still line up with the classifier's input layout.

use log::debug;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::buffer::{BufferConfig, TemporalBuffer, passes_deadzone, path_length};

// spans are accumulated in f32 seconds; keep the last rung of the ladder
const SPAN_EPSILON: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Classify the full buffer only.
    #[default]
    Single,
    /// Classify every window of the growing ladder, keep the strongest.
    BestOf,
    /// Shortest span first, first confident window wins.
    GrowFromLatest,
    /// Full buffer first, then shrinking spans; first confident window wins.
    ShrinkFromFull,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Single => "single",
            Strategy::BestOf => "best_of",
            Strategy::GrowFromLatest => "grow_from_latest",
            Strategy::ShrinkFromFull => "shrink_from_full",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    /// Seconds of trajectory the window covers.
    pub span_secs: f32,
    pub points: Vec<Vector3<f32>>,
}

impl Window {
    pub fn path_length(&self) -> f32 {
        path_length(&self.points)
    }
}

#[derive(Debug, Clone)]
pub struct WindowAggregator {
    sample_rate_hz: f32,
    buffer_secs: f32,
    deadzone: f32,
}

impl WindowAggregator {
    pub fn new(config: &BufferConfig) -> Self {
        Self {
            sample_rate_hz: config.sample_rate_hz,
            buffer_secs: config.buffer_secs,
            deadzone: config.deadzone,
        }
    }

    /// Builds the windows `strategy` evaluates, in evaluation order.
    ///
    /// Returns `None` when the buffer is not ready, the interval is not
    /// positive, or any window of the ladder falls below the deadzone.
    pub fn windows(
        &self,
        buffer: &TemporalBuffer,
        now: f64,
        interval: f32,
        min_interval: f32,
        strategy: Strategy,
    ) -> Option<Vec<Window>> {
        let full = buffer.snapshot_with_deadzone(now)?;
        self.windows_for(&full, interval, min_interval, strategy)
    }

    /// Same as `windows`, over an already captured trajectory.
    pub fn windows_for(
        &self,
        full: &[Vector3<f32>],
        interval: f32,
        min_interval: f32,
        strategy: Strategy,
    ) -> Option<Vec<Window>> {
        if full.is_empty() || !passes_deadzone(full, self.deadzone) {
            return None;
        }
        let whole = Window {
            span_secs: self.buffer_secs,
            points: full.to_vec(),
        };
        if strategy == Strategy::Single {
            return Some(vec![whole]);
        }
        if interval <= 0.0 {
            debug!("window interval {interval} is not positive");
            return None;
        }
        let step = interval.max(min_interval);

        let mut out = Vec::new();
        if strategy == Strategy::ShrinkFromFull {
            out.push(whole);
            let mut k = 1;
            while self.buffer_secs - step * k as f32 >= step - SPAN_EPSILON {
                out.push(self.window(full, self.buffer_secs - step * k as f32)?);
                k += 1;
            }
        } else {
            // best-of evaluates the growing ladder
            let mut k = 1;
            while step * k as f32 <= self.buffer_secs + SPAN_EPSILON {
                out.push(self.window(full, step * k as f32)?);
                k += 1;
            }
            out.push(whole);
        }
        Some(out)
    }

    fn window(&self, full: &[Vector3<f32>], span_secs: f32) -> Option<Window> {
        let sub = ((span_secs * self.sample_rate_hz).round() as usize).clamp(1, full.len());
        let points = resample(&full[full.len() - sub..], full.len());
        if !passes_deadzone(&points, self.deadzone) {
            debug!("window of {span_secs:.2}s is inside the deadzone");
            return None;
        }
        Some(Window { span_secs, points })
    }
}

/// Linearly stretches `source` to `target_len` points.
pub fn resample(source: &[Vector3<f32>], target_len: usize) -> Vec<Vector3<f32>> {
    let Some(first) = source.first() else {
        return Vec::new();
    };
    if source.len() == 1 || target_len == 1 {
        return vec![*first; target_len];
    }
    let last = source.len() - 1;
    (0..target_len)
        .map(|i| {
            let t = i as f32 / (target_len - 1) as f32;
            let pos = t * last as f32;
            let lo = (pos.floor() as usize).min(last);
            let hi = (lo + 1).min(last);
            source[lo].lerp(&source[hi], pos - lo as f32)
        })
        .collect()
}
