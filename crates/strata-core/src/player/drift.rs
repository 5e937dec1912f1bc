//! Inter-stream drift monitoring
//!
//! Every ~50 ms of audio time the player hands the monitor all five stream
//! positions. If the maximum pairwise divergence exceeds 5 ms the monitor
//! orders a re-anchor to the median position and counts the event.

/// How often positions are sampled, in milliseconds of audio time
pub const DRIFT_CHECK_INTERVAL_MS: f64 = 50.0;

/// Maximum tolerated pairwise drift before re-anchoring
pub const MAX_DRIFT_MS: f64 = 5.0;

/// Outcome of a drift check
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DriftDecision {
    /// All streams within tolerance
    Aligned { max_drift_ms: f64 },
    /// Re-anchor every stream to this position (frames)
    Reanchor {
        max_drift_ms: f64,
        median_frames: f64,
    },
}

/// Counts down audio frames between checks and evaluates stream positions
#[derive(Debug, Clone)]
pub struct DriftMonitor {
    interval_frames: usize,
    countdown: usize,
    events: u64,
}

impl DriftMonitor {
    pub fn new(sample_rate: u32) -> Self {
        let interval_frames =
            ((DRIFT_CHECK_INTERVAL_MS / 1000.0) * sample_rate as f64) as usize;
        Self {
            interval_frames: interval_frames.max(1),
            countdown: interval_frames.max(1),
            events: 0,
        }
    }

    /// Advance the countdown by `frames`; true when a check is due
    pub fn tick(&mut self, frames: usize) -> bool {
        if frames >= self.countdown {
            self.countdown = self.interval_frames;
            true
        } else {
            self.countdown -= frames;
            false
        }
    }

    /// Evaluate stream positions (frames at `stream_rate`)
    pub fn evaluate(&mut self, positions: &[f64], stream_rate: u32) -> DriftDecision {
        debug_assert!(!positions.is_empty());
        let min = positions.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = positions.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let max_drift_ms = (max - min) / stream_rate as f64 * 1000.0;

        if max_drift_ms > MAX_DRIFT_MS {
            self.events += 1;
            DriftDecision::Reanchor {
                max_drift_ms,
                median_frames: median(positions),
            }
        } else {
            DriftDecision::Aligned { max_drift_ms }
        }
    }

    /// Total re-anchor events since construction
    pub fn events(&self) -> u64 {
        self.events
    }

    pub fn reset(&mut self) {
        self.countdown = self.interval_frames;
    }
}

fn median(values: &[f64]) -> f64 {
    let mut sorted: Vec<f64> = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    }
}
