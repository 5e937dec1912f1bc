//! Master-bus dynamics: glue compressor and lookahead limiter
//!
//! Chain order on the master bus: master gain → compressor → limiter →
//! recorder tap → output. The limiter ceiling sits at −1 dBFS so the output
//! never clips even when both decks sum hot.

use crate::types::StereoBuffer;

use super::db_to_linear;

// ── Compressor ────────────────────────────────────────────────────

/// Feed-forward peak compressor with exponential attack/release
#[derive(Debug, Clone)]
pub struct Compressor {
    threshold: f32,
    ratio: f32,
    attack_coeff: f32,
    release_coeff: f32,
    envelope: f32,
    sample_rate: u32,
}

impl Compressor {
    /// Gentle glue settings: −12 dBFS threshold, 4:1, 10 ms / 150 ms
    pub fn new(sample_rate: u32) -> Self {
        let mut c = Self {
            threshold: db_to_linear(-12.0),
            ratio: 4.0,
            attack_coeff: 0.0,
            release_coeff: 0.0,
            envelope: 0.0,
            sample_rate,
        };
        c.set_attack_ms(10.0);
        c.set_release_ms(150.0);
        c
    }

    pub fn set_threshold_db(&mut self, db: f32) {
        self.threshold = db_to_linear(db.clamp(-60.0, 0.0));
    }

    pub fn set_ratio(&mut self, ratio: f32) {
        self.ratio = ratio.clamp(1.0, 20.0);
    }

    pub fn set_attack_ms(&mut self, ms: f32) {
        let ms = ms.clamp(0.1, 500.0);
        self.attack_coeff = (-1.0 / (ms / 1000.0 * self.sample_rate as f32)).exp();
    }

    pub fn set_release_ms(&mut self, ms: f32) {
        let ms = ms.clamp(1.0, 2000.0);
        self.release_coeff = (-1.0 / (ms / 1000.0 * self.sample_rate as f32)).exp();
    }

    pub fn process(&mut self, buffer: &mut StereoBuffer) {
        for sample in buffer.iter_mut() {
            let peak = sample.peak();

            // Envelope follower: fast toward louder, slow toward quieter
            let coeff = if peak > self.envelope {
                self.attack_coeff
            } else {
                self.release_coeff
            };
            self.envelope = coeff * self.envelope + (1.0 - coeff) * peak;

            let gain = if self.envelope > self.threshold {
                let over = self.envelope / self.threshold;
                // Compressed output level relative to input level
                over.powf(1.0 / self.ratio - 1.0)
            } else {
                1.0
            };
            *sample *= gain;
        }
    }

    pub fn reset(&mut self) {
        self.envelope = 0.0;
    }
}

// ── Limiter ───────────────────────────────────────────────────────

/// Lookahead window in seconds (2 ms)
const LOOKAHEAD_SECS: f32 = 0.002;

/// Release time-constant in seconds
const LIMITER_RELEASE_SECS: f32 = 0.08;

/// Feed-forward lookahead limiter
///
/// Audio is delayed by the lookahead window while a sliding-window minimum
/// over per-sample target gains converges the gain envelope *before* a peak
/// reaches the output. The limiter only ever reduces gain; below the
/// threshold the (delayed) signal passes bit-exact.
#[derive(Debug, Clone)]
pub struct MasterLimiter {
    threshold: f32,
    lookahead: usize,
    delay_left: Vec<f32>,
    delay_right: Vec<f32>,
    target_gains: Vec<f32>,
    write_pos: usize,
    gain: f32,
    attack_coeff: f32,
    release_coeff: f32,
    enabled: bool,
}

impl MasterLimiter {
    /// Default ceiling of −1 dBFS per the master-bus contract
    pub fn new(sample_rate: u32) -> Self {
        Self::with_threshold_db(sample_rate, -1.0)
    }

    /// Custom ceiling; clamped to at most −1 dBFS
    pub fn with_threshold_db(sample_rate: u32, db: f32) -> Self {
        let db = db.min(-1.0);
        let lookahead = ((LOOKAHEAD_SECS * sample_rate as f32).round() as usize).max(1);

        // 99% convergence within the lookahead window:
        // coeff^lookahead = 0.01
        let attack_coeff = (0.01f32.ln() / lookahead as f32).exp();
        let release_coeff = (-1.0 / (LIMITER_RELEASE_SECS * sample_rate as f32)).exp();

        Self {
            threshold: db_to_linear(db),
            lookahead,
            delay_left: vec![0.0; lookahead],
            delay_right: vec![0.0; lookahead],
            target_gains: vec![1.0; lookahead],
            write_pos: 0,
            gain: 1.0,
            attack_coeff,
            release_coeff,
            enabled: true,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Latency introduced by the lookahead delay
    pub fn latency_samples(&self) -> usize {
        self.lookahead
    }

    pub fn process(&mut self, buffer: &mut StereoBuffer) {
        if !self.enabled {
            return;
        }

        let n = self.lookahead;
        for sample in buffer.iter_mut() {
            let peak = sample.peak();
            self.target_gains[self.write_pos] = if peak > self.threshold {
                self.threshold / peak
            } else {
                1.0
            };

            // Worst-case gain needed before the delayed audio exits
            let mut min_gain = 1.0f32;
            for &g in &self.target_gains {
                if g < min_gain {
                    min_gain = g;
                }
            }

            let coeff = if min_gain < self.gain {
                self.attack_coeff
            } else {
                self.release_coeff
            };
            self.gain = coeff * self.gain + (1.0 - coeff) * min_gain;

            // Oldest slot is the read position in a ring of exactly n entries
            let out_left = self.delay_left[self.write_pos] * self.gain;
            let out_right = self.delay_right[self.write_pos] * self.gain;
            self.delay_left[self.write_pos] = sample.left;
            self.delay_right[self.write_pos] = sample.right;

            sample.left = out_left;
            sample.right = out_right;
            self.write_pos = (self.write_pos + 1) % n;
        }
    }

    pub fn reset(&mut self) {
        self.delay_left.fill(0.0);
        self.delay_right.fill(0.0);
        self.target_gains.fill(1.0);
        self.gain = 1.0;
        self.write_pos = 0;
    }
}
