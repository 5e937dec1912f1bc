//! Per-landmark Kalman smoothing with predictive lookahead
//!
//! Each landmark axis runs an independent scalar filter:
//!
//! 1. predict: `x̂⁻ = x̂`, `P⁻ = P + q`
//! 2. outlier gate: `|z − x̂⁻| > 3·σ_meas` flags the measurement; policy is
//!    hold (skip the update) or adaptive (widen r for this step)
//! 3. update: `K = P⁻/(P⁻+r)`, `x̂ = x̂⁻ + K(z − x̂⁻)`, `P = (1−K)P⁻`
//!
//! A velocity estimate per axis drives the predictive sample at +Δt
//! (default 50 ms) that compensates downstream latency. An optional EMA
//! layer adds extra damping. A handedness switch resets the filter bank.

use crate::landmarks::{HandObservation, Handedness, Point3, NUM_LANDMARKS};

/// What to do with a measurement that fails the 3σ gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutlierPolicy {
    /// Skip the update, hold the prediction
    Hold,
    /// Widen measurement noise for this step and update anyway
    #[default]
    Adaptive,
}

/// Smoother tuning
#[derive(Debug, Clone, Copy)]
pub struct SmootherConfig {
    /// Process noise
    pub q: f32,
    /// Measurement noise
    pub r: f32,
    /// Predictive lookahead in milliseconds
    pub lookahead_ms: f64,
    /// Extra EMA damping factor; None disables the layer
    pub ema_alpha: Option<f32>,
    pub outlier_policy: OutlierPolicy,
}

impl Default for SmootherConfig {
    fn default() -> Self {
        Self {
            q: 0.01,
            r: 0.1,
            lookahead_ms: 50.0,
            ema_alpha: None,
            outlier_policy: OutlierPolicy::default(),
        }
    }
}

impl SmootherConfig {
    /// Tighter noise model for lower smoothing latency
    pub fn reduced_latency() -> Self {
        Self {
            q: 0.005,
            r: 0.05,
            ..Self::default()
        }
    }

    /// Default tuning plus the EMA damping layer (α ≈ 0.3)
    pub fn extra_damped() -> Self {
        Self {
            ema_alpha: Some(0.3),
            ..Self::default()
        }
    }
}

/// One scalar filter
#[derive(Debug, Clone, Copy)]
struct AxisFilter {
    x: f32,
    p: f32,
    velocity: f32,
    ema: f32,
    initialized: bool,
}

impl AxisFilter {
    fn new() -> Self {
        Self {
            x: 0.0,
            p: 1.0,
            velocity: 0.0,
            ema: 0.0,
            initialized: false,
        }
    }

    /// Run one predict/update cycle; `dt` in seconds
    fn step(&mut self, z: f32, dt: f32, config: &SmootherConfig) -> f32 {
        if !self.initialized {
            self.x = z;
            self.ema = z;
            self.p = config.r;
            self.initialized = true;
            return z;
        }

        // Predict
        let x_prior = self.x;
        let p_prior = self.p + config.q;

        // Outlier gate at 3σ of the measurement noise
        let sigma = config.r.sqrt();
        let innovation = z - x_prior;
        let r_eff = if innovation.abs() > 3.0 * sigma {
            match config.outlier_policy {
                OutlierPolicy::Hold => {
                    self.p = p_prior;
                    return self.output(config);
                }
                OutlierPolicy::Adaptive => config.r * 10.0,
            }
        } else {
            config.r
        };

        // Update
        let k = p_prior / (p_prior + r_eff);
        let x_new = x_prior + k * innovation;
        self.p = (1.0 - k) * p_prior;

        if dt > 0.0 {
            self.velocity = (x_new - self.x) / dt;
        }
        self.x = x_new;
        self.output(config)
    }

    fn output(&mut self, config: &SmootherConfig) -> f32 {
        match config.ema_alpha {
            Some(alpha) => {
                self.ema += alpha * (self.x - self.ema);
                self.ema
            }
            None => self.x,
        }
    }

    /// Extrapolate by `dt` seconds using the velocity estimate
    fn predict_ahead(&self, dt: f32) -> f32 {
        self.x + self.velocity * dt
    }
}

/// Smoothed output for one hand: the filtered observation plus the
/// velocity-extrapolated one at +lookahead
#[derive(Debug, Clone)]
pub struct SmoothedHand {
    pub smoothed: HandObservation,
    pub predicted: HandObservation,
}

/// Filter bank for one hand slot
#[derive(Debug)]
pub struct LandmarkSmoother {
    config: SmootherConfig,
    filters: [[AxisFilter; 3]; NUM_LANDMARKS],
    handedness: Option<Handedness>,
    last_timestamp_ms: f64,
}

impl LandmarkSmoother {
    pub fn new(config: SmootherConfig) -> Self {
        Self {
            config,
            filters: [[AxisFilter::new(); 3]; NUM_LANDMARKS],
            handedness: None,
            last_timestamp_ms: 0.0,
        }
    }

    pub fn config(&self) -> &SmootherConfig {
        &self.config
    }

    /// Drop all filter state
    pub fn reset(&mut self) {
        self.filters = [[AxisFilter::new(); 3]; NUM_LANDMARKS];
        self.handedness = None;
        self.last_timestamp_ms = 0.0;
    }

    /// Smooth one observation. A handedness switch resets the bank first.
    pub fn smooth(&mut self, observation: &HandObservation) -> SmoothedHand {
        if self.handedness != Some(observation.handedness) {
            if self.handedness.is_some() {
                log::debug!("handedness switched, resetting landmark filters");
            }
            self.reset();
            self.handedness = Some(observation.handedness);
        }

        let dt = if self.last_timestamp_ms > 0.0 {
            ((observation.timestamp_ms - self.last_timestamp_ms) / 1000.0).max(0.0) as f32
        } else {
            0.0
        };
        self.last_timestamp_ms = observation.timestamp_ms;

        let lookahead_secs = (self.config.lookahead_ms / 1000.0) as f32;
        let mut smoothed = observation.clone();
        let mut predicted = observation.clone();

        for (i, point) in observation.landmarks.iter().enumerate() {
            let axes = [point.x, point.y, point.z];
            let mut out = [0.0f32; 3];
            let mut ahead = [0.0f32; 3];
            for axis in 0..3 {
                let filter = &mut self.filters[i][axis];
                out[axis] = filter.step(axes[axis], dt, &self.config);
                ahead[axis] = filter.predict_ahead(lookahead_secs);
            }
            smoothed.landmarks[i] = Point3::new(out[0], out[1], out[2]);
            predicted.landmarks[i] = Point3::new(ahead[0], ahead[1], ahead[2]);
        }
        predicted.timestamp_ms = observation.timestamp_ms + self.config.lookahead_ms;

        SmoothedHand { smoothed, predicted }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observation(x: f32, ts: f64, handedness: Handedness) -> HandObservation {
        HandObservation {
            landmarks: [Point3::new(x, 0.5, 0.0); NUM_LANDMARKS],
            handedness,
            confidence: 1.0,
            timestamp_ms: ts,
        }
    }

    #[test]
    fn first_sample_passes_through() {
        let mut smoother = LandmarkSmoother::new(SmootherConfig::default());
        let out = smoother.smooth(&observation(0.3, 0.0, Handedness::Right));
        assert_eq!(out.smoothed.landmarks[0].x, 0.3);
    }

    #[test]
    fn noise_is_damped() {
        let mut smoother = LandmarkSmoother::new(SmootherConfig::default());
        // Converge on 0.5 first
        for i in 0..30 {
            smoother.smooth(&observation(0.5, i as f64 * 33.0, Handedness::Right));
        }
        // A noisy jump is pulled back toward the estimate
        let out = smoother.smooth(&observation(0.58, 1000.0, Handedness::Right));
        let x = out.smoothed.landmarks[0].x;
        assert!(x > 0.5 && x < 0.58, "x = {x}");
    }

    #[test]
    fn outlier_is_rejected_by_hold_policy() {
        let config = SmootherConfig {
            outlier_policy: OutlierPolicy::Hold,
            ..SmootherConfig::default()
        };
        let mut smoother = LandmarkSmoother::new(config);
        for i in 0..30 {
            smoother.smooth(&observation(0.5, i as f64 * 33.0, Handedness::Right));
        }
        // 3σ with r=0.1 is ±0.95; a jump past that is an outlier
        let out = smoother.smooth(&observation(1.5, 1000.0, Handedness::Right));
        let x = out.smoothed.landmarks[0].x;
        assert!((x - 0.5).abs() < 0.01, "outlier leaked into estimate: {x}");
    }

    #[test]
    fn adaptive_policy_still_moves_a_little() {
        let mut smoother = LandmarkSmoother::new(SmootherConfig::default());
        for i in 0..30 {
            smoother.smooth(&observation(0.5, i as f64 * 33.0, Handedness::Right));
        }
        let out = smoother.smooth(&observation(1.5, 1000.0, Handedness::Right));
        let x = out.smoothed.landmarks[0].x;
        assert!(x > 0.5, "adaptive update should move toward measurement");
        assert!(x < 0.7, "adaptive update overshot: {x}");
    }

    #[test]
    fn prediction_extrapolates_motion() {
        let mut smoother = LandmarkSmoother::new(SmootherConfig::default());
        // Steady rightward motion at 0.003/frame, 33 ms frames
        let mut out = None;
        for i in 0..60 {
            let x = 0.2 + i as f32 * 0.003;
            out = Some(smoother.smooth(&observation(x, i as f64 * 33.0, Handedness::Right)));
        }
        let out = out.unwrap();
        assert!(
            out.predicted.landmarks[0].x > out.smoothed.landmarks[0].x,
            "prediction should lead the motion"
        );
    }

    #[test]
    fn handedness_switch_resets() {
        let mut smoother = LandmarkSmoother::new(SmootherConfig::default());
        for i in 0..30 {
            smoother.smooth(&observation(0.9, i as f64 * 33.0, Handedness::Right));
        }
        // Left hand appears: fresh filter, passes through exactly
        let out = smoother.smooth(&observation(0.1, 1000.0, Handedness::Left));
        assert_eq!(out.smoothed.landmarks[0].x, 0.1);
    }
}
