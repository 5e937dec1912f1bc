//! Biquad filter node (RBJ cookbook coefficients)

use crate::types::StereoBuffer;

use super::{SmoothedParam, FILTER_RAMP_MS};

pub const FILTER_FREQ_MIN: f32 = 20.0;
pub const FILTER_FREQ_MAX: f32 = 20_000.0;
pub const FILTER_Q_MIN: f32 = 0.1;
pub const FILTER_Q_MAX: f32 = 20.0;

/// Coefficients are refreshed every this many frames while a ramp is live
const COEFF_UPDATE_FRAMES: usize = 16;

/// Filter response type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum FilterType {
    #[default]
    Lowpass,
    Highpass,
    Bandpass,
    Notch,
}

/// Normalized biquad coefficients (a0 divided out)
#[derive(Debug, Clone, Copy, Default)]
struct Coeffs {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

/// Per-channel transposed direct form II state
#[derive(Debug, Clone, Copy, Default)]
struct BiquadState {
    s1: f32,
    s2: f32,
}

impl BiquadState {
    #[inline]
    fn tick(&mut self, x: f32, c: &Coeffs) -> f32 {
        let y = c.b0 * x + self.s1;
        self.s1 = c.b1 * x - c.a1 * y + self.s2;
        self.s2 = c.b2 * x - c.a2 * y;
        y
    }
}

/// Stereo biquad with selectable response, ramped cutoff/Q and a bypass flag
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    filter_type: FilterType,
    frequency: SmoothedParam,
    q: SmoothedParam,
    enabled: bool,
    sample_rate: u32,
    coeffs: Coeffs,
    left: BiquadState,
    right: BiquadState,
}

impl BiquadFilter {
    pub fn new(sample_rate: u32) -> Self {
        let mut filter = Self {
            filter_type: FilterType::Lowpass,
            frequency: SmoothedParam::new(1_000.0),
            q: SmoothedParam::new(0.707),
            enabled: false,
            sample_rate,
            coeffs: Coeffs::default(),
            left: BiquadState::default(),
            right: BiquadState::default(),
        };
        filter.update_coeffs(1_000.0, 0.707);
        filter
    }

    pub fn set_type(&mut self, filter_type: FilterType) {
        if self.filter_type != filter_type {
            self.filter_type = filter_type;
            self.update_coeffs(self.frequency.value(), self.q.value());
        }
    }

    pub fn filter_type(&self) -> FilterType {
        self.filter_type
    }

    /// Cutoff in Hz, clamped to [20, 20000], 5 ms ramp
    pub fn set_frequency(&mut self, hz: f32) {
        let hz = hz.clamp(FILTER_FREQ_MIN, FILTER_FREQ_MAX);
        self.frequency.ramp_to(hz, FILTER_RAMP_MS, self.sample_rate);
    }

    pub fn frequency(&self) -> f32 {
        self.frequency.target()
    }

    /// Resonance, clamped to [0.1, 20], 5 ms ramp
    pub fn set_q(&mut self, q: f32) {
        let q = q.clamp(FILTER_Q_MIN, FILTER_Q_MAX);
        self.q.ramp_to(q, FILTER_RAMP_MS, self.sample_rate);
    }

    pub fn q(&self) -> f32 {
        self.q.target()
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled && !enabled {
            // State would otherwise replay stale energy on re-enable
            self.left = BiquadState::default();
            self.right = BiquadState::default();
        }
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn update_coeffs(&mut self, freq: f32, q: f32) {
        let w0 = 2.0 * std::f32::consts::PI * freq / self.sample_rate as f32;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * q);

        let (b0, b1, b2, a0, a1, a2) = match self.filter_type {
            FilterType::Lowpass => {
                let b1 = 1.0 - cos_w0;
                let b0 = b1 / 2.0;
                (b0, b1, b0, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
            }
            FilterType::Highpass => {
                let b1 = -(1.0 + cos_w0);
                let b0 = (1.0 + cos_w0) / 2.0;
                (b0, b1, b0, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
            }
            FilterType::Bandpass => {
                (alpha, 0.0, -alpha, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
            }
            FilterType::Notch => {
                (1.0, -2.0 * cos_w0, 1.0, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
            }
        };

        self.coeffs = Coeffs {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        };
    }

    pub fn process(&mut self, buffer: &mut StereoBuffer) {
        if !self.enabled {
            // Keep ramps advancing so a re-enable lands at the right values
            for _ in 0..buffer.len() {
                self.frequency.next();
                self.q.next();
            }
            return;
        }

        let len = buffer.len();
        let mut i = 0;
        while i < len {
            let chunk = (len - i).min(COEFF_UPDATE_FRAMES);
            let mut freq = self.frequency.value();
            let mut q = self.q.value();
            for _ in 0..chunk {
                freq = self.frequency.next();
                q = self.q.next();
            }
            if self.frequency.is_ramping() || self.q.is_ramping() || i == 0 {
                self.update_coeffs(freq, q);
            }

            for sample in &mut buffer.as_mut_slice()[i..i + chunk] {
                sample.left = self.left.tick(sample.left, &self.coeffs);
                sample.right = self.right.tick(sample.right, &self.coeffs);
            }
            i += chunk;
        }
    }

    pub fn reset(&mut self) {
        self.left = BiquadState::default();
        self.right = BiquadState::default();
    }
}
