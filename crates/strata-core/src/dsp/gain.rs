//! Gain node with click-free ramping

use crate::types::StereoBuffer;

use super::{SmoothedParam, GAIN_RAMP_MS};

/// A simple gain stage, value in [0, 1], ramped over 10 ms by default
#[derive(Debug, Clone)]
pub struct Gain {
    value: SmoothedParam,
    sample_rate: u32,
}

impl Gain {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            value: SmoothedParam::new(1.0),
            sample_rate,
        }
    }

    /// Set the gain with the default 10 ms ramp. Clamped to [0, 1].
    pub fn set(&mut self, value: f32) {
        self.set_with_ramp(value, GAIN_RAMP_MS);
    }

    /// Set the gain with an explicit ramp time
    pub fn set_with_ramp(&mut self, value: f32, ramp_ms: f32) {
        let value = value.clamp(0.0, 1.0);
        self.value.ramp_to(value, ramp_ms, self.sample_rate);
    }

    /// The target gain (what a getter should report after a set)
    pub fn get(&self) -> f32 {
        self.value.target()
    }

    pub fn process(&mut self, buffer: &mut StereoBuffer) {
        // Settled and at unity: nothing to do
        if !self.value.is_ramping() && (self.value.value() - 1.0).abs() < f32::EPSILON {
            return;
        }
        for sample in buffer.iter_mut() {
            *sample *= self.value.next();
        }
    }

    pub fn reset(&mut self) {
        self.value.set_immediate(self.value.target());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StereoSample;

    #[test]
    fn set_clamps_to_unit_range() {
        let mut gain = Gain::new(48_000);
        gain.set(1.7);
        assert_eq!(gain.get(), 1.0);
        gain.set(-0.3);
        assert_eq!(gain.get(), 0.0);
    }

    #[test]
    fn ramp_avoids_steps() {
        let mut gain = Gain::new(48_000);
        gain.set_with_ramp(0.0, 10.0);

        let mut buffer = StereoBuffer::silence(480);
        for s in buffer.iter_mut() {
            *s = StereoSample::mono(1.0);
        }
        gain.process(&mut buffer);

        // First sample still near unity, last sample at zero
        assert!(buffer[0].left > 0.99);
        assert!(buffer[479].left.abs() < 1e-6);
        // No step bigger than the linear ramp slope
        for i in 1..480 {
            assert!((buffer[i].left - buffer[i - 1].left).abs() < 0.005);
        }
    }
}
