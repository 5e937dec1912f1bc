//! Crossfader: two inputs, one output, selectable gain law

use crate::types::StereoBuffer;

use super::{SmoothedParam, GAIN_RAMP_MS};

/// Crossfader gain law
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum CrossfaderCurve {
    Linear,
    #[default]
    ConstantPower,
    Exponential,
    /// Hard cut near the extremes, both sides near full through the middle
    Scratch,
    /// Constant-power with a flat plateau around center
    Smooth,
}

impl CrossfaderCurve {
    /// Gains for (side A, side B) at position `p ∈ [0, 1]`
    pub fn gains(&self, p: f32) -> (f32, f32) {
        let p = p.clamp(0.0, 1.0);
        match self {
            CrossfaderCurve::Linear => (1.0 - p, p),
            CrossfaderCurve::ConstantPower => {
                let theta = p * std::f32::consts::FRAC_PI_2;
                (theta.cos(), theta.sin())
            }
            CrossfaderCurve::Exponential => ((1.0 - p) * (1.0 - p), p * p),
            CrossfaderCurve::Scratch => {
                // Full gain except inside a 5% cut zone at each extreme
                const CUT: f32 = 0.05;
                let a = if p <= 1.0 - CUT {
                    1.0
                } else {
                    (1.0 - p) / CUT
                };
                let b = if p >= CUT { 1.0 } else { p / CUT };
                (a, b)
            }
            CrossfaderCurve::Smooth => {
                // Plateau of width 0.25 around center where both sides hold
                // their center gain; constant-power elsewhere, re-mapped so
                // the ends still reach full cut / full gain
                const HALF_PLATEAU: f32 = 0.125;
                let eff = if (p - 0.5).abs() <= HALF_PLATEAU {
                    0.5
                } else if p < 0.5 {
                    p / (0.5 - HALF_PLATEAU) * 0.5
                } else {
                    1.0 - (1.0 - p) / (0.5 - HALF_PLATEAU) * 0.5
                };
                let theta = eff * std::f32::consts::FRAC_PI_2;
                (theta.cos(), theta.sin())
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CrossfaderCurve::Linear => "linear",
            CrossfaderCurve::ConstantPower => "constant-power",
            CrossfaderCurve::Exponential => "exponential",
            CrossfaderCurve::Scratch => "scratch",
            CrossfaderCurve::Smooth => "smooth",
        }
    }
}

/// Blends the two deck buses into the master bus
#[derive(Debug, Clone)]
pub struct Crossfader {
    position: SmoothedParam,
    curve: CrossfaderCurve,
    sample_rate: u32,
}

impl Crossfader {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            position: SmoothedParam::new(0.5),
            curve: CrossfaderCurve::default(),
            sample_rate,
        }
    }

    /// Position in [0, 1]: 0 = side A only, 1 = side B only. Ramped.
    pub fn set_position(&mut self, p: f32) {
        let p = p.clamp(0.0, 1.0);
        self.position.ramp_to(p, GAIN_RAMP_MS, self.sample_rate);
    }

    pub fn position(&self) -> f32 {
        self.position.target()
    }

    pub fn set_curve(&mut self, curve: CrossfaderCurve) {
        self.curve = curve;
    }

    pub fn curve(&self) -> CrossfaderCurve {
        self.curve
    }

    /// Blend `a` and `b` into `out` (all three must share one length)
    pub fn mix(&mut self, a: &StereoBuffer, b: &StereoBuffer, out: &mut StereoBuffer) {
        debug_assert_eq!(a.len(), out.len());
        debug_assert_eq!(b.len(), out.len());

        for (i, sample) in out.iter_mut().enumerate() {
            let p = self.position.next();
            let (ga, gb) = self.curve.gains(p);
            sample.left = a[i].left * ga + b[i].left * gb;
            sample.right = a[i].right * ga + b[i].right * gb;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StereoSample;

    #[test]
    fn constant_power_preserves_power() {
        let curve = CrossfaderCurve::ConstantPower;
        for i in 0..=100 {
            let p = i as f32 / 100.0;
            let (ga, gb) = curve.gains(p);
            assert!(
                (ga * ga + gb * gb - 1.0).abs() < 1e-5,
                "gA²+gB² != 1 at p={p}"
            );
        }
    }

    #[test]
    fn constant_power_endpoints_and_center() {
        let curve = CrossfaderCurve::ConstantPower;
        let (ga, gb) = curve.gains(0.0);
        assert!((ga - 1.0).abs() < 1e-6 && gb.abs() < 1e-6);
        let (ga, gb) = curve.gains(1.0);
        assert!(ga.abs() < 1e-6 && (gb - 1.0).abs() < 1e-6);
        let (ga, gb) = curve.gains(0.5);
        assert!((ga - 0.70710677).abs() < 1e-4);
        assert!((gb - 0.70710677).abs() < 1e-4);
    }

    #[test]
    fn linear_is_complementary() {
        let curve = CrossfaderCurve::Linear;
        let (ga, gb) = curve.gains(0.25);
        assert!((ga - 0.75).abs() < 1e-6);
        assert!((gb - 0.25).abs() < 1e-6);
    }

    #[test]
    fn exponential_squares_position() {
        let curve = CrossfaderCurve::Exponential;
        let (ga, gb) = curve.gains(0.5);
        assert!((ga - 0.25).abs() < 1e-6);
        assert!((gb - 0.25).abs() < 1e-6);
    }

    #[test]
    fn scratch_holds_full_gain_mid_range() {
        let curve = CrossfaderCurve::Scratch;
        let (ga, gb) = curve.gains(0.5);
        assert_eq!(ga, 1.0);
        assert_eq!(gb, 1.0);
        // Hard cut at the extremes
        let (ga, gb) = curve.gains(0.0);
        assert_eq!(ga, 1.0);
        assert_eq!(gb, 0.0);
        let (_, gb) = curve.gains(0.02);
        assert!(gb < 0.5);
    }

    #[test]
    fn smooth_plateau_is_flat_around_center() {
        let curve = CrossfaderCurve::Smooth;
        let (a1, b1) = curve.gains(0.45);
        let (a2, b2) = curve.gains(0.55);
        assert!((a1 - a2).abs() < 1e-6);
        assert!((b1 - b2).abs() < 1e-6);
        // Ends still reach full cut
        let (ga, gb) = curve.gains(0.0);
        assert!((ga - 1.0).abs() < 1e-6 && gb.abs() < 1e-6);
        let (ga, gb) = curve.gains(1.0);
        assert!(ga.abs() < 1e-5 && (gb - 1.0).abs() < 1e-6);
    }

    #[test]
    fn mix_blends_buffers() {
        let mut fader = Crossfader::new(48_000);
        fader.set_curve(CrossfaderCurve::Linear);
        fader.position.set_immediate(0.0);

        let mut a = StereoBuffer::silence(16);
        let mut b = StereoBuffer::silence(16);
        for s in a.iter_mut() {
            *s = StereoSample::mono(1.0);
        }
        for s in b.iter_mut() {
            *s = StereoSample::mono(-1.0);
        }
        let mut out = StereoBuffer::silence(16);

        fader.mix(&a, &b, &mut out);
        assert_eq!(out[8].left, 1.0);
    }
}
