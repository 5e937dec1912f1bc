//! Three-band EQ (low shelf / mid bell / high shelf)

use crate::types::StereoBuffer;

use super::{SmoothedParam, GAIN_RAMP_MS};

pub const EQ_GAIN_MIN_DB: f32 = -26.0;
pub const EQ_GAIN_MAX_DB: f32 = 26.0;

/// Corner/center frequencies for the three bands
const LOW_SHELF_HZ: f32 = 120.0;
const MID_BELL_HZ: f32 = 1_000.0;
const HIGH_SHELF_HZ: f32 = 8_000.0;

/// Bell bandwidth Q for the mid band
const MID_Q: f32 = 0.9;

/// Shelf slope parameter
const SHELF_S: f32 = 1.0;

/// Coefficients refresh cadence while a gain ramp is live
const COEFF_UPDATE_FRAMES: usize = 16;

/// EQ band selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[repr(usize)]
pub enum EqBand {
    Low = 0,
    Mid = 1,
    High = 2,
}

impl EqBand {
    pub const ALL: [EqBand; 3] = [EqBand::Low, EqBand::Mid, EqBand::High];

    pub fn from_index(idx: usize) -> Option<Self> {
        match idx {
            0 => Some(EqBand::Low),
            1 => Some(EqBand::Mid),
            2 => Some(EqBand::High),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EqBand::Low => "Low",
            EqBand::Mid => "Mid",
            EqBand::High => "High",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Coeffs {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

#[derive(Debug, Clone, Copy, Default)]
struct Section {
    s1: f32,
    s2: f32,
}

impl Section {
    #[inline]
    fn tick(&mut self, x: f32, c: &Coeffs) -> f32 {
        let y = c.b0 * x + self.s1;
        self.s1 = c.b1 * x - c.a1 * y + self.s2;
        self.s2 = c.b2 * x - c.a2 * y;
        y
    }
}

/// Three cascaded biquad sections with ramped gains in [−26, +26] dB
#[derive(Debug, Clone)]
pub struct Eq3 {
    gains_db: [SmoothedParam; 3],
    coeffs: [Coeffs; 3],
    // [band][channel]
    state: [[Section; 2]; 3],
    sample_rate: u32,
}

impl Eq3 {
    pub fn new(sample_rate: u32) -> Self {
        let mut eq = Self {
            gains_db: std::array::from_fn(|_| SmoothedParam::new(0.0)),
            coeffs: [Coeffs::default(); 3],
            state: [[Section::default(); 2]; 3],
            sample_rate,
        };
        for band in EqBand::ALL {
            eq.update_band_coeffs(band, 0.0);
        }
        eq
    }

    /// Set one band's gain in dB, clamped to [−26, +26], 10 ms ramp
    pub fn set_gain_db(&mut self, band: EqBand, db: f32) {
        let db = db.clamp(EQ_GAIN_MIN_DB, EQ_GAIN_MAX_DB);
        self.gains_db[band as usize].ramp_to(db, GAIN_RAMP_MS, self.sample_rate);
    }

    pub fn gain_db(&self, band: EqBand) -> f32 {
        self.gains_db[band as usize].target()
    }

    /// Return every band to 0 dB in a single operation
    pub fn reset_flat(&mut self) {
        for band in EqBand::ALL {
            self.set_gain_db(band, 0.0);
        }
    }

    fn update_band_coeffs(&mut self, band: EqBand, db: f32) {
        let a = 10.0_f32.powf(db / 40.0);
        let freq = match band {
            EqBand::Low => LOW_SHELF_HZ,
            EqBand::Mid => MID_BELL_HZ,
            EqBand::High => HIGH_SHELF_HZ,
        };
        let w0 = 2.0 * std::f32::consts::PI * freq / self.sample_rate as f32;
        let (sin_w0, cos_w0) = w0.sin_cos();

        let (b0, b1, b2, a0, a1, a2) = match band {
            EqBand::Mid => {
                // RBJ peaking EQ
                let alpha = sin_w0 / (2.0 * MID_Q);
                (
                    1.0 + alpha * a,
                    -2.0 * cos_w0,
                    1.0 - alpha * a,
                    1.0 + alpha / a,
                    -2.0 * cos_w0,
                    1.0 - alpha / a,
                )
            }
            EqBand::Low => {
                // RBJ low shelf
                let alpha = sin_w0 / 2.0
                    * ((a + 1.0 / a) * (1.0 / SHELF_S - 1.0) + 2.0).sqrt();
                let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha),
                    2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0),
                    a * ((a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha),
                    (a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha,
                    -2.0 * ((a - 1.0) + (a + 1.0) * cos_w0),
                    (a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha,
                )
            }
            EqBand::High => {
                // RBJ high shelf
                let alpha = sin_w0 / 2.0
                    * ((a + 1.0 / a) * (1.0 / SHELF_S - 1.0) + 2.0).sqrt();
                let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha),
                    -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0),
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha),
                    (a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha,
                    2.0 * ((a - 1.0) - (a + 1.0) * cos_w0),
                    (a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha,
                )
            }
        };

        self.coeffs[band as usize] = Coeffs {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        };
    }

    /// True when every band is settled at 0 dB
    fn is_flat(&self) -> bool {
        self.gains_db
            .iter()
            .all(|g| !g.is_ramping() && g.value().abs() < 0.01)
    }

    pub fn process(&mut self, buffer: &mut StereoBuffer) {
        if self.is_flat() {
            return;
        }

        let len = buffer.len();
        let mut i = 0;
        while i < len {
            let chunk = (len - i).min(COEFF_UPDATE_FRAMES);
            for band in EqBand::ALL {
                let param = &mut self.gains_db[band as usize];
                let ramping = param.is_ramping();
                let mut db = param.value();
                for _ in 0..chunk {
                    db = param.next();
                }
                if ramping || i == 0 {
                    self.update_band_coeffs(band, db);
                }
            }

            for sample in &mut buffer.as_mut_slice()[i..i + chunk] {
                let mut l = sample.left;
                let mut r = sample.right;
                for band in 0..3 {
                    l = self.state[band][0].tick(l, &self.coeffs[band]);
                    r = self.state[band][1].tick(r, &self.coeffs[band]);
                }
                sample.left = l;
                sample.right = r;
            }
            i += chunk;
        }
    }

    pub fn reset(&mut self) {
        self.state = [[Section::default(); 2]; 3];
    }
}
