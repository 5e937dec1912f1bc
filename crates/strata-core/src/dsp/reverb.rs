//! Schroeder reverb (effect send)

use crate::types::StereoBuffer;

use super::{SmoothedParam, GAIN_RAMP_MS};

/// Comb delay lengths in samples at 48 kHz (mutually prime-ish, scaled to the
/// actual rate at construction). Right channel offsets by 23 samples for
/// stereo spread.
const COMB_TUNINGS: [usize; 4] = [1557, 1617, 1491, 1422];
const ALLPASS_TUNINGS: [usize; 2] = [225, 556];
const STEREO_SPREAD: usize = 23;

#[derive(Debug, Clone)]
struct Comb {
    buffer: Vec<f32>,
    pos: usize,
    feedback: f32,
    damp: f32,
    filter_state: f32,
}

impl Comb {
    fn new(len: usize) -> Self {
        Self {
            buffer: vec![0.0; len],
            pos: 0,
            feedback: 0.84,
            damp: 0.2,
            filter_state: 0.0,
        }
    }

    #[inline]
    fn tick(&mut self, input: f32) -> f32 {
        let out = self.buffer[self.pos];
        self.filter_state = out * (1.0 - self.damp) + self.filter_state * self.damp;
        self.buffer[self.pos] = input + self.filter_state * self.feedback;
        self.pos = (self.pos + 1) % self.buffer.len();
        out
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.filter_state = 0.0;
        self.pos = 0;
    }
}

#[derive(Debug, Clone)]
struct Allpass {
    buffer: Vec<f32>,
    pos: usize,
}

impl Allpass {
    fn new(len: usize) -> Self {
        Self {
            buffer: vec![0.0; len],
            pos: 0,
        }
    }

    #[inline]
    fn tick(&mut self, input: f32) -> f32 {
        const G: f32 = 0.5;
        let delayed = self.buffer[self.pos];
        let out = delayed - input * G;
        self.buffer[self.pos] = input + delayed * G;
        self.pos = (self.pos + 1) % self.buffer.len();
        out
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.pos = 0;
    }
}

/// Four parallel damped combs into two serial allpasses, per channel
#[derive(Debug, Clone)]
pub struct Reverb {
    combs_left: Vec<Comb>,
    combs_right: Vec<Comb>,
    allpasses_left: Vec<Allpass>,
    allpasses_right: Vec<Allpass>,
    send: SmoothedParam,
    sample_rate: u32,
}

impl Reverb {
    pub fn new(sample_rate: u32) -> Self {
        let scale = sample_rate as f32 / 48_000.0;
        let scaled = |n: usize| ((n as f32 * scale) as usize).max(1);

        Self {
            combs_left: COMB_TUNINGS.iter().map(|&n| Comb::new(scaled(n))).collect(),
            combs_right: COMB_TUNINGS
                .iter()
                .map(|&n| Comb::new(scaled(n + STEREO_SPREAD)))
                .collect(),
            allpasses_left: ALLPASS_TUNINGS.iter().map(|&n| Allpass::new(scaled(n))).collect(),
            allpasses_right: ALLPASS_TUNINGS
                .iter()
                .map(|&n| Allpass::new(scaled(n + STEREO_SPREAD)))
                .collect(),
            send: SmoothedParam::new(0.0),
            sample_rate,
        }
    }

    /// Send level in [0, 1], ramped
    pub fn set_send(&mut self, level: f32) {
        let level = level.clamp(0.0, 1.0);
        self.send.ramp_to(level, GAIN_RAMP_MS, self.sample_rate);
    }

    pub fn send(&self) -> f32 {
        self.send.target()
    }

    /// Room decay, mapped onto comb feedback
    pub fn set_decay(&mut self, decay: f32) {
        let feedback = 0.7 + decay.clamp(0.0, 1.0) * 0.28;
        for comb in self.combs_left.iter_mut().chain(self.combs_right.iter_mut()) {
            comb.feedback = feedback;
        }
    }

    pub fn process(&mut self, buffer: &mut StereoBuffer) {
        if !self.send.is_ramping() && self.send.value() < 1e-4 {
            return;
        }

        for sample in buffer.iter_mut() {
            let send = self.send.next();
            let in_l = sample.left * send;
            let in_r = sample.right * send;

            let mut wet_l = 0.0;
            for comb in &mut self.combs_left {
                wet_l += comb.tick(in_l);
            }
            let mut wet_r = 0.0;
            for comb in &mut self.combs_right {
                wet_r += comb.tick(in_r);
            }
            for ap in &mut self.allpasses_left {
                wet_l = ap.tick(wet_l);
            }
            for ap in &mut self.allpasses_right {
                wet_r = ap.tick(wet_r);
            }

            // Comb bank sums four taps; pull it back to sane level
            sample.left += wet_l * 0.25;
            sample.right += wet_r * 0.25;
        }
    }

    pub fn reset(&mut self) {
        for comb in self.combs_left.iter_mut().chain(self.combs_right.iter_mut()) {
            comb.reset();
        }
        for ap in self
            .allpasses_left
            .iter_mut()
            .chain(self.allpasses_right.iter_mut())
        {
            ap.reset();
        }
    }
}
