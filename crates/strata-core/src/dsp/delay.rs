//! Stereo feedback delay (effect send)

use crate::types::StereoBuffer;

use super::{SmoothedParam, GAIN_RAMP_MS};

/// Maximum delay time in seconds
const MAX_DELAY_SECS: f32 = 2.0;

/// Stereo delay line with feedback, used as a send effect: the deck feeds it
/// a scaled copy of the channel signal and the wet output sums into the
/// channel after the filter stage.
#[derive(Debug, Clone)]
pub struct Delay {
    buffer_left: Vec<f32>,
    buffer_right: Vec<f32>,
    write_pos: usize,
    delay_samples: usize,
    feedback: f32,
    send: SmoothedParam,
    sample_rate: u32,
}

impl Delay {
    pub fn new(sample_rate: u32) -> Self {
        let capacity = (MAX_DELAY_SECS * sample_rate as f32) as usize;
        let mut delay = Self {
            buffer_left: vec![0.0; capacity],
            buffer_right: vec![0.0; capacity],
            write_pos: 0,
            delay_samples: 0,
            feedback: 0.4,
            send: SmoothedParam::new(0.0),
            sample_rate,
        };
        delay.set_time_ms(375.0); // dotted eighth at 120 BPM
        delay
    }

    /// Delay time in milliseconds, clamped to the line length
    pub fn set_time_ms(&mut self, ms: f32) {
        let ms = ms.clamp(1.0, MAX_DELAY_SECS * 1000.0);
        self.delay_samples =
            ((ms / 1000.0 * self.sample_rate as f32) as usize).min(self.buffer_left.len() - 1);
    }

    /// Feedback amount, clamped below self-oscillation
    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = feedback.clamp(0.0, 0.95);
    }

    /// Send level in [0, 1], ramped
    pub fn set_send(&mut self, level: f32) {
        let level = level.clamp(0.0, 1.0);
        self.send.ramp_to(level, GAIN_RAMP_MS, self.sample_rate);
    }

    pub fn send(&self) -> f32 {
        self.send.target()
    }

    /// Feed the dry signal through the delay line and sum the wet signal
    /// back into the buffer
    pub fn process(&mut self, buffer: &mut StereoBuffer) {
        if !self.send.is_ramping() && self.send.value() < 1e-4 {
            return;
        }

        let len = self.buffer_left.len();
        for sample in buffer.iter_mut() {
            let send = self.send.next();
            let read_pos = (self.write_pos + len - self.delay_samples) % len;
            let wet_l = self.buffer_left[read_pos];
            let wet_r = self.buffer_right[read_pos];

            self.buffer_left[self.write_pos] = sample.left * send + wet_l * self.feedback;
            self.buffer_right[self.write_pos] = sample.right * send + wet_r * self.feedback;
            self.write_pos = (self.write_pos + 1) % len;

            sample.left += wet_l;
            sample.right += wet_r;
        }
    }

    pub fn reset(&mut self) {
        self.buffer_left.fill(0.0);
        self.buffer_right.fill(0.0);
        self.write_pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StereoSample;

    #[test]
    fn zero_send_is_identity() {
        let mut delay = Delay::new(48_000);
        let mut buf = StereoBuffer::silence(128);
        buf.as_mut_slice()[0] = StereoSample::mono(1.0);
        delay.process(&mut buf);
        assert_eq!(buf[0].left, 1.0);
        assert_eq!(buf[64].left, 0.0);
    }

    #[test]
    fn echo_appears_after_delay_time() {
        let mut delay = Delay::new(48_000);
        delay.set_time_ms(10.0); // 480 samples
        delay.set_send(1.0);

        // Impulse, then silence long enough to hear the echo
        let mut buf = StereoBuffer::silence(1024);
        buf.as_mut_slice()[0] = StereoSample::mono(1.0);
        delay.process(&mut buf);

        // The echo lands 480 samples after the impulse (send ramp makes the
        // exact amplitude depend on the ramp position, it just must be audible)
        assert!(buf[480].left.abs() > 1e-4, "echo missing at 480");
    }
}
