//! Master-bus recorder
//!
//! The audio thread taps the master bus pre-output and pushes frames into an
//! SPSC sample ring; the control domain drains the ring into a growing
//! buffer and finalizes it into a [`RecordingBlob`] on stop. The audio side
//! never allocates; if the control domain falls behind, frames are dropped
//! and counted.

use crate::types::{StereoSample, SAMPLE_RATE};

/// Ring capacity in frames (~8 s at 48 kHz), enough slack for a stalled
/// control tick
pub const RECORD_RING_FRAMES: usize = SAMPLE_RATE as usize * 8;

/// Audio-thread half: tap the master bus while active
pub struct RecordTap {
    producer: rtrb::Producer<StereoSample>,
    active: bool,
    frames_written: u64,
    frames_dropped: u64,
}

impl RecordTap {
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Begin a session; true if it was not already active
    pub fn start(&mut self) -> bool {
        if self.active {
            return false;
        }
        self.active = true;
        self.frames_written = 0;
        self.frames_dropped = 0;
        true
    }

    /// End the session; returns the frame count, or None if not recording
    pub fn stop(&mut self) -> Option<u64> {
        if !self.active {
            return None;
        }
        self.active = false;
        Some(self.frames_written)
    }

    /// Push one block of master-bus frames (no-op while inactive)
    pub fn capture(&mut self, frames: &[StereoSample]) {
        if !self.active {
            return;
        }
        for &frame in frames {
            match self.producer.push(frame) {
                Ok(()) => self.frames_written += 1,
                Err(_) => self.frames_dropped += 1,
            }
        }
    }

    /// Frames lost to a full ring since the session started
    pub fn dropped(&self) -> u64 {
        self.frames_dropped
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

/// Control-domain half: drain captured frames and build the blob
pub struct RecordCollector {
    consumer: rtrb::Consumer<StereoSample>,
    captured: Vec<StereoSample>,
    sample_rate: u32,
}

impl RecordCollector {
    /// Drain everything currently in the ring
    pub fn drain(&mut self) {
        while let Ok(frame) = self.consumer.pop() {
            self.captured.push(frame);
        }
    }

    /// Finish the session: drain the tail and hand the frames over
    pub fn finalize(&mut self) -> RecordingBlob {
        self.drain();
        RecordingBlob {
            frames: std::mem::take(&mut self.captured),
            sample_rate: self.sample_rate,
        }
    }

    /// Discard anything captured so far (new session starting)
    pub fn reset(&mut self) {
        self.drain();
        self.captured.clear();
    }

    pub fn captured_frames(&self) -> usize {
        self.captured.len()
    }
}

/// Create the tap/collector pair
pub fn record_channel(sample_rate: u32) -> (RecordTap, RecordCollector) {
    let (producer, consumer) = rtrb::RingBuffer::new(RECORD_RING_FRAMES);
    (
        RecordTap {
            producer,
            active: false,
            frames_written: 0,
            frames_dropped: 0,
        },
        RecordCollector {
            consumer,
            captured: Vec::new(),
            sample_rate,
        },
    )
}

/// A finished recording: raw PCM frames plus the rate they were captured at
#[derive(Debug, Clone)]
pub struct RecordingBlob {
    pub frames: Vec<StereoSample>,
    pub sample_rate: u32,
}

impl RecordingBlob {
    pub fn duration_seconds(&self) -> f64 {
        self.frames.len() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Encode as a 32-bit float stereo WAV container
    pub fn to_wav_bytes(&self) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: self.sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            // Writing to an in-memory cursor cannot fail
            let mut writer = hound::WavWriter::new(&mut cursor, spec)
                .expect("in-memory wav writer");
            for frame in &self.frames {
                writer.write_sample(frame.left).expect("in-memory wav write");
                writer.write_sample(frame.right).expect("in-memory wav write");
            }
            writer.finalize().expect("in-memory wav finalize");
        }
        cursor.into_inner()
    }
}
