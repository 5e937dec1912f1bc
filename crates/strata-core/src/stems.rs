//! Track metadata and the five-stream stem bundle

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{EngineError, EngineResult};
use crate::types::{Stem, StereoBuffer, NUM_STEMS};

/// Track metadata, immutable once loaded onto a deck
#[derive(Debug, Clone)]
pub struct Track {
    /// Caller-assigned identifier
    pub id: String,
    /// Where the audio came from (opaque to the engine)
    pub source: String,
    /// Duration in seconds
    pub duration: f64,
    /// Detected or tagged BPM, if known
    pub bpm: Option<f64>,
    /// Detected or tagged musical key, if known
    pub key: Option<String>,
    /// Downsampled waveform preview for display collaborators
    pub waveform: Option<Vec<f32>>,
    /// Arbitrary metadata passed through untouched
    pub metadata: HashMap<String, String>,
}

impl Track {
    pub fn new(id: impl Into<String>, duration: f64) -> Self {
        Self {
            id: id.into(),
            source: String::new(),
            duration,
            bpm: None,
            key: None,
            waveform: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_bpm(mut self, bpm: f64) -> Self {
        self.bpm = Some(bpm);
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

/// Five aligned streams: four stems plus the original reference
///
/// All streams must share frame count and sample rate exactly; the
/// constructor rejects anything else. Shared behind `Arc` so a command can
/// carry it to the audio thread without copying the audio data.
#[derive(Debug)]
pub struct StemBundle {
    stems: [StereoBuffer; NUM_STEMS],
    original: StereoBuffer,
    sample_rate: u32,
    frames: usize,
}

impl StemBundle {
    /// Validate and assemble a bundle. Every stream must have the same frame
    /// count (±0 frames) and the shared sample rate.
    pub fn new(
        stems: [StereoBuffer; NUM_STEMS],
        original: StereoBuffer,
        sample_rate: u32,
    ) -> EngineResult<Arc<Self>> {
        if sample_rate == 0 {
            return Err(EngineError::StemMisaligned("sample rate is zero".into()));
        }
        let frames = original.len();
        if frames == 0 {
            return Err(EngineError::StemMisaligned("original stream is empty".into()));
        }
        for (i, stem) in stems.iter().enumerate() {
            if stem.len() != frames {
                let name = Stem::from_index(i).map(|s| s.name()).unwrap_or("?");
                return Err(EngineError::StemMisaligned(format!(
                    "{name} has {} frames, original has {frames}",
                    stem.len()
                )));
            }
        }
        Ok(Arc::new(Self {
            stems,
            original,
            sample_rate,
            frames,
        }))
    }

    #[inline]
    pub fn stem(&self, stem: Stem) -> &StereoBuffer {
        &self.stems[stem as usize]
    }

    #[inline]
    pub fn original(&self) -> &StereoBuffer {
        &self.original
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn duration_seconds(&self) -> f64 {
        self.frames as f64 / self.sample_rate as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StereoSample;

    fn buffer_of(frames: usize, level: f32) -> StereoBuffer {
        let mut buf = StereoBuffer::silence(frames);
        for s in buf.iter_mut() {
            *s = StereoSample::mono(level);
        }
        buf
    }

    #[test]
    fn aligned_bundle_is_accepted() {
        let bundle = StemBundle::new(
            std::array::from_fn(|_| buffer_of(1000, 0.1)),
            buffer_of(1000, 0.5),
            48_000,
        )
        .unwrap();
        assert_eq!(bundle.frames(), 1000);
        assert!((bundle.duration_seconds() - 1000.0 / 48_000.0).abs() < 1e-9);
    }

    #[test]
    fn misaligned_stem_is_rejected() {
        let stems = [
            buffer_of(1000, 0.1),
            buffer_of(999, 0.1), // one frame short
            buffer_of(1000, 0.1),
            buffer_of(1000, 0.1),
        ];
        let err = StemBundle::new(stems, buffer_of(1000, 0.5), 48_000).unwrap_err();
        match err {
            EngineError::StemMisaligned(msg) => assert!(msg.contains("Bass")),
            other => panic!("expected StemMisaligned, got {other:?}"),
        }
    }

    #[test]
    fn empty_bundle_is_rejected() {
        let err = StemBundle::new(
            std::array::from_fn(|_| StereoBuffer::default()),
            StereoBuffer::default(),
            48_000,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::StemMisaligned(_)));
    }
}
