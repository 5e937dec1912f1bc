//! Analyzer wire contract
//!
//! Request `{id, samples, sample_rate, features}` in, response
//! `{id, result | error, processing_ms}` out. Exactly one response per
//! request id; the client discards anything it no longer has pending.

use std::sync::Arc;
use std::time::Duration;

/// Features a request can ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalysisFeature {
    Bpm,
    Key,
    Onsets,
    Spectral,
}

/// Per-request options
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    pub features: Vec<AnalysisFeature>,
    pub timeout: Duration,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            features: vec![AnalysisFeature::Bpm, AnalysisFeature::Key, AnalysisFeature::Onsets],
            timeout: super::client::DEFAULT_TIMEOUT,
        }
    }
}

impl AnalysisOptions {
    pub fn bpm_only() -> Self {
        Self {
            features: vec![AnalysisFeature::Bpm],
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A request as handed to the worker
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub id: u64,
    /// Mono samples in [−1, +1], shared so dedup never copies audio
    pub samples: Arc<Vec<f32>>,
    pub sample_rate: u32,
    pub features: Vec<AnalysisFeature>,
}

/// A response as produced by the worker
#[derive(Debug, Clone)]
pub struct AnalysisResponse {
    pub id: u64,
    pub result: Result<AnalysisResult, String>,
    pub processing_ms: u64,
}

/// BPM with detection confidence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BpmEstimate {
    pub bpm: f64,
    pub confidence: f32,
}

/// Musical key label with detection confidence
#[derive(Debug, Clone, PartialEq)]
pub struct KeyEstimate {
    pub key: String,
    pub confidence: f32,
}

/// The analyzer's output for one request
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnalysisResult {
    pub bpm: Option<BpmEstimate>,
    pub key: Option<KeyEstimate>,
    /// Onset times in seconds
    pub onsets: Option<Vec<f64>>,
    /// Beat grid in seconds (derived from BPM + first onset)
    pub beats: Option<Vec<f64>>,
    /// Every fourth beat
    pub downbeats: Option<Vec<f64>>,
    /// Spectral centroid estimate in Hz
    pub spectral_centroid: Option<f64>,
}

impl AnalysisResult {
    /// Sentinel result used when no worker is available: BPM 0, key unknown,
    /// zero confidence everywhere. The coordinator reads confidence 0 as
    /// "skip sync".
    pub fn fallback() -> Self {
        Self {
            bpm: Some(BpmEstimate {
                bpm: 0.0,
                confidence: 0.0,
            }),
            key: Some(KeyEstimate {
                key: "unknown".into(),
                confidence: 0.0,
            }),
            onsets: None,
            beats: None,
            downbeats: None,
            spectral_centroid: None,
        }
    }

    /// True if this is usable for beat-sync
    pub fn has_confident_bpm(&self) -> bool {
        self.bpm.map(|b| b.confidence > 0.0 && b.bpm > 0.0).unwrap_or(false)
    }
}
