//! Analyzer worker thread
//!
//! The worker receives immutable requests over a channel, analyzes them, and
//! returns exactly one response per request id. A panicking analyzer kills
//! the worker thread; the client notices the disconnected channel and treats
//! it as a crash.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use crossbeam::channel::{bounded, Receiver, Sender};

use crate::key::estimate_key;
use crate::protocol::{
    AnalysisFeature, AnalysisRequest, AnalysisResponse, AnalysisResult, BpmEstimate, KeyEstimate,
};
use crate::tempo::{beat_grid, detect_onsets, estimate_bpm, spectral_centroid};

/// Something that can analyze one request synchronously
pub trait Analyzer: Send + Sync {
    fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, String>;
}

/// The built-in analyzer: onsets → BPM histogram, chroma → key
#[derive(Debug, Default)]
pub struct DefaultAnalyzer;

impl Analyzer for DefaultAnalyzer {
    fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, String> {
        if request.samples.is_empty() {
            return Err("empty sample buffer".into());
        }
        if request.sample_rate == 0 {
            return Err("sample rate is zero".into());
        }

        let samples = request.samples.as_slice();
        let rate = request.sample_rate;
        let duration = samples.len() as f64 / rate as f64;

        let wants = |f: AnalysisFeature| request.features.contains(&f);
        let needs_onsets =
            wants(AnalysisFeature::Onsets) || wants(AnalysisFeature::Bpm);

        let mut result = AnalysisResult::default();
        let onsets = if needs_onsets {
            detect_onsets(samples, rate)
        } else {
            Vec::new()
        };

        if wants(AnalysisFeature::Bpm) {
            let (bpm, confidence) = estimate_bpm(&onsets);
            result.bpm = Some(BpmEstimate { bpm, confidence });
            if bpm > 0.0 {
                let first = onsets.first().copied().unwrap_or(0.0);
                let (beats, downbeats) = beat_grid(bpm, first, duration);
                result.beats = Some(beats);
                result.downbeats = Some(downbeats);
            }
        }
        if wants(AnalysisFeature::Onsets) {
            result.onsets = Some(onsets);
        }
        if wants(AnalysisFeature::Key) {
            let (key, confidence) = estimate_key(samples, rate);
            result.key = Some(KeyEstimate { key, confidence });
        }
        if wants(AnalysisFeature::Spectral) {
            result.spectral_centroid = Some(spectral_centroid(samples, rate));
        }
        Ok(result)
    }
}

/// Channel handles to a spawned worker thread
pub struct WorkerHandle {
    pub requests: Sender<AnalysisRequest>,
    pub responses: Receiver<AnalysisResponse>,
}

impl WorkerHandle {
    /// Spawn a worker running `analyzer`. The thread exits when the request
    /// channel closes or the analyzer panics.
    pub fn spawn(analyzer: Arc<dyn Analyzer>) -> std::io::Result<Self> {
        let (request_tx, request_rx) = bounded::<AnalysisRequest>(32);
        let (response_tx, response_rx) = bounded::<AnalysisResponse>(32);

        // Detached: the thread exits when its channels close
        let _ = std::thread::Builder::new()
            .name("analysis-worker".into())
            .spawn(move || {
                log::debug!("analysis worker started");
                while let Ok(request) = request_rx.recv() {
                    let id = request.id;
                    let started = Instant::now();
                    let outcome =
                        catch_unwind(AssertUnwindSafe(|| analyzer.analyze(&request)));
                    let processing_ms = started.elapsed().as_millis() as u64;

                    match outcome {
                        Ok(result) => {
                            let response = AnalysisResponse {
                                id,
                                result,
                                processing_ms,
                            };
                            if response_tx.send(response).is_err() {
                                break;
                            }
                        }
                        Err(_) => {
                            // Analyzer panicked: die so the client sees a
                            // disconnected channel and respawns
                            log::error!("analysis worker panicked on request {id}");
                            break;
                        }
                    }
                }
                log::debug!("analysis worker stopped");
            })?;

        Ok(Self {
            requests: request_tx,
            responses: response_rx,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::AnalysisOptions;

    fn request(samples: Vec<f32>, rate: u32) -> AnalysisRequest {
        AnalysisRequest {
            id: 1,
            samples: Arc::new(samples),
            sample_rate: rate,
            features: AnalysisOptions::default().features,
        }
    }

    #[test]
    fn empty_input_is_an_error() {
        let analyzer = DefaultAnalyzer;
        let err = analyzer.analyze(&request(Vec::new(), 44_100)).unwrap_err();
        assert!(err.contains("empty"));
    }

    #[test]
    fn worker_responds_over_channel() {
        let handle = WorkerHandle::spawn(Arc::new(DefaultAnalyzer)).unwrap();
        let samples = vec![0.0f32; 44_100];
        handle.requests.send(request(samples, 44_100)).unwrap();

        let response = handle
            .responses
            .recv_timeout(std::time::Duration::from_secs(10))
            .unwrap();
        assert_eq!(response.id, 1);
        let result = response.result.unwrap();
        // Silence: BPM present but with zero confidence
        assert_eq!(result.bpm.unwrap().confidence, 0.0);
    }

    #[test]
    fn panicking_analyzer_kills_the_worker() {
        struct Bomb;
        impl Analyzer for Bomb {
            fn analyze(&self, _: &AnalysisRequest) -> Result<AnalysisResult, String> {
                panic!("boom");
            }
        }

        let handle = WorkerHandle::spawn(Arc::new(Bomb)).unwrap();
        handle.requests.send(request(vec![0.0; 64], 44_100)).unwrap();

        // The worker dies without responding; the channel disconnects
        let outcome = handle
            .responses
            .recv_timeout(std::time::Duration::from_secs(5));
        assert!(outcome.is_err());
    }
}
