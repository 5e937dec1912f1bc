//! Lock-free state published by the audio thread
//!
//! The control domain reads playback state through relaxed atomics instead of
//! locking the engine. f64 values travel as bit patterns in `AtomicU64`.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// Per-deck state mirror
#[derive(Debug, Default)]
pub struct DeckAtomics {
    /// Normalized position bits (f64)
    position: AtomicU64,
    /// Position in seconds bits (f64)
    seconds: AtomicU64,
    playing: AtomicBool,
    loaded: AtomicBool,
    /// Current BPM bits (f64); 0.0 = unknown
    bpm: AtomicU64,
    /// Pitch percent bits (f64)
    pitch: AtomicU64,
    drift_events: AtomicU64,
}

impl DeckAtomics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn store_position(&self, position: f64, seconds: f64) {
        self.position.store(position.to_bits(), Ordering::Relaxed);
        self.seconds.store(seconds.to_bits(), Ordering::Relaxed);
    }

    pub(crate) fn store_playing(&self, playing: bool) {
        self.playing.store(playing, Ordering::Relaxed);
    }

    pub(crate) fn store_loaded(&self, loaded: bool) {
        self.loaded.store(loaded, Ordering::Relaxed);
    }

    pub(crate) fn store_bpm(&self, bpm: f64) {
        self.bpm.store(bpm.to_bits(), Ordering::Relaxed);
    }

    pub(crate) fn store_pitch(&self, pitch: f64) {
        self.pitch.store(pitch.to_bits(), Ordering::Relaxed);
    }

    pub(crate) fn count_drift_event(&self) {
        self.drift_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn position(&self) -> f64 {
        f64::from_bits(self.position.load(Ordering::Relaxed))
    }

    pub fn seconds(&self) -> f64 {
        f64::from_bits(self.seconds.load(Ordering::Relaxed))
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Relaxed)
    }

    /// 0.0 means no BPM known
    pub fn bpm(&self) -> f64 {
        f64::from_bits(self.bpm.load(Ordering::Relaxed))
    }

    pub fn pitch(&self) -> f64 {
        f64::from_bits(self.pitch.load(Ordering::Relaxed))
    }

    pub fn drift_events(&self) -> u64 {
        self.drift_events.load(Ordering::Relaxed)
    }
}

/// Engine-wide state mirror
#[derive(Debug, Default)]
pub struct EngineAtomics {
    recording: AtomicBool,
    recorded_frames: AtomicU64,
    /// Master peak bits (f32), decaying per block
    master_peak: AtomicU32,
    /// Frames processed since engine start (drives the host clock)
    frames_processed: AtomicU64,
    active_nodes: AtomicU32,
}

impl EngineAtomics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn store_recording(&self, active: bool) {
        self.recording.store(active, Ordering::Relaxed);
    }

    pub(crate) fn store_recorded_frames(&self, frames: u64) {
        self.recorded_frames.store(frames, Ordering::Relaxed);
    }

    pub(crate) fn store_master_peak(&self, peak: f32) {
        self.master_peak.store(peak.to_bits(), Ordering::Relaxed);
    }

    pub(crate) fn add_frames(&self, frames: u64) {
        self.frames_processed.fetch_add(frames, Ordering::Relaxed);
    }

    pub(crate) fn store_active_nodes(&self, nodes: u32) {
        self.active_nodes.store(nodes, Ordering::Relaxed);
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Relaxed)
    }

    pub fn recorded_frames(&self) -> u64 {
        self.recorded_frames.load(Ordering::Relaxed)
    }

    pub fn master_peak(&self) -> f32 {
        f32::from_bits(self.master_peak.load(Ordering::Relaxed))
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed.load(Ordering::Relaxed)
    }

    pub fn active_nodes(&self) -> u32 {
        self.active_nodes.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn f64_bits_round_trip() {
        let atomics = DeckAtomics::new();
        atomics.store_position(0.123456789, 42.5);
        assert_eq!(atomics.position(), 0.123456789);
        assert_eq!(atomics.seconds(), 42.5);
    }

    #[test]
    fn defaults_are_zeroed() {
        let atomics = EngineAtomics::new();
        assert!(!atomics.is_recording());
        assert_eq!(atomics.frames_processed(), 0);
        assert_eq!(atomics.master_peak(), 0.0);
    }
}
