//! Observable session state snapshot

use strata_core::dsp::CrossfaderCurve;
use strata_core::types::DeckId;

use crate::lifecycle::InitPhase;

/// One deck as observers see it
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DeckSnapshot {
    pub loaded: bool,
    pub playing: bool,
    /// Normalized position in [0, 1]
    pub position: f64,
    /// Current BPM (original × rate); 0.0 when unknown
    pub bpm: f64,
    /// Pitch in percent
    pub pitch: f64,
}

/// Mixer state as observers see it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixerSnapshot {
    pub crossfader: f32,
    pub curve: CrossfaderCurve,
    pub master_volume: f32,
    pub limiter_enabled: bool,
    pub recording: bool,
}

impl Default for MixerSnapshot {
    fn default() -> Self {
        Self {
            crossfader: 0.5,
            curve: CrossfaderCurve::default(),
            master_volume: 1.0,
            limiter_enabled: true,
            recording: false,
        }
    }
}

/// The sync binding as observers see it
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum SyncStatus {
    #[default]
    None,
    Synced {
        master: DeckId,
        slave: DeckId,
    },
}

/// Full observable snapshot
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionState {
    pub phase: InitPhase,
    pub decks: [DeckSnapshot; 2],
    pub mixer: MixerSnapshot,
    pub sync: SyncStatus,
    pub active_profile: String,
    pub mapper_enabled: bool,
}
