//! Typed session events
//!
//! One enumerated event type instead of string-keyed emitters: subscribers
//! match exhaustively and typos cannot create dead channels.

use strata_core::dsp::CrossfaderCurve;
use strata_core::host::HostStats;
use strata_core::types::{DeckId, Stem};
use strata_gesture::mapper::ControlCommand;
use strata_gesture::pipeline::PipelineTiming;
use strata_gesture::recognize::GestureClass;

/// Which per-stem control changed
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StemControl {
    Volume(f32),
    Muted(bool),
    Soloed(bool),
    Pan(f32),
    Mix(f32),
}

/// Events fanned out to session subscribers, in dispatch order
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    // ── Deck ─────────────────────────────────────────────────────
    DeckLoaded { deck: DeckId },
    DeckPlay { deck: DeckId },
    DeckPause { deck: DeckId },
    DeckStop { deck: DeckId },
    DeckError { deck: DeckId, message: String },
    PositionUpdate {
        deck: DeckId,
        position: f64,
        seconds: f64,
    },
    StemControlChanged {
        deck: DeckId,
        stem: Option<Stem>,
        control: StemControl,
    },
    DriftDetected { deck: DeckId, drift_ms: f64 },

    // ── Mixer ────────────────────────────────────────────────────
    CrossfaderChanged { position: f32 },
    CrossfaderCurveChanged { curve: CrossfaderCurve },
    MasterVolumeChanged { volume: f32 },

    // ── Sync ─────────────────────────────────────────────────────
    SyncEngaged {
        master: DeckId,
        slave: DeckId,
        slave_pitch: f64,
    },
    SyncDisengaged,
    SyncSkipped { reason: String },

    // ── Recording ────────────────────────────────────────────────
    RecordingStarted,
    RecordingStopped { seconds: f64 },
    RecordingError { message: String },

    // ── Lifecycle / performance ──────────────────────────────────
    InitializationError { message: String },
    PerformanceUpdate {
        stats: HostStats,
        gesture: PipelineTiming,
    },
    PerformanceDegraded { dropouts: u64 },

    // ── Gesture ──────────────────────────────────────────────────
    GestureDetected {
        class: GestureClass,
        confidence: f32,
    },
    MappingDispatched { command: ControlCommand },
}
