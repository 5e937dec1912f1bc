//! The session command surface
//!
//! Everything a collaborator can ask the core to do, as one typed enum.
//! Value-returning operations (`stop_recording`, `analyze`) also exist as
//! methods on [`crate::Session`]; the commands fire-and-forget.

use std::sync::Arc;

use strata_core::deck::{EffectSend, FilterParams};
use strata_core::dsp::{CrossfaderCurve, EqBand};
use strata_core::host::Activation;
use strata_core::stems::{StemBundle, Track};
use strata_core::types::{DeckId, Stem};
use strata_gesture::landmarks::HandFrame;
use strata_gesture::mapping::GestureMapping;

/// Commands accepted by [`crate::Session::dispatch`]
pub enum SessionCommand {
    // ── Lifecycle ────────────────────────────────────────────────
    Initialize { activation: Activation },
    InitializeDecks,
    ConnectMasterBus,
    Dispose,

    // ── Deck ─────────────────────────────────────────────────────
    LoadTrack {
        deck: DeckId,
        track: Track,
        bundle: Option<Arc<StemBundle>>,
    },
    Play { deck: DeckId },
    Pause { deck: DeckId },
    Stop { deck: DeckId },
    Seek { deck: DeckId, seconds: f64 },
    Cue { deck: DeckId, slot: usize },
    SetCue { deck: DeckId, slot: usize },
    DeleteCue { deck: DeckId, slot: usize },
    SetVolume { deck: DeckId, volume: f32 },
    SetEq { deck: DeckId, band: EqBand, db: f32 },
    ResetEq { deck: DeckId },
    SetFilter { deck: DeckId, params: FilterParams },
    SetEffectSend {
        deck: DeckId,
        send: EffectSend,
        level: f32,
    },
    SetPitch { deck: DeckId, percent: f64 },

    // ── Stems ────────────────────────────────────────────────────
    SetStemVolume {
        deck: DeckId,
        stem: Stem,
        volume: f32,
    },
    SetStemMuted {
        deck: DeckId,
        stem: Stem,
        muted: bool,
    },
    SetStemSoloed {
        deck: DeckId,
        stem: Stem,
        soloed: bool,
    },
    SetStemPan { deck: DeckId, stem: Stem, pan: f32 },
    SetStemEq {
        deck: DeckId,
        stem: Stem,
        band: EqBand,
        db: f32,
    },
    SetStemMix { deck: DeckId, mix: f32 },

    // ── Mixer ────────────────────────────────────────────────────
    SetCrossfader { position: f32 },
    SetCrossfaderCurve { curve: CrossfaderCurve },
    SetMasterVolume { volume: f32 },
    SetLimiterEnabled { enabled: bool },

    // ── Sync ─────────────────────────────────────────────────────
    Sync { master: DeckId },
    Unsync,

    // ── Recording ────────────────────────────────────────────────
    StartRecording,
    StopRecording,

    // ── Gesture ──────────────────────────────────────────────────
    PushHandFrame { frame: HandFrame },
    SetActiveProfile { id: String },
    AddMapping { mapping: GestureMapping },
    RemoveMapping { id: String },
    SetMapperEnabled { enabled: bool },
}
