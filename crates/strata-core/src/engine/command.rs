//! Lock-free command queue between the control domain and the audio thread
//!
//! The control domain pushes commands into an SPSC ring; the audio thread
//! drains them at block boundaries. Neither side ever blocks, so a slow
//! control tick can never starve the audio callback and a busy callback can
//! never stall the control domain.

use std::sync::Arc;

use crate::deck::{EffectSend, FilterParams};
use crate::dsp::{CrossfaderCurve, EqBand};
use crate::stems::{StemBundle, Track};
use crate::types::{DeckId, Stem};

/// Ring capacity; command bursts beyond this are dropped with a warning
pub const COMMAND_QUEUE_CAPACITY: usize = 256;

/// Commands processed by the audio thread at block boundaries
///
/// Large payloads (track, bundle) are boxed/shared so the enum stays small
/// and the ring never copies audio data.
pub enum EngineCommand {
    // ── Track management ─────────────────────────────────────────
    LoadTrack {
        deck: DeckId,
        track: Box<Track>,
        bundle: Option<Arc<StemBundle>>,
    },
    UnloadTrack { deck: DeckId },

    // ── Transport ────────────────────────────────────────────────
    Play { deck: DeckId },
    Pause { deck: DeckId },
    Stop { deck: DeckId },
    Seek { deck: DeckId, seconds: f64 },

    // ── Cue points ───────────────────────────────────────────────
    Cue { deck: DeckId, slot: usize },
    SetCue { deck: DeckId, slot: usize },
    DeleteCue { deck: DeckId, slot: usize },

    // ── Channel strip ────────────────────────────────────────────
    SetVolume { deck: DeckId, volume: f32 },
    SetTrim { deck: DeckId, trim: f32 },
    SetEq { deck: DeckId, band: EqBand, db: f32 },
    ResetEq { deck: DeckId },
    SetFilter { deck: DeckId, params: FilterParams },
    SetEffectSend { deck: DeckId, send: EffectSend, level: f32 },
    SetPitch { deck: DeckId, percent: f64 },

    // ── Stems ────────────────────────────────────────────────────
    SetStemVolume { deck: DeckId, stem: Stem, volume: f32 },
    SetStemMuted { deck: DeckId, stem: Stem, muted: bool },
    SetStemSoloed { deck: DeckId, stem: Stem, soloed: bool },
    SetStemPan { deck: DeckId, stem: Stem, pan: f32 },
    SetStemEq { deck: DeckId, stem: Stem, band: EqBand, db: f32 },
    SetStemMix { deck: DeckId, mix: f32 },

    // ── Mixer ────────────────────────────────────────────────────
    SetCrossfader { position: f32 },
    SetCrossfaderCurve { curve: CrossfaderCurve },
    SetMasterVolume { volume: f32 },
    SetLimiterEnabled { enabled: bool },

    // ── Recording ────────────────────────────────────────────────
    StartRecording,
    StopRecording,
}

/// Events emitted by the audio thread back to the control domain
///
/// Everything here is `Copy` so pushing an event never allocates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineEvent {
    Loaded { deck: DeckId },
    Playing { deck: DeckId },
    Paused { deck: DeckId },
    Stopped { deck: DeckId },
    /// ~20 Hz while a deck plays
    PositionUpdate {
        deck: DeckId,
        position: f64,
        seconds: f64,
    },
    DriftDetected { deck: DeckId, drift_ms: f64 },
    RecordingStarted,
    RecordingStopped { frames: u64 },
    /// Recording ring overflowed; `dropped` frames were lost
    RecordingOverrun { dropped: u64 },
}

/// Control-domain handle for pushing commands
pub struct CommandSender {
    producer: rtrb::Producer<EngineCommand>,
}

impl CommandSender {
    /// Push without blocking; a full ring drops the command
    pub fn send(&mut self, command: EngineCommand) -> bool {
        match self.producer.push(command) {
            Ok(()) => true,
            Err(_) => {
                log::warn!("engine command queue full, command dropped");
                false
            }
        }
    }
}

/// Audio-thread handle for draining commands
pub struct CommandReceiver {
    consumer: rtrb::Consumer<EngineCommand>,
}

impl CommandReceiver {
    /// Pop one pending command, if any
    #[inline]
    pub fn pop(&mut self) -> Option<EngineCommand> {
        self.consumer.pop().ok()
    }
}

/// Create the command ring pair
pub fn command_channel() -> (CommandSender, CommandReceiver) {
    let (producer, consumer) = rtrb::RingBuffer::new(COMMAND_QUEUE_CAPACITY);
    (
        CommandSender { producer },
        CommandReceiver { consumer },
    )
}
