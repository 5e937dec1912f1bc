//! The audio engine proper
//!
//! Owned exclusively by the audio callback (or the offline pump). Each block:
//! drain pending commands, render both decks, blend through the crossfader,
//! run the master chain, tap the recorder, publish atomics and events.

use std::sync::Arc;

use crate::deck::Deck;
use crate::dsp::{Compressor, Crossfader, Gain, MasterLimiter};
use crate::types::{DeckId, StereoBuffer, NUM_DECKS};

use super::atomics::{DeckAtomics, EngineAtomics};
use super::command::{command_channel, CommandReceiver, CommandSender, EngineCommand, EngineEvent};
use super::recorder::{record_channel, RecordCollector, RecordTap};

/// Default processing block size
pub const DEFAULT_BUFFER_SIZE: usize = 256;

/// Maximum block size pre-allocated for real-time safety
/// Covers every common device configuration (64..4096)
pub const MAX_BUFFER_SIZE: usize = 8192;

/// Event ring capacity
const EVENT_QUEUE_CAPACITY: usize = 1024;

/// Position updates per second while a deck plays
const POSITION_UPDATE_HZ: usize = 20;

/// Control-domain handle for draining engine events
pub struct EventReceiver {
    consumer: rtrb::Consumer<EngineEvent>,
}

impl EventReceiver {
    #[inline]
    pub fn pop(&mut self) -> Option<EngineEvent> {
        self.consumer.pop().ok()
    }
}

/// Everything the control domain keeps after engine construction
pub struct EngineHandles {
    pub commands: CommandSender,
    pub events: EventReceiver,
    pub recording: RecordCollector,
    pub deck_atomics: [Arc<DeckAtomics>; NUM_DECKS],
    pub engine_atomics: Arc<EngineAtomics>,
}

impl std::fmt::Debug for EngineHandles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandles").finish_non_exhaustive()
    }
}

/// Two decks into the crossfader into the master chain
pub struct AudioEngine {
    decks: [Deck; NUM_DECKS],
    crossfader: Crossfader,
    master_volume: Gain,
    compressor: Compressor,
    limiter: MasterLimiter,
    record_tap: RecordTap,
    commands: CommandReceiver,
    events: rtrb::Producer<EngineEvent>,
    deck_atomics: [Arc<DeckAtomics>; NUM_DECKS],
    engine_atomics: Arc<EngineAtomics>,
    deck_buffers: [StereoBuffer; NUM_DECKS],
    sample_rate: u32,
    position_interval: usize,
    position_countdown: usize,
}

impl std::fmt::Debug for AudioEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioEngine")
            .field("sample_rate", &self.sample_rate)
            .finish_non_exhaustive()
    }
}

impl AudioEngine {
    /// Build the engine plus the control-domain handles
    pub fn new(sample_rate: u32) -> (Self, EngineHandles) {
        let (command_tx, command_rx) = command_channel();
        let (event_tx, event_rx) = rtrb::RingBuffer::new(EVENT_QUEUE_CAPACITY);
        let (record_tap, record_collector) = record_channel(sample_rate);

        let deck_atomics: [Arc<DeckAtomics>; NUM_DECKS] =
            std::array::from_fn(|_| DeckAtomics::new());
        let engine_atomics = EngineAtomics::new();

        let position_interval = (sample_rate as usize / POSITION_UPDATE_HZ).max(1);

        let engine = Self {
            decks: std::array::from_fn(|i| {
                Deck::new(DeckId::from_index(i).unwrap(), sample_rate, MAX_BUFFER_SIZE)
            }),
            crossfader: Crossfader::new(sample_rate),
            master_volume: Gain::new(sample_rate),
            compressor: Compressor::new(sample_rate),
            limiter: MasterLimiter::new(sample_rate),
            record_tap,
            commands: command_rx,
            events: event_tx,
            deck_atomics: std::array::from_fn(|i| deck_atomics[i].clone()),
            engine_atomics: engine_atomics.clone(),
            deck_buffers: std::array::from_fn(|_| StereoBuffer::silence(MAX_BUFFER_SIZE)),
            sample_rate,
            position_interval,
            position_countdown: position_interval,
        };

        let handles = EngineHandles {
            commands: command_tx,
            events: event_rx_wrap(event_rx),
            recording: record_collector,
            deck_atomics,
            engine_atomics,
        };

        (engine, handles)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn deck(&self, id: DeckId) -> &Deck {
        &self.decks[id.index()]
    }

    pub fn deck_mut(&mut self, id: DeckId) -> &mut Deck {
        &mut self.decks[id.index()]
    }

    #[inline]
    fn emit(&mut self, event: EngineEvent) {
        // A full event ring just drops the event; state still lands in atomics
        let _ = self.events.push(event);
    }

    // ── Command handling ─────────────────────────────────────────

    fn drain_commands(&mut self) {
        while let Some(command) = self.commands.pop() {
            self.apply(command);
        }
    }

    fn apply(&mut self, command: EngineCommand) {
        use EngineCommand::*;
        match command {
            LoadTrack { deck, track, bundle } => {
                self.decks[deck.index()].load(*track, bundle);
                self.emit(EngineEvent::Loaded { deck });
            }
            UnloadTrack { deck } => self.decks[deck.index()].unload(),

            Play { deck } => {
                self.decks[deck.index()].play();
                if self.decks[deck.index()].is_playing() {
                    self.emit(EngineEvent::Playing { deck });
                }
            }
            Pause { deck } => {
                self.decks[deck.index()].pause();
                self.emit(EngineEvent::Paused { deck });
            }
            Stop { deck } => {
                self.decks[deck.index()].stop();
                self.emit(EngineEvent::Stopped { deck });
            }
            Seek { deck, seconds } => self.decks[deck.index()].seek(seconds),

            Cue { deck, slot } => {
                if let Err(e) = self.decks[deck.index()].cue(slot) {
                    log::warn!("cue rejected: {e}");
                }
            }
            SetCue { deck, slot } => {
                if let Err(e) = self.decks[deck.index()].set_cue(slot) {
                    log::warn!("set_cue rejected: {e}");
                }
            }
            DeleteCue { deck, slot } => {
                if let Err(e) = self.decks[deck.index()].delete_cue(slot) {
                    log::warn!("delete_cue rejected: {e}");
                }
            }

            SetVolume { deck, volume } => self.decks[deck.index()].set_volume(volume),
            SetTrim { deck, trim } => self.decks[deck.index()].set_trim(trim),
            SetEq { deck, band, db } => self.decks[deck.index()].set_eq(band, db),
            ResetEq { deck } => self.decks[deck.index()].reset_eq(),
            SetFilter { deck, params } => self.decks[deck.index()].set_filter(params),
            SetEffectSend { deck, send, level } => {
                self.decks[deck.index()].set_effect_send(send, level)
            }
            SetPitch { deck, percent } => self.decks[deck.index()].set_pitch(percent),

            SetStemVolume { deck, stem, volume } => {
                self.decks[deck.index()].set_stem_volume(stem, volume)
            }
            SetStemMuted { deck, stem, muted } => {
                self.decks[deck.index()].set_stem_muted(stem, muted)
            }
            SetStemSoloed { deck, stem, soloed } => {
                self.decks[deck.index()].set_stem_soloed(stem, soloed)
            }
            SetStemPan { deck, stem, pan } => self.decks[deck.index()].set_stem_pan(stem, pan),
            SetStemEq { deck, stem, band, db } => {
                self.decks[deck.index()].set_stem_eq(stem, band, db)
            }
            SetStemMix { deck, mix } => self.decks[deck.index()].set_stem_mix(mix),

            SetCrossfader { position } => self.crossfader.set_position(position),
            SetCrossfaderCurve { curve } => self.crossfader.set_curve(curve),
            SetMasterVolume { volume } => self.master_volume.set(volume),
            SetLimiterEnabled { enabled } => self.limiter.set_enabled(enabled),

            StartRecording => {
                if self.record_tap.start() {
                    self.engine_atomics.store_recording(true);
                    self.emit(EngineEvent::RecordingStarted);
                }
            }
            StopRecording => {
                let dropped = self.record_tap.dropped();
                if let Some(frames) = self.record_tap.stop() {
                    self.engine_atomics.store_recording(false);
                    if dropped > 0 {
                        self.emit(EngineEvent::RecordingOverrun { dropped });
                    }
                    self.emit(EngineEvent::RecordingStopped { frames });
                }
            }
        }
    }

    // ── Audio ────────────────────────────────────────────────────

    /// Render one block into `output`
    pub fn process(&mut self, output: &mut StereoBuffer) {
        let frames = output.len();

        self.drain_commands();

        for buf in &mut self.deck_buffers {
            buf.set_len_from_capacity(frames);
        }

        // Render decks; surface drift re-anchors as events
        for id in DeckId::ALL {
            let idx = id.index();
            if let Some(drift_ms) = self.decks[idx].process(&mut self.deck_buffers[idx]) {
                self.deck_atomics[idx].count_drift_event();
                self.emit(EngineEvent::DriftDetected { deck: id, drift_ms });
            }
        }

        // A → side A, B → side B
        let [a, b] = &self.deck_buffers;
        self.crossfader.mix(a, b, output);

        // Master chain
        self.master_volume.process(output);
        self.compressor.process(output);
        self.limiter.process(output);

        // Recorder taps pre-output
        self.record_tap.capture(output.as_slice());
        if self.record_tap.is_active() {
            self.engine_atomics
                .store_recorded_frames(self.record_tap.frames_written());
        }

        self.publish_state(frames);
    }

    fn publish_state(&mut self, frames: usize) {
        self.engine_atomics.add_frames(frames as u64);

        let mut peak = 0.0f32;
        for buf in &self.deck_buffers {
            peak = peak.max(buf.peak());
        }
        self.engine_atomics.store_master_peak(peak);

        let mut nodes = 4u32; // crossfader, master gain, compressor, limiter
        for id in DeckId::ALL {
            let deck = &self.decks[id.index()];
            if deck.has_stems() {
                // strip (trim, eq, filter, delay, reverb, volume) + player + stem EQs
                nodes += 11;
            }
            let atomics = &self.deck_atomics[id.index()];
            atomics.store_playing(deck.is_playing());
            atomics.store_loaded(deck.has_stems());
            atomics.store_position(deck.position(), deck.position_seconds());
            atomics.store_bpm(deck.current_bpm().unwrap_or(0.0));
            atomics.store_pitch(deck.pitch());
        }
        self.engine_atomics.store_active_nodes(nodes);

        // ~20 Hz position events for playing decks
        if frames >= self.position_countdown {
            self.position_countdown = self.position_interval;
            for id in DeckId::ALL {
                let deck = &self.decks[id.index()];
                if deck.is_playing() {
                    let event = EngineEvent::PositionUpdate {
                        deck: id,
                        position: deck.position(),
                        seconds: deck.position_seconds(),
                    };
                    self.emit(event);
                }
            }
        } else {
            self.position_countdown -= frames;
        }
    }
}

fn event_rx_wrap(consumer: rtrb::Consumer<EngineEvent>) -> EventReceiver {
    EventReceiver { consumer }
}
