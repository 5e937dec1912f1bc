//! The session coordinator
//!
//! One `Session` per process, enforced at construction. It owns the audio
//! host (and through it the engine), the analysis client, and the gesture
//! pipeline; it is the single writer to control-domain state. Collaborators
//! talk to it through [`SessionCommand`]s and observe it through
//! [`SessionEvent`]s and [`SessionState`] snapshots.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use strata_analysis::{AnalysisClient, AnalysisOptions, PendingAnalysis};
use strata_core::deck::{EffectSend, FilterParams, PITCH_MAX, PITCH_MIN};
use strata_core::dsp::{CrossfaderCurve, FilterType, FILTER_FREQ_MAX, FILTER_FREQ_MIN};
use strata_core::engine::{EngineCommand, EngineEvent, RecordingBlob};
use strata_core::error::{EngineError, EngineResult};
use strata_core::host::{Activation, AudioHost, HostConfig};
use strata_core::stems::{StemBundle, Track};
use strata_core::types::{DeckId, Stem};
use strata_gesture::landmarks::HandFrame;
use strata_gesture::mapper::ControlCommand;
use strata_gesture::pipeline::{frame_channel, FrameReceiver, FrameSender, GesturePipeline};

use crate::bus::EventBus;
use crate::command::SessionCommand;
use crate::event::{SessionEvent, StemControl};
use crate::lifecycle::InitPhase;
use crate::state::{DeckSnapshot, MixerSnapshot, SessionState, SyncStatus};
use crate::sync::{SyncEngine, SyncOutcome};

/// One live session per process
static SESSION_LIVE: AtomicBool = AtomicBool::new(false);

/// Underruns per performance tick that degrade the session
const DEGRADED_DROPOUTS_PER_TICK: u64 = 3;

/// Session construction options
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub host: HostConfig,
    /// Run without an analysis worker (fallback sentinels only)
    pub no_analysis_worker: bool,
}

impl SessionConfig {
    /// Headless configuration for tests and offline rendering
    pub fn offline() -> Self {
        Self {
            host: HostConfig::offline(),
            no_analysis_worker: false,
        }
    }
}

/// Control-side mirror of one deck
#[derive(Debug, Clone, Default)]
struct DeckMirror {
    track: Option<Track>,
    has_stems: bool,
    pitch: f64,
}

impl DeckMirror {
    /// Current BPM: track BPM scaled by the pitch-derived rate
    fn current_bpm(&self) -> Option<f64> {
        self.track
            .as_ref()
            .and_then(|t| t.bpm)
            .map(|bpm| bpm * (1.0 + self.pitch / 100.0))
    }

    fn original_bpm(&self) -> Option<f64> {
        self.track.as_ref().and_then(|t| t.bpm)
    }
}

/// The session coordinator
#[derive(Debug)]
pub struct Session {
    host: AudioHost,
    offline: bool,
    phase: InitPhase,
    analysis: AnalysisClient,
    pipeline: GesturePipeline,
    frame_tx: FrameSender,
    frame_rx: FrameReceiver,
    sync: SyncEngine,
    bus: EventBus,
    decks: [DeckMirror; 2],
    mixer: MixerSnapshot,
    last_recording: Option<RecordingBlob>,
    last_perf_emit: f64,
    last_dropouts: u64,
}

impl Session {
    /// Create the session. Fails if one is already alive in this process:
    /// the one-audio-context invariant is enforced by construction.
    pub fn new(config: SessionConfig) -> EngineResult<Self> {
        if SESSION_LIVE
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(EngineError::AlreadyInitialized);
        }

        let analysis = if config.no_analysis_worker {
            AnalysisClient::without_worker()
        } else {
            AnalysisClient::new()
        };
        let (frame_tx, frame_rx) = frame_channel();
        let offline = config.host.offline;

        Ok(Self {
            host: AudioHost::new(config.host),
            offline,
            phase: InitPhase::Uninitialized,
            analysis,
            pipeline: GesturePipeline::new(),
            frame_tx,
            frame_rx,
            sync: SyncEngine::new(),
            bus: EventBus::new(),
            decks: Default::default(),
            mixer: MixerSnapshot::default(),
            last_recording: None,
            last_perf_emit: 0.0,
            last_dropouts: 0,
        })
    }

    // ── Observation ──────────────────────────────────────────────

    /// Register an event subscriber
    pub fn subscribe(&mut self) -> crossbeam::channel::Receiver<SessionEvent> {
        self.bus.subscribe()
    }

    /// A sender the external hand tracker pushes frames into; drained on
    /// every control tick
    pub fn frame_sender(&self) -> FrameSender {
        self.frame_tx.clone()
    }

    pub fn phase(&self) -> InitPhase {
        self.phase
    }

    pub fn host(&self) -> &AudioHost {
        &self.host
    }

    /// Monotonic session clock in seconds
    pub fn now(&self) -> f64 {
        self.host.now()
    }

    /// Observable state snapshot
    pub fn snapshot(&self) -> SessionState {
        let mut decks = [DeckSnapshot::default(); 2];
        for id in DeckId::ALL {
            let i = id.index();
            let mirror = &self.decks[i];
            let mut snap = DeckSnapshot {
                loaded: mirror.has_stems,
                playing: false,
                position: 0.0,
                bpm: mirror.current_bpm().unwrap_or(0.0),
                pitch: mirror.pitch,
            };
            if let Some(atomics) = self.host.deck_atomics() {
                snap.playing = atomics[i].is_playing();
                snap.position = atomics[i].position();
            }
            decks[i] = snap;
        }
        SessionState {
            phase: self.phase,
            decks,
            mixer: self.mixer,
            sync: match self.sync.binding() {
                Some(b) => SyncStatus::Synced {
                    master: b.master,
                    slave: b.slave,
                },
                None => SyncStatus::None,
            },
            active_profile: self.pipeline.mapper().active_profile().id.clone(),
            mapper_enabled: self.pipeline.mapper().is_enabled(),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Bring the host up. In Ready this is a success no-op; without user
    /// activation it fails and the state is unchanged.
    pub fn initialize(&mut self, activation: Activation) -> EngineResult<()> {
        if self.phase.is_disposed() {
            return Err(EngineError::Disposed);
        }
        if self.phase.host_up() {
            return Ok(());
        }
        match self.host.initialize(activation) {
            Ok(()) => {
                self.phase = InitPhase::HostReady;
                Ok(())
            }
            Err(EngineError::UserActivationRequired) => {
                // Remain Uninitialized; surface to both the caller and observers
                self.bus.emit(SessionEvent::InitializationError {
                    message: EngineError::UserActivationRequired.to_string(),
                });
                Err(EngineError::UserActivationRequired)
            }
            Err(e) => {
                self.phase = InitPhase::DegradedInit;
                self.bus.emit(SessionEvent::InitializationError {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Decks come up only on a ready host
    pub fn initialize_decks(&mut self) -> EngineResult<()> {
        if self.phase.is_disposed() {
            return Err(EngineError::Disposed);
        }
        if !self.phase.host_up() {
            self.bus.emit(SessionEvent::InitializationError {
                message: EngineError::NotReady.to_string(),
            });
            return Err(EngineError::NotReady);
        }
        if self.host.deck_atomics().is_none() {
            self.phase = InitPhase::DegradedInit;
            let err = EngineError::NodeCreationFailed("deck state unavailable".into());
            self.bus.emit(SessionEvent::InitializationError {
                message: err.to_string(),
            });
            return Err(err);
        }
        if self.phase == InitPhase::HostReady {
            self.phase = InitPhase::DecksReady;
        }
        Ok(())
    }

    /// Final bring-up step: the master bus is live
    pub fn connect_master_bus(&mut self) -> EngineResult<()> {
        if self.phase.is_disposed() {
            return Err(EngineError::Disposed);
        }
        match self.phase {
            InitPhase::DecksReady | InitPhase::Ready => {
                self.phase = InitPhase::Ready;
                Ok(())
            }
            _ => Err(EngineError::NotReady),
        }
    }

    /// Full bring-up in one call (user-activated paths)
    pub fn ensure_ready(&mut self, activation: Activation) -> EngineResult<()> {
        self.initialize(activation)?;
        self.initialize_decks()?;
        self.connect_master_bus()
    }

    /// Tear down: decks first, then the master bus and host, then workers.
    /// Idempotent; the session is unusable afterwards.
    pub fn dispose(&mut self) {
        if self.phase.is_disposed() {
            return;
        }
        if self.phase.host_up() {
            for deck in DeckId::ALL {
                let _ = self.send(EngineCommand::Stop { deck });
                let _ = self.send(EngineCommand::UnloadTrack { deck });
            }
        }
        self.analysis.shutdown();
        self.host.dispose();
        self.phase = InitPhase::Disposed;
        log::info!("session disposed");
    }

    // ── Command surface ──────────────────────────────────────────

    /// Route one command. Validation failures surface as events and never
    /// tear the session down; lifecycle failures return to the caller.
    pub fn dispatch(&mut self, command: SessionCommand) -> EngineResult<()> {
        use SessionCommand::*;
        if self.phase.is_disposed() && !matches!(command, Dispose) {
            return Err(EngineError::Disposed);
        }
        match command {
            Initialize { activation } => self.initialize(activation),
            InitializeDecks => self.initialize_decks(),
            ConnectMasterBus => self.connect_master_bus(),
            Dispose => {
                self.dispose();
                Ok(())
            }

            LoadTrack { deck, track, bundle } => self.load_track(deck, track, bundle),
            Play { deck } => self.play(deck),
            Pause { deck } => self.pause(deck),
            Stop { deck } => self.stop(deck),
            Seek { deck, seconds } => self.send(EngineCommand::Seek { deck, seconds }),
            Cue { deck, slot } => self.cue(deck, slot),
            SetCue { deck, slot } => self.set_cue(deck, slot),
            DeleteCue { deck, slot } => self.delete_cue(deck, slot),
            SetVolume { deck, volume } => self.set_volume(deck, volume),
            SetEq { deck, band, db } => self.send(EngineCommand::SetEq { deck, band, db }),
            ResetEq { deck } => self.send(EngineCommand::ResetEq { deck }),
            SetFilter { deck, params } => self.send(EngineCommand::SetFilter { deck, params }),
            SetEffectSend { deck, send, level } => {
                self.send(EngineCommand::SetEffectSend { deck, send, level })
            }
            SetPitch { deck, percent } => self.set_pitch(deck, percent),

            SetStemVolume { deck, stem, volume } => self.set_stem_volume(deck, stem, volume),
            SetStemMuted { deck, stem, muted } => self.set_stem_muted(deck, stem, muted),
            SetStemSoloed { deck, stem, soloed } => self.set_stem_soloed(deck, stem, soloed),
            SetStemPan { deck, stem, pan } => self.set_stem_pan(deck, stem, pan),
            SetStemEq { deck, stem, band, db } => {
                self.send(EngineCommand::SetStemEq { deck, stem, band, db })
            }
            SetStemMix { deck, mix } => self.set_stem_mix(deck, mix),

            SetCrossfader { position } => self.set_crossfader(position),
            SetCrossfaderCurve { curve } => self.set_crossfader_curve(curve),
            SetMasterVolume { volume } => self.set_master_volume(volume),
            SetLimiterEnabled { enabled } => self.set_limiter_enabled(enabled),

            Sync { master } => self.sync_to(master),
            Unsync => {
                self.unsync();
                Ok(())
            }

            StartRecording => self.start_recording(),
            StopRecording => {
                if self.mixer.recording {
                    self.send(EngineCommand::StopRecording)?;
                }
                Ok(())
            }

            PushHandFrame { frame } => {
                self.push_hand_observation(frame);
                Ok(())
            }
            SetActiveProfile { id } => {
                if let Err(e) = self.pipeline.mapper_mut().set_active_profile(&id) {
                    log::warn!("profile switch rejected: {e}");
                }
                Ok(())
            }
            AddMapping { mapping } => {
                self.pipeline.mapper_mut().add_mapping(mapping);
                Ok(())
            }
            RemoveMapping { id } => {
                if let Err(e) = self.pipeline.mapper_mut().remove_mapping(&id) {
                    log::warn!("mapping removal rejected: {e}");
                }
                Ok(())
            }
            SetMapperEnabled { enabled } => {
                self.pipeline.mapper_mut().set_enabled(enabled);
                Ok(())
            }
        }
    }

    fn send(&mut self, command: EngineCommand) -> EngineResult<()> {
        if !self.phase.host_up() {
            return Err(EngineError::NotReady);
        }
        self.host.commands()?.send(command);
        Ok(())
    }

    // ── Deck operations ──────────────────────────────────────────

    fn load_track(
        &mut self,
        deck: DeckId,
        track: Track,
        bundle: Option<Arc<StemBundle>>,
    ) -> EngineResult<()> {
        let mirror = &mut self.decks[deck.index()];
        mirror.has_stems = bundle.is_some();
        mirror.pitch = 0.0;
        mirror.track = Some(track.clone());

        // Loading a synced deck invalidates the tempo binding
        if self
            .sync
            .binding()
            .map(|b| b.master == deck || b.slave == deck)
            .unwrap_or(false)
        {
            self.unsync();
        }

        self.send(EngineCommand::LoadTrack {
            deck,
            track: Box::new(track),
            bundle,
        })?;
        self.bus.emit(SessionEvent::DeckLoaded { deck });
        Ok(())
    }

    fn play(&mut self, deck: DeckId) -> EngineResult<()> {
        if !self.decks[deck.index()].has_stems {
            self.bus.emit(SessionEvent::DeckError {
                deck,
                message: "nothing loaded".into(),
            });
            return Ok(());
        }
        self.send(EngineCommand::Play { deck })?;
        self.bus.emit(SessionEvent::DeckPlay { deck });
        Ok(())
    }

    fn pause(&mut self, deck: DeckId) -> EngineResult<()> {
        self.send(EngineCommand::Pause { deck })?;
        self.bus.emit(SessionEvent::DeckPause { deck });
        Ok(())
    }

    fn stop(&mut self, deck: DeckId) -> EngineResult<()> {
        self.send(EngineCommand::Stop { deck })?;
        self.bus.emit(SessionEvent::DeckStop { deck });
        Ok(())
    }

    fn cue(&mut self, deck: DeckId, slot: usize) -> EngineResult<()> {
        self.validated_cue_slot(deck, slot)?;
        self.send(EngineCommand::Cue { deck, slot })
    }

    fn set_cue(&mut self, deck: DeckId, slot: usize) -> EngineResult<()> {
        self.validated_cue_slot(deck, slot)?;
        self.send(EngineCommand::SetCue { deck, slot })
    }

    fn delete_cue(&mut self, deck: DeckId, slot: usize) -> EngineResult<()> {
        self.validated_cue_slot(deck, slot)?;
        self.send(EngineCommand::DeleteCue { deck, slot })
    }

    /// Cue slot validation happens control-side so the error can carry an
    /// event; the engine re-checks the slot index on its own side.
    fn validated_cue_slot(&mut self, deck: DeckId, slot: usize) -> EngineResult<()> {
        if slot >= strata_core::types::CUE_SLOTS {
            let err = EngineError::OutOfRange {
                param: "cue slot",
                value: slot as f64,
                min: 0.0,
                max: (strata_core::types::CUE_SLOTS - 1) as f64,
            };
            self.bus.emit(SessionEvent::DeckError {
                deck,
                message: err.to_string(),
            });
            return Err(err);
        }
        Ok(())
    }

    fn set_volume(&mut self, deck: DeckId, volume: f32) -> EngineResult<()> {
        let volume = volume.clamp(0.0, 1.0);
        self.send(EngineCommand::SetVolume { deck, volume })?;
        self.bus.emit(SessionEvent::StemControlChanged {
            deck,
            stem: None,
            control: StemControl::Volume(volume),
        });
        Ok(())
    }

    /// Pitch setter with the sync interplay: changing the slave's pitch
    /// directly disengages; changing the master's retunes the slave in the
    /// same dispatch.
    fn set_pitch(&mut self, deck: DeckId, percent: f64) -> EngineResult<()> {
        self.apply_pitch(deck, percent, false)
    }

    fn apply_pitch(&mut self, deck: DeckId, percent: f64, from_sync: bool) -> EngineResult<()> {
        let percent = percent.clamp(PITCH_MIN, PITCH_MAX);
        self.decks[deck.index()].pitch = percent;
        self.send(EngineCommand::SetPitch { deck, percent })?;

        if from_sync {
            return Ok(());
        }
        let Some(binding) = self.sync.binding().copied() else {
            return Ok(());
        };
        if deck == binding.slave {
            self.unsync();
        } else if deck == binding.master {
            if let Some(master_bpm) = self.decks[deck.index()].current_bpm() {
                if let Some(slave_pitch) = self.sync.retune(master_bpm) {
                    self.apply_pitch(binding.slave, slave_pitch, true)?;
                    self.bus.emit(SessionEvent::SyncEngaged {
                        master: binding.master,
                        slave: binding.slave,
                        slave_pitch,
                    });
                }
            }
        }
        Ok(())
    }

    // ── Stem operations ──────────────────────────────────────────

    fn set_stem_volume(&mut self, deck: DeckId, stem: Stem, volume: f32) -> EngineResult<()> {
        let volume = volume.clamp(0.0, 1.0);
        self.send(EngineCommand::SetStemVolume { deck, stem, volume })?;
        self.bus.emit(SessionEvent::StemControlChanged {
            deck,
            stem: Some(stem),
            control: StemControl::Volume(volume),
        });
        Ok(())
    }

    fn set_stem_muted(&mut self, deck: DeckId, stem: Stem, muted: bool) -> EngineResult<()> {
        self.send(EngineCommand::SetStemMuted { deck, stem, muted })?;
        self.bus.emit(SessionEvent::StemControlChanged {
            deck,
            stem: Some(stem),
            control: StemControl::Muted(muted),
        });
        Ok(())
    }

    fn set_stem_soloed(&mut self, deck: DeckId, stem: Stem, soloed: bool) -> EngineResult<()> {
        self.send(EngineCommand::SetStemSoloed { deck, stem, soloed })?;
        self.bus.emit(SessionEvent::StemControlChanged {
            deck,
            stem: Some(stem),
            control: StemControl::Soloed(soloed),
        });
        Ok(())
    }

    fn set_stem_pan(&mut self, deck: DeckId, stem: Stem, pan: f32) -> EngineResult<()> {
        let pan = pan.clamp(-1.0, 1.0);
        self.send(EngineCommand::SetStemPan { deck, stem, pan })?;
        self.bus.emit(SessionEvent::StemControlChanged {
            deck,
            stem: Some(stem),
            control: StemControl::Pan(pan),
        });
        Ok(())
    }

    fn set_stem_mix(&mut self, deck: DeckId, mix: f32) -> EngineResult<()> {
        let mix = mix.clamp(0.0, 1.0);
        self.send(EngineCommand::SetStemMix { deck, mix })?;
        self.bus.emit(SessionEvent::StemControlChanged {
            deck,
            stem: None,
            control: StemControl::Mix(mix),
        });
        Ok(())
    }

    // ── Mixer operations ─────────────────────────────────────────

    fn set_crossfader(&mut self, position: f32) -> EngineResult<()> {
        let position = position.clamp(0.0, 1.0);
        // Property-level change detection: identical values emit nothing
        if (position - self.mixer.crossfader).abs() < 1e-6 {
            return Ok(());
        }
        self.mixer.crossfader = position;
        self.send(EngineCommand::SetCrossfader { position })?;
        self.bus.emit(SessionEvent::CrossfaderChanged { position });
        Ok(())
    }

    fn set_crossfader_curve(&mut self, curve: CrossfaderCurve) -> EngineResult<()> {
        if curve == self.mixer.curve {
            return Ok(());
        }
        self.mixer.curve = curve;
        self.send(EngineCommand::SetCrossfaderCurve { curve })?;
        self.bus.emit(SessionEvent::CrossfaderCurveChanged { curve });
        Ok(())
    }

    fn set_master_volume(&mut self, volume: f32) -> EngineResult<()> {
        let volume = volume.clamp(0.0, 1.0);
        if (volume - self.mixer.master_volume).abs() < 1e-6 {
            return Ok(());
        }
        self.mixer.master_volume = volume;
        self.send(EngineCommand::SetMasterVolume { volume })?;
        self.bus.emit(SessionEvent::MasterVolumeChanged { volume });
        Ok(())
    }

    fn set_limiter_enabled(&mut self, enabled: bool) -> EngineResult<()> {
        self.mixer.limiter_enabled = enabled;
        self.send(EngineCommand::SetLimiterEnabled { enabled })
    }

    // ── Sync ─────────────────────────────────────────────────────

    /// Engage beat sync with `master` leading; the other deck follows
    pub fn sync_to(&mut self, master: DeckId) -> EngineResult<()> {
        let slave = master.other();
        let master_bpm = self.decks[master.index()].current_bpm();
        let slave_bpm = self.decks[slave.index()].original_bpm();
        let now = self.now();

        match self.sync.engage(master, master_bpm, slave_bpm, now) {
            SyncOutcome::Engaged { slave_pitch } => {
                self.apply_pitch(slave, slave_pitch, true)?;
                self.bus.emit(SessionEvent::SyncEngaged {
                    master,
                    slave,
                    slave_pitch,
                });
                log::info!(
                    "sync engaged: {} leads, {} at {:+.3}%",
                    master.name(),
                    slave.name(),
                    slave_pitch
                );
                Ok(())
            }
            SyncOutcome::Skipped { reason } => {
                self.bus.emit(SessionEvent::SyncSkipped { reason });
                Ok(())
            }
        }
    }

    /// Drop the sync binding if one exists
    pub fn unsync(&mut self) {
        if self.sync.disengage() {
            self.bus.emit(SessionEvent::SyncDisengaged);
        }
    }

    // ── Recording ────────────────────────────────────────────────

    /// Start recording the master bus; a no-op while already active
    fn start_recording(&mut self) -> EngineResult<()> {
        if self.mixer.recording {
            return Ok(());
        }
        if let Some(collector) = self.host.recording() {
            collector.reset();
        }
        self.send(EngineCommand::StartRecording)?;
        self.mixer.recording = true;
        Ok(())
    }

    /// Stop recording and hand back the captured PCM blob. A stop without a
    /// start returns an empty blob.
    pub fn stop_recording(&mut self) -> EngineResult<RecordingBlob> {
        if !self.mixer.recording {
            return Ok(RecordingBlob {
                frames: Vec::new(),
                sample_rate: self.host.sample_rate(),
            });
        }
        self.send(EngineCommand::StopRecording)?;

        // The engine confirms at the next block boundary; pump until then
        let block = self.host.buffer_size().max(64) as usize;
        for _ in 0..256 {
            if self.offline {
                self.host.render(block)?;
            } else {
                std::thread::sleep(Duration::from_millis(5));
            }
            self.tick();
            if let Some(blob) = self.last_recording.take() {
                self.mixer.recording = false;
                return Ok(blob);
            }
        }
        Err(EngineError::StreamError("recording stop timed out".into()))
    }

    // ── Analysis ─────────────────────────────────────────────────

    /// Submit audio for analysis; resolve the returned handle asynchronously
    pub fn analyze(
        &self,
        samples: Vec<f32>,
        sample_rate: u32,
        options: AnalysisOptions,
    ) -> PendingAnalysis {
        self.analysis.analyze(samples, sample_rate, options)
    }

    // ── Gesture intake ───────────────────────────────────────────

    /// Run one tracker frame through the gesture pipeline and apply the
    /// resulting control commands
    pub fn push_hand_observation(&mut self, frame: HandFrame) {
        let (results, commands) = self.pipeline.process_frame(&frame);
        for result in &results {
            self.bus.emit(SessionEvent::GestureDetected {
                class: result.class,
                confidence: result.confidence,
            });
        }
        for command in commands {
            self.bus.emit(SessionEvent::MappingDispatched { command });
            if let Err(e) = self.apply_control(command) {
                log::warn!("gesture control rejected: {e}");
            }
        }
    }

    fn apply_control(&mut self, command: ControlCommand) -> EngineResult<()> {
        match command {
            ControlCommand::SetStemVolume { deck, stem, value } => {
                self.set_stem_volume(deck, stem, value)
            }
            ControlCommand::SetStemMuted { deck, stem, muted } => {
                self.set_stem_muted(deck, stem, muted)
            }
            ControlCommand::SetStemSoloed { deck, stem, soloed } => {
                self.set_stem_soloed(deck, stem, soloed)
            }
            ControlCommand::SetStemPan { deck, stem, pan } => {
                self.set_stem_pan(deck, stem, pan)
            }
            ControlCommand::SetStemEq { deck, stem, band, db } => {
                self.send(EngineCommand::SetStemEq { deck, stem, band, db })
            }
            ControlCommand::SetStemMix { deck, value } => self.set_stem_mix(deck, value),
            ControlCommand::SetDeckVolume { deck, value } => self.set_volume(deck, value),
            ControlCommand::SetDeckEq { deck, band, db } => {
                self.send(EngineCommand::SetEq { deck, band, db })
            }
            ControlCommand::SetDeckFilter { deck, value } => {
                // Log sweep over the audible range; fully open disables
                let value = value.clamp(0.0, 1.0);
                let frequency =
                    FILTER_FREQ_MIN * (FILTER_FREQ_MAX / FILTER_FREQ_MIN).powf(value);
                self.send(EngineCommand::SetFilter {
                    deck,
                    params: FilterParams {
                        filter_type: FilterType::Lowpass,
                        frequency,
                        q: 0.707,
                        enabled: value < 0.98,
                    },
                })
            }
            ControlCommand::SetEffectSend { deck, value } => {
                self.send(EngineCommand::SetEffectSend {
                    deck,
                    send: EffectSend::Delay,
                    level: value,
                })
            }
            ControlCommand::TriggerCue { deck, slot } => self.cue(deck, slot),
            ControlCommand::SetCrossfader { position } => self.set_crossfader(position),
            ControlCommand::SetMasterVolume { value } => self.set_master_volume(value),
        }
    }

    // ── Control tick ─────────────────────────────────────────────

    /// Pump the control domain: tracker frames, engine events, the recording
    /// collector, and the 1 Hz performance sampler. Call this from the
    /// embedder's main loop (offline tests call [`Session::render`]).
    pub fn tick(&mut self) {
        // Tracker frames
        let frames: Vec<HandFrame> = self.frame_rx.try_iter().collect();
        for frame in frames {
            self.push_hand_observation(frame);
        }

        // Engine events
        let mut engine_events = Vec::new();
        if let Some(events) = self.host.events() {
            while let Some(event) = events.pop() {
                engine_events.push(event);
            }
        }
        for event in engine_events {
            self.on_engine_event(event);
        }

        // Keep the recording ring drained while a session is active
        if self.mixer.recording {
            if let Some(collector) = self.host.recording() {
                collector.drain();
            }
        }

        self.performance_tick();
    }

    /// Advance the offline host by `frames` and pump the control domain
    pub fn render(&mut self, frames: usize) -> EngineResult<()> {
        self.host.render(frames)?;
        self.tick();
        Ok(())
    }

    fn on_engine_event(&mut self, event: EngineEvent) {
        match event {
            // Transport confirmations are emitted control-side at dispatch;
            // the engine echoes are only used for position/drift/recording
            EngineEvent::Loaded { .. }
            | EngineEvent::Playing { .. }
            | EngineEvent::Paused { .. }
            | EngineEvent::Stopped { .. } => {}

            EngineEvent::PositionUpdate {
                deck,
                position,
                seconds,
            } => {
                self.bus.emit(SessionEvent::PositionUpdate {
                    deck,
                    position,
                    seconds,
                });
            }
            EngineEvent::DriftDetected { deck, drift_ms } => {
                log::warn!("deck {} drift {drift_ms:.2} ms, re-anchored", deck.name());
                self.bus.emit(SessionEvent::DriftDetected { deck, drift_ms });
            }
            EngineEvent::RecordingStarted => {
                self.bus.emit(SessionEvent::RecordingStarted);
            }
            EngineEvent::RecordingStopped { .. } => {
                self.mixer.recording = false;
                if let Some(collector) = self.host.recording() {
                    let blob = collector.finalize();
                    self.bus.emit(SessionEvent::RecordingStopped {
                        seconds: blob.duration_seconds(),
                    });
                    self.last_recording = Some(blob);
                }
            }
            EngineEvent::RecordingOverrun { dropped } => {
                self.bus.emit(SessionEvent::RecordingError {
                    message: format!("{dropped} frames dropped"),
                });
            }
        }
    }

    /// 1 Hz sampler over host stats and gesture timings
    fn performance_tick(&mut self) {
        let now = self.now();
        if now - self.last_perf_emit < 1.0 {
            return;
        }
        self.last_perf_emit = now;

        let stats = self.host.stats();
        let dropouts_delta = stats.dropouts.saturating_sub(self.last_dropouts);
        self.last_dropouts = stats.dropouts;

        self.bus.emit(SessionEvent::PerformanceUpdate {
            stats,
            gesture: self.pipeline.timing(),
        });
        if dropouts_delta >= DEGRADED_DROPOUTS_PER_TICK {
            self.bus.emit(SessionEvent::PerformanceDegraded {
                dropouts: stats.dropouts,
            });
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.dispose();
        SESSION_LIVE.store(false, Ordering::SeqCst);
    }
}
