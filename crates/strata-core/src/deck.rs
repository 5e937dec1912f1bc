//! Deck - one transportable playback unit with its channel strip
//!
//! Composes the stem player with the per-channel signal chain:
//! player → trim → 3-band EQ → filter → effect sends → channel gain.
//! The deck also owns cue points and the pitch control; pitch converts to a
//! uniform playback-rate factor so inter-stem alignment is never disturbed.

use std::sync::Arc;

use crate::dsp::{BiquadFilter, Delay, Eq3, EqBand, FilterType, Gain, Reverb};
use crate::error::{EngineError, EngineResult};
use crate::player::StemPlayer;
use crate::stems::{StemBundle, Track};
use crate::types::{DeckId, PlayState, Stem, StereoBuffer, CUE_SLOTS};

/// Pitch range in percent
pub const PITCH_MIN: f64 = -8.0;
pub const PITCH_MAX: f64 = 8.0;

/// Effect send selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectSend {
    Delay,
    Reverb,
}

/// Filter parameters as one settable unit
#[derive(Debug, Clone, Copy)]
pub struct FilterParams {
    pub filter_type: FilterType,
    pub frequency: f32,
    pub q: f32,
    pub enabled: bool,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            filter_type: FilterType::Lowpass,
            frequency: 1_000.0,
            q: 0.707,
            enabled: false,
        }
    }
}

/// One deck: loaded track, stem player, channel strip, cues, pitch
pub struct Deck {
    id: DeckId,
    track: Option<Track>,
    player: StemPlayer,
    trim: Gain,
    eq: Eq3,
    filter: BiquadFilter,
    delay: Delay,
    reverb: Reverb,
    volume: Gain,
    /// Normalized cue positions, 8 slots
    cues: [Option<f64>; CUE_SLOTS],
    /// Pitch in percent, ±8
    pitch: f64,
}

impl Deck {
    pub fn new(id: DeckId, sample_rate: u32, max_block: usize) -> Self {
        Self {
            id,
            track: None,
            player: StemPlayer::new(sample_rate, max_block),
            trim: Gain::new(sample_rate),
            eq: Eq3::new(sample_rate),
            filter: BiquadFilter::new(sample_rate),
            delay: Delay::new(sample_rate),
            reverb: Reverb::new(sample_rate),
            volume: Gain::new(sample_rate),
            cues: [None; CUE_SLOTS],
            pitch: 0.0,
        }
    }

    pub fn id(&self) -> DeckId {
        self.id
    }

    // ── Loading ──────────────────────────────────────────────────

    /// Load a track, optionally with its stem bundle. Resets the channel
    /// strip to defaults. With no bundle the deck holds metadata only and
    /// stays silent until stems arrive.
    pub fn load(&mut self, track: Track, bundle: Option<Arc<StemBundle>>) {
        log::info!("deck {}: loading '{}'", self.id.name(), track.id);
        self.track = Some(track);
        match bundle {
            Some(bundle) => self.player.load(bundle),
            None => self.player.unload(),
        }
        self.reset_strip();
        self.cues = [None; CUE_SLOTS];
        self.pitch = 0.0;
        self.player.set_rate(1.0);
    }

    pub fn unload(&mut self) {
        self.track = None;
        self.player.unload();
        self.cues = [None; CUE_SLOTS];
        self.pitch = 0.0;
    }

    fn reset_strip(&mut self) {
        self.trim.set_with_ramp(1.0, 0.0);
        self.eq.reset_flat();
        self.eq.reset();
        self.filter.set_enabled(false);
        self.filter.reset();
        self.delay.set_send(0.0);
        self.delay.reset();
        self.reverb.set_send(0.0);
        self.reverb.reset();
        self.volume.set_with_ramp(1.0, 0.0);
    }

    pub fn track(&self) -> Option<&Track> {
        self.track.as_ref()
    }

    pub fn has_stems(&self) -> bool {
        self.player.is_loaded()
    }

    // ── Transport ────────────────────────────────────────────────

    pub fn play(&mut self) {
        self.player.play();
    }

    pub fn pause(&mut self) {
        self.player.pause();
    }

    pub fn stop(&mut self) {
        self.player.stop();
    }

    pub fn seek(&mut self, seconds: f64) {
        self.player.seek(seconds);
    }

    pub fn is_playing(&self) -> bool {
        self.player.is_playing()
    }

    pub fn play_state(&self) -> PlayState {
        self.player.state()
    }

    /// Normalized position in [0, 1]
    pub fn position(&self) -> f64 {
        self.player.position()
    }

    pub fn position_seconds(&self) -> f64 {
        self.player.position_seconds()
    }

    // ── Cue points ───────────────────────────────────────────────

    /// Store the current position in a cue slot
    pub fn set_cue(&mut self, slot: usize) -> EngineResult<()> {
        let cue = self.cue_slot(slot)?;
        self.cues[cue] = Some(self.player.position());
        Ok(())
    }

    /// Jump to a stored cue point; no-op if the slot is empty
    pub fn cue(&mut self, slot: usize) -> EngineResult<()> {
        let cue = self.cue_slot(slot)?;
        if let Some(pos) = self.cues[cue] {
            let seconds = pos * self.player.duration_seconds();
            self.player.seek(seconds);
        }
        Ok(())
    }

    pub fn delete_cue(&mut self, slot: usize) -> EngineResult<()> {
        let cue = self.cue_slot(slot)?;
        self.cues[cue] = None;
        Ok(())
    }

    pub fn cue_position(&self, slot: usize) -> Option<f64> {
        self.cues.get(slot).copied().flatten()
    }

    fn cue_slot(&self, slot: usize) -> EngineResult<usize> {
        if slot < CUE_SLOTS {
            Ok(slot)
        } else {
            Err(EngineError::OutOfRange {
                param: "cue slot",
                value: slot as f64,
                min: 0.0,
                max: (CUE_SLOTS - 1) as f64,
            })
        }
    }

    // ── Channel strip ────────────────────────────────────────────

    pub fn set_volume(&mut self, volume: f32) {
        self.volume.set(volume);
    }

    pub fn volume(&self) -> f32 {
        self.volume.get()
    }

    pub fn set_trim(&mut self, trim: f32) {
        self.trim.set(trim);
    }

    pub fn set_eq(&mut self, band: EqBand, db: f32) {
        self.eq.set_gain_db(band, db);
    }

    pub fn eq_gain(&self, band: EqBand) -> f32 {
        self.eq.gain_db(band)
    }

    pub fn reset_eq(&mut self) {
        self.eq.reset_flat();
    }

    pub fn set_filter(&mut self, params: FilterParams) {
        self.filter.set_type(params.filter_type);
        self.filter.set_frequency(params.frequency);
        self.filter.set_q(params.q);
        self.filter.set_enabled(params.enabled);
    }

    pub fn filter_params(&self) -> FilterParams {
        FilterParams {
            filter_type: self.filter.filter_type(),
            frequency: self.filter.frequency(),
            q: self.filter.q(),
            enabled: self.filter.is_enabled(),
        }
    }

    pub fn set_effect_send(&mut self, send: EffectSend, level: f32) {
        match send {
            EffectSend::Delay => self.delay.set_send(level),
            EffectSend::Reverb => self.reverb.set_send(level),
        }
    }

    pub fn effect_send(&self, send: EffectSend) -> f32 {
        match send {
            EffectSend::Delay => self.delay.send(),
            EffectSend::Reverb => self.reverb.send(),
        }
    }

    // ── Pitch ────────────────────────────────────────────────────

    /// Pitch in percent, clamped to ±8. Applied uniformly to every stem.
    pub fn set_pitch(&mut self, pct: f64) {
        self.pitch = pct.clamp(PITCH_MIN, PITCH_MAX);
        self.player.set_rate(1.0 + self.pitch / 100.0);
    }

    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    /// Track BPM scaled by the current playback rate
    pub fn current_bpm(&self) -> Option<f64> {
        self.track
            .as_ref()
            .and_then(|t| t.bpm)
            .map(|bpm| bpm * (1.0 + self.pitch / 100.0))
    }

    // ── Stem passthrough ─────────────────────────────────────────

    pub fn player(&self) -> &StemPlayer {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut StemPlayer {
        &mut self.player
    }

    pub fn set_stem_volume(&mut self, stem: Stem, volume: f32) {
        self.player.controls_mut(stem).set_volume(volume);
    }

    pub fn set_stem_muted(&mut self, stem: Stem, muted: bool) {
        self.player.set_muted(stem, muted);
    }

    pub fn set_stem_soloed(&mut self, stem: Stem, soloed: bool) {
        self.player.set_soloed(stem, soloed);
    }

    pub fn set_stem_pan(&mut self, stem: Stem, pan: f32) {
        self.player.controls_mut(stem).set_pan(pan);
    }

    pub fn set_stem_eq(&mut self, stem: Stem, band: EqBand, db: f32) {
        self.player.controls_mut(stem).eq.set_gain_db(band, db);
    }

    pub fn set_stem_mix(&mut self, m: f32) {
        self.player.set_mix(m);
    }

    // ── Audio ────────────────────────────────────────────────────

    /// Render one block through the channel strip. Returns the drift
    /// magnitude if the player re-anchored during this block.
    pub fn process(&mut self, output: &mut StereoBuffer) -> Option<f64> {
        let drift = self.player.process(output);

        self.trim.process(output);
        self.eq.process(output);
        self.filter.process(output);
        self.delay.process(output);
        self.reverb.process(output);
        self.volume.process(output);

        drift
    }
}
