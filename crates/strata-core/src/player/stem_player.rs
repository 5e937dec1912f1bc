//! Five-stream transport with per-stem controls

use std::sync::Arc;

use crate::dsp::{Eq3, SmoothedParam, GAIN_RAMP_MS};
use crate::stems::StemBundle;
use crate::types::{PlayState, Stem, StereoBuffer, StereoSample, NUM_STEMS};

use super::drift::{DriftDecision, DriftMonitor};

/// Allowed transport rate range
pub const RATE_MIN: f64 = 0.5;
pub const RATE_MAX: f64 = 2.0;

/// Per-stem control state
///
/// `volume` and `pan` ramp; `audibility` is the ramped 0/1 gate computed from
/// the mute/solo law so toggles never click. The playback-rate fine offset is
/// reserved: stored and applied to the stem transport, but no public setter
/// changes it from 1.0.
pub struct StemControls {
    volume: SmoothedParam,
    audibility: SmoothedParam,
    pub muted: bool,
    pub soloed: bool,
    pan: SmoothedParam,
    pub eq: Eq3,
    pub(crate) fine_rate: f64,
    sample_rate: u32,
}

impl StemControls {
    fn new(sample_rate: u32) -> Self {
        Self {
            volume: SmoothedParam::new(1.0),
            audibility: SmoothedParam::new(1.0),
            muted: false,
            soloed: false,
            pan: SmoothedParam::new(0.0),
            eq: Eq3::new(sample_rate),
            fine_rate: 1.0,
            sample_rate,
        }
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume
            .ramp_to(volume.clamp(0.0, 1.0), GAIN_RAMP_MS, self.sample_rate);
    }

    pub fn volume(&self) -> f32 {
        self.volume.target()
    }

    /// Pan in [−1, +1], balance law (center stays at unity gain)
    pub fn set_pan(&mut self, pan: f32) {
        self.pan
            .ramp_to(pan.clamp(-1.0, 1.0), GAIN_RAMP_MS, self.sample_rate);
    }

    pub fn pan(&self) -> f32 {
        self.pan.target()
    }

    fn set_audible(&mut self, audible: bool) {
        let target = if audible { 1.0 } else { 0.0 };
        self.audibility.ramp_to(target, GAIN_RAMP_MS, self.sample_rate);
    }

    fn reset_state(&mut self) {
        self.volume.set_immediate(1.0);
        self.audibility.set_immediate(1.0);
        self.muted = false;
        self.soloed = false;
        self.pan.set_immediate(0.0);
        self.eq.reset_flat();
        self.eq.reset();
        self.fine_rate = 1.0;
    }
}

/// Transport for one loaded stem bundle
///
/// All transport commands anchor every stream against a single position, so
/// the five streams start, stop and seek together. During playback each
/// stream advances its own playhead (the reserved fine-rate hook); the drift
/// monitor re-anchors them if they diverge past the tolerance.
pub struct StemPlayer {
    bundle: Option<Arc<StemBundle>>,
    state: PlayState,
    /// Playheads in bundle frames: one per stem, last slot is the original
    positions: [f64; NUM_STEMS + 1],
    rate: f64,
    controls: [StemControls; NUM_STEMS],
    /// Stems-vs-original blend: 0 = stems only, 1 = original only
    mix: SmoothedParam,
    drift: DriftMonitor,
    host_rate: u32,
    scratch: StereoBuffer,
    stems_bus: StereoBuffer,
}

impl StemPlayer {
    pub fn new(host_rate: u32, max_block: usize) -> Self {
        Self {
            bundle: None,
            state: PlayState::Stopped,
            positions: [0.0; NUM_STEMS + 1],
            rate: 1.0,
            controls: std::array::from_fn(|_| StemControls::new(host_rate)),
            mix: SmoothedParam::new(0.0),
            drift: DriftMonitor::new(host_rate),
            host_rate,
            scratch: StereoBuffer::silence(max_block),
            stems_bus: StereoBuffer::silence(max_block),
        }
    }

    // ── Transport ────────────────────────────────────────────────

    /// Load a validated bundle; resets transport and per-stem state
    pub fn load(&mut self, bundle: Arc<StemBundle>) {
        self.bundle = Some(bundle);
        self.state = PlayState::Stopped;
        self.positions = [0.0; NUM_STEMS + 1];
        for controls in &mut self.controls {
            controls.reset_state();
        }
        self.mix.set_immediate(0.0);
        self.drift.reset();
    }

    pub fn unload(&mut self) {
        self.bundle = None;
        self.state = PlayState::Stopped;
        self.positions = [0.0; NUM_STEMS + 1];
    }

    pub fn is_loaded(&self) -> bool {
        self.bundle.is_some()
    }

    pub fn play(&mut self) {
        if self.bundle.is_some() {
            self.state = PlayState::Playing;
        }
    }

    pub fn pause(&mut self) {
        if self.state == PlayState::Playing {
            self.state = PlayState::Paused;
        }
    }

    pub fn stop(&mut self) {
        self.state = PlayState::Stopped;
        self.anchor_all(0.0);
    }

    /// Seek in seconds, clamped to [0, duration]
    pub fn seek(&mut self, seconds: f64) {
        let Some(bundle) = &self.bundle else { return };
        let frames = (seconds.max(0.0) * bundle.sample_rate() as f64)
            .min(bundle.frames() as f64);
        self.anchor_all(frames);
    }

    /// Transport rate, clamped to [0.5, 2.0]
    pub fn set_rate(&mut self, rate: f64) {
        self.rate = rate.clamp(RATE_MIN, RATE_MAX);
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlayState::Playing
    }

    /// Position of the reference stream in seconds
    pub fn position_seconds(&self) -> f64 {
        match &self.bundle {
            Some(bundle) => self.positions[NUM_STEMS] / bundle.sample_rate() as f64,
            None => 0.0,
        }
    }

    /// Normalized position in [0, 1]
    pub fn position(&self) -> f64 {
        match &self.bundle {
            Some(bundle) => (self.positions[NUM_STEMS] / bundle.frames() as f64).clamp(0.0, 1.0),
            None => 0.0,
        }
    }

    pub fn duration_seconds(&self) -> f64 {
        self.bundle
            .as_ref()
            .map(|b| b.duration_seconds())
            .unwrap_or(0.0)
    }

    fn anchor_all(&mut self, frames: f64) {
        self.positions = [frames; NUM_STEMS + 1];
    }

    // ── Per-stem controls ────────────────────────────────────────

    pub fn controls(&self, stem: Stem) -> &StemControls {
        &self.controls[stem as usize]
    }

    pub fn controls_mut(&mut self, stem: Stem) -> &mut StemControls {
        &mut self.controls[stem as usize]
    }

    pub fn set_muted(&mut self, stem: Stem, muted: bool) {
        self.controls[stem as usize].muted = muted;
        self.refresh_audibility();
    }

    pub fn set_soloed(&mut self, stem: Stem, soloed: bool) {
        self.controls[stem as usize].soloed = soloed;
        self.refresh_audibility();
    }

    fn any_soloed(&self) -> bool {
        self.controls.iter().any(|c| c.soloed)
    }

    /// Re-derive every stem's audibility gate from the mute/solo law
    fn refresh_audibility(&mut self) {
        let any_solo = self.any_soloed();
        for controls in &mut self.controls {
            let audible = !controls.muted && (!any_solo || controls.soloed);
            controls.set_audible(audible);
        }
    }

    /// The documented gain law: `volume · ¬mute · (¬any_solo ∨ solo)`
    pub fn effective_gain(&self, stem: Stem) -> f32 {
        let controls = &self.controls[stem as usize];
        let any_solo = self.any_soloed();
        let gate = !controls.muted && (!any_solo || controls.soloed);
        if gate {
            controls.volume()
        } else {
            0.0
        }
    }

    /// Stems-vs-original blend: `original_gain = m`, `stems_gain = 1 − m`
    pub fn set_mix(&mut self, m: f32) {
        self.mix
            .ramp_to(m.clamp(0.0, 1.0), GAIN_RAMP_MS, self.host_rate);
    }

    pub fn mix(&self) -> f32 {
        self.mix.target()
    }

    /// Drift re-anchor events since load
    pub fn drift_events(&self) -> u64 {
        self.drift.events()
    }

    // ── Audio ────────────────────────────────────────────────────

    /// Render one block. Returns the drift magnitude if a re-anchor
    /// happened during this block.
    pub fn process(&mut self, output: &mut StereoBuffer) -> Option<f64> {
        let frames = output.len();
        output.fill_silence();

        let Some(bundle) = self.bundle.clone() else {
            return None;
        };
        if self.state != PlayState::Playing {
            return None;
        }

        // Bundle frames consumed per output frame
        let base_step = self.rate * bundle.sample_rate() as f64 / self.host_rate as f64;

        self.stems_bus.set_len_from_capacity(frames);
        self.stems_bus.fill_silence();
        self.scratch.set_len_from_capacity(frames);

        for stem in Stem::ALL {
            let idx = stem as usize;
            let start_pos = self.positions[idx];
            let step = base_step * self.controls[idx].fine_rate;

            // Resample this stem into the scratch buffer
            let source = bundle.stem(stem);
            for (i, sample) in self.scratch.iter_mut().enumerate() {
                *sample = read_interpolated(source, start_pos + i as f64 * step);
            }
            self.positions[idx] = start_pos + frames as f64 * step;

            let controls = &mut self.controls[idx];
            controls.eq.process(&mut self.scratch);

            // Volume, mute/solo gate and pan, all ramped per sample
            for (i, sample) in self.scratch.iter_mut().enumerate() {
                let gain = controls.volume.next() * controls.audibility.next();
                let pan = controls.pan.next();
                let (gl, gr) = balance_gains(pan);
                let s = *sample * gain;
                self.stems_bus.as_mut_slice()[i].left += s.left * gl;
                self.stems_bus.as_mut_slice()[i].right += s.right * gr;
            }
        }

        // Original reference stream
        let original_start = self.positions[NUM_STEMS];
        let original = bundle.original();
        for (i, out) in output.iter_mut().enumerate() {
            let m = self.mix.next();
            let orig = read_interpolated(original, original_start + i as f64 * base_step);
            let stems = self.stems_bus[i];
            out.left = stems.left * (1.0 - m) + orig.left * m;
            out.right = stems.right * (1.0 - m) + orig.right * m;
        }
        self.positions[NUM_STEMS] = original_start + frames as f64 * base_step;

        // End of material: stop once the reference stream runs out
        if self.positions[NUM_STEMS] >= bundle.frames() as f64 {
            self.state = PlayState::Stopped;
            self.anchor_all(bundle.frames() as f64);
            return None;
        }

        // Periodic drift check across all five streams
        if self.drift.tick(frames) {
            if let DriftDecision::Reanchor {
                max_drift_ms,
                median_frames,
            } = self.drift.evaluate(&self.positions, bundle.sample_rate())
            {
                log::debug!(
                    "stem drift {:.2} ms, re-anchoring to frame {:.0}",
                    max_drift_ms,
                    median_frames
                );
                self.anchor_all(median_frames);
                return Some(max_drift_ms);
            }
        }
        None
    }
}

/// Linear-interpolated read; positions past the end read as silence
#[inline]
fn read_interpolated(buffer: &StereoBuffer, pos: f64) -> StereoSample {
    if pos < 0.0 {
        return StereoSample::silence();
    }
    let base = pos as usize;
    if base + 1 >= buffer.len() {
        return if base < buffer.len() {
            buffer[base]
        } else {
            StereoSample::silence()
        };
    }
    let frac = (pos - base as f64) as f32;
    let a = buffer[base];
    let b = buffer[base + 1];
    StereoSample::new(
        a.left + (b.left - a.left) * frac,
        a.right + (b.right - a.right) * frac,
    )
}

/// Balance-style pan: center is unity on both sides, extremes cut the far side
#[inline]
fn balance_gains(pan: f32) -> (f32, f32) {
    let left = if pan > 0.0 { 1.0 - pan } else { 1.0 };
    let right = if pan < 0.0 { 1.0 + pan } else { 1.0 };
    (left, right)
}

#[cfg(test)]
mod tests {
    use super::super::drift::MAX_DRIFT_MS;
    use super::*;
    use crate::stems::StemBundle;

    const RATE: u32 = 48_000;
    const BLOCK: usize = 256;

    fn test_bundle(frames: usize) -> Arc<StemBundle> {
        let constant = |level: f32| {
            let mut buf = StereoBuffer::silence(frames);
            for s in buf.iter_mut() {
                *s = StereoSample::mono(level);
            }
            buf
        };
        StemBundle::new(
            [constant(0.1), constant(0.2), constant(0.3), constant(0.4)],
            constant(0.8),
            RATE,
        )
        .unwrap()
    }

    fn player_with_bundle(frames: usize) -> StemPlayer {
        let mut player = StemPlayer::new(RATE, 8192);
        player.load(test_bundle(frames));
        player
    }

    fn render(player: &mut StemPlayer, blocks: usize) -> StereoBuffer {
        let mut out = StereoBuffer::silence(BLOCK);
        for _ in 0..blocks {
            player.process(&mut out);
        }
        out
    }

    #[test]
    fn stopped_player_outputs_silence() {
        let mut player = player_with_bundle(RATE as usize);
        let out = render(&mut player, 1);
        assert_eq!(out.peak(), 0.0);
    }

    #[test]
    fn playing_sums_stems() {
        let mut player = player_with_bundle(RATE as usize);
        player.play();
        // Skip ramp-in, settle a few blocks
        let out = render(&mut player, 4);
        // Sum of 0.1+0.2+0.3+0.4 = 1.0, original mixed at 0
        assert!((out[BLOCK - 1].left - 1.0).abs() < 1e-3);
    }

    #[test]
    fn effective_gain_law() {
        let mut player = player_with_bundle(RATE as usize);

        // solo vocals, mute drums
        player.set_soloed(Stem::Vocals, true);
        player.set_muted(Stem::Drums, true);

        assert_eq!(player.effective_gain(Stem::Drums), 0.0);
        assert_eq!(player.effective_gain(Stem::Bass), 0.0);
        assert_eq!(player.effective_gain(Stem::Melody), 0.0);
        assert_eq!(player.effective_gain(Stem::Vocals), 1.0);

        // un-solo: mute still applies, the rest recover
        player.set_soloed(Stem::Vocals, false);
        assert_eq!(player.effective_gain(Stem::Drums), 0.0);
        assert_eq!(player.effective_gain(Stem::Bass), 1.0);
    }

    #[test]
    fn solo_preserves_underlying_state() {
        let mut player = player_with_bundle(RATE as usize);
        player.controls_mut(Stem::Bass).set_volume(0.7);
        player.set_soloed(Stem::Vocals, true);

        // Bass silenced but its volume survives
        assert_eq!(player.effective_gain(Stem::Bass), 0.0);
        assert_eq!(player.controls(Stem::Bass).volume(), 0.7);

        player.set_soloed(Stem::Vocals, false);
        assert_eq!(player.effective_gain(Stem::Bass), 0.7);
    }

    #[test]
    fn solo_audio_output_matches_law() {
        let mut player = player_with_bundle(RATE as usize);
        player.set_soloed(Stem::Vocals, true);
        player.play();

        let out = render(&mut player, 4);
        // Only vocals (0.4) audible once ramps settle
        assert!((out[BLOCK - 1].left - 0.4).abs() < 1e-3);
    }

    #[test]
    fn mix_crossfades_to_original() {
        let mut player = player_with_bundle(RATE as usize);
        player.set_mix(1.0);
        player.play();

        let out = render(&mut player, 4);
        // Original constant is 0.8
        assert!((out[BLOCK - 1].left - 0.8).abs() < 1e-3);
    }

    #[test]
    fn seek_clamps_and_anchors_all_streams() {
        let mut player = player_with_bundle(RATE as usize); // 1 s
        player.seek(100.0);
        assert!((player.position() - 1.0).abs() < 1e-9);

        player.seek(0.5);
        assert!((player.position_seconds() - 0.5).abs() < 1e-9);
        // all five playheads identical after a seek
        let p0 = player.positions[0];
        assert!(player.positions.iter().all(|&p| p == p0));
    }

    #[test]
    fn rate_clamps() {
        let mut player = player_with_bundle(RATE as usize);
        player.set_rate(3.0);
        assert_eq!(player.rate(), RATE_MAX);
        player.set_rate(0.1);
        assert_eq!(player.rate(), RATE_MIN);
    }

    #[test]
    fn playback_stops_at_end_of_material() {
        let mut player = player_with_bundle(BLOCK * 2);
        player.play();
        render(&mut player, 3);
        assert_eq!(player.state(), PlayState::Stopped);
        assert!((player.position() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn forced_fine_rate_skew_triggers_reanchor() {
        let mut player = player_with_bundle(RATE as usize * 4);
        // Skew one stem transport hard (reserved hook, test only)
        player.controls_mut(Stem::Drums).fine_rate = 1.5;
        player.play();

        let mut out = StereoBuffer::silence(BLOCK);
        let mut drift_seen = None;
        for _ in 0..40 {
            if let Some(ms) = player.process(&mut out) {
                drift_seen = Some(ms);
                break;
            }
        }
        let ms = drift_seen.expect("drift re-anchor never fired");
        assert!(ms > MAX_DRIFT_MS);
        assert_eq!(player.drift_events(), 1);

        // After the re-anchor all playheads coincide again
        let p0 = player.positions[0];
        assert!(player.positions.iter().all(|&p| (p - p0).abs() < 1e-9));
    }
}
