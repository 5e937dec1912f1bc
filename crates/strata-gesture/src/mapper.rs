//! Gesture→control mapper
//!
//! Applies the active profile to incoming gesture results. Per mapping:
//! match class + hand → extract raw value → deadzone → sensitivity about
//! center → smoothing → change threshold → dispatch. When several mappings
//! claim the same control target in one frame, the highest priority wins
//! (ties resolved by mapping id).

use std::collections::HashMap;

use thiserror::Error;

use strata_core::dsp::EqBand;
use strata_core::types::{DeckId, Stem};

use crate::mapping::{
    ControlKind, ControlTarget, GestureMapping, MappingMode, MappingProfile,
};
use crate::recognize::GestureResult;

/// Dispatch is suppressed when the smoothed value moved less than this
pub const CHANGE_THRESHOLD: f32 = 0.01;

/// Center of the normalized control space (deadzone/sensitivity reference)
const CENTER: f32 = 0.5;

/// Mapper errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MapperError {
    #[error("No mapping profile with id '{0}'")]
    UnknownProfile(String),

    #[error("No mapping with id '{0}' in the active profile")]
    UnknownMapping(String),
}

/// Commands the mapper dispatches to the session coordinator
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlCommand {
    SetStemVolume { deck: DeckId, stem: Stem, value: f32 },
    SetStemMuted { deck: DeckId, stem: Stem, muted: bool },
    SetStemSoloed { deck: DeckId, stem: Stem, soloed: bool },
    SetStemPan { deck: DeckId, stem: Stem, pan: f32 },
    SetStemEq { deck: DeckId, stem: Stem, band: EqBand, db: f32 },
    SetStemMix { deck: DeckId, value: f32 },
    SetDeckVolume { deck: DeckId, value: f32 },
    SetDeckEq { deck: DeckId, band: EqBand, db: f32 },
    /// Normalized filter morph (0 = low cutoff, 1 = open)
    SetDeckFilter { deck: DeckId, value: f32 },
    SetEffectSend { deck: DeckId, value: f32 },
    TriggerCue { deck: DeckId, slot: usize },
    SetCrossfader { position: f32 },
    SetMasterVolume { value: f32 },
}

/// Per-mapping runtime state
#[derive(Debug, Clone, Copy, Default)]
struct MappingRuntime {
    /// Smoothed value
    y: Option<f32>,
    /// Last value actually dispatched
    last_dispatched: Option<f32>,
    /// Toggle latch
    latch: bool,
    /// Whether this mapping matched in the previous frame (edge detection)
    active_last_frame: bool,
}

/// The mapper: one active profile plus per-mapping runtime state
#[derive(Debug)]
pub struct ControlMapper {
    profiles: HashMap<String, MappingProfile>,
    active: String,
    runtime: HashMap<String, MappingRuntime>,
    enabled: bool,
}

impl ControlMapper {
    /// Mapper with the built-in default profile active
    pub fn new() -> Self {
        Self::with_profile(MappingProfile::default_profile())
    }

    pub fn with_profile(profile: MappingProfile) -> Self {
        let active = profile.id.clone();
        let mut profiles = HashMap::new();
        profiles.insert(profile.id.clone(), profile);
        Self {
            profiles,
            active,
            runtime: HashMap::new(),
            enabled: true,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Register a profile (replacing any previous one with the same id)
    pub fn add_profile(&mut self, profile: MappingProfile) {
        self.profiles.insert(profile.id.clone(), profile);
    }

    /// Switch the active profile; runtime state resets
    pub fn set_active_profile(&mut self, id: &str) -> Result<(), MapperError> {
        if !self.profiles.contains_key(id) {
            return Err(MapperError::UnknownProfile(id.to_string()));
        }
        self.active = id.to_string();
        self.runtime.clear();
        Ok(())
    }

    pub fn active_profile(&self) -> &MappingProfile {
        &self.profiles[&self.active]
    }

    /// Add a mapping to the active profile
    pub fn add_mapping(&mut self, mapping: GestureMapping) {
        if let Some(profile) = self.profiles.get_mut(&self.active) {
            profile.mappings.retain(|m| m.id != mapping.id);
            profile.mappings.push(mapping);
        }
    }

    /// Remove a mapping from the active profile by id
    pub fn remove_mapping(&mut self, id: &str) -> Result<(), MapperError> {
        let profile = self
            .profiles
            .get_mut(&self.active)
            .ok_or_else(|| MapperError::UnknownProfile(self.active.clone()))?;
        let before = profile.mappings.len();
        profile.mappings.retain(|m| m.id != id);
        if profile.mappings.len() == before {
            return Err(MapperError::UnknownMapping(id.to_string()));
        }
        self.runtime.remove(id);
        Ok(())
    }

    /// Map one frame's gated gesture results to control commands
    pub fn process(&mut self, results: &[GestureResult]) -> Vec<ControlCommand> {
        if !self.enabled || results.is_empty() {
            // Nothing matched anywhere: clear edge state so the next gesture
            // onset re-triggers
            if results.is_empty() {
                for state in self.runtime.values_mut() {
                    state.active_last_frame = false;
                }
            }
            return Vec::new();
        }

        let profile = self.profiles[&self.active].clone();

        // Collect matches, then resolve conflicts per control target:
        // key → (mapping index, gesture result index)
        let mut winners: HashMap<(ControlTarget, std::mem::Discriminant<ControlKind>), usize> =
            HashMap::new();
        let mut matched_result: HashMap<usize, usize> = HashMap::new();

        for (mi, mapping) in profile.mappings.iter().enumerate() {
            if !mapping.enabled {
                continue;
            }
            let Some(ri) = results
                .iter()
                .position(|r| r.class == mapping.gesture && mapping.hand.matches(r.hand))
            else {
                continue;
            };
            matched_result.insert(mi, ri);

            let key = (mapping.target, std::mem::discriminant(&mapping.control));
            match winners.get(&key) {
                Some(&current) => {
                    let cur = &profile.mappings[current];
                    let better = mapping.priority > cur.priority
                        || (mapping.priority == cur.priority && mapping.id < cur.id);
                    if better {
                        winners.insert(key, mi);
                    }
                }
                None => {
                    winners.insert(key, mi);
                }
            }
        }

        let matched_ids: Vec<&str> = matched_result
            .keys()
            .map(|&mi| profile.mappings[mi].id.as_str())
            .collect();

        let mut commands = Vec::new();
        for (_, mi) in winners {
            let mapping = &profile.mappings[mi];
            let result = &results[matched_result[&mi]];
            if let Some(command) = self.apply_mapping(mapping, result) {
                commands.push(command);
            }
        }

        // Edge bookkeeping for every known mapping
        for mapping in &profile.mappings {
            let state = self.runtime.entry(mapping.id.clone()).or_default();
            state.active_last_frame = matched_ids.contains(&mapping.id.as_str());
        }

        commands
    }

    /// Steps 2–7 for one winning mapping
    fn apply_mapping(
        &mut self,
        mapping: &GestureMapping,
        result: &GestureResult,
    ) -> Option<ControlCommand> {
        let params = mapping.params.clamped();
        let state = self.runtime.entry(mapping.id.clone()).or_default();

        match mapping.mode {
            MappingMode::Continuous => {
                let raw = result.payload.value.clamp(0.0, 1.0);

                // Deadzone around center
                if (raw - CENTER).abs() < params.deadzone {
                    return None;
                }

                // Sensitivity scales about center
                let scaled = (CENTER + (raw - CENTER) * params.sensitivity).clamp(0.0, 1.0);

                // Smoothing: y ← y + α(new − y), α = 1 − smoothing
                let alpha = 1.0 - params.smoothing;
                let y = match state.y {
                    Some(prev) => prev + alpha * (scaled - prev),
                    None => scaled,
                };
                state.y = Some(y);

                // Change threshold suppresses micro-updates
                if let Some(last) = state.last_dispatched {
                    if (y - last).abs() < CHANGE_THRESHOLD {
                        return None;
                    }
                }
                state.last_dispatched = Some(y);
                Self::continuous_command(mapping, y)
            }
            MappingMode::Toggle => {
                if state.active_last_frame {
                    return None;
                }
                state.latch = !state.latch;
                Self::switch_command(mapping, state.latch)
            }
            MappingMode::Trigger => {
                if state.active_last_frame {
                    return None;
                }
                Self::trigger_command(mapping)
            }
        }
    }

    fn continuous_command(mapping: &GestureMapping, value: f32) -> Option<ControlCommand> {
        match (mapping.control, mapping.target) {
            (ControlKind::Volume, ControlTarget::Stem { deck, stem }) => {
                Some(ControlCommand::SetStemVolume { deck, stem, value })
            }
            (ControlKind::Volume, ControlTarget::Deck { deck }) => {
                Some(ControlCommand::SetDeckVolume { deck, value })
            }
            (ControlKind::Volume, ControlTarget::Master) => {
                Some(ControlCommand::SetMasterVolume { value })
            }
            (ControlKind::Pan, ControlTarget::Stem { deck, stem }) => {
                Some(ControlCommand::SetStemPan {
                    deck,
                    stem,
                    pan: value * 2.0 - 1.0,
                })
            }
            (ControlKind::Eq { band }, ControlTarget::Stem { deck, stem }) => {
                Some(ControlCommand::SetStemEq {
                    deck,
                    stem,
                    band,
                    db: (value * 2.0 - 1.0) * 26.0,
                })
            }
            (ControlKind::Eq { band }, ControlTarget::Deck { deck }) => {
                Some(ControlCommand::SetDeckEq {
                    deck,
                    band,
                    db: (value * 2.0 - 1.0) * 26.0,
                })
            }
            (ControlKind::Filter, ControlTarget::Deck { deck }) => {
                Some(ControlCommand::SetDeckFilter { deck, value })
            }
            (ControlKind::Crossfader, _) => {
                Some(ControlCommand::SetCrossfader { position: value })
            }
            (ControlKind::EffectSend, ControlTarget::Deck { deck }) => {
                Some(ControlCommand::SetEffectSend { deck, value })
            }
            (ControlKind::StemMix, ControlTarget::Deck { deck }) => {
                Some(ControlCommand::SetStemMix { deck, value })
            }
            _ => {
                log::warn!(
                    "mapping '{}' pairs {:?} with {:?}; no continuous command",
                    mapping.id,
                    mapping.control,
                    mapping.target
                );
                None
            }
        }
    }

    fn switch_command(mapping: &GestureMapping, on: bool) -> Option<ControlCommand> {
        match (mapping.control, mapping.target) {
            (ControlKind::Mute, ControlTarget::Stem { deck, stem }) => {
                Some(ControlCommand::SetStemMuted {
                    deck,
                    stem,
                    muted: on,
                })
            }
            (ControlKind::Solo, ControlTarget::Stem { deck, stem }) => {
                Some(ControlCommand::SetStemSoloed {
                    deck,
                    stem,
                    soloed: on,
                })
            }
            _ => None,
        }
    }

    fn trigger_command(mapping: &GestureMapping) -> Option<ControlCommand> {
        match (mapping.control, mapping.target) {
            (ControlKind::Cue { slot }, ControlTarget::Deck { deck }) => {
                Some(ControlCommand::TriggerCue { deck, slot })
            }
            _ => None,
        }
    }
}

impl Default for ControlMapper {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::Handedness;
    use crate::mapping::{HandRequirement, MappingParams};
    use crate::recognize::{GestureClass, GesturePayload};

    fn pinch_result(hand: Handedness, value: f32, ts: f64) -> GestureResult {
        GestureResult {
            class: GestureClass::Pinch,
            hand: Some(hand),
            confidence: 0.9,
            payload: GesturePayload {
                value,
                distance: Some(value),
                angle: None,
                velocity: (0.0, 0.0),
            },
            timestamp_ms: ts,
        }
    }

    fn volume_mapping(id: &str, priority: i32) -> GestureMapping {
        GestureMapping {
            id: id.into(),
            gesture: GestureClass::Pinch,
            hand: HandRequirement::Right,
            control: ControlKind::Volume,
            target: ControlTarget::Stem {
                deck: DeckId::A,
                stem: Stem::Vocals,
            },
            mode: MappingMode::Continuous,
            params: MappingParams {
                sensitivity: 1.0,
                deadzone: 0.05,
                smoothing: 0.2,
            },
            priority,
            enabled: true,
        }
    }

    fn mapper_with(mappings: Vec<GestureMapping>) -> ControlMapper {
        let mut profile = MappingProfile::new("test", "Test");
        profile.mappings = mappings;
        ControlMapper::with_profile(profile)
    }

    #[test]
    fn pinch_sequence_rides_volume_down() {
        // The §8 scenario: distances {0.50, 0.50, 0.48, 0.20, 0.05} with
        // deadzone 0.05, sensitivity 1.0, smoothing 0.2
        let mut mapper = mapper_with(vec![volume_mapping("m", 0)]);

        let mut dispatched = Vec::new();
        for (i, raw) in [0.50f32, 0.50, 0.48, 0.20, 0.05].iter().enumerate() {
            let commands =
                mapper.process(&[pinch_result(Handedness::Right, *raw, i as f64 * 33.0)]);
            for command in commands {
                if let ControlCommand::SetStemVolume { value, .. } = command {
                    dispatched.push(value);
                }
            }
        }

        // Values inside the deadzone produced nothing
        assert_eq!(dispatched.len(), 2, "got {dispatched:?}");
        // Monotonically nonincreasing, ending near the final pinch
        for pair in dispatched.windows(2) {
            assert!(pair[1] <= pair[0]);
        }
        let last = *dispatched.last().unwrap();
        assert!(last < 0.1, "ended at {last}");
    }

    #[test]
    fn repeated_value_dispatches_at_most_once() {
        let mut mapper = mapper_with(vec![volume_mapping("m", 0)]);

        let first = mapper.process(&[pinch_result(Handedness::Right, 0.8, 0.0)]);
        assert_eq!(first.len(), 1);

        // Identical raw value again: change threshold suppresses it
        let second = mapper.process(&[pinch_result(Handedness::Right, 0.8, 33.0)]);
        assert!(second.is_empty(), "got {second:?}");
    }

    #[test]
    fn deadzone_drops_center_values() {
        let mut mapper = mapper_with(vec![volume_mapping("m", 0)]);
        let commands = mapper.process(&[pinch_result(Handedness::Right, 0.52, 0.0)]);
        assert!(commands.is_empty());
    }

    #[test]
    fn sensitivity_scales_about_center() {
        let mut mapping = volume_mapping("m", 0);
        mapping.params.sensitivity = 2.0;
        mapping.params.smoothing = 0.0;
        let mut mapper = mapper_with(vec![mapping]);

        let commands = mapper.process(&[pinch_result(Handedness::Right, 0.75, 0.0)]);
        match commands[0] {
            ControlCommand::SetStemVolume { value, .. } => {
                // 0.5 + (0.75 − 0.5) × 2 = 1.0
                assert!((value - 1.0).abs() < 1e-6);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn hand_requirement_filters() {
        let mut mapper = mapper_with(vec![volume_mapping("m", 0)]);
        let commands = mapper.process(&[pinch_result(Handedness::Left, 0.9, 0.0)]);
        assert!(commands.is_empty());
    }

    #[test]
    fn highest_priority_wins_per_target() {
        let mut low = volume_mapping("a-low", 1);
        low.params.smoothing = 0.0;
        let mut high = volume_mapping("b-high", 5);
        high.params.smoothing = 0.0;
        high.params.sensitivity = 2.0;
        let mut mapper = mapper_with(vec![low, high]);

        let commands = mapper.process(&[pinch_result(Handedness::Right, 0.75, 0.0)]);
        assert_eq!(commands.len(), 1);
        match commands[0] {
            ControlCommand::SetStemVolume { value, .. } => {
                // The sensitivity-2 mapping won
                assert!((value - 1.0).abs() < 1e-6);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn priority_ties_resolve_by_id() {
        let mut a = volume_mapping("aaa", 3);
        a.params.smoothing = 0.0;
        let mut b = volume_mapping("bbb", 3);
        b.params.smoothing = 0.0;
        b.params.sensitivity = 2.0;
        let mut mapper = mapper_with(vec![b, a]);

        let commands = mapper.process(&[pinch_result(Handedness::Right, 0.75, 0.0)]);
        match commands[0] {
            ControlCommand::SetStemVolume { value, .. } => {
                // "aaa" wins the tie; sensitivity 1 → 0.75
                assert!((value - 0.75).abs() < 1e-6);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn toggle_flips_once_per_onset() {
        let fist = |ts: f64| GestureResult {
            class: GestureClass::Fist,
            hand: Some(Handedness::Right),
            confidence: 0.9,
            payload: GesturePayload::default(),
            timestamp_ms: ts,
        };
        let mapping = GestureMapping {
            id: "fist-mute".into(),
            gesture: GestureClass::Fist,
            hand: HandRequirement::Right,
            control: ControlKind::Mute,
            target: ControlTarget::Stem {
                deck: DeckId::A,
                stem: Stem::Drums,
            },
            mode: MappingMode::Toggle,
            params: MappingParams::default(),
            priority: 0,
            enabled: true,
        };
        let mut mapper = mapper_with(vec![mapping]);

        // Held fist across three frames: one toggle
        let on = mapper.process(&[fist(0.0)]);
        assert_eq!(
            on,
            vec![ControlCommand::SetStemMuted {
                deck: DeckId::A,
                stem: Stem::Drums,
                muted: true
            }]
        );
        assert!(mapper.process(&[fist(33.0)]).is_empty());
        assert!(mapper.process(&[fist(66.0)]).is_empty());

        // Release, then a new fist: toggles back off
        assert!(mapper.process(&[]).is_empty());
        let off = mapper.process(&[fist(132.0)]);
        assert_eq!(
            off,
            vec![ControlCommand::SetStemMuted {
                deck: DeckId::A,
                stem: Stem::Drums,
                muted: false
            }]
        );
    }

    #[test]
    fn disabled_mapper_emits_nothing() {
        let mut mapper = mapper_with(vec![volume_mapping("m", 0)]);
        mapper.set_enabled(false);
        let commands = mapper.process(&[pinch_result(Handedness::Right, 0.9, 0.0)]);
        assert!(commands.is_empty());
    }

    #[test]
    fn profile_switching_requires_known_id() {
        let mut mapper = ControlMapper::new();
        assert!(matches!(
            mapper.set_active_profile("nope"),
            Err(MapperError::UnknownProfile(_))
        ));

        mapper.add_profile(MappingProfile::new("alt", "Alt"));
        mapper.set_active_profile("alt").unwrap();
        assert_eq!(mapper.active_profile().id, "alt");
    }
}
