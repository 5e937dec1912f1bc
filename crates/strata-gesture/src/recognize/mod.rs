//! Gesture recognition
//!
//! Per frame: extract hand features, classify single- and two-hand gestures,
//! then gate every candidate on edge proximity, temporal stability over the
//! recent history ring, velocity stability, and an absolute confidence
//! floor. Candidates failing any gate are dropped silently.

mod dual;
mod single;

pub use single::HandFeatures;

use std::collections::VecDeque;

use crate::landmarks::{HandFrame, Handedness};

use dual::DualHandState;
use single::SingleHandState;

/// Swipe direction in camera coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SwipeDirection {
    Left,
    Right,
    Up,
    Down,
}

/// Closed set of recognizable gestures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum GestureClass {
    Pinch,
    Fist,
    PalmOpen,
    FingerCount(u8),
    Swipe(SwipeDirection),
    TwoHandPinch,
    TwoHandRotate,
    Spread,
}

/// Measured quantities attached to a recognized gesture
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GesturePayload {
    /// Normalized control scalar in [0, 1] (class-specific mapping)
    pub value: f32,
    /// Raw distance backing `value`, when the class has one
    pub distance: Option<f32>,
    /// Inter-hand angle in radians, for rotation gestures
    pub angle: Option<f32>,
    /// Index-tip velocity in normalized units/s
    pub velocity: (f32, f32),
}

/// One recognized, gated gesture
#[derive(Debug, Clone, PartialEq)]
pub struct GestureResult {
    pub class: GestureClass,
    /// None for two-hand gestures
    pub hand: Option<Handedness>,
    pub confidence: f32,
    pub payload: GesturePayload,
    pub timestamp_ms: f64,
}

/// Recognizer thresholds (defaults follow the tracker's normalized space)
#[derive(Debug, Clone, Copy)]
pub struct RecognizerConfig {
    /// Thumb-to-index distance that engages a pinch
    pub pinch_engage: f32,
    /// Distance that releases an engaged pinch (hysteresis)
    pub pinch_release: f32,
    /// Fingertip-to-wrist ratio of the extended reference that counts as curled
    pub fist_ratio: f32,
    /// Extended fingers needed for an open palm
    pub palm_min_extended: usize,
    /// Tip speed that qualifies as a swipe (normalized units/s)
    pub swipe_min_velocity: f32,
    /// Frames the swipe direction must dominate
    pub swipe_min_frames: usize,
    /// Optimal two-hand separation as a fraction of frame width
    pub optimal_separation: f32,
    /// Inter-hand angle change that qualifies as a rotation (radians)
    pub rotate_min_angle: f32,
    /// Edge margin as a fraction of the frame
    pub edge_margin: f32,
    /// Confidence multiplier applied near the edge
    pub edge_penalty: f32,
    /// Required fraction of matching history entries
    pub min_temporal_stability: f32,
    /// Required velocity-stability score
    pub min_velocity_stability: f32,
    /// Absolute confidence floor after penalties
    pub confidence_floor: f32,
    /// History ring bounds
    pub history_limit: usize,
    pub history_window_ms: f64,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            pinch_engage: 0.08,
            pinch_release: 0.45,
            fist_ratio: 0.45,
            palm_min_extended: 3,
            swipe_min_velocity: 0.5,
            swipe_min_frames: 3,
            optimal_separation: 0.3,
            rotate_min_angle: 0.15,
            edge_margin: 0.05,
            edge_penalty: 0.8,
            min_temporal_stability: 0.4,
            min_velocity_stability: 0.3,
            confidence_floor: 0.6,
            history_limit: 50,
            history_window_ms: 1_000.0,
        }
    }
}

/// Bounded ring of recent candidate classifications
#[derive(Debug)]
struct GestureHistory {
    entries: VecDeque<(f64, GestureClass)>,
    limit: usize,
    window_ms: f64,
}

impl GestureHistory {
    fn new(limit: usize, window_ms: f64) -> Self {
        Self {
            entries: VecDeque::with_capacity(limit),
            limit,
            window_ms,
        }
    }

    fn push(&mut self, timestamp_ms: f64, class: GestureClass) {
        while self.entries.len() >= self.limit {
            self.entries.pop_front();
        }
        self.entries.push_back((timestamp_ms, class));
        self.evict(timestamp_ms);
    }

    fn evict(&mut self, now_ms: f64) {
        while let Some(&(ts, _)) = self.entries.front() {
            if now_ms - ts > self.window_ms {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }

    /// Fraction of in-window entries matching `class`
    fn stability(&self, class: GestureClass) -> f32 {
        if self.entries.is_empty() {
            return 1.0;
        }
        let matching = self
            .entries
            .iter()
            .filter(|(_, c)| *c == class)
            .count();
        matching as f32 / self.entries.len() as f32
    }
}

/// Frame-by-frame gesture recognizer
#[derive(Debug)]
pub struct Recognizer {
    config: RecognizerConfig,
    left: SingleHandState,
    right: SingleHandState,
    dual: DualHandState,
    history: GestureHistory,
}

impl Recognizer {
    pub fn new(config: RecognizerConfig) -> Self {
        Self {
            config,
            left: SingleHandState::new(),
            right: SingleHandState::new(),
            dual: DualHandState::new(),
            history: GestureHistory::new(config.history_limit, config.history_window_ms),
        }
    }

    pub fn config(&self) -> &RecognizerConfig {
        &self.config
    }

    /// Classify one frame, returning only gestures that pass every gate
    pub fn process_frame(&mut self, frame: &HandFrame) -> Vec<GestureResult> {
        let mut candidates: Vec<GestureResult> = Vec::new();

        // Two-hand gestures take precedence over per-hand pinches
        let two_hand_active = if frame.both_present() {
            let results = self.dual.classify(frame, &self.config, &self.left, &self.right);
            let active = !results.is_empty();
            candidates.extend(results);
            active
        } else {
            self.dual.reset();
            false
        };

        for handedness in [Handedness::Left, Handedness::Right] {
            let Some(observation) = frame.hand(handedness) else {
                self.hand_state_mut(handedness).on_hand_lost();
                continue;
            };
            let state = match handedness {
                Handedness::Left => &mut self.left,
                Handedness::Right => &mut self.right,
            };
            if let Some(result) = state.classify(observation, &self.config) {
                let suppressed = two_hand_active && result.class == GestureClass::Pinch;
                if !suppressed {
                    candidates.push(result);
                }
            }
        }

        // Candidates feed the history before gating so stability can build
        for candidate in &candidates {
            self.history.push(candidate.timestamp_ms, candidate.class);
        }

        candidates
            .into_iter()
            .filter_map(|c| self.gate(c, frame))
            .collect()
    }

    fn hand_state_mut(&mut self, handedness: Handedness) -> &mut SingleHandState {
        match handedness {
            Handedness::Left => &mut self.left,
            Handedness::Right => &mut self.right,
        }
    }

    /// Apply the confidence gates; None means dropped
    fn gate(&self, mut result: GestureResult, frame: &HandFrame) -> Option<GestureResult> {
        let config = &self.config;

        // Edge penalty: any involved landmark near the frame edge
        let near_edge = match result.hand {
            Some(h) => frame
                .hand(h)
                .map(|o| o.near_frame_edge(config.edge_margin))
                .unwrap_or(false),
            None => {
                frame
                    .left
                    .as_ref()
                    .map(|o| o.near_frame_edge(config.edge_margin))
                    .unwrap_or(false)
                    || frame
                        .right
                        .as_ref()
                        .map(|o| o.near_frame_edge(config.edge_margin))
                        .unwrap_or(false)
            }
        };
        if near_edge {
            result.confidence *= config.edge_penalty;
        }

        // Temporal stability over the history window
        if self.history.stability(result.class) < config.min_temporal_stability {
            return None;
        }

        // Velocity stability of the driving hand(s)
        let velocity_stability = match result.hand {
            Some(Handedness::Left) => self.left.velocity_stability(),
            Some(Handedness::Right) => self.right.velocity_stability(),
            None => self
                .left
                .velocity_stability()
                .min(self.right.velocity_stability()),
        };
        if velocity_stability < config.min_velocity_stability {
            return None;
        }

        // Absolute floor applies after every penalty
        if result.confidence < config.confidence_floor {
            return None;
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{
        HandObservation, Point3, INDEX_TIP, NUM_LANDMARKS, THUMB_TIP,
    };

    fn neutral_hand(handedness: Handedness, ts: f64) -> HandObservation {
        // Fingers spread: tips well away from the wrist at (0.5, 0.8)
        let mut landmarks = [Point3::new(0.5, 0.5, 0.0); NUM_LANDMARKS];
        landmarks[crate::landmarks::WRIST] = Point3::new(0.5, 0.8, 0.0);
        // Extended finger geometry: MCP/PIP between wrist and tip
        let tips = crate::landmarks::FINGERTIPS;
        let pips = crate::landmarks::FINGER_PIPS;
        for (i, (&tip, &pip)) in tips.iter().zip(pips.iter()).enumerate() {
            let x = 0.34 + i as f32 * 0.08;
            landmarks[tip] = Point3::new(x, 0.35, 0.0);
            landmarks[pip] = Point3::new(x, 0.55, 0.0);
        }
        for (i, &mcp) in crate::landmarks::FINGER_MCPS.iter().enumerate() {
            landmarks[mcp] = Point3::new(0.42 + i as f32 * 0.08, 0.65, 0.0);
        }
        HandObservation {
            landmarks,
            handedness,
            confidence: 0.95,
            timestamp_ms: ts,
        }
    }

    fn pinched_hand(handedness: Handedness, ts: f64) -> HandObservation {
        let mut hand = neutral_hand(handedness, ts);
        hand.landmarks[THUMB_TIP] = Point3::new(0.5, 0.45, 0.0);
        hand.landmarks[INDEX_TIP] = Point3::new(0.53, 0.45, 0.0);
        hand
    }

    fn frame_with(hand: HandObservation) -> HandFrame {
        let ts = hand.timestamp_ms;
        match hand.handedness {
            Handedness::Left => HandFrame {
                left: Some(hand),
                right: None,
                timestamp_ms: ts,
            },
            Handedness::Right => HandFrame {
                left: None,
                right: Some(hand),
                timestamp_ms: ts,
            },
        }
    }

    fn feed_frames(
        recognizer: &mut Recognizer,
        make: impl Fn(f64) -> HandFrame,
        count: usize,
    ) -> Vec<GestureResult> {
        let mut last = Vec::new();
        for i in 0..count {
            last = recognizer.process_frame(&make(i as f64 * 33.0));
        }
        last
    }

    #[test]
    fn steady_pinch_is_recognized() {
        let mut recognizer = Recognizer::new(RecognizerConfig::default());
        let results = feed_frames(
            &mut recognizer,
            |ts| frame_with(pinched_hand(Handedness::Right, ts)),
            6,
        );
        assert!(
            results.iter().any(|r| r.class == GestureClass::Pinch),
            "got {results:?}"
        );
        let pinch = results.iter().find(|r| r.class == GestureClass::Pinch).unwrap();
        assert_eq!(pinch.hand, Some(Handedness::Right));
        assert!(pinch.confidence >= 0.6);
        assert!(pinch.payload.distance.unwrap() < 0.08);
    }

    #[test]
    fn open_palm_is_recognized() {
        let mut recognizer = Recognizer::new(RecognizerConfig::default());
        let results = feed_frames(
            &mut recognizer,
            |ts| frame_with(neutral_hand(Handedness::Left, ts)),
            6,
        );
        assert!(
            results.iter().any(|r| r.class == GestureClass::PalmOpen),
            "got {results:?}"
        );
    }

    #[test]
    fn edge_penalty_drops_marginal_confidence() {
        let mut recognizer = Recognizer::new(RecognizerConfig::default());
        // Tracker confidence 0.7: passes the floor normally (0.7 ≥ 0.6) but
        // not after the 0.8 edge penalty (0.56 < 0.6)
        let results = feed_frames(
            &mut recognizer,
            |ts| {
                let mut hand = pinched_hand(Handedness::Right, ts);
                hand.confidence = 0.7;
                // Keep the pinch geometry but park it inside the 5% margin
                hand.landmarks[THUMB_TIP] = Point3::new(0.04, 0.45, 0.0);
                hand.landmarks[INDEX_TIP] = Point3::new(0.07, 0.45, 0.0);
                frame_with(hand)
            },
            6,
        );
        assert!(
            !results.iter().any(|r| r.class == GestureClass::Pinch),
            "edge-penalized pinch should be dropped"
        );
    }

    #[test]
    fn low_confidence_is_dropped_silently() {
        let mut recognizer = Recognizer::new(RecognizerConfig::default());
        let results = feed_frames(
            &mut recognizer,
            |ts| {
                let mut hand = pinched_hand(Handedness::Right, ts);
                hand.confidence = 0.59;
                frame_with(hand)
            },
            6,
        );
        assert!(results.is_empty(), "got {results:?}");
    }

    #[test]
    fn history_ring_stays_bounded() {
        let mut history = GestureHistory::new(50, 1_000.0);
        for i in 0..200 {
            history.push(i as f64, GestureClass::Fist);
        }
        assert!(history.entries.len() <= 50);
    }

    #[test]
    fn stale_history_entries_age_out() {
        let mut history = GestureHistory::new(50, 1_000.0);
        history.push(0.0, GestureClass::Fist);
        history.push(2_000.0, GestureClass::Pinch);
        // The fist entry is older than the 1 s window
        assert_eq!(history.stability(GestureClass::Pinch), 1.0);
    }
}
