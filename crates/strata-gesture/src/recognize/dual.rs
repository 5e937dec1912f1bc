//! Two-hand classification
//!
//! Requires both hands in frame. Confidence is scaled by how close the
//! hand separation sits to the optimal ~0.3 of frame width:
//! `max(0.5, 1 − |d − 0.3| / 0.3)`.

use std::collections::VecDeque;

use crate::landmarks::{HandFrame, INDEX_TIP};

use super::single::SingleHandState;
use super::{GestureClass, GesturePayload, GestureResult, RecognizerConfig};

/// Frames of separation/angle history used for the monotonic tests
const TREND_WINDOW: usize = 6;

/// Minimum monotonic frames for spread/rotate
const TREND_MIN_FRAMES: usize = 3;

/// Normalization span for inter-hand distance payloads
const SEPARATION_SPAN: f32 = 0.8;

#[derive(Debug)]
pub struct DualHandState {
    /// Recent (timestamp_ms, separation, angle) samples
    trend: VecDeque<(f64, f32, f32)>,
}

impl DualHandState {
    pub fn new() -> Self {
        Self {
            trend: VecDeque::with_capacity(TREND_WINDOW),
        }
    }

    /// A hand left the frame: two-hand trends no longer mean anything
    pub fn reset(&mut self) {
        self.trend.clear();
    }

    /// Classify the two-hand gestures present in this frame
    pub fn classify(
        &mut self,
        frame: &HandFrame,
        config: &RecognizerConfig,
        left: &SingleHandState,
        right: &SingleHandState,
    ) -> Vec<GestureResult> {
        let (Some(left_obs), Some(right_obs)) = (&frame.left, &frame.right) else {
            self.reset();
            return Vec::new();
        };

        let left_tip = left_obs.landmarks[INDEX_TIP];
        let right_tip = right_obs.landmarks[INDEX_TIP];
        let separation = left_tip.distance_2d(&right_tip);
        let angle = (right_tip.y - left_tip.y).atan2(right_tip.x - left_tip.x);

        while self.trend.len() >= TREND_WINDOW {
            self.trend.pop_front();
        }
        self.trend.push_back((frame.timestamp_ms, separation, angle));

        // Separation quality multiplier
        let separation_factor = (1.0
            - (separation - config.optimal_separation).abs() / config.optimal_separation)
            .max(0.5);
        let base_confidence =
            left_obs.confidence.min(right_obs.confidence) * separation_factor;

        let base = GestureResult {
            class: GestureClass::TwoHandPinch,
            hand: None,
            confidence: base_confidence,
            payload: GesturePayload {
                value: (separation / SEPARATION_SPAN).clamp(0.0, 1.0),
                distance: Some(separation),
                angle: Some(angle),
                velocity: (0.0, 0.0),
            },
            timestamp_ms: frame.timestamp_ms,
        };

        let mut results = Vec::new();

        // Both hands pinching concurrently
        if left.is_pinching() && right.is_pinching() {
            results.push(base.clone());
        }

        // Monotonic separation growth
        if self.monotonic_spread() {
            results.push(GestureResult {
                class: GestureClass::Spread,
                ..base.clone()
            });
        }

        // Monotonic rotation of the inter-hand vector past the threshold
        if let Some(delta) = self.monotonic_rotation() {
            if delta.abs() > config.rotate_min_angle {
                results.push(GestureResult {
                    class: GestureClass::TwoHandRotate,
                    payload: GesturePayload {
                        // Map the running angle onto [0, 1] for control use
                        value: ((angle + std::f32::consts::PI)
                            / (2.0 * std::f32::consts::PI))
                            .clamp(0.0, 1.0),
                        distance: Some(separation),
                        angle: Some(angle),
                        velocity: (0.0, 0.0),
                    },
                    ..base
                });
            }
        }

        results
    }

    /// True when separation has strictly increased over the trend window
    fn monotonic_spread(&self) -> bool {
        if self.trend.len() < TREND_MIN_FRAMES {
            return false;
        }
        self.trend
            .iter()
            .zip(self.trend.iter().skip(1))
            .all(|((_, d1, _), (_, d2, _))| d2 > d1)
    }

    /// Total angle change when it has moved in one direction across the
    /// window; None when the rotation reversed
    fn monotonic_rotation(&self) -> Option<f32> {
        if self.trend.len() < TREND_MIN_FRAMES {
            return None;
        }
        let deltas: Vec<f32> = self
            .trend
            .iter()
            .zip(self.trend.iter().skip(1))
            .map(|((_, _, a1), (_, _, a2))| wrap_angle(a2 - a1))
            .collect();
        let all_positive = deltas.iter().all(|&d| d > 0.0);
        let all_negative = deltas.iter().all(|&d| d < 0.0);
        if all_positive || all_negative {
            Some(deltas.iter().sum())
        } else {
            None
        }
    }
}

/// Wrap an angle difference into (−π, π]
fn wrap_angle(mut delta: f32) -> f32 {
    use std::f32::consts::PI;
    while delta > PI {
        delta -= 2.0 * PI;
    }
    while delta <= -PI {
        delta += 2.0 * PI;
    }
    delta
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{HandObservation, Handedness, Point3, NUM_LANDMARKS};

    fn hand_at(x: f32, y: f32, handedness: Handedness, ts: f64) -> HandObservation {
        let mut landmarks = [Point3::new(x, y, 0.0); NUM_LANDMARKS];
        landmarks[INDEX_TIP] = Point3::new(x, y, 0.0);
        HandObservation {
            landmarks,
            handedness,
            confidence: 0.9,
            timestamp_ms: ts,
        }
    }

    fn frame(lx: f32, ly: f32, rx: f32, ry: f32, ts: f64) -> HandFrame {
        HandFrame {
            left: Some(hand_at(lx, ly, Handedness::Left, ts)),
            right: Some(hand_at(rx, ry, Handedness::Right, ts)),
            timestamp_ms: ts,
        }
    }

    fn classify_all(frames: &[HandFrame]) -> Vec<Vec<GestureResult>> {
        let config = RecognizerConfig::default();
        let mut dual = DualHandState::new();
        let left = SingleHandState::new();
        let right = SingleHandState::new();
        frames
            .iter()
            .map(|f| dual.classify(f, &config, &left, &right))
            .collect()
    }

    #[test]
    fn spread_fires_on_growing_separation() {
        let frames: Vec<HandFrame> = (0..6)
            .map(|i| {
                let gap = 0.2 + i as f32 * 0.05;
                frame(0.5 - gap / 2.0, 0.5, 0.5 + gap / 2.0, 0.5, i as f64 * 33.0)
            })
            .collect();
        let all = classify_all(&frames);
        assert!(all
            .last()
            .unwrap()
            .iter()
            .any(|r| r.class == GestureClass::Spread));
    }

    #[test]
    fn static_hands_produce_no_trend_gestures() {
        let frames: Vec<HandFrame> = (0..6)
            .map(|i| frame(0.35, 0.5, 0.65, 0.5, i as f64 * 33.0))
            .collect();
        let all = classify_all(&frames);
        assert!(all.last().unwrap().is_empty());
    }

    #[test]
    fn rotation_fires_on_monotonic_angle_change() {
        // Right hand orbits the left one
        let frames: Vec<HandFrame> = (0..8)
            .map(|i| {
                let theta = i as f32 * 0.12;
                let (sin, cos) = theta.sin_cos();
                frame(0.4, 0.5, 0.4 + 0.3 * cos, 0.5 + 0.3 * sin, i as f64 * 33.0)
            })
            .collect();
        let all = classify_all(&frames);
        assert!(all
            .last()
            .unwrap()
            .iter()
            .any(|r| r.class == GestureClass::TwoHandRotate));
    }

    #[test]
    fn separation_factor_rewards_optimal_distance() {
        let config = RecognizerConfig::default();
        let mut dual = DualHandState::new();
        let left = SingleHandState::new();
        let right = SingleHandState::new();

        // Optimal separation (0.3): full confidence
        let f = frame(0.35, 0.5, 0.65, 0.5, 0.0);
        dual.classify(&f, &config, &left, &right);
        // Cramped hands (0.05 apart): factor bottoms out at 0.5
        let cramped = frame(0.47, 0.5, 0.52, 0.5, 33.0);
        dual.classify(&cramped, &config, &left, &right);

        let optimal_factor: f32 = 1.0 - (0.3f32 - 0.3).abs() / 0.3;
        let cramped_factor: f32 = (1.0 - (0.05f32 - 0.3).abs() / 0.3).max(0.5);
        assert_eq!(optimal_factor, 1.0);
        assert_eq!(cramped_factor, 0.5);
    }

    #[test]
    fn wrap_angle_stays_in_range() {
        use std::f32::consts::PI;
        assert!((wrap_angle(3.0 * PI) - PI).abs() < 1e-5);
        assert!((wrap_angle(-3.0 * PI) - PI).abs() < 1e-5);
        assert_eq!(wrap_angle(0.5), 0.5);
    }
}
