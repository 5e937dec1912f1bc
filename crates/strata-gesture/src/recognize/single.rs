//! Single-hand feature extraction and classification

use std::collections::VecDeque;

use crate::landmarks::{
    HandObservation, Point3, FINGERTIPS, FINGER_PIPS, INDEX_TIP, WRIST,
};

use super::{GestureClass, GesturePayload, GestureResult, RecognizerConfig, SwipeDirection};

/// Recent index-tip velocities kept for swipe detection and stability scoring
const VELOCITY_HISTORY: usize = 10;

/// Geometry extracted from one observation
#[derive(Debug, Clone, Copy)]
pub struct HandFeatures {
    /// Thumb-tip to index-tip distance (image plane)
    pub pinch_distance: f32,
    /// Number of extended fingers (tip farther from the wrist than its PIP)
    pub extended_fingers: usize,
    /// All five tips curled in toward the wrist
    pub is_fist: bool,
}

impl HandFeatures {
    pub fn extract(observation: &HandObservation, config: &RecognizerConfig) -> Self {
        let landmarks = &observation.landmarks;
        let wrist = landmarks[WRIST];

        let pinch_distance =
            landmarks[FINGERTIPS[0]].distance_2d(&landmarks[INDEX_TIP]);

        let mut extended = 0;
        let mut curled = 0;
        for (&tip, &pip) in FINGERTIPS.iter().zip(FINGER_PIPS.iter()) {
            let tip_dist = landmarks[tip].distance_2d(&wrist);
            let pip_dist = landmarks[pip].distance_2d(&wrist);
            if tip_dist > pip_dist {
                extended += 1;
            }
            // Extended reference: a straight finger reaches about twice the
            // PIP's distance from the wrist
            let extended_ref = pip_dist * 2.0;
            if tip_dist < extended_ref * config.fist_ratio {
                curled += 1;
            }
        }

        Self {
            pinch_distance,
            extended_fingers: extended,
            is_fist: curled == FINGERTIPS.len(),
        }
    }
}

/// Per-hand recognition state across frames
#[derive(Debug)]
pub struct SingleHandState {
    /// Hysteresis latch: engaged below `pinch_engage`, released above
    /// `pinch_release`
    pinch_active: bool,
    /// (timestamp_ms, index tip) of the previous frame
    last_tip: Option<(f64, Point3)>,
    /// Recent (vx, vy) tip velocities
    velocities: VecDeque<(f32, f32)>,
    /// Consecutive frames the swipe direction has dominated
    swipe_streak: usize,
    swipe_direction: Option<SwipeDirection>,
}

impl SingleHandState {
    pub fn new() -> Self {
        Self {
            pinch_active: false,
            last_tip: None,
            velocities: VecDeque::with_capacity(VELOCITY_HISTORY),
            swipe_streak: 0,
            swipe_direction: None,
        }
    }

    /// The hand left the frame: clear motion state
    pub fn on_hand_lost(&mut self) {
        self.pinch_active = false;
        self.last_tip = None;
        self.velocities.clear();
        self.swipe_streak = 0;
        self.swipe_direction = None;
    }

    /// Inverse-variance score of recent tip speed, in [0, 1]
    pub fn velocity_stability(&self) -> f32 {
        if self.velocities.len() < 2 {
            return 1.0;
        }
        let speeds: Vec<f32> = self
            .velocities
            .iter()
            .map(|(vx, vy)| (vx * vx + vy * vy).sqrt())
            .collect();
        let mean = speeds.iter().sum::<f32>() / speeds.len() as f32;
        let variance =
            speeds.iter().map(|s| (s - mean) * (s - mean)).sum::<f32>() / speeds.len() as f32;
        1.0 / (1.0 + variance * 10.0)
    }

    pub fn is_pinching(&self) -> bool {
        self.pinch_active
    }

    /// Track motion and classify this observation. At most one gesture per
    /// hand per frame; swipes outrank static poses.
    pub fn classify(
        &mut self,
        observation: &HandObservation,
        config: &RecognizerConfig,
    ) -> Option<GestureResult> {
        let features = HandFeatures::extract(observation, config);
        let tip = observation.landmarks[INDEX_TIP];

        // Velocity from the previous frame
        let velocity = match self.last_tip {
            Some((last_ts, last_tip)) => {
                let dt = ((observation.timestamp_ms - last_ts) / 1000.0) as f32;
                if dt > 0.0 {
                    ((tip.x - last_tip.x) / dt, (tip.y - last_tip.y) / dt)
                } else {
                    (0.0, 0.0)
                }
            }
            None => (0.0, 0.0),
        };
        self.last_tip = Some((observation.timestamp_ms, tip));
        while self.velocities.len() >= VELOCITY_HISTORY {
            self.velocities.pop_front();
        }
        self.velocities.push_back(velocity);

        // Pinch hysteresis
        if self.pinch_active {
            if features.pinch_distance > config.pinch_release {
                self.pinch_active = false;
            }
        } else if features.pinch_distance < config.pinch_engage {
            self.pinch_active = true;
        }

        // Swipe streak bookkeeping
        let (vx, vy) = velocity;
        let speed = (vx * vx + vy * vy).sqrt();
        let direction = if speed > config.swipe_min_velocity {
            Some(if vx.abs() > vy.abs() {
                if vx > 0.0 { SwipeDirection::Right } else { SwipeDirection::Left }
            } else if vy > 0.0 {
                SwipeDirection::Down
            } else {
                SwipeDirection::Up
            })
        } else {
            None
        };
        match (direction, self.swipe_direction) {
            (Some(d), Some(prev)) if d == prev => self.swipe_streak += 1,
            (Some(d), _) => {
                self.swipe_direction = Some(d);
                self.swipe_streak = 1;
            }
            (None, _) => {
                self.swipe_direction = None;
                self.swipe_streak = 0;
            }
        }

        let base = GestureResult {
            class: GestureClass::PalmOpen,
            hand: Some(observation.handedness),
            confidence: observation.confidence,
            payload: GesturePayload {
                value: 0.0,
                distance: None,
                angle: None,
                velocity,
            },
            timestamp_ms: observation.timestamp_ms,
        };

        // Swipe outranks static poses; pinch outranks shape classes
        if let (Some(direction), true) =
            (self.swipe_direction, self.swipe_streak >= config.swipe_min_frames)
        {
            return Some(GestureResult {
                class: GestureClass::Swipe(direction),
                ..base
            });
        }
        if self.pinch_active {
            return Some(GestureResult {
                class: GestureClass::Pinch,
                payload: GesturePayload {
                    value: (features.pinch_distance / config.pinch_release).clamp(0.0, 1.0),
                    distance: Some(features.pinch_distance),
                    angle: None,
                    velocity,
                },
                ..base
            });
        }
        if features.is_fist {
            return Some(GestureResult {
                class: GestureClass::Fist,
                ..base
            });
        }
        if features.extended_fingers >= config.palm_min_extended {
            return Some(GestureResult {
                class: GestureClass::PalmOpen,
                payload: GesturePayload {
                    value: features.extended_fingers as f32 / 5.0,
                    distance: None,
                    angle: None,
                    velocity,
                },
                ..base
            });
        }
        if features.extended_fingers > 0 {
            return Some(GestureResult {
                class: GestureClass::FingerCount(features.extended_fingers as u8),
                ..base
            });
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{Handedness, NUM_LANDMARKS};

    fn hand_with(landmarks: [Point3; NUM_LANDMARKS], ts: f64) -> HandObservation {
        HandObservation {
            landmarks,
            handedness: Handedness::Right,
            confidence: 0.9,
            timestamp_ms: ts,
        }
    }

    fn curled_hand(ts: f64) -> HandObservation {
        let mut landmarks = [Point3::new(0.5, 0.6, 0.0); NUM_LANDMARKS];
        landmarks[WRIST] = Point3::new(0.5, 0.8, 0.0);
        for (&tip, &pip) in FINGERTIPS.iter().zip(FINGER_PIPS.iter()) {
            // PIPs out at 0.2 from the wrist, tips curled back to 0.05
            landmarks[pip] = Point3::new(0.5, 0.6, 0.0);
            landmarks[tip] = Point3::new(0.5, 0.75, 0.0);
        }
        hand_with(landmarks, ts)
    }

    #[test]
    fn fist_features() {
        let config = RecognizerConfig::default();
        let features = HandFeatures::extract(&curled_hand(0.0), &config);
        assert!(features.is_fist);
        assert_eq!(features.extended_fingers, 0);
    }

    #[test]
    fn fist_classifies() {
        let config = RecognizerConfig::default();
        let mut state = SingleHandState::new();
        let result = state.classify(&curled_hand(0.0), &config).unwrap();
        assert_eq!(result.class, GestureClass::Fist);
    }

    #[test]
    fn pinch_hysteresis_holds_through_wide_openings() {
        let config = RecognizerConfig::default();
        let mut state = SingleHandState::new();

        let mut landmarks = [Point3::new(0.5, 0.5, 0.0); NUM_LANDMARKS];
        landmarks[WRIST] = Point3::new(0.5, 0.8, 0.0);
        // Engage: tips 0.03 apart
        landmarks[FINGERTIPS[0]] = Point3::new(0.50, 0.4, 0.0);
        landmarks[INDEX_TIP] = Point3::new(0.53, 0.4, 0.0);
        let result = state.classify(&hand_with(landmarks, 0.0), &config).unwrap();
        assert_eq!(result.class, GestureClass::Pinch);

        // Open to 0.3: still inside the hysteresis band, still a pinch
        landmarks[INDEX_TIP] = Point3::new(0.80, 0.4, 0.0);
        let result = state.classify(&hand_with(landmarks, 33.0), &config).unwrap();
        assert_eq!(result.class, GestureClass::Pinch);
        assert!(result.payload.value > 0.5);

        // Open past the release threshold: pinch ends
        landmarks[INDEX_TIP] = Point3::new(0.99, 0.4, 0.0);
        let result = state.classify(&hand_with(landmarks, 66.0), &config);
        assert!(result.map(|r| r.class != GestureClass::Pinch).unwrap_or(true));
    }

    #[test]
    fn swipe_requires_sustained_direction() {
        let config = RecognizerConfig::default();
        let mut state = SingleHandState::new();

        // Move the whole hand right at ~1.2 units/s over 33 ms frames
        let mut result = None;
        for i in 0..6 {
            let mut landmarks = [Point3::new(0.2 + i as f32 * 0.04, 0.5, 0.0); NUM_LANDMARKS];
            landmarks[WRIST] = Point3::new(0.2 + i as f32 * 0.04, 0.8, 0.0);
            result = state.classify(&hand_with(landmarks, i as f64 * 33.0), &config);
        }
        let result = result.unwrap();
        assert_eq!(result.class, GestureClass::Swipe(SwipeDirection::Right));
        assert!(result.payload.velocity.0 > config.swipe_min_velocity);
    }

    #[test]
    fn velocity_stability_is_high_for_steady_motion() {
        let config = RecognizerConfig::default();
        let mut state = SingleHandState::new();
        for i in 0..8 {
            let landmarks = [Point3::new(0.2 + i as f32 * 0.01, 0.5, 0.0); NUM_LANDMARKS];
            state.classify(&hand_with(landmarks, i as f64 * 33.0), &config);
        }
        assert!(state.velocity_stability() > 0.5);
    }
}
