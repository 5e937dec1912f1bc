//! Gesture-to-control mapping profiles
//!
//! Mapping tables are data: serde structs that round-trip through YAML.
//! Exactly one profile is active in the mapper at a time.

use serde::{Deserialize, Serialize};
use strata_core::dsp::EqBand;
use strata_core::types::{DeckId, Stem};

use crate::landmarks::Handedness;
use crate::recognize::GestureClass;

/// Which hand(s) a mapping listens to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum HandRequirement {
    Left,
    Right,
    /// Two-hand gestures only
    Both,
    #[default]
    Any,
}

impl HandRequirement {
    /// Does a gesture from `hand` (None = two-hand) satisfy this requirement?
    pub fn matches(&self, hand: Option<Handedness>) -> bool {
        match (self, hand) {
            (HandRequirement::Any, _) => true,
            (HandRequirement::Both, None) => true,
            (HandRequirement::Left, Some(Handedness::Left)) => true,
            (HandRequirement::Right, Some(Handedness::Right)) => true,
            _ => false,
        }
    }
}

/// The kind of control a mapping drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlKind {
    Volume,
    Mute,
    Solo,
    Pan,
    Eq { band: EqBand },
    Filter,
    Crossfader,
    Cue { slot: usize },
    EffectSend,
    StemMix,
}

/// What the control acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlTarget {
    Stem { deck: DeckId, stem: Stem },
    Deck { deck: DeckId },
    Master,
    Crossfader,
}

/// How gesture values become control changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MappingMode {
    /// Scalar payload drives the control every frame
    #[default]
    Continuous,
    /// Each gesture onset flips a latch
    Toggle,
    /// Each gesture onset fires once
    Trigger,
}

/// Deadzone/sensitivity/smoothing knobs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingParams {
    /// Scale about the control center, clamped to [0.1, 10]
    pub sensitivity: f32,
    /// Radius around center where input is ignored, clamped to [0, 0.3]
    pub deadzone: f32,
    /// 0 = raw, 1 = heavily smoothed; α = 1 − smoothing
    pub smoothing: f32,
}

impl Default for MappingParams {
    fn default() -> Self {
        Self {
            sensitivity: 1.0,
            deadzone: 0.05,
            smoothing: 0.2,
        }
    }
}

impl MappingParams {
    /// Clamp every knob into its documented range
    pub fn clamped(self) -> Self {
        Self {
            sensitivity: self.sensitivity.clamp(0.1, 10.0),
            deadzone: self.deadzone.clamp(0.0, 0.3),
            smoothing: self.smoothing.clamp(0.0, 1.0),
        }
    }
}

/// One gesture→control rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GestureMapping {
    pub id: String,
    pub gesture: GestureClass,
    #[serde(default)]
    pub hand: HandRequirement,
    pub control: ControlKind,
    pub target: ControlTarget,
    #[serde(default)]
    pub mode: MappingMode,
    #[serde(default)]
    pub params: MappingParams,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// A named, ordered set of mappings; exactly one profile is active
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MappingProfile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mappings: Vec<GestureMapping>,
}

impl MappingProfile {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            mappings: Vec::new(),
        }
    }

    pub fn with_mapping(mut self, mapping: GestureMapping) -> Self {
        self.mappings.push(mapping);
        self
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Parse from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// The built-in starter profile: right pinch rides Deck A vocals volume,
    /// left pinch rides Deck B vocals, spread drives the crossfader, right
    /// fist mutes Deck A drums
    pub fn default_profile() -> Self {
        Self::new("default", "Default performance profile")
            .with_mapping(GestureMapping {
                id: "pinch-r-vocals-a".into(),
                gesture: GestureClass::Pinch,
                hand: HandRequirement::Right,
                control: ControlKind::Volume,
                target: ControlTarget::Stem {
                    deck: DeckId::A,
                    stem: Stem::Vocals,
                },
                mode: MappingMode::Continuous,
                params: MappingParams::default(),
                priority: 0,
                enabled: true,
            })
            .with_mapping(GestureMapping {
                id: "pinch-l-vocals-b".into(),
                gesture: GestureClass::Pinch,
                hand: HandRequirement::Left,
                control: ControlKind::Volume,
                target: ControlTarget::Stem {
                    deck: DeckId::B,
                    stem: Stem::Vocals,
                },
                mode: MappingMode::Continuous,
                params: MappingParams::default(),
                priority: 0,
                enabled: true,
            })
            .with_mapping(GestureMapping {
                id: "spread-crossfader".into(),
                gesture: GestureClass::Spread,
                hand: HandRequirement::Both,
                control: ControlKind::Crossfader,
                target: ControlTarget::Crossfader,
                mode: MappingMode::Continuous,
                params: MappingParams {
                    deadzone: 0.0,
                    ..MappingParams::default()
                },
                priority: 0,
                enabled: true,
            })
            .with_mapping(GestureMapping {
                id: "fist-r-mute-drums-a".into(),
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
            })
    }
}
