//! Stem player: five-stream sample-aligned transport
//!
//! A [`StemPlayer`] plays a [`crate::stems::StemBundle`] so the four stems
//! and the original reference stay sample-aligned at all times. Per-stem
//! mute/solo/volume/pan/EQ, a stems-vs-original crossfade, and a drift
//! monitor that re-anchors the transports if they ever diverge past 5 ms.

mod drift;
mod stem_player;

pub use drift::{DriftDecision, DriftMonitor, DRIFT_CHECK_INTERVAL_MS, MAX_DRIFT_MS};
pub use stem_player::{StemControls, StemPlayer};
