//! Strata Core - Real-time stem mixing engine
//!
//! The audio half of the strata stack:
//! - Host: cpal output stream (or offline pump), sample clock, stats
//! - DSP nodes: gain, EQ, filter, dynamics, delay, reverb, crossfader
//! - StemPlayer: five-stream sample-aligned transport with drift re-anchoring
//! - Deck: stem player + channel strip + cue points + pitch
//! - Engine: two decks mixed through the crossfader into the master bus,
//!   driven by a lock-free command queue

pub mod deck;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod host;
pub mod player;
pub mod stems;
pub mod types;

pub use error::{EngineError, EngineResult};
pub use types::*;
