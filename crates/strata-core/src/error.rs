//! Engine error types

use thiserror::Error;

/// Errors surfaced by the audio engine and its host
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    // ── Lifecycle ────────────────────────────────────────────────

    /// Audio may only start from a user-triggered code path
    #[error("Click to start audio (user activation required)")]
    UserActivationRequired,

    /// Operation requires an initialized host
    #[error("Audio host is not ready")]
    NotReady,

    /// Host was already initialized
    #[error("Audio host is already initialized")]
    AlreadyInitialized,

    /// Session was disposed; no further operations are possible
    #[error("Session has been disposed")]
    Disposed,

    // ── Validation ───────────────────────────────────────────────

    /// Numeric parameter outside its documented range
    #[error("{param} out of range: {value} (allowed {min}..={max})")]
    OutOfRange {
        param: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Deck index outside the fixed deck set
    #[error("Invalid deck id: {0}")]
    InvalidDeckId(usize),

    /// Stem bundle streams disagree on frame count or sample rate
    #[error("Stem bundle misaligned: {0}")]
    StemMisaligned(String),

    /// Operation requires a known BPM
    #[error("No BPM available for deck {0}")]
    NoBpm(&'static str),

    // ── Resource ─────────────────────────────────────────────────

    /// Signal node could not be created
    #[error("Node creation failed: {0}")]
    NodeCreationFailed(String),

    /// The audio domain missed a buffer deadline
    #[error("Audio buffer underrun")]
    BufferUnderrun,

    /// Output stream could not be built or started
    #[error("Audio stream error: {0}")]
    StreamError(String),

    /// No audio output device available
    #[error("No audio output devices found")]
    NoDevices,

    // ── State ────────────────────────────────────────────────────

    /// A recording session is already active
    #[error("Recording is already active")]
    AlreadyRecording,

    /// Stop requested without an active recording
    #[error("No recording is active")]
    NotRecording,

    /// Beat sync requires a known BPM on both decks
    #[error("Beat sync requires BPM on both decks")]
    SyncRequiresBothBpm,
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    /// Validation errors are recovered locally (clamp or reject the one
    /// command); everything else propagates to the lifecycle caller.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            EngineError::OutOfRange { .. }
                | EngineError::InvalidDeckId(_)
                | EngineError::StemMisaligned(_)
                | EngineError::NoBpm(_)
        )
    }
}
