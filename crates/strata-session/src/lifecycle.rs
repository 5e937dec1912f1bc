//! Initialization state machine
//!
//! ```text
//! Uninitialized --initialize--> [user-activation check]
//!   failure: UserActivationRequired (stay Uninitialized)
//!   success: HostReady --initialize_decks--> DecksReady
//!            --connect_master_bus--> Ready
//!   step failure: DegradedInit (partial state retained for retry)
//!   dispose: --> Disposed (terminal)
//! ```

/// Where the session sits in its bring-up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InitPhase {
    #[default]
    Uninitialized,
    HostReady,
    DecksReady,
    Ready,
    /// A bring-up step failed; retained state allows a retry
    DegradedInit,
    /// Terminal
    Disposed,
}

impl InitPhase {
    /// The audio host is up in this phase
    pub fn host_up(&self) -> bool {
        matches!(self, InitPhase::HostReady | InitPhase::DecksReady | InitPhase::Ready)
    }

    pub fn is_ready(&self) -> bool {
        *self == InitPhase::Ready
    }

    pub fn is_disposed(&self) -> bool {
        *self == InitPhase::Disposed
    }
}
