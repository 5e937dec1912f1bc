//! Strata Session - the coordinator over the whole stack
//!
//! A single [`Session`] value owns the audio host, both decks (through the
//! engine), the analysis client, and the gesture pipeline. The control
//! surface is a command/event pair: [`Session::dispatch`] takes typed
//! commands in, subscribers receive typed [`SessionEvent`]s out, and
//! [`Session::snapshot`] exposes the observable state.

mod bus;
mod command;
mod event;
mod lifecycle;
mod session;
mod state;
mod sync;

pub use bus::EventBus;
pub use command::SessionCommand;
pub use event::{SessionEvent, StemControl};
pub use lifecycle::InitPhase;
pub use session::{Session, SessionConfig};
pub use state::{DeckSnapshot, MixerSnapshot, SessionState, SyncStatus};
pub use sync::{SyncBinding, SyncEngine, SyncOutcome};

// The crates behind the session, re-exported for embedders
pub use strata_analysis as analysis;
pub use strata_core as core;
pub use strata_gesture as gesture;
