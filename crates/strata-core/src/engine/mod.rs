//! Audio engine: decks, crossfader, master bus, command queue, recorder

mod atomics;
mod command;
mod engine;
mod recorder;

pub use atomics::{DeckAtomics, EngineAtomics};
pub use command::{
    command_channel, CommandReceiver, CommandSender, EngineCommand, EngineEvent,
    COMMAND_QUEUE_CAPACITY,
};
pub use engine::{AudioEngine, EngineHandles, EventReceiver, DEFAULT_BUFFER_SIZE, MAX_BUFFER_SIZE};
pub use recorder::{record_channel, RecordCollector, RecordTap, RecordingBlob, RECORD_RING_FRAMES};
