//! Event fan-out
//!
//! Subscribers get an unbounded channel each; events are delivered in
//! dispatch order. Listeners run in the control domain and can never starve
//! the audio thread. Dead subscribers are pruned on the next emit.

use crossbeam::channel::{unbounded, Receiver, Sender};

use crate::event::SessionEvent;

/// Fan-out hub for session events
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Vec<Sender<SessionEvent>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber
    pub fn subscribe(&mut self) -> Receiver<SessionEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Deliver an event to every live subscriber
    pub fn emit(&mut self, event: SessionEvent) {
        self.subscribers
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
