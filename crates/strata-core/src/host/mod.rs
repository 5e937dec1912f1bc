//! Audio host: output graph ownership, sample clock, lifecycle gate
//!
//! One host per session. The host refuses to initialize outside a
//! user-triggered code path, owns the output stream (or the offline pump),
//! and publishes a monotonic clock plus 1 Hz-sampled stats.

mod config;
mod cpal_backend;
mod stats;

pub use config::{BufferSize, HostConfig};
pub use stats::HostStats;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::engine::{
    AudioEngine, CommandSender, DeckAtomics, EngineAtomics, EngineHandles, EventReceiver,
    RecordCollector, MAX_BUFFER_SIZE,
};
use crate::error::{EngineError, EngineResult};
use crate::types::{StereoBuffer, NUM_DECKS};

/// How `initialize` was reached
///
/// The platform requires a user action before audio may start; callers pass
/// `UserGesture` only from code paths rooted in real user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    UserGesture,
    Programmatic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HostState {
    Uninitialized,
    Ready,
    Disposed,
}

#[derive(Debug)]
enum Backend {
    /// Caller-driven pump for tests and headless rendering
    Offline {
        engine: Box<AudioEngine>,
        scratch: StereoBuffer,
        block: usize,
    },
    /// Live device stream (the engine lives inside the callback)
    Stream(cpal_backend::StreamBackend),
}

/// The audio host
#[derive(Debug)]
pub struct AudioHost {
    config: HostConfig,
    state: HostState,
    backend: Option<Backend>,
    handles: Option<EngineHandles>,
    sample_rate: u32,
    buffer_size: u32,
    dropouts: Arc<AtomicU64>,
}

impl AudioHost {
    /// A configured but inert host; nothing touches the device until
    /// [`AudioHost::initialize`]
    pub fn new(config: HostConfig) -> Self {
        Self {
            config,
            state: HostState::Uninitialized,
            backend: None,
            handles: None,
            sample_rate: 0,
            buffer_size: 0,
            dropouts: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Bring the output graph up. Fails with `UserActivationRequired` unless
    /// reached from a user gesture; fails with `AlreadyInitialized` when
    /// already Ready. On failure the state is unchanged.
    pub fn initialize(&mut self, activation: Activation) -> EngineResult<()> {
        match self.state {
            HostState::Disposed => return Err(EngineError::Disposed),
            HostState::Ready => return Err(EngineError::AlreadyInitialized),
            HostState::Uninitialized => {}
        }
        if activation != Activation::UserGesture {
            return Err(EngineError::UserActivationRequired);
        }

        if self.config.offline {
            let block = self
                .config
                .buffer_size
                .frames()
                .unwrap_or(256)
                .min(MAX_BUFFER_SIZE as u32) as usize;
            let (engine, handles) = AudioEngine::new(self.config.sample_rate);
            self.sample_rate = self.config.sample_rate;
            self.buffer_size = block as u32;
            self.backend = Some(Backend::Offline {
                engine: Box::new(engine),
                scratch: StereoBuffer::silence(MAX_BUFFER_SIZE),
                block,
            });
            self.handles = Some(handles);
        } else {
            let sample_rate = cpal_backend::probe_output_rate(&self.config)?;
            let (engine, handles) = AudioEngine::new(sample_rate);
            let stream =
                cpal_backend::start_stream(&self.config, engine, self.dropouts.clone())?;
            self.sample_rate = stream.sample_rate;
            self.buffer_size = stream.buffer_size;
            self.backend = Some(Backend::Stream(stream));
            self.handles = Some(handles);
        }

        self.state = HostState::Ready;
        log::info!(
            "audio host ready: {}Hz, {} frame blocks{}",
            self.sample_rate,
            self.buffer_size,
            if self.config.offline { " (offline)" } else { "" }
        );
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.state == HostState::Ready
    }

    pub fn is_disposed(&self) -> bool {
        self.state == HostState::Disposed
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    /// Monotonic seconds derived from frames the engine has processed
    pub fn now(&self) -> f64 {
        match (&self.handles, self.sample_rate) {
            (Some(handles), rate) if rate > 0 => {
                handles.engine_atomics.frames_processed() as f64 / rate as f64
            }
            _ => 0.0,
        }
    }

    /// Count an underrun reported by the device layer
    pub fn note_dropout(&self) {
        self.dropouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Stats snapshot for the 1 Hz performance tick
    pub fn stats(&self) -> HostStats {
        let Some(handles) = &self.handles else {
            return HostStats::idle();
        };
        let base_latency_ms = if self.sample_rate > 0 {
            self.buffer_size as f32 / self.sample_rate as f32 * 1000.0
        } else {
            0.0
        };
        HostStats {
            sample_rate: self.sample_rate,
            buffer_size: self.buffer_size,
            base_latency_ms,
            output_latency_ms: base_latency_ms * 2.0,
            active_nodes: handles.engine_atomics.active_nodes(),
            dropouts: self.dropouts.load(Ordering::Relaxed),
            frames_processed: handles.engine_atomics.frames_processed(),
        }
    }

    // ── Engine access ────────────────────────────────────────────

    pub fn commands(&mut self) -> EngineResult<&mut CommandSender> {
        self.handles
            .as_mut()
            .map(|h| &mut h.commands)
            .ok_or(EngineError::NotReady)
    }

    pub fn events(&mut self) -> Option<&mut EventReceiver> {
        self.handles.as_mut().map(|h| &mut h.events)
    }

    pub fn recording(&mut self) -> Option<&mut RecordCollector> {
        self.handles.as_mut().map(|h| &mut h.recording)
    }

    pub fn deck_atomics(&self) -> Option<&[Arc<DeckAtomics>; NUM_DECKS]> {
        self.handles.as_ref().map(|h| &h.deck_atomics)
    }

    pub fn engine_atomics(&self) -> Option<&Arc<EngineAtomics>> {
        self.handles.as_ref().map(|h| &h.engine_atomics)
    }

    // ── Offline pump ─────────────────────────────────────────────

    /// Render one block into `out` (offline hosts only)
    pub fn render_block(&mut self, out: &mut StereoBuffer) -> EngineResult<()> {
        match &mut self.backend {
            Some(Backend::Offline { engine, .. }) => {
                engine.process(out);
                Ok(())
            }
            Some(Backend::Stream(_)) => Err(EngineError::StreamError(
                "render_block is only available on offline hosts".into(),
            )),
            None => Err(EngineError::NotReady),
        }
    }

    /// Advance the offline clock by `frames`, discarding the audio
    pub fn render(&mut self, frames: usize) -> EngineResult<()> {
        match &mut self.backend {
            Some(Backend::Offline {
                engine,
                scratch,
                block,
            }) => {
                let mut remaining = frames;
                while remaining > 0 {
                    let chunk = remaining.min(*block);
                    scratch.set_len_from_capacity(chunk);
                    engine.process(scratch);
                    remaining -= chunk;
                }
                Ok(())
            }
            Some(Backend::Stream(_)) => Err(EngineError::StreamError(
                "render is only available on offline hosts".into(),
            )),
            None => Err(EngineError::NotReady),
        }
    }

    /// Tear everything down. Idempotent; the host cannot be re-initialized.
    pub fn dispose(&mut self) {
        if self.state == HostState::Disposed {
            return;
        }
        self.backend = None; // dropping the stream stops audio
        self.handles = None;
        self.state = HostState::Disposed;
        log::info!("audio host disposed");
    }
}
