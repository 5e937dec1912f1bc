//! Analysis client service
//!
//! A dedicated service thread owns the pending-request table and the worker
//! handle. Callers get a [`PendingAnalysis`] backed by a oneshot receiver
//! that can be awaited or blocked on. The service:
//!
//! - times requests out (default 3 s) and resolves them with `Timeout`
//! - dedupes identical concurrent requests by content hash (one worker run,
//!   every waiter resolved by the one response)
//! - discards late or unknown response ids
//! - on worker crash rejects all pending with `WorkerLost` and respawns
//!   lazily on the next request; a second consecutive crash switches the
//!   client into fallback mode, where requests resolve immediately with
//!   sentinel results (BPM 0, confidence 0)

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use tokio::sync::oneshot;

use crate::error::AnalysisError;
use crate::protocol::{AnalysisOptions, AnalysisRequest, AnalysisResponse, AnalysisResult};
use crate::worker::{Analyzer, DefaultAnalyzer, WorkerHandle};

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Service loop tick (timeout reaping granularity)
const TICK: Duration = Duration::from_millis(25);

/// Consecutive worker losses before permanent fallback
const MAX_WORKER_LOSSES: u32 = 2;

type AnalysisReply = Result<AnalysisResult, AnalysisError>;

enum ClientCommand {
    Submit {
        id: u64,
        samples: Arc<Vec<f32>>,
        sample_rate: u32,
        options: AnalysisOptions,
        reply: oneshot::Sender<AnalysisReply>,
    },
    Cancel { id: u64 },
    Shutdown,
}

/// A request in flight; await it or block on it
pub struct PendingAnalysis {
    id: u64,
    receiver: oneshot::Receiver<AnalysisReply>,
}

impl PendingAnalysis {
    /// The request id, usable with [`AnalysisClient::cancel`]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Await the result (async contexts)
    pub async fn wait(self) -> AnalysisReply {
        self.receiver.await.unwrap_or(Err(AnalysisError::Cancelled))
    }

    /// Block until the result arrives (sync contexts, tests)
    pub fn blocking_wait(self) -> AnalysisReply {
        self.receiver
            .blocking_recv()
            .unwrap_or(Err(AnalysisError::Cancelled))
    }
}

/// Handle to the analysis service
#[derive(Debug)]
pub struct AnalysisClient {
    commands: Sender<ClientCommand>,
    next_id: Arc<AtomicU64>,
}

impl AnalysisClient {
    /// Client backed by the built-in analyzer (worker spawns lazily on the
    /// first request)
    pub fn new() -> Self {
        Self::with_analyzer(Arc::new(DefaultAnalyzer))
    }

    /// Client backed by a custom analyzer
    pub fn with_analyzer(analyzer: Arc<dyn Analyzer>) -> Self {
        Self::spawn_service(Some(analyzer), false)
    }

    /// Client with no worker at all: every request resolves with the
    /// fallback sentinel result
    pub fn without_worker() -> Self {
        Self::spawn_service(None, true)
    }

    fn spawn_service(analyzer: Option<Arc<dyn Analyzer>>, fallback: bool) -> Self {
        let (command_tx, command_rx) = unbounded();
        // A failed spawn leaves the command channel dead; requests then
        // resolve as Cancelled instead of hanging
        if let Err(e) = std::thread::Builder::new()
            .name("analysis-client".into())
            .spawn(move || run_service(command_rx, analyzer, fallback))
        {
            log::error!("failed to spawn analysis client service: {e}");
        }
        Self {
            commands: command_tx,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Submit samples for analysis
    pub fn analyze(
        &self,
        samples: Vec<f32>,
        sample_rate: u32,
        options: AnalysisOptions,
    ) -> PendingAnalysis {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = oneshot::channel();
        let command = ClientCommand::Submit {
            id,
            samples: Arc::new(samples),
            sample_rate,
            options,
            reply: reply_tx,
        };
        if self.commands.send(command).is_err() {
            // Service gone: the dropped reply sender resolves as Cancelled
            log::warn!("analysis service is down, request {id} dropped");
        }
        PendingAnalysis {
            id,
            receiver: reply_rx,
        }
    }

    /// Cancel a pending request by id; its waiters resolve with `Cancelled`
    /// and any late worker reply is ignored
    pub fn cancel(&self, id: u64) {
        let _ = self.commands.send(ClientCommand::Cancel { id });
    }

    /// Stop the service; all pending requests resolve with `Cancelled`
    pub fn shutdown(&self) {
        let _ = self.commands.send(ClientCommand::Shutdown);
    }
}

impl Default for AnalysisClient {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for AnalysisClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ── Service internals ─────────────────────────────────────────────

struct PendingEntry {
    waiters: Vec<oneshot::Sender<AnalysisReply>>,
    deadline: Instant,
    content_hash: u64,
}

struct ServiceState {
    analyzer: Option<Arc<dyn Analyzer>>,
    worker: Option<WorkerHandle>,
    pending: HashMap<u64, PendingEntry>,
    by_hash: HashMap<u64, u64>,
    consecutive_losses: u32,
    fallback: bool,
}

impl ServiceState {
    fn resolve(&mut self, id: u64, reply: AnalysisReply) {
        if let Some(entry) = self.pending.remove(&id) {
            self.by_hash.remove(&entry.content_hash);
            for waiter in entry.waiters {
                let _ = waiter.send(reply.clone());
            }
        }
    }

    fn reject_all(&mut self, error: AnalysisError) {
        let ids: Vec<u64> = self.pending.keys().copied().collect();
        for id in ids {
            self.resolve(id, Err(error.clone()));
        }
    }

    fn on_submit(
        &mut self,
        id: u64,
        samples: Arc<Vec<f32>>,
        sample_rate: u32,
        options: AnalysisOptions,
        reply: oneshot::Sender<AnalysisReply>,
    ) {
        if self.fallback || self.analyzer.is_none() {
            let _ = reply.send(Ok(AnalysisResult::fallback()));
            return;
        }

        let content_hash = content_hash(&samples, sample_rate, &options);

        // Identical request already in flight: share its entry
        if let Some(&existing) = self.by_hash.get(&content_hash) {
            if let Some(entry) = self.pending.get_mut(&existing) {
                entry.waiters.push(reply);
                return;
            }
        }

        self.pending.insert(
            id,
            PendingEntry {
                waiters: vec![reply],
                deadline: Instant::now() + options.timeout,
                content_hash,
            },
        );
        self.by_hash.insert(content_hash, id);

        if !self.dispatch(id, samples, sample_rate, &options) {
            self.on_worker_lost();
        }
    }

    /// Hand the request to the worker, spawning one if needed.
    /// Returns false when the worker is unusable.
    fn dispatch(
        &mut self,
        id: u64,
        samples: Arc<Vec<f32>>,
        sample_rate: u32,
        options: &AnalysisOptions,
    ) -> bool {
        if self.worker.is_none() {
            let Some(analyzer) = self.analyzer.clone() else {
                return false;
            };
            match WorkerHandle::spawn(analyzer) {
                Ok(handle) => {
                    log::info!("analysis worker spawned");
                    self.worker = Some(handle);
                }
                Err(e) => {
                    log::error!("failed to spawn analysis worker: {e}");
                    return false;
                }
            }
        }

        let request = AnalysisRequest {
            id,
            samples,
            sample_rate,
            features: options.features.clone(),
        };
        match &self.worker {
            Some(worker) => worker.requests.send(request).is_ok(),
            None => false,
        }
    }

    fn on_response(&mut self, response: AnalysisResponse) {
        self.consecutive_losses = 0;
        if !self.pending.contains_key(&response.id) {
            // Late or unknown id: drop it
            log::debug!("discarding stale analysis response {}", response.id);
            return;
        }
        log::debug!(
            "analysis {} completed in {} ms",
            response.id,
            response.processing_ms
        );
        let reply = response
            .result
            .map_err(AnalysisError::InvalidInput);
        self.resolve(response.id, reply);
    }

    fn on_worker_lost(&mut self) {
        log::warn!("analysis worker lost");
        self.worker = None;
        self.consecutive_losses += 1;
        if self.consecutive_losses >= MAX_WORKER_LOSSES {
            log::warn!("analysis falling back to sentinel results");
            self.fallback = true;
        }
        self.reject_all(AnalysisError::WorkerLost);
    }

    fn reap_timeouts(&mut self) {
        let now = Instant::now();
        let expired: Vec<u64> = self
            .pending
            .iter()
            .filter(|(_, entry)| now >= entry.deadline)
            .map(|(&id, _)| id)
            .collect();
        for id in expired {
            log::debug!("analysis {id} timed out");
            self.resolve(id, Err(AnalysisError::Timeout));
        }
    }
}

fn content_hash(samples: &[f32], sample_rate: u32, options: &AnalysisOptions) -> u64 {
    let mut hasher = DefaultHasher::new();
    sample_rate.hash(&mut hasher);
    samples.len().hash(&mut hasher);
    for sample in samples {
        sample.to_bits().hash(&mut hasher);
    }
    for feature in &options.features {
        feature.hash(&mut hasher);
    }
    hasher.finish()
}

fn run_service(
    commands: Receiver<ClientCommand>,
    analyzer: Option<Arc<dyn Analyzer>>,
    fallback: bool,
) {
    let mut state = ServiceState {
        analyzer,
        worker: None,
        pending: HashMap::new(),
        by_hash: HashMap::new(),
        consecutive_losses: 0,
        fallback,
    };

    log::debug!("analysis client service started");
    'outer: loop {
        let worker_rx = state.worker.as_ref().map(|w| w.responses.clone());

        let mut shutdown = false;
        if let Some(worker_rx) = worker_rx {
            crossbeam::select! {
                recv(commands) -> msg => match msg {
                    Ok(ClientCommand::Submit { id, samples, sample_rate, options, reply }) => {
                        state.on_submit(id, samples, sample_rate, options, reply);
                    }
                    Ok(ClientCommand::Cancel { id }) => state.resolve(id, Err(AnalysisError::Cancelled)),
                    Ok(ClientCommand::Shutdown) | Err(_) => shutdown = true,
                },
                recv(worker_rx) -> response => match response {
                    Ok(response) => state.on_response(response),
                    Err(_) => state.on_worker_lost(),
                },
                default(TICK) => {}
            }
        } else {
            match commands.recv_timeout(TICK) {
                Ok(ClientCommand::Submit { id, samples, sample_rate, options, reply }) => {
                    state.on_submit(id, samples, sample_rate, options, reply);
                }
                Ok(ClientCommand::Cancel { id }) => state.resolve(id, Err(AnalysisError::Cancelled)),
                Ok(ClientCommand::Shutdown) => shutdown = true,
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => shutdown = true,
            }
        }

        state.reap_timeouts();
        if shutdown {
            state.reject_all(AnalysisError::Cancelled);
            break 'outer;
        }
    }
    log::debug!("analysis client service stopped");
}
