//! Digest worker: one OS thread per algorithm, driven by commands
//!
//! Each worker owns a single hasher and talks to the orchestrator only
//! through channels: a private FIFO command channel in, plus the shared
//! results and diagnostics channels out. Commands for one worker are handled
//! strictly in the order they were sent, which is what keeps the blocks of a
//! file in file order.

use super::DigestAlgorithm;
use super::buffer_ring::BlockView;
use super::registry::DigestSpec;
use super::traits::StreamingHasher;
use crate::{Result, error::InternalError};
use std::thread::JoinHandle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Command sent to exactly one worker
#[derive(Debug)]
pub enum WorkUnit {
    /// Start a fresh hasher, discarding any previous state
    Init(DigestAlgorithm),
    /// Hash one block
    Process(BlockView),
    /// Emit the digest of everything processed since `Init`
    Finalize,
    /// Leave the message loop
    Quit,
}

/// Final digest of one file for one algorithm
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestResult {
    pub algorithm_name: String,
    pub hex_digest: String,
}

/// Message on the shared results channel
#[derive(Debug)]
pub enum WorkerEvent {
    /// The worker finished the block from its last `Process`
    BlockDone { worker: usize },
    /// Answer to `Finalize`
    Finished { worker: usize, result: DigestResult },
    /// The command is not valid in the worker's current state
    Rejected { worker: usize, reason: String },
}

/// Lifecycle of a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// No hasher yet
    Idle,
    /// Hasher constructed, nothing processed
    Ready,
    /// At least one block processed since `Init`
    Accumulating,
    /// Received `Quit`
    Terminated,
}

pub(crate) struct DigestWorker {
    id: usize,
    state: WorkerState,
    algorithm: Option<DigestAlgorithm>,
    hasher: Option<Box<dyn StreamingHasher>>,
    bytes_seen: u64,
    events: UnboundedSender<WorkerEvent>,
    diagnostics: UnboundedSender<String>,
}

impl DigestWorker {
    pub(crate) fn new(
        id: usize,
        events: UnboundedSender<WorkerEvent>,
        diagnostics: UnboundedSender<String>,
    ) -> Self {
        Self {
            id,
            state: WorkerState::Idle,
            algorithm: None,
            hasher: None,
            bytes_seen: 0,
            events,
            diagnostics,
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> WorkerState {
        self.state
    }

    /// Message loop; returns once `Quit` arrives or the orchestrator is gone
    pub(crate) fn run(mut self, mut commands: UnboundedReceiver<WorkUnit>) {
        while let Some(command) = commands.blocking_recv() {
            if !self.handle(command) {
                break;
            }
        }
        self.state = WorkerState::Terminated;
    }

    /// Apply one command, returning `false` when the loop should stop
    pub(crate) fn handle(&mut self, command: WorkUnit) -> bool {
        match command {
            WorkUnit::Init(algorithm) => {
                self.algorithm = Some(algorithm);
                self.hasher = Some(algorithm.create_hasher());
                self.bytes_seen = 0;
                self.state = WorkerState::Ready;
                self.diagnostic(format!("worker {} init {algorithm}", self.id));
                true
            }
            WorkUnit::Process(view) => {
                let hasher = match (self.state, self.hasher.as_mut()) {
                    (WorkerState::Ready | WorkerState::Accumulating, Some(hasher)) => hasher,
                    _ => return self.reject("PROCESS before INIT"),
                };
                hasher.update(view.bytes());
                let len = view.len();
                // Release the buffer before reporting completion
                drop(view);

                self.bytes_seen += len as u64;
                self.state = WorkerState::Accumulating;
                self.diagnostic(format!("worker {} processed {len} bytes", self.id));
                self.emit(WorkerEvent::BlockDone { worker: self.id })
            }
            WorkUnit::Finalize => {
                let (hasher, algorithm) = match (self.state, self.hasher.take(), self.algorithm) {
                    (
                        WorkerState::Ready | WorkerState::Accumulating,
                        Some(hasher),
                        Some(algorithm),
                    ) => (hasher, algorithm),
                    _ => return self.reject("FINALIZE before INIT"),
                };
                let hex_digest = hasher.finalize();
                self.state = WorkerState::Ready;
                self.diagnostic(format!(
                    "worker {} finalized {algorithm} over {} bytes",
                    self.id, self.bytes_seen
                ));
                self.emit(WorkerEvent::Finished {
                    worker: self.id,
                    result: DigestResult {
                        algorithm_name: algorithm.name().to_string(),
                        hex_digest,
                    },
                })
            }
            WorkUnit::Quit => {
                self.state = WorkerState::Terminated;
                self.hasher = None;
                false
            }
        }
    }

    fn reject(&self, reason: &str) -> bool {
        self.emit(WorkerEvent::Rejected {
            worker: self.id,
            reason: reason.to_string(),
        })
    }

    /// A closed results channel means nobody is listening any more
    fn emit(&self, event: WorkerEvent) -> bool {
        self.events.send(event).is_ok()
    }

    fn diagnostic(&self, message: String) {
        let _ = self.diagnostics.send(message);
    }
}

/// Orchestrator side of one running worker
pub(crate) struct WorkerHandle {
    pub(crate) spec: DigestSpec,
    commands: UnboundedSender<WorkUnit>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Start a worker thread for `spec`
    pub(crate) fn spawn(
        id: usize,
        spec: DigestSpec,
        events: UnboundedSender<WorkerEvent>,
        diagnostics: UnboundedSender<String>,
    ) -> Result<Self> {
        let (commands, inbox) = mpsc::unbounded_channel();
        let worker = DigestWorker::new(id, events, diagnostics);

        let thread = std::thread::Builder::new()
            .name(format!("digest-{}", spec.name))
            .spawn(move || worker.run(inbox))?;

        Ok(Self {
            spec,
            commands,
            thread: Some(thread),
        })
    }

    /// Handle with no thread behind it; the caller holds the inbox
    #[cfg(test)]
    pub(crate) fn detached(spec: DigestSpec) -> (Self, UnboundedReceiver<WorkUnit>) {
        let (commands, inbox) = mpsc::unbounded_channel();
        let handle = Self {
            spec,
            commands,
            thread: None,
        };
        (handle, inbox)
    }

    pub(crate) fn name(&self) -> &'static str {
        self.spec.name
    }

    pub(crate) fn send(&self, command: WorkUnit) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| InternalError::worker_disconnected(self.name()).into())
    }

    pub(crate) fn take_thread(&mut self) -> Option<JoinHandle<()>> {
        self.thread.take()
    }
}
