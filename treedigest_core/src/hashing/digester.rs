//! Per-file orchestration of the digest workers
//!
//! The digester owns nothing. It borrows the pool's workers, channels and
//! buffer ring for the duration of one file.

use super::buffer_ring::{BufferRing, Prefetch};
use super::worker::{WorkUnit, WorkerEvent, WorkerHandle};
use crate::{
    Error, Result,
    error::{InternalError, IoError},
};
use log::{debug, trace, warn};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::sync::mpsc::UnboundedReceiver;

/// Hex digest per algorithm name
pub type DigestMap = BTreeMap<String, String>;

/// Outcome of digesting one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigest {
    pub digests: DigestMap,
    /// Bytes read from disk, once, regardless of the number of algorithms
    pub bytes_read: u64,
    /// Blocks dispatched to the workers; an empty file counts one block
    pub blocks: u64,
}

/// Read progress for the file currently being digested
#[derive(Default)]
struct ReadState {
    eof: bool,
    /// Ring caught up with the block being consumed
    full: bool,
    failed: Option<Error>,
    bytes_read: u64,
    blocks: u64,
}

impl ReadState {
    fn record_block(&mut self, size: usize, capacity: usize) {
        self.bytes_read += size as u64;
        self.blocks += 1;
        // A short block can only come from the end of the file
        if size < capacity {
            self.eof = true;
        }
    }

    fn can_prefetch(&self) -> bool {
        !self.eof && !self.full && self.failed.is_none()
    }
}

pub(crate) struct FileDigester<'a> {
    workers: &'a [WorkerHandle],
    events: &'a mut UnboundedReceiver<WorkerEvent>,
    diagnostics: &'a mut UnboundedReceiver<String>,
    ring: &'a mut BufferRing,
    max_concurrent_jobs: usize,
    timeout: Option<Duration>,
}

impl<'a> FileDigester<'a> {
    pub(crate) fn new(
        workers: &'a [WorkerHandle],
        events: &'a mut UnboundedReceiver<WorkerEvent>,
        diagnostics: &'a mut UnboundedReceiver<String>,
        ring: &'a mut BufferRing,
        max_concurrent_jobs: usize,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            workers,
            events,
            diagnostics,
            ring,
            max_concurrent_jobs: max_concurrent_jobs.max(1),
            timeout,
        }
    }

    /// Digest `path` with every worker
    ///
    /// Returns `Ok(None)` when the file cannot be opened or read; the pool
    /// stays usable for the next file. Worker failures are returned as
    /// errors because the pool state is no longer known.
    pub(crate) async fn digest(mut self, path: &Path) -> Result<Option<FileDigest>> {
        let mut file = match File::open(path).await {
            Ok(file) => file,
            Err(e) => {
                warn!("{}", IoError::open_failed(path, e));
                return Ok(None);
            }
        };

        debug!(
            "Digesting {} with {} workers",
            path.display(),
            self.workers.len()
        );

        for worker in self.workers {
            worker.send(WorkUnit::Init(worker.spec.algorithm))?;
        }

        let mut state = ReadState::default();
        match self.ring.start_file(&mut file).await {
            Ok(size) => state.record_block(size, self.ring.block_capacity()),
            Err(e) if e.is_file_local() => {
                warn!("{}", read_failure(path, e));
                return Ok(None);
            }
            Err(e) => return Err(e),
        }

        loop {
            match self.ring.current() {
                Some((index, _)) => {
                    self.process_block(index, &mut file, &mut state).await?;
                    self.ring.advance_consume();
                    // Retiring the block frees its slot for the next read
                    state.full = false;
                    if state.failed.is_some() {
                        break;
                    }
                }
                None if state.can_prefetch() => {
                    // Nothing was prefetched while the last block was hashed
                    self.prefetch(&mut file, &mut state).await?;
                    if self.ring.current().is_none() {
                        break;
                    }
                }
                None => break,
            }
        }

        if let Some(e) = state.failed {
            warn!("{}", read_failure(path, e));
            self.drain_diagnostics();
            return Ok(None);
        }

        let digests = self.finalize_all().await?;
        self.drain_diagnostics();

        debug!(
            "Digested {}: {} bytes in {} blocks",
            path.display(),
            state.bytes_read,
            state.blocks
        );

        Ok(Some(FileDigest {
            digests,
            bytes_read: state.bytes_read,
            blocks: state.blocks,
        }))
    }

    /// Run one block through every worker, prefetching while they hash
    async fn process_block(
        &mut self,
        index: usize,
        file: &mut File,
        state: &mut ReadState,
    ) -> Result<()> {
        let workers = self.workers;
        let mut pending = workers.iter();
        let mut done = vec![false; workers.len()];
        let mut active = 0usize;
        let mut completed = 0usize;
        state.full = false;

        while completed < workers.len() {
            // Rounds are capped by the concurrency ceiling
            while active < self.max_concurrent_jobs {
                let Some(worker) = pending.next() else {
                    break;
                };
                worker.send(WorkUnit::Process(self.ring.view(index)))?;
                active += 1;
            }

            if state.can_prefetch() {
                self.prefetch(file, state).await?;
            } else {
                let event = self.next_event(&done).await?;
                self.block_done(event, &mut done)?;
                active = active.saturating_sub(1);
                completed += 1;
            }

            while let Ok(event) = self.events.try_recv() {
                self.block_done(event, &mut done)?;
                active = active.saturating_sub(1);
                completed += 1;
            }
            self.drain_diagnostics();
        }

        trace!("Block in buffer {index} consumed by {completed} workers");
        Ok(())
    }

    async fn prefetch(&mut self, file: &mut File, state: &mut ReadState) -> Result<()> {
        match self.ring.advance_prefetch(file).await {
            Ok(Prefetch::Filled { index, size }) => {
                trace!("Prefetched {size} bytes into buffer {index}");
                state.record_block(size, self.ring.block_capacity());
            }
            Ok(Prefetch::Full) => state.full = true,
            Ok(Prefetch::Eof) => state.eof = true,
            Err(e) if e.is_file_local() => state.failed = Some(e),
            Err(e) => return Err(e),
        }
        Ok(())
    }

    /// FINALIZE every worker and collect one tagged result from each
    async fn finalize_all(&mut self) -> Result<DigestMap> {
        for worker in self.workers {
            worker.send(WorkUnit::Finalize)?;
        }

        let mut done = vec![false; self.workers.len()];
        let mut digests = DigestMap::new();

        while digests.len() < self.workers.len() {
            match self.next_event(&done).await? {
                WorkerEvent::Finished { worker, result } => {
                    self.mark_done(worker, &mut done, "digest")?;
                    digests.insert(result.algorithm_name, result.hex_digest);
                }
                WorkerEvent::Rejected { worker, reason } => {
                    return Err(self.protocol_error(worker, reason));
                }
                WorkerEvent::BlockDone { worker } => {
                    return Err(self.protocol_error(worker, "block completion after FINALIZE"));
                }
            }
        }

        Ok(digests)
    }

    fn block_done(&self, event: WorkerEvent, done: &mut [bool]) -> Result<()> {
        match event {
            WorkerEvent::BlockDone { worker } => self.mark_done(worker, done, "block completion"),
            WorkerEvent::Rejected { worker, reason } => Err(self.protocol_error(worker, reason)),
            WorkerEvent::Finished { worker, .. } => {
                Err(self.protocol_error(worker, "digest before FINALIZE"))
            }
        }
    }

    fn mark_done(&self, worker: usize, done: &mut [bool], what: &str) -> Result<()> {
        match done.get_mut(worker) {
            Some(flag) if !*flag => {
                *flag = true;
                Ok(())
            }
            Some(_) => Err(self.protocol_error(worker, format!("duplicate {what}"))),
            None => Err(InternalError::worker_protocol(
                &format!("#{worker}"),
                format!("{what} from unknown worker"),
            )
            .into()),
        }
    }

    /// Wait for the next worker event, bounded by the configured timeout
    async fn next_event(&mut self, done: &[bool]) -> Result<WorkerEvent> {
        let received = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, self.events.recv()).await {
                Ok(received) => received,
                Err(_) => {
                    return Err(InternalError::worker_hang(self.first_pending(done), limit).into());
                }
            },
            None => self.events.recv().await,
        };

        received.ok_or_else(|| InternalError::worker_disconnected(self.first_pending(done)).into())
    }

    fn first_pending(&self, done: &[bool]) -> &'static str {
        self.workers
            .iter()
            .zip(done)
            .find(|(_, finished)| !**finished)
            .map_or("unknown", |(worker, _)| worker.name())
    }

    fn protocol_error(&self, worker: usize, message: impl Into<String>) -> Error {
        let name = self.workers.get(worker).map_or("unknown", |w| w.name());
        InternalError::worker_protocol(name, message).into()
    }

    fn drain_diagnostics(&mut self) {
        while let Ok(line) = self.diagnostics.try_recv() {
            trace!("{line}");
        }
    }
}

fn read_failure(path: &Path, error: Error) -> Error {
    match error {
        Error::Io(IoError {
            source: Some(source),
            ..
        }) => IoError::read_failed(path, source).into(),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::{BufferTransport, DigestRegistry, DigestResult};
    use std::path::PathBuf;
    use tempfile::TempDir;
    use tokio::sync::mpsc::{self, UnboundedSender};

    /// Workers whose inboxes nobody serves; events are scripted by the test
    struct Scripted {
        workers: Vec<WorkerHandle>,
        inboxes: Vec<UnboundedReceiver<WorkUnit>>,
        events_tx: Option<UnboundedSender<WorkerEvent>>,
        events: UnboundedReceiver<WorkerEvent>,
        _diagnostics_tx: UnboundedSender<String>,
        diagnostics: UnboundedReceiver<String>,
        ring: BufferRing,
        path: PathBuf,
        temp_dir: TempDir,
    }

    fn scripted(names: &[&str]) -> Scripted {
        let registry = DigestRegistry::builtin();
        let (workers, inboxes): (Vec<_>, Vec<_>) = names
            .iter()
            .map(|name| WorkerHandle::detached(*registry.get(name).unwrap()))
            .unzip();
        let (events_tx, events) = mpsc::unbounded_channel();
        let (diagnostics_tx, diagnostics) = mpsc::unbounded_channel();

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("abc.txt");
        std::fs::write(&path, b"abc").unwrap();

        Scripted {
            workers,
            inboxes,
            events_tx: Some(events_tx),
            events,
            _diagnostics_tx: diagnostics_tx,
            diagnostics,
            ring: BufferRing::new(2, 1024, BufferTransport::Shared).unwrap(),
            path,
            temp_dir,
        }
    }

    impl Scripted {
        fn push(&self, event: WorkerEvent) {
            self.events_tx.as_ref().unwrap().send(event).unwrap();
        }

        async fn digest(&mut self, timeout: Option<Duration>) -> Result<Option<FileDigest>> {
            FileDigester::new(
                &self.workers,
                &mut self.events,
                &mut self.diagnostics,
                &mut self.ring,
                4,
                timeout,
            )
            .digest(&self.path)
            .await
        }
    }

    fn protocol_message(result: Result<Option<FileDigest>>) -> (String, String) {
        match result {
            Err(Error::Internal(InternalError::WorkerProtocol { algorithm, message })) => {
                (algorithm, message)
            }
            other => panic!("Expected WorkerProtocol, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_silent_worker_is_reported_as_hung() {
        let mut s = scripted(&["md5"]);

        match s.digest(Some(Duration::from_millis(200))).await {
            Err(Error::Internal(InternalError::WorkerHang { algorithm, waited })) => {
                assert_eq!(algorithm, "md5");
                assert_eq!(waited, Duration::from_millis(200));
            }
            other => panic!("Expected WorkerHang, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_hang_names_the_first_worker_still_pending() {
        let mut s = scripted(&["crc32", "sha1"]);
        s.push(WorkerEvent::BlockDone { worker: 0 });

        match s.digest(Some(Duration::from_millis(200))).await {
            Err(Error::Internal(InternalError::WorkerHang { algorithm, .. })) => {
                assert_eq!(algorithm, "sha1");
            }
            other => panic!("Expected WorkerHang, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_duplicate_block_completion_is_a_protocol_error() {
        let mut s = scripted(&["md5"]);
        s.push(WorkerEvent::BlockDone { worker: 0 });
        s.push(WorkerEvent::BlockDone { worker: 0 });

        let (algorithm, message) = protocol_message(s.digest(Some(Duration::from_secs(5))).await);
        assert_eq!(algorithm, "md5");
        assert_eq!(message, "duplicate block completion");
    }

    #[tokio::test]
    async fn test_rejected_command_is_a_protocol_error() {
        let mut s = scripted(&["md5"]);
        s.push(WorkerEvent::Rejected {
            worker: 0,
            reason: "PROCESS before INIT".to_string(),
        });

        let (_, message) = protocol_message(s.digest(Some(Duration::from_secs(5))).await);
        assert_eq!(message, "PROCESS before INIT");
    }

    #[tokio::test]
    async fn test_digest_before_finalize_is_a_protocol_error() {
        let mut s = scripted(&["md5"]);
        s.push(WorkerEvent::Finished {
            worker: 0,
            result: DigestResult {
                algorithm_name: "md5".to_string(),
                hex_digest: "00".to_string(),
            },
        });

        let (_, message) = protocol_message(s.digest(Some(Duration::from_secs(5))).await);
        assert_eq!(message, "digest before FINALIZE");
    }

    #[tokio::test]
    async fn test_event_from_unknown_worker_is_a_protocol_error() {
        let mut s = scripted(&["md5"]);
        s.push(WorkerEvent::BlockDone { worker: 9 });

        let (algorithm, message) = protocol_message(s.digest(Some(Duration::from_secs(5))).await);
        assert_eq!(algorithm, "#9");
        assert_eq!(message, "block completion from unknown worker");
    }

    #[tokio::test]
    async fn test_closed_results_channel_is_a_disconnect() {
        let mut s = scripted(&["sha256"]);
        s.events_tx = None;

        assert!(matches!(
            s.digest(None).await,
            Err(Error::Internal(InternalError::WorkerDisconnected { ref algorithm }))
                if algorithm == "sha256"
        ));
    }

    #[tokio::test]
    async fn test_missing_file_sends_nothing_to_workers() {
        let mut s = scripted(&["md5"]);
        s.path = s.temp_dir.path().join("missing.txt");

        assert!(s.digest(Some(Duration::from_millis(200))).await.unwrap().is_none());
        assert!(s.inboxes[0].try_recv().is_err());
    }
}
