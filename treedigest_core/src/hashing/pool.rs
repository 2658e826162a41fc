//! Worker pool lifecycle for a whole digest run

use super::buffer_ring::{BufferRing, BufferTransport};
use super::digester::{FileDigest, FileDigester};
use super::registry::DigestRegistry;
use super::worker::{WorkUnit, WorkerEvent, WorkerHandle};
use crate::{DigestConfig, Result, error::InternalError};
use log::{debug, trace};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};

/// Counters accumulated over every file digested by a pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DigestStats {
    pub files_digested: u64,
    /// Files that produced no digest because they could not be read
    pub files_failed: u64,
    pub bytes_read: u64,
    pub blocks_read: u64,
    pub peak_buffers_in_use: usize,
}

/// One worker per active algorithm plus the shared buffer ring
///
/// Workers live for the whole run and are re-initialized per file. Dropping
/// the pool asks every worker to quit without waiting for it; use
/// [`end_workers`] to join them.
pub struct WorkerPool {
    workers: Vec<WorkerHandle>,
    events: UnboundedReceiver<WorkerEvent>,
    diagnostics: UnboundedReceiver<String>,
    ring: BufferRing,
    max_concurrent_jobs: usize,
    worker_timeout: Option<Duration>,
    stats: DigestStats,
}

/// Validate `config` and spawn one worker per selected algorithm
///
/// Every configuration error is raised before the first thread starts.
pub fn start_workers(config: &DigestConfig, registry: &DigestRegistry) -> Result<WorkerPool> {
    WorkerPool::start(config, registry)
}

/// Send QUIT to every worker and wait for all of them to exit
pub async fn end_workers(pool: WorkerPool) -> Result<DigestStats> {
    pool.shutdown().await
}

impl WorkerPool {
    pub fn start(config: &DigestConfig, registry: &DigestRegistry) -> Result<Self> {
        config.validate()?;
        let specs = registry.validate(&config.algorithms, config.max_workers)?;
        let ring = BufferRing::new(config.max_buffers, config.block_size, config.transport)?;

        let (events_tx, events) = mpsc::unbounded_channel();
        let (diagnostics_tx, diagnostics) = mpsc::unbounded_channel();

        // Only workers hold senders, so a closed channel means every worker is gone
        let workers = specs
            .into_iter()
            .enumerate()
            .map(|(id, spec)| WorkerHandle::spawn(id, spec, events_tx.clone(), diagnostics_tx.clone()))
            .collect::<Result<Vec<_>>>()?;

        debug!(
            "Started {} digest workers ({}), {} x {} byte buffers, {:?} transport",
            workers.len(),
            workers.iter().map(|w| w.name()).collect::<Vec<_>>().join(", "),
            ring.max_buffers(),
            ring.block_capacity(),
            ring.transport()
        );

        Ok(Self {
            workers,
            events,
            diagnostics,
            ring,
            max_concurrent_jobs: config.max_concurrent_jobs,
            worker_timeout: config.worker_timeout(),
            stats: DigestStats::default(),
        })
    }

    /// Active algorithm names, in the order they were requested
    pub fn algorithms(&self) -> Vec<&'static str> {
        self.workers.iter().map(|w| w.name()).collect()
    }

    pub fn stats(&self) -> DigestStats {
        self.stats
    }

    pub fn max_buffers(&self) -> usize {
        self.ring.max_buffers()
    }

    pub fn block_size(&self) -> usize {
        self.ring.block_capacity()
    }

    pub fn transport(&self) -> BufferTransport {
        self.ring.transport()
    }

    /// Digest one file with every active algorithm
    ///
    /// `Ok(None)` means the file could not be opened or read and counts as a
    /// failed file; the pool remains usable. An `Err` means a worker hung,
    /// died or broke protocol and the pool should be shut down.
    pub async fn digest_file(&mut self, path: impl AsRef<Path>) -> Result<Option<FileDigest>> {
        let digester = FileDigester::new(
            &self.workers,
            &mut self.events,
            &mut self.diagnostics,
            &mut self.ring,
            self.max_concurrent_jobs,
            self.worker_timeout,
        );
        let outcome = digester.digest(path.as_ref()).await?;

        self.stats.peak_buffers_in_use = self.ring.peak_in_use();
        match &outcome {
            Some(digest) => {
                self.stats.files_digested += 1;
                self.stats.bytes_read += digest.bytes_read;
                self.stats.blocks_read += digest.blocks;
            }
            None => self.stats.files_failed += 1,
        }

        Ok(outcome)
    }

    /// QUIT every worker, join the threads and return the run's counters
    pub async fn shutdown(mut self) -> Result<DigestStats> {
        for worker in &self.workers {
            // A worker that already exited has nothing left to quit
            let _ = worker.send(WorkUnit::Quit);
        }

        let threads: Vec<_> = self
            .workers
            .iter_mut()
            .filter_map(|worker| worker.take_thread().map(|thread| (worker.name(), thread)))
            .collect();

        let panicked = tokio::task::spawn_blocking(move || {
            threads
                .into_iter()
                .filter_map(|(name, thread)| thread.join().err().map(|_| name))
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|_| InternalError::worker_panicked("pool"))?;

        while let Ok(event) = self.events.try_recv() {
            debug!("Discarding worker event after shutdown: {event:?}");
        }
        while let Ok(line) = self.diagnostics.try_recv() {
            trace!("{line}");
        }

        if let Some(name) = panicked.first() {
            return Err(InternalError::worker_panicked(name).into());
        }

        debug!(
            "Digest workers stopped after {} files ({} failed)",
            self.stats.files_digested, self.stats.files_failed
        );
        Ok(self.stats)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        for worker in &self.workers {
            let _ = worker.send(WorkUnit::Quit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::error::ValidationError;

    fn config(algorithms: &[&str]) -> DigestConfig {
        DigestConfig::test().with_algorithms(algorithms.iter().copied())
    }

    #[tokio::test]
    async fn test_start_and_end_workers() {
        let registry = DigestRegistry::builtin();
        let pool = start_workers(&config(&["md5", "crc32"]), &registry).unwrap();

        assert_eq!(pool.algorithms(), vec!["md5", "crc32"]);
        let stats = end_workers(pool).await.unwrap();
        assert_eq!(stats, DigestStats::default());
    }

    #[tokio::test]
    async fn test_start_rejects_too_many_algorithms() {
        let registry = DigestRegistry::builtin();
        let mut cfg = config(&["md5", "sha1", "sha256"]);
        cfg.max_workers = 2;

        let err = start_workers(&cfg, &registry).err().unwrap();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::TooManyAlgorithms { .. })
        ));
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_sizing() {
        let registry = DigestRegistry::builtin();
        let mut cfg = config(&["md5"]);
        cfg.max_buffers = 0;

        assert!(matches!(
            start_workers(&cfg, &registry).err().unwrap(),
            Error::Validation(ValidationError::InvalidConfiguration { .. })
        ));
    }

    #[tokio::test]
    async fn test_start_rejects_oversized_ring_before_allocating() {
        let registry = DigestRegistry::builtin();
        let mut cfg = config(&["md5"]);
        cfg.block_size = usize::MAX / 2;
        cfg.max_buffers = 4;

        assert!(matches!(
            start_workers(&cfg, &registry).err().unwrap(),
            Error::Validation(ValidationError::InvalidConfiguration { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_file_counts_as_failed() {
        let registry = DigestRegistry::builtin();
        let mut pool = start_workers(&config(&["sha1"]), &registry).unwrap();

        let outcome = pool.digest_file("/definitely/not/here.bin").await.unwrap();
        assert!(outcome.is_none());

        let stats = end_workers(pool).await.unwrap();
        assert_eq!(stats.files_failed, 1);
        assert_eq!(stats.files_digested, 0);
    }

    #[tokio::test]
    async fn test_dropping_pool_stops_workers() {
        let registry = DigestRegistry::builtin();
        let pool = start_workers(&config(&["blake2s"]), &registry).unwrap();
        drop(pool);
    }
}
