//! Ring of reusable block buffers shared by all digest workers
//!
//! A single orchestrator fills the ring from the open file while the workers
//! consume the block at `current_index`. Disk reads for the next block overlap
//! with hashing of the current one. The ring never overwrites a block that a
//! worker may still be reading: exclusive access is re-established through
//! `Arc::get_mut`, which only succeeds once every worker view is dropped.

use crate::{
    Result,
    error::{InternalError, ValidationError},
};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};

/// How block bytes reach a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BufferTransport {
    /// Workers read the ring buffer itself through a shared reference
    #[default]
    Shared,
    /// Each worker receives its own copy of the block
    Inline,
}

/// Read-only handle to one block, sent to exactly one worker
#[derive(Debug, Clone)]
pub enum BlockView {
    Shared { buffer: Arc<Vec<u8>>, len: usize },
    Inline(Vec<u8>),
}

impl BlockView {
    /// The valid bytes of the block
    pub fn bytes(&self) -> &[u8] {
        match self {
            Self::Shared { buffer, len } => &buffer[..*len],
            Self::Inline(data) => data,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Outcome of one prefetch attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prefetch {
    /// The next block was read into buffer `index`
    Filled { index: usize, size: usize },
    /// The ring caught up with the buffer still being consumed
    Full,
    /// Nothing left to read
    Eof,
}

struct Buffer {
    data: Arc<Vec<u8>>,
    occupied: usize,
    in_use: bool,
}

/// Fixed pool of `max_buffers` block buffers with consume/prefetch cursors
pub struct BufferRing {
    buffers: Vec<Buffer>,
    /// Buffer currently distributed to workers
    current_index: usize,
    /// Buffer most recently filled
    next_index: usize,
    block_capacity: usize,
    transport: BufferTransport,
    peak_in_use: usize,
}

impl BufferRing {
    /// Allocate `max_buffers` buffers of `block_capacity` bytes each
    pub fn new(max_buffers: usize, block_capacity: usize, transport: BufferTransport) -> Result<Self> {
        if max_buffers == 0 {
            return Err(ValidationError::invalid_configuration("max_buffers must be at least 1").into());
        }
        if block_capacity == 0 {
            return Err(ValidationError::invalid_configuration("block_size must be at least 1").into());
        }

        let buffers = (0..max_buffers)
            .map(|_| Buffer {
                data: Arc::new(vec![0u8; block_capacity]),
                occupied: 0,
                in_use: false,
            })
            .collect();

        Ok(Self {
            buffers,
            current_index: 0,
            next_index: 0,
            block_capacity,
            transport,
            peak_in_use: 0,
        })
    }

    pub fn max_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn block_capacity(&self) -> usize {
        self.block_capacity
    }

    pub fn transport(&self) -> BufferTransport {
        self.transport
    }

    /// Number of buffers holding data not yet consumed by every worker
    pub fn in_use_count(&self) -> usize {
        self.buffers.iter().filter(|b| b.in_use).count()
    }

    /// Highest `in_use_count` observed since the ring was created
    pub fn peak_in_use(&self) -> usize {
        self.peak_in_use
    }

    /// Index and size of the block being consumed, if it holds data
    pub fn current(&self) -> Option<(usize, usize)> {
        let buffer = &self.buffers[self.current_index];
        buffer.in_use.then_some((self.current_index, buffer.occupied))
    }

    /// Overwrite buffer `index` with `bytes`
    ///
    /// Fails with `BufferInUse` if the buffer still holds an unconsumed block
    /// or a worker view of it is alive.
    pub fn write_block(&mut self, index: usize, bytes: &[u8]) -> Result<usize> {
        self.check_index(index)?;
        if bytes.len() > self.block_capacity {
            return Err(ValidationError::invalid_configuration(&format!(
                "block of {} bytes exceeds buffer capacity {}",
                bytes.len(),
                self.block_capacity
            ))
            .into());
        }

        let data = self.writable(index)?;
        data[..bytes.len()].copy_from_slice(bytes);
        self.buffers[index].occupied = bytes.len();
        Ok(bytes.len())
    }

    /// Reset the cursors and load the first block of a new file into buffer 0
    ///
    /// Buffer 0 is marked in use even when the file is empty, so a zero-byte
    /// file still gets one (empty) block.
    pub async fn start_file<R>(&mut self, reader: &mut R) -> Result<usize>
    where
        R: AsyncRead + Unpin,
    {
        for buffer in &mut self.buffers {
            buffer.in_use = false;
            buffer.occupied = 0;
        }
        self.current_index = 0;
        self.next_index = 0;

        let size = self.fill_from(0, reader).await?;
        self.mark_in_use(0);
        Ok(size)
    }

    /// Read the next block into the slot after `next_index`, unless that slot
    /// is the block still being consumed
    pub async fn advance_prefetch<R>(&mut self, reader: &mut R) -> Result<Prefetch>
    where
        R: AsyncRead + Unpin,
    {
        let candidate = (self.next_index + 1) % self.buffers.len();
        if candidate == self.current_index && self.buffers[candidate].in_use {
            return Ok(Prefetch::Full);
        }

        let size = self.fill_from(candidate, reader).await?;
        if size == 0 {
            return Ok(Prefetch::Eof);
        }

        self.next_index = candidate;
        self.mark_in_use(candidate);
        Ok(Prefetch::Filled {
            index: candidate,
            size,
        })
    }

    /// Retire the current block and move the consume cursor forward
    pub fn advance_consume(&mut self) -> usize {
        self.buffers[self.current_index].in_use = false;
        self.current_index = (self.current_index + 1) % self.buffers.len();
        self.current_index
    }

    /// Handle for one worker to read buffer `index`
    pub fn view(&self, index: usize) -> BlockView {
        let buffer = &self.buffers[index];
        match self.transport {
            BufferTransport::Shared => BlockView::Shared {
                buffer: Arc::clone(&buffer.data),
                len: buffer.occupied,
            },
            BufferTransport::Inline => BlockView::Inline(buffer.data[..buffer.occupied].to_vec()),
        }
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.buffers.len() {
            return Err(ValidationError::invalid_configuration(&format!(
                "buffer index {index} out of range for ring of {}",
                self.buffers.len()
            ))
            .into());
        }
        Ok(())
    }

    fn writable(&mut self, index: usize) -> Result<&mut Vec<u8>> {
        let buffer = &mut self.buffers[index];
        if buffer.in_use {
            return Err(InternalError::buffer_in_use(index).into());
        }
        Arc::get_mut(&mut buffer.data).ok_or_else(|| InternalError::buffer_in_use(index).into())
    }

    /// Fill buffer `index` until it is full or the reader is exhausted
    async fn fill_from<R>(&mut self, index: usize, reader: &mut R) -> Result<usize>
    where
        R: AsyncRead + Unpin,
    {
        let capacity = self.block_capacity;
        let data = self.writable(index)?;

        let mut filled = 0;
        while filled < capacity {
            match reader.read(&mut data[filled..capacity]).await {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        self.buffers[index].occupied = filled;
        Ok(filled)
    }

    fn mark_in_use(&mut self, index: usize) {
        self.buffers[index].in_use = true;
        self.peak_in_use = self.peak_in_use.max(self.in_use_count());
    }
}
