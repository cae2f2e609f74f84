use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::{Bytes, BytesMut};
use crossbeam::channel::Sender;
use log::debug;

use crate::constants::DEFAULT_CHUNK_SIZE;
use crate::errors::ShareError;
use crate::streaming::queue::QueueItem;

/// Write-only sink that re-segments arbitrary writes into fixed-size chunks.
///
/// Every chunk pushed onto the queue is exactly `chunk_size` bytes long except
/// the last one, which carries whatever remained when the writer was finished.
/// Finishing also pushes the [`QueueItem::Done`] marker, exactly once.
///
/// The buffer and the enqueue step share one lock, so concurrent writers can
/// never split or duplicate a chunk boundary.
pub struct ChunkWriter {
    sender: Sender<QueueItem>,
    chunk_size: usize,
    state: Mutex<WriterState>,
    total_enqueued: AtomicU64,
}

#[derive(Default)]
struct WriterState {
    buffer: BytesMut,
    finished: bool,
    closed: bool,
}

impl ChunkWriter {
    /// Create a writer feeding `sender` with chunks of `chunk_size` bytes.
    ///
    /// A chunk size of zero is treated as one byte.
    pub fn new(sender: Sender<QueueItem>, chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            sender,
            chunk_size,
            state: Mutex::new(WriterState {
                buffer: BytesMut::with_capacity(chunk_size.min(DEFAULT_CHUNK_SIZE)),
                ..Default::default()
            }),
            total_enqueued: AtomicU64::new(0),
        }
    }

    /// Create a writer with the default 5MB chunk size.
    pub fn with_default_chunk_size(sender: Sender<QueueItem>) -> Self {
        Self::new(sender, DEFAULT_CHUNK_SIZE)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Total bytes handed to the queue so far, not counting the end marker.
    pub fn total_enqueued(&self) -> u64 {
        self.total_enqueued.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.lock_state().closed
    }

    /// Buffer `buf` and enqueue every complete chunk it produces.
    ///
    /// Always reports the full length as written. Fails once the writer has
    /// been finished or closed, or when the consumer side of the queue is gone.
    pub fn write(&self, buf: &[u8]) -> io::Result<usize> {
        self.write_chunked(buf)
    }

    /// Enqueue the buffered remainder (if any) followed by the end marker.
    ///
    /// Calling it again after the marker has been sent does nothing.
    pub fn finish(&self) -> io::Result<()> {
        let mut state = self.lock_state();
        self.finish_locked(&mut state)
    }

    /// Finish the stream if that has not happened yet and mark the writer closed.
    /// Closing twice is a no-op.
    pub fn close(&self) -> io::Result<()> {
        let mut state = self.lock_state();
        if state.closed {
            return Ok(());
        }
        self.finish_locked(&mut state)?;
        state.closed = true;
        Ok(())
    }

    /// Reading is not supported.
    pub fn read(&self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(write_only())
    }

    /// Reading is not supported.
    pub fn read_line(&self, _buf: &mut String) -> io::Result<usize> {
        Err(write_only())
    }

    fn write_chunked(&self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.lock_state();
        if state.closed || state.finished {
            return Err(ShareError::WriterClosed.into_io());
        }

        state.buffer.extend_from_slice(buf);
        while state.buffer.len() >= self.chunk_size {
            let chunk = state.buffer.split_to(self.chunk_size).freeze();
            self.enqueue(chunk)?;
        }

        Ok(buf.len())
    }

    fn finish_locked(&self, state: &mut WriterState) -> io::Result<()> {
        if state.finished {
            return Ok(());
        }

        if !state.buffer.is_empty() {
            let remainder = state.buffer.split().freeze();
            self.enqueue(remainder)?;
        }

        self.sender
            .send(QueueItem::Done)
            .map_err(|_| queue_closed())?;
        state.finished = true;

        debug!("Chunk writer finished after enqueuing {} bytes", self.total_enqueued());
        Ok(())
    }

    fn enqueue(&self, chunk: Bytes) -> io::Result<()> {
        let len = chunk.len() as u64;
        self.sender
            .send(QueueItem::Chunk(chunk))
            .map_err(|_| queue_closed())?;
        self.total_enqueued.fetch_add(len, Ordering::SeqCst);
        Ok(())
    }

    fn lock_state(&self) -> MutexGuard<'_, WriterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn write_only() -> io::Error {
    io::Error::new(io::ErrorKind::Unsupported, "ChunkWriter is write-only")
}

fn queue_closed() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "upload queue closed")
}

// Encoders call `flush` at arbitrary points, so it never emits a short chunk.
impl Write for &ChunkWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_chunked(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Write for ChunkWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_chunked(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
