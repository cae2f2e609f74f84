use bytes::Bytes;
use crossbeam::channel::{bounded, unbounded, Receiver, Sender};

/// An item travelling from the compressor thread to the uploading thread.
///
/// `Done` is sent exactly once, after the last chunk, when the writer is
/// closed. A queue that disconnects without delivering `Done` means the
/// producer stopped early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueItem {
    Chunk(Bytes),
    Done,
}

/// Constructors for the FIFO channel shared by one producer and one consumer.
pub struct HandoffQueue;

impl HandoffQueue {
    /// A queue that never blocks the producer. Memory grows without limit if
    /// uploads fall behind compression.
    pub fn unbounded() -> (Sender<QueueItem>, Receiver<QueueItem>) {
        unbounded()
    }

    /// A queue holding at most `depth` items; the producer blocks while it is full.
    pub fn bounded(depth: usize) -> (Sender<QueueItem>, Receiver<QueueItem>) {
        bounded(depth.max(1))
    }

    /// Pick the flavour from an optional depth, `None` meaning unbounded.
    pub fn with_depth(depth: Option<usize>) -> (Sender<QueueItem>, Receiver<QueueItem>) {
        match depth {
            Some(depth) => Self::bounded(depth),
            None => Self::unbounded(),
        }
    }
}
