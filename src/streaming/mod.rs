//! Producer/consumer pipeline between a compressor and a multipart upload.
//!
//! ```text
//! ┌────────────┐   write   ┌─────────────┐  Chunk/Done  ┌─────────────┐  upload_part  ┌────┐
//! │ Compressor │──────────▶│ ChunkWriter │─────────────▶│ Coordinator │──────────────▶│ S3 │
//! └────────────┘  (thread) └─────────────┘   (queue)    └─────────────┘  (caller)     └────┘
//! ```
//!
//! The compressor thread only ever writes into the [`chunk_writer::ChunkWriter`],
//! which cuts the stream into fixed-size chunks and hands them over through a
//! FIFO [`queue`]. The calling thread drains the queue in order, so part
//! numbers always follow the order the bytes were produced in.
//! [`transaction::MultipartTransaction`] guarantees the upload is either
//! completed or aborted.

/// Fixed-size re-chunking sink
pub mod chunk_writer;

/// End-to-end archive and upload
pub mod coordinator;

/// Handoff channel between the two threads
pub mod queue;

/// Abort-unless-committed multipart upload guard
pub mod transaction;

pub use chunk_writer::ChunkWriter;
pub use coordinator::Coordinator;
pub use queue::{HandoffQueue, QueueItem};
pub use transaction::MultipartTransaction;
