//! Compression strategies that stream into a [`ChunkWriter`].
//!
//! A single file becomes a gzip stream (`.gz`); a directory becomes a gzipped
//! tar archive (`.tar.gz`). [`Archiver`] picks between the two once, from
//! whether the resolved input is a directory.
//!
//! ```no_run
//! use s3_share::compress::{Archiver, Compressor};
//! use std::path::Path;
//!
//! let archiver = Archiver::for_path(Path::new("/tmp/reports"));
//! assert_eq!(archiver.key_suffix(), ".tar.gz");
//! ```

use std::path::Path;

use crate::errors::Result;
use crate::progress::ProgressReporter;
use crate::streaming::chunk_writer::ChunkWriter;

pub mod gzip;
pub mod tar_gzip;

pub use gzip::GzipCompressor;
pub use tar_gzip::TarGzipCompressor;

/// Turns an input path into a compressed byte stream.
pub trait Compressor: Send + Sync {
    /// Write the compressed form of `input` into `sink`, then close the sink.
    ///
    /// `progress.start_compression` is called before anything is written and
    /// `progress.finish_compression` is called on every exit path. If the
    /// compressor fails the sink is left open, which the consumer sees as an
    /// early end of stream.
    fn compress(
        &self,
        input: &Path,
        sink: &ChunkWriter,
        chunk_size: usize,
        progress: &dyn ProgressReporter,
    ) -> Result<()>;

    /// Object key suffix for this format.
    fn key_suffix(&self) -> &'static str;

    /// Uncompressed size of `input` in bytes.
    fn total_size(&self, input: &Path) -> Result<u64>;
}

/// The two supported input shapes.
#[derive(Debug, Clone)]
pub enum Archiver {
    File(GzipCompressor),
    Directory(TarGzipCompressor),
}

impl Archiver {
    /// Directory archiver for directories, file compressor for anything else.
    pub fn for_path(path: &Path) -> Self {
        Self::select(path.is_dir())
    }

    pub fn select(is_directory: bool) -> Self {
        if is_directory {
            Archiver::Directory(TarGzipCompressor::default())
        } else {
            Archiver::File(GzipCompressor::default())
        }
    }

    /// Use `level` (0-9) for whichever variant this is.
    pub fn with_level(self, level: u32) -> Self {
        match self {
            Archiver::File(c) => Archiver::File(c.with_level(level)),
            Archiver::Directory(c) => Archiver::Directory(c.with_level(level)),
        }
    }

    fn inner(&self) -> &dyn Compressor {
        match self {
            Archiver::File(c) => c as &dyn Compressor,
            Archiver::Directory(c) => c as &dyn Compressor,
        }
    }
}

impl Compressor for Archiver {
    fn compress(
        &self,
        input: &Path,
        sink: &ChunkWriter,
        chunk_size: usize,
        progress: &dyn ProgressReporter,
    ) -> Result<()> {
        self.inner().compress(input, sink, chunk_size, progress)
    }

    fn key_suffix(&self) -> &'static str {
        self.inner().key_suffix()
    }

    fn total_size(&self, input: &Path) -> Result<u64> {
        self.inner().total_size(input)
    }
}

/// Calls `finish_compression` when dropped, so it runs on every exit path.
pub(crate) struct CompressionPhase<'a> {
    progress: &'a dyn ProgressReporter,
}

impl<'a> CompressionPhase<'a> {
    pub(crate) fn new(progress: &'a dyn ProgressReporter) -> Self {
        Self { progress }
    }
}

impl Drop for CompressionPhase<'_> {
    fn drop(&mut self) {
        self.progress.finish_compression();
    }
}
