//! # s3-share
//!
//! Compress a local file or directory, stream the compressed bytes to Amazon
//! S3 as a multipart upload, and hand back a presigned download URL. The
//! compressed artifact never exists in full on disk or in memory.
//!
//! ## Overview
//!
//! A compressor thread writes into a [`streaming::ChunkWriter`], which cuts
//! the stream into fixed-size chunks. The calling thread uploads each chunk as
//! the next multipart part. The [`streaming::Coordinator`] ties both sides into
//! one transaction: the upload is completed when both succeed and aborted
//! otherwise.
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use s3_share::cloud::client::S3Session;
//! use s3_share::compress::Archiver;
//! use s3_share::progress::LogProgressReporter;
//! use s3_share::streaming::Coordinator;
//! use s3_share::utils::paths::validate_and_resolve_input_path;
//!
//! # fn main() -> s3_share::errors::Result<()> {
//! let input = validate_and_resolve_input_path(Path::new("./reports"))?;
//! let session = S3Session::connect(Some("us-east-1"), None)?;
//!
//! let coordinator = Coordinator::new(
//!     Arc::new(Archiver::for_path(&input)),
//!     Arc::new(session.uploader()),
//!     Arc::new(LogProgressReporter::new()),
//! );
//! let key = coordinator.archive_and_upload(&input, "my-bucket", None)?;
//! println!("{}", session.presigned_url("my-bucket", &key, 3600)?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`cli`]: Command-line interface definitions and argument parsing
//! - [`config`]: Settings file loading, option merging and validation
//! - [`streaming`]: Chunk writer, handoff queue, transaction guard and coordinator
//! - [`compress`]: gzip and tar+gzip compressors
//! - [`cloud`]: S3 session, multipart uploader and presigned URLs
//! - [`progress`]: Progress reporters for both phases
//! - [`utils`]: Input path validation and object key generation
//! - [`errors`]: The library error type
//! - [`constants`]: Application-wide constants

/// Command-line interface definitions and argument parsing
pub mod cli;

/// Amazon S3 integration
pub mod cloud;

/// Compression strategies
pub mod compress;

/// Configuration management
pub mod config;

/// Application constants and configuration values
pub mod constants;

/// Error types
pub mod errors;

/// Progress reporting
pub mod progress;

/// Streaming pipeline between compression and upload
pub mod streaming;

/// Path validation and object key helpers
pub mod utils;
