//! Error types for archiving and uploading.
//!
//! Every failure the library can report is a variant of [`ShareError`]. Each
//! message names the resource that failed (path, bucket/key, part number) so
//! the user can act on it directly.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::constants::{MAX_EXPIRY_SECONDS, MIN_EXPIRY_SECONDS};

/// Boxed error from a remote service or credential provider.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the library.
pub type Result<T, E = ShareError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ShareError {
    // Input path validation
    #[error("Path {} does not exist.", .path.display())]
    PathNotFound { path: PathBuf },

    #[error("Path {} is a broken symlink.", .path.display())]
    BrokenSymlink { path: PathBuf },

    #[error("Path {} is not readable.", .path.display())]
    PathNotReadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Path {} is not valid.", .path.display())]
    InvalidPath {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    // Compression
    #[error("Error reading {}", .path.display())]
    CompressorInput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Error writing compressed data for {}", .path.display())]
    CompressorOutput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Error calculating total size of {}", .path.display())]
    CalculateTotalSize {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O operation on closed writer")]
    WriterClosed,

    #[error("Failed to start compression thread")]
    ThreadSpawn {
        #[source]
        source: io::Error,
    },

    #[error("Compression thread panicked")]
    ProducerPanicked,

    #[error("Compressed stream ended before the writer was closed")]
    StreamTruncated,

    // Multipart upload
    #[error("Failed to start multipart upload for s3://{bucket}/{key}")]
    StartUpload {
        bucket: String,
        key: String,
        #[source]
        source: BoxError,
    },

    #[error("Failed to upload part {part_number} of s3://{bucket}/{key}")]
    UploadPart {
        part_number: i64,
        bucket: String,
        key: String,
        #[source]
        source: BoxError,
    },

    #[error("Failed to complete multipart upload for s3://{bucket}/{key}")]
    CompleteUpload {
        bucket: String,
        key: String,
        #[source]
        source: BoxError,
    },

    #[error("Failed to abort multipart upload {upload_id} for s3://{bucket}/{key}")]
    AbortUpload {
        bucket: String,
        key: String,
        upload_id: String,
        #[source]
        source: BoxError,
    },

    #[error("Compressed stream needs more than {max_parts} parts of {chunk_size} bytes; use a larger chunk size")]
    TooManyParts { max_parts: usize, chunk_size: usize },

    #[error("No parts were provided for s3://{bucket}/{key}; the multipart upload was aborted")]
    NoParts { bucket: String, key: String },

    // Configuration
    #[error("Configuration file {} does not exist", .path.display())]
    ConfigFileNotFound { path: PathBuf },

    #[error("Permission denied while trying to read configuration file {}", .path.display())]
    ConfigPermission {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read configuration file {}", .path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Error decoding YAML file {}", .path.display())]
    ConfigFormat {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Please provide the 'bucket' option on the command line or in the configuration file")]
    MissingBucket,

    #[error(
        "'expiry' must be an integer between {} and {} seconds, got {expiry}",
        MIN_EXPIRY_SECONDS,
        MAX_EXPIRY_SECONDS
    )]
    ExpiryOutOfRange { expiry: u64 },

    #[error("'chunk_size' must be at least 1 byte")]
    InvalidChunkSize,

    // Client and credentials
    #[error("AWS profile '{profile}' not found")]
    ProfileNotFound {
        profile: String,
        #[source]
        source: BoxError,
    },

    #[error("Failed to resolve AWS credentials")]
    Credentials {
        #[source]
        source: BoxError,
    },

    #[error("Failed to create S3 client")]
    Client {
        #[source]
        source: BoxError,
    },

    // Presigned URLs
    #[error("Failed to generate pre-signed URL for s3://{bucket}/{key}")]
    PresignedUrl {
        bucket: String,
        key: String,
        #[source]
        source: BoxError,
    },
}

impl ShareError {
    /// Wrap this error so it can travel through `std::io::Write` implementations.
    pub fn into_io(self) -> io::Error {
        io::Error::new(io::ErrorKind::Other, self)
    }

    /// This error's message followed by every underlying cause, joined by `": "`.
    pub fn with_causes(&self) -> String {
        let mut message = self.to_string();
        let mut cause = std::error::Error::source(self);
        while let Some(err) = cause {
            message.push_str(": ");
            message.push_str(&err.to_string());
            cause = std::error::Error::source(err);
        }
        message
    }
}
