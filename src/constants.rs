//! Global constants for the s3-share application.
//!
//! This module centralizes all hardcoded values to improve maintainability
//! and make configuration changes easier.

// Streaming constants
/// Default size of each multipart part produced by the chunk writer (5MB, the S3 minimum)
pub const DEFAULT_CHUNK_SIZE: usize = 5 * 1024 * 1024;

/// S3 minimum part size for multipart uploads (5MB); only the last part may be smaller
pub const S3_MIN_PART_SIZE: usize = 5 * 1024 * 1024;

/// S3 maximum parts per upload
pub const S3_MAX_PARTS: usize = 10000;

/// Default number of chunks the handoff queue holds before the compressor blocks
pub const DEFAULT_QUEUE_DEPTH: usize = 4;

// Timeout and retry constants
/// Maximum upload retry attempts for a single part
pub const MAX_UPLOAD_RETRIES: usize = 3;

/// Base retry delay in milliseconds
pub const RETRY_BASE_DELAY_MS: u64 = 250;

/// Longest wait between part upload attempts (30 seconds)
pub const MAX_RETRY_DELAY_MS: u64 = 30_000;

/// Progress is logged every time it advances by this many percent
pub const PROGRESS_LOG_STEP_PERCENT: u64 = 5;

// Object key constants
/// Length of the random prefix put in front of generated object keys
pub const RANDOM_PREFIX_LENGTH: usize = 12;

/// Object key suffix for a single compressed file
pub const GZIP_SUFFIX: &str = ".gz";

/// Object key suffix for a compressed directory archive
pub const TAR_GZIP_SUFFIX: &str = ".tar.gz";

// Presigned URL constants
/// Default lifetime of a presigned URL (1 hour)
pub const DEFAULT_EXPIRY_SECONDS: u64 = 3600;

/// Shortest allowed presigned URL lifetime
pub const MIN_EXPIRY_SECONDS: u64 = 1;

/// Longest allowed presigned URL lifetime (7 days, the SigV4 maximum)
pub const MAX_EXPIRY_SECONDS: u64 = 7 * 24 * 60 * 60;

// Configuration file constants
/// Name of the settings file
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// TOML settings file written by earlier releases; detected only to warn about it
pub const LEGACY_CONFIG_FILE_NAME: &str = "config.toml";

/// Directory holding the settings file, relative to the home directory on POSIX systems
pub const POSIX_CONFIG_SUBDIR: &str = ".config/s3-share";

/// Directory holding the settings file, relative to %APPDATA% on Windows
pub const WINDOWS_CONFIG_SUBDIR: &str = "s3-share";
