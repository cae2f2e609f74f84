use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::ConfigOverrides;

/// Command-line arguments for s3-share.
///
/// Values given here override the settings file, which overrides the
/// built-in defaults.
#[derive(Parser, Debug)]
#[clap(
    name = "s3-share",
    about = "Compress a file or directory, upload it to S3 and print a download link",
    args_conflicts_with_subcommands = true,
    subcommand_negates_reqs = true
)]
pub struct Args {
    /// File or directory to share
    #[clap(required = true)]
    pub path: Option<PathBuf>,

    /// S3 bucket to upload into
    #[clap(short, long)]
    pub bucket: Option<String>,

    /// Lifetime of the download link in seconds (default: 3600)
    #[clap(short, long)]
    pub expiry: Option<u64>,

    /// AWS profile to use for credentials
    #[clap(short, long)]
    pub profile: Option<String>,

    /// AWS region of the bucket
    #[clap(long)]
    pub region: Option<String>,

    /// Object key to upload to (default: <random-prefix>/<name>.gz or .tar.gz)
    #[clap(short, long)]
    pub key: Option<String>,

    /// Path to configuration YAML file
    #[clap(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Size of each uploaded part in MB
    #[clap(long, default_value = "5", help = "Size of each uploaded part in MB")]
    pub chunk_size_mb: usize,

    /// Number of parts buffered between compression and upload
    #[clap(long)]
    pub queue_depth: Option<usize>,

    /// Let compression run ahead of the upload without limit
    #[clap(long, conflicts_with = "queue_depth")]
    pub unbounded_queue: bool,

    /// gzip compression level (0-9)
    #[clap(long, value_parser = clap::value_parser!(u32).range(0..=9))]
    pub compression_level: Option<u32>,

    /// Log progress instead of drawing progress bars
    #[clap(long)]
    pub no_progress: bool,

    /// Verbose logging
    #[clap(short, long)]
    pub verbose: bool,

    /// Subcommands
    #[clap(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a configuration file template
    InitConfig {
        /// Path to output configuration file (default: the standard location)
        path: Option<PathBuf>,
    },
}

impl Args {
    /// Command line values to merge over the settings file.
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            path: self.path.clone().unwrap_or_default(),
            bucket: self.bucket.clone(),
            expiry: self.expiry,
            profile: self.profile.clone(),
            region: self.region.clone(),
            key: self.key.clone(),
            chunk_size: Some(self.chunk_size_mb.saturating_mul(1024 * 1024)),
            queue_depth: self.queue_depth,
            unbounded_queue: self.unbounded_queue,
            config_file: self.config.clone(),
        }
    }
}
