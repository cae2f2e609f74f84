use std::io::IsTerminal;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{info, LevelFilter};
use simplelog::{Config, TermLogger, TerminalMode, ColorChoice};

use s3_share::cli::{Args, Commands};
use s3_share::cloud::client::S3Session;
use s3_share::compress::{Archiver, Compressor};
use s3_share::config::{default_config_path, verify_and_build_config, write_config_template, ShareConfig};
use s3_share::progress::{BarProgressReporter, LogProgressReporter, ProgressReporter};
use s3_share::streaming::Coordinator;
use s3_share::utils::keys::prefixed_object_key;

fn main() -> Result<()> {
    // Parse arguments
    let args = Args::parse();

    // Initialize logging
    initialize_logging(args.verbose)?;

    // Handle subcommands
    if let Some(cmd) = &args.command {
        return handle_subcommand(cmd);
    }

    // Settings and input path are checked before anything touches S3
    let config = verify_and_build_config(args.overrides())
        .context("Invalid configuration")?;

    let session = S3Session::connect(config.region.as_deref(), config.profile.as_deref())
        .context("Failed to set up S3 session")?;

    let key = upload(&config, &session, &args)?;

    let url = session
        .presigned_url(&config.bucket, &key, config.expiry)
        .context("Upload succeeded but no download link could be created")?;

    info!("Shared s3://{}/{} for {} seconds", config.bucket, key, config.expiry);
    println!("{}", url);
    Ok(())
}

/// Initialize logging with the specified verbosity level
fn initialize_logging(verbose: bool) -> Result<()> {
    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    TermLogger::init(
        log_level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    ).context("Failed to initialize logger")?;
    Ok(())
}

/// Handle subcommands (init-config)
fn handle_subcommand(cmd: &Commands) -> Result<()> {
    match cmd {
        Commands::InitConfig { path } => {
            let path = match path {
                Some(path) => path.clone(),
                None => default_config_path()
                    .ok_or_else(|| anyhow!("Could not determine the home directory; pass a path to init-config"))?,
            };
            info!("Creating configuration file at {}", path.display());
            write_config_template(&path)?;
            info!("Configuration created successfully");
            Ok(())
        }
    }
}

/// Compress and upload the input, returning the object key it was stored under.
fn upload(config: &ShareConfig, session: &S3Session, args: &Args) -> Result<String> {
    let mut archiver = Archiver::for_path(&config.path);
    if let Some(level) = args.compression_level {
        archiver = archiver.with_level(level);
    }

    let key = match &config.key {
        Some(key) => key.clone(),
        None => prefixed_object_key(&config.path, archiver.key_suffix()),
    };

    let progress: Arc<dyn ProgressReporter> = if args.no_progress || !std::io::stderr().is_terminal() {
        Arc::new(LogProgressReporter::new())
    } else {
        Arc::new(BarProgressReporter::new())
    };

    let coordinator = Coordinator::new(Arc::new(archiver), Arc::new(session.uploader()), progress)
        .with_chunk_size(config.chunk_size)
        .with_queue_depth(config.queue_depth);

    coordinator
        .archive_and_upload(&config.path, &config.bucket, Some(&key))
        .with_context(|| format!("Failed to share {}", config.path.display()))
}
