use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::constants::{
    CONFIG_FILE_NAME, DEFAULT_CHUNK_SIZE, DEFAULT_EXPIRY_SECONDS, DEFAULT_QUEUE_DEPTH,
    LEGACY_CONFIG_FILE_NAME, MAX_EXPIRY_SECONDS, MIN_EXPIRY_SECONDS, POSIX_CONFIG_SUBDIR,
    S3_MIN_PART_SIZE, WINDOWS_CONFIG_SUBDIR,
};
use crate::errors::{Result, ShareError};
use crate::utils::paths::validate_and_resolve_input_path;

/// Values that may appear in the settings file. Every key is optional.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSettings {
    pub bucket: Option<String>,
    pub expiry: Option<u64>,
    pub profile: Option<String>,
    pub region: Option<String>,
}

/// Values given on the command line; `Some` wins over the settings file.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub path: PathBuf,
    pub bucket: Option<String>,
    pub expiry: Option<u64>,
    pub profile: Option<String>,
    pub region: Option<String>,
    pub key: Option<String>,
    pub chunk_size: Option<usize>,
    pub queue_depth: Option<usize>,
    pub unbounded_queue: bool,
    pub config_file: Option<PathBuf>,
}

/// Fully merged and validated settings for one share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareConfig {
    /// Resolved absolute input path
    pub path: PathBuf,
    pub bucket: String,
    /// Presigned URL lifetime in seconds
    pub expiry: u64,
    pub profile: Option<String>,
    pub region: Option<String>,
    /// Explicit object key; a random-prefixed key is generated when absent
    pub key: Option<String>,
    pub chunk_size: usize,
    /// `None` means an unbounded handoff queue
    pub queue_depth: Option<usize>,
}

/// Where the settings file lives when `--config` is not given.
///
/// `%APPDATA%\s3-share\config.yaml` on Windows, falling back to
/// `~\AppData\Roaming\s3-share\config.yaml` when `APPDATA` is unset or empty;
/// `~/.config/s3-share/config.yaml` elsewhere.
pub fn default_config_path() -> Option<PathBuf> {
    if cfg!(windows) {
        let appdata = env::var_os("APPDATA").map(PathBuf::from);
        let home = env::var_os("USERPROFILE").map(PathBuf::from);
        windows_config_path(appdata.as_deref(), home.as_deref())
    } else {
        let home = env::var_os("HOME").map(PathBuf::from);
        home.map(|home| posix_config_path(&home))
    }
}

fn windows_config_path(appdata: Option<&Path>, home: Option<&Path>) -> Option<PathBuf> {
    let base = match appdata.filter(|p| !p.as_os_str().is_empty()) {
        Some(appdata) => appdata.to_path_buf(),
        None => home?.join("AppData").join("Roaming"),
    };
    Some(base.join(WINDOWS_CONFIG_SUBDIR).join(CONFIG_FILE_NAME))
}

fn posix_config_path(home: &Path) -> PathBuf {
    home.join(POSIX_CONFIG_SUBDIR).join(CONFIG_FILE_NAME)
}

/// Parse a settings file. An empty file yields empty settings.
pub fn read_config_file(path: &Path) -> Result<FileSettings> {
    let content = fs::read_to_string(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => ShareError::ConfigFileNotFound { path: path.to_path_buf() },
        io::ErrorKind::PermissionDenied => ShareError::ConfigPermission {
            path: path.to_path_buf(),
            source,
        },
        _ => ShareError::ConfigRead {
            path: path.to_path_buf(),
            source,
        },
    })?;

    if content.trim().is_empty() {
        return Ok(FileSettings::default());
    }

    let settings: Option<FileSettings> =
        serde_yaml::from_str(&content).map_err(|source| ShareError::ConfigFormat {
            path: path.to_path_buf(),
            source,
        })?;

    debug!("Loaded configuration from {}", path.display());
    Ok(settings.unwrap_or_default())
}

/// Load the settings file named by `explicit`, or the default one.
///
/// A missing default file is not an error; a missing explicit one is.
pub fn load_settings(explicit: Option<&Path>) -> Result<FileSettings> {
    match explicit {
        Some(path) => read_config_file(path),
        None => match default_config_path() {
            Some(path) if path.exists() => read_config_file(&path),
            Some(path) => {
                if let Some(legacy) = legacy_config_file(&path) {
                    warn!(
                        "Ignoring {}: settings are now read from YAML at {}; copy the same keys there",
                        legacy.display(),
                        path.display()
                    );
                }
                debug!("No configuration file at {}, using defaults", path.display());
                Ok(FileSettings::default())
            }
            None => Ok(FileSettings::default()),
        },
    }
}

/// A TOML settings file left next to `config_path` by an earlier release.
fn legacy_config_file(config_path: &Path) -> Option<PathBuf> {
    let legacy = config_path.with_file_name(LEGACY_CONFIG_FILE_NAME);
    legacy.is_file().then_some(legacy)
}

/// Check the merged values.
pub fn validate_config(config: &ShareConfig) -> Result<()> {
    if config.bucket.trim().is_empty() {
        return Err(ShareError::MissingBucket);
    }
    if !(MIN_EXPIRY_SECONDS..=MAX_EXPIRY_SECONDS).contains(&config.expiry) {
        return Err(ShareError::ExpiryOutOfRange { expiry: config.expiry });
    }
    if config.chunk_size == 0 {
        return Err(ShareError::InvalidChunkSize);
    }
    if config.chunk_size < S3_MIN_PART_SIZE {
        warn!(
            "Chunk size {} is below the S3 minimum part size of {} bytes; uploads with more than one part will be rejected",
            config.chunk_size, S3_MIN_PART_SIZE
        );
    }
    Ok(())
}

/// Merge command line values over file settings over defaults, then
/// validate the result and the input path.
pub fn build_config(overrides: ConfigOverrides, settings: FileSettings) -> Result<ShareConfig> {
    let path = validate_and_resolve_input_path(&overrides.path)?;

    let queue_depth = if overrides.unbounded_queue {
        None
    } else {
        Some(overrides.queue_depth.unwrap_or(DEFAULT_QUEUE_DEPTH))
    };

    let config = ShareConfig {
        path,
        bucket: overrides.bucket.or(settings.bucket).unwrap_or_default(),
        expiry: overrides.expiry.or(settings.expiry).unwrap_or(DEFAULT_EXPIRY_SECONDS),
        profile: overrides.profile.or(settings.profile),
        region: overrides.region.or(settings.region),
        key: overrides.key.filter(|k| !k.is_empty()),
        chunk_size: overrides.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE),
        queue_depth,
    };

    validate_config(&config)?;
    Ok(config)
}

/// Load the settings file and build a validated configuration from it.
pub fn verify_and_build_config(overrides: ConfigOverrides) -> Result<ShareConfig> {
    let settings = load_settings(overrides.config_file.as_deref())?;
    build_config(overrides, settings)
}

const CONFIG_TEMPLATE: &str = "\
# s3-share settings. Options given on the command line take precedence.
#
# This file is YAML. Earlier releases read TOML from config.toml; that file
# is no longer loaded, so move its keys here.
#
# bucket: my-share-bucket
# profile: default
# region: us-east-1

# Lifetime of the generated download link in seconds (1 to 604800).
expiry: 3600
";

/// Write a commented settings template to `path`, creating parent directories.
pub fn write_config_template(path: &Path) -> Result<()> {
    let write_error = |source| ShareError::ConfigRead {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_error)?;
    }
    fs::write(path, CONFIG_TEMPLATE).map_err(write_error)?;

    info!("Saved configuration template to {}", path.display());
    Ok(())
}
