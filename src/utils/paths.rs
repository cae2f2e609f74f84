use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use crate::errors::{Result, ShareError};

/// Resolve `path` to an absolute, symlink-free path that can be read.
///
/// Each way the path can be unusable gets its own error: missing target,
/// dangling symlink, permission denied, or a path the OS rejects outright.
pub fn validate_and_resolve_input_path(path: &Path) -> Result<PathBuf> {
    if path.as_os_str().is_empty() {
        return Err(ShareError::InvalidPath {
            path: path.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "empty path"),
        });
    }

    let resolved = match path.canonicalize() {
        Ok(resolved) => resolved,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let is_symlink = fs::symlink_metadata(path)
                .map(|m| m.file_type().is_symlink())
                .unwrap_or(false);
            return Err(if is_symlink {
                ShareError::BrokenSymlink { path: path.to_path_buf() }
            } else {
                ShareError::PathNotFound { path: path.to_path_buf() }
            });
        }
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            return Err(ShareError::PathNotReadable {
                path: path.to_path_buf(),
                source: e,
            });
        }
        Err(e) => {
            return Err(ShareError::InvalidPath {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };

    check_readable(&resolved)?;
    Ok(resolved)
}

fn check_readable(path: &Path) -> Result<()> {
    let result = if path.is_dir() {
        fs::read_dir(path).map(|_| ())
    } else {
        File::open(path).map(|_| ())
    };

    result.map_err(|source| ShareError::PathNotReadable {
        path: path.to_path_buf(),
        source,
    })
}
