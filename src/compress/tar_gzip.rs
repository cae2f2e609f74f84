use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use log::debug;
use walkdir::WalkDir;

use crate::compress::{CompressionPhase, Compressor};
use crate::constants::TAR_GZIP_SUFFIX;
use crate::errors::{Result, ShareError};
use crate::progress::ProgressReporter;
use crate::streaming::chunk_writer::ChunkWriter;

/// Gzipped tar archive of a directory tree.
///
/// Entries are stored under the directory's own name, so extracting
/// `reports.tar.gz` recreates `reports/`. Symlinks are archived as links.
#[derive(Debug, Clone)]
pub struct TarGzipCompressor {
    level: Compression,
}

impl Default for TarGzipCompressor {
    fn default() -> Self {
        Self {
            level: Compression::default(),
        }
    }
}

impl TarGzipCompressor {
    pub fn with_level(mut self, level: u32) -> Self {
        self.level = Compression::new(level.min(9));
        self
    }
}

fn walk_error(root: &Path, err: walkdir::Error) -> (PathBuf, io::Error) {
    let path = err.path().unwrap_or(root).to_path_buf();
    (path, io::Error::from(err))
}

impl Compressor for TarGzipCompressor {
    fn compress(
        &self,
        input: &Path,
        sink: &ChunkWriter,
        _chunk_size: usize,
        progress: &dyn ProgressReporter,
    ) -> Result<()> {
        let _phase = CompressionPhase::new(progress);

        let total = self.total_size(input)?;
        progress.start_compression(total);

        let output_error = |source| ShareError::CompressorOutput {
            path: input.to_path_buf(),
            source,
        };

        let root_name = input
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("archive"));

        let mut builder = tar::Builder::new(GzEncoder::new(sink, self.level));
        builder.follow_symlinks(false);

        let mut files = 0u64;
        for entry in WalkDir::new(input).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let (path, source) = walk_error(input, e);
                ShareError::CompressorInput { path, source }
            })?;

            let relative = entry.path().strip_prefix(input).unwrap_or(entry.path());
            let name = root_name.join(relative);

            if entry.file_type().is_file() {
                let mut file = File::open(entry.path()).map_err(|source| ShareError::CompressorInput {
                    path: entry.path().to_path_buf(),
                    source,
                })?;
                let size = file
                    .metadata()
                    .map_err(|source| ShareError::CompressorInput {
                        path: entry.path().to_path_buf(),
                        source,
                    })?
                    .len();

                builder.append_file(&name, &mut file).map_err(output_error)?;
                progress.update_compression(size);
                files += 1;
            } else {
                builder
                    .append_path_with_name(entry.path(), &name)
                    .map_err(|source| ShareError::CompressorInput {
                        path: entry.path().to_path_buf(),
                        source,
                    })?;
            }
        }

        let encoder = builder.into_inner().map_err(output_error)?;
        encoder.finish().map_err(output_error)?;
        sink.close().map_err(output_error)?;

        debug!(
            "Archived {} files ({} bytes) from {} into {} bytes",
            files,
            total,
            input.display(),
            sink.total_enqueued()
        );
        Ok(())
    }

    fn key_suffix(&self) -> &'static str {
        TAR_GZIP_SUFFIX
    }

    fn total_size(&self, input: &Path) -> Result<u64> {
        let mut total_size = 0u64;

        for entry in WalkDir::new(input) {
            let entry = entry.map_err(|e| {
                let (path, source) = walk_error(input, e);
                ShareError::CalculateTotalSize { path, source }
            })?;

            if entry.file_type().is_file() {
                let metadata = entry.metadata().map_err(|e| {
                    let (path, source) = walk_error(input, e);
                    ShareError::CalculateTotalSize { path, source }
                })?;
                total_size += metadata.len();
            }
        }

        Ok(total_size)
    }
}
