use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use flate2::{Compression, GzBuilder};
use log::debug;

use crate::compress::{CompressionPhase, Compressor};
use crate::constants::GZIP_SUFFIX;
use crate::errors::{Result, ShareError};
use crate::progress::ProgressReporter;
use crate::streaming::chunk_writer::ChunkWriter;

/// Gzip stream compression of a single file.
#[derive(Debug, Clone)]
pub struct GzipCompressor {
    level: Compression,
}

impl Default for GzipCompressor {
    fn default() -> Self {
        Self {
            level: Compression::default(),
        }
    }
}

impl GzipCompressor {
    pub fn with_level(mut self, level: u32) -> Self {
        self.level = Compression::new(level.min(9));
        self
    }
}

impl Compressor for GzipCompressor {
    fn compress(
        &self,
        input: &Path,
        sink: &ChunkWriter,
        chunk_size: usize,
        progress: &dyn ProgressReporter,
    ) -> Result<()> {
        let _phase = CompressionPhase::new(progress);

        let total = self.total_size(input)?;
        progress.start_compression(total);

        let input_error = |source| ShareError::CompressorInput {
            path: input.to_path_buf(),
            source,
        };
        let output_error = |source| ShareError::CompressorOutput {
            path: input.to_path_buf(),
            source,
        };

        let mut file = File::open(input).map_err(input_error)?;

        let name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut encoder = GzBuilder::new().filename(name).write(sink, self.level);

        let mut buffer = vec![0u8; chunk_size.max(1)];
        loop {
            let read = file.read(&mut buffer).map_err(input_error)?;
            if read == 0 {
                break;
            }
            encoder.write_all(&buffer[..read]).map_err(output_error)?;
            progress.update_compression(read as u64);
        }

        encoder.finish().map_err(output_error)?;
        sink.close().map_err(output_error)?;

        debug!("Compressed {} ({} bytes) into {} bytes", input.display(), total, sink.total_enqueued());
        Ok(())
    }

    fn key_suffix(&self) -> &'static str {
        GZIP_SUFFIX
    }

    fn total_size(&self, input: &Path) -> Result<u64> {
        fs::metadata(input)
            .map(|m| m.len())
            .map_err(|source| ShareError::CalculateTotalSize {
                path: input.to_path_buf(),
                source,
            })
    }
}
