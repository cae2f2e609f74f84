use std::path::Path;
use std::sync::Arc;
use std::thread;

use crossbeam::channel::Receiver;
use log::{error, info};

use crate::cloud::uploader::{CompletedPartInfo, Uploader};
use crate::compress::Compressor;
use crate::constants::{DEFAULT_CHUNK_SIZE, DEFAULT_QUEUE_DEPTH, S3_MAX_PARTS};
use crate::errors::{Result, ShareError};
use crate::progress::{ByteCounter, ProgressReporter};
use crate::streaming::chunk_writer::ChunkWriter;
use crate::streaming::queue::{HandoffQueue, QueueItem};
use crate::streaming::transaction::MultipartTransaction;
use crate::utils::keys::object_key;

/// Runs compression and multipart upload as one transaction.
///
/// The compressor runs on its own thread and writes into a [`ChunkWriter`];
/// the calling thread drains the queue and uploads each chunk as the next
/// part. The upload is completed only when both sides succeed and is aborted
/// otherwise.
pub struct Coordinator {
    compressor: Arc<dyn Compressor>,
    uploader: Arc<dyn Uploader>,
    progress: Arc<dyn ProgressReporter>,
    chunk_size: usize,
    queue_depth: Option<usize>,
    uploaded_bytes: ByteCounter,
}

impl Coordinator {
    pub fn new(
        compressor: Arc<dyn Compressor>,
        uploader: Arc<dyn Uploader>,
        progress: Arc<dyn ProgressReporter>,
    ) -> Self {
        Self {
            compressor,
            uploader,
            progress,
            chunk_size: DEFAULT_CHUNK_SIZE,
            queue_depth: Some(DEFAULT_QUEUE_DEPTH),
            uploaded_bytes: ByteCounter::new(),
        }
    }

    /// Part size for every part but the last. Zero is treated as one byte.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// How many chunks may wait for upload before compression blocks.
    /// `None` never blocks compression.
    pub fn with_queue_depth(mut self, queue_depth: Option<usize>) -> Self {
        self.queue_depth = queue_depth;
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Bytes uploaded by this coordinator so far, across all calls.
    pub fn uploaded_bytes(&self) -> u64 {
        self.uploaded_bytes.get()
    }

    /// The explicit key if one is given, otherwise the input name plus the
    /// compressor's suffix.
    pub fn resolve_key(&self, input: &Path, key: Option<&str>) -> String {
        match key.filter(|k| !k.is_empty()) {
            Some(key) => key.to_string(),
            None => object_key(input, self.compressor.key_suffix()),
        }
    }

    /// Compress `input` and upload it to `bucket`, returning the object key.
    ///
    /// Any failure on either side aborts the multipart upload before the
    /// original error is returned. A stream that produced no chunks is
    /// aborted and reported as [`ShareError::NoParts`].
    pub fn archive_and_upload(&self, input: &Path, bucket: &str, key: Option<&str>) -> Result<String> {
        let key = self.resolve_key(input, key);
        info!("Uploading {} to s3://{}/{}", input.display(), bucket, key);

        let transaction = MultipartTransaction::begin(self.uploader.as_ref(), bucket, &key)?;

        // The compressed size is unknown until the stream ends.
        self.progress.start_upload(0, 0);
        let _upload_phase = UploadPhase(self.progress.as_ref());

        let parts = self.stream_parts(input, &transaction).map_err(|e| {
            error!("Upload to s3://{}/{} failed, aborting: {}", bucket, key, e);
            e
        })?;
        transaction.commit(&parts)?;

        Ok(key)
    }

    /// Run the producer thread and drain its chunks into uploaded parts.
    fn stream_parts(
        &self,
        input: &Path,
        transaction: &MultipartTransaction<'_>,
    ) -> Result<Vec<CompletedPartInfo>> {
        let (sender, receiver) = HandoffQueue::with_depth(self.queue_depth);
        let writer = ChunkWriter::new(sender, self.chunk_size);

        let compressor = self.compressor.as_ref();
        let progress = self.progress.as_ref();
        let chunk_size = self.chunk_size;

        thread::scope(|scope| -> Result<Vec<CompletedPartInfo>> {
            let producer = thread::Builder::new()
                .name("s3-share-compress".to_string())
                .spawn_scoped(scope, move || {
                    let writer = writer;
                    compressor.compress(input, &writer, chunk_size, progress)
                })
                .map_err(|source| ShareError::ThreadSpawn { source })?;

            let drained = self.drain(&receiver, transaction);

            // Unblocks a producer waiting on a full queue after an upload failure.
            drop(receiver);
            let produced = producer.join();

            match (drained, produced) {
                (Err(e), _) if !matches!(e, ShareError::StreamTruncated) => Err(e),
                (_, Err(_)) => Err(ShareError::ProducerPanicked),
                (_, Ok(Err(e))) => Err(e),
                (drained, Ok(Ok(()))) => drained,
            }
        })
    }

    fn drain(
        &self,
        receiver: &Receiver<QueueItem>,
        transaction: &MultipartTransaction<'_>,
    ) -> Result<Vec<CompletedPartInfo>> {
        let mut parts = Vec::new();
        let mut part_number: i64 = 0;
        let mut uploaded: u64 = 0;

        loop {
            let chunk = match receiver.recv() {
                Ok(QueueItem::Chunk(chunk)) => chunk,
                Ok(QueueItem::Done) => break,
                Err(_) => return Err(ShareError::StreamTruncated),
            };

            part_number += 1;
            if part_number as usize > S3_MAX_PARTS {
                return Err(ShareError::TooManyParts {
                    max_parts: S3_MAX_PARTS,
                    chunk_size: self.chunk_size,
                });
            }

            let len = chunk.len() as u64;
            let part = transaction.upload_part(chunk, part_number)?;
            parts.push(part);

            uploaded += len;
            self.uploaded_bytes.add(len);
            self.progress.update_upload(len);
        }

        info!("Uploaded {} bytes in {} parts", uploaded, parts.len());
        Ok(parts)
    }
}

struct UploadPhase<'a>(&'a dyn ProgressReporter);

impl Drop for UploadPhase<'_> {
    fn drop(&mut self) {
        self.0.finish_upload();
    }
}
