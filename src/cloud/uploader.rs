use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use log::{debug, warn};
use rusoto_core::ByteStream;
use rusoto_s3::{
    AbortMultipartUploadRequest, CompleteMultipartUploadRequest, CompletedMultipartUpload,
    CompletedPart, CreateMultipartUploadRequest, S3Client, UploadPartRequest, S3,
};
use tokio::runtime::Runtime;

use crate::constants::{MAX_RETRY_DELAY_MS, MAX_UPLOAD_RETRIES, RETRY_BASE_DELAY_MS};
use crate::errors::{BoxError, Result, ShareError};

/// Acknowledgement for one uploaded part, needed again when completing the upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPartInfo {
    pub part_number: i64,
    pub e_tag: String,
}

impl From<&CompletedPartInfo> for CompletedPart {
    fn from(part: &CompletedPartInfo) -> Self {
        CompletedPart {
            e_tag: Some(part.e_tag.clone()),
            part_number: Some(part.part_number),
        }
    }
}

/// The four multipart upload operations the coordinator drives.
///
/// Every call blocks until the remote service answers. Implementations must
/// not carry state from one upload into the next.
pub trait Uploader: Send + Sync {
    /// Begin a multipart upload and return its upload id.
    fn start_multipart_upload(&self, bucket: &str, key: &str) -> Result<String>;

    /// Upload one part. `part_number` starts at 1.
    fn upload_part(
        &self,
        chunk: Bytes,
        bucket: &str,
        key: &str,
        part_number: i64,
        upload_id: &str,
    ) -> Result<CompletedPartInfo>;

    /// Assemble the object from `parts`, which must be non-empty and in part order.
    fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPartInfo],
    ) -> Result<()>;

    /// Discard the upload and every part stored for it.
    fn abort_multipart_upload(&self, bucket: &str, key: &str, upload_id: &str) -> Result<()>;
}

/// [`Uploader`] backed by the rusoto S3 client.
///
/// The client is async, so each call is driven to completion on a shared
/// tokio runtime. Failed part uploads are retried with exponential backoff.
pub struct S3Uploader {
    client: Arc<S3Client>,
    runtime: Arc<Runtime>,
    max_retries: usize,
}

impl S3Uploader {
    pub fn new(client: Arc<S3Client>, runtime: Arc<Runtime>) -> Self {
        Self {
            client,
            runtime,
            max_retries: MAX_UPLOAD_RETRIES,
        }
    }

    /// Override how many attempts a single part gets before the upload fails.
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    async fn upload_part_with_retry(
        &self,
        chunk: Bytes,
        bucket: &str,
        key: &str,
        part_number: i64,
        upload_id: &str,
    ) -> std::result::Result<String, BoxError> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            let request = UploadPartRequest {
                bucket: bucket.to_string(),
                key: key.to_string(),
                upload_id: upload_id.to_string(),
                part_number,
                content_length: Some(chunk.len() as i64),
                body: Some(ByteStream::from(chunk.to_vec())),
                ..Default::default()
            };

            match self.client.upload_part(request).await {
                Ok(output) => {
                    return output
                        .e_tag
                        .ok_or_else(|| "No ETag in upload part response".into());
                }
                Err(e) => {
                    if attempts >= self.max_retries {
                        return Err(format!("giving up after {} attempts: {}", attempts, e).into());
                    }

                    let delay = retry_delay(attempts);
                    warn!(
                        "Part {} upload attempt {} failed, retrying in {:?}: {}",
                        part_number, attempts, delay, e
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Backoff before retry number `attempt` (1-based), capped at `MAX_RETRY_DELAY_MS`.
pub(crate) fn retry_delay(attempt: usize) -> Duration {
    let factor = u32::try_from(attempt)
        .ok()
        .and_then(|exp| 2u64.checked_pow(exp))
        .unwrap_or(u64::MAX);
    Duration::from_millis(RETRY_BASE_DELAY_MS.saturating_mul(factor).min(MAX_RETRY_DELAY_MS))
}

impl Uploader for S3Uploader {
    fn start_multipart_upload(&self, bucket: &str, key: &str) -> Result<String> {
        let request = CreateMultipartUploadRequest {
            bucket: bucket.to_string(),
            key: key.to_string(),
            ..Default::default()
        };

        let output = self
            .runtime
            .block_on(self.client.create_multipart_upload(request))
            .map_err(|e| ShareError::StartUpload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                source: e.into(),
            })?;

        let upload_id = output.upload_id.ok_or_else(|| ShareError::StartUpload {
            bucket: bucket.to_string(),
            key: key.to_string(),
            source: "No upload ID returned from S3".into(),
        })?;

        debug!("Started multipart upload with ID: {} for s3://{}/{}", upload_id, bucket, key);
        Ok(upload_id)
    }

    fn upload_part(
        &self,
        chunk: Bytes,
        bucket: &str,
        key: &str,
        part_number: i64,
        upload_id: &str,
    ) -> Result<CompletedPartInfo> {
        let part_error = |source: BoxError| ShareError::UploadPart {
            part_number,
            bucket: bucket.to_string(),
            key: key.to_string(),
            source,
        };

        if part_number < 1 {
            return Err(part_error("part numbers start at 1".into()));
        }

        let size = chunk.len();
        let e_tag = self
            .runtime
            .block_on(self.upload_part_with_retry(chunk, bucket, key, part_number, upload_id))
            .map_err(part_error)?;

        debug!("Uploaded part {} ({} bytes) of s3://{}/{}", part_number, size, bucket, key);
        Ok(CompletedPartInfo { part_number, e_tag })
    }

    fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPartInfo],
    ) -> Result<()> {
        if parts.is_empty() {
            return Err(ShareError::NoParts {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }

        let request = CompleteMultipartUploadRequest {
            bucket: bucket.to_string(),
            key: key.to_string(),
            upload_id: upload_id.to_string(),
            multipart_upload: Some(CompletedMultipartUpload {
                parts: Some(parts.iter().map(CompletedPart::from).collect()),
            }),
            ..Default::default()
        };

        self.runtime
            .block_on(self.client.complete_multipart_upload(request))
            .map_err(|e| ShareError::CompleteUpload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                source: e.into(),
            })?;

        debug!("Completed multipart upload for s3://{}/{} with {} parts", bucket, key, parts.len());
        Ok(())
    }

    fn abort_multipart_upload(&self, bucket: &str, key: &str, upload_id: &str) -> Result<()> {
        let request = AbortMultipartUploadRequest {
            bucket: bucket.to_string(),
            key: key.to_string(),
            upload_id: upload_id.to_string(),
            ..Default::default()
        };

        self.runtime
            .block_on(self.client.abort_multipart_upload(request))
            .map_err(|e| ShareError::AbortUpload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                upload_id: upload_id.to_string(),
                source: e.into(),
            })?;

        debug!("Aborted multipart upload {} for s3://{}/{}", upload_id, bucket, key);
        Ok(())
    }
}
