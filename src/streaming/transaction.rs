use bytes::Bytes;
use log::{debug, info, warn};

use crate::cloud::uploader::{CompletedPartInfo, Uploader};
use crate::errors::{Result, ShareError};

/// An open multipart upload that is aborted unless it is explicitly committed.
///
/// Dropping an uncommitted transaction aborts it, which covers early returns
/// through `?` as well as unwinding. A failed abort is logged and swallowed so
/// the error that caused it is the one the caller sees.
pub struct MultipartTransaction<'a> {
    uploader: &'a dyn Uploader,
    bucket: &'a str,
    key: &'a str,
    upload_id: String,
    armed: bool,
}

impl<'a> MultipartTransaction<'a> {
    /// Start the upload. Nothing needs cleaning up if this fails.
    pub fn begin(uploader: &'a dyn Uploader, bucket: &'a str, key: &'a str) -> Result<Self> {
        let upload_id = uploader.start_multipart_upload(bucket, key)?;
        info!("Started multipart upload to s3://{}/{}", bucket, key);

        Ok(Self {
            uploader,
            bucket,
            key,
            upload_id,
            armed: true,
        })
    }

    pub fn upload_id(&self) -> &str {
        &self.upload_id
    }

    pub fn upload_part(&self, chunk: Bytes, part_number: i64) -> Result<CompletedPartInfo> {
        self.uploader
            .upload_part(chunk, self.bucket, self.key, part_number, &self.upload_id)
    }

    /// Complete the upload with `parts` in part order.
    ///
    /// An empty part list cannot be completed: the upload is aborted and
    /// [`ShareError::NoParts`] returned. If completion itself fails the
    /// transaction is still armed and gets aborted on drop.
    pub fn commit(mut self, parts: &[CompletedPartInfo]) -> Result<()> {
        if parts.is_empty() {
            self.abort_logged();
            return Err(ShareError::NoParts {
                bucket: self.bucket.to_string(),
                key: self.key.to_string(),
            });
        }

        self.uploader
            .complete_multipart_upload(self.bucket, self.key, &self.upload_id, parts)?;
        self.armed = false;

        info!(
            "Completed multipart upload to s3://{}/{} ({} parts)",
            self.bucket,
            self.key,
            parts.len()
        );
        Ok(())
    }

    /// Abort now and report whether the abort itself succeeded.
    pub fn abort(mut self) -> Result<()> {
        self.armed = false;
        self.uploader
            .abort_multipart_upload(self.bucket, self.key, &self.upload_id)
    }

    fn abort_logged(&mut self) {
        if !self.armed {
            return;
        }
        self.armed = false;

        debug!("Aborting multipart upload {} for s3://{}/{}", self.upload_id, self.bucket, self.key);
        if let Err(e) = self
            .uploader
            .abort_multipart_upload(self.bucket, self.key, &self.upload_id)
        {
            warn!("{}", abort_failure_message(&e));
        }
    }
}

fn abort_failure_message(err: &ShareError) -> String {
    format!("Ignoring failed abort: {}", err.with_causes())
}

impl Drop for MultipartTransaction<'_> {
    fn drop(&mut self) {
        self.abort_logged();
    }
}
