use std::time::Duration;

use rusoto_core::Region;
use rusoto_credential::AwsCredentials;
use rusoto_s3::util::{PreSignedRequest, PreSignedRequestOption};
use rusoto_s3::GetObjectRequest;

use crate::constants::{MAX_EXPIRY_SECONDS, MIN_EXPIRY_SECONDS};
use crate::errors::{Result, ShareError};

/// Sign a GET request for `s3://bucket/key` valid for `expiry_secs` seconds.
///
/// Signing happens locally; no request is sent to S3.
pub fn presigned_get_url(
    region: &Region,
    credentials: &AwsCredentials,
    bucket: &str,
    key: &str,
    expiry_secs: u64,
) -> Result<String> {
    let url_error = |reason: String| ShareError::PresignedUrl {
        bucket: bucket.to_string(),
        key: key.to_string(),
        source: reason.into(),
    };

    if bucket.is_empty() || key.is_empty() {
        return Err(url_error("bucket and key must not be empty".to_string()));
    }
    if !(MIN_EXPIRY_SECONDS..=MAX_EXPIRY_SECONDS).contains(&expiry_secs) {
        return Err(url_error(ShareError::ExpiryOutOfRange { expiry: expiry_secs }.to_string()));
    }

    let request = GetObjectRequest {
        bucket: bucket.to_string(),
        key: key.to_string(),
        ..Default::default()
    };
    let option = PreSignedRequestOption {
        expires_in: Duration::from_secs(expiry_secs),
    };

    Ok(request.get_presigned_url(region, credentials, &option))
}
