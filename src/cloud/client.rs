use std::sync::Arc;

use log::{debug, warn};
use rusoto_core::{HttpClient, Region};
use rusoto_credential::{
    AwsCredentials, DefaultCredentialsProvider, ProfileProvider, ProvideAwsCredentials,
    StaticProvider,
};
use rusoto_s3::S3Client;
use tokio::runtime::Runtime;

use crate::cloud::presign::presigned_get_url;
use crate::cloud::uploader::S3Uploader;
use crate::errors::{BoxError, Result, ShareError};

/// Resolved region, credentials and client for one run of the tool.
///
/// Credentials are fetched once up front so an unknown profile fails before
/// any compression starts, and so the same credentials can sign download URLs.
pub struct S3Session {
    client: Arc<S3Client>,
    region: Region,
    credentials: AwsCredentials,
    runtime: Arc<Runtime>,
}

impl S3Session {
    pub fn connect(region_name: Option<&str>, profile: Option<&str>) -> Result<Self> {
        let runtime = Arc::new(Runtime::new().map_err(|e| ShareError::Client { source: e.into() })?);
        let region = resolve_region(region_name);

        let credentials = match profile {
            Some(profile_name) => {
                let mut provider = ProfileProvider::new().map_err(|e| ShareError::ProfileNotFound {
                    profile: profile_name.to_string(),
                    source: e.into(),
                })?;
                provider.set_profile(profile_name);
                profile_credentials(&runtime, &provider, profile_name)?
            }
            None => {
                let provider = DefaultCredentialsProvider::new()
                    .map_err(|e| ShareError::Credentials { source: e.into() })?;
                runtime
                    .block_on(provider.credentials())
                    .map_err(|e| ShareError::Credentials { source: e.into() })?
            }
        };

        let http_client = HttpClient::new().map_err(|e| ShareError::Client { source: e.into() })?;
        let client = S3Client::new_with(
            http_client,
            StaticProvider::from(credentials.clone()),
            region.clone(),
        );

        debug!("Created S3 client for region {}", region.name());

        Ok(Self {
            client: Arc::new(client),
            region,
            credentials,
            runtime,
        })
    }

    pub fn client(&self) -> Arc<S3Client> {
        Arc::clone(&self.client)
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn credentials(&self) -> &AwsCredentials {
        &self.credentials
    }

    pub fn runtime(&self) -> Arc<Runtime> {
        Arc::clone(&self.runtime)
    }

    /// An uploader sharing this session's client and runtime.
    pub fn uploader(&self) -> S3Uploader {
        S3Uploader::new(self.client(), self.runtime())
    }

    /// Time-limited download URL for `s3://bucket/key`.
    pub fn presigned_url(&self, bucket: &str, key: &str, expiry_secs: u64) -> Result<String> {
        presigned_get_url(&self.region, &self.credentials, bucket, key, expiry_secs)
    }
}

/// Parse a region name, falling back to the environment's default region.
pub fn resolve_region(region_name: Option<&str>) -> Region {
    match region_name {
        Some(name) => match name.parse::<Region>() {
            Ok(r) => r,
            Err(_) => {
                warn!("Invalid region '{}', using default", name);
                Region::default()
            }
        },
        None => Region::default(),
    }
}

fn profile_credentials(
    runtime: &Runtime,
    provider: &ProfileProvider,
    profile_name: &str,
) -> Result<AwsCredentials> {
    runtime
        .block_on(provider.credentials())
        .map_err(|e| ShareError::ProfileNotFound {
            profile: profile_name.to_string(),
            source: BoxError::from(e),
        })
}
