//! Amazon S3 integration.
//!
//! [`uploader::Uploader`] is the seam the streaming coordinator talks to;
//! [`uploader::S3Uploader`] implements it over rusoto. [`client::S3Session`]
//! resolves region and credentials once per run and hands out uploaders and
//! presigned download URLs.
//!
//! ```no_run
//! use s3_share::cloud::client::S3Session;
//!
//! # fn example() -> s3_share::errors::Result<()> {
//! let session = S3Session::connect(Some("us-west-2"), None)?;
//! let uploader = session.uploader();
//! let url = session.presigned_url("my-bucket", "abc123/report.pdf.gz", 3600)?;
//! # let _ = (uploader, url);
//! # Ok(())
//! # }
//! ```

/// Region, credential and client resolution
pub mod client;

/// Presigned download URLs
pub mod presign;

/// Multipart upload operations
pub mod uploader;
