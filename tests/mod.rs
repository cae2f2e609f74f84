//! Integration test modules for s3-share.
//!
//! These tests drive the public API end to end with in-memory uploaders,
//! so none of them need network access or AWS credentials.

mod streaming_tests;
