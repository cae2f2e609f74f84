//! Input path validation and object key generation.
//!
//! ```no_run
//! use s3_share::utils::{keys, paths};
//! use std::path::Path;
//!
//! # fn example() -> s3_share::errors::Result<()> {
//! let input = paths::validate_and_resolve_input_path(Path::new("./reports"))?;
//! let key = keys::prefixed_object_key(&input, ".tar.gz");
//! println!("Uploading to {}", key);
//! # Ok(())
//! # }
//! ```

/// Random prefixes and object keys
pub mod keys;

/// Input path validation
pub mod paths;
