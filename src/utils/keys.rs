use std::path::Path;

use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::constants::RANDOM_PREFIX_LENGTH;

/// Random alphanumeric string of `length` characters.
pub fn generate_random_prefix(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// `<name><suffix>`, where `name` is the last component of `path`.
pub fn object_key(path: &Path, suffix: &str) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "archive".to_string());
    format!("{}{}", name, suffix)
}

/// `<prefix>/<name><suffix>`.
pub fn object_key_with_prefix(prefix: &str, path: &Path, suffix: &str) -> String {
    format!("{}/{}", prefix, object_key(path, suffix))
}

/// Object key under a fresh random prefix, so repeated shares of the same
/// name never overwrite each other.
pub fn prefixed_object_key(path: &Path, suffix: &str) -> String {
    object_key_with_prefix(&generate_random_prefix(RANDOM_PREFIX_LENGTH), path, suffix)
}
