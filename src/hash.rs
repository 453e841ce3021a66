//! Content addressing for cache-busting filenames.
//!
//! Digests are MD5, rendered as 32 lowercase hex characters. Only the bytes
//! go into the digest, never process state, so names are reproducible across
//! machines and runs.

/// Length of a rendered digest.
pub const DIGEST_LEN: usize = 32;

pub fn content_hash(bytes: &[u8]) -> String {
    format!("{:x}", md5::compute(bytes))
}

/// Digest of the entry bundle: its module definitions, the finalized config
/// block and its appended content, in that order.
pub fn entry_hash(contents: &[u8], config_block: &str, append_contents: &[u8]) -> String {
    let mut input = Vec::with_capacity(contents.len() + config_block.len() + append_contents.len());
    input.extend_from_slice(contents);
    input.extend_from_slice(config_block.as_bytes());
    input.extend_from_slice(append_contents);
    content_hash(&input)
}

/// `vendor` + digest → `vendor.<digest>.js`
pub fn hashed_filename(bundle_name: &str, digest: &str) -> String {
    format!("{bundle_name}.{digest}.js")
}
