use sha2::{Digest, Sha256};

use crate::error::{AnnotatorError, Result};

/// SHA-256 of the content, hex encoded
pub fn fingerprint(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Fail unless `content` still hashes to `expected`
pub fn ensure_unchanged(expected: &str, content: &str) -> Result<()> {
    let actual = fingerprint(content);
    if actual != expected {
        return Err(AnnotatorError::HashMismatch {
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}
