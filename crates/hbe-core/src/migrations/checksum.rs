//! Migration checksums
//!
//! SHA-256 over the raw file contents, used to detect edits to migrations
//! that have already been applied.

use sha2::{Digest, Sha256};

/// Compute the hex-encoded SHA-256 checksum of a migration script
pub fn compute_checksum(sql: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(sql.as_bytes());
    hex::encode(hasher.finalize())
}
