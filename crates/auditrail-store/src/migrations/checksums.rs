//! Checksum validation for migrations
//!
//! SHA256 of the migration SQL, recorded when it is applied

use sha2::{Digest, Sha256};

/// Compute SHA256 checksum of a string
pub fn compute_checksum(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}
