//! Connection hashing for cache keys.

use sha2::{Digest, Sha256};

/// A stable hex hash of a connection descriptor, used to key cached
/// metadata without storing the descriptor itself.
pub fn compute_hash(payload: &serde_json::Value) -> String {
    let canonical = payload.to_string();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}
