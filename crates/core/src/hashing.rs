use sha2::{Digest, Sha256};

/// Content fingerprint: lowercase hex SHA-256 of the bytes.
pub fn fingerprint(content: &str) -> String {
    sha256_hex(content.as_bytes())
}

/// Blob name for a target. Keyed by identity, not content, so every update overwrites the same slot.
pub fn content_slot(target_id: &str) -> String {
    format!("{}.js", sha256_hex(target_id.as_bytes()))
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
