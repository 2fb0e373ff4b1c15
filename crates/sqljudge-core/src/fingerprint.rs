use sha2::{Digest, Sha256};

pub fn sha256_hex(s: &str) -> String {
    let mut h = Sha256::new();
    h.update(s.as_bytes());
    hex::encode(h.finalize())
}

/// Stable fingerprint of an accepted query. Statements are normalized
/// (split, trimmed, joined with `;\n`) so formatting noise around statement
/// boundaries does not change the hash.
pub fn query_fingerprint(query: &str) -> String {
    let canonical = crate::translate::split_statements(query).join(";\n");
    sha256_hex(&canonical)
}
