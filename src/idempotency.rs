use sha2::{Digest, Sha256};

/// Hex SHA-256 over the `|`-joined parts
pub fn compute_recall_key(parts: &[&str]) -> String {
    let canonical = parts.join("|");
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

/// Deterministic identifier for records the provider did not number,
/// e.g. `RECALL-3f2a9c0d1e4b5a67`. The same inputs always yield the same id,
/// so repeated syncs upsert instead of duplicating.
pub fn fallback_recall_id(prefix: &str, parts: &[&str]) -> String {
    let key = compute_recall_key(parts);
    format!("{prefix}-{}", &key[..16])
}
