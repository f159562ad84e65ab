use sha2::{Digest, Sha256};

use super::Location;

/// Computes a deterministic SHA-256 hex digest from the rule ID, location
/// file path, location start line, and the matched content. Stable across
/// runs for identical inputs, making it suitable for deduplication and
/// change tracking between scans.
///
/// Each component is separated by a NUL byte to avoid ambiguous
/// concatenations (e.g. rule "ab" + path "c" vs rule "a" + path "bc").
pub fn compute_fingerprint(rule_id: &str, location: &Location, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(rule_id.as_bytes());
    hasher.update([0]);
    hasher.update(location.file_path.as_bytes());
    hasher.update([0]);
    hasher.update(location.start_line.to_string().as_bytes());
    hasher.update([0]);
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
