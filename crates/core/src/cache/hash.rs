//! Cache fingerprint generation.

use sha2::{Digest, Sha256};

/// Compute the cache fingerprint for a target.
///
/// The digest covers the URI and, when present, the client identity, so the
/// same URI fetched under different identities is cached separately. The
/// prefix namespaces the key: `"{prefix}::{hex}"`.
pub fn fingerprint(prefix: &str, uri: &str, identity: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(uri.as_bytes());
    if let Some(identity) = identity {
        hasher.update(b"\n");
        hasher.update(identity.as_bytes());
    }
    format!("{prefix}::{}", hex::encode(hasher.finalize()))
}
