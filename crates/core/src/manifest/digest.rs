//! Content digest for resource manifests.

use sha2::{Digest, Sha256};

use super::ResourceManifest;

/// Compute the SHA-256 digest of a manifest.
///
/// Entries are hashed in key order as `key\nfingerprint\n`, so the digest
/// does not depend on how the manifest was built.
pub fn compute_manifest_digest(manifest: &ResourceManifest) -> String {
    let mut hasher = Sha256::new();
    for (key, fingerprint) in manifest.iter() {
        hasher.update(key.as_bytes());
        hasher.update(b"\n");
        hasher.update(fingerprint.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}
