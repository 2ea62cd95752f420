//! Encoding of the stored manifest record.
//!
//! The record is the manifest that was active at the last successful
//! activation. It is stored as a single entry whose body is a JSON envelope
//! carrying the manifest digest, so a truncated or tampered body is detected
//! on read instead of being diffed against.

use serde::{Deserialize, Serialize};

use super::ResourceManifest;
use crate::Error;

/// Key of the single entry in the manifest record region.
pub const MANIFEST_RECORD_KEY: &str = "manifest";

#[derive(Debug, Serialize, Deserialize)]
struct ManifestEnvelope {
    digest: String,
    written_at: String,
    resources: ResourceManifest,
}

/// Encode a manifest into a record body.
pub fn encode_record(manifest: &ResourceManifest) -> Result<Vec<u8>, Error> {
    let envelope = ManifestEnvelope {
        digest: manifest.digest(),
        written_at: chrono::Utc::now().to_rfc3339(),
        resources: manifest.clone(),
    };
    serde_json::to_vec(&envelope).map_err(|e| Error::Storage(format!("failed to encode manifest record: {e}")))
}

/// Decode a record body, verifying its digest.
pub fn decode_record(body: &[u8]) -> Result<ResourceManifest, Error> {
    let envelope: ManifestEnvelope =
        serde_json::from_slice(body).map_err(|e| Error::CorruptManifest(format!("undecodable record: {e}")))?;

    let actual = envelope.resources.digest();
    if actual != envelope.digest {
        return Err(Error::CorruptManifest(format!(
            "digest mismatch: recorded {}, computed {actual}",
            envelope.digest
        )));
    }

    Ok(envelope.resources)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_encoded_record() {
        let manifest: ResourceManifest = [("a.js", "h1"), ("/", "h0")].into_iter().collect();
        let body = encode_record(&manifest).unwrap();
        assert_eq!(decode_record(&body).unwrap(), manifest);
    }

    #[test]
    fn test_decode_truncated_record() {
        let manifest: ResourceManifest = [("a.js", "h1")].into_iter().collect();
        let body = encode_record(&manifest).unwrap();
        let result = decode_record(&body[..body.len() / 2]);
        assert!(matches!(result, Err(Error::CorruptManifest(_))));
    }

    #[test]
    fn test_decode_tampered_record() {
        let manifest: ResourceManifest = [("a.js", "h1")].into_iter().collect();
        let body = String::from_utf8(encode_record(&manifest).unwrap()).unwrap();
        let tampered = body.replace("\"h1\"", "\"h2\"");
        let result = decode_record(tampered.as_bytes());
        assert!(matches!(result, Err(Error::CorruptManifest(msg)) if msg.contains("digest mismatch")));
    }

    #[test]
    fn test_decode_bare_manifest_rejected() {
        let result = decode_record(br#"{"a.js": "h1"}"#);
        assert!(matches!(result, Err(Error::CorruptManifest(_))));
    }
}
