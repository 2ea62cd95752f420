//! Versioned resource manifests.
//!
//! A manifest maps every logical resource path of one application build to an
//! opaque content fingerprint. Fingerprints are compared for equality only.
//! The core set lists the paths that must be present before first paint.

pub mod digest;
pub mod record;

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Error;

pub use digest::compute_manifest_digest;
pub use record::{MANIFEST_RECORD_KEY, decode_record, encode_record};

/// Logical key of the site's base document.
pub const ROOT_KEY: &str = "/";

/// Mapping from logical resource path to content fingerprint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(transparent)]
pub struct ResourceManifest(BTreeMap<String, String>);

impl ResourceManifest {
    pub fn new(entries: BTreeMap<String, String>) -> Self {
        Self(entries)
    }

    /// Fingerprint recorded for `key`, if the key is part of this build.
    pub fn fingerprint(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether a cached copy of `key` made under `previous` can be kept.
    ///
    /// The key must still exist in this manifest and carry the same
    /// fingerprint it had in `previous`.
    pub fn is_reusable(&self, previous: &ResourceManifest, key: &str) -> bool {
        match (self.fingerprint(key), previous.fingerprint(key)) {
            (Some(current), Some(old)) => current == old,
            _ => false,
        }
    }

    /// SHA-256 digest of the canonical encoding.
    pub fn digest(&self) -> String {
        compute_manifest_digest(self)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ResourceManifest {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Ordered list of resource paths fetched during install.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(transparent)]
pub struct CoreResourceSet(Vec<String>);

impl CoreResourceSet {
    pub fn new(keys: Vec<String>) -> Self {
        Self(keys)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for CoreResourceSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// The build-time input of one application version.
///
/// Serialized as `{"resources": {...}, "core": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppManifest {
    pub resources: ResourceManifest,
    #[serde(default)]
    pub core: CoreResourceSet,
}

impl AppManifest {
    /// Build and validate a manifest.
    pub fn new(resources: ResourceManifest, core: CoreResourceSet) -> Result<Self, Error> {
        let manifest = Self { resources, core };
        manifest.validate()?;
        Ok(manifest)
    }

    /// Parse and validate a manifest from its JSON encoding.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let manifest: Self =
            serde_json::from_str(json).map_err(|e| Error::InvalidManifest(format!("malformed JSON: {e}")))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Read a manifest file produced by the build.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::InvalidManifest(format!("failed to read {}: {e}", path.display())))?;
        let manifest = Self::from_json(&json)?;

        tracing::debug!(
            path = %path.display(),
            resources = manifest.resources.len(),
            core = manifest.core.len(),
            "loaded resource manifest"
        );

        Ok(manifest)
    }

    /// Check the structural rules of a build manifest.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidManifest` if:
    /// - there are no resources
    /// - a key or fingerprint is empty
    /// - fingerprints differ in length
    /// - a core key is repeated or missing from the resources
    pub fn validate(&self) -> Result<(), Error> {
        if self.resources.is_empty() {
            return Err(Error::InvalidManifest("manifest has no resources".into()));
        }

        let mut width = None;
        for (key, fingerprint) in self.resources.iter() {
            if key.is_empty() {
                return Err(Error::InvalidManifest("empty resource key".into()));
            }
            if fingerprint.is_empty() {
                return Err(Error::InvalidManifest(format!("empty fingerprint for {key}")));
            }
            match width {
                None => width = Some(fingerprint.len()),
                Some(w) if w != fingerprint.len() => {
                    return Err(Error::InvalidManifest(format!(
                        "fingerprint for {key} has length {}, expected {w}",
                        fingerprint.len()
                    )));
                }
                Some(_) => {}
            }
        }

        let mut seen = HashSet::new();
        for key in self.core.iter() {
            if !seen.insert(key) {
                return Err(Error::InvalidManifest(format!("core resource listed twice: {key}")));
            }
            if !self.resources.contains(key) {
                return Err(Error::InvalidManifest(format!("core resource not in manifest: {key}")));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(entries: &[(&str, &str)]) -> ResourceManifest {
        entries.iter().copied().collect()
    }

    #[test]
    fn test_is_reusable() {
        let old = manifest(&[("a.js", "h1"), ("b.js", "h2"), ("d.js", "h4")]);
        let new = manifest(&[("a.js", "h1"), ("c.js", "h3"), ("d.js", "h9")]);

        assert!(new.is_reusable(&old, "a.js"));
        assert!(!new.is_reusable(&old, "b.js"), "removed resource");
        assert!(!new.is_reusable(&old, "c.js"), "added resource");
        assert!(!new.is_reusable(&old, "d.js"), "changed resource");
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "resources": {"/": "aa", "index.html": "aa", "main.js": "bb"},
            "core": ["main.js", "index.html"]
        }"#;
        let parsed = AppManifest::from_json(json).unwrap();
        assert_eq!(parsed.resources.len(), 3);
        assert_eq!(parsed.resources.fingerprint(ROOT_KEY), Some("aa"));
        assert_eq!(parsed.core.iter().collect::<Vec<_>>(), vec!["main.js", "index.html"]);
    }

    #[test]
    fn test_core_defaults_to_empty() {
        let parsed = AppManifest::from_json(r#"{"resources": {"a.js": "h1"}}"#).unwrap();
        assert!(parsed.core.is_empty());
    }

    #[test]
    fn test_validate_core_subset() {
        let result = AppManifest::new(manifest(&[("a.js", "h1")]), ["b.js"].into_iter().collect());
        assert!(matches!(result, Err(Error::InvalidManifest(msg)) if msg.contains("b.js")));
    }

    #[test]
    fn test_validate_duplicate_core() {
        let result = AppManifest::new(manifest(&[("a.js", "h1")]), ["a.js", "a.js"].into_iter().collect());
        assert!(matches!(result, Err(Error::InvalidManifest(msg)) if msg.contains("twice")));
    }

    #[test]
    fn test_validate_fingerprint_width() {
        let result = AppManifest::new(manifest(&[("a.js", "h1"), ("b.js", "h22")]), CoreResourceSet::default());
        assert!(matches!(result, Err(Error::InvalidManifest(msg)) if msg.contains("length")));
    }

    #[test]
    fn test_validate_empty() {
        let result = AppManifest::new(ResourceManifest::default(), CoreResourceSet::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_malformed_json() {
        let result = AppManifest::from_json("{not json");
        assert!(matches!(result, Err(Error::InvalidManifest(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = AppManifest::load("/nonexistent/resource-manifest.json");
        assert!(matches!(result, Err(Error::InvalidManifest(msg)) if msg.contains("failed to read")));
    }
}
