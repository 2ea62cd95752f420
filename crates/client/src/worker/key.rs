//! Mapping between URLs, logical resource keys and storage keys.
//!
//! Logical keys are paths relative to the origin without the leading `/`
//! (`main.js`, `assets/logo.png`), except the base document which is
//! [`ROOT_KEY`]. Storage keys are the absolute request URL with any fragment
//! removed.
//!
//! Keys are matched in URL space: every manifest key is resolved against the
//! origin once, so a key such as `assets/my file.png` matches the encoded
//! request path `assets/my%20file.png`.

use std::collections::HashMap;

use precache_core::{Error, ROOT_KEY};
use url::Url;

/// Cache-busting query marker stripped before manifest lookup.
const VERSION_QUERY: &str = "?v=";

/// Manifest keys indexed by the storage key of their resolved URL.
#[derive(Debug, Clone, Default)]
pub struct KeyIndex {
    by_url: HashMap<String, String>,
}

impl KeyIndex {
    pub fn new<'a>(origin: &Url, keys: impl IntoIterator<Item = &'a str>) -> Self {
        let mut by_url = HashMap::new();
        for key in keys {
            match resolve(origin, key) {
                Ok(url) => {
                    by_url.insert(cache_key(&url), key.to_string());
                }
                Err(e) => tracing::warn!(key = %key, error = %e, "manifest key does not resolve; it will never match"),
            }
        }
        Self { by_url }
    }

    /// Logical key for an intercepted request.
    ///
    /// The fragment and a `?v=` suffix are dropped, so the bare origin, an
    /// origin followed by a fragment, and `/?v=...` all map to [`ROOT_KEY`].
    /// Requests to other origins and unknown paths have no key.
    pub fn request_key(&self, url: &Url) -> Option<&str> {
        let identity = cache_key(url);
        let identity = identity.split_once(VERSION_QUERY).map_or(identity.as_str(), |(path, _)| path);
        self.by_url.get(identity).map(String::as_str)
    }

    /// Logical key of a stored entry, used when diffing and pre-fetching.
    ///
    /// Unlike [`KeyIndex::request_key`] the query string is kept, so a
    /// versioned URL never matches a manifest key and is evicted on upgrade.
    pub fn entry_key(&self, stored: &str) -> Option<&str> {
        self.by_url.get(stored).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_url.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_url.is_empty()
    }
}

/// Absolute URL of a manifest key.
pub fn resolve(origin: &Url, key: &str) -> Result<Url, Error> {
    let relative = if key == ROOT_KEY { "" } else { key.trim_start_matches('/') };
    origin
        .join(relative)
        .map_err(|e| Error::InvalidUrl(format!("cannot resolve {key}: {e}")))
}

/// Storage key (request identity) of a URL.
pub fn cache_key(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.into()
}
