//! Named storage regions for cached resources.
//!
//! The worker keeps three regions: the durable resource cache, the transient
//! staging area filled during install, and the manifest record store. Each
//! region is a keyed collection of [`CachedResponse`] entries.
//!
//! Backends implement [`StorageBackend`]; callers work through a [`Region`]
//! handle that is opened at the start of an operation and dropped at its end.
//!
//! - [`SqliteStorage`]: durable, WAL-mode SQLite with migrations
//! - [`MemoryStorage`]: in-process maps, for tests and ephemeral hosts

pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

pub use crate::Error;

pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

/// A stored response, addressed by request identity within a region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    /// Absolute URL the response was fetched from
    pub url: String,
    /// HTTP status code
    pub status: u16,
    /// Content-Type header
    pub content_type: Option<String>,
    /// Response headers in received order
    pub headers: Vec<(String, String)>,
    /// Response body bytes
    pub body: Bytes,
    /// RFC 3339 timestamp of when the entry was written
    pub stored_at: String,
}

impl CachedResponse {
    /// Build an entry stamped with the current time.
    pub fn new(url: impl Into<String>, status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            url: url.into(),
            status,
            content_type: None,
            headers: Vec::new(),
            body: body.into(),
            stored_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }
}

/// Keyed storage regions addressed by name.
///
/// Writing to a region that does not exist creates it. Reads from a missing
/// region behave as reads from an empty one.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Create the region if it does not exist.
    async fn open_region(&self, name: &str) -> Result<(), Error>;

    /// Whether the region exists.
    async fn has_region(&self, name: &str) -> Result<bool, Error>;

    /// Insert or replace an entry.
    async fn put(&self, region: &str, key: &str, entry: CachedResponse) -> Result<(), Error>;

    async fn get(&self, region: &str, key: &str) -> Result<Option<CachedResponse>, Error>;

    /// Remove an entry. Returns whether it existed.
    async fn delete(&self, region: &str, key: &str) -> Result<bool, Error>;

    /// All keys of the region, sorted.
    async fn keys(&self, region: &str) -> Result<Vec<String>, Error>;

    /// Drop the region and every entry in it. Returns whether it existed.
    async fn delete_region(&self, name: &str) -> Result<bool, Error>;
}

/// Handle to one named region for the duration of an operation.
#[derive(Clone)]
pub struct Region {
    backend: Arc<dyn StorageBackend>,
    name: String,
}

impl Region {
    /// Open (creating if needed) the named region.
    pub async fn open(backend: Arc<dyn StorageBackend>, name: impl Into<String>) -> Result<Self, Error> {
        let name = name.into();
        backend.open_region(&name).await?;
        Ok(Self { backend, name })
    }

    pub async fn put(&self, key: &str, entry: CachedResponse) -> Result<(), Error> {
        self.backend.put(&self.name, key, entry).await
    }

    pub async fn get(&self, key: &str) -> Result<Option<CachedResponse>, Error> {
        self.backend.get(&self.name, key).await
    }

    pub async fn delete(&self, key: &str) -> Result<bool, Error> {
        self.backend.delete(&self.name, key).await
    }

    pub async fn keys(&self) -> Result<Vec<String>, Error> {
        self.backend.keys(&self.name).await
    }

    pub async fn len(&self) -> Result<usize, Error> {
        Ok(self.keys().await?.len())
    }

    /// Delete the whole region, consuming the handle.
    pub async fn destroy(self) -> Result<bool, Error> {
        self.backend.delete_region(&self.name).await
    }
}

impl std::fmt::Debug for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Region").field("name", &self.name).finish()
    }
}
