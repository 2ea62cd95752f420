//! In-process storage backend.
//!
//! Uses nested maps behind a tokio RwLock. Entries live as long as the
//! `MemoryStorage` value (and its clones).

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CachedResponse, StorageBackend};
use crate::Error;

type Regions = HashMap<String, BTreeMap<String, CachedResponse>>;

/// Storage regions held in memory.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    regions: Arc<RwLock<Regions>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the regions that currently exist, sorted.
    pub async fn region_names(&self) -> Vec<String> {
        let regions = self.regions.read().await;
        let mut names: Vec<String> = regions.keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn open_region(&self, name: &str) -> Result<(), Error> {
        let mut regions = self.regions.write().await;
        regions.entry(name.to_string()).or_default();
        Ok(())
    }

    async fn has_region(&self, name: &str) -> Result<bool, Error> {
        Ok(self.regions.read().await.contains_key(name))
    }

    async fn put(&self, region: &str, key: &str, entry: CachedResponse) -> Result<(), Error> {
        let mut regions = self.regions.write().await;
        regions
            .entry(region.to_string())
            .or_default()
            .insert(key.to_string(), entry);
        Ok(())
    }

    async fn get(&self, region: &str, key: &str) -> Result<Option<CachedResponse>, Error> {
        let regions = self.regions.read().await;
        Ok(regions.get(region).and_then(|entries| entries.get(key)).cloned())
    }

    async fn delete(&self, region: &str, key: &str) -> Result<bool, Error> {
        let mut regions = self.regions.write().await;
        Ok(regions
            .get_mut(region)
            .is_some_and(|entries| entries.remove(key).is_some()))
    }

    async fn keys(&self, region: &str) -> Result<Vec<String>, Error> {
        let regions = self.regions.read().await;
        Ok(regions
            .get(region)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn delete_region(&self, name: &str) -> Result<bool, Error> {
        Ok(self.regions.write().await.remove(name).is_some())
    }
}
