//! In-process doubles for driving a worker in tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use precache_core::manifest::{MANIFEST_RECORD_KEY, decode_record};
use precache_core::{
    AppManifest, CachedResponse, CoreResourceSet, Error, MemoryStorage, ResourceManifest, StorageBackend,
};
use reqwest::{StatusCode, header};
use url::Url;

use super::{CacheWorker, LifecycleHost, WorkerConfig};
use crate::fetch::{CacheMode, FetchResponse, Fetcher, ResourceRequest};

pub const ORIGIN: &str = "https://app.test";

const PERSISTED: &str = "app-cache";
const STAGING: &str = "app-temp-cache";
const RECORDS: &str = "app-manifest";

fn route_key(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut url) => {
            url.set_fragment(None);
            url.into()
        }
        Err(_) => url.to_string(),
    }
}

enum Route {
    Respond(u16, Bytes),
    Fail,
}

/// Scripted network. Unrouted URLs answer 404.
#[derive(Default)]
pub struct StubFetcher {
    routes: Mutex<HashMap<String, Route>>,
    calls: Mutex<Vec<(String, CacheMode)>>,
}

impl StubFetcher {
    pub fn respond(&self, url: &str, status: u16, body: &str) {
        let route = Route::Respond(status, Bytes::copy_from_slice(body.as_bytes()));
        self.routes.lock().unwrap().insert(route_key(url), route);
    }

    /// Make every fetch of `url` fail at the transport level.
    pub fn fail(&self, url: &str) {
        self.routes.lock().unwrap().insert(route_key(url), Route::Fail);
    }

    pub fn calls(&self) -> Vec<(String, CacheMode)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, request: &ResourceRequest) -> Result<FetchResponse, Error> {
        let url = route_key(request.url.as_str());
        self.calls.lock().unwrap().push((url.clone(), request.cache_mode));

        let (status, body) = match self.routes.lock().unwrap().get(&url) {
            Some(Route::Respond(status, body)) => (*status, body.clone()),
            Some(Route::Fail) => return Err(Error::Network(format!("connection refused: {url}"))),
            None => (404, Bytes::new()),
        };

        Ok(FetchResponse {
            url: request.url.clone(),
            status: StatusCode::from_u16(status).unwrap(),
            content_type: Some("text/plain".to_string()),
            headers: header::HeaderMap::new(),
            bytes: body,
            fetch_ms: 1,
        })
    }
}

/// Host that counts lifecycle calls.
#[derive(Default)]
pub struct RecordingHost {
    skip_waiting: AtomicUsize,
    claims: AtomicUsize,
}

impl RecordingHost {
    pub fn skip_waiting_calls(&self) -> usize {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    pub fn claim_calls(&self) -> usize {
        self.claims.load(Ordering::SeqCst)
    }
}

impl LifecycleHost for RecordingHost {
    fn skip_waiting(&self) {
        self.skip_waiting.fetch_add(1, Ordering::SeqCst);
    }

    fn claim_clients(&self) {
        self.claims.fetch_add(1, Ordering::SeqCst);
    }
}

/// Memory storage that can be told to reject writes to a region.
#[derive(Default)]
pub struct FaultyStorage {
    inner: MemoryStorage,
    failing: Mutex<HashSet<String>>,
}

impl FaultyStorage {
    pub fn fail_puts_to(&self, region: &str) {
        self.failing.lock().unwrap().insert(region.to_string());
    }
}

#[async_trait]
impl StorageBackend for FaultyStorage {
    async fn open_region(&self, name: &str) -> Result<(), Error> {
        self.inner.open_region(name).await
    }

    async fn has_region(&self, name: &str) -> Result<bool, Error> {
        self.inner.has_region(name).await
    }

    async fn put(&self, region: &str, key: &str, entry: CachedResponse) -> Result<(), Error> {
        if self.failing.lock().unwrap().contains(region) {
            return Err(Error::Storage(format!("disk full writing {key} to {region}")));
        }
        self.inner.put(region, key, entry).await
    }

    async fn get(&self, region: &str, key: &str) -> Result<Option<CachedResponse>, Error> {
        self.inner.get(region, key).await
    }

    async fn delete(&self, region: &str, key: &str) -> Result<bool, Error> {
        self.inner.delete(region, key).await
    }

    async fn keys(&self, region: &str) -> Result<Vec<String>, Error> {
        self.inner.keys(region).await
    }

    async fn delete_region(&self, name: &str) -> Result<bool, Error> {
        self.inner.delete_region(name).await
    }
}

/// A worker wired to in-memory doubles, plus handles to inspect them.
pub struct Harness {
    pub worker: CacheWorker,
    pub storage: MemoryStorage,
    pub fetcher: Arc<StubFetcher>,
    pub host: Arc<RecordingHost>,
    backend: Arc<dyn StorageBackend>,
    concurrency: usize,
}

fn manifest(resources: &[(&str, &str)], core: &[&str]) -> AppManifest {
    let resources: ResourceManifest = resources.iter().copied().collect();
    let core: CoreResourceSet = core.iter().copied().collect();
    AppManifest::new(resources, core).unwrap()
}

impl Harness {
    pub fn new(resources: &[(&str, &str)], core: &[&str]) -> Self {
        let storage = MemoryStorage::new();
        Self::build(Arc::new(storage.clone()), storage, Arc::new(StubFetcher::default()), 4, resources, core)
    }

    pub fn with_concurrency(concurrency: usize, resources: &[(&str, &str)], core: &[&str]) -> Self {
        let storage = MemoryStorage::new();
        Self::build(Arc::new(storage.clone()), storage, Arc::new(StubFetcher::default()), concurrency, resources, core)
    }

    pub fn with_backend(backend: Arc<FaultyStorage>, resources: &[(&str, &str)], core: &[&str]) -> Self {
        let storage = backend.inner.clone();
        Self::build(backend, storage, Arc::new(StubFetcher::default()), 4, resources, core)
    }

    /// The next build: same storage and network, new manifest and host.
    pub fn upgrade(&self, resources: &[(&str, &str)], core: &[&str]) -> Self {
        Self::build(self.backend.clone(), self.storage.clone(), self.fetcher.clone(), self.concurrency, resources, core)
    }

    fn build(
        backend: Arc<dyn StorageBackend>, storage: MemoryStorage, fetcher: Arc<StubFetcher>, concurrency: usize,
        resources: &[(&str, &str)], core: &[&str],
    ) -> Self {
        let mut config = WorkerConfig::new(Url::parse(ORIGIN).unwrap());
        config.prefetch_concurrency = concurrency;
        let host = Arc::new(RecordingHost::default());
        let worker =
            CacheWorker::new(config, manifest(resources, core), backend.clone(), fetcher.clone(), host.clone());
        Self { worker, storage, fetcher, host, backend, concurrency }
    }

    pub async fn seed(&self, region: &str, key: &str, body: &str) {
        let url = if key.contains("://") { key.to_string() } else { format!("{ORIGIN}/{key}") };
        let entry = CachedResponse::new(url, 200, Bytes::copy_from_slice(body.as_bytes()));
        self.storage.put(region, key, entry).await.unwrap();
    }

    pub async fn persisted_keys(&self) -> Vec<String> {
        self.storage.keys(PERSISTED).await.unwrap()
    }

    pub async fn staging_keys(&self) -> Vec<String> {
        self.storage.keys(STAGING).await.unwrap()
    }

    pub async fn has_region(&self, name: &str) -> bool {
        self.storage.has_region(name).await.unwrap()
    }

    pub async fn persisted_body(&self, url: &str) -> Option<Bytes> {
        self.storage.get(PERSISTED, url).await.unwrap().map(|entry| entry.body)
    }

    pub async fn stored_manifest(&self) -> Option<ResourceManifest> {
        let record = self.storage.get(RECORDS, MANIFEST_RECORD_KEY).await.unwrap()?;
        Some(decode_record(&record.body).unwrap())
    }
}
