//! Request interception.
//!
//! Only GET requests for keys present in the manifest are handled; everything
//! else is declined so the host falls through to the network. The base
//! document is served online-first, all other resources cache-first.

use precache_core::{Error, ROOT_KEY, Region};
use serde::Serialize;

use super::CacheWorker;
use super::key::cache_key;
use crate::fetch::{FetchResponse, Method, ResourceRequest};

/// Where a handled response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Cache,
    Network,
}

/// Result of offering a request to the worker.
#[derive(Debug)]
pub enum Interception {
    /// Not a worker resource; the host should perform the request itself.
    Declined,
    /// The worker produced a response.
    Responded { response: FetchResponse, source: ResponseSource },
}

impl Interception {
    pub fn is_declined(&self) -> bool {
        matches!(self, Self::Declined)
    }
}

pub(super) async fn handle(worker: &CacheWorker, request: &ResourceRequest) -> Result<Interception, Error> {
    if request.method != Method::GET {
        return Ok(Interception::Declined);
    }

    let Some(key) = worker.keys.request_key(&request.url) else {
        tracing::trace!(url = %request.url, "not a manifest resource; declining");
        return Ok(Interception::Declined);
    };

    if key == ROOT_KEY { online_first(worker, request).await } else { cache_first(worker, request).await }
}

/// Serve from the durable cache, falling back to a live fetch that is cached
/// only when its status is ok.
async fn cache_first(worker: &CacheWorker, request: &ResourceRequest) -> Result<Interception, Error> {
    let persisted = Region::open(worker.storage.clone(), worker.config.names.persisted.as_str()).await?;
    let storage_key = cache_key(&request.url);

    if let Some(hit) = persisted.get(&storage_key).await? {
        tracing::debug!(url = %request.url, "cache hit");
        let response = FetchResponse::from_cached(hit)?;
        return Ok(Interception::Responded { response, source: ResponseSource::Cache });
    }

    let response = worker.fetcher.fetch(request).await?;
    if response.is_ok() {
        store_copy(&persisted, &storage_key, &response).await;
    } else {
        tracing::debug!(url = %request.url, status = response.status.as_u16(), "not caching non-ok response");
    }

    Ok(Interception::Responded { response, source: ResponseSource::Network })
}

/// Always try the network first for the base document; fall back to the
/// cached copy only when the fetch itself fails.
async fn online_first(worker: &CacheWorker, request: &ResourceRequest) -> Result<Interception, Error> {
    let storage_key = cache_key(&request.url);

    let network_err = match worker.fetcher.fetch(request).await {
        Ok(response) => {
            if response.is_ok() {
                match Region::open(worker.storage.clone(), worker.config.names.persisted.as_str()).await {
                    Ok(persisted) => store_copy(&persisted, &storage_key, &response).await,
                    Err(e) => tracing::warn!(url = %request.url, error = %e, "failed to open cache for root document"),
                }
            }
            return Ok(Interception::Responded { response, source: ResponseSource::Network });
        }
        Err(e) => e,
    };

    tracing::debug!(url = %request.url, error = %network_err, "root document fetch failed; trying cache");

    let cached = match Region::open(worker.storage.clone(), worker.config.names.persisted.as_str()).await {
        Ok(persisted) => persisted.get(&storage_key).await,
        Err(e) => Err(e),
    };

    match cached {
        Ok(Some(hit)) => {
            let response = FetchResponse::from_cached(hit)?;
            Ok(Interception::Responded { response, source: ResponseSource::Cache })
        }
        Ok(None) => Err(network_err),
        Err(e) => {
            tracing::warn!(url = %request.url, error = %e, "cache lookup failed during fallback");
            Err(network_err)
        }
    }
}

/// Write a copy of a live response. A failed write only costs a future
/// cache miss, so it is logged rather than returned.
async fn store_copy(persisted: &Region, storage_key: &str, response: &FetchResponse) {
    if let Err(e) = persisted.put(storage_key, response.to_cached()).await {
        tracing::warn!(url = %response.url, error = %e, "failed to cache response");
    }
}
