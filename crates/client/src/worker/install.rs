//! Install step: populate the staging region with the core resources.

use futures_util::future::try_join_all;
use precache_core::{Error, Region};
use serde::Serialize;

use super::CacheWorker;
use super::key::{cache_key, resolve};
use crate::fetch::{CacheMode, FetchResponse, ResourceRequest};

/// Summary of a completed install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    /// Number of core resources written to staging.
    pub staged: usize,
    /// Total body bytes written to staging.
    pub bytes: u64,
}

/// Fetch every core resource, bypassing intermediate caches, and stage them.
///
/// All fetches complete before anything is written, so a failed fetch leaves
/// no staging region behind. A non-2xx response counts as a failure.
pub(super) async fn populate_staging(worker: &CacheWorker) -> Result<InstallReport, Error> {
    let storage = worker.storage.clone();
    let staging_name = &worker.config.names.staging;

    // A previous generation may have left a staging region after a crash.
    storage.delete_region(staging_name).await?;

    let requests = worker
        .manifest
        .core
        .iter()
        .map(|key| {
            resolve(&worker.config.origin, key).map(|url| ResourceRequest::get(url).with_cache_mode(CacheMode::Reload))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let responses = try_join_all(requests.iter().map(|request| fetch_required(worker, request))).await?;

    let staging = Region::open(storage.clone(), staging_name.as_str()).await?;
    let mut bytes = 0u64;
    for response in &responses {
        if let Err(e) = staging.put(&cache_key(&response.url), response.to_cached()).await {
            tracing::warn!(error = %e, "staging write failed; discarding staging region");
            if let Err(cleanup) = storage.delete_region(staging_name).await {
                tracing::warn!(error = %cleanup, "failed to discard staging region");
            }
            return Err(e);
        }
        bytes += response.bytes.len() as u64;
    }

    Ok(InstallReport { staged: responses.len(), bytes })
}

async fn fetch_required(worker: &CacheWorker, request: &ResourceRequest) -> Result<FetchResponse, Error> {
    let response = worker.fetcher.fetch(request).await?;
    if !response.is_ok() {
        return Err(Error::HttpError(format!("{} returned status {}", request.url, response.status.as_u16())));
    }
    Ok(response)
}
