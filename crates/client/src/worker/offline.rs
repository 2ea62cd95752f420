//! Offline pre-fetch: fill the durable cache with every manifest resource
//! that is not already there.

use std::collections::HashSet;
use std::sync::Arc;

use precache_core::{Error, Region};
use serde::Serialize;
use tokio::task::{JoinError, JoinSet};

use super::CacheWorker;
use super::key::{cache_key, resolve};
use crate::fetch::{Fetcher, ResourceRequest};

/// Summary of a pre-fetch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PrefetchReport {
    /// Manifest resources already present before the run.
    pub already_cached: usize,
    /// Resources fetched and stored by this run.
    pub fetched: usize,
    /// Total body bytes stored by this run.
    pub bytes: u64,
}

/// Manifest keys with no entry among the stored keys of the durable cache.
pub(super) fn missing_keys(worker: &CacheWorker, stored: &[String]) -> Vec<String> {
    let present: HashSet<&str> = stored.iter().filter_map(|stored| worker.keys.entry_key(stored)).collect();

    worker
        .manifest
        .resources
        .keys()
        .filter(|key| !present.contains(*key))
        .map(str::to_string)
        .collect()
}

/// Fetch and store every missing resource with bounded concurrency.
///
/// A slot is freed only after its task's result has been seen, so no new
/// fetch starts once a failure is known. Resources stored before the failure
/// stay cached.
pub(super) async fn download(worker: &CacheWorker) -> Result<PrefetchReport, Error> {
    let persisted = Region::open(worker.storage.clone(), worker.config.names.persisted.as_str()).await?;
    let missing = missing_keys(worker, &persisted.keys().await?);
    let already_cached = worker.manifest.resources.len() - missing.len();
    let mut report = PrefetchReport { already_cached, ..Default::default() };

    if missing.is_empty() {
        return Ok(report);
    }

    let limit = worker.config.prefetch_concurrency.max(1);
    tracing::info!(missing = missing.len(), already_cached, limit, "starting offline pre-fetch");

    let mut join_set = JoinSet::new();
    for key in missing {
        while join_set.len() >= limit {
            let Some(joined) = join_set.join_next().await else { break };
            settle(&mut report, &mut join_set, joined).await?;
        }

        let url = resolve(&worker.config.origin, &key)?;
        join_set.spawn(fetch_and_store(worker.fetcher.clone(), persisted.clone(), ResourceRequest::get(url)));
    }

    while let Some(joined) = join_set.join_next().await {
        settle(&mut report, &mut join_set, joined).await?;
    }

    tracing::info!(fetched = report.fetched, bytes = report.bytes, "offline pre-fetch complete");
    Ok(report)
}

/// Record one finished task, aborting the rest on failure.
async fn settle(
    report: &mut PrefetchReport, join_set: &mut JoinSet<Result<u64, Error>>,
    joined: Result<Result<u64, Error>, JoinError>,
) -> Result<(), Error> {
    let stored = joined
        .map_err(|e| Error::Storage(format!("pre-fetch task failed: {e}")))
        .and_then(|result| result);

    match stored {
        Ok(bytes) => {
            report.fetched += 1;
            report.bytes += bytes;
            Ok(())
        }
        Err(e) => {
            tracing::warn!(error = %e, fetched = report.fetched, "offline pre-fetch aborted");
            join_set.shutdown().await;
            Err(e)
        }
    }
}

async fn fetch_and_store(fetcher: Arc<dyn Fetcher>, persisted: Region, request: ResourceRequest) -> Result<u64, Error> {
    let response = fetcher.fetch(&request).await?;
    if !response.is_ok() {
        return Err(Error::HttpError(format!("{} returned status {}", request.url, response.status.as_u16())));
    }
    persisted.put(&cache_key(&request.url), response.to_cached()).await?;
    Ok(response.bytes.len() as u64)
}
