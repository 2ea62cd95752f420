//! Versioned resource cache worker.
//!
//! ### Regions
//! - Durable cache: resources addressed by request URL, kept across upgrades
//!   while their fingerprint is unchanged.
//! - Staging: core resources downloaded during install, promoted on activate.
//! - Manifest record: the manifest of the last successful activation.
//!
//! ### Events
//! - `install`: stage the core set (fails as a whole; the host retries).
//! - `activate`: diff against the stored manifest and promote staging, or
//!   reset every region on failure.
//! - `handle_fetch`: cache-first for resources, online-first for the root.
//! - `handle_message`: `skipWaiting` and `downloadOffline` control messages.
//!
//! Each event runs as its own task; several fetch interceptions may be in
//! flight at once. Concurrent writes to the same storage key are not
//! coordinated and the last writer wins.

mod activate;
mod host;
mod install;
mod intercept;
pub mod key;
mod offline;

#[cfg(test)]
mod test_support;

use std::str::FromStr;
use std::sync::Arc;

use precache_core::manifest::{MANIFEST_RECORD_KEY, decode_record};
use precache_core::{AppConfig, AppManifest, Error, StorageBackend};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use url::Url;

pub use activate::{ActivationOutcome, ActivationPath, ActivationReport};
pub use host::{DetachedHost, LifecycleHost};
pub use install::InstallReport;
pub use intercept::{Interception, ResponseSource};
pub use offline::PrefetchReport;

use self::key::KeyIndex;
use crate::fetch::{Fetcher, ResourceRequest, parse_origin};

/// Names of the three storage regions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheNames {
    pub persisted: String,
    pub staging: String,
    pub manifest_store: String,
}

impl Default for CacheNames {
    fn default() -> Self {
        let config = AppConfig::default();
        Self { persisted: config.cache_name, staging: config.staging_name, manifest_store: config.manifest_store_name }
    }
}

/// Static settings of a worker generation.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Origin every manifest key resolves against.
    pub origin: Url,
    pub names: CacheNames,
    /// Parallel fetches during offline pre-fetch.
    pub prefetch_concurrency: usize,
}

impl WorkerConfig {
    pub fn new(origin: Url) -> Self {
        Self { origin, names: CacheNames::default(), prefetch_concurrency: 4 }
    }

    pub fn from_app_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = parse_origin(&config.origin).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self {
            origin,
            names: CacheNames {
                persisted: config.cache_name.clone(),
                staging: config.staging_name.clone(),
                manifest_store: config.manifest_store_name.clone(),
            },
            prefetch_concurrency: config.prefetch_concurrency.max(1),
        })
    }
}

/// Lifecycle state of the worker generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Created; not yet installed, or the last install failed.
    Parsed,
    Installing,
    /// Core resources are staged; waiting for activation.
    Installed,
    Activating,
    /// Activation ran to completion (successfully or via reset).
    Activated,
    /// Uninstalled; all regions deleted.
    Redundant,
}

/// Control messages accepted from client pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ControlMessage {
    /// Activate a waiting generation immediately.
    SkipWaiting,
    /// Pre-fetch every manifest resource not yet cached.
    DownloadOffline,
}

impl FromStr for ControlMessage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "skipWaiting" => Ok(Self::SkipWaiting),
            "downloadOffline" => Ok(Self::DownloadOffline),
            other => Err(Error::InvalidInput(format!("unknown control message: {other}"))),
        }
    }
}

/// Result of a control message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "message", rename_all = "camelCase")]
pub enum MessageOutcome {
    SkippedWaiting,
    Prefetched(PrefetchReport),
}

/// Snapshot of the worker and its regions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStatus {
    pub state: WorkerState,
    pub origin: String,
    /// Resources in the current manifest.
    pub manifest_resources: usize,
    /// Entries in the durable cache.
    pub cached_entries: usize,
    /// Entries waiting in staging.
    pub staged_entries: usize,
    /// Manifest resources with no durable entry.
    pub missing_offline: usize,
    /// Digest of the stored manifest record, if one exists and is intact.
    pub stored_manifest_digest: Option<String>,
    /// Whether the stored record matches the current manifest.
    pub up_to_date: bool,
}

/// The cache worker for one manifest generation.
pub struct CacheWorker {
    config: WorkerConfig,
    manifest: Arc<AppManifest>,
    keys: KeyIndex,
    storage: Arc<dyn StorageBackend>,
    fetcher: Arc<dyn Fetcher>,
    host: Arc<dyn LifecycleHost>,
    state: RwLock<WorkerState>,
}

impl CacheWorker {
    pub fn new(
        config: WorkerConfig, manifest: AppManifest, storage: Arc<dyn StorageBackend>, fetcher: Arc<dyn Fetcher>,
        host: Arc<dyn LifecycleHost>,
    ) -> Self {
        let keys = KeyIndex::new(&config.origin, manifest.resources.keys());
        Self {
            config,
            manifest: Arc::new(manifest),
            keys,
            storage,
            fetcher,
            host,
            state: RwLock::new(WorkerState::Parsed),
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn manifest(&self) -> &AppManifest {
        &self.manifest
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    async fn set_state(&self, state: WorkerState) {
        *self.state.write().await = state;
    }

    /// Install this generation: supersede any waiting one and stage the core set.
    ///
    /// Failure is returned to the host, which owns retry and backoff.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        self.set_state(WorkerState::Installing).await;
        self.host.skip_waiting();

        match install::populate_staging(self).await {
            Ok(report) => {
                tracing::info!(staged = report.staged, bytes = report.bytes, "worker installed");
                self.set_state(WorkerState::Installed).await;
                Ok(report)
            }
            Err(e) => {
                tracing::warn!(error = %e, "install failed");
                self.set_state(WorkerState::Parsed).await;
                Err(e)
            }
        }
    }

    /// Activate this generation. Never fails: an error resets every region
    /// and is reported as [`ActivationOutcome::Failed`].
    pub async fn activate(&self) -> ActivationOutcome {
        self.set_state(WorkerState::Activating).await;

        let outcome = match activate::run(self).await {
            Ok(report) => {
                tracing::info!(
                    path = ?report.path,
                    retained = report.retained,
                    evicted = report.evicted,
                    promoted = report.promoted,
                    manifest = %report.manifest_digest,
                    "worker activated"
                );
                self.host.claim_clients();
                ActivationOutcome::Success(report)
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to upgrade worker cache; resetting all regions");
                activate::reset(self).await;
                ActivationOutcome::Failed { reason: e.to_string() }
            }
        };

        self.set_state(WorkerState::Activated).await;
        outcome
    }

    /// Offer a request to the worker.
    pub async fn handle_fetch(&self, request: &ResourceRequest) -> Result<Interception, Error> {
        intercept::handle(self, request).await
    }

    /// Fetch and store every manifest resource missing from the durable cache.
    pub async fn download_offline(&self) -> Result<PrefetchReport, Error> {
        offline::download(self).await
    }

    pub async fn handle_message(&self, message: ControlMessage) -> Result<MessageOutcome, Error> {
        tracing::debug!(?message, "control message");
        match message {
            ControlMessage::SkipWaiting => {
                self.host.skip_waiting();
                Ok(MessageOutcome::SkippedWaiting)
            }
            ControlMessage::DownloadOffline => Ok(MessageOutcome::Prefetched(self.download_offline().await?)),
        }
    }

    /// Delete every region and retire this generation.
    pub async fn uninstall(&self) -> Result<(), Error> {
        let names = &self.config.names;
        for name in [&names.persisted, &names.staging, &names.manifest_store] {
            self.storage.delete_region(name).await?;
        }
        self.set_state(WorkerState::Redundant).await;
        tracing::info!("worker uninstalled");
        Ok(())
    }

    pub async fn status(&self) -> Result<CacheStatus, Error> {
        let names = &self.config.names;
        let cached = self.storage.keys(&names.persisted).await?;
        let missing_offline = offline::missing_keys(self, &cached).len();
        let staged_entries = self.storage.keys(&names.staging).await?.len();

        let stored_manifest_digest = match self.storage.get(&names.manifest_store, MANIFEST_RECORD_KEY).await? {
            Some(record) => match decode_record(&record.body) {
                Ok(manifest) => Some(manifest.digest()),
                Err(e) => {
                    tracing::warn!(error = %e, "stored manifest record is corrupt");
                    None
                }
            },
            None => None,
        };
        let up_to_date = stored_manifest_digest.as_deref() == Some(self.manifest.resources.digest().as_str());

        Ok(CacheStatus {
            state: self.state().await,
            origin: self.config.origin.origin().ascii_serialization(),
            manifest_resources: self.manifest.resources.len(),
            cached_entries: cached.len(),
            staged_entries,
            missing_offline,
            stored_manifest_digest,
            up_to_date,
        })
    }

    /// Keys currently held in the durable cache.
    pub async fn cached_keys(&self) -> Result<Vec<String>, Error> {
        self.storage.keys(&self.config.names.persisted).await
    }
}
