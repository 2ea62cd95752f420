//! Activation: promote staged resources into the durable cache.
//!
//! ### Paths
//! - No stored manifest: the durable cache is recreated empty, then every
//!   staged entry is copied in.
//! - Stored manifest present: every durable entry whose key left the manifest
//!   or whose fingerprint changed is evicted; unchanged entries stay. Staged
//!   entries are then copied over the survivors.
//!
//! Both paths finish by dropping the staging region and writing the new
//! manifest record. Any error along the way is handled by [`reset`], which
//! deletes all three regions so the next activation starts from scratch.

use precache_core::manifest::{MANIFEST_RECORD_KEY, decode_record, encode_record};
use precache_core::{CachedResponse, Error, Region, ResourceManifest};
use serde::Serialize;

use super::CacheWorker;
use super::key::resolve;

/// Which branch of the activation state machine ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationPath {
    /// First install, or the previous activation failed and was reset.
    NoPriorManifest,
    /// Upgrade from a successfully activated manifest.
    HasPriorManifest,
}

/// Summary of a successful activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivationReport {
    pub path: ActivationPath,
    /// Durable entries kept because their fingerprint did not change.
    pub retained: usize,
    /// Durable entries removed (changed, dropped, or wiped on first install).
    pub evicted: usize,
    /// Staged entries copied into the durable cache.
    pub promoted: usize,
    /// Digest of the manifest now stored as the active record.
    pub manifest_digest: String,
}

/// Result of one activation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActivationOutcome {
    /// The new manifest was written and the durable cache reflects it.
    Success(ActivationReport),
    /// All regions were reset; the worker is active with a cold cache.
    Failed { reason: String },
}

impl ActivationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

pub(super) async fn run(worker: &CacheWorker) -> Result<ActivationReport, Error> {
    let names = &worker.config.names;
    let storage = worker.storage.clone();

    let mut persisted = Region::open(storage.clone(), names.persisted.as_str()).await?;
    let staging = Region::open(storage.clone(), names.staging.as_str()).await?;
    let records = Region::open(storage.clone(), names.manifest_store.as_str()).await?;

    let previous = match records.get(MANIFEST_RECORD_KEY).await? {
        Some(record) => Some(decode_record(&record.body)?),
        None => None,
    };

    let current = &worker.manifest.resources;
    let (path, retained, evicted) = match previous {
        None => {
            let evicted = persisted.len().await?;
            persisted.destroy().await?;
            persisted = Region::open(storage.clone(), names.persisted.as_str()).await?;
            (ActivationPath::NoPriorManifest, 0, evicted)
        }
        Some(previous) => {
            let (retained, evicted) = evict_stale(worker, &persisted, current, &previous).await?;
            (ActivationPath::HasPriorManifest, retained, evicted)
        }
    };

    let mut promoted = 0;
    for key in staging.keys().await? {
        let entry = staging
            .get(&key)
            .await?
            .ok_or_else(|| Error::Storage(format!("staged entry vanished: {key}")))?;
        persisted.put(&key, entry).await?;
        promoted += 1;
    }
    staging.destroy().await?;

    let record_url = resolve(&worker.config.origin, MANIFEST_RECORD_KEY)?;
    let record = CachedResponse::new(record_url.as_str(), 200, encode_record(current)?)
        .with_content_type("application/json");
    records.put(MANIFEST_RECORD_KEY, record).await?;

    Ok(ActivationReport { path, retained, evicted, promoted, manifest_digest: current.digest() })
}

/// Delete every durable entry that cannot be reused under `current`.
///
/// Returns `(retained, evicted)`.
async fn evict_stale(
    worker: &CacheWorker, persisted: &Region, current: &ResourceManifest, previous: &ResourceManifest,
) -> Result<(usize, usize), Error> {
    let mut retained = 0;
    let mut evicted = 0;

    for stored in persisted.keys().await? {
        let reusable = worker
            .keys
            .entry_key(&stored)
            .is_some_and(|key| current.is_reusable(previous, key));
        if reusable {
            retained += 1;
        } else {
            persisted.delete(&stored).await?;
            evicted += 1;
        }
    }

    Ok((retained, evicted))
}

/// Delete all three regions after a failed activation.
///
/// Errors here are logged and swallowed; there is nothing left to fall back to.
pub(super) async fn reset(worker: &CacheWorker) {
    let names = &worker.config.names;
    for name in [&names.persisted, &names.staging, &names.manifest_store] {
        if let Err(e) = worker.storage.delete_region(name).await {
            tracing::error!(region = %name, error = %e, "failed to delete region during reset");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{FaultyStorage, Harness, ORIGIN};
    use super::*;
    use crate::worker::WorkerState;
    use bytes::Bytes;
    use std::sync::Arc;

    fn url(key: &str) -> String {
        format!("{ORIGIN}/{key}")
    }

    #[tokio::test]
    async fn test_first_activation_promotes_staging() {
        let harness = Harness::new(&[("a.js", "h1"), ("b.js", "h2")], &["a.js"]);
        harness.seed("app-cache", &url("leftover.js"), "old").await;
        harness.seed("app-temp-cache", &url("a.js"), "a v1").await;

        let outcome = harness.worker.activate().await;

        let ActivationOutcome::Success(report) = outcome else { panic!("expected successful activation") };
        assert_eq!(report.path, ActivationPath::NoPriorManifest);
        assert_eq!(report.evicted, 1);
        assert_eq!(report.promoted, 1);
        assert_eq!(harness.persisted_keys().await, vec![url("a.js")]);
        assert!(!harness.has_region("app-temp-cache").await);
        assert_eq!(harness.stored_manifest().await, Some(harness.worker.manifest().resources.clone()));
        assert_eq!(harness.host.claim_calls(), 1);
        assert_eq!(harness.worker.state().await, WorkerState::Activated);
    }

    #[tokio::test]
    async fn test_upgrade_diffs_against_stored_manifest() {
        let v1 = Harness::new(&[("a.js", "h1"), ("b.js", "h2")], &[]);
        assert!(v1.worker.activate().await.is_success());
        v1.seed("app-cache", &url("a.js"), "a v1").await;
        v1.seed("app-cache", &url("b.js"), "b v1").await;

        let v2 = v1.upgrade(&[("a.js", "h1"), ("c.js", "h3")], &["c.js"]);
        v2.seed("app-temp-cache", &url("c.js"), "c v2").await;

        let outcome = v2.worker.activate().await;

        let ActivationOutcome::Success(report) = outcome else { panic!("expected successful activation") };
        assert_eq!(report.path, ActivationPath::HasPriorManifest);
        assert_eq!(report.retained, 1);
        assert_eq!(report.evicted, 1);
        assert_eq!(report.promoted, 1);
        assert_eq!(v2.persisted_keys().await, vec![url("a.js"), url("c.js")]);
        assert_eq!(v2.persisted_body(&url("a.js")).await, Some(Bytes::from_static(b"a v1")));
        assert_eq!(v2.stored_manifest().await, Some(v2.worker.manifest().resources.clone()));
    }

    #[tokio::test]
    async fn test_upgrade_replaces_changed_resource_with_staged_copy() {
        let v1 = Harness::new(&[("main.js", "h1"), ("logo.png", "h2")], &["main.js"]);
        v1.seed("app-temp-cache", &url("main.js"), "main v1").await;
        assert!(v1.worker.activate().await.is_success());
        v1.seed("app-cache", &url("logo.png"), "logo v1").await;

        let v2 = v1.upgrade(&[("main.js", "h9"), ("logo.png", "h8")], &["main.js"]);
        v2.seed("app-temp-cache", &url("main.js"), "main v2").await;

        assert!(v2.worker.activate().await.is_success());

        assert_eq!(v2.persisted_body(&url("main.js")).await, Some(Bytes::from_static(b"main v2")));
        assert_eq!(v2.persisted_body(&url("logo.png")).await, None, "changed non-core resource must be evicted");
    }

    #[tokio::test]
    async fn test_upgrade_evicts_versioned_and_foreign_entries() {
        let v1 = Harness::new(&[("main.js", "h1")], &[]);
        assert!(v1.worker.activate().await.is_success());
        v1.seed("app-cache", &url("main.js?v=17"), "versioned").await;
        v1.seed("app-cache", "https://cdn.test/main.js", "foreign").await;
        v1.seed("app-cache", &url("main.js"), "main").await;

        let v2 = v1.upgrade(&[("main.js", "h1")], &[]);
        let outcome = v2.worker.activate().await;

        let ActivationOutcome::Success(report) = outcome else { panic!("expected successful activation") };
        assert_eq!(report.retained, 1);
        assert_eq!(report.evicted, 2);
        assert_eq!(v2.persisted_keys().await, vec![url("main.js")]);
    }

    #[tokio::test]
    async fn test_upgrade_retains_unchanged_encoded_keys() {
        let v1 = Harness::new(&[("assets/my file.png", "h1"), ("assets/café.png", "h2")], &[]);
        assert!(v1.worker.activate().await.is_success());
        v1.seed("app-cache", &url("assets/my%20file.png"), "space").await;
        v1.seed("app-cache", &url("assets/caf%C3%A9.png"), "accent").await;

        let v2 = v1.upgrade(&[("assets/my file.png", "h1"), ("assets/café.png", "h9")], &[]);
        let outcome = v2.worker.activate().await;

        let ActivationOutcome::Success(report) = outcome else { panic!("expected successful activation") };
        assert_eq!(report.retained, 1);
        assert_eq!(report.evicted, 1);
        assert_eq!(v2.persisted_keys().await, vec![url("assets/my%20file.png")]);
    }

    #[tokio::test]
    async fn test_corrupt_record_triggers_full_reset() {
        let harness = Harness::new(&[("a.js", "h1")], &["a.js"]);
        harness.seed("app-cache", &url("a.js"), "a").await;
        harness.seed("app-temp-cache", &url("a.js"), "a").await;
        harness.seed("app-manifest", MANIFEST_RECORD_KEY, "{truncated").await;

        let outcome = harness.worker.activate().await;

        assert!(matches!(&outcome, ActivationOutcome::Failed { reason } if reason.contains("MANIFEST_CORRUPT")));
        assert!(!harness.has_region("app-cache").await);
        assert!(!harness.has_region("app-temp-cache").await);
        assert!(!harness.has_region("app-manifest").await);
        assert_eq!(harness.host.claim_calls(), 0);
        assert_eq!(harness.worker.state().await, WorkerState::Activated);
    }

    #[tokio::test]
    async fn test_storage_failure_mid_copy_resets_everything() {
        let faulty = Arc::new(FaultyStorage::default());
        let harness = Harness::with_backend(faulty.clone(), &[("a.js", "h1"), ("b.js", "h2")], &["a.js", "b.js"]);
        harness.seed("app-temp-cache", &url("a.js"), "a").await;
        harness.seed("app-temp-cache", &url("b.js"), "b").await;
        faulty.fail_puts_to("app-cache");

        let outcome = harness.worker.activate().await;

        assert!(!outcome.is_success());
        assert!(!harness.has_region("app-cache").await);
        assert!(!harness.has_region("app-temp-cache").await);
        assert_eq!(harness.stored_manifest().await, None);
    }

    #[tokio::test]
    async fn test_activation_after_reset_behaves_as_first_install() {
        let harness = Harness::new(&[("a.js", "h1")], &["a.js"]);
        harness.seed("app-manifest", MANIFEST_RECORD_KEY, "garbage").await;
        assert!(!harness.worker.activate().await.is_success());

        harness.seed("app-temp-cache", &url("a.js"), "a").await;
        let outcome = harness.worker.activate().await;

        assert!(matches!(
            outcome,
            ActivationOutcome::Success(ActivationReport { path: ActivationPath::NoPriorManifest, .. })
        ));
        assert_eq!(harness.persisted_keys().await, vec![url("a.js")]);
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = ActivationOutcome::Failed { reason: "boom".into() };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["reason"], "boom");
    }
}
