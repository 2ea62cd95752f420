//! precache-worker entry point.
//!
//! Boots the cache worker from layered configuration and serves its lifecycle
//! events as MCP tools on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use precache_client::{CacheWorker, DetachedHost, FetchClient, FetchConfig, WorkerConfig};
use precache_core::{AppConfig, AppManifest, SqliteStorage};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let manifest = AppManifest::load(&config.manifest_path)
        .with_context(|| format!("loading manifest from {}", config.manifest_path.display()))?;
    let storage = SqliteStorage::open(&config.db_path)
        .await
        .with_context(|| format!("opening storage at {}", config.db_path.display()))?;
    let fetcher = FetchClient::new(FetchConfig::from(&config))?;

    let worker = CacheWorker::new(
        WorkerConfig::from_app_config(&config)?,
        manifest,
        Arc::new(storage),
        Arc::new(fetcher),
        Arc::new(DetachedHost),
    );

    tracing::info!(
        origin = %config.origin,
        resources = worker.manifest().resources.len(),
        core = worker.manifest().core.len(),
        "Starting precache-worker on stdio transport"
    );

    let handler = handler::PrecacheServer::new(Arc::new(worker));
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
