//! cache_status tool implementation.
//!
//! Reports the worker state and the contents of its storage regions.

use precache_client::{CacheStatus, CacheWorker};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;

/// Parameters for the cache_status tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheStatusParams {
    /// List the storage keys of the durable cache.
    #[serde(default)]
    pub include_keys: bool,
}

#[derive(Debug, Serialize)]
pub struct CacheStatusOutput {
    #[serde(flatten)]
    pub status: CacheStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<Vec<String>>,
}

pub async fn status_impl(worker: &CacheWorker, params: CacheStatusParams) -> Result<CallToolResult, McpError> {
    let status = worker.status().await?;
    let keys = if params.include_keys { Some(worker.cached_keys().await?) } else { None };

    json_result(&CacheStatusOutput { status, keys })
}
