//! worker_message tool implementation.

use precache_client::{CacheWorker, ControlMessage, MessageOutcome};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;
use crate::error::HostError;

/// Input parameters for worker_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerMessageParams {
    /// Control message: "skipWaiting" or "downloadOffline".
    pub message: String,
}

pub async fn message_impl(worker: &CacheWorker, params: WorkerMessageParams) -> Result<CallToolResult, McpError> {
    let message: ControlMessage =
        params.message.parse().map_err(|_| HostError::UnknownMessage(params.message.clone()))?;

    let outcome: MessageOutcome = worker.handle_message(message).await?;
    json_result(&outcome)
}
