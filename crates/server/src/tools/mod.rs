//! MCP tool implementations.
//!
//! Each tool forwards one lifecycle event to the worker and renders the
//! result as pretty JSON.

pub mod fetch;
pub mod lifecycle;
pub mod message;
pub mod status;

pub use fetch::{WorkerFetchParams, fetch_impl};
pub use lifecycle::{activate_impl, install_impl, uninstall_impl};
pub use message::{WorkerMessageParams, message_impl};
pub use status::{CacheStatusParams, status_impl};

use precache_core::Error;
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
