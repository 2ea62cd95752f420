//! MCP server handler implementation.
//!
//! This module defines the server handler that routes tool calls to the
//! worker's lifecycle events.
use std::sync::Arc;

use precache_client::CacheWorker;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

use crate::tools::{
    CacheStatusParams, WorkerFetchParams, WorkerMessageParams, activate_impl, fetch_impl, install_impl, message_impl,
    status_impl, uninstall_impl,
};

/// The MCP server handler for precache-worker.
#[derive(Clone)]
pub struct PrecacheServer {
    tool_router: ToolRouter<Self>,
    worker: Arc<CacheWorker>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl PrecacheServer {
    /// Create a new server handler around a worker.
    pub fn new(worker: Arc<CacheWorker>) -> Self {
        Self { tool_router: Self::tool_router(), worker }
    }

    #[tool(description = "Install: fetch the core resources into staging, bypassing HTTP caches. Fails as a whole.")]
    async fn worker_install(&self) -> Result<CallToolResult, McpError> {
        install_impl(&self.worker).await
    }

    #[tool(description = "Activate: evict stale entries, promote staging, record the manifest. Resets on failure.")]
    async fn worker_activate(&self) -> Result<CallToolResult, McpError> {
        activate_impl(&self.worker).await
    }

    #[tool(description = "Offer a request to the worker: cache-first for resources, online-first for the root.")]
    async fn worker_fetch(&self, params: Parameters<WorkerFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.worker, params.0).await
    }

    #[tool(description = "Send a control message to the worker: \"skipWaiting\" or \"downloadOffline\".")]
    async fn worker_message(&self, params: Parameters<WorkerMessageParams>) -> Result<CallToolResult, McpError> {
        message_impl(&self.worker, params.0).await
    }

    #[tool(description = "Uninstall the worker, deleting every storage region.")]
    async fn worker_uninstall(&self) -> Result<CallToolResult, McpError> {
        uninstall_impl(&self.worker).await
    }

    #[tool(description = "Report worker state, region entry counts and whether the stored manifest is current.")]
    async fn cache_status(&self, params: Parameters<CacheStatusParams>) -> Result<CallToolResult, McpError> {
        status_impl(&self.worker, params.0).await
    }
}

impl ServerHandler for PrecacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "precache-worker".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
