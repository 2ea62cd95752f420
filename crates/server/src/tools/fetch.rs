//! worker_fetch tool implementation.
//!
//! Offers a request to the worker's interceptor, the way a page's resource
//! load would reach it.

use precache_client::{CacheWorker, Interception, Method, ResourceRequest, ResponseSource};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use super::json_result;
use crate::error::HostError;

/// Input parameters for worker_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerFetchParams {
    /// Absolute URL of the request.
    pub url: String,

    /// HTTP method (default: GET). Only GET requests are handled.
    #[serde(default)]
    pub method: Option<String>,

    /// Include the body as UTF-8 text (lossy) in the output.
    #[serde(default)]
    pub include_body: bool,
}

#[derive(Debug, Serialize)]
pub struct WorkerFetchOutput {
    pub url: String,
    /// False when the worker declined and the host should go to the network itself.
    pub handled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<ResponseSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

fn parse_request(params: &WorkerFetchParams) -> Result<ResourceRequest, HostError> {
    let url = Url::parse(params.url.trim())
        .map_err(|e| HostError::InvalidInput(format!("invalid url {}: {e}", params.url)))?;
    let method = match params.method.as_deref() {
        None => Method::GET,
        Some(raw) => Method::from_bytes(raw.trim().to_ascii_uppercase().as_bytes())
            .map_err(|_| HostError::InvalidInput(format!("invalid method: {raw}")))?,
    };
    Ok(ResourceRequest::new(method, url))
}

pub async fn fetch_impl(worker: &CacheWorker, params: WorkerFetchParams) -> Result<CallToolResult, McpError> {
    let request = parse_request(&params)?;

    let output = match worker.handle_fetch(&request).await? {
        Interception::Declined => WorkerFetchOutput {
            url: request.url.to_string(),
            handled: false,
            source: None,
            status: None,
            content_type: None,
            bytes: 0,
            body: None,
        },
        Interception::Responded { response, source } => WorkerFetchOutput {
            url: response.url.to_string(),
            handled: true,
            source: Some(source),
            status: Some(response.status.as_u16()),
            content_type: response.content_type.clone(),
            bytes: response.bytes.len(),
            body: params.include_body.then(|| String::from_utf8_lossy(&response.bytes).into_owned()),
        },
    };

    json_result(&output)
}
