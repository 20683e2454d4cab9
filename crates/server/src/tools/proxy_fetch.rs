//! proxy_fetch tool implementation.
//!
//! Runs one request through the interception worker: the path decides the
//! caching strategy and the active generation's store backs it.

use std::collections::BTreeMap;

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shelter_client::resolve;
use shelter_core::worker::Strategy;
use shelter_core::{GenerationId, Request};

use crate::error::{ToolError, json_result};
use crate::state::ProxyState;

/// Input parameters for proxy_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProxyFetchParams {
    /// Path (`/api/settings`) or absolute URL to request.
    pub url: String,

    /// HTTP method (default: GET). Only GET requests use the cache.
    #[serde(default = "default_method")]
    pub method: String,

    /// Extra request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for proxy_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProxyFetchOutput {
    /// The resolved request URL.
    pub url: String,
    /// HTTP status code.
    pub status: u16,
    /// Content-Type header.
    pub content_type: Option<String>,
    /// Response headers (lowercase names).
    pub headers: BTreeMap<String, String>,
    /// Response body, decoded as UTF-8 (lossy).
    pub body: String,
    /// Strategy applied; absent when caching was bypassed.
    pub strategy: Option<Strategy>,
    /// Generation that served the request; absent when uncontrolled.
    pub generation: Option<GenerationId>,
}

/// Implementation of the proxy_fetch tool.
pub async fn fetch_impl(state: &ProxyState, params: ProxyFetchParams) -> Result<CallToolResult, McpError> {
    if params.method.trim().is_empty() {
        return Err(ToolError::InvalidInput("method cannot be empty".into()).into());
    }

    let url = resolve(&state.origin, &params.url).map_err(ToolError::from)?;
    let mut request = Request::get(url);
    request.method = params.method.trim().to_ascii_uppercase();
    for (name, value) in params.headers {
        request = request.with_header(&name, value);
    }

    let intercepted = state.worker.handle(&request).await?;
    let response = intercepted.response;

    let output = ProxyFetchOutput {
        url: request.url.to_string(),
        status: response.status,
        content_type: response.content_type().map(str::to_string),
        body: String::from_utf8_lossy(&response.body).into_owned(),
        headers: response.headers,
        strategy: intercepted.strategy,
        generation: intercepted.generation,
    };

    json_result(&output)
}
